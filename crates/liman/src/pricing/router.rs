use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use super::domain::{InputMap, PricingOptions, QuoteLine};
use super::PricingEngine;
use crate::deadline::Deadline;
use crate::error::error_response;

#[derive(Clone)]
pub(crate) struct PricingRouterState {
    engine: Arc<PricingEngine>,
    request_deadline: Duration,
}

impl PricingRouterState {
    pub(crate) fn new(engine: Arc<PricingEngine>, request_deadline: Duration) -> Self {
        Self {
            engine,
            request_deadline,
        }
    }
}

/// `POST /pricing/calculate` and `POST /pricing/quote`.
pub fn pricing_router(engine: Arc<PricingEngine>, request_deadline: Duration) -> Router {
    Router::new()
        .route("/pricing/calculate", post(calculate_handler))
        .route("/pricing/quote", post(quote_handler))
        .with_state(PricingRouterState::new(engine, request_deadline))
}

#[derive(Debug, Deserialize)]
pub(crate) struct CalculateRequest {
    service_code: String,
    on_date: NaiveDate,
    #[serde(default)]
    inputs: InputMap,
    #[serde(default)]
    options: PricingOptions,
}

pub(crate) async fn calculate_handler(
    State(state): State<PricingRouterState>,
    axum::Json(request): axum::Json<CalculateRequest>,
) -> Response {
    let deadline = Deadline::after(state.request_deadline);
    match state
        .engine
        .price(
            &request.service_code,
            request.on_date,
            &request.inputs,
            &request.options,
            deadline,
        )
        .await
    {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(error) => error_response(error.kind(), error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuoteRequest {
    on_date: NaiveDate,
    lines: Vec<QuoteLine>,
    #[serde(default)]
    options: PricingOptions,
}

pub(crate) async fn quote_handler(
    State(state): State<PricingRouterState>,
    axum::Json(request): axum::Json<QuoteRequest>,
) -> Response {
    let deadline = Deadline::after(state.request_deadline);
    match state
        .engine
        .quote(request.on_date, &request.lines, &request.options, deadline)
        .await
    {
        Ok(quote) => (StatusCode::OK, axum::Json(quote)).into_response(),
        Err(error) => error_response(error.kind(), error),
    }
}
