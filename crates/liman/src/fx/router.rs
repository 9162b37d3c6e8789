use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use super::domain::{Currency, FxQuote, FxSource, RateSet};
use super::FxRateProvider;
use crate::deadline::Deadline;
use crate::error::{error_response, ErrorKind};

#[derive(Clone)]
pub(crate) struct FxRouterState {
    provider: Arc<FxRateProvider>,
    request_deadline: Duration,
}

/// `GET /fx/rates` and `POST /fx/manual`.
pub fn fx_router(provider: Arc<FxRateProvider>, request_deadline: Duration) -> Router {
    Router::new()
        .route("/fx/rates", get(rates_handler))
        .route("/fx/manual", post(manual_quote_handler))
        .with_state(FxRouterState {
            provider,
            request_deadline,
        })
}

#[derive(Debug, Deserialize)]
pub(crate) struct RatesQuery {
    date: Option<NaiveDate>,
}

pub(crate) async fn rates_handler(
    State(state): State<FxRouterState>,
    Query(query): Query<RatesQuery>,
) -> Response {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    match state
        .provider
        .get_rates(date, Deadline::after(state.request_deadline))
        .await
    {
        Ok(snapshot) => (StatusCode::OK, axum::Json(snapshot)).into_response(),
        Err(error) => error_response(error.kind(), error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ManualQuoteRequest {
    currency: Currency,
    effective_date: NaiveDate,
    #[serde(flatten)]
    rates: RateSet,
}

pub(crate) async fn manual_quote_handler(
    State(state): State<FxRouterState>,
    axum::Json(request): axum::Json<ManualQuoteRequest>,
) -> Response {
    if request.currency == Currency::Try {
        return error_response(ErrorKind::InvalidRequest, "TRY is the settlement currency");
    }

    let quote = FxQuote {
        currency: request.currency,
        effective_date: request.effective_date,
        rates: request.rates,
        source: FxSource::Manual,
        fetched_at: Utc::now(),
    };
    match state.provider.record_manual_quote(quote).await {
        Ok(stored) => (StatusCode::CREATED, axum::Json(stored)).into_response(),
        Err(error) => error_response(error.kind(), error),
    }
}
