use crate::infra::{AppState, Platform};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use liman::fx::fx_router;
use liman::pricing::pricing_router;
use liman::sgk::sgk_router;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// Core routers merged with the operational endpoints.
pub(crate) fn with_platform_routes(platform: &Platform, request_deadline: Duration) -> Router {
    fx_router(platform.fx.clone(), request_deadline)
        .merge(pricing_router(platform.pricing.clone(), request_deadline))
        .merge(sgk_router(platform.sgk.clone(), request_deadline))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::NaiveDate;
    use liman::config::{
        AppConfig, AppEnvironment, FxConfig, PricingConfig, ServerConfig, SgkConfig,
        TelemetryConfig,
    };
    use liman::fx::{FxRateProvider, FxSource, RateSource, RatesSnapshot, SourceError};
    use liman::memory::MemoryFxStore;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use rust_decimal::Decimal;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tower::ServiceExt;

    /// A source that never publishes.
    struct Silent;

    #[async_trait]
    impl RateSource for Silent {
        fn source(&self) -> FxSource {
            FxSource::Primary
        }

        async fn fetch(&self, _date: NaiveDate) -> Result<Option<RatesSnapshot>, SourceError> {
            Ok(None)
        }
    }

    fn config() -> AppConfig {
        AppConfig {
            environment: AppEnvironment::Test,
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 0,
                request_deadline: Duration::from_secs(5),
            },
            telemetry: TelemetryConfig {
                log_level: "info".into(),
            },
            fx: FxConfig::default(),
            pricing: PricingConfig {
                cabotage_rate: Decimal::TEN,
            },
            sgk: SgkConfig {
                compliance_window_days: 60,
            },
        }
    }

    fn app(ready: bool) -> Router {
        let config = config();
        let fx = Arc::new(
            FxRateProvider::new(Arc::new(Silent), Arc::new(MemoryFxStore::default()))
                .with_walkback_days(2),
        );
        let platform = Platform::assemble(&config, fx).expect("platform assembles");
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_platform_routes(&platform, config.server.request_deadline).layer(Extension(state))
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("body readable");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).expect("request builds")
    }

    #[tokio::test]
    async fn readiness_follows_the_flag() {
        let response = app(false)
            .oneshot(get_request("/ready"))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = app(true)
            .oneshot(get_request("/ready"))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], json!("ready"));
    }

    #[tokio::test]
    async fn health_and_metrics_answer() {
        let router = app(true);
        let response = router
            .clone()
            .oneshot(get_request("/health"))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(get_request("/metrics"))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
    }

    #[tokio::test]
    async fn lira_services_price_without_rates() {
        let response = app(true)
            .oneshot(
                Request::post("/pricing/calculate")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({
                            "service_code": "BERTH",
                            "on_date": "2026-02-02",
                            "inputs": {}
                        })
                        .to_string(),
                    ))
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["subtotal_native"], json!("1150.0000"));
        assert_eq!(body["tariff_source"], json!("OVERRIDE"));
        assert_eq!(body["grand_total"], json!("1380.0000"));
    }

    #[tokio::test]
    async fn foreign_currency_without_rates_is_unavailable() {
        let response = app(true)
            .oneshot(
                Request::post("/pricing/calculate")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({
                            "service_code": "CRANE_MOVE",
                            "on_date": "2025-11-23",
                            "inputs": { "quantity": 2 }
                        })
                        .to_string(),
                    ))
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["kind"], json!("FX_UNAVAILABLE"));
    }
}
