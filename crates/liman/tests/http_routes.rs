use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::{NaiveDate, Utc};
use liman::fx::{
    fx_router, Currency, FxRateProvider, FxSource, RateSet, RateSource, RatesSnapshot,
    SourceError,
};
use liman::memory::{MemoryCatalog, MemoryFxStore, MemoryPersonnel};
use liman::pricing::{pricing_router, PricingEngine, Service, TariffResolver};
use liman::sgk::{sgk_router, SgkIngestService};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Publishes a single Friday bulletin and nothing else.
struct FridayOnly;

fn friday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 21).expect("valid date")
}

fn rate(sell: Decimal) -> RateSet {
    RateSet {
        forex_buy: sell - dec!(0.10),
        forex_sell: sell,
        banknote_buy: sell - dec!(0.12),
        banknote_sell: sell + dec!(0.05),
    }
}

#[async_trait]
impl RateSource for FridayOnly {
    fn source(&self) -> FxSource {
        FxSource::Primary
    }

    async fn fetch(&self, date: NaiveDate) -> Result<Option<RatesSnapshot>, SourceError> {
        if date != friday() {
            return Ok(None);
        }
        let rates = BTreeMap::from([
            (Currency::Usd, rate(dec!(34.50))),
            (Currency::Eur, rate(dec!(36.20))),
            (Currency::Gbp, rate(dec!(43.60))),
        ]);
        Ok(Some(RatesSnapshot {
            requested_date: date,
            effective_date: date,
            source: FxSource::Primary,
            rates,
            fetched_at: Utc::now(),
        }))
    }
}

fn app() -> Router {
    let provider = Arc::new(FxRateProvider::new(
        Arc::new(FridayOnly),
        Arc::new(MemoryFxStore::default()),
    ));

    let catalog = MemoryCatalog::default();
    catalog
        .insert_service(Service {
            service_code: "CRANE_MOVE".into(),
            name: "Vinç hareketi".into(),
            base_price: dec!(25.50),
            currency: Currency::Usd,
            vat_rate: dec!(20),
            calculation_type: "PER_UNIT".into(),
            formula_params: Value::Null,
            active: true,
        })
        .expect("seed service");
    let engine = Arc::new(PricingEngine::new(
        TariffResolver::new(Arc::new(catalog)),
        provider.clone(),
    ));
    let sgk = Arc::new(SgkIngestService::new(
        Arc::new(MemoryPersonnel::default()),
        60,
    ));

    let deadline = Duration::from_secs(5);
    fx_router(provider, deadline)
        .merge(pricing_router(engine, deadline))
        .merge(sgk_router(sgk, deadline))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 256 * 1024)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn weekend_rates_come_from_the_friday_bulletin() {
    let response = app()
        .oneshot(
            Request::get("/fx/rates?date=2025-11-23")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["requested_date"], json!("2025-11-23"));
    assert_eq!(body["effective_date"], json!("2025-11-21"));
    assert_eq!(body["source"], json!("PRIMARY"));
    assert_eq!(body["rates"]["USD"]["forex_sell"], json!("34.50"));
}

#[tokio::test]
async fn manual_quote_overrides_the_bulletin() {
    let app = app();
    let response = app
        .clone()
        .oneshot(post_json(
            "/fx/manual",
            json!({
                "currency": "USD",
                "effective_date": "2025-11-21",
                "forex_buy": "35.00",
                "forex_sell": "35.10",
                "banknote_buy": "34.95",
                "banknote_sell": "35.20"
            }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(response).await["source"], json!("MANUAL"));

    let response = app
        .oneshot(
            Request::get("/fx/rates?date=2025-11-21")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");
    let body = json_body(response).await;
    assert_eq!(body["rates"]["USD"]["forex_sell"], json!("35.10"));
    assert_eq!(body["rates"]["EUR"]["forex_sell"], json!("36.20"));
}

#[tokio::test]
async fn manual_try_quote_is_rejected() {
    let response = app()
        .oneshot(post_json(
            "/fx/manual",
            json!({
                "currency": "TRY",
                "effective_date": "2025-11-21",
                "forex_buy": "1",
                "forex_sell": "1",
                "banknote_buy": "1",
                "banknote_sell": "1"
            }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["kind"], json!("INVALID_REQUEST"));
}

#[tokio::test]
async fn usd_service_is_priced_in_lira_on_a_sunday() {
    let response = app()
        .oneshot(post_json(
            "/pricing/calculate",
            json!({
                "service_code": "CRANE_MOVE",
                "on_date": "2025-11-23",
                "inputs": { "quantity": 4 },
                "options": { "target_currency": "TRY" }
            }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["subtotal_native"], json!("102.0000"));
    assert_eq!(body["fx_rate_used"], json!("34.500000"));
    assert_eq!(body["fx_effective_date"], json!("2025-11-21"));
    assert_eq!(body["subtotal_target"], json!("3519.0000"));
    assert_eq!(body["vat_amount"], json!("703.8000"));
    assert_eq!(body["grand_total"], json!("4222.8000"));
}

#[tokio::test]
async fn routers_share_one_error_shape() {
    let app = app();
    let missing_service = app
        .clone()
        .oneshot(post_json(
            "/pricing/calculate",
            json!({ "service_code": "NOPE", "on_date": "2025-11-21" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(missing_service.status(), StatusCode::NOT_FOUND);
    let body = json_body(missing_service).await;
    assert_eq!(body["kind"], json!("SERVICE_NOT_FOUND"));
    assert!(body["message"].as_str().is_some_and(|text| !text.is_empty()));

    let missing_employee = app
        .oneshot(
            Request::get("/sgk/employees/nobody/compliance?date=2025-11-21")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");
    assert_eq!(missing_employee.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(missing_employee).await["kind"], json!("EMPLOYEE_NOT_FOUND"));
}
