use async_trait::async_trait;
use axum::response::Response;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::fx::{Currency, FxRateProvider, FxSource, RateSet, RateSource, RatesSnapshot, SourceError};
use crate::memory::{MemoryCatalog, MemoryFxStore};
use crate::pricing::{InputMap, PricingEngine, Service, TariffEntry, TariffResolver};

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn inputs(value: Value) -> InputMap {
    match value {
        Value::Object(map) => map,
        other => panic!("inputs must be an object, got {other}"),
    }
}

pub(super) fn service(
    code: &str,
    base_price: Decimal,
    currency: Currency,
    calculation_type: &str,
    formula_params: Value,
) -> Service {
    Service {
        service_code: code.to_string(),
        name: code.replace('_', " ").to_lowercase(),
        base_price,
        currency,
        vat_rate: dec!(20),
        calculation_type: calculation_type.to_string(),
        formula_params,
        active: true,
    }
}

pub(super) fn entry(
    id: u64,
    code: &str,
    valid_from: NaiveDate,
    valid_to: Option<NaiveDate>,
    override_price: Option<Decimal>,
) -> TariffEntry {
    TariffEntry {
        id,
        service_code: code.to_string(),
        valid_from,
        valid_to,
        override_price,
        override_currency: None,
        active: true,
        version_note: None,
    }
}

/// Same rates for every requested day: USD sells at `usd_sell`, EUR at 37.20.
pub(super) struct FixedRates {
    usd_sell: Decimal,
    delay: Duration,
    calls: AtomicUsize,
}

impl FixedRates {
    pub(super) fn new(usd_sell: Decimal) -> Self {
        Self {
            usd_sell,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateSource for FixedRates {
    fn source(&self) -> FxSource {
        FxSource::Primary
    }

    async fn fetch(&self, date: NaiveDate) -> Result<Option<RatesSnapshot>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let set = |sell: Decimal| RateSet {
            forex_buy: sell - dec!(0.10),
            forex_sell: sell,
            banknote_buy: sell - dec!(0.20),
            banknote_sell: sell + dec!(0.20),
        };
        let mut rates = BTreeMap::new();
        rates.insert(Currency::Usd, set(self.usd_sell));
        rates.insert(Currency::Eur, set(dec!(37.20)));
        rates.insert(Currency::Gbp, set(dec!(43.60)));
        Ok(Some(RatesSnapshot {
            requested_date: date,
            effective_date: date,
            source: FxSource::Primary,
            rates,
            fetched_at: Utc::now(),
        }))
    }
}

/// Catalog of the services the pricing scenarios use.
pub(super) fn catalog() -> Arc<MemoryCatalog> {
    let catalog = MemoryCatalog::default();
    let services = [
        service("TEST_PER_UNIT", dec!(25.50), Currency::Usd, "PER_UNIT", Value::Null),
        service(
            "FORKLIFT",
            dec!(80),
            Currency::Usd,
            "PER_BLOCK",
            serde_json::json!({ "base_weight_ton": 3, "base_time_min": 30 }),
        ),
        service(
            "VEHICLE_PARKING",
            dec!(15),
            Currency::Usd,
            "VEHICLE_4H_RULE",
            serde_json::json!({ "base_minutes": 240 }),
        ),
        service(
            "PILOTAGE",
            dec!(150),
            Currency::Eur,
            "BASE_PLUS_INCREMENT",
            serde_json::json!({ "increment_rate": "0.05" }),
        ),
        service(
            "STORAGE",
            dec!(2),
            Currency::Usd,
            "X_SECONDARY",
            serde_json::json!({ "primary_input": "teu", "secondary_input": "days" }),
        ),
        service("BERTH_TRY", dec!(1000), Currency::Try, "FIXED", Value::Null),
        service("MOORING_TRY", dec!(1200), Currency::Try, "FIXED", Value::Null),
        service("GATE_TRY", dec!(600), Currency::Try, "FIXED", Value::Null),
    ];
    for service in services {
        catalog.insert_service(service).expect("seed service");
    }
    Arc::new(catalog)
}

pub(super) fn engine_with(catalog: Arc<MemoryCatalog>, rates: Arc<FixedRates>) -> PricingEngine {
    let fx = FxRateProvider::new(rates, Arc::new(MemoryFxStore::default()));
    PricingEngine::new(TariffResolver::new(catalog), Arc::new(fx))
}

pub(super) fn engine() -> (PricingEngine, Arc<FixedRates>) {
    let rates = Arc::new(FixedRates::new(dec!(34.50)));
    (engine_with(catalog(), rates.clone()), rates)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
