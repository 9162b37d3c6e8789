use chrono::NaiveDate;
use liman::config::AppConfig;
use liman::error::AppError;
use liman::fx::FxRateProvider;
use liman::memory::MemoryFxStore;
use liman::pricing::{PricingEngine, TariffResolver};
use liman::sgk::{PeriodCode, SgkIngestService};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::demo;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Core services wired over the in-process stores.
#[derive(Clone)]
pub(crate) struct Platform {
    pub(crate) fx: Arc<FxRateProvider>,
    pub(crate) pricing: Arc<PricingEngine>,
    pub(crate) sgk: Arc<SgkIngestService>,
}

impl Platform {
    pub(crate) fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let fx = Arc::new(FxRateProvider::from_config(
            &config.fx,
            Arc::new(MemoryFxStore::default()),
        )?);
        Self::assemble(config, fx)
    }

    /// Wire the demo catalog and roster around an already-built rate provider.
    pub(crate) fn assemble(config: &AppConfig, fx: Arc<FxRateProvider>) -> Result<Self, AppError> {
        let catalog = Arc::new(demo::catalog()?);
        let pricing = Arc::new(
            PricingEngine::new(TariffResolver::new(catalog), fx.clone())
                .with_default_cabotage_rate(config.pricing.cabotage_rate),
        );

        let sgk = Arc::new(SgkIngestService::new(
            Arc::new(demo::personnel()?),
            config.sgk.compliance_window_days,
        ));

        Ok(Self { fx, pricing, sgk })
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_period(raw: &str) -> Result<PeriodCode, String> {
    raw.parse::<PeriodCode>().map_err(|err| err.to_string())
}

/// `name=value`; the value is taken as JSON when it parses, otherwise as a string.
pub(crate) fn parse_input(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("input name missing in '{raw}'"));
    }
    let value = value.trim();
    let parsed = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), parsed))
}
