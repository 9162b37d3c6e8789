use crate::config::TelemetryConfig;
use metrics::{describe_counter, Unit};
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

pub const FX_UPSTREAM_REQUESTS: &str = "liman_fx_upstream_requests_total";
pub const FX_CACHE_HITS: &str = "liman_fx_cache_hits_total";
pub const PRICING_CALCULATIONS: &str = "liman_pricing_calculations_total";
pub const SGK_RECONCILES: &str = "liman_sgk_reconciles_total";

#[derive(Debug)]
pub enum TelemetryError {
    EnvFilter { value: String, source: ParseError },
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::EnvFilter { value, .. } => {
                write!(
                    f,
                    "invalid log level/filter '{}': unable to build EnvFilter",
                    value
                )
            }
            TelemetryError::Subscriber(err) => write!(f, "telemetry error: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::EnvFilter { source, .. } => Some(source),
            TelemetryError::Subscriber(err) => Some(&**err),
        }
    }
}

pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            EnvFilter::try_new(&config.log_level).map_err(|source| TelemetryError::EnvFilter {
                value: config.log_level.clone(),
                source,
            })?
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)?;

    describe_metrics();
    Ok(())
}

/// Register descriptions for the counters emitted by the core.
pub fn describe_metrics() {
    describe_counter!(
        FX_UPSTREAM_REQUESTS,
        Unit::Count,
        "Exchange-rate requests sent to an upstream source"
    );
    describe_counter!(
        FX_CACHE_HITS,
        Unit::Count,
        "Exchange-rate lookups answered from the in-process cache"
    );
    describe_counter!(
        PRICING_CALCULATIONS,
        Unit::Count,
        "Priced service lines by calculation type"
    );
    describe_counter!(SGK_RECONCILES, Unit::Count, "Committed SGK reconciles");
}
