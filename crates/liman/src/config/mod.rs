use chrono::NaiveTime;
use rust_decimal::Decimal;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// The cache must hold a day's rates for at least this long.
pub const MIN_FX_CACHE_TTL: Duration = Duration::from_secs(4 * 60 * 60);

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub fx: FxConfig,
    pub pricing: PricingConfig,
    pub sgk: SgkConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;
        let request_deadline =
            Duration::from_millis(parse_var("APP_REQUEST_DEADLINE_MS", 30_000u64)?);

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig {
                host,
                port,
                request_deadline,
            },
            telemetry: TelemetryConfig { log_level },
            fx: FxConfig::from_env()?,
            pricing: PricingConfig {
                cabotage_rate: parse_var("PRICING_CABOTAGE_RATE", Decimal::TEN)?,
            },
            sgk: SgkConfig {
                compliance_window_days: parse_var("SGK_COMPLIANCE_WINDOW_DAYS", 60i64)?,
            },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_deadline: Duration,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Upstream exchange-rate sources and cache policy.
#[derive(Debug, Clone)]
pub struct FxConfig {
    pub primary_url: String,
    pub fallback_url: String,
    pub fallback_api_key: Option<String>,
    pub request_timeout: Duration,
    pub max_retry_elapsed: Duration,
    pub walkback_days: u32,
    pub cache_ttl: Duration,
    pub refresh_at: NaiveTime,
}

impl FxConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let cache_ttl = Duration::from_secs(parse_var("FX_CACHE_TTL_SECS", 14_400u64)?);
        let refresh_raw = env::var("FX_REFRESH_AT").unwrap_or_else(|_| "16:00".to_string());
        let refresh_at = NaiveTime::parse_from_str(refresh_raw.trim(), "%H:%M").map_err(|_| {
            ConfigError::InvalidValue {
                key: "FX_REFRESH_AT",
                value: refresh_raw.clone(),
            }
        })?;

        Ok(Self {
            primary_url: env::var("FX_PRIMARY_URL")
                .unwrap_or_else(|_| "https://www.tcmb.gov.tr/kurlar".to_string()),
            fallback_url: env::var("FX_FALLBACK_URL")
                .unwrap_or_else(|_| "https://evds2.tcmb.gov.tr/service/evds".to_string()),
            fallback_api_key: env::var("FX_FALLBACK_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            request_timeout: Duration::from_secs(parse_var("FX_REQUEST_TIMEOUT_SECS", 10u64)?),
            max_retry_elapsed: Duration::from_secs(parse_var("FX_MAX_RETRY_SECS", 20u64)?),
            walkback_days: parse_var("FX_WALKBACK_DAYS", 10u32)?,
            cache_ttl: cache_ttl.max(MIN_FX_CACHE_TTL),
            refresh_at,
        })
    }
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            primary_url: "https://www.tcmb.gov.tr/kurlar".to_string(),
            fallback_url: "https://evds2.tcmb.gov.tr/service/evds".to_string(),
            fallback_api_key: None,
            request_timeout: Duration::from_secs(10),
            max_retry_elapsed: Duration::from_secs(20),
            walkback_days: 10,
            cache_ttl: MIN_FX_CACHE_TTL,
            refresh_at: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default(),
        }
    }
}

/// Pricing defaults applied when a request leaves an option unset.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub cabotage_rate: Decimal,
}

/// Compliance derivation tuning.
#[derive(Debug, Clone)]
pub struct SgkConfig {
    pub compliance_window_days: i64,
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidValue {
                    key,
                    value: raw.clone(),
                })
        }
        _ => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidValue { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { key, value } => {
                write!(f, "{key} has an invalid value '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidValue { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
