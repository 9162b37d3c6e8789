use crate::config::ConfigError;
use crate::fx::FxError;
use crate::pricing::PricingError;
use crate::repository::RepositoryError;
use crate::sgk::SgkIngestError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// Failure categories surfaced by the core. The HTTP layer maps these to status codes and
/// localized messages; inside the core they travel unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ServiceNotFound,
    TariffOverlap,
    InputMissing,
    InputDomain,
    CalcTypeUnknown,
    FormulaParamsInvalid,
    FxUnavailable,
    FxCurrencyMissing,
    PdfUnreadable,
    PeriodCodeInvalid,
    DeadlineExceeded,
    RepositoryUnavailable,
    InvalidRequest,
    EmployeeNotFound,
}

impl ErrorKind {
    pub const fn code(self) -> &'static str {
        match self {
            Self::ServiceNotFound => "SERVICE_NOT_FOUND",
            Self::TariffOverlap => "TARIFF_OVERLAP",
            Self::InputMissing => "INPUT_MISSING",
            Self::InputDomain => "INPUT_DOMAIN",
            Self::CalcTypeUnknown => "CALC_TYPE_UNKNOWN",
            Self::FormulaParamsInvalid => "FORMULA_PARAMS_INVALID",
            Self::FxUnavailable => "FX_UNAVAILABLE",
            Self::FxCurrencyMissing => "FX_CURRENCY_MISSING",
            Self::PdfUnreadable => "PDF_UNREADABLE",
            Self::PeriodCodeInvalid => "PERIOD_CODE_INVALID",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::RepositoryUnavailable => "REPOSITORY_UNAVAILABLE",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::EmployeeNotFound => "EMPLOYEE_NOT_FOUND",
        }
    }

    pub fn status_code(self) -> StatusCode {
        match self {
            Self::ServiceNotFound | Self::EmployeeNotFound => StatusCode::NOT_FOUND,
            Self::TariffOverlap => StatusCode::CONFLICT,
            Self::InputMissing
            | Self::InputDomain
            | Self::CalcTypeUnknown
            | Self::FormulaParamsInvalid
            | Self::PeriodCodeInvalid
            | Self::FxCurrencyMissing => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidRequest | Self::PdfUnreadable => StatusCode::BAD_REQUEST,
            Self::FxUnavailable | Self::RepositoryUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Turkish message shown to portal users.
    pub const fn localized_message(self) -> &'static str {
        match self {
            Self::ServiceNotFound => "Hizmet bulunamadı veya aktif değil.",
            Self::TariffOverlap => "Bu tarih için birden fazla aktif tarife kaydı var.",
            Self::InputMissing => "Hesaplama için gerekli bir değer eksik.",
            Self::InputDomain => "Girilen değer geçerli aralıkta değil.",
            Self::CalcTypeUnknown => "Hizmetin hesaplama tipi tanımlı değil.",
            Self::FormulaParamsInvalid => "Hizmetin formül parametreleri geçersiz.",
            Self::FxUnavailable => "Döviz kurları şu anda alınamıyor.",
            Self::FxCurrencyMissing => "İstenen para birimi için kur bulunamadı.",
            Self::PdfUnreadable => "Yüklenen PDF okunamadı.",
            Self::PeriodCodeInvalid => "Dönem kodu YYYYAA biçiminde olmalıdır.",
            Self::DeadlineExceeded => "İşlem zaman aşımına uğradı.",
            Self::RepositoryUnavailable => "Veri kaynağına şu anda erişilemiyor.",
            Self::InvalidRequest => "İstek içeriği geçersiz.",
            Self::EmployeeNotFound => "Personel kaydı bulunamadı.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Build the JSON error body shared by every router.
pub fn error_response(kind: ErrorKind, detail: impl fmt::Display) -> Response {
    let body = json!({
        "kind": kind,
        "error": detail.to_string(),
        "message": kind.localized_message(),
    });
    (kind.status_code(), Json(body)).into_response()
}

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Http(reqwest::Error),
    Repository(RepositoryError),
    Pricing(PricingError),
    Fx(FxError),
    Sgk(SgkIngestError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Http(err) => write!(f, "http client error: {}", err),
            AppError::Repository(err) => write!(f, "repository error: {}", err),
            AppError::Pricing(err) => write!(f, "pricing error: {}", err),
            AppError::Fx(err) => write!(f, "exchange rate error: {}", err),
            AppError::Sgk(err) => write!(f, "sgk ingest error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Http(err) => Some(err),
            AppError::Repository(err) => Some(err),
            AppError::Pricing(err) => Some(err),
            AppError::Fx(err) => Some(err),
            AppError::Sgk(err) => Some(err),
        }
    }
}

impl AppError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AppError::Repository(err) => Some(err.kind()),
            AppError::Pricing(err) => Some(err.kind()),
            AppError::Fx(err) => Some(err.kind()),
            AppError::Sgk(err) => Some(err.kind()),
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Http(_) => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self.kind() {
            Some(kind) => error_response(kind, &self),
            None => {
                let body = Json(json!({ "error": self.to_string() }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

impl From<RepositoryError> for AppError {
    fn from(value: RepositoryError) -> Self {
        Self::Repository(value)
    }
}

impl From<PricingError> for AppError {
    fn from(value: PricingError) -> Self {
        Self::Pricing(value)
    }
}

impl From<FxError> for AppError {
    fn from(value: FxError) -> Self {
        Self::Fx(value)
    }
}

impl From<SgkIngestError> for AppError {
    fn from(value: SgkIngestError) -> Self {
        Self::Sgk(value)
    }
}
