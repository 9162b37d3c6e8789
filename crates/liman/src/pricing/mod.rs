//! Service pricing: tariff resolution, the six calculation formulas and the engine that
//! converts, discounts and taxes the result.

pub mod domain;
pub mod engine;
pub mod formula;
pub mod repository;
pub mod router;
pub mod tariff;

#[cfg(test)]
mod tests;

use crate::deadline::DeadlineExceeded;
use crate::error::ErrorKind;
use crate::fx::FxError;

pub use domain::{
    CalculationType, InputMap, PricedQuote, PricedResult, PricingOptions, QuoteLine,
    ResolvedTariff, Service, TariffEntry, TariffSource,
};
pub use engine::PricingEngine;
pub use formula::{evaluate, Evaluation, FormulaError, FormulaInputs, FormulaParams, RoundingMode};
pub use repository::CatalogRepository;
pub use router::pricing_router;
pub use tariff::{TariffError, TariffResolver};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error(transparent)]
    Tariff(#[from] TariffError),
    #[error(transparent)]
    Formula(#[from] FormulaError),
    #[error(transparent)]
    Fx(#[from] FxError),
    #[error("invalid pricing option: {0}")]
    InvalidOption(String),
    #[error("a quote needs at least one line")]
    EmptyQuote,
    #[error("amount overflowed while pricing")]
    Overflow,
    #[error(transparent)]
    Deadline(#[from] DeadlineExceeded),
}

impl PricingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PricingError::Tariff(err) => err.kind(),
            PricingError::Formula(err) => err.kind(),
            PricingError::Fx(err) => err.kind(),
            PricingError::InvalidOption(_) | PricingError::Overflow => ErrorKind::InputDomain,
            PricingError::EmptyQuote => ErrorKind::InvalidRequest,
            PricingError::Deadline(_) => ErrorKind::DeadlineExceeded,
        }
    }
}
