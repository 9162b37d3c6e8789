//! Daily TRY exchange rates: the central bank bulletin as primary source, the statistical
//! API as fallback, an in-process cache in front and the quote store behind.

pub mod domain;
pub mod evds;
pub mod provider;
pub mod router;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod tcmb;

use chrono::NaiveDate;

use crate::deadline::DeadlineExceeded;
use crate::error::ErrorKind;
use crate::repository::RepositoryError;

pub use domain::{Conversion, Currency, FxQuote, FxSource, RateSet, RatesSnapshot};
pub use evds::EvdsSource;
pub use provider::FxRateProvider;
pub use router::fx_router;
pub use scheduler::spawn_daily_refresh;
pub use source::{RateSource, SourceError};
pub use store::FxQuoteStore;
pub use tcmb::TcmbBulletinSource;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FxError {
    #[error("no exchange-rate source answered for {date}")]
    Unavailable { date: NaiveDate },
    #[error("rates effective {date} do not include {currency}")]
    CurrencyMissing { currency: Currency, date: NaiveDate },
    #[error("currency conversion overflowed")]
    Arithmetic,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Deadline(#[from] DeadlineExceeded),
}

impl FxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FxError::Unavailable { .. } => ErrorKind::FxUnavailable,
            FxError::CurrencyMissing { .. } => ErrorKind::FxCurrencyMissing,
            FxError::Arithmetic => ErrorKind::InputDomain,
            FxError::Repository(err) => err.kind(),
            FxError::Deadline(_) => ErrorKind::DeadlineExceeded,
        }
    }
}
