use async_trait::async_trait;
use chrono::NaiveDate;

use super::domain::{Currency, FxQuote};
use crate::repository::RepositoryError;

/// Persistence for daily quotes. Rows are never overwritten: `get_fx_quote` answers the row
/// with the latest `fetched_at` for the key.
#[async_trait]
pub trait FxQuoteStore: Send + Sync {
    async fn get_fx_quote(
        &self,
        currency: Currency,
        date: NaiveDate,
    ) -> Result<Option<FxQuote>, RepositoryError>;

    async fn put_fx_quote(&self, quote: FxQuote) -> Result<(), RepositoryError>;
}
