use async_trait::async_trait;
use chrono::NaiveDate;

use super::domain::{Service, TariffEntry};
use crate::repository::RepositoryError;

/// Read access to the service catalog and its tariff list.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn get_service(&self, code: &str) -> Result<Option<Service>, RepositoryError>;

    /// Tariff entries of `service_code` that may cover `on_date`. Implementations may return a
    /// superset; the resolver filters again.
    async fn find_tariff_entries(
        &self,
        service_code: &str,
        on_date: NaiveDate,
    ) -> Result<Vec<TariffEntry>, RepositoryError>;
}
