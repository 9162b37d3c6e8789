use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, error};

use super::domain::{ResolvedTariff, TariffSource};
use super::repository::CatalogRepository;
use crate::error::ErrorKind;
use crate::repository::RepositoryError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TariffError {
    #[error("service '{0}' does not exist or is inactive")]
    ServiceNotFound(String),
    #[error("{count} active tariff entries of '{service_code}' cover {date}")]
    Overlap {
        service_code: String,
        date: NaiveDate,
        count: usize,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl TariffError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TariffError::ServiceNotFound(_) => ErrorKind::ServiceNotFound,
            TariffError::Overlap { .. } => ErrorKind::TariffOverlap,
            TariffError::Repository(err) => err.kind(),
        }
    }
}

/// Resolves the price terms of a service on a date. Tariff entries may shadow price and
/// currency only; VAT, calculation type and formula parameters always come from the service.
#[derive(Clone)]
pub struct TariffResolver {
    catalog: Arc<dyn CatalogRepository>,
}

impl TariffResolver {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }

    pub async fn resolve(
        &self,
        service_code: &str,
        as_of: NaiveDate,
    ) -> Result<ResolvedTariff, TariffError> {
        let service = self
            .catalog
            .get_service(service_code)
            .await?
            .filter(|service| service.active)
            .ok_or_else(|| TariffError::ServiceNotFound(service_code.to_string()))?;

        let mut covering: Vec<_> = self
            .catalog
            .find_tariff_entries(&service.service_code, as_of)
            .await?
            .into_iter()
            .filter(|entry| {
                entry.active && entry.service_code == service.service_code && entry.covers(as_of)
            })
            .collect();

        if covering.len() > 1 {
            let ids: Vec<u64> = covering.iter().map(|entry| entry.id).collect();
            error!(
                service_code = %service.service_code,
                date = %as_of,
                entry_ids = ?ids,
                "overlapping active tariff entries"
            );
            return Err(TariffError::Overlap {
                service_code: service.service_code,
                date: as_of,
                count: covering.len(),
            });
        }

        let resolved = match covering.pop() {
            Some(entry) => ResolvedTariff {
                unit_price: entry.override_price.unwrap_or(service.base_price),
                currency: entry.override_currency.unwrap_or(service.currency),
                source: if entry.override_price.is_some() || entry.override_currency.is_some() {
                    TariffSource::Override
                } else {
                    TariffSource::Inline
                },
                tariff_entry_id: Some(entry.id),
                service_code: service.service_code,
                service_name: service.name,
                vat_rate: service.vat_rate,
                calculation_type: service.calculation_type,
                formula_params: service.formula_params,
            },
            None => ResolvedTariff {
                unit_price: service.base_price,
                currency: service.currency,
                source: TariffSource::Inline,
                tariff_entry_id: None,
                service_code: service.service_code,
                service_name: service.name,
                vat_rate: service.vat_rate,
                calculation_type: service.calculation_type,
                formula_params: service.formula_params,
            },
        };
        debug!(
            service_code = %resolved.service_code,
            date = %as_of,
            source = ?resolved.source,
            "tariff resolved"
        );
        Ok(resolved)
    }
}
