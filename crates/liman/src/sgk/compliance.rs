//! SGK compliance status of a single employee.
//!
//! The status is derived from three sources in order: the membership row of the latest
//! period on or before the reference date, the cached flag written by the last reconcile,
//! and finally the employee's latest hire notification.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::domain::{
    ComplianceStatus, DocumentStatus, Employee, EmployeeDocument, EmployeeId, PeriodCode,
    SgkPeriodMembership,
};
use super::repository::PersonnelRepository;
use crate::error::ErrorKind;
use crate::repository::RepositoryError;

pub const DEFAULT_WINDOW_DAYS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComplianceError {
    #[error("employee {0} not found")]
    EmployeeNotFound(EmployeeId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ComplianceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ComplianceError::EmployeeNotFound(_) => ErrorKind::EmployeeNotFound,
            ComplianceError::Repository(err) => err.kind(),
        }
    }
}

/// What a status was decided on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceBasis {
    PeriodMembership,
    CachedPeriod,
    HireNotification,
    Nothing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceAssessment {
    pub status: ComplianceStatus,
    pub basis: ComplianceBasis,
    /// Period that decided the outcome, when a membership or the cache did.
    pub period_code: Option<PeriodCode>,
}

impl ComplianceAssessment {
    fn new(status: ComplianceStatus, basis: ComplianceBasis, period_code: Option<PeriodCode>) -> Self {
        Self {
            status,
            basis,
            period_code,
        }
    }
}

pub fn derive_status(
    employee: &Employee,
    memberships: &[SgkPeriodMembership],
    hire_notification: Option<&EmployeeDocument>,
    reference_date: NaiveDate,
    window_days: i64,
) -> ComplianceAssessment {
    let reference_period = PeriodCode::containing(reference_date);
    let window_start = reference_date - Duration::days(window_days);

    let latest = memberships
        .iter()
        .filter(|membership| {
            membership.employee_id == employee.id && membership.period_code <= reference_period
        })
        .max_by_key(|membership| membership.period_code);
    if let Some(membership) = latest.filter(|membership| membership.active) {
        return ComplianceAssessment::new(
            ComplianceStatus::Tam,
            ComplianceBasis::PeriodMembership,
            Some(membership.period_code),
        );
    }

    if let (Some(true), Some(period)) = (
        employee.sgk_is_active_last_period,
        employee.sgk_last_check_period,
    ) {
        if period <= reference_period && period.last_day() >= window_start {
            return ComplianceAssessment::new(
                ComplianceStatus::Tam,
                ComplianceBasis::CachedPeriod,
                Some(period),
            );
        }
    }

    let Some(document) = hire_notification else {
        return ComplianceAssessment::new(ComplianceStatus::Eksik, ComplianceBasis::Nothing, None);
    };
    let recent = document.uploaded_at.date_naive() >= window_start;
    let status = match document.status {
        Some(DocumentStatus::Approved) | None if recent => ComplianceStatus::Tam,
        Some(DocumentStatus::Pending) => ComplianceStatus::OnayBekliyor,
        _ => ComplianceStatus::Eksik,
    };
    ComplianceAssessment::new(status, ComplianceBasis::HireNotification, None)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeStatus {
    pub employee_id: EmployeeId,
    pub status: ComplianceStatus,
    pub basis: ComplianceBasis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateEntryDecision {
    pub employee_id: EmployeeId,
    pub reference_date: NaiveDate,
    pub status: ComplianceStatus,
    pub allowed: bool,
    pub reason: String,
}

/// Reads an employee's records and derives their status.
pub struct ComplianceService {
    personnel: Arc<dyn PersonnelRepository>,
    window_days: i64,
}

impl ComplianceService {
    pub fn new(personnel: Arc<dyn PersonnelRepository>) -> Self {
        Self {
            personnel,
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }

    pub fn with_window_days(mut self, window_days: i64) -> Self {
        self.window_days = window_days;
        self
    }

    pub async fn assess(
        &self,
        employee_id: &EmployeeId,
        reference_date: NaiveDate,
    ) -> Result<ComplianceAssessment, ComplianceError> {
        let employee = self
            .personnel
            .get_employee(employee_id)
            .await?
            .ok_or_else(|| ComplianceError::EmployeeNotFound(employee_id.clone()))?;
        let memberships = self.personnel.list_sgk_periods(employee_id).await?;
        let document = self.personnel.get_latest_hire_document(employee_id).await?;

        let assessment = derive_status(
            &employee,
            &memberships,
            document.as_ref(),
            reference_date,
            self.window_days,
        );
        debug!(
            %employee_id,
            status = assessment.status.label(),
            basis = ?assessment.basis,
            "compliance derived"
        );
        Ok(assessment)
    }

    pub async fn status(
        &self,
        employee_id: &EmployeeId,
        reference_date: NaiveDate,
    ) -> Result<ComplianceStatus, ComplianceError> {
        Ok(self.assess(employee_id, reference_date).await?.status)
    }

    pub async fn employee_status(
        &self,
        employee_id: &EmployeeId,
        reference_date: NaiveDate,
    ) -> Result<EmployeeStatus, ComplianceError> {
        let assessment = self.assess(employee_id, reference_date).await?;
        Ok(EmployeeStatus {
            employee_id: employee_id.clone(),
            status: assessment.status,
            basis: assessment.basis,
        })
    }

    /// Only TAM employees may pass the gate.
    pub async fn authorize_gate_entry(
        &self,
        employee_id: &EmployeeId,
        date: NaiveDate,
    ) -> Result<GateEntryDecision, ComplianceError> {
        let assessment = self.assess(employee_id, date).await?;
        let reason = match (assessment.status, assessment.basis) {
            (ComplianceStatus::Tam, ComplianceBasis::PeriodMembership) => format!(
                "declared on the SGK list for {}",
                assessment
                    .period_code
                    .map(|period| period.to_string())
                    .unwrap_or_default()
            ),
            (ComplianceStatus::Tam, ComplianceBasis::CachedPeriod) => {
                "active on the most recent SGK check".to_string()
            }
            (ComplianceStatus::Tam, _) => "recent hire notification on file".to_string(),
            (ComplianceStatus::OnayBekliyor, _) => {
                "hire notification is awaiting approval".to_string()
            }
            (ComplianceStatus::Eksik, ComplianceBasis::HireNotification) => {
                "hire notification is rejected or outdated".to_string()
            }
            (ComplianceStatus::Eksik, _) => "no SGK declaration or hire notification".to_string(),
        };

        Ok(GateEntryDecision {
            employee_id: employee_id.clone(),
            reference_date: date,
            status: assessment.status,
            allowed: assessment.status == ComplianceStatus::Tam,
            reason,
        })
    }
}
