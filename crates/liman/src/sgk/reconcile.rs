use chrono::Utc;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use super::domain::{
    Employee, EmployeeId, MembershipSource, ParsedRow, PeriodCode, SgkPeriodCheck, TcKimlik,
    TenantId,
};
use super::repository::PersonnelRepository;
use crate::deadline::{Deadline, DeadlineExceeded};
use crate::error::ErrorKind;
use crate::repository::RepositoryError;
use crate::sync::KeyedMutex;
use crate::telemetry::SGK_RECONCILES;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Deadline(#[from] DeadlineExceeded),
}

impl ReconcileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconcileError::Repository(err) => err.kind(),
            ReconcileError::Deadline(_) => ErrorKind::DeadlineExceeded,
        }
    }
}

/// Where the reconciled list came from, recorded on the audit row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestAudit {
    pub storage_key: String,
    pub checksum: String,
    pub uploaded_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterMatch {
    pub employee_id: EmployeeId,
    pub tc_no: TcKimlik,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub tenant_id: TenantId,
    pub period_code: PeriodCode,
    pub rows_parsed: usize,
    /// On the roster and on the list.
    pub matched: Vec<RosterMatch>,
    /// On the roster, absent from the list.
    pub missing: Vec<RosterMatch>,
    /// On the list, not on the roster.
    pub extra: Vec<ParsedRow>,
    pub matched_count: usize,
    pub missing_count: usize,
    pub extra_count: usize,
    pub pdf_unreadable: bool,
    pub warnings: Vec<String>,
    pub period_check_id: Option<u64>,
}

impl ReconcileReport {
    /// Report for an upload that produced no rows; nothing was written.
    pub fn empty(tenant_id: TenantId, period_code: PeriodCode, pdf_unreadable: bool) -> Self {
        let warning = if pdf_unreadable {
            "PDF_UNREADABLE: the upload could not be read as a PDF"
        } else {
            "no TC numbers could be extracted from the upload"
        };
        Self {
            tenant_id,
            period_code,
            rows_parsed: 0,
            matched: Vec::new(),
            missing: Vec::new(),
            extra: Vec::new(),
            matched_count: 0,
            missing_count: 0,
            extra_count: 0,
            pdf_unreadable,
            warnings: vec![warning.to_string()],
            period_check_id: None,
        }
    }

    /// Employees whose period membership was written by this reconcile.
    pub fn affected_employees(&self) -> impl Iterator<Item = &RosterMatch> {
        self.matched.iter().chain(self.missing.iter())
    }
}

/// Matches parsed identities against a tenant's roster and records the period outcome in
/// one transaction. Reconciles of the same `(tenant, period)` run one at a time.
pub struct SgkReconciler {
    personnel: Arc<dyn PersonnelRepository>,
    locks: KeyedMutex<(TenantId, PeriodCode)>,
}

impl SgkReconciler {
    pub fn new(personnel: Arc<dyn PersonnelRepository>) -> Self {
        Self {
            personnel,
            locks: KeyedMutex::new(),
        }
    }

    pub async fn reconcile(
        &self,
        tenant: &TenantId,
        period: PeriodCode,
        rows: &[ParsedRow],
        audit: &IngestAudit,
        deadline: Deadline,
    ) -> Result<ReconcileReport, ReconcileError> {
        deadline
            .run(async {
                let _serialized = self.locks.lock((tenant.clone(), period)).await;
                self.reconcile_locked(tenant, period, rows, audit).await
            })
            .await?
    }

    async fn reconcile_locked(
        &self,
        tenant: &TenantId,
        period: PeriodCode,
        rows: &[ParsedRow],
        audit: &IngestAudit,
    ) -> Result<ReconcileReport, ReconcileError> {
        let employees = self.personnel.list_employees(tenant).await?;
        let mut warnings = Vec::new();
        let roster = Roster::build(&employees, &mut warnings);

        let mut seen: HashSet<&TcKimlik> = HashSet::new();
        let mut matched = Vec::new();
        let mut extra = Vec::new();
        for row in rows {
            if !seen.insert(&row.tc_no) {
                continue;
            }
            if row.full_name_raw.is_empty() {
                warnings.push(format!(
                    "row {} ({}) has no readable name",
                    row.source_row_index, row.tc_no
                ));
            }
            match roster.by_tc.get(&row.tc_no) {
                Some(employee) => matched.push(roster_match(employee, &row.tc_no)),
                None => extra.push(row.clone()),
            }
        }

        let missing: Vec<RosterMatch> = roster
            .ordered
            .iter()
            .filter_map(|(tc, employee)| {
                (!seen.contains(tc)).then(|| roster_match(employee, tc))
            })
            .collect();

        let mut transaction = self.personnel.begin().await?;
        for (entry, active) in matched
            .iter()
            .map(|entry| (entry, true))
            .chain(missing.iter().map(|entry| (entry, false)))
        {
            transaction
                .upsert_sgk_period(
                    &entry.employee_id,
                    period,
                    active,
                    MembershipSource::HizmetListesi,
                )
                .await?;

            transaction
                .update_employee_sgk_cache(&entry.employee_id, period, active)
                .await?;
        }

        let check = transaction
            .create_sgk_period_check(SgkPeriodCheck {
                id: 0,
                tenant_id: tenant.clone(),
                period_code: period,
                storage_key: audit.storage_key.clone(),
                checksum: audit.checksum.clone(),
                uploaded_by: audit.uploaded_by.clone(),
                uploaded_at: Utc::now(),
                matched_count: matched.len(),
                missing_count: missing.len(),
                extra_count: extra.len(),
            })
            .await?;
        transaction.commit().await?;

        metrics::counter!(SGK_RECONCILES).increment(1);
        info!(
            tenant_id = %tenant,
            %period,
            matched = matched.len(),
            missing = missing.len(),
            extra = extra.len(),
            "sgk period reconciled"
        );

        Ok(ReconcileReport {
            tenant_id: tenant.clone(),
            period_code: period,
            rows_parsed: rows.len(),
            matched_count: matched.len(),
            missing_count: missing.len(),
            extra_count: extra.len(),
            matched,
            missing,
            extra,
            pdf_unreadable: false,
            warnings,
            period_check_id: Some(check.id),
        })
    }
}

struct Roster<'a> {
    by_tc: HashMap<&'a TcKimlik, &'a Employee>,
    /// Roster order, one entry per TC.
    ordered: Vec<(&'a TcKimlik, &'a Employee)>,
}

impl<'a> Roster<'a> {
    /// Active employees matchable by TC. Passport-only employees are left out.
    fn build(employees: &'a [Employee], warnings: &mut Vec<String>) -> Self {
        let mut by_tc = HashMap::new();
        let mut ordered = Vec::new();

        for employee in employees.iter().filter(|employee| employee.active) {
            let Some(tc) = employee.tc_kimlik.as_ref() else {
                continue;
            };
            if by_tc.contains_key(tc) {
                warn!(employee_id = %employee.id, "duplicate TC number on roster");
                warnings.push(format!(
                    "TC {tc} is held by more than one employee; {} was not matched",
                    employee.id
                ));
                continue;
            }
            by_tc.insert(tc, employee);
            ordered.push((tc, employee));
        }

        Self { by_tc, ordered }
    }
}

fn roster_match(employee: &Employee, tc: &TcKimlik) -> RosterMatch {
    RosterMatch {
        employee_id: employee.id.clone(),
        tc_no: tc.clone(),
        full_name: employee.full_name.clone(),
    }
}
