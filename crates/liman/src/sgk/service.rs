use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use super::compliance::{ComplianceError, ComplianceService, EmployeeStatus};
use super::domain::{PeriodCode, TenantId};
use super::parser::{self, ParseCancelled, ParseOutcome, ParseStrategy};
use super::reconcile::{IngestAudit, ReconcileError, ReconcileReport, SgkReconciler};
use super::repository::PersonnelRepository;
use crate::deadline::{Deadline, DeadlineExceeded};
use crate::error::ErrorKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SgkIngestError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error(transparent)]
    Compliance(#[from] ComplianceError),
    #[error(transparent)]
    Deadline(#[from] DeadlineExceeded),
}

impl SgkIngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SgkIngestError::Reconcile(err) => err.kind(),
            SgkIngestError::Compliance(err) => err.kind(),
            SgkIngestError::Deadline(_) => ErrorKind::DeadlineExceeded,
        }
    }
}

impl From<ParseCancelled> for SgkIngestError {
    fn from(_: ParseCancelled) -> Self {
        SgkIngestError::Deadline(DeadlineExceeded)
    }
}

/// One uploaded monthly service list.
#[derive(Debug, Clone)]
pub struct SgkUpload {
    pub tenant_id: TenantId,
    pub period_code: PeriodCode,
    pub uploaded_by: String,
    pub bytes: Vec<u8>,
    /// Date the per-employee statuses are derived for; today when absent.
    pub reference_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SgkIngestOutcome {
    pub checksum: String,
    pub storage_key: String,
    pub strategy: ParseStrategy,
    pub pages: usize,
    pub report: ReconcileReport,
    pub statuses: Vec<EmployeeStatus>,
}

pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn storage_key(tenant: &TenantId, period: PeriodCode, checksum: &str) -> String {
    format!("sgk/{tenant}/{period}/{checksum}.pdf")
}

/// Raises the parser's cancel flag when the awaiting future is dropped.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Parse, reconcile and re-derive compliance for one upload.
pub struct SgkIngestService {
    reconciler: SgkReconciler,
    compliance: ComplianceService,
}

impl SgkIngestService {
    pub fn new(personnel: Arc<dyn PersonnelRepository>, window_days: i64) -> Self {
        Self {
            reconciler: SgkReconciler::new(personnel.clone()),
            compliance: ComplianceService::new(personnel).with_window_days(window_days),
        }
    }

    pub fn compliance(&self) -> &ComplianceService {
        &self.compliance
    }

    pub async fn ingest(
        &self,
        upload: SgkUpload,
        deadline: Deadline,
    ) -> Result<SgkIngestOutcome, SgkIngestError> {
        let SgkUpload {
            tenant_id,
            period_code,
            uploaded_by,
            bytes,
            reference_date,
        } = upload;
        let checksum = checksum(&bytes);
        let storage_key = storage_key(&tenant_id, period_code, &checksum);

        let parsed = deadline.run(parse_off_thread(bytes, period_code)).await??;
        let strategy = parsed.strategy;
        let pages = parsed.pages;

        if parsed.rows.is_empty() {
            warn!(
                tenant_id = %tenant_id,
                period = %period_code,
                pdf_unreadable = parsed.pdf_unreadable,
                "sgk upload produced no rows; nothing recorded"
            );
            return Ok(SgkIngestOutcome {
                checksum,
                storage_key,
                strategy,
                pages,
                report: ReconcileReport::empty(tenant_id, period_code, parsed.pdf_unreadable),
                statuses: Vec::new(),
            });
        }

        let audit = IngestAudit {
            storage_key: storage_key.clone(),
            checksum: checksum.clone(),
            uploaded_by,
        };
        let mut report = self
            .reconciler
            .reconcile(&tenant_id, period_code, &parsed.rows, &audit, deadline)
            .await?;
        if parsed.duplicate_rows > 0 {
            report.warnings.push(format!(
                "{} duplicate rows in the upload were skipped",
                parsed.duplicate_rows
            ));
        }

        let reference_date = reference_date.unwrap_or_else(|| Utc::now().date_naive());
        let statuses = deadline
            .run(async {
                let mut statuses = Vec::with_capacity(report.matched_count + report.missing_count);
                for entry in report.affected_employees() {
                    statuses.push(
                        self.compliance
                            .employee_status(&entry.employee_id, reference_date)
                            .await?,
                    );
                }
                Ok::<_, ComplianceError>(statuses)
            })
            .await??;

        info!(
            tenant_id = %tenant_id,
            period = %period_code,
            strategy = ?strategy,
            statuses = statuses.len(),
            "sgk upload ingested"
        );
        Ok(SgkIngestOutcome {
            checksum,
            storage_key,
            strategy,
            pages,
            report,
            statuses,
        })
    }
}

/// Parse on the blocking pool. Dropping the returned future stops the parser at its next
/// page boundary.
async fn parse_off_thread(
    bytes: Vec<u8>,
    period: PeriodCode,
) -> Result<ParseOutcome, ParseCancelled> {
    let cancel = Arc::new(AtomicBool::new(false));
    let guard = CancelOnDrop(cancel.clone());
    let joined = tokio::task::spawn_blocking(move || {
        parser::parse_document(&bytes, period, &cancel)
    })
    .await;
    drop(guard);

    match joined {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(%period, error = %err, "pdf parser worker failed");
            Ok(ParseOutcome::unreadable())
        }
    }
}
