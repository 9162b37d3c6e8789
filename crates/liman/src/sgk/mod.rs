//! Monthly SGK service-list ingest: parse the uploaded PDF, reconcile it against the
//! tenant's roster and derive each employee's compliance status.

pub mod compliance;
pub mod domain;
pub mod parser;
pub mod reconcile;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use compliance::{
    derive_status, ComplianceAssessment, ComplianceBasis, ComplianceError, ComplianceService,
    EmployeeStatus, GateEntryDecision,
};
pub use domain::{
    ComplianceStatus, DocumentStatus, Employee, EmployeeDocument, EmployeeId, MembershipSource,
    ParsedRow, PeriodCode, PeriodCodeError, SgkPeriodCheck, SgkPeriodMembership, TcKimlik,
    TenantId, HIRE_NOTIFICATION,
};
pub use parser::{parse, parse_document, ParseOutcome, ParseStrategy};
pub use reconcile::{IngestAudit, ReconcileError, ReconcileReport, RosterMatch, SgkReconciler};
pub use repository::{PersonnelRepository, SgkTransaction};
pub use router::sgk_router;
pub use service::{SgkIngestError, SgkIngestOutcome, SgkIngestService, SgkUpload};
