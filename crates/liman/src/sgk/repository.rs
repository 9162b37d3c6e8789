use async_trait::async_trait;

use super::domain::{
    Employee, EmployeeDocument, EmployeeId, MembershipSource, PeriodCode, SgkPeriodCheck,
    SgkPeriodMembership, TenantId,
};
use crate::repository::RepositoryError;

/// Read side of the personnel store plus the entry point for reconcile transactions.
#[async_trait]
pub trait PersonnelRepository: Send + Sync {
    async fn list_employees(&self, tenant: &TenantId) -> Result<Vec<Employee>, RepositoryError>;

    async fn get_employee(&self, id: &EmployeeId) -> Result<Option<Employee>, RepositoryError>;

    async fn list_sgk_periods(
        &self,
        employee: &EmployeeId,
    ) -> Result<Vec<SgkPeriodMembership>, RepositoryError>;

    /// Latest version of the employee's hire notification, if any was uploaded.
    async fn get_latest_hire_document(
        &self,
        employee: &EmployeeId,
    ) -> Result<Option<EmployeeDocument>, RepositoryError>;

    async fn begin(&self) -> Result<Box<dyn SgkTransaction>, RepositoryError>;
}

/// Writes of one reconcile. Nothing is visible to readers before `commit`; dropping the
/// transaction without committing discards every write.
#[async_trait]
pub trait SgkTransaction: Send {
    async fn upsert_sgk_period(
        &mut self,
        employee: &EmployeeId,
        period: PeriodCode,
        active: bool,
        source: MembershipSource,
    ) -> Result<(), RepositoryError>;

    /// Set the employee's cached SGK fields, unless the stored period is already later than
    /// `period`. The comparison is made against the committed row when the write applies.
    async fn update_employee_sgk_cache(
        &mut self,
        employee: &EmployeeId,
        period: PeriodCode,
        active: bool,
    ) -> Result<(), RepositoryError>;

    /// Store the audit row; the returned record carries the assigned id.
    async fn create_sgk_period_check(
        &mut self,
        check: SgkPeriodCheck,
    ) -> Result<SgkPeriodCheck, RepositoryError>;

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}
