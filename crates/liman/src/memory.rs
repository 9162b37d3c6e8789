//! In-process implementations of the repository traits, used by the API service when no
//! database is configured and by the test suites.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use crate::fx::{Currency, FxQuote, FxQuoteStore};
use crate::pricing::{CatalogRepository, Service, TariffEntry};
use crate::repository::RepositoryError;
use crate::sgk::{
    Employee, EmployeeDocument, EmployeeId, MembershipSource, PeriodCode, PersonnelRepository,
    SgkPeriodCheck, SgkPeriodMembership, SgkTransaction, TenantId, HIRE_NOTIFICATION,
};

fn locked<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

#[derive(Debug, Default)]
pub struct MemoryFxStore {
    quotes: Mutex<HashMap<(Currency, NaiveDate), Vec<FxQuote>>>,
}

#[async_trait]
impl FxQuoteStore for MemoryFxStore {
    async fn get_fx_quote(
        &self,
        currency: Currency,
        date: NaiveDate,
    ) -> Result<Option<FxQuote>, RepositoryError> {
        let quotes = locked(&self.quotes)?;
        let latest = quotes.get(&(currency, date)).and_then(|rows| {
            rows.iter()
                .fold(None::<&FxQuote>, |best, row| match best {
                    Some(best) if best.fetched_at > row.fetched_at => Some(best),
                    _ => Some(row),
                })
                .cloned()
        });
        Ok(latest)
    }

    async fn put_fx_quote(&self, quote: FxQuote) -> Result<(), RepositoryError> {
        locked(&self.quotes)?
            .entry((quote.currency, quote.effective_date))
            .or_default()
            .push(quote);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    services: Mutex<BTreeMap<String, Service>>,
    entries: Mutex<Vec<TariffEntry>>,
}

impl MemoryCatalog {
    pub fn insert_service(&self, service: Service) -> Result<(), RepositoryError> {
        locked(&self.services)?.insert(service.service_code.clone(), service);
        Ok(())
    }

    pub fn insert_tariff_entry(&self, entry: TariffEntry) -> Result<(), RepositoryError> {
        let mut entries = locked(&self.entries)?;
        if entries.iter().any(|existing| existing.id == entry.id) {
            return Err(RepositoryError::Conflict);
        }
        entries.push(entry);
        Ok(())
    }

    pub fn services(&self) -> Result<Vec<Service>, RepositoryError> {
        Ok(locked(&self.services)?.values().cloned().collect())
    }
}

#[async_trait]
impl CatalogRepository for MemoryCatalog {
    async fn get_service(&self, code: &str) -> Result<Option<Service>, RepositoryError> {
        Ok(locked(&self.services)?.get(code).cloned())
    }

    async fn find_tariff_entries(
        &self,
        service_code: &str,
        on_date: NaiveDate,
    ) -> Result<Vec<TariffEntry>, RepositoryError> {
        Ok(locked(&self.entries)?
            .iter()
            .filter(|entry| entry.service_code == service_code && entry.covers(on_date))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
struct PersonnelState {
    employees: BTreeMap<EmployeeId, Employee>,
    memberships: BTreeMap<(EmployeeId, PeriodCode), SgkPeriodMembership>,
    documents: Vec<EmployeeDocument>,
    checks: Vec<SgkPeriodCheck>,
}

/// Personnel store whose transactions buffer writes and apply them atomically on commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersonnel {
    state: Arc<Mutex<PersonnelState>>,
    next_check_id: Arc<AtomicU64>,
    fail_commits: Arc<AtomicBool>,
    commit_delay: Duration,
    commits_in_flight: Arc<AtomicUsize>,
    peak_commits: Arc<AtomicUsize>,
}

impl MemoryPersonnel {
    /// Sleep before applying each commit.
    pub fn with_commit_delay(mut self, delay: Duration) -> Self {
        self.commit_delay = delay;
        self
    }

    /// Make every subsequent commit fail with `Unavailable`.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Highest number of commits that were applying at the same time.
    pub fn peak_concurrent_commits(&self) -> usize {
        self.peak_commits.load(Ordering::SeqCst)
    }

    pub fn insert_employee(&self, employee: Employee) -> Result<(), RepositoryError> {
        locked(&self.state)?
            .employees
            .insert(employee.id.clone(), employee);
        Ok(())
    }

    pub fn insert_document(&self, document: EmployeeDocument) -> Result<(), RepositoryError> {
        locked(&self.state)?.documents.push(document);
        Ok(())
    }

    pub fn memberships(&self) -> Result<Vec<SgkPeriodMembership>, RepositoryError> {
        Ok(locked(&self.state)?.memberships.values().cloned().collect())
    }

    pub fn period_checks(&self) -> Result<Vec<SgkPeriodCheck>, RepositoryError> {
        Ok(locked(&self.state)?.checks.clone())
    }

    pub fn employee(&self, id: &EmployeeId) -> Result<Option<Employee>, RepositoryError> {
        Ok(locked(&self.state)?.employees.get(id).cloned())
    }
}

#[async_trait]
impl PersonnelRepository for MemoryPersonnel {
    async fn list_employees(&self, tenant: &TenantId) -> Result<Vec<Employee>, RepositoryError> {
        Ok(locked(&self.state)?
            .employees
            .values()
            .filter(|employee| &employee.tenant_id == tenant)
            .cloned()
            .collect())
    }

    async fn get_employee(&self, id: &EmployeeId) -> Result<Option<Employee>, RepositoryError> {
        self.employee(id)
    }

    async fn list_sgk_periods(
        &self,
        employee: &EmployeeId,
    ) -> Result<Vec<SgkPeriodMembership>, RepositoryError> {
        Ok(locked(&self.state)?
            .memberships
            .values()
            .filter(|membership| &membership.employee_id == employee)
            .cloned()
            .collect())
    }

    async fn get_latest_hire_document(
        &self,
        employee: &EmployeeId,
    ) -> Result<Option<EmployeeDocument>, RepositoryError> {
        Ok(locked(&self.state)?
            .documents
            .iter()
            .filter(|document| {
                &document.employee_id == employee
                    && document.document_type == HIRE_NOTIFICATION
                    && document.is_latest_version
            })
            .max_by_key(|document| document.version)
            .cloned())
    }

    async fn begin(&self) -> Result<Box<dyn SgkTransaction>, RepositoryError> {
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            writes: Vec::new(),
        }))
    }
}

#[derive(Debug)]
enum PendingWrite {
    Membership {
        employee: EmployeeId,
        period: PeriodCode,
        active: bool,
        source: MembershipSource,
    },
    Cache {
        employee: EmployeeId,
        period: PeriodCode,
        active: bool,
    },
    Check(SgkPeriodCheck),
}

struct MemoryTransaction {
    store: MemoryPersonnel,
    writes: Vec<PendingWrite>,
}

#[async_trait]
impl SgkTransaction for MemoryTransaction {
    async fn upsert_sgk_period(
        &mut self,
        employee: &EmployeeId,
        period: PeriodCode,
        active: bool,
        source: MembershipSource,
    ) -> Result<(), RepositoryError> {
        self.writes.push(PendingWrite::Membership {
            employee: employee.clone(),
            period,
            active,
            source,
        });
        Ok(())
    }

    async fn update_employee_sgk_cache(
        &mut self,
        employee: &EmployeeId,
        period: PeriodCode,
        active: bool,
    ) -> Result<(), RepositoryError> {
        self.writes.push(PendingWrite::Cache {
            employee: employee.clone(),
            period,
            active,
        });
        Ok(())
    }

    async fn create_sgk_period_check(
        &mut self,
        mut check: SgkPeriodCheck,
    ) -> Result<SgkPeriodCheck, RepositoryError> {
        check.id = self.store.next_check_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.writes.push(PendingWrite::Check(check.clone()));
        Ok(check)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let _in_flight = InFlight::enter(&self.store);
        self.apply().await
    }
}

struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(store: &MemoryPersonnel) -> Self {
        let now = store.commits_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        store.peak_commits.fetch_max(now, Ordering::SeqCst);
        Self(store.commits_in_flight.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryTransaction {
    async fn apply(self) -> Result<(), RepositoryError> {
        if !self.store.commit_delay.is_zero() {
            tokio::time::sleep(self.store.commit_delay).await;
        }
        if self.store.fail_commits.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "commit rejected by store".to_string(),
            ));
        }

        let now = Utc::now();
        let mut state = locked(&self.store.state)?;
        for write in self.writes {
            match write {
                PendingWrite::Membership {
                    employee,
                    period,
                    active,
                    source,
                } => {
                    let key = (employee.clone(), period);
                    let unchanged = state
                        .memberships
                        .get(&key)
                        .is_some_and(|row| row.active == active && row.source == source);
                    if !unchanged {
                        state.memberships.insert(
                            key,
                            SgkPeriodMembership {
                                employee_id: employee,
                                period_code: period,
                                active,
                                source,
                                updated_at: now,
                            },
                        );
                    }
                }
                PendingWrite::Cache {
                    employee,
                    period,
                    active,
                } => {
                    let Some(row) = state.employees.get_mut(&employee) else {
                        continue;
                    };
                    if row.sgk_last_check_period.is_some_and(|cached| cached > period) {
                        debug!(
                            employee_id = %employee,
                            %period,
                            "older period reconciled; cached sgk fields left as they are"
                        );
                        continue;
                    }
                    row.sgk_last_check_period = Some(period);
                    row.sgk_is_active_last_period = Some(active);
                }
                PendingWrite::Check(check) => state.checks.push(check),
            }
        }
        Ok(())
    }
}
