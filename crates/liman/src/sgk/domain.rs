use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Document type of the hire notification filed with SGK.
pub const HIRE_NOTIFICATION: &str = "SGK_ISE_GIRIS";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(pub String);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not an 11-digit TC kimlik number")]
pub struct InvalidTcKimlik(pub String);

/// Turkish national identification number: exactly eleven ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TcKimlik(String);

impl TcKimlik {
    pub fn parse(raw: &str) -> Result<Self, InvalidTcKimlik> {
        let trimmed = raw.trim();
        if trimmed.len() == 11 && trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(InvalidTcKimlik(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TcKimlik {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TcKimlik {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TcKimlik::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("period code '{0}' must be YYYYMM with month 01-12")]
pub struct PeriodCodeError(pub String);

/// Calendar month label `YYYYMM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodCode {
    year: i32,
    month: u32,
}

impl PeriodCode {
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodCodeError> {
        if !(1..=12).contains(&month) || !(1000..=9999).contains(&year) {
            return Err(PeriodCodeError(format!("{year:04}{month:02}")));
        }
        Ok(Self { year, month })
    }

    /// Period a calendar day falls in.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }
}

impl FromStr for PeriodCode {
    type Err = PeriodCodeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.len() != 6 || !trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(PeriodCodeError(raw.to_string()));
        }
        let year = trimmed[..4]
            .parse::<i32>()
            .map_err(|_| PeriodCodeError(raw.to_string()))?;
        let month = trimmed[4..]
            .parse::<u32>()
            .map_err(|_| PeriodCodeError(raw.to_string()))?;
        PeriodCode::new(year, month).map_err(|_| PeriodCodeError(raw.to_string()))
    }
}

impl fmt::Display for PeriodCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl Serialize for PeriodCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PeriodCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Portal employee with the cached SGK fields refreshed by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub tenant_id: TenantId,
    pub full_name: String,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub tc_kimlik: Option<TcKimlik>,
    #[serde(default)]
    pub passport_no: Option<String>,
    pub active: bool,
    #[serde(default)]
    pub sgk_last_check_period: Option<PeriodCode>,
    #[serde(default)]
    pub sgk_is_active_last_period: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipSource {
    HizmetListesi,
    Manual,
}

/// Whether an employee was declared on the SGK list for a period. One row per
/// `(employee, period)`; rows are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SgkPeriodMembership {
    pub employee_id: EmployeeId,
    pub period_code: PeriodCode,
    pub active: bool,
    pub source: MembershipSource,
    pub updated_at: DateTime<Utc>,
}

/// Audit record of one ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SgkPeriodCheck {
    pub id: u64,
    pub tenant_id: TenantId,
    pub period_code: PeriodCode,
    pub storage_key: String,
    pub checksum: String,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
    pub matched_count: usize,
    pub missing_count: usize,
    pub extra_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeDocument {
    pub id: u64,
    pub employee_id: EmployeeId,
    pub document_type: String,
    /// `None` for legacy rows created before approval existed.
    pub status: Option<DocumentStatus>,
    pub uploaded_at: DateTime<Utc>,
    pub version: u32,
    pub is_latest_version: bool,
    pub previous_version_id: Option<u64>,
}

/// One identity extracted from a service-list PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRow {
    pub tc_no: TcKimlik,
    pub passport_no: Option<String>,
    /// Uppercased and normalized; empty when no usable name was found.
    pub full_name_raw: String,
    pub source_row_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceStatus {
    Tam,
    OnayBekliyor,
    Eksik,
}

impl ComplianceStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ComplianceStatus::Tam => "TAM",
            ComplianceStatus::OnayBekliyor => "ONAY_BEKLIYOR",
            ComplianceStatus::Eksik => "EKSIK",
        }
    }
}
