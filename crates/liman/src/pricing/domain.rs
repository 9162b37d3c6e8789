use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::fx::Currency;

/// Free-form inputs as they arrive from callers, keyed by input name.
pub type InputMap = Map<String, Value>;

/// A billable catalog entry (Hizmet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub service_code: String,
    pub name: String,
    pub base_price: Decimal,
    pub currency: Currency,
    /// Percent, e.g. `20` for 20%.
    pub vat_rate: Decimal,
    /// Kept as stored; parsed when the formula is evaluated.
    pub calculation_type: String,
    #[serde(default)]
    pub formula_params: Value,
    pub active: bool,
}

/// Date-versioned override of a service's price. `valid_to` is inclusive; `None` is open-ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffEntry {
    pub id: u64,
    pub service_code: String,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
    pub override_price: Option<Decimal>,
    pub override_currency: Option<Currency>,
    pub active: bool,
    #[serde(default)]
    pub version_note: Option<String>,
}

impl TariffEntry {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.valid_from <= date && self.valid_to.map_or(true, |until| until >= date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TariffSource {
    Inline,
    Override,
}

/// Price terms in force for a service on a date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTariff {
    pub service_code: String,
    pub service_name: String,
    pub unit_price: Decimal,
    pub currency: Currency,
    pub vat_rate: Decimal,
    pub calculation_type: String,
    pub formula_params: Value,
    pub source: TariffSource,
    pub tariff_entry_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalculationType {
    Fixed,
    PerUnit,
    XSecondary,
    PerBlock,
    BasePlusIncrement,
    #[serde(rename = "VEHICLE_4H_RULE")]
    Vehicle4hRule,
}

impl CalculationType {
    pub const ALL: [CalculationType; 6] = [
        CalculationType::Fixed,
        CalculationType::PerUnit,
        CalculationType::XSecondary,
        CalculationType::PerBlock,
        CalculationType::BasePlusIncrement,
        CalculationType::Vehicle4hRule,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            CalculationType::Fixed => "FIXED",
            CalculationType::PerUnit => "PER_UNIT",
            CalculationType::XSecondary => "X_SECONDARY",
            CalculationType::PerBlock => "PER_BLOCK",
            CalculationType::BasePlusIncrement => "BASE_PLUS_INCREMENT",
            CalculationType::Vehicle4hRule => "VEHICLE_4H_RULE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.code() == normalized)
    }
}

/// Caller options for a price calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingOptions {
    pub target_currency: Currency,
    pub apply_cabotage_discount: bool,
    /// Percent; the engine default applies when unset.
    pub cabotage_rate: Option<Decimal>,
}

impl Default for PricingOptions {
    fn default() -> Self {
        Self {
            target_currency: Currency::Try,
            apply_cabotage_discount: false,
            cabotage_rate: None,
        }
    }
}

/// A priced service line. Money fields carry four fractional digits, `fx_rate_used` six.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedResult {
    pub service_code: String,
    pub on_date: NaiveDate,
    pub calculation_type: CalculationType,
    pub tariff_source: TariffSource,
    pub native_currency: Currency,
    pub target_currency: Currency,
    pub subtotal_native: Decimal,
    pub fx_rate_used: Decimal,
    pub fx_effective_date: Option<NaiveDate>,
    pub subtotal_target: Decimal,
    pub discount_applied: bool,
    pub discount_rate: Decimal,
    pub discount_amount: Decimal,
    pub taxable_amount: Decimal,
    pub vat_rate: Decimal,
    pub vat_amount: Decimal,
    pub grand_total: Decimal,
    pub breakdown: BTreeMap<String, Decimal>,
    pub calculation_details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteLine {
    pub service_code: String,
    #[serde(default)]
    pub inputs: InputMap,
}

/// Several lines priced on the same date and options; totals are sums of the line figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedQuote {
    pub on_date: NaiveDate,
    pub currency: Currency,
    pub lines: Vec<PricedResult>,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub discounted_subtotal: Decimal,
    pub vat_amount: Decimal,
    pub grand_total: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calculation_types_parse_by_code() {
        assert_eq!(
            CalculationType::parse("vehicle_4h_rule"),
            Some(CalculationType::Vehicle4hRule)
        );
        assert_eq!(
            CalculationType::parse(" PER_BLOCK "),
            Some(CalculationType::PerBlock)
        );
        assert_eq!(CalculationType::parse("HOURLY"), None);
    }

    #[test]
    fn calculation_type_serializes_with_its_code() {
        for calc_type in CalculationType::ALL {
            let value = serde_json::to_value(calc_type).expect("serialize");
            assert_eq!(value, Value::String(calc_type.code().to_string()));
        }
    }

    #[test]
    fn valid_to_is_inclusive() {
        let entry = TariffEntry {
            id: 1,
            service_code: "BARINMA".into(),
            valid_from: NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date"),
            valid_to: NaiveDate::from_ymd_opt(2025, 6, 30),
            override_price: None,
            override_currency: None,
            active: true,
            version_note: None,
        };
        assert!(entry.covers(NaiveDate::from_ymd_opt(2025, 6, 30).expect("valid date")));
        assert!(!entry.covers(NaiveDate::from_ymd_opt(2025, 7, 1).expect("valid date")));
        assert!(!entry.covers(NaiveDate::from_ymd_opt(2024, 12, 31).expect("valid date")));
    }
}
