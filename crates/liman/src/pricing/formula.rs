//! The six calculation formulas. Evaluation is pure: no I/O, no clock, and the same
//! arguments always produce the same subtotal and breakdown.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::domain::{CalculationType, InputMap};
use crate::error::ErrorKind;
use crate::money::{decimal_from_json, round_rate};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormulaError {
    #[error("required input '{0}' is missing")]
    InputMissing(String),
    #[error("input '{name}' is out of range: {reason}")]
    InputDomain { name: String, reason: String },
    #[error("unknown calculation type '{0}'")]
    UnknownCalcType(String),
    #[error("formula parameter '{name}' is invalid: {reason}")]
    ParamsInvalid { name: &'static str, reason: String },
    #[error("arithmetic overflow while evaluating {0}")]
    Overflow(&'static str),
}

impl FormulaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FormulaError::InputMissing(_) => ErrorKind::InputMissing,
            FormulaError::InputDomain { .. } | FormulaError::Overflow(_) => ErrorKind::InputDomain,
            FormulaError::UnknownCalcType(_) => ErrorKind::CalcTypeUnknown,
            FormulaError::ParamsInvalid { .. } => ErrorKind::FormulaParamsInvalid,
        }
    }
}

pub fn parse_calculation_type(raw: &str) -> Result<CalculationType, FormulaError> {
    CalculationType::parse(raw).ok_or_else(|| FormulaError::UnknownCalcType(raw.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundingMode {
    #[default]
    Ceil,
    Floor,
    Round,
}

impl RoundingMode {
    fn apply(self, value: Decimal) -> Decimal {
        match self {
            RoundingMode::Ceil => value.ceil(),
            RoundingMode::Floor => value.floor(),
            RoundingMode::Round => value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
        }
    }
}

/// Typed view of a service's formula parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormulaParams {
    pub base_minutes: Decimal,
    pub base_weight_ton: Option<Decimal>,
    pub base_time_min: Option<Decimal>,
    pub increment_rate: Option<Decimal>,
    pub rounding: RoundingMode,
    pub primary_input: String,
    pub secondary_input: String,
}

impl Default for FormulaParams {
    fn default() -> Self {
        Self {
            base_minutes: Decimal::from(240),
            base_weight_ton: None,
            base_time_min: None,
            increment_rate: None,
            rounding: RoundingMode::Ceil,
            primary_input: "quantity".to_string(),
            secondary_input: "days".to_string(),
        }
    }
}

impl FormulaParams {
    /// Read parameters from the stored JSON object. `null` and `{}` yield the defaults.
    pub fn from_value(value: &Value) -> Result<Self, FormulaError> {
        let mut params = Self::default();
        let object = match value {
            Value::Null => return Ok(params),
            Value::Object(object) => object,
            _ => {
                return Err(FormulaError::ParamsInvalid {
                    name: "formula_params",
                    reason: "expected an object".into(),
                })
            }
        };

        if let Some(minutes) = param_decimal(object.get("base_minutes"), "base_minutes")? {
            params.base_minutes = minutes;
        }
        params.base_weight_ton = param_decimal(object.get("base_weight_ton"), "base_weight_ton")?;
        params.base_time_min = param_decimal(object.get("base_time_min"), "base_time_min")?;
        params.increment_rate = param_decimal(object.get("increment_rate"), "increment_rate")?;

        if let Some(raw) = param_str(object.get("rounding"), "rounding")? {
            params.rounding = match raw.to_ascii_lowercase().as_str() {
                "ceil" => RoundingMode::Ceil,
                "floor" => RoundingMode::Floor,
                "round" => RoundingMode::Round,
                other => {
                    return Err(FormulaError::ParamsInvalid {
                        name: "rounding",
                        reason: format!("unsupported mode '{other}'"),
                    })
                }
            };
        }
        if let Some(name) = param_str(object.get("primary_input"), "primary_input")? {
            params.primary_input = name;
        }
        if let Some(name) = param_str(object.get("secondary_input"), "secondary_input")? {
            params.secondary_input = name;
        }

        Ok(params)
    }

    fn positive(value: Option<Decimal>, name: &'static str) -> Result<Decimal, FormulaError> {
        match value {
            Some(value) if value > Decimal::ZERO => Ok(value),
            Some(value) => Err(FormulaError::ParamsInvalid {
                name,
                reason: format!("must be positive, got {value}"),
            }),
            None => Err(FormulaError::ParamsInvalid {
                name,
                reason: "missing".into(),
            }),
        }
    }
}

fn param_decimal(value: Option<&Value>, name: &'static str) -> Result<Option<Decimal>, FormulaError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => decimal_from_json(raw)
            .map(Some)
            .ok_or_else(|| FormulaError::ParamsInvalid {
                name,
                reason: format!("not a number: {raw}"),
            }),
    }
}

fn param_str(value: Option<&Value>, name: &'static str) -> Result<Option<String>, FormulaError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) if !raw.trim().is_empty() => Ok(Some(raw.trim().to_string())),
        Some(other) => Err(FormulaError::ParamsInvalid {
            name,
            reason: format!("expected a non-empty string, got {other}"),
        }),
    }
}

/// Inputs for one calculation type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormulaInputs {
    Fixed,
    PerUnit { quantity: Decimal },
    XSecondary { primary: Decimal, secondary: Decimal },
    PerBlock { weight: Decimal, minutes: Decimal },
    BasePlusIncrement { grt: Decimal },
    #[serde(rename = "VEHICLE_4H_RULE")]
    Vehicle4hRule { minutes: Decimal },
}

impl FormulaInputs {
    /// Validate a free-form input map against the inputs `calc_type` requires. Extra keys are
    /// ignored.
    pub fn from_map(
        calc_type: CalculationType,
        params: &FormulaParams,
        inputs: &InputMap,
    ) -> Result<Self, FormulaError> {
        Ok(match calc_type {
            CalculationType::Fixed => FormulaInputs::Fixed,
            CalculationType::PerUnit => FormulaInputs::PerUnit {
                quantity: required(inputs, "quantity")?,
            },
            CalculationType::XSecondary => FormulaInputs::XSecondary {
                primary: required(inputs, &params.primary_input)?,
                secondary: required(inputs, &params.secondary_input)?,
            },
            CalculationType::PerBlock => FormulaInputs::PerBlock {
                weight: required(inputs, "weight")?,
                minutes: required(inputs, "minutes")?,
            },
            CalculationType::BasePlusIncrement => FormulaInputs::BasePlusIncrement {
                grt: required(inputs, "grt")?,
            },
            CalculationType::Vehicle4hRule => FormulaInputs::Vehicle4hRule {
                minutes: required(inputs, "minutes")?,
            },
        })
    }

    pub fn calculation_type(&self) -> CalculationType {
        match self {
            FormulaInputs::Fixed => CalculationType::Fixed,
            FormulaInputs::PerUnit { .. } => CalculationType::PerUnit,
            FormulaInputs::XSecondary { .. } => CalculationType::XSecondary,
            FormulaInputs::PerBlock { .. } => CalculationType::PerBlock,
            FormulaInputs::BasePlusIncrement { .. } => CalculationType::BasePlusIncrement,
            FormulaInputs::Vehicle4hRule { .. } => CalculationType::Vehicle4hRule,
        }
    }
}

fn required(inputs: &InputMap, name: &str) -> Result<Decimal, FormulaError> {
    match inputs.get(name) {
        None | Some(Value::Null) => Err(FormulaError::InputMissing(name.to_string())),
        Some(raw) => decimal_from_json(raw).ok_or_else(|| FormulaError::InputDomain {
            name: name.to_string(),
            reason: format!("not a finite number: {raw}"),
        }),
    }
}

/// Subtotal in the service currency, at full precision, plus the intermediate values that
/// produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub calculation_type: CalculationType,
    pub subtotal: Decimal,
    pub breakdown: BTreeMap<String, Decimal>,
}

impl Evaluation {
    fn value(&self, key: &str) -> Decimal {
        self.breakdown.get(key).copied().unwrap_or_default()
    }

    /// One-line derivation such as `80.0000 USD x 1.666667 w_blocks x 2 t_blocks`.
    pub fn describe(&self, currency: &str, params: &FormulaParams) -> String {
        let base = format!("{:.4} {currency}", self.value("base_price"));
        match self.calculation_type {
            CalculationType::Fixed => base,
            CalculationType::PerUnit => format!("{base} x {} quantity", self.value("quantity")),
            CalculationType::XSecondary => format!(
                "{base} x {} {} x {} {}",
                self.value("primary"),
                params.primary_input,
                self.value("secondary_rounded"),
                params.secondary_input
            ),
            CalculationType::PerBlock => format!(
                "{base} x {} w_blocks x {} t_blocks",
                self.value("w_blocks"),
                self.value("t_blocks")
            ),
            CalculationType::BasePlusIncrement => format!(
                "{base} + {} grt x {}",
                self.value("grt"),
                self.value("increment_rate")
            ),
            CalculationType::Vehicle4hRule => format!(
                "{base} + {} min x {}",
                self.value("extra_minutes"),
                self.value("per_minute_rate")
            ),
        }
    }
}

/// Evaluate `calc_type` on `inputs`. The inputs variant must belong to `calc_type`.
pub fn evaluate(
    calc_type: CalculationType,
    base_price: Decimal,
    params: &FormulaParams,
    inputs: &FormulaInputs,
) -> Result<Evaluation, FormulaError> {
    if inputs.calculation_type() != calc_type {
        return Err(FormulaError::InputMissing(format!(
            "inputs for {}",
            calc_type.code()
        )));
    }

    let mut breakdown = Breakdown::new(base_price);
    let subtotal = match *inputs {
        FormulaInputs::Fixed => base_price,
        FormulaInputs::PerUnit { quantity } => {
            non_negative("quantity", quantity)?;
            breakdown.put("quantity", quantity);
            mul(base_price, quantity, "PER_UNIT")?
        }
        FormulaInputs::XSecondary { primary, secondary } => {
            non_negative(&params.primary_input, primary)?;
            non_negative(&params.secondary_input, secondary)?;
            let secondary_rounded = params.rounding.apply(secondary);
            breakdown.put("primary", primary);
            breakdown.put("secondary", secondary);
            breakdown.put("secondary_rounded", secondary_rounded);
            mul(mul(base_price, primary, "X_SECONDARY")?, secondary_rounded, "X_SECONDARY")?
        }
        FormulaInputs::PerBlock { weight, minutes } => {
            non_negative("weight", weight)?;
            non_negative("minutes", minutes)?;
            let base_weight_ton = FormulaParams::positive(params.base_weight_ton, "base_weight_ton")?;
            let base_time_min = FormulaParams::positive(params.base_time_min, "base_time_min")?;
            let w_blocks = div(weight, base_weight_ton, "PER_BLOCK")?;
            let t_blocks = div(minutes, base_time_min, "PER_BLOCK")?.ceil();
            breakdown.put("weight", weight);
            breakdown.put("minutes", minutes);
            breakdown.put("base_weight_ton", base_weight_ton);
            breakdown.put("base_time_min", base_time_min);
            breakdown.put("w_blocks", w_blocks);
            breakdown.put("t_blocks", t_blocks);
            mul(mul(base_price, w_blocks, "PER_BLOCK")?, t_blocks, "PER_BLOCK")?
        }
        FormulaInputs::BasePlusIncrement { grt } => {
            non_negative("grt", grt)?;
            let increment_rate = FormulaParams::positive(params.increment_rate, "increment_rate")?;
            let extra = mul(grt, increment_rate, "BASE_PLUS_INCREMENT")?;
            breakdown.put("grt", grt);
            breakdown.put("increment_rate", increment_rate);
            breakdown.put("base_component", base_price);
            breakdown.put("extra_component", extra);
            add(base_price, extra, "BASE_PLUS_INCREMENT")?
        }
        FormulaInputs::Vehicle4hRule { minutes } => {
            non_negative("minutes", minutes)?;
            let base_minutes = FormulaParams::positive(Some(params.base_minutes), "base_minutes")?;
            let per_minute_rate = div(base_price, base_minutes, "VEHICLE_4H_RULE")?;
            let extra_minutes = (minutes - base_minutes).max(Decimal::ZERO);
            let extra = mul(extra_minutes, per_minute_rate, "VEHICLE_4H_RULE")?;
            breakdown.put("minutes", minutes);
            breakdown.put("base_minutes", base_minutes);
            breakdown.put("extra_minutes", extra_minutes);
            breakdown.put("per_minute_rate", per_minute_rate);
            breakdown.put("base_component", base_price);
            breakdown.put("extra_component", extra);
            add(base_price, extra, "VEHICLE_4H_RULE")?
        }
    };

    Ok(Evaluation {
        calculation_type: calc_type,
        subtotal,
        breakdown: breakdown.into_inner(),
    })
}

/// Breakdown values are reported with six fractional digits at most.
struct Breakdown(BTreeMap<String, Decimal>);

impl Breakdown {
    fn new(base_price: Decimal) -> Self {
        let mut map = BTreeMap::new();
        map.insert("base_price".to_string(), base_price);
        Self(map)
    }

    fn put(&mut self, key: &str, value: Decimal) {
        self.0.insert(key.to_string(), round_rate(value).normalize());
    }

    fn into_inner(self) -> BTreeMap<String, Decimal> {
        self.0
    }
}

fn non_negative(name: &str, value: Decimal) -> Result<(), FormulaError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(FormulaError::InputDomain {
            name: name.to_string(),
            reason: format!("must not be negative, got {value}"),
        });
    }
    Ok(())
}

fn mul(left: Decimal, right: Decimal, step: &'static str) -> Result<Decimal, FormulaError> {
    left.checked_mul(right).ok_or(FormulaError::Overflow(step))
}

fn div(left: Decimal, right: Decimal, step: &'static str) -> Result<Decimal, FormulaError> {
    left.checked_div(right).ok_or(FormulaError::Overflow(step))
}

fn add(left: Decimal, right: Decimal, step: &'static str) -> Result<Decimal, FormulaError> {
    left.checked_add(right).ok_or(FormulaError::Overflow(step))
}
