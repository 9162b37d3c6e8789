use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use super::common::*;
use crate::error::ErrorKind;
use crate::pricing::{evaluate, CalculationType, FormulaError, FormulaInputs, FormulaParams};

fn params(value: serde_json::Value) -> FormulaParams {
    FormulaParams::from_value(&value).expect("valid params")
}

fn per_unit(quantity: Decimal) -> Decimal {
    evaluate(
        CalculationType::PerUnit,
        dec!(25.50),
        &FormulaParams::default(),
        &FormulaInputs::PerUnit { quantity },
    )
    .expect("evaluates")
    .subtotal
}

#[test]
fn per_unit_is_additive_in_quantity() {
    for (left, right) in [(dec!(1), dec!(4)), (dec!(0.25), dec!(7.125)), (dec!(0), dec!(3))] {
        assert_eq!(per_unit(left + right), per_unit(left) + per_unit(right));
    }
}

#[test]
fn evaluation_is_deterministic() {
    let params = params(json!({ "base_weight_ton": 3, "base_time_min": 30 }));
    let inputs = FormulaInputs::PerBlock {
        weight: dec!(5),
        minutes: dec!(45),
    };
    let first = evaluate(CalculationType::PerBlock, dec!(80), &params, &inputs).expect("evaluates");
    let second = evaluate(CalculationType::PerBlock, dec!(80), &params, &inputs).expect("evaluates");
    assert_eq!(first, second);
}

#[test]
fn per_block_counts_started_time_blocks() {
    let params = params(json!({ "base_weight_ton": 3, "base_time_min": 30 }));
    let blocks = |minutes: Decimal| {
        evaluate(
            CalculationType::PerBlock,
            dec!(80),
            &params,
            &FormulaInputs::PerBlock {
                weight: dec!(3),
                minutes,
            },
        )
        .expect("evaluates")
        .breakdown["t_blocks"]
    };

    for minutes in [dec!(30.01), dec!(45), dec!(59.9), dec!(60)] {
        assert_eq!(blocks(minutes), dec!(2), "minutes {minutes}");
    }
    assert_eq!(blocks(dec!(60.5)), dec!(3));
    assert_eq!(blocks(dec!(30)), dec!(1));
}

#[test]
fn per_block_forklift_breakdown() {
    let params = params(json!({ "base_weight_ton": 3, "base_time_min": 30 }));
    let evaluation = evaluate(
        CalculationType::PerBlock,
        dec!(80),
        &params,
        &FormulaInputs::PerBlock {
            weight: dec!(5),
            minutes: dec!(45),
        },
    )
    .expect("evaluates");
    assert_eq!(evaluation.breakdown["w_blocks"], dec!(1.666667));
    assert_eq!(evaluation.breakdown["t_blocks"], dec!(2));
    assert_eq!(crate::money::round_money(evaluation.subtotal), dec!(266.6667));
}

#[test]
fn vehicle_rule_charges_base_price_up_to_base_minutes() {
    let params = FormulaParams::default();
    let at = |minutes: Decimal| {
        evaluate(
            CalculationType::Vehicle4hRule,
            dec!(15),
            &params,
            &FormulaInputs::Vehicle4hRule { minutes },
        )
        .expect("evaluates")
        .subtotal
    };
    assert_eq!(at(dec!(240)), dec!(15));
    assert_eq!(at(dec!(90)), dec!(15));
    assert_eq!(at(dec!(450)), dec!(28.125));
}

#[test]
fn base_plus_increment_adds_tonnage_component() {
    let params = params(json!({ "increment_rate": "0.05" }));
    let evaluation = evaluate(
        CalculationType::BasePlusIncrement,
        dec!(150),
        &params,
        &FormulaInputs::BasePlusIncrement { grt: dec!(12000) },
    )
    .expect("evaluates");
    assert_eq!(evaluation.subtotal, dec!(750));
    assert_eq!(evaluation.breakdown["extra_component"], dec!(600));
}

#[test]
fn x_secondary_rounds_the_secondary_input() {
    let evaluate_with = |rounding: &str, days: Decimal| {
        let params = params(json!({ "rounding": rounding }));
        evaluate(
            CalculationType::XSecondary,
            dec!(2),
            &params,
            &FormulaInputs::XSecondary {
                primary: dec!(10),
                secondary: days,
            },
        )
        .expect("evaluates")
        .subtotal
    };
    assert_eq!(evaluate_with("ceil", dec!(2.1)), dec!(60));
    assert_eq!(evaluate_with("floor", dec!(2.9)), dec!(40));
    assert_eq!(evaluate_with("round", dec!(2.5)), dec!(60));
    assert_eq!(evaluate_with("round", dec!(2.4)), dec!(40));
}

#[test]
fn x_secondary_reads_inputs_named_by_params() {
    let params = params(json!({ "primary_input": "teu", "secondary_input": "days" }));
    let map = inputs(json!({ "teu": 4, "days": "3" }));
    let typed = FormulaInputs::from_map(CalculationType::XSecondary, &params, &map).expect("typed");
    assert_eq!(
        typed,
        FormulaInputs::XSecondary {
            primary: dec!(4),
            secondary: dec!(3),
        }
    );

    let missing = FormulaInputs::from_map(
        CalculationType::XSecondary,
        &params,
        &inputs(json!({ "quantity": 4, "days": 3 })),
    )
    .expect_err("teu is required");
    assert_eq!(missing, FormulaError::InputMissing("teu".into()));
}

#[test]
fn negative_inputs_fail_for_every_type() {
    let params = params(json!({
        "base_weight_ton": 3,
        "base_time_min": 30,
        "increment_rate": 1
    }));
    let cases = [
        (CalculationType::PerUnit, FormulaInputs::PerUnit { quantity: dec!(-1) }),
        (
            CalculationType::XSecondary,
            FormulaInputs::XSecondary {
                primary: dec!(1),
                secondary: dec!(-0.5),
            },
        ),
        (
            CalculationType::PerBlock,
            FormulaInputs::PerBlock {
                weight: dec!(-3),
                minutes: dec!(10),
            },
        ),
        (
            CalculationType::BasePlusIncrement,
            FormulaInputs::BasePlusIncrement { grt: dec!(-100) },
        ),
        (
            CalculationType::Vehicle4hRule,
            FormulaInputs::Vehicle4hRule { minutes: dec!(-5) },
        ),
    ];
    for (calc_type, inputs) in cases {
        let error = evaluate(calc_type, dec!(10), &params, &inputs).expect_err("negative input");
        assert_eq!(error.kind(), ErrorKind::InputDomain, "{calc_type:?}");
    }
}

#[test]
fn inputs_map_validation_reports_missing_and_non_numeric_values() {
    let params = FormulaParams::default();
    let missing = FormulaInputs::from_map(CalculationType::PerUnit, &params, &inputs(json!({})))
        .expect_err("quantity missing");
    assert_eq!(missing.kind(), ErrorKind::InputMissing);

    let garbage = FormulaInputs::from_map(
        CalculationType::PerUnit,
        &params,
        &inputs(json!({ "quantity": "five" })),
    )
    .expect_err("not numeric");
    assert_eq!(garbage.kind(), ErrorKind::InputDomain);

    let fixed = FormulaInputs::from_map(
        CalculationType::Fixed,
        &params,
        &inputs(json!({ "anything": true })),
    )
    .expect("fixed ignores inputs");
    assert_eq!(fixed, FormulaInputs::Fixed);
}

#[test]
fn mismatched_inputs_variant_is_rejected() {
    let error = evaluate(
        CalculationType::PerBlock,
        dec!(80),
        &FormulaParams::default(),
        &FormulaInputs::PerUnit { quantity: dec!(1) },
    )
    .expect_err("wrong variant");
    assert_eq!(error.kind(), ErrorKind::InputMissing);
}

#[test]
fn unusable_params_are_reported() {
    let zero_block = params(json!({ "base_weight_ton": 3, "base_time_min": 0 }));
    let error = evaluate(
        CalculationType::PerBlock,
        dec!(80),
        &zero_block,
        &FormulaInputs::PerBlock {
            weight: dec!(1),
            minutes: dec!(1),
        },
    )
    .expect_err("zero block length");
    assert_eq!(error.kind(), ErrorKind::FormulaParamsInvalid);

    let bad_rounding = FormulaParams::from_value(&json!({ "rounding": "bankers" }))
        .expect_err("unknown rounding");
    assert_eq!(bad_rounding.kind(), ErrorKind::FormulaParamsInvalid);

    let unknown = crate::pricing::formula::parse_calculation_type("HOURLY").expect_err("unknown");
    assert_eq!(unknown.kind(), ErrorKind::CalcTypeUnknown);
}
