use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use super::domain::{InputMap, PricedQuote, PricedResult, PricingOptions, QuoteLine};
use super::formula::{evaluate, parse_calculation_type, FormulaInputs, FormulaParams};
use super::tariff::TariffResolver;
use super::PricingError;
use crate::deadline::Deadline;
use crate::fx::{Conversion, FxRateProvider};
use crate::money::{percent_of, round_money, round_rate};
use crate::telemetry::PRICING_CALCULATIONS;

/// Tariff resolution, formula evaluation, FX conversion, cabotage discount and VAT, in
/// that order.
pub struct PricingEngine {
    resolver: TariffResolver,
    fx: Arc<FxRateProvider>,
    default_cabotage_rate: Decimal,
}

impl PricingEngine {
    pub fn new(resolver: TariffResolver, fx: Arc<FxRateProvider>) -> Self {
        Self {
            resolver,
            fx,
            default_cabotage_rate: Decimal::TEN,
        }
    }

    pub fn with_default_cabotage_rate(mut self, rate: Decimal) -> Self {
        self.default_cabotage_rate = rate;
        self
    }

    pub fn fx(&self) -> &Arc<FxRateProvider> {
        &self.fx
    }

    pub async fn price(
        &self,
        service_code: &str,
        on_date: NaiveDate,
        inputs: &InputMap,
        options: &PricingOptions,
        deadline: Deadline,
    ) -> Result<PricedResult, PricingError> {
        deadline
            .run(self.price_line(service_code, on_date, inputs, options, deadline))
            .await?
    }

    /// Price every line with the same date and options. Lines are priced in order and the
    /// first failure aborts the quote.
    pub async fn quote(
        &self,
        on_date: NaiveDate,
        lines: &[QuoteLine],
        options: &PricingOptions,
        deadline: Deadline,
    ) -> Result<PricedQuote, PricingError> {
        deadline
            .run(self.quote_lines(on_date, lines, options, deadline))
            .await?
    }

    async fn quote_lines(
        &self,
        on_date: NaiveDate,
        lines: &[QuoteLine],
        options: &PricingOptions,
        deadline: Deadline,
    ) -> Result<PricedQuote, PricingError> {
        if lines.is_empty() {
            return Err(PricingError::EmptyQuote);
        }

        let mut priced = Vec::with_capacity(lines.len());
        for line in lines {
            priced.push(
                self.price_line(&line.service_code, on_date, &line.inputs, options, deadline)
                    .await?,
            );
        }

        let subtotal = sum(priced.iter().map(|line| line.subtotal_target))?;
        let discount_amount = sum(priced.iter().map(|line| line.discount_amount))?;
        let discounted_subtotal = sum(priced.iter().map(|line| line.taxable_amount))?;
        let vat_amount = sum(priced.iter().map(|line| line.vat_amount))?;
        let grand_total = sum(priced.iter().map(|line| line.grand_total))?;

        Ok(PricedQuote {
            on_date,
            currency: options.target_currency,
            lines: priced,
            subtotal,
            discount_amount,
            discounted_subtotal,
            vat_amount,
            grand_total,
        })
    }

    async fn price_line(
        &self,
        service_code: &str,
        on_date: NaiveDate,
        inputs: &InputMap,
        options: &PricingOptions,
        deadline: Deadline,
    ) -> Result<PricedResult, PricingError> {
        let cabotage_rate = options.cabotage_rate.unwrap_or(self.default_cabotage_rate);
        if options.apply_cabotage_discount
            && (cabotage_rate < Decimal::ZERO || cabotage_rate > Decimal::ONE_HUNDRED)
        {
            return Err(PricingError::InvalidOption(format!(
                "cabotage rate {cabotage_rate} is outside 0..=100"
            )));
        }

        let tariff = self.resolver.resolve(service_code, on_date).await?;
        let calc_type = parse_calculation_type(&tariff.calculation_type)?;
        let params = FormulaParams::from_value(&tariff.formula_params)?;
        let formula_inputs = FormulaInputs::from_map(calc_type, &params, inputs)?;
        let evaluation = evaluate(calc_type, tariff.unit_price, &params, &formula_inputs)?;
        let subtotal_native = round_money(evaluation.subtotal);

        let conversion = if tariff.currency == options.target_currency {
            Conversion::identity(subtotal_native)
        } else {
            self.fx
                .convert(
                    subtotal_native,
                    tariff.currency,
                    options.target_currency,
                    on_date,
                    deadline,
                )
                .await?
        };
        let subtotal_target = round_money(conversion.amount);
        let fx_rate_used = round_rate(conversion.rate);

        let (discount_rate, discount_amount) = if options.apply_cabotage_discount {
            let amount = percent_of(subtotal_target, cabotage_rate).ok_or(PricingError::Overflow)?;
            (cabotage_rate, round_money(amount))
        } else {
            (Decimal::ZERO, round_money(Decimal::ZERO))
        };
        let taxable_amount = subtotal_target
            .checked_sub(discount_amount)
            .ok_or(PricingError::Overflow)?;
        let vat_amount = round_money(
            percent_of(taxable_amount, tariff.vat_rate).ok_or(PricingError::Overflow)?,
        );
        let grand_total = taxable_amount
            .checked_add(vat_amount)
            .ok_or(PricingError::Overflow)?;

        let native = tariff.currency.code();
        let target = options.target_currency.code();
        let mut details = format!(
            "{}: {} = {subtotal_native} {native}",
            calc_type.code(),
            evaluation.describe(native, &params),
        );
        if let Some(effective_date) = conversion.effective_date {
            details.push_str(&format!(
                "; {subtotal_native} {native} x {fx_rate_used} ({effective_date}) = {subtotal_target} {target}"
            ));
        }
        if options.apply_cabotage_discount {
            details.push_str(&format!(
                "; cabotage {}% = -{discount_amount} {target}",
                discount_rate.normalize()
            ));
        }
        details.push_str(&format!(
            "; VAT {}% = {vat_amount} {target}; total {grand_total} {target}",
            tariff.vat_rate.normalize()
        ));

        metrics::counter!(PRICING_CALCULATIONS, "calculation_type" => calc_type.code())
            .increment(1);
        info!(
            service_code = %tariff.service_code,
            on_date = %on_date,
            calculation_type = calc_type.code(),
            grand_total = %grand_total,
            currency = target,
            "service priced"
        );

        Ok(PricedResult {
            service_code: tariff.service_code,
            on_date,
            calculation_type: calc_type,
            tariff_source: tariff.source,
            native_currency: tariff.currency,
            target_currency: options.target_currency,
            subtotal_native,
            fx_rate_used,
            fx_effective_date: conversion.effective_date,
            subtotal_target,
            discount_applied: options.apply_cabotage_discount,
            discount_rate,
            discount_amount,
            taxable_amount,
            vat_rate: tariff.vat_rate,
            vat_amount,
            grand_total,
            breakdown: evaluation.breakdown,
            calculation_details: details,
        })
    }
}

fn sum(values: impl Iterator<Item = Decimal>) -> Result<Decimal, PricingError> {
    values.fold(Ok(round_money(Decimal::ZERO)), |total, value| {
        total.and_then(|total| total.checked_add(value).ok_or(PricingError::Overflow))
    })
}
