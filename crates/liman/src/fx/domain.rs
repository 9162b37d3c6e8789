use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::FxError;

/// Currencies the core prices in. TRY is the settlement currency; the others are quoted
/// against it by the central bank bulletin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Try,
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    /// Currencies fetched from the rate sources.
    pub const QUOTED: [Currency; 3] = [Currency::Usd, Currency::Eur, Currency::Gbp];

    pub const fn code(self) -> &'static str {
        match self {
            Currency::Try => "TRY",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported currency code '{0}'")]
pub struct UnknownCurrency(pub String);

impl FromStr for Currency {
    type Err = UnknownCurrency;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TRY" | "TL" => Ok(Currency::Try),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            other => Err(UnknownCurrency(other.to_string())),
        }
    }
}

/// TRY price of one unit of a currency. Forex rates apply to bank transfers, banknote rates
/// to cash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSet {
    pub forex_buy: Decimal,
    pub forex_sell: Decimal,
    pub banknote_buy: Decimal,
    pub banknote_sell: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FxSource {
    Primary,
    Fallback,
    Manual,
}

impl FxSource {
    pub const fn label(self) -> &'static str {
        match self {
            FxSource::Primary => "primary",
            FxSource::Fallback => "fallback",
            FxSource::Manual => "manual",
        }
    }
}

/// One persisted quote. Rows are append-only; a correction is a new row with a later
/// `fetched_at` and readers take the latest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FxQuote {
    pub currency: Currency,
    pub effective_date: NaiveDate,
    #[serde(flatten)]
    pub rates: RateSet,
    pub source: FxSource,
    pub fetched_at: DateTime<Utc>,
}

/// Rates answering a lookup for `requested_date`. `effective_date` is the bulletin actually
/// used, which is earlier than the requested date on weekends and holidays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatesSnapshot {
    pub requested_date: NaiveDate,
    pub effective_date: NaiveDate,
    pub source: FxSource,
    pub rates: BTreeMap<Currency, RateSet>,
    pub fetched_at: DateTime<Utc>,
}

/// Outcome of converting an amount between two currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Conversion {
    pub amount: Decimal,
    /// Multiplier applied to the source amount.
    pub rate: Decimal,
    /// Bulletin date of the rates used; `None` for an identity conversion.
    pub effective_date: Option<NaiveDate>,
}

impl Conversion {
    pub fn identity(amount: Decimal) -> Self {
        Self {
            amount,
            rate: Decimal::ONE,
            effective_date: None,
        }
    }
}

impl RatesSnapshot {
    pub fn rate(&self, currency: Currency) -> Result<&RateSet, FxError> {
        self.rates
            .get(&currency)
            .ok_or(FxError::CurrencyMissing {
                currency,
                date: self.effective_date,
            })
    }

    /// Convert through TRY: the paid currency is sold at `forex_sell`, the received currency
    /// bought at `forex_buy`.
    pub fn convert(
        &self,
        amount: Decimal,
        from: Currency,
        to: Currency,
    ) -> Result<Conversion, FxError> {
        if from == to {
            return Ok(Conversion::identity(amount));
        }

        let sell = match from {
            Currency::Try => Decimal::ONE,
            other => self.usable(other, self.rate(other)?.forex_sell)?,
        };
        let buy = match to {
            Currency::Try => Decimal::ONE,
            other => self.usable(other, self.rate(other)?.forex_buy)?,
        };

        let converted = amount
            .checked_mul(sell)
            .and_then(|value| value.checked_div(buy))
            .ok_or(FxError::Arithmetic)?;
        let rate = sell.checked_div(buy).ok_or(FxError::Arithmetic)?;

        Ok(Conversion {
            amount: converted,
            rate,
            effective_date: Some(self.effective_date),
        })
    }

    pub fn quotes(&self) -> Vec<FxQuote> {
        self.rates
            .iter()
            .map(|(currency, rates)| FxQuote {
                currency: *currency,
                effective_date: self.effective_date,
                rates: *rates,
                source: self.source,
                fetched_at: self.fetched_at,
            })
            .collect()
    }

    fn usable(&self, currency: Currency, rate: Decimal) -> Result<Decimal, FxError> {
        if rate > Decimal::ZERO {
            Ok(rate)
        } else {
            Err(FxError::CurrencyMissing {
                currency,
                date: self.effective_date,
            })
        }
    }
}
