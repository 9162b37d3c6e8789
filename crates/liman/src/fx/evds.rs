use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::domain::{Currency, FxSource, RateSet, RatesSnapshot};
use super::source::{HttpFetcher, RateSource, SourceError};
use crate::money::decimal_from_json;

/// Fallback source: the central bank's statistical JSON API. One request per currency asks
/// for the four daily series over a short window ending at the requested date.
#[derive(Debug, Clone)]
pub struct EvdsSource {
    http: HttpFetcher,
    base_url: String,
    api_key: Option<String>,
    window_days: u32,
}

impl EvdsSource {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        max_retry: Duration,
    ) -> Self {
        Self {
            http: HttpFetcher::new(client, max_retry, FxSource::Fallback),
            base_url: base_url.into(),
            api_key,
            window_days: 10,
        }
    }

    pub fn with_window_days(mut self, days: u32) -> Self {
        self.window_days = days;
        self
    }

    pub fn series_url(&self, currency: Currency, date: NaiveDate) -> String {
        let start = date - ChronoDuration::days(i64::from(self.window_days));
        let series = Series::for_currency(currency)
            .ids()
            .join("-");
        format!(
            "{}/series={}&startDate={}&endDate={}&type=json",
            self.base_url.trim_end_matches('/'),
            series,
            start.format("%d-%m-%Y"),
            date.format("%d-%m-%Y"),
        )
    }

    async fn fetch_currency(
        &self,
        currency: Currency,
        date: NaiveDate,
        api_key: &str,
    ) -> Result<Option<(NaiveDate, RateSet)>, SourceError> {
        let url = self.series_url(currency, date);
        let headers = [("key", api_key.to_string())];
        match self.http.get(&url, &headers).await? {
            Some(body) => parse_series(&body, currency, date),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RateSource for EvdsSource {
    fn source(&self) -> FxSource {
        FxSource::Fallback
    }

    async fn fetch(&self, date: NaiveDate) -> Result<Option<RatesSnapshot>, SourceError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(SourceError::Disabled);
        };

        let mut observations = Vec::new();
        let mut last_error = None;
        for currency in Currency::QUOTED {
            match self.fetch_currency(currency, date, api_key).await {
                Ok(Some((observed, rates))) => observations.push((currency, observed, rates)),
                Ok(None) => debug!(%currency, %date, "fallback series returned no observation"),
                Err(err) => {
                    warn!(%currency, %date, error = %err, "fallback series request failed");
                    last_error = Some(err);
                }
            }
        }

        let Some(effective_date) = observations.iter().map(|(_, observed, _)| *observed).max()
        else {
            return match last_error {
                Some(err) => Err(err),
                None => Ok(None),
            };
        };

        let mut rates = BTreeMap::new();
        for (currency, observed, set) in observations {
            if observed == effective_date {
                rates.insert(currency, set);
            } else {
                debug!(%currency, %observed, %effective_date, "dropping stale fallback observation");
            }
        }

        Ok(Some(RatesSnapshot {
            requested_date: date,
            effective_date,
            source: FxSource::Fallback,
            rates,
            fetched_at: Utc::now(),
        }))
    }
}

struct Series {
    forex_buy: String,
    forex_sell: String,
    banknote_buy: String,
    banknote_sell: String,
}

impl Series {
    fn for_currency(currency: Currency) -> Self {
        let code = currency.code();
        Self {
            forex_buy: format!("TP.DK.{code}.A.YTL"),
            forex_sell: format!("TP.DK.{code}.S.YTL"),
            banknote_buy: format!("TP.DK.{code}.A.EF.YTL"),
            banknote_sell: format!("TP.DK.{code}.S.EF.YTL"),
        }
    }

    fn ids(&self) -> [&str; 4] {
        [
            &self.forex_buy,
            &self.forex_sell,
            &self.banknote_buy,
            &self.banknote_sell,
        ]
    }
}

/// Response items key their values by the series id with dots replaced by underscores.
fn item_key(series_id: &str) -> String {
    series_id.replace('.', "_")
}

/// Latest observation on or before `date` that carries both forex values.
pub fn parse_series(
    body: &str,
    currency: Currency,
    date: NaiveDate,
) -> Result<Option<(NaiveDate, RateSet)>, SourceError> {
    let document: Value =
        serde_json::from_str(body).map_err(|err| SourceError::Malformed(err.to_string()))?;
    let items = document
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Malformed("response carries no items array".into()))?;

    let series = Series::for_currency(currency);
    let forex_buy_key = item_key(&series.forex_buy);
    let forex_sell_key = item_key(&series.forex_sell);
    let banknote_buy_key = item_key(&series.banknote_buy);
    let banknote_sell_key = item_key(&series.banknote_sell);

    let mut best: Option<(NaiveDate, RateSet)> = None;
    for item in items {
        let Some(observed) = item
            .get("Tarih")
            .and_then(Value::as_str)
            .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%d-%m-%Y").ok())
        else {
            continue;
        };
        if observed > date {
            continue;
        }
        let (Some(forex_buy), Some(forex_sell)) = (
            number(item.get(&forex_buy_key)),
            number(item.get(&forex_sell_key)),
        ) else {
            continue;
        };
        let rates = RateSet {
            forex_buy,
            forex_sell,
            banknote_buy: number(item.get(&banknote_buy_key)).unwrap_or(forex_buy),
            banknote_sell: number(item.get(&banknote_sell_key)).unwrap_or(forex_sell),
        };
        if best.map_or(true, |(seen, _)| observed > seen) {
            best = Some((observed, rates));
        }
    }

    Ok(best)
}

fn number(value: Option<&Value>) -> Option<Decimal> {
    decimal_from_json(value?).filter(|parsed| *parsed > Decimal::ZERO)
}
