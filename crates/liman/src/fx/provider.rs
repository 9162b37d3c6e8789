use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, Utc, Weekday};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::domain::{Conversion, Currency, FxQuote, FxSource, RatesSnapshot};
use super::evds::EvdsSource;
use super::source::{http_client, RateSource};
use super::store::FxQuoteStore;
use super::tcmb::TcmbBulletinSource;
use super::FxError;
use crate::config::FxConfig;
use crate::deadline::Deadline;
use crate::sync::KeyedMutex;
use crate::telemetry::FX_CACHE_HITS;

#[derive(Debug, Clone)]
struct CachedRates {
    snapshot: RatesSnapshot,
    stored_at: Instant,
}

/// Daily TRY rates with walkback over non-publishing days, a fallback source, a TTL cache
/// and single-flight fetching per bulletin date.
pub struct FxRateProvider {
    primary: Arc<dyn RateSource>,
    fallback: Option<Arc<dyn RateSource>>,
    store: Arc<dyn FxQuoteStore>,
    cache: DashMap<NaiveDate, CachedRates>,
    unpublished: DashMap<NaiveDate, Instant>,
    inflight: KeyedMutex<NaiveDate>,
    fallback_inflight: KeyedMutex<NaiveDate>,
    cache_ttl: Duration,
    walkback_days: u32,
}

impl FxRateProvider {
    pub fn new(primary: Arc<dyn RateSource>, store: Arc<dyn FxQuoteStore>) -> Self {
        Self {
            primary,
            fallback: None,
            store,
            cache: DashMap::new(),
            unpublished: DashMap::new(),
            inflight: KeyedMutex::new(),
            fallback_inflight: KeyedMutex::new(),
            cache_ttl: crate::config::MIN_FX_CACHE_TTL,
            walkback_days: 10,
        }
    }

    /// Provider backed by the live bulletin and statistical API described by `config`.
    pub fn from_config(
        config: &FxConfig,
        store: Arc<dyn FxQuoteStore>,
    ) -> Result<Self, reqwest::Error> {
        let client = http_client(config.request_timeout)?;
        let primary = TcmbBulletinSource::new(
            client.clone(),
            config.primary_url.clone(),
            config.max_retry_elapsed,
        );
        let provider = Self::new(Arc::new(primary), store)
            .with_cache_ttl(config.cache_ttl)
            .with_walkback_days(config.walkback_days);

        Ok(match &config.fallback_api_key {
            Some(key) => provider.with_fallback(Arc::new(
                EvdsSource::new(
                    client,
                    config.fallback_url.clone(),
                    Some(key.clone()),
                    config.max_retry_elapsed,
                )
                .with_window_days(config.walkback_days),
            )),
            None => {
                warn!("no fallback api key configured; fallback rate source disabled");
                provider
            }
        })
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn RateSource>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_walkback_days(mut self, days: u32) -> Self {
        self.walkback_days = days;
        self
    }

    pub async fn get_rates(
        &self,
        on_date: NaiveDate,
        deadline: Deadline,
    ) -> Result<RatesSnapshot, FxError> {
        deadline.run(self.load(on_date)).await?
    }

    /// Convert `amount` through TRY using the rates in force on `on_date`.
    pub async fn convert(
        &self,
        amount: Decimal,
        from: Currency,
        to: Currency,
        on_date: NaiveDate,
        deadline: Deadline,
    ) -> Result<Conversion, FxError> {
        if from == to {
            return Ok(Conversion::identity(amount));
        }
        let snapshot = self.get_rates(on_date, deadline).await?;
        snapshot.convert(amount, from, to)
    }

    /// Drop any cached answer for `on_date` and load it again.
    pub async fn refresh(
        &self,
        on_date: NaiveDate,
        deadline: Deadline,
    ) -> Result<RatesSnapshot, FxError> {
        self.cache.remove(&on_date);
        self.unpublished.remove(&on_date);
        self.get_rates(on_date, deadline).await
    }

    /// Persist an operator-entered quote. Cached answers built on that bulletin date are
    /// evicted so the next read sees it.
    pub async fn record_manual_quote(&self, mut quote: FxQuote) -> Result<FxQuote, FxError> {
        quote.source = FxSource::Manual;
        quote.fetched_at = Utc::now();
        self.store.put_fx_quote(quote.clone()).await?;

        let date = quote.effective_date;
        self.cache
            .retain(|requested, cached| *requested != date && cached.snapshot.effective_date != date);
        info!(currency = %quote.currency, effective_date = %date, "manual fx quote recorded");
        Ok(quote)
    }

    async fn load(&self, on_date: NaiveDate) -> Result<RatesSnapshot, FxError> {
        if let Some(hit) = self.cached(on_date) {
            return Ok(hit);
        }
        self.evict_expired();

        let (stored, on_date_quotes) = self.stored_bulletin(on_date).await?;
        let snapshot = match stored {
            Some(snapshot) => {
                debug!(
                    %on_date,
                    effective_date = %snapshot.effective_date,
                    "fx rates served from store"
                );
                if snapshot.effective_date != on_date {
                    self.remember(snapshot.effective_date, &snapshot);
                }
                snapshot
            }
            None => match self.fetch_upstream(on_date).await {
                Ok(mut snapshot) => {
                    snapshot.requested_date = on_date;
                    for (currency, quote) in on_date_quotes {
                        snapshot.rates.insert(currency, quote.rates);
                    }
                    snapshot
                }
                Err(err) if !on_date_quotes.is_empty() => {
                    warn!(%on_date, error = %err, "upstream failed; serving stored quotes only");
                    snapshot_from_quotes(on_date, on_date, on_date_quotes)
                }
                Err(err) => return Err(err),
            },
        };

        self.remember(on_date, &snapshot);
        Ok(snapshot)
    }

    fn cached(&self, on_date: NaiveDate) -> Option<RatesSnapshot> {
        let fresh = {
            let entry = self.cache.get(&on_date)?;
            (entry.stored_at.elapsed() < self.cache_ttl).then(|| entry.snapshot.clone())
        };
        let Some(mut snapshot) = fresh else {
            self.cache
                .remove_if(&on_date, |_, entry| entry.stored_at.elapsed() >= self.cache_ttl);
            return None;
        };
        metrics::counter!(FX_CACHE_HITS).increment(1);
        snapshot.requested_date = on_date;
        Some(snapshot)
    }

    #[cfg(test)]
    pub(crate) fn cached_dates(&self) -> usize {
        self.cache.len()
    }

    fn remember(&self, date: NaiveDate, snapshot: &RatesSnapshot) {
        self.cache.insert(
            date,
            CachedRates {
                snapshot: snapshot.clone(),
                stored_at: Instant::now(),
            },
        );
    }

    fn evict_expired(&self) {
        let ttl = self.cache_ttl;
        self.cache.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        self.unpublished.retain(|_, seen| seen.elapsed() < ttl);
    }

    /// Days the primary answered "no bulletin" for within the cache TTL.
    fn known_unpublished(&self, day: NaiveDate) -> bool {
        self.unpublished
            .get(&day)
            .is_some_and(|seen| seen.elapsed() < self.cache_ttl)
    }

    async fn stored_quotes(
        &self,
        date: NaiveDate,
    ) -> Result<BTreeMap<Currency, FxQuote>, FxError> {
        let mut found = BTreeMap::new();
        for currency in Currency::QUOTED {
            if let Some(quote) = self.store.get_fx_quote(currency, date).await? {
                found.insert(currency, quote);
            }
        }
        Ok(found)
    }

    /// Walk back through the store over days that carry no bulletin of their own. A day
    /// holding any fetched quote is a stored bulletin, even when some currencies are absent.
    /// Returns the bulletin, if found, and whatever is stored under `on_date` itself.
    async fn stored_bulletin(
        &self,
        on_date: NaiveDate,
    ) -> Result<(Option<RatesSnapshot>, BTreeMap<Currency, FxQuote>), FxError> {
        let mut on_date_quotes = BTreeMap::new();
        for offset in 0..self.walkback_days {
            let day = on_date - ChronoDuration::days(i64::from(offset));
            let quotes = self.stored_quotes(day).await?;
            if quotes.values().any(|quote| quote.source != FxSource::Manual) {
                return Ok((
                    Some(snapshot_from_quotes(on_date, day, quotes)),
                    on_date_quotes,
                ));
            }
            let skippable = quotes.is_empty() && (is_weekend(day) || self.known_unpublished(day));
            if offset == 0 {
                on_date_quotes = quotes;
            }
            if !skippable {
                break;
            }
        }
        Ok((None, on_date_quotes))
    }

    /// Walk back from `on_date` over non-publishing days on the primary; any other primary
    /// failure goes straight to the fallback. Fetches are coalesced per bulletin date.
    async fn fetch_upstream(&self, on_date: NaiveDate) -> Result<RatesSnapshot, FxError> {
        for offset in 0..self.walkback_days {
            let day = on_date - ChronoDuration::days(i64::from(offset));
            if self.known_unpublished(day) {
                continue;
            }
            let _flight = self.inflight.lock(day).await;
            if let Some(hit) = self.cached(day) {
                return Ok(hit);
            }
            if self.known_unpublished(day) {
                continue;
            }
            match self.primary.fetch(day).await {
                Ok(Some(fetched)) => {
                    log_fetched(on_date, &fetched);
                    return self.persist_bulletin(fetched).await;
                }
                Ok(None) => {
                    self.unpublished.insert(day, Instant::now());
                    debug!(%day, "no bulletin published; walking back");
                }
                Err(err) => {
                    warn!(%day, error = %err, "primary fx source failed");
                    break;
                }
            }
        }

        if let Some(fallback) = &self.fallback {
            let _flight = self.fallback_inflight.lock(on_date).await;
            if let Some(hit) = self.cached(on_date) {
                return Ok(hit);
            }
            match fallback.fetch(on_date).await {
                Ok(Some(fetched)) => {
                    log_fetched(on_date, &fetched);
                    let snapshot = self.persist_bulletin(fetched).await?;
                    self.remember(on_date, &snapshot);
                    return Ok(snapshot);
                }
                Ok(None) => warn!(%on_date, "fallback fx source has no observation"),
                Err(err) => warn!(%on_date, error = %err, "fallback fx source failed"),
            }
        }

        Err(FxError::Unavailable { date: on_date })
    }

    /// Append fetched quotes the store lacks, then answer from the store so corrections and
    /// manual rows recorded for the bulletin date take precedence. The merged bulletin is
    /// cached under its effective date.
    async fn persist_bulletin(&self, fetched: RatesSnapshot) -> Result<RatesSnapshot, FxError> {
        let effective_date = fetched.effective_date;
        let mut merged = fetched.clone();

        for quote in fetched.quotes() {
            match self
                .store
                .get_fx_quote(quote.currency, effective_date)
                .await?
            {
                Some(existing) => {
                    merged.rates.insert(existing.currency, existing.rates);
                }
                None => self.store.put_fx_quote(quote).await?,
            }
        }

        self.remember(effective_date, &merged);
        Ok(merged)
    }
}

fn is_weekend(day: NaiveDate) -> bool {
    matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

fn log_fetched(on_date: NaiveDate, snapshot: &RatesSnapshot) {
    info!(
        requested_date = %on_date,
        effective_date = %snapshot.effective_date,
        currency_count = snapshot.rates.len(),
        source = snapshot.source.label(),
        "fx rates fetched"
    );
}

fn snapshot_from_quotes(
    requested_date: NaiveDate,
    effective_date: NaiveDate,
    quotes: BTreeMap<Currency, FxQuote>,
) -> RatesSnapshot {
    let source = if quotes.values().any(|quote| quote.source == FxSource::Manual) {
        FxSource::Manual
    } else {
        quotes
            .values()
            .next()
            .map(|quote| quote.source)
            .unwrap_or(FxSource::Primary)
    };
    let fetched_at = quotes
        .values()
        .map(|quote| quote.fetched_at)
        .max()
        .unwrap_or_else(Utc::now);

    RatesSnapshot {
        requested_date,
        effective_date,
        source,
        rates: quotes
            .into_iter()
            .map(|(currency, quote)| (currency, quote.rates))
            .collect(),
        fetched_at,
    }
}
