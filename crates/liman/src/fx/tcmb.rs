use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use super::domain::{Currency, FxSource, RateSet, RatesSnapshot};
use super::source::{HttpFetcher, RateSource, SourceError};

/// Primary source: the central bank's daily XML bulletin at `{base}/YYYYMM/DDMMYYYY.xml`.
/// Non-publishing days answer 404.
#[derive(Debug, Clone)]
pub struct TcmbBulletinSource {
    http: HttpFetcher,
    base_url: String,
}

impl TcmbBulletinSource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, max_retry: Duration) -> Self {
        Self {
            http: HttpFetcher::new(client, max_retry, FxSource::Primary),
            base_url: base_url.into(),
        }
    }

    pub fn bulletin_url(&self, date: NaiveDate) -> String {
        format!(
            "{}/{}/{}.xml",
            self.base_url.trim_end_matches('/'),
            date.format("%Y%m"),
            date.format("%d%m%Y")
        )
    }
}

#[async_trait]
impl RateSource for TcmbBulletinSource {
    fn source(&self) -> FxSource {
        FxSource::Primary
    }

    async fn fetch(&self, date: NaiveDate) -> Result<Option<RatesSnapshot>, SourceError> {
        let url = self.bulletin_url(date);
        match self.http.get(&url, &[]).await? {
            Some(body) => parse_bulletin(&body, date).map(Some),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Default)]
struct CurrencyRow {
    code: String,
    unit: Option<String>,
    forex_buying: Option<String>,
    forex_selling: Option<String>,
    banknote_buying: Option<String>,
    banknote_selling: Option<String>,
}

impl CurrencyRow {
    fn slot(&mut self, field: &str) -> Option<&mut Option<String>> {
        match field {
            "Unit" => Some(&mut self.unit),
            "ForexBuying" => Some(&mut self.forex_buying),
            "ForexSelling" => Some(&mut self.forex_selling),
            "BanknoteBuying" => Some(&mut self.banknote_buying),
            "BanknoteSelling" => Some(&mut self.banknote_selling),
            _ => None,
        }
    }

    fn into_rates(self) -> Option<RateSet> {
        let unit = match self.unit.as_deref() {
            Some(raw) => parse_number(raw).filter(|unit| *unit > Decimal::ZERO)?,
            None => Decimal::ONE,
        };
        let forex_buy = parse_number(self.forex_buying.as_deref()?)?;
        let forex_sell = parse_number(self.forex_selling.as_deref()?)?;
        let banknote_buy = self
            .banknote_buying
            .as_deref()
            .and_then(parse_number)
            .unwrap_or(forex_buy);
        let banknote_sell = self
            .banknote_selling
            .as_deref()
            .and_then(parse_number)
            .unwrap_or(forex_sell);

        Some(RateSet {
            forex_buy: forex_buy.checked_div(unit)?,
            forex_sell: forex_sell.checked_div(unit)?,
            banknote_buy: banknote_buy.checked_div(unit)?,
            banknote_sell: banknote_sell.checked_div(unit)?,
        })
    }
}

/// Parse a bulletin body. Currencies with unusable numerics are skipped; a body that is not
/// XML or carries none of the quoted currencies is a source failure.
pub fn parse_bulletin(body: &str, requested: NaiveDate) -> Result<RatesSnapshot, SourceError> {
    let xml = strip_preamble(body);
    if xml.is_empty() || looks_like_html(xml) {
        return Err(SourceError::Malformed("bulletin is not an XML document".into()));
    }

    let mut reader = Reader::from_str(xml);

    let mut bulletin_date: Option<NaiveDate> = None;
    let mut rates = BTreeMap::new();
    let mut current: Option<CurrencyRow> = None;
    let mut field: Option<String> = None;
    let mut saw_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => {
                saw_root = true;
                let name = local_name(&element);
                match name.as_str() {
                    "Tarih_Date" => bulletin_date = bulletin_date.or(read_bulletin_date(&element)),
                    "Currency" => {
                        current = Some(CurrencyRow {
                            code: currency_code(&element),
                            ..Default::default()
                        })
                    }
                    _ => field = Some(name),
                }
            }
            Ok(Event::Empty(element)) => {
                saw_root = true;
                if local_name(&element) == "Tarih_Date" {
                    bulletin_date = bulletin_date.or(read_bulletin_date(&element));
                }
            }
            Ok(Event::Text(text)) => {
                if let (Some(row), Some(name)) = (current.as_mut(), field.as_deref()) {
                    if let Some(slot) = row.slot(name) {
                        let value = text
                            .unescape()
                            .map_err(|err| SourceError::Malformed(err.to_string()))?;
                        *slot = Some(value.trim().to_string());
                    }
                }
            }
            Ok(Event::End(element)) => {
                if element.local_name().as_ref() == b"Currency" {
                    if let Some(row) = current.take() {
                        collect(row, &mut rates);
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(SourceError::Malformed(err.to_string())),
        }
    }

    if !saw_root || rates.is_empty() {
        return Err(SourceError::Malformed(
            "bulletin carries none of the quoted currencies".into(),
        ));
    }

    Ok(RatesSnapshot {
        requested_date: requested,
        effective_date: bulletin_date.unwrap_or(requested),
        source: FxSource::Primary,
        rates,
        fetched_at: Utc::now(),
    })
}

fn collect(row: CurrencyRow, rates: &mut BTreeMap<Currency, RateSet>) {
    let Ok(currency) = Currency::from_str(&row.code) else {
        return;
    };
    if !Currency::QUOTED.contains(&currency) {
        return;
    }
    match row.into_rates() {
        Some(set) => {
            rates.insert(currency, set);
        }
        None => warn!(%currency, "skipping currency with unparseable rates"),
    }
}

/// Drop everything before the root element: XML declaration, stylesheet instructions and
/// stray whitespace.
fn strip_preamble(body: &str) -> &str {
    let mut rest = body.trim_start_matches('\u{feff}').trim_start();
    while rest.starts_with("<?") || rest.starts_with("<!") {
        let close = if rest.starts_with("<!--") { "-->" } else { ">" };
        match rest.find(close) {
            Some(end) => rest = rest[end + close.len()..].trim_start(),
            None => return "",
        }
    }
    rest
}

fn looks_like_html(xml: &str) -> bool {
    let head: String = xml.chars().take(64).collect::<String>().to_ascii_lowercase();
    head.starts_with("<html") || head.starts_with("<head") || head.starts_with("<body")
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

fn currency_code(element: &BytesStart<'_>) -> String {
    attribute(element, b"CurrencyCode")
        .or_else(|| attribute(element, b"Kod"))
        .unwrap_or_default()
}

fn read_bulletin_date(element: &BytesStart<'_>) -> Option<NaiveDate> {
    let raw = attribute(element, b"Tarih")?;
    match NaiveDate::parse_from_str(raw.trim(), "%d.%m.%Y") {
        Ok(date) => Some(date),
        Err(_) => {
            debug!(value = %raw, "bulletin date attribute not understood");
            None
        }
    }
}

fn parse_number(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(&trimmed.replace(',', ".")).ok()
}
