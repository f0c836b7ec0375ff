//! Provider payload shapes and their parsing.
//!
//! The provider reports problems in-band (an `"Error Message"` or a `"Note"`
//! field on a 2xx response), so parsing distinguishes "no data this cycle"
//! from a genuinely malformed payload.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;

use super::errors::QuoteError;

const GLOBAL_QUOTE: &str = "Global Quote";
const DAILY_SERIES: &str = "Time Series (Daily)";
const ERROR_MESSAGE: &str = "Error Message";
const NOTE: &str = "Note";
const INFORMATION: &str = "Information";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quote {
    pub price: Decimal,
    pub volume: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NoData {
    /// `"Error Message"`: unknown symbol, bad parameters, ...
    ProviderError(String),
    /// `"Note"` / `"Information"`: call frequency exceeded.
    RateLimited(String),
    /// Empty `"Global Quote"` object.
    Empty,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuoteFetch {
    Quote(Quote),
    NoData(NoData),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub close: Decimal,
    pub volume: u64,
}

fn notice(body: &Value) -> Option<NoData> {
    if let Some(msg) = body.get(ERROR_MESSAGE) {
        return Some(NoData::ProviderError(text(msg)));
    }
    body.get(NOTE)
        .or_else(|| body.get(INFORMATION))
        .map(|msg| NoData::RateLimited(text(msg)))
}

fn text(v: &Value) -> String {
    v.as_str().map_or_else(|| v.to_string(), str::to_string)
}

fn decimal_field(obj: &Value, key: &str) -> Result<Decimal, QuoteError> {
    let raw = obj
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| QuoteError::Malformed(format!("missing {key:?}")))?;
    Decimal::from_str(raw.trim()).map_err(|e| QuoteError::Malformed(format!("{key:?}={raw:?}: {e}")))
}

fn volume_field(obj: &Value, key: &str) -> Result<u64, QuoteError> {
    match obj.get(key).and_then(Value::as_str) {
        None => Ok(0),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| QuoteError::Malformed(format!("{key:?}={raw:?}: {e}"))),
    }
}

/// Parses a `GLOBAL_QUOTE` response body.
pub fn parse_global_quote(body: &Value) -> Result<QuoteFetch, QuoteError> {
    if let Some(n) = notice(body) {
        return Ok(QuoteFetch::NoData(n));
    }

    let quote = match body.get(GLOBAL_QUOTE) {
        Some(Value::Object(m)) if m.is_empty() => return Ok(QuoteFetch::NoData(NoData::Empty)),
        Some(q @ Value::Object(_)) => q,
        Some(_) => return Err(QuoteError::Malformed(format!("{GLOBAL_QUOTE:?} is not an object"))),
        None => return Ok(QuoteFetch::NoData(NoData::Empty)),
    };

    let price = decimal_field(quote, "05. price")?;
    if price <= Decimal::ZERO {
        return Err(QuoteError::Malformed(format!("non-positive price {price}")));
    }

    Ok(QuoteFetch::Quote(Quote {
        price,
        volume: volume_field(quote, "06. volume")?,
    }))
}

/// Parses a `TIME_SERIES_DAILY` body, keeping only bars within `[from, to]`,
/// sorted by date.
pub fn parse_daily_series(
    body: &Value,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<DailyBar>, QuoteError> {
    if let Some(n) = notice(body) {
        let msg = match n {
            NoData::ProviderError(m) | NoData::RateLimited(m) => m,
            NoData::Empty => String::new(),
        };
        return Err(QuoteError::Rejected(msg));
    }

    let series = body
        .get(DAILY_SERIES)
        .and_then(Value::as_object)
        .ok_or_else(|| QuoteError::Malformed(format!("missing {DAILY_SERIES:?}")))?;

    let mut out = Vec::new();
    for (date_str, values) in series {
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .map_err(|e| QuoteError::Malformed(format!("bad date {date_str:?}: {e}")))?;
        if date < from || date > to {
            continue;
        }
        out.push(DailyBar {
            date,
            close: decimal_field(values, "4. close")?,
            volume: volume_field(values, "5. volume")?,
        });
    }

    out.sort_by_key(|b| b.date);
    Ok(out)
}
