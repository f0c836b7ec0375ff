use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceSource {
    /// The live quote API polled by the ingestion job.
    AlphaVantage,
    Manual,
    Other,
}

impl PriceSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlphaVantage => "ALPHA_VANTAGE",
            Self::Manual => "MANUAL",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALPHA_VANTAGE" => Ok(Self::AlphaVantage),
            "MANUAL" => Ok(Self::Manual),
            "OTHER" => Ok(Self::Other),
            other => Err(anyhow!("unknown price source: {other}")),
        }
    }
}

/// One observation in the append-only price series.
///
/// At most one record exists per (stock_id, timestamp); records are never
/// updated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub id: Uuid,
    pub stock_id: Uuid,
    pub price: Decimal,
    pub volume: u64,
    pub source: PriceSource,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewPrice {
    pub stock_id: Uuid,
    pub price: Decimal,
    pub volume: i64,
    pub source: PriceSource,
    pub timestamp: DateTime<Utc>,
}

impl NewPrice {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.price <= Decimal::ZERO {
            return Err(ValidationError::NonPositivePrice);
        }
        if self.volume < 0 {
            return Err(ValidationError::NegativeVolume);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Created(PriceRecord),
    /// A record for the same (stock, timestamp) already existed; nothing written.
    Duplicate,
}

impl InsertOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceStatistics {
    pub count: usize,
    pub avg: Decimal,
    pub min: Decimal,
    pub max: Decimal,
}

impl PriceStatistics {
    /// `Ok(None)` for an empty series. Errors when the sum leaves the
    /// `Decimal` range.
    pub fn from_records(records: &[PriceRecord]) -> anyhow::Result<Option<Self>> {
        let Some(first) = records.first() else {
            return Ok(None);
        };
        let mut min = first.price;
        let mut max = first.price;
        let mut sum = Decimal::ZERO;

        for r in records {
            min = min.min(r.price);
            max = max.max(r.price);
            sum = sum
                .checked_add(r.price)
                .ok_or_else(|| anyhow!("price sum overflowed over {} records", records.len()))?;
        }

        let count = records.len();
        let avg = sum
            .checked_div(Decimal::from(count))
            .ok_or_else(|| anyhow!("average price out of range"))?;
        Ok(Some(Self {
            count,
            avg: avg.round_dp(4),
            min,
            max,
        }))
    }
}

/// Percentage move from `previous` to `current`, rounded to 2 places.
/// `None` when there is no usable baseline, including a move too large to
/// represent.
pub fn percentage_change(current: Decimal, previous: Decimal) -> Option<Decimal> {
    if previous.is_zero() {
        return None;
    }
    let change = current
        .checked_sub(previous)?
        .checked_div(previous)?
        .checked_mul(Decimal::ONE_HUNDRED)?;
    Some(change.round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(price: Decimal) -> PriceRecord {
        PriceRecord {
            id: Uuid::new_v4(),
            stock_id: Uuid::nil(),
            price,
            volume: 0,
            source: PriceSource::Manual,
            timestamp: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn percentage_change_rounds_to_two_places() {
        let pc = percentage_change(Decimal::new(110, 0), Decimal::new(100, 0)).unwrap();
        assert_eq!(pc, Decimal::new(1000, 2));

        let pc = percentage_change(Decimal::new(2, 0), Decimal::new(3, 0)).unwrap();
        assert_eq!(pc, Decimal::new(-3333, 2));

        assert_eq!(percentage_change(Decimal::ONE, Decimal::ZERO), None);
    }

    #[test]
    fn percentage_change_out_of_range_is_none() {
        let tiny = Decimal::new(1, 10);
        assert_eq!(percentage_change(Decimal::MAX, tiny), None);
        assert_eq!(percentage_change(Decimal::from(10i64.pow(18)), tiny), None);
    }

    #[test]
    fn statistics_overflow_is_an_error() {
        let series = vec![rec(Decimal::MAX), rec(Decimal::MAX)];
        assert!(PriceStatistics::from_records(&series).is_err());
    }

    #[test]
    fn statistics_over_series() {
        let series = vec![
            rec(Decimal::new(10, 0)),
            rec(Decimal::new(30, 0)),
            rec(Decimal::new(20, 0)),
        ];
        let s = PriceStatistics::from_records(&series).unwrap().unwrap();

        assert_eq!(s.count, 3);
        assert_eq!(s.min, Decimal::new(10, 0));
        assert_eq!(s.max, Decimal::new(30, 0));
        assert_eq!(s.avg, Decimal::new(20, 0));

        assert!(PriceStatistics::from_records(&[]).unwrap().is_none());
    }

    #[test]
    fn new_price_validation() {
        let mut p = NewPrice {
            stock_id: Uuid::nil(),
            price: Decimal::new(1, 0),
            volume: 0,
            source: PriceSource::Manual,
            timestamp: Utc::now(),
        };
        assert!(p.validate().is_ok());

        p.volume = -1;
        assert_eq!(p.validate(), Err(ValidationError::NegativeVolume));

        p.volume = 0;
        p.price = Decimal::ZERO;
        assert_eq!(p.validate(), Err(ValidationError::NonPositivePrice));
    }

    #[test]
    fn record_survives_json_round_trip_for_cache() {
        let r = rec(Decimal::new(17550, 2));
        let json = serde_json::to_string(&r).unwrap();
        let back: PriceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
        assert_eq!(back.price.to_string(), "175.50");
    }
}
