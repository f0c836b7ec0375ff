use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Instants are persisted as UTC epoch milliseconds.
pub fn to_ms(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

pub fn from_ms(ms: i64) -> anyhow::Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| anyhow!("timestamp out of range: {ms}"))
}

pub fn opt_from_ms(ms: Option<i64>) -> anyhow::Result<Option<DateTime<Utc>>> {
    ms.map(from_ms).transpose()
}

/// Start of the fixed-size bucket containing `t`.
///
/// Quotes observed within the same ingestion window share one timestamp, so
/// overlapping or repeated runs collide on the (stock, timestamp) key.
pub fn bucket_start(t: DateTime<Utc>, every: Duration) -> anyhow::Result<DateTime<Utc>> {
    let width = i64::try_from(every.as_millis())
        .map_err(|_| anyhow!("bucket width too large: {every:?}"))?
        .max(1);
    let ms = to_ms(t);
    from_ms(ms - ms.rem_euclid(width))
}

/// Next instant strictly after `now` whose UTC wall clock reads `hour`:00.
pub fn next_daily_at(now: DateTime<Utc>, hour: u32) -> anyhow::Result<DateTime<Utc>> {
    let at = NaiveTime::from_hms_opt(hour, 0, 0).ok_or_else(|| anyhow!("hour out of range: {hour}"))?;
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        return Ok(today);
    }
    today
        .checked_add_days(Days::new(1))
        .ok_or_else(|| anyhow!("no day after {today}"))
}

/// `now` minus a caller-supplied number of days.
pub fn days_before(now: DateTime<Utc>, days: i64) -> anyhow::Result<DateTime<Utc>> {
    chrono::Duration::try_days(days)
        .and_then(|d| now.checked_sub_signed(d))
        .ok_or_else(|| anyhow!("{days} days before {now} is out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn ms_round_trip_keeps_millisecond_precision() {
        let t = at("2024-03-01T10:15:30.123Z");
        assert_eq!(from_ms(to_ms(t)).unwrap(), t);
    }

    #[test]
    fn bucket_start_truncates_to_window() {
        let t = at("2024-03-01T10:29:59Z");
        let b = bucket_start(t, Duration::from_secs(900)).unwrap();
        assert_eq!(b, at("2024-03-01T10:15:00Z"));

        // Boundary instants are their own bucket.
        assert_eq!(bucket_start(b, Duration::from_secs(900)).unwrap(), b);
        assert!(bucket_start(t, Duration::MAX).is_err());
    }

    #[test]
    fn next_daily_at_rolls_over_after_the_hour() {
        let before = at("2024-03-01T01:59:00Z");
        assert_eq!(next_daily_at(before, 2).unwrap(), at("2024-03-01T02:00:00Z"));

        let exactly = at("2024-03-01T02:00:00Z");
        assert_eq!(next_daily_at(exactly, 2).unwrap(), at("2024-03-02T02:00:00Z"));

        assert!(next_daily_at(before, 24).is_err());
    }

    #[test]
    fn days_before_rejects_out_of_range_spans() {
        let now = at("2024-03-31T12:00:00Z");
        assert_eq!(days_before(now, 30).unwrap(), at("2024-03-01T12:00:00Z"));
        assert!(days_before(now, i64::MAX).is_err());
        assert!(days_before(now, i64::MIN).is_err());
    }
}
