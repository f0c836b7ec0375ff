//! Row mapping helpers shared by the sqlx repositories.

use std::str::FromStr;

use anyhow::{Context, anyhow};
use rust_decimal::Decimal;
use sqlx::Row;
use sqlx::any::AnyRow;
use uuid::Uuid;

pub fn uuid_col(r: &AnyRow, col: &str) -> anyhow::Result<Uuid> {
    let raw: String = r.try_get(col)?;
    Uuid::parse_str(&raw).with_context(|| format!("invalid uuid in {col}: {raw}"))
}

pub fn opt_uuid_col(r: &AnyRow, col: &str) -> anyhow::Result<Option<Uuid>> {
    let raw: Option<String> = r.try_get(col)?;
    raw.map(|s| Uuid::parse_str(&s).with_context(|| format!("invalid uuid in {col}: {s}")))
        .transpose()
}

pub fn decimal_col(r: &AnyRow, col: &str) -> anyhow::Result<Decimal> {
    let raw: String = r.try_get(col)?;
    Decimal::from_str(&raw).with_context(|| format!("invalid decimal in {col}: {raw}"))
}

pub fn flag_col(r: &AnyRow, col: &str) -> anyhow::Result<bool> {
    match r.try_get::<i64, _>(col)? {
        0 => Ok(false),
        1 => Ok(true),
        v => Err(anyhow!("out of range flag in {col}: {v}")),
    }
}

pub fn flag(v: bool) -> i64 {
    i64::from(v)
}

pub fn u64_to_i64(v: u64) -> anyhow::Result<i64> {
    i64::try_from(v).map_err(|_| anyhow!("u64 too large for i64: {v}"))
}

pub fn i64_to_u64(v: i64) -> anyhow::Result<u64> {
    u64::try_from(v).map_err(|_| anyhow!("negative i64 where u64 expected: {v}"))
}

/// Parses a stored enum label (`PRICE_ABOVE`, `PENDING`, ...).
pub fn enum_col<T>(r: &AnyRow, col: &str) -> anyhow::Result<T>
where
    T: FromStr<Err = anyhow::Error>,
{
    let raw: String = r.try_get(col)?;
    raw.parse::<T>().with_context(|| format!("invalid value in {col}"))
}
