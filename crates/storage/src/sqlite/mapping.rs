use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Unique violations become `Conflict`, broken references `NotFound`.
pub(crate) fn db(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(inner) if inner.is_unique_violation() => StorageError::Conflict,
        sqlx::Error::Database(inner) if inner.is_foreign_key_violation() => StorageError::NotFound,
        sqlx::Error::RowNotFound => StorageError::NotFound,
        _ => StorageError::Connection(e.to_string()),
    }
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn bind_id(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn id_col<T>(
    row: &SqliteRow,
    col: &'static str,
    make: fn(u64) -> T,
) -> Result<T, StorageError> {
    let raw: i64 = row.try_get(col).map_err(ser)?;
    Ok(make(i64_to_u64(col, raw)?))
}

pub(crate) fn opt_id_col<T>(
    row: &SqliteRow,
    col: &'static str,
    make: fn(u64) -> T,
) -> Result<Option<T>, StorageError> {
    let raw: Option<i64> = row.try_get(col).map_err(ser)?;
    raw.map(|v| i64_to_u64(col, v).map(make)).transpose()
}

pub(crate) fn u32_col(row: &SqliteRow, col: &'static str) -> Result<u32, StorageError> {
    let raw: i64 = row.try_get(col).map_err(ser)?;
    u32::try_from(raw).map_err(|_| StorageError::Serialization(format!("invalid {col}: {raw}")))
}

pub(crate) fn opt_u32_col(row: &SqliteRow, col: &'static str) -> Result<Option<u32>, StorageError> {
    let raw: Option<i64> = row.try_get(col).map_err(ser)?;
    raw.map(|v| {
        u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {col}: {v}")))
    })
    .transpose()
}

pub(crate) fn text_col(row: &SqliteRow, col: &'static str) -> Result<String, StorageError> {
    row.try_get(col).map_err(ser)
}

pub(crate) fn opt_text_col(
    row: &SqliteRow,
    col: &'static str,
) -> Result<Option<String>, StorageError> {
    row.try_get(col).map_err(ser)
}

pub(crate) fn time_col(row: &SqliteRow, col: &'static str) -> Result<DateTime<Utc>, StorageError> {
    row.try_get(col).map_err(ser)
}

pub(crate) fn opt_time_col(
    row: &SqliteRow,
    col: &'static str,
) -> Result<Option<DateTime<Utc>>, StorageError> {
    row.try_get(col).map_err(ser)
}

pub(crate) fn bool_col(row: &SqliteRow, col: &'static str) -> Result<bool, StorageError> {
    let raw: i64 = row.try_get(col).map_err(ser)?;
    Ok(raw != 0)
}

pub(crate) fn count_col(row: &SqliteRow) -> Result<u64, StorageError> {
    let raw: i64 = row.try_get("n").map_err(ser)?;
    i64_to_u64("count", raw)
}
