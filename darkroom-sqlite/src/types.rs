use darkroom::core::job::{Job, JobKind, JobStatus};
use darkroom::core::{Bytes, DateTime, Xid};
use sqlx::sqlite::SqliteRow;
use sqlx::{Error, FromRow, Row};
use std::str::FromStr;

/// Timestamps are stored as milliseconds since the epoch so they compare correctly in SQL.
pub(crate) fn to_millis(at: DateTime) -> i64 {
    at.timestamp_millis()
}

fn from_millis(column: &str, ms: i64) -> Result<DateTime, Error> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| Error::ColumnDecode {
        index: column.to_string(),
        source: format!("timestamp out of range: {}", ms).into(),
    })
}

fn decode<T>(row: &SqliteRow, column: &str) -> Result<T, Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.try_get(column)?;
    T::from_str(&raw).map_err(|err| Error::Decode(Box::new(err)))
}

#[derive(Debug)]
pub(crate) struct JobRow(pub Job);

impl<'r> FromRow<'r, SqliteRow> for JobRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, Error> {
        let id: Xid = decode(row, "jid")?;
        let subject_id: Xid = decode(row, "subject_id")?;
        let kind: JobKind = decode(row, "kind")?;
        let status: JobStatus = decode(row, "status")?;
        let attempts: u32 = row.try_get("attempts")?;
        let max_attempts: u32 = row.try_get("max_attempts")?;
        let last_error: Option<String> = row.try_get("last_error")?;
        let processed_at = row
            .try_get::<Option<i64>, _>("processed_at")?
            .map(|ms| from_millis("processed_at", ms))
            .transpose()?;
        let payload = row.try_get::<Vec<u8>, _>("payload").map(Bytes::from)?;
        let created_at = from_millis("created_at", row.try_get("created_at")?)?;
        let updated_at = from_millis("updated_at", row.try_get("updated_at")?)?;
        Ok(Self(Job {
            id,
            subject_id,
            kind,
            status,
            attempts,
            max_attempts,
            last_error,
            processed_at,
            payload,
            created_at,
            updated_at,
        }))
    }
}
