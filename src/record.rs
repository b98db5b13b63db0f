//! Decoding of structured server-log lines.
//!
//! The log is JSONL: one self-contained JSON object per line. Every record
//! carries `timestamp`, `thread`, `logger` and `message`; records from the
//! query-lifecycle logger additionally carry `queryId` and `queryText`.
//!
//! Decoding is strict. The structured envelope is a format contract between
//! the server and this tool, so a line that fails to decode (or a timestamp
//! that fails to parse) aborts the whole run — unlike the free-text `message`
//! field inside a record, which is parsed defensively downstream.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Deserialize;

/// Wall-clock format used by the server log, second precision plus a
/// 3-digit millisecond component: `2024-05-03 10:14:07,231`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Wire shape of a log line. Unknown fields are ignored; the two `query*`
/// fields only appear on query-lifecycle records.
#[derive(Debug, Deserialize)]
struct RawRecord {
    timestamp: String,
    thread: String,
    logger: String,
    message: String,
    #[serde(rename = "queryId")]
    query_id: Option<String>,
    #[serde(rename = "queryText")]
    query_text: Option<String>,
}

/// One decoded log line.
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// Wall-clock time the record was emitted (millisecond precision).
    pub ts: NaiveDateTime,
    /// Name of the thread that produced the record.
    pub thread: String,
    /// Logger identity (source/category) of the record.
    pub logger: String,
    /// Free-text message body.
    pub message: String,
    /// Query identifier, present on query-lifecycle records only.
    pub query_id: Option<String>,
    /// Query SQL text, present on query-lifecycle records only.
    pub query_text: Option<String>,
}

/// Decode one log line into a [`LogRecord`].
///
/// Fails on anything that violates the structured-record contract: invalid
/// JSON, missing required fields, or an unparseable timestamp.
pub fn decode_line(line: &str) -> Result<LogRecord> {
    let raw: RawRecord =
        serde_json::from_str(line).context("malformed log record (not a valid JSON record)")?;
    let ts = NaiveDateTime::parse_from_str(&raw.timestamp, TIMESTAMP_FORMAT)
        .with_context(|| format!("bad record timestamp {:?}", raw.timestamp))?;

    Ok(LogRecord {
        ts,
        thread: raw.thread,
        logger: raw.logger,
        message: raw.message,
        query_id: raw.query_id,
        query_text: raw.query_text,
    })
}
