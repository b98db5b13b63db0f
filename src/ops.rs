//! Operation-specific message parsers.
//!
//! Attributed records are dispatched by logger identity to one of three
//! extractors: the filesystem logger's timed-operation format, or one of the
//! two object-storage SDK request formats (v1 and v2 SDKs log their outbound
//! requests with differently shaped descriptors). Each branch owns its own
//! pattern and its own failure policy; there is no format sniffing.
//!
//! Failure policy differs deliberately. The filesystem logger emits several
//! message shapes at TRACE level, so a non-matching message there is an
//! expected, silent skip. The storage request loggers are gated on a fixed
//! "Sending Request:" marker — once that marker is present, a failed
//! extraction means the SDK's log format drifted and the run must stop
//! rather than silently drop IO from the timeline.

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::record::LogRecord;

/// Filesystem access logger; emits `<op> elapsed=<n>ms scheme=<s> path=<p>`
/// trace lines for completed operations, among other shapes.
pub const FILESYSTEM_LOGGER: &str = "com.dremio.exec.store.dfs.LoggedFileSystem";

/// v1 storage SDK request logger.
pub const AWS_V1_REQUEST_LOGGER: &str = "com.amazonaws.request";

/// v2 storage SDK request logger.
pub const AWS_V2_REQUEST_LOGGER: &str = "software.amazon.awssdk.request";

/// Marker present on every outbound-request record from both SDK loggers.
const SENDING_REQUEST_MARKER: &str = "Sending Request:";

static FS_OP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\S+) elapsed=(\d+)ms scheme=(\w+) path=(\S+)").unwrap()
});
static AWS_V1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Sending Request: (\w+) \S+ (\S+)").unwrap());
static AWS_V2_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Sending Request: DefaultSdkHttpFullRequest\(httpMethod=(\w+).* encodedPath=([^ ,]+)")
        .unwrap()
});

/// Category of a timeline operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Layer {
    /// Local / distributed filesystem access. Sorts before [`Layer::S3`]
    /// when events share a start time.
    #[serde(rename = "FS")]
    Fs,
    /// Remote object-storage request.
    #[serde(rename = "S3")]
    S3,
}

/// One timed operation on the job's timeline. Immutable once constructed;
/// the analysis only ever appends events, never mutates or removes them.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub layer: Layer,
    /// Thread the operation ran on.
    pub thread: String,
    /// Shortened path/URL the operation targeted (see [`short_resource`]).
    pub resource: String,
    /// Operation name: `open`/`read`/`close`/... for FS, HTTP verb for S3.
    pub op: String,
    /// Milliseconds since job start. Negative values are legitimate — a
    /// back-computed start can precede the detected job-start boundary
    /// (e.g. connection setup) and is preserved, not clamped.
    pub start_ms: i64,
    /// Duration in milliseconds. `None` for storage requests, where only
    /// the outbound send is observed, never the completion.
    pub elapsed_ms: Option<i64>,
}

/// Shorten a path or URL to `grandparent-dir/filename`.
///
/// Full paths are too long to label chart rows with, but a bare filename
/// is ambiguous across datasets; keeping one parent directory is enough to
/// disambiguate in practice.
pub fn short_resource(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    let mut parts = trimmed.rsplitn(3, '/');
    let file = parts.next().unwrap_or_default();
    match parts.next() {
        Some(parent) if !parent.is_empty() => format!("{parent}/{file}"),
        _ => file.to_string(),
    }
}

/// Parse an attributed filesystem-logger record into an event.
///
/// Returns `None` both for messages that don't follow the timed-operation
/// shape (the logger emits other TRACE messages too) and for operations
/// shorter than `min_elapsed_ms` (a display-noise filter; sub-threshold
/// operations are dropped before an event is ever constructed).
///
/// The logger records completion, not start, so the event's start is
/// back-computed: `offset_ms - elapsed_ms`.
pub fn parse_fs_operation(
    record: &LogRecord,
    offset_ms: i64,
    min_elapsed_ms: i64,
) -> Option<Event> {
    let caps = FS_OP_RE.captures(&record.message)?;
    let elapsed_ms: i64 = caps[2].parse().ok()?;
    if elapsed_ms < min_elapsed_ms {
        return None;
    }

    Some(Event {
        layer: Layer::Fs,
        thread: record.thread.clone(),
        resource: short_resource(&caps[4]),
        op: caps[1].to_string(),
        start_ms: offset_ms - elapsed_ms,
        elapsed_ms: Some(elapsed_ms),
    })
}

/// Does this record announce an outbound object-storage request?
pub fn is_storage_request(record: &LogRecord) -> bool {
    (record.logger == AWS_V1_REQUEST_LOGGER || record.logger == AWS_V2_REQUEST_LOGGER)
        && record.message.contains(SENDING_REQUEST_MARKER)
}

/// Parse a storage-request record (v1 or v2 format, picked by logger) into
/// an event. Only the send is observed, so `elapsed_ms` is unknown and
/// `start_ms` is the record's own offset.
///
/// The caller must have checked [`is_storage_request`]; a gated message
/// that still fails extraction is format drift and therefore an error.
pub fn parse_storage_request(record: &LogRecord, offset_ms: i64) -> Result<Event> {
    let caps = if record.logger == AWS_V1_REQUEST_LOGGER {
        AWS_V1_RE.captures(&record.message)
    } else if record.logger == AWS_V2_REQUEST_LOGGER {
        AWS_V2_RE.captures(&record.message)
    } else {
        bail!("not a storage request logger: {}", record.logger);
    };
    let caps = caps.with_context(|| {
        format!(
            "unrecognized storage request format from {}: {:?}",
            record.logger, record.message
        )
    })?;

    Ok(Event {
        layer: Layer::S3,
        thread: record.thread.clone(),
        resource: short_resource(&caps[2]),
        op: caps[1].to_string(),
        start_ms: offset_ms,
        elapsed_ms: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::decode_line;
    use rstest::rstest;

    fn fs_record(message: &str) -> LogRecord {
        decode_line(&format!(
            r#"{{"timestamp":"2024-05-03 10:00:01,000","thread":"1a2b3c:frag:0:0","logger":"{FILESYSTEM_LOGGER}","message":"{message}"}}"#
        ))
        .unwrap()
    }

    fn request_record(logger: &str, message: &str) -> LogRecord {
        let escaped = message.replace('"', "\\\"");
        decode_line(&format!(
            r#"{{"timestamp":"2024-05-03 10:00:01,000","thread":"s3a-transfer-worker-1","logger":"{logger}","message":"{escaped}"}}"#
        ))
        .unwrap()
    }

    #[rstest]
    #[case("a/b/c/file.parquet", "c/file.parquet")]
    #[case("c/file.parquet", "c/file.parquet")]
    #[case("file.parquet", "file.parquet")]
    #[case("/file.parquet", "file.parquet")]
    #[case(
        "https://bucket.s3.amazonaws.com/warehouse/table/part-00.parquet",
        "table/part-00.parquet"
    )]
    fn test_short_resource(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(short_resource(input), expected);
    }

    #[test]
    fn test_short_resource_is_idempotent() {
        let once = short_resource("a/b/c/file.txt");
        assert_eq!(once, "c/file.txt");
        assert_eq!(short_resource(&once), once);
    }

    #[test]
    fn test_fs_operation_back_computes_start() {
        let record = fs_record(
            "read elapsed=40ms scheme=dremioS3 path=/bucket/warehouse/table/part-00.parquet",
        );
        let event = parse_fs_operation(&record, 100, 1).unwrap();
        assert_eq!(event.layer, Layer::Fs);
        assert_eq!(event.op, "read");
        assert_eq!(event.resource, "table/part-00.parquet");
        assert_eq!(event.start_ms, 60);
        assert_eq!(event.elapsed_ms, Some(40));
    }

    #[test]
    fn test_fs_operation_start_can_go_negative() {
        // An open that began before the detected job start: preserved as-is
        let record = fs_record("open elapsed=250ms scheme=dremioS3 path=a/b/c/f.parquet");
        let event = parse_fs_operation(&record, 100, 1).unwrap();
        assert_eq!(event.start_ms, -150);
    }

    #[test]
    fn test_fs_operation_below_min_elapsed_is_dropped() {
        let record = fs_record("open elapsed=0ms scheme=dremioS3 path=a/b/c/f.parquet");
        assert!(parse_fs_operation(&record, 100, 1).is_none());

        let record = fs_record("open elapsed=1ms scheme=dremioS3 path=a/b/c/f.parquet");
        assert!(parse_fs_operation(&record, 100, 1).is_some());
    }

    #[test]
    fn test_fs_operation_other_message_shapes_skip_silently() {
        let record = fs_record("waiting for upload to complete on stream 7");
        assert!(parse_fs_operation(&record, 100, 1).is_none());
    }

    #[test]
    fn test_v1_request() {
        let record = request_record(
            AWS_V1_REQUEST_LOGGER,
            "Sending Request: GET https://bucket.s3.amazonaws.com /warehouse/table/part-00.parquet Headers: ()",
        );
        assert!(is_storage_request(&record));
        let event = parse_storage_request(&record, 75).unwrap();
        assert_eq!(event.layer, Layer::S3);
        assert_eq!(event.op, "GET");
        assert_eq!(event.resource, "table/part-00.parquet");
        assert_eq!(event.start_ms, 75);
        assert_eq!(event.elapsed_ms, None);
    }

    #[test]
    fn test_v2_request() {
        let record = request_record(
            AWS_V2_REQUEST_LOGGER,
            "Sending Request: DefaultSdkHttpFullRequest(httpMethod=HEAD, protocol=https, host=bucket.s3.amazonaws.com, encodedPath=/warehouse/table/metadata.json, headers=[...])",
        );
        assert!(is_storage_request(&record));
        let event = parse_storage_request(&record, 12).unwrap();
        assert_eq!(event.op, "HEAD");
        assert_eq!(event.resource, "table/metadata.json");
        assert_eq!(event.elapsed_ms, None);
    }

    #[test]
    fn test_gated_request_with_unrecognized_shape_is_fatal() {
        let record = request_record(AWS_V2_REQUEST_LOGGER, "Sending Request: (redacted)");
        assert!(is_storage_request(&record));
        let err = parse_storage_request(&record, 12).unwrap_err();
        assert!(err.to_string().contains("unrecognized storage request"));
    }

    #[test]
    fn test_marker_required_for_gating() {
        let record = request_record(AWS_V1_REQUEST_LOGGER, "Received response: 200 OK");
        assert!(!is_storage_request(&record));
    }
}
