//! Deciding which log records belong to the job under analysis.
//!
//! Most records carry no job identifier; thread-name substring matching is
//! the only causal link available. Background workers (transfer pools,
//! manifest writers, async storage clients, metadata fetchers) run on shared
//! threads that never name the job, so a fixed allowlist of their thread-name
//! markers stands in for the missing identifier.
//!
//! This is inherently heuristic: a concurrently running job using the same
//! helper pools would have its IO attributed to the job being analyzed.
//! Jobs must run in isolation for the analysis to be correct — that is a
//! documented usage precondition of the tool, not something this module can
//! detect.

use crate::boundary::{JobWindow, Phase, QUERY_LOGGER};
use crate::record::LogRecord;

/// Thread-name markers for background workers spawned on behalf of a job.
/// Extending support for another helper pool means adding its marker here.
pub const AUX_THREAD_MARKERS: [&str; 4] = [
    "s3a-transfer",
    "manifest-writers",
    "s3-async",
    "delta-metadata-fetch",
];

/// Is `record` part of the job's activity window?
///
/// Requires the window to be open (start seen, end not yet seen) and the
/// record to be timestamped at or after the start, then any of:
/// the thread names the job id, the thread names a known auxiliary worker,
/// or the record is the job's own query-lifecycle entry.
pub fn is_for_job(window: &JobWindow, record: &LogRecord) -> bool {
    if window.phase() != Phase::InJob {
        return false;
    }
    let Some(start_ts) = window.start_ts() else {
        return false;
    };
    if record.ts < start_ts {
        return false;
    }

    record.thread.contains(window.job_id())
        || AUX_THREAD_MARKERS.iter().any(|m| record.thread.contains(m))
        || (record.logger == QUERY_LOGGER
            && record.query_id.as_deref() == Some(window.job_id()))
}
