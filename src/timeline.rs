//! Single-pass log analysis.
//!
//! One ordered pass over the log lines, threading a [`JobWindow`] through
//! each step: decode, check for the start boundary, attribute, dispatch to
//! an operation parser, check for the end boundary. Reaching the end record
//! short-circuits the pass — once the job's window closes, the rest of the
//! stream is irrelevant.
//!
//! The analyzer itself is strictly sequential; the only concurrency in the
//! picture is inside the system being analyzed, whose worker threads
//! interleave their output into the one log file. Attribution (see
//! [`crate::attribution`]) reconstructs that interleaving after the fact.

use std::io::BufRead;

use anyhow::{Context, Result};
use log::debug;

use crate::attribution::is_for_job;
use crate::boundary::{JobWindow, Phase};
use crate::ops::{
    Event, FILESYSTEM_LOGGER, is_storage_request, parse_fs_operation, parse_storage_request,
};
use crate::record::decode_line;

/// Result of a successful analysis: the job's SQL and its ordered events.
#[derive(Debug)]
pub struct JobTimeline {
    /// SQL text of the job, from the query-lifecycle end record.
    pub sql: String,
    /// Events ordered for presentation: by `start_ms`, filesystem before
    /// storage requests on ties.
    pub events: Vec<Event>,
}

/// Scan the log for `job_id`'s activity window and collect its operations.
///
/// Returns `Ok(None)` when the job's window is never found or never closes
/// — an expected outcome (wrong id, incomplete log), not an error. Errors
/// are reserved for contract violations: unreadable input, malformed
/// records, or storage-request messages that fail extraction.
pub fn analyze(input: impl BufRead, job_id: &str, min_elapsed_ms: i64) -> Result<Option<JobTimeline>> {
    let mut window = JobWindow::new(job_id);
    let mut events: Vec<Event> = Vec::new();

    for (idx, line) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("failed reading log line {line_no}"))?;
        let record = decode_line(&line)
            .with_context(|| format!("invalid log record at line {line_no}: {line:?}"))?;

        window.observe_start(&record);

        if !is_for_job(&window, &record) {
            continue;
        }
        let offset_ms = window.offset_ms(record.ts);

        if record.logger == FILESYSTEM_LOGGER {
            if let Some(event) = parse_fs_operation(&record, offset_ms, min_elapsed_ms) {
                events.push(event);
            }
        } else if is_storage_request(&record) {
            let event = parse_storage_request(&record, offset_ms)
                .with_context(|| format!("at log line {line_no}"))?;
            events.push(event);
        } else if window.observe_end(&record) {
            // Window closed: the rest of the stream can't belong to the job
            break;
        }
    }

    if window.phase() != Phase::Ended {
        debug!("no complete window found for job {job_id}");
        return Ok(None);
    }
    let sql = window
        .sql()
        .context("query-lifecycle end record is missing queryText")?
        .to_string();

    debug!("job {job_id}: {} events", events.len());
    events.sort_by_key(|e| (e.start_ms, e.layer));
    Ok(Some(JobTimeline { sql, events }))
}
