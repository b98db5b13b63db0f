//! Job boundary detection.
//!
//! A job's activity window is bracketed by two records in the log: planning
//! starting on the job's foreman thread, and the query-lifecycle completion
//! entry carrying the job's id. [`JobWindow`] is a three-phase state machine
//! that latches each boundary exactly once; once ended it never regresses,
//! and the analysis loop stops consuming the stream.

use chrono::NaiveDateTime;
use log::debug;

use crate::record::LogRecord;

/// Logger that emits one summary record per completed query, carrying the
/// `queryId` and `queryText` fields.
pub const QUERY_LOGGER: &str = "query.logger";

/// Substring identifying the per-job planning/coordination thread.
const PLANNING_THREAD_MARKER: &str = "foreman";

/// Where the analysis currently stands relative to the job's log window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Start record not seen yet.
    SeekingStart,
    /// Start seen, end not seen: records may belong to the job.
    InJob,
    /// End record seen; terminal.
    Ended,
}

/// Mutable state for one analysis run: the job being searched for and the
/// boundaries found so far.
#[derive(Debug)]
pub struct JobWindow {
    job_id: String,
    phase: Phase,
    start_ts: Option<NaiveDateTime>,
    sql: Option<String>,
}

impl JobWindow {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            phase: Phase::SeekingStart,
            start_ts: None,
            sql: None,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Timestamp of the job-start record, once seen.
    pub fn start_ts(&self) -> Option<NaiveDateTime> {
        self.start_ts
    }

    /// SQL text extracted from the job-end record, once seen.
    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    /// Milliseconds between `ts` and the job's start record.
    ///
    /// Only meaningful after the start boundary has been seen; callers gate
    /// on [`Phase::InJob`] via attribution before computing offsets.
    pub fn offset_ms(&self, ts: NaiveDateTime) -> i64 {
        match self.start_ts {
            Some(start) => ts.signed_duration_since(start).num_milliseconds(),
            None => 0,
        }
    }

    /// Check a record for the job-start boundary: the first record whose
    /// thread names both the job id and the planning marker. Later matches
    /// are ignored; the first one fixes the job's zero-point.
    pub fn observe_start(&mut self, record: &LogRecord) {
        if self.phase != Phase::SeekingStart {
            return;
        }
        if record.thread.contains(&self.job_id) && record.thread.contains(PLANNING_THREAD_MARKER) {
            debug!(
                "job {} started at {} on thread {}",
                self.job_id, record.ts, record.thread
            );
            self.start_ts = Some(record.ts);
            self.phase = Phase::InJob;
        }
    }

    /// Check a record for the job-end boundary: the query-lifecycle record
    /// whose `queryId` matches the job. Captures the job's SQL text.
    ///
    /// Returns `true` when this record closed the window.
    pub fn observe_end(&mut self, record: &LogRecord) -> bool {
        if self.phase != Phase::InJob {
            return false;
        }
        if record.logger == QUERY_LOGGER
            && record.query_id.as_deref() == Some(self.job_id.as_str())
        {
            debug!("job {} ended at {}", self.job_id, record.ts);
            self.sql = record.query_text.clone();
            self.phase = Phase::Ended;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::decode_line;

    fn record(ts: &str, thread: &str, logger: &str) -> LogRecord {
        decode_line(&format!(
            r#"{{"timestamp":"{ts}","thread":"{thread}","logger":"{logger}","message":"m"}}"#
        ))
        .unwrap()
    }

    fn end_record(ts: &str, query_id: &str, sql: &str) -> LogRecord {
        decode_line(&format!(
            r#"{{"timestamp":"{ts}","thread":"out-of-band","logger":"query.logger","message":"done","queryId":"{query_id}","queryText":"{sql}"}}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_start_requires_both_job_id_and_planning_marker() {
        let mut window = JobWindow::new("1a2b3c");

        window.observe_start(&record("2024-05-03 10:00:00,000", "1a2b3c:frag:0:0", "l"));
        assert_eq!(window.phase(), Phase::SeekingStart);

        window.observe_start(&record("2024-05-03 10:00:00,100", "1a2b3c:foreman", "l"));
        assert_eq!(window.phase(), Phase::InJob);
        assert!(window.start_ts().is_some());
    }

    #[test]
    fn test_first_start_record_wins() {
        let mut window = JobWindow::new("1a2b3c");
        window.observe_start(&record("2024-05-03 10:00:00,000", "1a2b3c:foreman", "l"));
        let first = window.start_ts().unwrap();

        window.observe_start(&record("2024-05-03 10:00:05,000", "1a2b3c:foreman", "l"));
        assert_eq!(window.start_ts().unwrap(), first);
    }

    #[test]
    fn test_end_requires_matching_query_id() {
        let mut window = JobWindow::new("1a2b3c");
        window.observe_start(&record("2024-05-03 10:00:00,000", "1a2b3c:foreman", "l"));

        assert!(!window.observe_end(&end_record("2024-05-03 10:00:01,000", "other", "SELECT 2")));
        assert_eq!(window.phase(), Phase::InJob);

        assert!(window.observe_end(&end_record("2024-05-03 10:00:02,000", "1a2b3c", "SELECT 1")));
        assert_eq!(window.phase(), Phase::Ended);
        assert_eq!(window.sql(), Some("SELECT 1"));
    }

    #[test]
    fn test_end_ignored_before_start() {
        let mut window = JobWindow::new("1a2b3c");
        assert!(!window.observe_end(&end_record("2024-05-03 10:00:00,000", "1a2b3c", "SELECT 1")));
        assert_eq!(window.phase(), Phase::SeekingStart);
        assert!(window.sql().is_none());
    }

    #[test]
    fn test_no_regression_after_end() {
        let mut window = JobWindow::new("1a2b3c");
        window.observe_start(&record("2024-05-03 10:00:00,000", "1a2b3c:foreman", "l"));
        window.observe_end(&end_record("2024-05-03 10:00:01,000", "1a2b3c", "SELECT 1"));

        assert!(!window.observe_end(&end_record("2024-05-03 10:00:02,000", "1a2b3c", "SELECT 9")));
        assert_eq!(window.sql(), Some("SELECT 1"));
        assert_eq!(window.phase(), Phase::Ended);
    }

    #[test]
    fn test_offset_ms() {
        let mut window = JobWindow::new("1a2b3c");
        window.observe_start(&record("2024-05-03 10:00:00,250", "1a2b3c:foreman", "l"));

        let later = record("2024-05-03 10:00:01,750", "t", "l");
        assert_eq!(window.offset_ms(later.ts), 1500);

        // Records timestamped before the start produce negative offsets
        let earlier = record("2024-05-03 09:59:59,250", "t", "l");
        assert_eq!(window.offset_ms(earlier.ts), -1000);
    }
}
