//! Reconstruct a query job's storage-access timeline from its server log.
//!
//! The server interleaves log output from many worker threads into one JSONL
//! file. Given a job id, this crate finds the job's activity window in that
//! stream, attributes records to the job (thread-name heuristics — see
//! [`attribution`] for the preconditions this implies), parses filesystem
//! and object-storage operations into events on a relative clock, and
//! renders them as an interactive HTML timeline.
//!
//! # Usage
//!
//! ```ignore
//! use iotimeline::{analyze, render_report};
//!
//! let reader = std::io::BufReader::new(std::fs::File::open("server.json")?);
//! if let Some(timeline) = analyze(reader, "1a2b3c", 1)? {
//!     let html = render_report(&timeline, 3.0)?;
//! }
//! ```

pub mod attribution;
pub mod boundary;
pub mod ops;
pub mod record;
pub mod report;
pub mod timeline;

// Re-export main types for convenience
pub use boundary::{JobWindow, Phase};
pub use ops::{Event, Layer};
pub use record::LogRecord;
pub use report::render_report;
pub use timeline::{JobTimeline, analyze};
