#![warn(missing_docs)]
//! Crosscheck Report - Run Reports and Publishers
//!
//! This crate holds the immutable record of one experiment run and the
//! publishing side of the pipeline:
//! - `Report` partitions candidate observations into matched, mismatched,
//!   and ignored sets
//! - `Publisher` is the sink interface consumed by the execution engine
//! - `LogPublisher` logs mismatches through `tracing`; `JsonLinesPublisher`
//!   writes serde snapshots as JSON lines

mod publisher;
mod report;
mod snapshot;

pub use publisher::{JsonLinesPublisher, LogPublisher, Publisher};
pub use report::Report;
pub use snapshot::{ObservationRecord, ObservationStatus, ReportSnapshot};
