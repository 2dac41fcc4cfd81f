//! Batch pipeline: setup once, then one isolated pipeline per record
//!
//! The runner owns control flow; the outcome types describe what happened to
//! each record so callers and tests never have to scrape logs.

pub mod outcome;
pub mod runner;

pub use outcome::{RecordFailure, RecordOutcome, RecordState, RunSummary, Stage};
pub use runner::TriageRunner;
