//! Per-record state and the run summary

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Where a record is in its pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Pending,
    SessionOpened,
    Classified,
    Updated,
    Failed,
}

impl RecordState {
    /// Stage that runs next from this state, if any
    pub fn next_stage(self) -> Option<Stage> {
        match self {
            RecordState::Pending => Some(Stage::OpenSession),
            RecordState::SessionOpened => Some(Stage::Classify),
            RecordState::Classified => Some(Stage::Writeback),
            RecordState::Updated | RecordState::Failed => None,
        }
    }
}

/// One remote step of the per-record pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    OpenSession,
    Classify,
    Writeback,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::OpenSession => "open_session",
            Stage::Classify => "classify",
            Stage::Writeback => "writeback",
        };
        f.write_str(name)
    }
}

/// Why a record ended in [`RecordState::Failed`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFailure {
    pub stage: Stage,
    /// Sanitized error text
    pub message: String,
}

/// Final state of one record after its pipeline ran
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordOutcome {
    pub record_id: String,
    pub business_key: String,
    pub state: RecordState,
    pub failure: Option<RecordFailure>,
}

impl RecordOutcome {
    pub fn is_updated(&self) -> bool {
        self.state == RecordState::Updated
    }
}

/// Result of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Server-side match count, which may exceed the processed batch
    pub total_matching: u64,
    pub outcomes: Vec<RecordOutcome>,
}

impl RunSummary {
    /// Records that went through the pipeline, whatever the result
    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_updated()).count()
    }

    pub fn failed(&self) -> usize {
        self.processed() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.outcomes.iter().filter(|o| !o.is_updated())
    }

    /// Closing line for the run; "all processed" does not mean all succeeded
    pub fn summary_line(&self) -> String {
        if self.outcomes.is_empty() {
            return "No cases needed processing".to_string();
        }

        format!(
            "All cases processed: {} updated, {} failed ({} in batch, {} matching)",
            self.succeeded(),
            self.failed(),
            self.processed(),
            self.total_matching
        )
    }
}
