use crate::error::TriageError;
use crate::model::Record;
use crate::pipeline::{RunSummary, Stage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod log_reporter;
pub use log_reporter::LogProgress;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressMessage {
    pub timestamp: DateTime<Utc>,
    pub event_type: ProgressEventType,
    /// 1-based position in the batch
    pub position: Option<usize>,
    pub total: Option<usize>,
    pub business_key: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ProgressEventType {
    BatchStart,
    RecordStart,
    RecordComplete,
    RecordError,
    BatchComplete,
}

impl ProgressMessage {
    pub fn new(event_type: ProgressEventType, message: String) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            position: None,
            total: None,
            business_key: None,
            message,
        }
    }

    pub fn with_record(mut self, position: usize, total: usize, record: &Record) -> Self {
        self.position = Some(position);
        self.total = Some(total);
        self.business_key = Some(record.business_key().to_string());
        self
    }

    /// `[3/10]`-style prefix, empty for batch-level messages
    pub fn counter(&self) -> String {
        match (self.position, self.total) {
            (Some(position), Some(total)) => format!("[{position}/{total}]"),
            _ => String::new(),
        }
    }
}

/// Observability sink for a triage run
///
/// Failed records still advance progress: `on_step` is followed by exactly one
/// of `on_success` or `on_error` for every record.
#[async_trait]
pub trait TriageProgress: Send + Sync {
    async fn on_batch_start(&self, batch_size: usize, total_matching: u64);
    async fn on_step(&self, position: usize, total: usize, record: &Record);
    async fn on_success(&self, position: usize, total: usize, record: &Record);
    async fn on_error(
        &self,
        position: usize,
        total: usize,
        record: &Record,
        stage: Stage,
        error: &TriageError,
    );
    async fn on_finish(&self, summary: &RunSummary);
}

pub struct NoOpProgress;

#[async_trait]
impl TriageProgress for NoOpProgress {
    async fn on_batch_start(&self, _batch_size: usize, _total_matching: u64) {}
    async fn on_step(&self, _position: usize, _total: usize, _record: &Record) {}
    async fn on_success(&self, _position: usize, _total: usize, _record: &Record) {}
    async fn on_error(
        &self,
        _position: usize,
        _total: usize,
        _record: &Record,
        _stage: Stage,
        _error: &TriageError,
    ) {
    }
    async fn on_finish(&self, _summary: &RunSummary) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        serde_json::from_value(serde_json::json!({"Id": "500A", "CaseNumber": "00042"})).unwrap()
    }

    #[test]
    fn test_progress_message_creation() {
        let msg = ProgressMessage::new(ProgressEventType::BatchStart, "Starting".to_string());

        assert_eq!(msg.event_type, ProgressEventType::BatchStart);
        assert!(msg.position.is_none());
        assert!(msg.business_key.is_none());
        assert_eq!(msg.counter(), "");
    }

    #[test]
    fn test_progress_message_with_record() {
        let msg = ProgressMessage::new(ProgressEventType::RecordStart, "Processing".to_string())
            .with_record(3, 10, &record());

        assert_eq!(msg.counter(), "[3/10]");
        assert_eq!(msg.business_key.as_deref(), Some("00042"));
    }
}
