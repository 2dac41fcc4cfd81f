use super::{ProgressEventType, ProgressMessage, TriageProgress};
use crate::error::TriageError;
use crate::model::Record;
use crate::pipeline::{RunSummary, Stage};
use async_trait::async_trait;
use tracing::{error, info};

/// Progress reporter that writes `[i/N]` lines through `tracing`
#[derive(Debug, Default)]
pub struct LogProgress;

impl LogProgress {
    pub fn new() -> Self {
        Self
    }

    fn emit(&self, message: &ProgressMessage) {
        let key = message.business_key.as_deref().unwrap_or("-");
        match message.event_type {
            ProgressEventType::RecordError => error!(
                case_number = key,
                "{} {}",
                message.counter(),
                message.message
            ),
            ProgressEventType::BatchStart | ProgressEventType::BatchComplete => {
                info!("{}", message.message)
            }
            ProgressEventType::RecordStart | ProgressEventType::RecordComplete => info!(
                case_number = key,
                "{} {}",
                message.counter(),
                message.message
            ),
        }
    }
}

#[async_trait]
impl TriageProgress for LogProgress {
    async fn on_batch_start(&self, batch_size: usize, total_matching: u64) {
        self.emit(&ProgressMessage::new(
            ProgressEventType::BatchStart,
            format!("Processing {batch_size} case(s) ({total_matching} matching the query)"),
        ));
    }

    async fn on_step(&self, position: usize, total: usize, record: &Record) {
        self.emit(
            &ProgressMessage::new(
                ProgressEventType::RecordStart,
                format!("Triaging case {}", record.business_key()),
            )
            .with_record(position, total, record),
        );
    }

    async fn on_success(&self, position: usize, total: usize, record: &Record) {
        self.emit(
            &ProgressMessage::new(
                ProgressEventType::RecordComplete,
                format!("Case {} updated", record.business_key()),
            )
            .with_record(position, total, record),
        );
    }

    async fn on_error(
        &self,
        position: usize,
        total: usize,
        record: &Record,
        stage: Stage,
        _error: &TriageError,
    ) {
        // Error detail is logged by the runner at the failure boundary
        self.emit(
            &ProgressMessage::new(
                ProgressEventType::RecordError,
                format!("Case {} failed at {stage}", record.business_key()),
            )
            .with_record(position, total, record),
        );
    }

    async fn on_finish(&self, summary: &RunSummary) {
        self.emit(&ProgressMessage::new(
            ProgressEventType::BatchComplete,
            summary.summary_line(),
        ));
    }
}
