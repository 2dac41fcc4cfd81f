//! Triage run orchestrator
//!
//! Setup runs once (identity token, CRM session, record batch) and any failure
//! there aborts the run. Each record then goes through open-session, classify
//! and writeback inside its own failure boundary: an error is logged, the
//! record is marked failed, and the next record starts.

use crate::classifier::{ClassifierApi, ClassifierClient};
use crate::config::{ClientCredentials, TriageConfig};
use crate::crm::{CrmApi, CrmClient, CrmSession};
use crate::error::{TriageError, TriageResult};
use crate::identity::{CommandIdentityProvider, Credential, IdentityProvider};
use crate::model::{Batch, Record};
use crate::pipeline::outcome::{RecordFailure, RecordOutcome, RecordState, RunSummary, Stage};
use crate::progress::{LogProgress, NoOpProgress, TriageProgress};
use crate::{record_span, setup_span};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Context shared by every record in one run
struct RunContext {
    identity_token: Credential,
    crm_session: CrmSession,
}

/// Sequential batch runner with per-record failure isolation
pub struct TriageRunner {
    identity: Arc<dyn IdentityProvider>,
    crm: Arc<dyn CrmApi>,
    classifier: Arc<dyn ClassifierApi>,
    progress: Arc<dyn TriageProgress>,
    credentials: ClientCredentials,
    query: String,
}

impl TriageRunner {
    /// Create a runner from injected collaborators
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        crm: Arc<dyn CrmApi>,
        classifier: Arc<dyn ClassifierApi>,
        credentials: ClientCredentials,
        query: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            crm,
            classifier,
            progress: Arc::new(NoOpProgress),
            credentials,
            query: query.into(),
        }
    }

    /// Replace the progress reporter
    pub fn with_progress(mut self, progress: Arc<dyn TriageProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Build a runner with the HTTP clients and local identity tool from config
    pub fn from_config(config: &TriageConfig) -> TriageResult<Self> {
        let credentials = config.get_crm_credentials()?;
        let identity = Arc::new(CommandIdentityProvider::new(&config.identity));
        let crm = Arc::new(CrmClient::new(config.crm.clone(), &config.http)?);
        let classifier = Arc::new(ClassifierClient::new(
            config.classifier.clone(),
            &config.http,
        )?);

        Ok(
            Self::new(identity, crm, classifier, credentials, config.crm.query.clone())
                .with_progress(Arc::new(LogProgress::new())),
        )
    }

    /// Run one batch; only setup failures are returned as errors
    pub async fn run(&self) -> TriageResult<RunSummary> {
        let started_at = Utc::now();

        let (context, batch) = self
            .setup()
            .instrument(setup_span!(query = %self.query))
            .await?;
        let total = batch.records.len();
        self.progress
            .on_batch_start(total, batch.total_matching)
            .await;

        let mut outcomes = Vec::with_capacity(total);
        for (index, record) in batch.records.iter().enumerate() {
            let position = index + 1;
            let span = record_span!(
                case_number = %record.business_key(),
                position,
                total
            );
            let outcome = self
                .process_record(&context, record, position, total)
                .instrument(span)
                .await;
            outcomes.push(outcome);
        }

        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            total_matching: batch.total_matching,
            outcomes,
        };
        self.progress.on_finish(&summary).await;
        Ok(summary)
    }

    /// Identity token, CRM session and record batch, in that order
    async fn setup(&self) -> TriageResult<(RunContext, Batch)> {
        let identity_token = self.identity.identity_token().await?;
        debug!("Obtained classification identity token");

        let crm_session = self.crm.authenticate(&self.credentials).await?;

        let batch = self.crm.fetch_batch(&crm_session, &self.query).await?;
        info!(
            batch_size = batch.records.len(),
            total_matching = batch.total_matching,
            "Fetched cases from CRM"
        );
        if (batch.records.len() as u64) < batch.total_matching {
            warn!(
                "Query matched {} case(s) but returned {}; the rest wait for a later run",
                batch.total_matching,
                batch.records.len()
            );
        }

        Ok((
            RunContext {
                identity_token,
                crm_session,
            },
            batch,
        ))
    }

    /// Run one record's pipeline inside the failure boundary
    async fn process_record(
        &self,
        context: &RunContext,
        record: &Record,
        position: usize,
        total: usize,
    ) -> RecordOutcome {
        self.progress.on_step(position, total, record).await;

        let mut state = RecordState::Pending;
        let result = self.run_stages(context, record, &mut state).await;

        let failure = match result {
            Ok(()) => {
                self.progress.on_success(position, total, record).await;
                None
            }
            Err(error) => {
                // The stage that was about to run is the one that failed
                let stage = state.next_stage().unwrap_or(Stage::Writeback);
                let message = error.log_message();
                warn!(
                    case_number = %record.business_key(),
                    stage = %stage,
                    "Case failed, continuing with next: {}", message
                );
                self.progress
                    .on_error(position, total, record, stage, &error)
                    .await;
                state = RecordState::Failed;
                Some(RecordFailure { stage, message })
            }
        };

        RecordOutcome {
            record_id: record.id.clone(),
            business_key: record.business_key().to_string(),
            state,
            failure,
        }
    }

    /// Advance `state` through each stage; stops at the first error
    async fn run_stages(
        &self,
        context: &RunContext,
        record: &Record,
        state: &mut RecordState,
    ) -> Result<(), TriageError> {
        let session = self
            .classifier
            .open_session(&context.identity_token, &record.id)
            .await?;
        *state = RecordState::SessionOpened;
        debug!(session_id = %session.id, "Session opened");

        let result = self
            .classifier
            .classify(&context.identity_token, &session, record)
            .await?;
        *state = RecordState::Classified;
        debug!(fields = result.fields().len(), "Classification received");

        self.crm
            .apply_result(&context.crm_session, &result)
            .await?;
        *state = RecordState::Updated;
        Ok(())
    }
}
