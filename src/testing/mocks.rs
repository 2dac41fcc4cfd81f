//! Mock implementations for testing
//!
//! Provides mock identity, CRM, classifier and progress implementations so the
//! runner can be exercised without a CRM org, a classification service or the
//! local identity tool.

use crate::classifier::{ClassifierApi, RemoteSession};
use crate::config::ClientCredentials;
use crate::crm::{CrmApi, CrmSession};
use crate::error::{TriageError, TriageResult};
use crate::identity::{Credential, IdentityProvider};
use crate::model::{Batch, ClassificationResult, Record, RecordUpdate};
use crate::pipeline::{RunSummary, Stage};
use crate::progress::{ProgressEventType, TriageProgress};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Build a record with the given id and case number
pub fn test_record(id: &str, case_number: &str) -> Record {
    Record {
        id: id.to_string(),
        case_number: Some(case_number.to_string()),
        subject: Some(format!("Subject for {case_number}")),
        case_type: Some("Problem".to_string()),
        description: Some("Customer reports an issue".to_string()),
        origin: Some("Email".to_string()),
        created_date: Some("2024-05-01T09:30:00.000+0000".to_string()),
    }
}

/// Test credentials that never touch the environment
pub fn test_credentials() -> ClientCredentials {
    ClientCredentials {
        client_id: "test-client".to_string(),
        client_secret: "test-secret".to_string(),
    }
}

/// Mock identity provider
#[derive(Debug, Clone)]
pub struct MockIdentityProvider {
    token: Option<String>,
}

impl MockIdentityProvider {
    pub fn new(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn identity_token(&self) -> TriageResult<Credential> {
        match &self.token {
            Some(token) => Ok(Credential::new(token.clone())),
            None => Err(TriageError::identity("Mock identity tool failure")),
        }
    }
}

/// Mock CRM
#[derive(Debug, Default)]
pub struct MockCrm {
    pub records: Vec<Record>,
    pub total_matching: Option<u64>,
    pub fail_auth: bool,
    pub fail_query: bool,
    pub fail_update_for: HashSet<String>,
    pub calls: Arc<Mutex<Vec<String>>>,
    pub updates: Arc<Mutex<Vec<RecordUpdate>>>,
}

impl MockCrm {
    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    pub fn with_auth_failure() -> Self {
        Self {
            fail_auth: true,
            ..Default::default()
        }
    }

    pub fn with_query_failure() -> Self {
        Self {
            fail_query: true,
            ..Default::default()
        }
    }

    pub fn failing_update_for(mut self, record_id: &str) -> Self {
        self.fail_update_for.insert(record_id.to_string());
        self
    }

    pub async fn get_calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    pub async fn get_updates(&self) -> Vec<RecordUpdate> {
        self.updates.lock().await.clone()
    }
}

#[async_trait]
impl CrmApi for MockCrm {
    async fn authenticate(&self, _credentials: &ClientCredentials) -> TriageResult<CrmSession> {
        self.calls.lock().await.push("authenticate".to_string());
        if self.fail_auth {
            return Err(TriageError::CrmAuth {
                message: "token endpoint returned 401 Unauthorized".to_string(),
                body: Some("{\"error\":\"invalid_client\"}".to_string()),
            });
        }

        Ok(CrmSession {
            access_token: "mock-access-token".to_string(),
            instance_url: "https://mock.crm.example.com".to_string(),
        })
    }

    async fn fetch_batch(&self, _session: &CrmSession, _query: &str) -> TriageResult<Batch> {
        self.calls.lock().await.push("fetch_batch".to_string());
        if self.fail_query {
            return Err(TriageError::CrmQuery {
                message: "query endpoint returned 400 Bad Request".to_string(),
                body: Some("MALFORMED_QUERY".to_string()),
            });
        }

        Ok(Batch {
            records: self.records.clone(),
            total_matching: self
                .total_matching
                .unwrap_or(self.records.len() as u64),
        })
    }

    async fn apply_result(
        &self,
        _session: &CrmSession,
        result: &ClassificationResult,
    ) -> TriageResult<()> {
        self.calls.lock().await.push("apply_result".to_string());
        let update = result.to_update("Id")?;

        if self.fail_update_for.contains(&update.record_id) {
            return Err(TriageError::UnexpectedStatus {
                status: 200,
                body: "{\"unexpected\":true}".to_string(),
            });
        }

        self.updates.lock().await.push(update);
        Ok(())
    }
}

/// Scripted classifier behavior for one record
#[derive(Debug, Clone)]
pub enum ClassifierBehavior {
    /// Return this value as the classification result
    Result(Value),
    FailSession,
    FailClassify,
    NotFound,
}

/// Mock classification service
///
/// Records without a scripted behavior get `{"Id": <id>, "Tier__c": "T2"}`.
#[derive(Debug, Default)]
pub struct MockClassifier {
    pub behaviors: HashMap<String, ClassifierBehavior>,
    pub sessions_opened: Arc<Mutex<Vec<String>>>,
    pub classified: Arc<Mutex<Vec<String>>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(mut self, record_id: &str, behavior: ClassifierBehavior) -> Self {
        self.behaviors.insert(record_id.to_string(), behavior);
        self
    }

    pub async fn get_sessions_opened(&self) -> Vec<String> {
        self.sessions_opened.lock().await.clone()
    }

    pub async fn get_classified(&self) -> Vec<String> {
        self.classified.lock().await.clone()
    }

    fn behavior_for(&self, record_id: &str) -> ClassifierBehavior {
        self.behaviors.get(record_id).cloned().unwrap_or_else(|| {
            ClassifierBehavior::Result(json!({"Id": record_id, "Tier__c": "T2"}))
        })
    }
}

#[async_trait]
impl ClassifierApi for MockClassifier {
    async fn open_session(
        &self,
        _token: &Credential,
        record_id: &str,
    ) -> TriageResult<RemoteSession> {
        self.sessions_opened
            .lock()
            .await
            .push(record_id.to_string());

        if matches!(self.behavior_for(record_id), ClassifierBehavior::FailSession) {
            return Err(TriageError::Session {
                message: "create-session endpoint returned 503 Service Unavailable".to_string(),
                body: None,
            });
        }

        Ok(RemoteSession {
            id: format!("session-{record_id}"),
            app_name: "mock_app".to_string(),
            user_id: "mock_user".to_string(),
            state: json!({"visit_count": 0, "language": "en"}),
            extra: Map::new(),
        })
    }

    async fn classify(
        &self,
        _token: &Credential,
        _session: &RemoteSession,
        record: &Record,
    ) -> TriageResult<ClassificationResult> {
        self.classified.lock().await.push(record.id.clone());

        match self.behavior_for(&record.id) {
            ClassifierBehavior::Result(value) => ClassificationResult::from_value(value),
            ClassifierBehavior::FailClassify => Err(TriageError::ClassificationRequest {
                message: "run request failed: operation timed out".to_string(),
                body: None,
            }),
            ClassifierBehavior::NotFound => {
                Err(TriageError::ClassificationNotFound { events: 2 })
            }
            ClassifierBehavior::FailSession => Err(TriageError::Session {
                message: "unreachable".to_string(),
                body: None,
            }),
        }
    }
}

/// One observed progress callback
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub event_type: ProgressEventType,
    pub position: Option<usize>,
    pub business_key: Option<String>,
    pub stage: Option<Stage>,
}

/// Progress reporter that records every callback
#[derive(Debug, Default)]
pub struct RecordingProgress {
    pub events: Arc<Mutex<Vec<ProgressEvent>>>,
    pub summary_line: Arc<Mutex<Option<String>>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_events(&self) -> Vec<ProgressEvent> {
        self.events.lock().await.clone()
    }

    pub async fn get_summary_line(&self) -> Option<String> {
        self.summary_line.lock().await.clone()
    }

    async fn push(
        &self,
        event_type: ProgressEventType,
        position: Option<usize>,
        record: Option<&Record>,
        stage: Option<Stage>,
    ) {
        self.events.lock().await.push(ProgressEvent {
            event_type,
            position,
            business_key: record.map(|r| r.business_key().to_string()),
            stage,
        });
    }
}

#[async_trait]
impl TriageProgress for RecordingProgress {
    async fn on_batch_start(&self, _batch_size: usize, _total_matching: u64) {
        self.push(ProgressEventType::BatchStart, None, None, None)
            .await;
    }

    async fn on_step(&self, position: usize, _total: usize, record: &Record) {
        self.push(ProgressEventType::RecordStart, Some(position), Some(record), None)
            .await;
    }

    async fn on_success(&self, position: usize, _total: usize, record: &Record) {
        self.push(
            ProgressEventType::RecordComplete,
            Some(position),
            Some(record),
            None,
        )
        .await;
    }

    async fn on_error(
        &self,
        position: usize,
        _total: usize,
        record: &Record,
        stage: Stage,
        _error: &TriageError,
    ) {
        self.push(
            ProgressEventType::RecordError,
            Some(position),
            Some(record),
            Some(stage),
        )
        .await;
    }

    async fn on_finish(&self, summary: &RunSummary) {
        self.push(ProgressEventType::BatchComplete, None, None, None)
            .await;
        *self.summary_line.lock().await = Some(summary.summary_line());
    }
}
