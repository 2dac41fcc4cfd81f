//! HTTP client for the classification service

use crate::classifier::events::{find_final_result, parse_event_stream};
use crate::classifier::{ClassifierApi, RemoteSession};
use crate::config::{join_url, ClassifierSection, ConfigError, HttpSection};
use crate::error::{TriageError, TriageResult};
use crate::identity::Credential;
use crate::model::{ClassificationResult, Record};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

/// Classification service client implementation
pub struct ClassifierClient {
    config: ClassifierSection,
    client: Client,
}

impl ClassifierClient {
    /// Create a new classification client
    pub fn new(config: ClassifierSection, http: &HttpSection) -> TriageResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = http.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ConfigError::InvalidConfig(format!("classifier HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn session_url(&self, session_id: &str) -> String {
        join_url(
            &self.config.base_url,
            &format!(
                "apps/{}/users/{}/sessions/{}",
                self.config.app_name, self.config.user_id, session_id
            ),
        )
    }

    fn run_url(&self) -> String {
        join_url(&self.config.base_url, "run_sse")
    }

    /// Initial state for every new session
    fn initial_state(&self) -> Value {
        json!({
            "visit_count": 0,
            "language": self.config.language,
        })
    }

    /// Build the run request for one record (pure)
    fn build_run_request<'a>(
        &'a self,
        session: &'a RemoteSession,
        record: &Record,
    ) -> TriageResult<RunRequest<'a>> {
        let text = serde_json::to_string(&record.projection()).map_err(|e| {
            TriageError::ClassificationRequest {
                message: format!("record could not be encoded: {e}"),
                body: None,
            }
        })?;

        Ok(RunRequest {
            app_name: &self.config.app_name,
            user_id: &self.config.user_id,
            session_id: &session.id,
            new_message: NewMessage {
                role: "user",
                parts: vec![MessagePart { text }],
            },
            streaming: false,
        })
    }

    /// Pull the terminal result out of a run response body (pure)
    fn extract_result(&self, body: &str) -> TriageResult<ClassificationResult> {
        let events = parse_event_stream(body);
        match find_final_result(&events, &self.config.result_author) {
            Some(value) => ClassificationResult::from_value(value.clone()),
            None => Err(TriageError::ClassificationNotFound {
                events: events.len(),
            }),
        }
    }
}

#[async_trait]
impl ClassifierApi for ClassifierClient {
    async fn open_session(
        &self,
        token: &Credential,
        record_id: &str,
    ) -> TriageResult<RemoteSession> {
        let session_id = Uuid::new_v4().to_string();
        debug!(record_id, session_id = %session_id, "Opening classification session");

        let response = self
            .client
            .post(self.session_url(&session_id))
            .header("Authorization", token.bearer())
            .json(&self.initial_state())
            .send()
            .await
            .map_err(|e| TriageError::Session {
                message: format!("create-session request failed: {e}"),
                body: None,
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(TriageError::Session {
                message: format!("create-session endpoint returned {status}"),
                body: Some(body).filter(|b| !b.trim().is_empty()),
            });
        }

        match serde_json::from_str::<RemoteSession>(&body) {
            Ok(session) => Ok(session),
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    "Session descriptor not decodable ({}), using request values", e
                );
                Ok(RemoteSession {
                    id: session_id,
                    app_name: self.config.app_name.clone(),
                    user_id: self.config.user_id.clone(),
                    state: self.initial_state(),
                    extra: Map::new(),
                })
            }
        }
    }

    async fn classify(
        &self,
        token: &Credential,
        session: &RemoteSession,
        record: &Record,
    ) -> TriageResult<ClassificationResult> {
        let request = self.build_run_request(session, record)?;

        let response = self
            .client
            .post(self.run_url())
            .header("Authorization", token.bearer())
            .json(&request)
            .send()
            .await
            .map_err(|e| TriageError::ClassificationRequest {
                message: format!(
                    "run request failed: {} (is_connect: {}, is_timeout: {})",
                    e,
                    e.is_connect(),
                    e.is_timeout()
                ),
                body: None,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TriageError::ClassificationRequest {
                message: format!("run response could not be read: {e}"),
                body: None,
            })?;

        if !status.is_success() {
            return Err(TriageError::ClassificationRequest {
                message: format!("run endpoint returned {status}"),
                body: Some(body).filter(|b| !b.trim().is_empty()),
            });
        }

        self.extract_result(&body)
    }
}

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    app_name: &'a str,
    #[serde(rename = "userId")]
    user_id: &'a str,
    session_id: &'a str,
    new_message: NewMessage,
    streaming: bool,
}

#[derive(Debug, Serialize)]
struct NewMessage {
    role: &'static str,
    parts: Vec<MessagePart>,
}

#[derive(Debug, Serialize)]
struct MessagePart {
    text: String,
}
