//! Remote classification service
//!
//! Each record gets its own session on the service; the record is then submitted
//! to the run endpoint and the terminal result is pulled out of the event stream.

pub mod client;
pub mod events;

use crate::error::TriageResult;
use crate::identity::Credential;
use crate::model::{ClassificationResult, Record};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use client::ClassifierClient;
pub use events::{find_final_result, parse_event_stream};

/// Session descriptor returned by the classification service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSession {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    #[serde(default)]
    pub state: Value,
    /// Service-specific fields such as event history or timestamps
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Classification operations used by a triage run
#[async_trait]
pub trait ClassifierApi: Send + Sync {
    /// Open a fresh session dedicated to one record
    async fn open_session(&self, token: &Credential, record_id: &str)
        -> TriageResult<RemoteSession>;

    /// Submit a record and return the terminal classification result
    async fn classify(
        &self,
        token: &Credential,
        session: &RemoteSession,
        record: &Record,
    ) -> TriageResult<ClassificationResult>;
}
