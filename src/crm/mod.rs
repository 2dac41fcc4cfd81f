//! CRM access: client-credentials auth, record query and result writeback
//!
//! The [`CrmApi`] trait is the seam the triage runner depends on; [`CrmClient`]
//! is the HTTP implementation against the CRM's REST API.

pub mod client;

use crate::config::ClientCredentials;
use crate::error::TriageResult;
use crate::model::{Batch, ClassificationResult};
use async_trait::async_trait;

pub use client::CrmClient;

/// Authenticated CRM session
#[derive(Clone, PartialEq)]
pub struct CrmSession {
    pub access_token: String,
    /// Organization-specific base for every subsequent CRM call
    pub instance_url: String,
}

impl std::fmt::Debug for CrmSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrmSession")
            .field("access_token", &"***")
            .field("instance_url", &self.instance_url)
            .finish()
    }
}

/// CRM operations used by a triage run
#[async_trait]
pub trait CrmApi: Send + Sync {
    /// Exchange client credentials for a session
    async fn authenticate(&self, credentials: &ClientCredentials) -> TriageResult<CrmSession>;

    /// Run a read-only query and return the records plus the total match count
    async fn fetch_batch(&self, session: &CrmSession, query: &str) -> TriageResult<Batch>;

    /// Write a classification result back to the record it names
    async fn apply_result(
        &self,
        session: &CrmSession,
        result: &ClassificationResult,
    ) -> TriageResult<()>;
}
