//! HTTP client for the CRM REST API

use crate::config::{join_url, ClientCredentials, ConfigError, CrmSection, HttpSection};
use crate::crm::{CrmApi, CrmSession};
use crate::error::{TriageError, TriageResult};
use crate::model::{Batch, ClassificationResult, Record};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

const TOKEN_PATH: &str = "services/oauth2/token";

/// CRM client implementation
pub struct CrmClient {
    config: CrmSection,
    client: Client,
}

impl CrmClient {
    /// Create a new CRM client
    pub fn new(config: CrmSection, http: &HttpSection) -> TriageResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = http.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ConfigError::InvalidConfig(format!("CRM HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn token_url(&self) -> String {
        join_url(&self.config.base_url, TOKEN_PATH)
    }

    fn query_url(&self, session: &CrmSession) -> String {
        join_url(
            &session.instance_url,
            &format!("services/data/{}/query", self.config.api_version),
        )
    }

    fn record_url(&self, session: &CrmSession, record_id: &str) -> String {
        join_url(
            &session.instance_url,
            &format!(
                "services/data/{}/sobjects/{}/{}",
                self.config.api_version, self.config.object_type, record_id
            ),
        )
    }

    /// Interpret the writeback confirmation (pure)
    fn check_update_response(status: StatusCode, body: String) -> TriageResult<()> {
        if !status.is_success() {
            return Err(TriageError::CrmUpdate {
                message: format!("update endpoint returned {status}"),
                body: non_empty(body),
            });
        }

        if status == StatusCode::NO_CONTENT && body.trim().is_empty() {
            return Ok(());
        }

        Err(TriageError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl CrmApi for CrmClient {
    async fn authenticate(&self, credentials: &ClientCredentials) -> TriageResult<CrmSession> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];

        let response = self
            .client
            .post(self.token_url())
            .form(&form)
            .send()
            .await
            .map_err(|e| TriageError::CrmAuth {
                message: format!("token request failed: {e}"),
                body: None,
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(TriageError::CrmAuth {
                message: format!("token endpoint returned {status}"),
                body: non_empty(body),
            });
        }

        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| TriageError::CrmAuth {
                message: format!("token response is missing required fields: {e}"),
                body: None,
            })?;

        info!(instance_url = %token.instance_url, "Authenticated with CRM");
        Ok(CrmSession {
            access_token: token.access_token,
            instance_url: token.instance_url,
        })
    }

    async fn fetch_batch(&self, session: &CrmSession, query: &str) -> TriageResult<Batch> {
        debug!(query, "Querying CRM");

        let response = self
            .client
            .get(self.query_url(session))
            .query(&[("q", query)])
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| TriageError::CrmQuery {
                message: format!("query request failed: {e}"),
                body: None,
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(TriageError::CrmQuery {
                message: format!("query endpoint returned {status}"),
                body: non_empty(body),
            });
        }

        let parsed: QueryResponse =
            serde_json::from_str(&body).map_err(|e| TriageError::CrmQuery {
                message: format!("query response could not be decoded: {e}"),
                body: None,
            })?;

        Ok(Batch {
            records: parsed.records,
            total_matching: parsed.total_size,
        })
    }

    async fn apply_result(
        &self,
        session: &CrmSession,
        result: &ClassificationResult,
    ) -> TriageResult<()> {
        let update = result.to_update(&self.config.record_key_field)?;
        debug!(
            record_id = %update.record_id,
            fields = update.body.len(),
            "Writing classification back to CRM"
        );

        let response = self
            .client
            .patch(self.record_url(session, &update.record_id))
            .bearer_auth(&session.access_token)
            .json(&update.body)
            .send()
            .await
            .map_err(|e| TriageError::CrmUpdate {
                message: format!("update request failed: {e}"),
                body: None,
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self::check_update_response(status, body)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    instance_url: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    records: Vec<Record>,
    #[serde(rename = "totalSize")]
    total_size: u64,
}

fn non_empty(body: String) -> Option<String> {
    if body.trim().is_empty() {
        None
    } else {
        Some(body)
    }
}
