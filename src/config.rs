//! Configuration system for the case triage run
//!
//! Every component receives its section of [`TriageConfig`] at construction time.
//! Secrets never live in the file: the file names the environment variables that
//! hold them, and they are resolved only when the run starts.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Main triage configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriageConfig {
    pub crm: CrmSection,
    pub classifier: ClassifierSection,
    #[serde(default)]
    pub identity: IdentitySection,
    #[serde(default)]
    pub http: HttpSection,
}

/// CRM section: token exchange, record query and writeback target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrmSection {
    /// Login host used for the client-credentials token exchange
    pub base_url: String,
    /// REST API version segment, e.g. "v59.0"
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Object type written back to
    #[serde(default = "default_object_type")]
    pub object_type: String,
    /// Field in the classification result naming the record to update
    #[serde(default = "default_record_key_field")]
    pub record_key_field: String,
    /// Read-only SOQL query selecting the cases to triage
    pub query: String,
    /// Environment variable containing the OAuth client id
    pub client_id_env: String,
    /// Environment variable containing the OAuth client secret
    pub client_secret_env: String,
}

fn default_api_version() -> String {
    "v59.0".to_string()
}

fn default_object_type() -> String {
    "Case".to_string()
}

fn default_record_key_field() -> String {
    "Id".to_string()
}

/// Classification service section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierSection {
    /// Base URL of the classification service
    pub base_url: String,
    /// Application name sessions are created under
    pub app_name: String,
    /// Shared user identity every session is created for
    pub user_id: String,
    /// Event author that carries the terminal result
    #[serde(default = "default_result_author")]
    pub result_author: String,
    /// Language stored in each new session's initial state
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_result_author() -> String {
    "json_generator".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

/// Local identity tool invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentitySection {
    #[serde(default = "default_identity_command")]
    pub command: String,
    #[serde(default = "default_identity_args")]
    pub args: Vec<String>,
}

fn default_identity_command() -> String {
    "gcloud".to_string()
}

fn default_identity_args() -> Vec<String> {
    vec!["auth".to_string(), "print-identity-token".to_string()]
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            command: default_identity_command(),
            args: default_identity_args(),
        }
    }
}

/// Shared HTTP client settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HttpSection {
    /// Request timeout in seconds; unset keeps the transport default
    pub timeout_secs: Option<u64>,
}

impl HttpSection {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// OAuth client credentials resolved from the environment
#[derive(Clone, PartialEq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl { field: String, reason: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TriageConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: TriageConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field formats that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("crm.base_url", &self.crm.base_url)?;
        validate_url("classifier.base_url", &self.classifier.base_url)?;

        if !self.crm.api_version.starts_with('v') {
            return Err(ConfigError::InvalidConfig(format!(
                "crm.api_version '{}' must look like 'v59.0'",
                self.crm.api_version
            )));
        }

        let required = [
            ("crm.query", &self.crm.query),
            ("crm.object_type", &self.crm.object_type),
            ("crm.record_key_field", &self.crm.record_key_field),
            ("classifier.app_name", &self.classifier.app_name),
            ("classifier.user_id", &self.classifier.user_id),
            ("classifier.result_author", &self.classifier.result_author),
            ("identity.command", &self.identity.command),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidConfig(format!(
                    "{field} must not be empty"
                )));
            }
        }

        Ok(())
    }

    /// Helper method to get environment variable with error propagation
    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .map_err(|_| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }

    /// Resolve the CRM client credentials from the environment
    pub fn get_crm_credentials(&self) -> Result<ClientCredentials, ConfigError> {
        Ok(ClientCredentials {
            client_id: Self::get_env_var_required(&self.crm.client_id_env)?,
            client_secret: Self::get_env_var_required(&self.crm.client_secret_env)?,
        })
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[crm]
base_url = "https://login.example.com"
query = "SELECT Id, CaseNumber FROM Case"
client_id_env = "TEST_CRM_CLIENT_ID"
client_secret_env = "TEST_CRM_CLIENT_SECRET"

[classifier]
base_url = "https://classifier.example.com"
app_name = "case_triage"
user_id = "triage-user"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

fn validate_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        field: field.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidUrl {
            field: field.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

/// Join a base URL and a path without doubling the separator
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_applies_defaults() {
        let config = TriageConfig::test_config();

        assert_eq!(config.crm.api_version, "v59.0");
        assert_eq!(config.crm.object_type, "Case");
        assert_eq!(config.crm.record_key_field, "Id");
        assert_eq!(config.classifier.result_author, "json_generator");
        assert_eq!(config.classifier.language, "en");
        assert_eq!(config.identity.command, "gcloud");
        assert_eq!(config.identity.args, vec!["auth", "print-identity-token"]);
        assert_eq!(config.http.timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_config_parses() {
        let toml_content = r#"
[crm]
base_url = "https://login.example.com"
api_version = "v60.0"
object_type = "Ticket__c"
record_key_field = "record_id"
query = "SELECT Id FROM Ticket__c"
client_id_env = "ID_VAR"
client_secret_env = "SECRET_VAR"

[classifier]
base_url = "http://localhost:8000"
app_name = "router"
user_id = "batch"
result_author = "finalizer"
language = "de"

[identity]
command = "print-token"
args = []

[http]
timeout_secs = 30
"#;
        let config = TriageConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.crm.api_version, "v60.0");
        assert_eq!(config.crm.record_key_field, "record_id");
        assert_eq!(config.classifier.result_author, "finalizer");
        assert_eq!(config.identity.command, "print-token");
        assert!(config.identity.args.is_empty());
        assert_eq!(config.http.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let mut config = TriageConfig::test_config();
        config.classifier.base_url = "not a url".to_string();

        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let mut config = TriageConfig::test_config();
        config.crm.base_url = "ftp://login.example.com".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("crm.base_url"));
        assert!(err.to_string().contains("ftp"));
    }

    #[test]
    fn test_empty_query_rejected() {
        let mut config = TriageConfig::test_config();
        config.crm.query = "   ".to_string();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig(_)));
        assert!(err.to_string().contains("crm.query"));
    }

    #[test]
    fn test_bad_api_version_rejected() {
        let mut config = TriageConfig::test_config();
        config.crm.api_version = "59.0".to_string();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_missing_section_is_parse_error() {
        let result = TriageConfig::from_toml_str("[crm]\nbase_url = \"https://x.example\"\n");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_missing_credentials_env_var() {
        let mut config = TriageConfig::test_config();
        config.crm.client_id_env = "CASE_TRIAGE_TEST_UNSET_CLIENT_ID".to_string();

        let err = config.get_crm_credentials().unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarNotFound(ref name)
            if name == "CASE_TRIAGE_TEST_UNSET_CLIENT_ID"));
    }

    #[test]
    fn test_credentials_resolved_from_env() {
        let mut config = TriageConfig::test_config();
        config.crm.client_id_env = "CASE_TRIAGE_TEST_CLIENT_ID".to_string();
        config.crm.client_secret_env = "CASE_TRIAGE_TEST_CLIENT_SECRET".to_string();
        std::env::set_var("CASE_TRIAGE_TEST_CLIENT_ID", "client-123");
        std::env::set_var("CASE_TRIAGE_TEST_CLIENT_SECRET", "s3cret");

        let creds = config.get_crm_credentials().unwrap();
        assert_eq!(creds.client_id, "client-123");
        assert_eq!(creds.client_secret, "s3cret");
        assert!(!format!("{creds:?}").contains("s3cret"));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://a.example/", "/x/y"), "https://a.example/x/y");
        assert_eq!(join_url("https://a.example", "x"), "https://a.example/x");
    }
}
