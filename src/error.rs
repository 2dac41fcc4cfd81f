//! Error types for the triage run
//!
//! Errors fall into two tiers. Setup errors abort the run with a non-zero exit
//! status; per-record errors are caught at the record boundary and the run
//! continues with the next record.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Main error type for triage operations
#[derive(Debug, Error)]
pub enum TriageError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Identity token unavailable: {message}")]
    Identity { message: String },

    #[error("CRM authentication failed: {message}")]
    CrmAuth {
        message: String,
        body: Option<String>,
    },

    #[error("CRM query failed: {message}")]
    CrmQuery {
        message: String,
        body: Option<String>,
    },

    #[error("Failed to open classification session: {message}")]
    Session {
        message: String,
        body: Option<String>,
    },

    #[error("Classification request failed: {message}")]
    ClassificationRequest {
        message: String,
        body: Option<String>,
    },

    #[error("No final classification found among {events} event(s)")]
    ClassificationNotFound { events: usize },

    #[error("Invalid classification result: {message}")]
    InvalidResult { message: String },

    #[error("Unexpected CRM update status {status}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("CRM update failed: {message}")]
    CrmUpdate {
        message: String,
        body: Option<String>,
    },
}

impl TriageError {
    /// Whether this error aborts the whole run rather than a single record
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TriageError::Config(_)
                | TriageError::Identity { .. }
                | TriageError::CrmAuth { .. }
                | TriageError::CrmQuery { .. }
        )
    }

    /// Response body returned by the remote side, when one was captured
    pub fn response_body(&self) -> Option<&str> {
        match self {
            TriageError::CrmAuth { body, .. }
            | TriageError::CrmQuery { body, .. }
            | TriageError::Session { body, .. }
            | TriageError::ClassificationRequest { body, .. }
            | TriageError::CrmUpdate { body, .. } => body.as_deref(),
            TriageError::UnexpectedStatus { body, .. } => Some(body.as_str()),
            _ => None,
        }
    }

    /// Error text safe to write to logs, including the response body if any
    pub fn log_message(&self) -> String {
        let message = match self.response_body().filter(|b| !b.trim().is_empty()) {
            Some(body) => format!("{self} (response: {body})"),
            None => self.to_string(),
        };
        sanitize_error_message(&message)
    }

    /// Create identity error
    pub fn identity<S: Into<String>>(message: S) -> Self {
        Self::Identity {
            message: message.into(),
        }
    }

    /// Create invalid result error
    pub fn invalid_result<S: Into<String>>(message: S) -> Self {
        Self::InvalidResult {
            message: message.into(),
        }
    }
}

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(password|token|key|secret)"?\s*[=:]\s*"?[^\s",}&]+"?"#)
        .expect("secret pattern is valid")
});

static BEARER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)bearer\s+\S+").expect("bearer pattern is valid"));

const MAX_MESSAGE_LEN: usize = 500;

/// Redact credentials and cap length before an error reaches the logs
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET_PATTERN
        .replace_all(message, "${1}=***")
        .to_string();
    sanitized = BEARER_PATTERN
        .replace_all(&sanitized, "Bearer ***")
        .to_string();

    // Truncate on a char boundary so multibyte bodies never panic
    if sanitized.len() > MAX_MESSAGE_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_MESSAGE_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for triage operations
pub type TriageResult<T> = Result<T, TriageError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    #[test]
    fn test_setup_errors_are_fatal() {
        assert!(TriageError::identity("no gcloud").is_fatal());
        assert!(TriageError::CrmAuth {
            message: "401".to_string(),
            body: None
        }
        .is_fatal());
        assert!(TriageError::CrmQuery {
            message: "500".to_string(),
            body: None
        }
        .is_fatal());
        assert!(TriageError::Config(ConfigError::EnvVarNotFound("X".to_string())).is_fatal());
    }

    #[test]
    fn test_record_errors_are_recoverable() {
        let errors = vec![
            TriageError::Session {
                message: "503".to_string(),
                body: None,
            },
            TriageError::ClassificationRequest {
                message: "timeout".to_string(),
                body: None,
            },
            TriageError::ClassificationNotFound { events: 3 },
            TriageError::invalid_result("missing Id"),
            TriageError::UnexpectedStatus {
                status: 200,
                body: "{}".to_string(),
            },
            TriageError::CrmUpdate {
                message: "400".to_string(),
                body: Some("bad field".to_string()),
            },
        ];

        for error in errors {
            assert!(!error.is_fatal(), "{error} should be recoverable");
        }
    }

    #[test]
    fn test_log_message_includes_body() {
        let error = TriageError::CrmUpdate {
            message: "HTTP 400 Bad Request".to_string(),
            body: Some("INVALID_FIELD: No such column".to_string()),
        };

        let message = error.log_message();
        assert!(message.contains("HTTP 400"));
        assert!(message.contains("INVALID_FIELD"));
    }

    #[test]
    fn test_log_message_skips_empty_body() {
        let error = TriageError::CrmQuery {
            message: "HTTP 500".to_string(),
            body: Some("   ".to_string()),
        };
        assert_eq!(error.log_message(), "CRM query failed: HTTP 500");
    }

    #[test]
    fn test_not_found_display() {
        let error = TriageError::ClassificationNotFound { events: 4 };
        assert_eq!(
            error.to_string(),
            "No final classification found among 4 event(s)"
        );
    }

    #[test]
    fn test_sanitize_json_token_fields() {
        let message = r#"{"access_token":"00Dxx!AQ0abc","instance_url":"https://x"}"#;
        let sanitized = sanitize_error_message(message);

        assert!(!sanitized.contains("00Dxx!AQ0abc"));
        assert!(sanitized.contains("instance_url"));
    }

    #[test]
    fn test_sanitize_form_secrets() {
        let message = "client_id=abc&client_secret=hunter2";
        let sanitized = sanitize_error_message(message);

        assert!(!sanitized.contains("hunter2"));
        assert!(sanitized.contains("secret=***"));
    }

    #[test]
    fn test_sanitize_bearer_header() {
        let sanitized = sanitize_error_message("sent Authorization: Bearer eyJhbGciOi.payload");
        assert!(!sanitized.contains("eyJhbGciOi"));
    }

    #[test]
    fn test_long_message_truncation() {
        let sanitized = sanitize_error_message(&"x".repeat(600));

        assert!(sanitized.len() <= MAX_MESSAGE_LEN);
        assert!(sanitized.ends_with("...[truncated]"));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let sanitized = sanitize_error_message(&"é".repeat(400));
        assert!(sanitized.len() <= MAX_MESSAGE_LEN);
        assert!(sanitized.ends_with("...[truncated]"));
    }

    #[test]
    fn test_sanitize_empty_message() {
        assert_eq!(sanitize_error_message(""), "");
    }
}
