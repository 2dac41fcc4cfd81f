//! Domain records shared by the CRM and classification clients

use crate::error::{TriageError, TriageResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Read-only snapshot of one CRM case
///
/// Only `Id` is guaranteed by the CRM; every other field may be null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "CaseNumber", default)]
    pub case_number: Option<String>,
    #[serde(rename = "Subject", default)]
    pub subject: Option<String>,
    #[serde(rename = "Type", default)]
    pub case_type: Option<String>,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    #[serde(rename = "Origin", default)]
    pub origin: Option<String>,
    #[serde(rename = "CreatedDate", default)]
    pub created_date: Option<String>,
}

impl Record {
    /// Human-facing key used in logs and progress lines
    pub fn business_key(&self) -> &str {
        self.case_number.as_deref().unwrap_or(&self.id)
    }

    /// Fields forwarded to the classification service
    pub fn projection(&self) -> RecordProjection<'_> {
        RecordProjection {
            id: &self.id,
            case_type: self.case_type.as_deref(),
            subject: self.subject.as_deref(),
            description: self.description.as_deref(),
            origin: self.origin.as_deref(),
        }
    }
}

/// The subset of a record the classifier sees
#[derive(Debug, Serialize)]
pub struct RecordProjection<'a> {
    #[serde(rename = "Id")]
    pub id: &'a str,
    #[serde(rename = "Type")]
    pub case_type: Option<&'a str>,
    #[serde(rename = "Subject")]
    pub subject: Option<&'a str>,
    #[serde(rename = "Description")]
    pub description: Option<&'a str>,
    #[serde(rename = "Origin")]
    pub origin: Option<&'a str>,
}

/// Records returned by one query plus the server-side match count
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub records: Vec<Record>,
    /// Count of all matching records, independent of the result-size limit
    pub total_matching: u64,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Structured classification output for one record
///
/// The shape is owned by the classification service. The only field this crate
/// relies on is the record key, which names the CRM record to update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassificationResult(Map<String, Value>);

impl ClassificationResult {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Accept a JSON object, or a string holding one
    pub fn from_value(value: Value) -> TriageResult<Self> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            Value::String(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(fields)) => Ok(Self(fields)),
                _ => Err(TriageError::invalid_result(
                    "final_json string does not contain a JSON object",
                )),
            },
            other => Err(TriageError::invalid_result(format!(
                "final_json must be an object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// The id of the record this result targets
    pub fn record_key(&self, key_field: &str) -> TriageResult<&str> {
        match self.0.get(key_field) {
            Some(Value::String(id)) if !id.trim().is_empty() => Ok(id),
            Some(_) => Err(TriageError::invalid_result(format!(
                "'{key_field}' must be a non-empty string"
            ))),
            None => Err(TriageError::invalid_result(format!(
                "result has no '{key_field}' field"
            ))),
        }
    }

    /// Split the result into the target record id and the update body
    pub fn to_update(&self, key_field: &str) -> TriageResult<RecordUpdate> {
        let record_id = self.record_key(key_field)?.to_string();
        let mut body = self.0.clone();
        body.remove(key_field);
        Ok(RecordUpdate { record_id, body })
    }
}

/// Partial update for one CRM record
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
    pub record_id: String,
    pub body: Map<String, Value>,
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
