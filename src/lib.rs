//! Case Triage
//!
//! Batch triage of CRM support cases. A run obtains an identity token for the
//! classification service, authenticates with the CRM, queries a bounded batch
//! of cases, and then, for each case in order, opens a classification session,
//! submits the case, and writes the returned classification back to the CRM.
//!
//! One case failing never stops the batch; only setup failures abort a run.
//!
//! # Quick Start
//!
//! ```rust
//! use case_triage::model::ClassificationResult;
//! use serde_json::json;
//!
//! let result = ClassificationResult::from_value(json!({
//!     "Id": "500xx000001",
//!     "CaseTierCategorisation__c": "Tier 2"
//! }))
//! .unwrap();
//!
//! // The record key names the target; it never appears in the update body
//! let update = result.to_update("Id").unwrap();
//! assert_eq!(update.record_id, "500xx000001");
//! assert!(!update.body.contains_key("Id"));
//! ```

pub mod classifier;
pub mod config;
pub mod crm;
pub mod error;
pub mod identity;
pub mod model;
pub mod observability;
pub mod pipeline;
pub mod progress;
pub mod testing;

pub use classifier::{ClassifierApi, ClassifierClient, RemoteSession};
pub use config::*;
pub use crm::{CrmApi, CrmClient, CrmSession};
pub use error::{TriageError, TriageResult};
pub use identity::{CommandIdentityProvider, Credential, IdentityProvider};
pub use model::{Batch, ClassificationResult, Record};
pub use pipeline::{RecordOutcome, RecordState, RunSummary, Stage, TriageRunner};
pub use progress::{LogProgress, NoOpProgress, TriageProgress};
