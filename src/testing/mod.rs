//! Testing utilities and mock implementations
//!
//! This module provides mock implementations for exercising a triage run
//! without a CRM org, a classification service or a local identity tool.

pub mod mocks;

pub use mocks::*;
