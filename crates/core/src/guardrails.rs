//! Guardrails — optional pre-call admission control.
//!
//! When configured, the engine asks the guardrails before making any model
//! call and reports successful completions back, so implementations can do
//! rate limiting or circuit breaking per owner.

use crate::error::Error;
use async_trait::async_trait;

/// The admission decision for a run.
#[derive(Debug, Clone)]
pub struct Admission {
    pub allowed: bool,

    /// Reason surfaced to the caller when the run is denied.
    pub warning: String,
}

impl Admission {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            warning: String::new(),
        }
    }

    pub fn deny(warning: impl Into<String>) -> Self {
        Self {
            allowed: false,
            warning: warning.into(),
        }
    }
}

/// Pre-call admission and post-call success recording.
#[async_trait]
pub trait Guardrails: Send + Sync {
    /// Check whether a run for this owner may proceed.
    async fn check(&self, owner_id: &str) -> std::result::Result<Admission, Error>;

    /// Record a successfully completed run for this owner.
    async fn record_success(&self, owner_id: &str);
}
