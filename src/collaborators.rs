//! Narrow interfaces to the wallet around the pipeline
//!
//! - Credential gate (password check)
//! - Address registry (balances, active address)
//! - Protocol session (dApp peer waiting for a signature)
//! - Notification sink (success / error notices)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::adapter::SignResult;
use crate::types::{Address, Notice, Severity};

/// Verifies the wallet password
///
/// Only consulted when the password requirement setting is on. The pipeline
/// sees nothing beyond pass/fail.
#[async_trait]
pub trait CredentialGate: Send + Sync {
    async fn verify(&self, password: &str) -> bool;
}

/// Read-only source of addresses and balances
pub trait AddressRegistry: Send + Sync {
    fn addresses(&self) -> Vec<Address>;

    fn address(&self, hash: &str) -> Option<Address> {
        self.addresses().into_iter().find(|a| a.hash == hash)
    }

    /// Mark `address` as the active one after a successful submission
    fn set_active(&self, address: &Address);
}

/// Request received from a connected peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub id: u64,
    pub topic: String,
}

/// Channel back to a connected dApp
#[async_trait]
pub trait ProtocolSession: Send + Sync {
    /// Request currently waiting for an answer, if any
    fn pending_request(&self) -> Option<PendingRequest>;

    /// Deliver the signing result for `request`
    async fn respond(&self, request: &PendingRequest, result: SignResult) -> Result<(), String>;

    /// Tell the peer the submission failed
    async fn report_error(&self, message: &str);

    /// Forget the pending request; called on close and after completion
    fn clear_pending_request(&self);
}

/// Receives user-visible notices
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notification sink that writes notices to the log
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, notice: Notice) {
        let duration_ms = notice.duration.map(|d| d.as_millis() as u64);
        match notice.severity {
            Severity::Alert => tracing::warn!(duration_ms = ?duration_ms, "{}", notice.text),
            Severity::Success | Severity::Info => {
                tracing::info!(severity = ?notice.severity, duration_ms = ?duration_ms, "{}", notice.text)
            }
        }
    }
}
