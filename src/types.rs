//! Common types used throughout the pipeline

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Amount in the smallest ledger denomination
pub type Amount = u128;

/// Spendable account snapshot supplied by the address registry
///
/// The pipeline never mutates an address; it only reads the balance for
/// validation and hands the address back to the registry on success.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Ledger account identifier
    pub hash: String,

    /// Hex encoded public key used by the ledger to build transactions
    pub public_key: String,

    /// Balance available for spending
    pub available_balance: Amount,

    /// Shard group the address belongs to
    #[serde(default)]
    pub group: u32,
}

impl Address {
    pub fn new(hash: impl Into<String>, public_key: impl Into<String>, available_balance: Amount) -> Self {
        Self {
            hash: hash.into(),
            public_key: public_key.into(),
            available_balance,
            group: 0,
        }
    }
}

/// Ledger network identifier (e.g. "mainnet", "testnet")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(String);

impl NetworkId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NetworkId {
    fn default() -> Self {
        Self("mainnet".to_string())
    }
}

impl std::fmt::Display for NetworkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NetworkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Notice severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Alert,
}

/// Human-readable message handed to the notification sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub severity: Severity,
    /// Auto-dismiss delay; `None` leaves dismissal to the sink
    pub duration: Option<Duration>,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            severity: Severity::Success,
            duration: None,
        }
    }

    pub fn alert(text: impl Into<String>, duration: Duration) -> Self {
        Self {
            text: text.into(),
            severity: Severity::Alert,
            duration: Some(duration),
        }
    }
}
