//! Error types for the send pipeline
//!
//! Errors fall into three groups:
//! - Local validation, raised before any ledger call
//! - Ledger failures (build / submit), translated once into readable text
//! - Contract violations, which are bugs in the caller and never shown as notices

use thiserror::Error;

use crate::pipeline::Step;

/// Error returned by a [`LedgerClient`](crate::ledger::LedgerClient) call
///
/// `detail` carries the structured server-side explanation when the node
/// reports one. Consolidation detection matches against it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct LedgerError {
    pub message: String,
    pub detail: Option<String>,
}

impl LedgerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: Some(detail.into()),
        }
    }

    /// Translate into text suitable for a notice
    ///
    /// The server detail wins when present, otherwise the fallback is
    /// prefixed to the transport message.
    pub fn human_readable(&self, fallback: &str) -> String {
        match self.detail.as_deref().map(str::trim) {
            Some(detail) if !detail.is_empty() => detail.to_string(),
            _ if self.message.is_empty() => fallback.to_string(),
            _ => format!("{}: {}", fallback, self.message),
        }
    }
}

/// Comprehensive error type for pipeline operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Draft failed local validation (missing field, amount out of range)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Build failed because the source inputs must be merged first
    ///
    /// Recovered by the consolidation sub-flow, never shown as a notice.
    #[error("Inputs need consolidating before this transaction can be built")]
    ConsolidationRequired,

    /// Any other build failure
    #[error("Build failed: {0}")]
    Build(String),

    /// Signing or broadcast failed
    #[error("Submission failed: {0}")]
    Submission(String),

    /// Credential gate rejected the password
    #[error("Incorrect password")]
    Authentication,

    /// Operation called in a step that does not allow it
    #[error("Operation `{operation}` is not allowed while {step}")]
    InvalidTransition { step: Step, operation: &'static str },

    /// Close requested while transactions are being submitted
    #[error("Cannot close while transactions are being submitted")]
    CloseDuringSubmission,

    /// Fee or amount arithmetic left the representable range
    #[error("Arithmetic overflow while computing {0}")]
    Overflow(&'static str),

    /// Internal invariant broken by the caller; fatal
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Whether this error is meant to reach the user as a notice
    pub fn is_user_facing(&self) -> bool {
        match self {
            Self::Validation(_)
            | Self::Build(_)
            | Self::Submission(_)
            | Self::Authentication
            | Self::Overflow(_) => true,

            Self::ConsolidationRequired
            | Self::InvalidTransition { .. }
            | Self::CloseDuringSubmission
            | Self::ContractViolation(_)
            | Self::Config(_) => false,
        }
    }

    /// Get the error category for logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::Overflow(_) => "validation",
            Self::ConsolidationRequired => "consolidation",
            Self::Build(_) => "build",
            Self::Submission(_) => "submission",
            Self::Authentication => "authentication",
            Self::InvalidTransition { .. } | Self::CloseDuringSubmission => "transition",
            Self::ContractViolation(_) => "contract",
            Self::Config(_) => "config",
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn contract_violation(reason: impl Into<String>) -> Self {
        Self::ContractViolation(reason.into())
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
