//! sendflow - transaction send pipeline for wallets
//!
//! Turns a declarative draft (transfer, script call, contract deploy) into a
//! built, reviewed, optionally password-checked and submitted transaction,
//! recovering from "too many inputs" build failures by sweeping the source
//! address first.
//!
//! The ledger, password check, address book, dApp session and notification
//! surface are all reached through the traits in [`ledger`] and
//! [`collaborators`]; [`simulated`] provides in-memory versions of each.

pub mod adapter;
pub mod amount;
pub mod collaborators;
pub mod config;
pub mod consolidation;
pub mod draft;
pub mod errors;
pub mod ledger;
pub mod pipeline;
pub mod simulated;
pub mod types;

// Re-export commonly used types
pub use config::SendflowConfig;
pub use draft::{GasSettings, PartialDraft, TransactionDraft, TxKind};
pub use errors::{LedgerError, PipelineError, PipelineResult};
pub use pipeline::{
    BuildOutcome, CloseReason, Collaborators, RunHandle, SendOutcome, SendPipeline, Step,
};
pub use types::{Address, Amount, NetworkId, Notice, Severity};
