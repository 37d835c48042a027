//! Ledger client abstraction
//!
//! The pipeline never talks to a node directly. It goes through
//! [`LedgerClient`], which builds unsigned transactions, builds sweep
//! (consolidation) transactions and signs-and-submits a built payload.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::draft::TransactionDraft;
use crate::errors::LedgerError;
use crate::types::{Address, Amount, NetworkId};

/// Fully built, fee-priced transaction awaiting a signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTransaction {
    pub tx_id: String,
    pub unsigned_tx: String,
    pub from_group: u32,
    /// Destination group for transfers; equals `from_group` otherwise
    #[serde(default)]
    pub to_group: u32,
    pub gas_amount: u64,
    pub gas_price: Amount,
    /// Address of the contract created by a deploy transaction
    #[serde(default)]
    pub contract_address: Option<String>,
}

/// One merge transaction produced by a sweep build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepTransaction {
    pub tx_id: String,
    pub unsigned_tx: String,
    pub gas_amount: u64,
    pub gas_price: Amount,
}

/// Result of a successful sign-and-submit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub tx_id: String,
    pub signature: String,
}

/// Async ledger client used by the pipeline
///
/// Implementations translate transport failures into [`LedgerError`],
/// keeping the node's own explanation in `detail`.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Build an unsigned transaction for a complete draft
    async fn build(&self, draft: &TransactionDraft) -> Result<UnsignedTransaction, LedgerError>;

    /// Build the merge transactions that sweep every input of `address` back to itself
    async fn build_sweep(&self, address: &Address) -> Result<Vec<SweepTransaction>, LedgerError>;

    /// Sign `unsigned_tx` with the key of `address` and broadcast it
    async fn sign_and_submit(
        &self,
        address: &Address,
        tx_id: &str,
        unsigned_tx: &str,
        network: &NetworkId,
    ) -> Result<SubmitReceipt, LedgerError>;
}
