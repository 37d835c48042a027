//! Input consolidation sub-flow
//!
//! When the node refuses to build a transaction because the source address
//! holds too many small inputs, the pipeline offers to merge them first.
//! This module decides whether a build failure means exactly that and
//! packages the resulting merge transactions with their aggregate fee.

use tracing::debug;

use crate::amount::fee_for;
use crate::config::ConsolidationSettings;
use crate::errors::{LedgerError, PipelineError, PipelineResult};
use crate::ledger::{LedgerClient, SweepTransaction};
use crate::types::{Address, Amount};

/// Recognizes the "inputs need consolidating" failure
///
/// The node only reports this through free text today, so the match is a
/// case-insensitive substring search over a configurable vocabulary.
// TODO: switch to the structured error code once the node API exposes one
#[derive(Debug, Clone)]
pub struct ConsolidationPolicy {
    vocabulary: Vec<String>,
}

impl ConsolidationPolicy {
    pub fn new<I, S>(vocabulary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            vocabulary: vocabulary
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    pub fn from_settings(settings: &ConsolidationSettings) -> Self {
        Self::new(&settings.vocabulary)
    }

    /// True when the server-reported detail matches the vocabulary
    ///
    /// Errors without a detail never qualify.
    pub fn requires_consolidation(&self, error: &LedgerError) -> bool {
        let Some(detail) = error.detail.as_deref() else {
            return false;
        };
        let detail = detail.to_lowercase();
        self.vocabulary.iter().any(|word| detail.contains(word.as_str()))
    }

    /// Translate a build failure into the pipeline error it stands for
    pub fn classify_build_error(&self, error: &LedgerError, fallback: &str) -> PipelineError {
        if self.requires_consolidation(error) {
            PipelineError::ConsolidationRequired
        } else {
            PipelineError::Build(error.human_readable(fallback))
        }
    }
}

impl Default for ConsolidationPolicy {
    fn default() -> Self {
        Self::from_settings(&ConsolidationSettings::default())
    }
}

/// Non-empty, ordered merge transactions plus their combined fee
///
/// Order is the order returned by the ledger and is kept for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepBatch {
    transactions: Vec<SweepTransaction>,
    fee: Amount,
}

impl SweepBatch {
    pub fn new(transactions: Vec<SweepTransaction>) -> PipelineResult<Self> {
        if transactions.is_empty() {
            return Err(PipelineError::Build(
                "No inputs available to consolidate".to_string(),
            ));
        }
        let fee = transactions.iter().try_fold(0 as Amount, |total, tx| {
            fee_for(tx.gas_amount, tx.gas_price)?
                .checked_add(total)
                .ok_or(PipelineError::Overflow("sweep fee"))
        })?;
        Ok(Self { transactions, fee })
    }

    pub fn transactions(&self) -> &[SweepTransaction] {
        &self.transactions
    }

    pub fn fee(&self) -> Amount {
        self.fee
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Build the merge transactions for `address`
///
/// Called once per matching build failure. Ledger errors are translated into
/// the same readable build error a normal build failure produces.
pub async fn build_sweep_batch(
    ledger: &dyn LedgerClient,
    address: &Address,
) -> PipelineResult<SweepBatch> {
    let transactions = ledger
        .build_sweep(address)
        .await
        .map_err(|e| PipelineError::Build(e.human_readable("Error while building the transaction")))?;
    let batch = SweepBatch::new(transactions)?;
    debug!(
        address = %address.hash,
        tx_count = batch.len(),
        fee = %batch.fee(),
        "Sweep transactions built"
    );
    Ok(batch)
}
