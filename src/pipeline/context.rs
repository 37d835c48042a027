//! Run-scoped pipeline context
//!
//! One context per run, created when the run starts and dropped when it
//! closes. It holds everything the build produced so the submission step
//! never has to rebuild: the unsigned transaction and its fee, or the sweep
//! batch when consolidation is in progress.

use uuid::Uuid;

use crate::consolidation::SweepBatch;
use crate::draft::TransactionDraft;
use crate::errors::{PipelineError, PipelineResult};
use crate::ledger::UnsignedTransaction;
use crate::types::{Amount, NetworkId};

#[derive(Debug)]
pub struct PipelineContext {
    run_id: Uuid,
    network: NetworkId,
    draft: Option<TransactionDraft>,
    unsigned: Option<UnsignedTransaction>,
    fee: Option<Amount>,
    sweep: Option<SweepBatch>,
    sweeping: bool,
    consolidation_required: bool,
}

impl PipelineContext {
    pub fn new(run_id: Uuid, network: NetworkId) -> Self {
        Self {
            run_id,
            network,
            draft: None,
            unsigned: None,
            fee: None,
            sweep: None,
            sweeping: false,
            consolidation_required: false,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn network(&self) -> &NetworkId {
        &self.network
    }

    pub fn draft(&self) -> Option<&TransactionDraft> {
        self.draft.as_ref()
    }

    pub fn unsigned_transaction(&self) -> Option<&UnsignedTransaction> {
        self.unsigned.as_ref()
    }

    pub fn unsigned_tx_id(&self) -> Option<&str> {
        self.unsigned.as_ref().map(|tx| tx.tx_id.as_str())
    }

    pub fn fee(&self) -> Option<Amount> {
        self.fee
    }

    pub fn sweep(&self) -> Option<&SweepBatch> {
        self.sweep.as_ref()
    }

    pub fn sweep_count(&self) -> usize {
        self.sweep.as_ref().map_or(0, SweepBatch::len)
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeping
    }

    pub fn consolidation_required(&self) -> bool {
        self.consolidation_required
    }

    pub(crate) fn set_draft(&mut self, draft: TransactionDraft) {
        self.draft = Some(draft);
    }

    /// Store a freshly built transaction, replacing any previous one wholesale
    pub(crate) fn set_built(&mut self, unsigned: UnsignedTransaction, fee: Amount) {
        self.unsigned = Some(unsigned);
        self.fee = Some(fee);
    }

    /// Drop the build result, keeping the draft
    pub(crate) fn clear_build(&mut self) {
        self.unsigned = None;
        self.fee = None;
    }

    /// Install a sweep batch; the flag is only raised together with a non-empty batch
    pub(crate) fn set_sweep(&mut self, batch: SweepBatch) {
        self.clear_build();
        self.fee = Some(batch.fee());
        self.sweep = Some(batch);
        self.sweeping = true;
        self.consolidation_required = true;
    }

    pub(crate) fn clear_consolidation(&mut self) {
        self.sweep = None;
        self.sweeping = false;
        self.consolidation_required = false;
        self.fee = None;
    }

    /// Fee to be paid by the next submission
    ///
    /// Submitting without a computed fee is never allowed.
    pub(crate) fn require_fee(&self) -> PipelineResult<Amount> {
        self.fee
            .ok_or_else(|| PipelineError::contract_violation("submission attempted before the fee was computed"))
    }

    pub(crate) fn check_invariants(&self) -> PipelineResult<()> {
        if self.consolidation_required && self.sweep_count() == 0 {
            return Err(PipelineError::contract_violation(
                "consolidation flagged without sweep transactions",
            ));
        }
        if self.unsigned.is_some() && self.fee.is_none() {
            return Err(PipelineError::contract_violation(
                "unsigned transaction stored without a fee",
            ));
        }
        Ok(())
    }
}
