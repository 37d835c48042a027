//! The send pipeline state machine
//!
//! Written once against [`TransactionDraft`]; the transaction kind only
//! changes what the ledger builds and which response shape a peer gets.
//! Every transition is an explicit method call. The three network calls
//! (build, sweep build, sign-and-submit) are the only suspension points and
//! `&mut self` keeps at most one of them in flight.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::context::PipelineContext;
use super::state::{CloseReason, RunHandle, Step};
use crate::adapter;
use crate::amount::fee_for;
use crate::collaborators::{AddressRegistry, CredentialGate, NotificationSink, ProtocolSession};
use crate::config::{GasConfig, PipelineSettings, SendflowConfig};
use crate::consolidation::{build_sweep_batch, ConsolidationPolicy};
use crate::draft::{PartialDraft, TransactionDraft, TxKind};
use crate::errors::{PipelineError, PipelineResult};
use crate::ledger::{LedgerClient, SubmitReceipt, UnsignedTransaction};
use crate::types::{Address, Amount, Notice};

const BUILD_ERROR: &str = "Error while building the transaction";
const SEND_ERROR: &str = "Error while sending the transaction";

/// Everything the pipeline talks to
#[derive(Clone)]
pub struct Collaborators {
    pub ledger: Arc<dyn LedgerClient>,
    pub registry: Arc<dyn AddressRegistry>,
    pub notifier: Arc<dyn NotificationSink>,
    /// Required when the password requirement is on
    pub credentials: Option<Arc<dyn CredentialGate>>,
    /// Present when a dApp peer started this run
    pub session: Option<Arc<dyn ProtocolSession>>,
}

/// What the user confirms on the review step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewSummary {
    pub kind: TxKind,
    pub from_address: String,
    pub destination: Option<String>,
    /// Native amount leaving the address (resolved for drains)
    pub amount: Option<Amount>,
    pub fee: Amount,
    pub tx_id: String,
}

/// Offer to merge the source inputs first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsolidationPrompt {
    pub fee: Amount,
    pub transactions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Review(ReviewSummary),
    ConsolidationPrompt(ConsolidationPrompt),
    /// The run was closed while the ledger call was in flight
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    pub tx_ids: Vec<String>,
    /// Signature of the main transaction; `None` for sweeps
    pub signature: Option<String>,
    pub notice: String,
    pub responded_to_peer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Waiting for [`SendPipeline::authenticate`]
    PasswordRequired,
    Sent(SendReport),
    Discarded,
}

/// One run of the send flow for a single transaction kind
pub struct SendPipeline {
    kind: TxKind,
    title: String,
    step: Step,
    initial: PartialDraft,
    editing: Option<PartialDraft>,
    ctx: Option<PipelineContext>,
    handle: RunHandle,
    deps: Collaborators,
    settings: PipelineSettings,
    gas: GasConfig,
    policy: ConsolidationPolicy,
}

impl SendPipeline {
    pub fn new(initial: PartialDraft, deps: Collaborators, config: &SendflowConfig) -> PipelineResult<Self> {
        if config.pipeline.password_requirement && deps.credentials.is_none() {
            return Err(PipelineError::Config(
                "password requirement is enabled but no credential gate was supplied".to_string(),
            ));
        }
        let handle = RunHandle::new(deps.session.clone());
        let ctx = PipelineContext::new(handle.run_id(), config.pipeline.network.clone());
        info!(
            run_id = %handle.run_id(),
            kind = ?initial.kind,
            from = %initial.from_address.hash,
            "Send pipeline started"
        );
        Ok(Self {
            kind: initial.kind,
            title: initial.kind.title().to_string(),
            step: Step::Building,
            initial,
            editing: None,
            ctx: Some(ctx),
            handle,
            deps,
            settings: config.pipeline.clone(),
            gas: config.gas.clone(),
            policy: ConsolidationPolicy::from_settings(&config.consolidation),
        })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn kind(&self) -> TxKind {
        self.kind
    }

    pub fn run_id(&self) -> Uuid {
        self.handle.run_id()
    }

    pub fn step(&self) -> Step {
        if self.handle.is_closed() && !self.step.is_closed() {
            Step::Closed(CloseReason::Cancelled)
        } else {
            self.step
        }
    }

    pub fn title(&self) -> &str {
        match self.step() {
            Step::Reviewing => "Review",
            Step::Authenticating => "Password Check",
            Step::Submitting => "Sending",
            Step::Building | Step::Closed(_) => &self.title,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.handle.is_loading()
    }

    /// Handle for closing the run from another task
    pub fn handle(&self) -> RunHandle {
        self.handle.clone()
    }

    /// Live context; `None` once the run is closed
    pub fn context(&self) -> Option<&PipelineContext> {
        if self.step().is_closed() {
            None
        } else {
            self.ctx.as_ref()
        }
    }

    /// Draft to show in the build form: the last submission or the initial data
    pub fn draft_for_editing(&self) -> &PartialDraft {
        self.editing.as_ref().unwrap_or(&self.initial)
    }

    /// True while the consolidation prompt is waiting for accept / decline
    pub fn consolidation_pending(&self) -> bool {
        self.step() == Step::Building
            && self.ctx.as_ref().is_some_and(PipelineContext::consolidation_required)
    }

    /// Validate the draft and ask the ledger to build it
    pub async fn submit_draft(&mut self, partial: PartialDraft) -> PipelineResult<BuildOutcome> {
        self.expect_step(Step::Building, "submit_draft")?;
        if self.consolidation_pending() {
            return Err(self.invalid("submit_draft"));
        }
        if partial.kind != self.kind {
            return Err(PipelineError::validation(format!(
                "expected a {:?} draft, got {:?}",
                self.kind, partial.kind
            )));
        }

        self.editing = Some(partial.clone());
        let draft = partial.complete(&self.gas)?;
        {
            let ctx = self.ctx_mut()?;
            ctx.clear_build();
            ctx.set_draft(draft.clone());
        }

        let Some(ticket) = self.handle.begin(false) else {
            return Ok(self.discard("build"));
        };
        debug!(run_id = %self.run_id(), kind = ?self.kind, "Building transaction");
        let result = self.deps.ledger.build(&draft).await;
        if !self.handle.finish(ticket) {
            return Ok(self.discard("build"));
        }

        let err = match result {
            Ok(unsigned) => return self.on_built(&draft, unsigned),
            Err(err) => err,
        };
        match self.policy.classify_build_error(&err, BUILD_ERROR) {
            PipelineError::ConsolidationRequired => {
                info!(
                    run_id = %self.run_id(),
                    detail = ?err.detail,
                    "Build refused, inputs need consolidating"
                );
                self.start_consolidation(draft.from_address()).await
            }
            failure => {
                warn!(
                    run_id = %self.run_id(),
                    category = failure.category(),
                    error = %err,
                    "Transaction build failed"
                );
                self.alert(&notice_text(&failure));
                Err(failure)
            }
        }
    }

    /// Return from review to the build form, keeping the draft
    pub fn back(&mut self) -> PipelineResult<()> {
        self.expect_step(Step::Reviewing, "back")?;
        self.ctx_mut()?.clear_build();
        self.step = Step::Building;
        debug!(run_id = %self.run_id(), "Back to build step");
        Ok(())
    }

    /// Confirm the reviewed transaction
    pub async fn send(&mut self) -> PipelineResult<SendOutcome> {
        self.expect_step(Step::Reviewing, "send")?;
        self.ctx_ref()?.require_fee()?;
        if self.settings.password_requirement {
            self.step = Step::Authenticating;
            return Ok(SendOutcome::PasswordRequired);
        }
        self.submit().await
    }

    /// Accept the consolidation prompt and submit the sweep batch
    pub async fn accept_consolidation(&mut self) -> PipelineResult<SendOutcome> {
        self.expect_step(Step::Building, "accept_consolidation")?;
        if !self.consolidation_pending() {
            return Err(self.invalid("accept_consolidation"));
        }
        if self.settings.password_requirement {
            self.step = Step::Authenticating;
            return Ok(SendOutcome::PasswordRequired);
        }
        self.submit().await
    }

    /// Dismiss the consolidation prompt and stay on the build form
    pub fn decline_consolidation(&mut self) -> PipelineResult<()> {
        self.expect_step(Step::Building, "decline_consolidation")?;
        if !self.consolidation_pending() {
            return Err(self.invalid("decline_consolidation"));
        }
        self.ctx_mut()?.clear_consolidation();
        info!(run_id = %self.run_id(), "Consolidation declined");
        Ok(())
    }

    /// Check the password and submit on success
    pub async fn authenticate(&mut self, password: &str) -> PipelineResult<SendOutcome> {
        self.expect_step(Step::Authenticating, "authenticate")?;
        let gate = self.deps.credentials.clone().ok_or_else(|| {
            PipelineError::contract_violation("authentication step reached without a credential gate")
        })?;
        let accepted = gate.verify(password).await;
        if self.sync_closed() {
            return Ok(SendOutcome::Discarded);
        }
        if !accepted {
            debug!(run_id = %self.run_id(), "Password rejected");
            return Err(PipelineError::Authentication);
        }
        self.submit().await
    }

    /// Close the run from any step except `Submitting`
    pub fn close(&mut self) -> PipelineResult<()> {
        if self.step.is_closed() {
            return Ok(());
        }
        if self.step == Step::Submitting {
            return Err(PipelineError::CloseDuringSubmission);
        }
        self.handle.close()?;
        self.teardown(CloseReason::Cancelled);
        Ok(())
    }

    fn on_built(&mut self, draft: &TransactionDraft, unsigned: UnsignedTransaction) -> PipelineResult<BuildOutcome> {
        let fee = fee_for(unsigned.gas_amount, unsigned.gas_price)?;
        let amount = draft.expected_amount(fee)?;
        let summary = ReviewSummary {
            kind: draft.kind(),
            from_address: draft.from_address().hash.clone(),
            destination: draft.destination().map(str::to_string),
            amount,
            fee,
            tx_id: unsigned.tx_id.clone(),
        };

        let run_id = self.run_id();
        let ctx = self.ctx_mut()?;
        ctx.set_built(unsigned, fee);
        ctx.check_invariants()?;
        self.step = Step::Reviewing;
        info!(run_id = %run_id, tx_id = %summary.tx_id, fee = %fee, "Transaction built, awaiting review");
        Ok(BuildOutcome::Review(summary))
    }

    async fn start_consolidation(&mut self, address: &Address) -> PipelineResult<BuildOutcome> {
        let Some(ticket) = self.handle.begin(false) else {
            return Ok(self.discard("sweep build"));
        };
        let result = build_sweep_batch(self.deps.ledger.as_ref(), address).await;
        if !self.handle.finish(ticket) {
            return Ok(self.discard("sweep build"));
        }

        let run_id = self.run_id();
        match result {
            Ok(batch) => {
                let prompt = ConsolidationPrompt {
                    fee: batch.fee(),
                    transactions: batch.len(),
                };
                let ctx = self.ctx_mut()?;
                ctx.set_sweep(batch);
                ctx.check_invariants()?;
                info!(
                    run_id = %run_id,
                    tx_count = prompt.transactions,
                    fee = %prompt.fee,
                    "Consolidation prompt raised"
                );
                Ok(BuildOutcome::ConsolidationPrompt(prompt))
            }
            Err(err) => {
                self.ctx_mut()?.clear_consolidation();
                if err.is_user_facing() {
                    self.alert(&notice_text(&err));
                }
                warn!(run_id = %run_id, category = err.category(), error = %err, "Sweep build failed");
                Err(err)
            }
        }
    }

    async fn submit(&mut self) -> PipelineResult<SendOutcome> {
        self.ctx_ref()?.require_fee()?;
        let Some(ticket) = self.handle.begin(true) else {
            self.sync_closed();
            return Ok(SendOutcome::Discarded);
        };
        self.step = Step::Submitting;

        let result = match self.ctx.as_ref() {
            Some(ctx) if ctx.is_sweeping() => self.submit_sweep(ctx).await,
            Some(ctx) => self.submit_single(ctx).await,
            None => Err(PipelineError::contract_violation("submission without a context")),
        };

        // The phase stays submitting until the peer has been answered; on
        // success `complete` moves it straight to closed.
        let outcome = match result {
            Ok(receipts) => self.on_submitted(receipts).await,
            Err(err) => self.on_submit_failed(err).await,
        };
        if !matches!(outcome, Ok(SendOutcome::Sent(_))) {
            self.handle.finish(ticket);
        }
        outcome
    }

    async fn submit_single(&self, ctx: &PipelineContext) -> PipelineResult<Vec<SubmitReceipt>> {
        let unsigned = ctx
            .unsigned_transaction()
            .ok_or_else(|| PipelineError::contract_violation("no unsigned transaction available"))?;
        let from = self.from_address(ctx)?;
        info!(run_id = %ctx.run_id(), tx_id = %unsigned.tx_id, "Submitting transaction");
        let receipt = self
            .deps
            .ledger
            .sign_and_submit(from, &unsigned.tx_id, &unsigned.unsigned_tx, ctx.network())
            .await
            .map_err(|e| PipelineError::Submission(e.human_readable(SEND_ERROR)))?;
        Ok(vec![receipt])
    }

    /// Submit every sweep transaction in ledger order, halting on the first failure
    async fn submit_sweep(&self, ctx: &PipelineContext) -> PipelineResult<Vec<SubmitReceipt>> {
        let batch = ctx
            .sweep()
            .ok_or_else(|| PipelineError::contract_violation("sweeping without sweep transactions"))?;
        let from = self.from_address(ctx)?;
        let mut receipts = Vec::with_capacity(batch.len());
        for (index, tx) in batch.transactions().iter().enumerate() {
            debug!(run_id = %ctx.run_id(), index, tx_id = %tx.tx_id, "Submitting sweep transaction");
            let receipt = self
                .deps
                .ledger
                .sign_and_submit(from, &tx.tx_id, &tx.unsigned_tx, ctx.network())
                .await
                .map_err(|e| {
                    warn!(
                        run_id = %ctx.run_id(),
                        submitted = index,
                        remaining = batch.len() - index,
                        "Sweep submission halted"
                    );
                    PipelineError::Submission(e.human_readable(SEND_ERROR))
                })?;
            receipts.push(receipt);
        }
        Ok(receipts)
    }

    async fn on_submitted(&mut self, receipts: Vec<SubmitReceipt>) -> PipelineResult<SendOutcome> {
        let ctx = self.ctx_ref()?;
        let sweeping = ctx.is_sweeping();
        let from = self.from_address(ctx)?.clone();
        let signature = if sweeping {
            None
        } else {
            receipts.first().map(|r| r.signature.clone())
        };

        let mut responded_to_peer = false;
        if let (Some(signature), Some(session)) = (&signature, &self.deps.session) {
            if let Some(request) = session.pending_request() {
                let result = adapter::sign_result(self.kind, ctx.unsigned_transaction(), signature)?;
                match session.respond(&request, result).await {
                    Ok(()) => responded_to_peer = true,
                    Err(e) => warn!(run_id = %self.run_id(), request_id = request.id, error = %e, "Peer response failed"),
                }
            }
        }

        self.deps.registry.set_active(&from);
        let text = if sweeping && receipts.len() > 1 {
            "Transactions sent!"
        } else {
            "Transaction sent!"
        };
        self.deps.notifier.notify(Notice::success(text));
        if let Some(session) = &self.deps.session {
            session.clear_pending_request();
        }

        let report = SendReport {
            tx_ids: receipts.iter().map(|r| r.tx_id.clone()).collect(),
            signature,
            notice: text.to_string(),
            responded_to_peer,
        };
        info!(run_id = %self.run_id(), tx_count = report.tx_ids.len(), sweeping, "Submission succeeded");
        self.handle.complete();
        self.teardown(CloseReason::Completed);
        Ok(SendOutcome::Sent(report))
    }

    async fn on_submit_failed(&mut self, err: PipelineError) -> PipelineResult<SendOutcome> {
        let sweeping = self.ctx.as_ref().is_some_and(PipelineContext::is_sweeping);
        if sweeping {
            self.ctx_mut()?.clear_consolidation();
            self.step = Step::Building;
        } else {
            self.step = Step::Reviewing;
        }
        if !err.is_user_facing() {
            return Err(err);
        }

        let text = notice_text(&err);
        warn!(
            run_id = %self.run_id(),
            category = err.category(),
            error = %text,
            sweeping,
            "Submission failed"
        );
        self.alert(&text);
        if let Some(session) = &self.deps.session {
            session.report_error(&text).await;
        }
        Err(err)
    }

    fn from_address<'a>(&self, ctx: &'a PipelineContext) -> PipelineResult<&'a Address> {
        ctx.draft()
            .map(TransactionDraft::from_address)
            .ok_or_else(|| PipelineError::contract_violation("no draft in context"))
    }

    fn alert(&self, text: &str) {
        self.deps
            .notifier
            .notify(Notice::alert(text, self.settings.alert_duration()));
    }

    fn invalid(&self, operation: &'static str) -> PipelineError {
        PipelineError::InvalidTransition {
            step: self.step(),
            operation,
        }
    }

    fn expect_step(&mut self, expected: Step, operation: &'static str) -> PipelineResult<()> {
        self.sync_closed();
        if self.step != expected {
            return Err(self.invalid(operation));
        }
        Ok(())
    }

    /// Tear down if a handle closed the run; true when closed
    fn sync_closed(&mut self) -> bool {
        if self.handle.is_closed() && !self.step.is_closed() {
            self.teardown(CloseReason::Cancelled);
        }
        self.step.is_closed()
    }

    fn discard(&mut self, operation: &str) -> BuildOutcome {
        debug!(run_id = %self.run_id(), operation, "Late ledger response discarded");
        self.sync_closed();
        BuildOutcome::Discarded
    }

    fn teardown(&mut self, reason: CloseReason) {
        self.ctx = None;
        self.step = Step::Closed(reason);
        info!(run_id = %self.run_id(), reason = ?reason, "Send pipeline closed");
    }

    fn ctx_ref(&self) -> PipelineResult<&PipelineContext> {
        self.ctx
            .as_ref()
            .ok_or_else(|| PipelineError::contract_violation("pipeline context already torn down"))
    }

    fn ctx_mut(&mut self) -> PipelineResult<&mut PipelineContext> {
        self.ctx
            .as_mut()
            .ok_or_else(|| PipelineError::contract_violation("pipeline context already torn down"))
    }
}

fn notice_text(err: &PipelineError) -> String {
    match err {
        PipelineError::Build(text) | PipelineError::Submission(text) | PipelineError::Validation(text) => {
            text.clone()
        }
        other => other.to_string(),
    }
}
