//! Shared fixtures for pipeline integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use sendflow::adapter::SignResult;
use sendflow::collaborators::{CredentialGate, PendingRequest, ProtocolSession};
use sendflow::ledger::{LedgerClient, SubmitReceipt, SweepTransaction, UnsignedTransaction};
use sendflow::pipeline::{Collaborators, SendPipeline};
use sendflow::simulated::{InMemoryAddressRegistry, InMemorySession, RecordingNotifier, StaticPasswordGate};
use sendflow::{Address, LedgerError, NetworkId, PartialDraft, SendflowConfig, TxKind};

pub const ALICE: &str = "1DrDyTr9RpRsQnDnXo2YRiPzPW4ooHX5LLoqXrqfMrpQH";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn alice(balance: u128) -> Address {
    Address::new(ALICE, "02ab", balance)
}

pub fn unsigned(tx_id: &str, gas_amount: u64, gas_price: u128) -> UnsignedTransaction {
    UnsignedTransaction {
        tx_id: tx_id.to_string(),
        unsigned_tx: format!("00{}", tx_id),
        from_group: 0,
        to_group: 0,
        gas_amount,
        gas_price,
        contract_address: None,
    }
}

pub fn sweep(tx_id: &str, gas_amount: u64, gas_price: u128) -> SweepTransaction {
    SweepTransaction {
        tx_id: tx_id.to_string(),
        unsigned_tx: format!("ff{}", tx_id),
        gas_amount,
        gas_price,
    }
}

pub fn consolidation_error() -> LedgerError {
    LedgerError::with_detail("Bad request", "Too many inputs, please consider consolidating your UTXOs")
}

pub fn script_draft(balance: u128) -> PartialDraft {
    PartialDraft::new(TxKind::ScriptCall, alice(balance)).bytecode("0x01")
}

/// Ledger that replays scripted responses
///
/// Optional gates hold a build or a submission until the test releases it.
#[derive(Default)]
pub struct ScriptedLedger {
    builds: Mutex<VecDeque<Result<UnsignedTransaction, LedgerError>>>,
    sweep: Mutex<Option<Result<Vec<SweepTransaction>, LedgerError>>>,
    failing_submissions: Mutex<HashSet<String>>,
    rejections: Mutex<HashMap<String, LedgerError>>,
    submitted: Mutex<Vec<String>>,
    build_calls: Mutex<usize>,
    sweep_calls: Mutex<usize>,
    build_gate: Option<Arc<Notify>>,
    sweep_gate: Option<Arc<Notify>>,
    submit_gate: Option<Arc<Notify>>,
}

impl ScriptedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_build_gate(mut self, gate: Arc<Notify>) -> Self {
        self.build_gate = Some(gate);
        self
    }

    pub fn with_sweep_gate(mut self, gate: Arc<Notify>) -> Self {
        self.sweep_gate = Some(gate);
        self
    }

    pub fn with_submit_gate(mut self, gate: Arc<Notify>) -> Self {
        self.submit_gate = Some(gate);
        self
    }

    pub fn push_build(&self, result: Result<UnsignedTransaction, LedgerError>) -> &Self {
        self.builds.lock().push_back(result);
        self
    }

    pub fn set_sweep(&self, result: Result<Vec<SweepTransaction>, LedgerError>) -> &Self {
        *self.sweep.lock() = Some(result);
        self
    }

    pub fn fail_submission(&self, tx_id: &str) -> &Self {
        self.failing_submissions.lock().insert(tx_id.to_string());
        self
    }

    /// Fail submission of `tx_id` with a specific ledger error
    pub fn reject_submission(&self, tx_id: &str, error: LedgerError) -> &Self {
        self.rejections.lock().insert(tx_id.to_string(), error);
        self
    }

    pub fn clear_failures(&self) {
        self.failing_submissions.lock().clear();
        self.rejections.lock().clear();
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().clone()
    }

    pub fn build_calls(&self) -> usize {
        *self.build_calls.lock()
    }

    pub fn sweep_calls(&self) -> usize {
        *self.sweep_calls.lock()
    }
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    async fn build(&self, _draft: &sendflow::TransactionDraft) -> Result<UnsignedTransaction, LedgerError> {
        *self.build_calls.lock() += 1;
        if let Some(gate) = &self.build_gate {
            gate.notified().await;
        }
        self.builds
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(LedgerError::new("no scripted build")))
    }

    async fn build_sweep(&self, _address: &Address) -> Result<Vec<SweepTransaction>, LedgerError> {
        *self.sweep_calls.lock() += 1;
        if let Some(gate) = &self.sweep_gate {
            gate.notified().await;
        }
        self.sweep
            .lock()
            .clone()
            .unwrap_or_else(|| Err(LedgerError::new("no scripted sweep")))
    }

    async fn sign_and_submit(
        &self,
        _address: &Address,
        tx_id: &str,
        _unsigned_tx: &str,
        _network: &NetworkId,
    ) -> Result<SubmitReceipt, LedgerError> {
        if let Some(gate) = &self.submit_gate {
            gate.notified().await;
        }
        if let Some(error) = self.rejections.lock().get(tx_id) {
            return Err(error.clone());
        }
        if self.failing_submissions.lock().contains(tx_id) {
            return Err(LedgerError::new("node unreachable"));
        }
        self.submitted.lock().push(tx_id.to_string());
        Ok(SubmitReceipt {
            tx_id: tx_id.to_string(),
            signature: format!("sig-{}", tx_id),
        })
    }
}

/// Peer session that holds `respond` and `report_error` until released
///
/// `entered` fires once the pipeline is inside one of the two calls.
pub struct GatedSession {
    pub inner: InMemorySession,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl GatedSession {
    pub fn new(inner: InMemorySession) -> Self {
        Self {
            inner,
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl ProtocolSession for GatedSession {
    fn pending_request(&self) -> Option<PendingRequest> {
        self.inner.pending_request()
    }

    async fn respond(&self, request: &PendingRequest, result: SignResult) -> Result<(), String> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.respond(request, result).await
    }

    async fn report_error(&self, message: &str) {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.report_error(message).await
    }

    fn clear_pending_request(&self) {
        self.inner.clear_pending_request()
    }
}

/// Pipeline plus handles on every collaborator
pub struct Harness {
    pub ledger: Arc<ScriptedLedger>,
    pub registry: Arc<InMemoryAddressRegistry>,
    pub notifier: Arc<RecordingNotifier>,
    pub session: Option<Arc<InMemorySession>>,
    pub gated: Option<Arc<GatedSession>>,
    pub config: SendflowConfig,
}

impl Harness {
    pub fn new(ledger: ScriptedLedger) -> Self {
        init_tracing();
        Self {
            ledger: Arc::new(ledger),
            registry: Arc::new(InMemoryAddressRegistry::new(vec![alice(1_000)])),
            notifier: Arc::new(RecordingNotifier::new()),
            session: None,
            gated: None,
            config: SendflowConfig::default(),
        }
    }

    pub fn with_session(mut self, session: InMemorySession) -> Self {
        self.session = Some(Arc::new(session));
        self
    }

    pub fn with_gated_session(mut self, session: GatedSession) -> Self {
        self.gated = Some(Arc::new(session));
        self
    }

    pub fn with_password(mut self) -> Self {
        self.config.pipeline.password_requirement = true;
        self
    }

    pub fn collaborators(&self) -> Collaborators {
        let credentials = self
            .config
            .pipeline
            .password_requirement
            .then(|| Arc::new(StaticPasswordGate::new("secret")) as Arc<dyn CredentialGate>);
        Collaborators {
            ledger: self.ledger.clone(),
            registry: self.registry.clone(),
            notifier: self.notifier.clone(),
            credentials,
            session: match (&self.gated, &self.session) {
                (Some(gated), _) => Some(gated.clone() as Arc<dyn ProtocolSession>),
                (None, Some(session)) => Some(session.clone() as Arc<dyn ProtocolSession>),
                (None, None) => None,
            },
        }
    }

    pub fn pipeline(&self, initial: PartialDraft) -> SendPipeline {
        SendPipeline::new(initial, self.collaborators(), &self.config).unwrap()
    }
}
