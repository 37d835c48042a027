//! Deterministic in-memory collaborators
//!
//! [`SimulatedLedger`] models an address whose funds are spread over many
//! small inputs: building a transaction that would spend more inputs than
//! the node allows fails with a "please consolidate" detail, and submitting
//! sweep transactions merges those inputs. Used by the CLI and by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use zeroize::Zeroize;

use crate::adapter::SignResult;
use crate::collaborators::{AddressRegistry, CredentialGate, NotificationSink, PendingRequest, ProtocolSession};
use crate::config::SimulationConfig;
use crate::draft::TransactionDraft;
use crate::errors::LedgerError;
use crate::ledger::{LedgerClient, SubmitReceipt, SweepTransaction, UnsignedTransaction};
use crate::types::{Address, NetworkId, Notice};

fn digest_hex(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

#[derive(Debug, Default)]
struct LedgerState {
    /// Unspent input count per address hash
    inputs: HashMap<String, usize>,
    /// Sweep tx id -> (address hash, inputs merged)
    sweeps: HashMap<String, (String, usize)>,
    submitted: Vec<String>,
    builds: u64,
    fail_next_build: Option<LedgerError>,
    fail_submission_at: Option<(usize, LedgerError)>,
}

/// Ledger client backed by an in-memory input model
#[derive(Debug)]
pub struct SimulatedLedger {
    config: SimulationConfig,
    state: Mutex<LedgerState>,
}

impl SimulatedLedger {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Set the unspent input count of `address`
    pub fn with_inputs(self, address: &str, inputs: usize) -> Self {
        self.set_inputs(address, inputs);
        self
    }

    pub fn set_inputs(&self, address: &str, inputs: usize) {
        self.state.lock().inputs.insert(address.to_string(), inputs);
    }

    /// Unspent inputs of `address`; unknown addresses hold a single input
    pub fn inputs(&self, address: &str) -> usize {
        self.state.lock().inputs.get(address).copied().unwrap_or(1)
    }

    /// Fail the next `build` call with `error`
    pub fn fail_next_build(&self, error: LedgerError) {
        self.state.lock().fail_next_build = Some(error);
    }

    /// Fail the submission at position `index` (counted over the ledger lifetime)
    pub fn fail_submission_at(&self, index: usize, error: LedgerError) {
        self.state.lock().fail_submission_at = Some((index, error));
    }

    /// Tx ids accepted so far, in submission order
    pub fn submitted(&self) -> Vec<String> {
        self.state.lock().submitted.clone()
    }

    pub fn build_count(&self) -> u64 {
        self.state.lock().builds
    }
}

#[async_trait]
impl LedgerClient for SimulatedLedger {
    async fn build(&self, draft: &TransactionDraft) -> Result<UnsignedTransaction, LedgerError> {
        let mut state = self.state.lock();
        state.builds += 1;
        if let Some(err) = state.fail_next_build.take() {
            return Err(err);
        }

        let from = draft.from_address();
        let inputs = state.inputs.get(&from.hash).copied().unwrap_or(1);
        if inputs > self.config.max_inputs_per_tx {
            return Err(LedgerError::with_detail(
                "Bad request",
                format!(
                    "Too many inputs for the transfer ({} > {}), consider consolidating your UTXOs",
                    inputs, self.config.max_inputs_per_tx
                ),
            ));
        }

        let payload = serde_json::to_vec(draft).map_err(|e| LedgerError::new(e.to_string()))?;
        let counter = state.builds.to_le_bytes();
        let tx_id = digest_hex(&[payload.as_slice(), counter.as_slice()]);
        let gas = draft.gas();
        let contract_address = match draft {
            TransactionDraft::ContractDeploy(_) => Some(digest_hex(&[b"contract".as_slice(), tx_id.as_bytes()])[..40].to_string()),
            _ => None,
        };
        debug!(tx_id = %tx_id, inputs, "Simulated build");
        Ok(UnsignedTransaction {
            unsigned_tx: hex::encode(&payload),
            tx_id,
            from_group: from.group,
            to_group: from.group,
            gas_amount: gas.gas_amount.unwrap_or(self.config.gas_amount),
            gas_price: gas.gas_price.unwrap_or(self.config.gas_price),
            contract_address,
        })
    }

    async fn build_sweep(&self, address: &Address) -> Result<Vec<SweepTransaction>, LedgerError> {
        let mut state = self.state.lock();
        let inputs = state.inputs.get(&address.hash).copied().unwrap_or(1);
        if inputs < 2 {
            return Ok(Vec::new());
        }

        let per_tx = self.config.inputs_per_sweep_tx.max(2);
        let mut remaining = inputs;
        let mut transactions = Vec::new();
        while remaining > 1 {
            let merged = remaining.min(per_tx);
            let index = (transactions.len() as u64).to_le_bytes();
            let tx_id = digest_hex(&[
                b"sweep".as_slice(),
                address.hash.as_bytes(),
                index.as_slice(),
                (inputs as u64).to_le_bytes().as_slice(),
            ]);
            state.sweeps.insert(tx_id.clone(), (address.hash.clone(), merged));
            transactions.push(SweepTransaction {
                unsigned_tx: hex::encode(format!("sweep:{}:{}", address.hash, merged)),
                tx_id,
                gas_amount: self.config.gas_amount,
                gas_price: self.config.gas_price,
            });
            // Each merge leaves one output behind that the next merge may pick up
            remaining = remaining - merged + 1;
        }
        info!(address = %address.hash, inputs, tx_count = transactions.len(), "Simulated sweep build");
        Ok(transactions)
    }

    async fn sign_and_submit(
        &self,
        address: &Address,
        tx_id: &str,
        _unsigned_tx: &str,
        network: &NetworkId,
    ) -> Result<SubmitReceipt, LedgerError> {
        let mut state = self.state.lock();
        let position = state.submitted.len();
        if let Some((index, err)) = state.fail_submission_at.take() {
            if index == position {
                return Err(err);
            }
            state.fail_submission_at = Some((index, err));
        }

        if let Some((owner, merged)) = state.sweeps.remove(tx_id) {
            let held = state.inputs.entry(owner).or_insert(1);
            *held = held.saturating_sub(merged - 1).max(1);
        }
        state.submitted.push(tx_id.to_string());
        let signature = digest_hex(&[address.public_key.as_bytes(), tx_id.as_bytes(), network.as_str().as_bytes()]);
        debug!(tx_id = %tx_id, network = %network, "Simulated submission");
        Ok(SubmitReceipt {
            tx_id: tx_id.to_string(),
            signature,
        })
    }
}

/// Address registry over a fixed list of addresses
#[derive(Debug, Default)]
pub struct InMemoryAddressRegistry {
    addresses: RwLock<Vec<Address>>,
    active: RwLock<Option<String>>,
}

impl InMemoryAddressRegistry {
    pub fn new(addresses: Vec<Address>) -> Self {
        Self {
            addresses: RwLock::new(addresses),
            active: RwLock::new(None),
        }
    }

    /// Hash of the address marked active by the last successful submission
    pub fn active(&self) -> Option<String> {
        self.active.read().clone()
    }
}

impl AddressRegistry for InMemoryAddressRegistry {
    fn addresses(&self) -> Vec<Address> {
        self.addresses.read().clone()
    }

    fn set_active(&self, address: &Address) {
        *self.active.write() = Some(address.hash.clone());
    }
}

/// Password gate holding only the digest of the expected password
pub struct StaticPasswordGate {
    digest: [u8; 32],
}

impl StaticPasswordGate {
    pub fn new(password: &str) -> Self {
        Self {
            digest: Sha256::digest(password.as_bytes()).into(),
        }
    }
}

impl std::fmt::Debug for StaticPasswordGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticPasswordGate").finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialGate for StaticPasswordGate {
    async fn verify(&self, password: &str) -> bool {
        let mut candidate = password.as_bytes().to_vec();
        let digest: [u8; 32] = Sha256::digest(&candidate).into();
        candidate.zeroize();
        digest == self.digest
    }
}

/// Notification sink that keeps every notice
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices.lock().last().cloned()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

/// Peer session that records responses instead of sending them
#[derive(Debug, Default)]
pub struct InMemorySession {
    pending: Mutex<Option<PendingRequest>>,
    responses: Mutex<Vec<(PendingRequest, SignResult)>>,
    errors: Mutex<Vec<String>>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request(id: u64, topic: impl Into<String>) -> Self {
        let session = Self::default();
        *session.pending.lock() = Some(PendingRequest {
            id,
            topic: topic.into(),
        });
        session
    }

    pub fn responses(&self) -> Vec<(PendingRequest, SignResult)> {
        self.responses.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

#[async_trait]
impl ProtocolSession for InMemorySession {
    fn pending_request(&self) -> Option<PendingRequest> {
        self.pending.lock().clone()
    }

    async fn respond(&self, request: &PendingRequest, result: SignResult) -> Result<(), String> {
        let mut pending = self.pending.lock();
        if pending.as_ref() != Some(request) {
            return Err(format!("request {} is no longer pending", request.id));
        }
        *pending = None;
        self.responses.lock().push((request.clone(), result));
        Ok(())
    }

    async fn report_error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }

    fn clear_pending_request(&self) {
        *self.pending.lock() = None;
    }
}
