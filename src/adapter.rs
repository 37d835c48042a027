//! Response shapes for protocol peers
//!
//! A dApp that asked for a signature gets back the unsigned payload, its id,
//! the produced signature and the gas terms. The shape depends on the kind
//! of transaction that was signed.

use num_bigint::BigUint;
use serde::{Serialize, Serializer};

use crate::draft::TxKind;
use crate::errors::{PipelineError, PipelineResult};
use crate::ledger::UnsignedTransaction;

fn serialize_decimal<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_str_radix(10))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub from_group: u32,
    pub to_group: u32,
    pub unsigned_tx: String,
    pub tx_id: String,
    pub signature: String,
    pub gas_amount: u64,
    #[serde(serialize_with = "serialize_decimal")]
    pub gas_price: BigUint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteScriptResult {
    pub group_index: u32,
    pub unsigned_tx: String,
    pub tx_id: String,
    pub signature: String,
    pub gas_amount: u64,
    #[serde(serialize_with = "serialize_decimal")]
    pub gas_price: BigUint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployContractResult {
    pub group_index: u32,
    pub unsigned_tx: String,
    pub tx_id: String,
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    pub gas_amount: u64,
    #[serde(serialize_with = "serialize_decimal")]
    pub gas_price: BigUint,
}

/// Signing result handed to the peer session verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SignResult {
    Transfer(TransferResult),
    ExecuteScript(ExecuteScriptResult),
    DeployContract(DeployContractResult),
}

impl SignResult {
    pub fn tx_id(&self) -> &str {
        match self {
            Self::Transfer(r) => &r.tx_id,
            Self::ExecuteScript(r) => &r.tx_id,
            Self::DeployContract(r) => &r.tx_id,
        }
    }
}

/// Build the peer response for a signed transaction
///
/// A missing unsigned transaction means the pipeline called this out of
/// order: that is a [`PipelineError::ContractViolation`], never a partial
/// response.
pub fn sign_result(
    kind: TxKind,
    unsigned: Option<&UnsignedTransaction>,
    signature: &str,
) -> PipelineResult<SignResult> {
    let unsigned = unsigned.ok_or_else(|| {
        PipelineError::contract_violation("no unsigned transaction available for the peer response")
    })?;
    let gas_price = BigUint::from(unsigned.gas_price);

    let result = match kind {
        TxKind::Transfer => SignResult::Transfer(TransferResult {
            from_group: unsigned.from_group,
            to_group: unsigned.to_group,
            unsigned_tx: unsigned.unsigned_tx.clone(),
            tx_id: unsigned.tx_id.clone(),
            signature: signature.to_string(),
            gas_amount: unsigned.gas_amount,
            gas_price,
        }),
        TxKind::ScriptCall => SignResult::ExecuteScript(ExecuteScriptResult {
            group_index: unsigned.from_group,
            unsigned_tx: unsigned.unsigned_tx.clone(),
            tx_id: unsigned.tx_id.clone(),
            signature: signature.to_string(),
            gas_amount: unsigned.gas_amount,
            gas_price,
        }),
        TxKind::ContractDeploy => SignResult::DeployContract(DeployContractResult {
            group_index: unsigned.from_group,
            unsigned_tx: unsigned.unsigned_tx.clone(),
            tx_id: unsigned.tx_id.clone(),
            signature: signature.to_string(),
            contract_address: unsigned.contract_address.clone(),
            gas_amount: unsigned.gas_amount,
            gas_price,
        }),
    };
    Ok(result)
}
