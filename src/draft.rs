//! Transaction drafts
//!
//! A draft starts as a [`PartialDraft`] filled in by the caller (every field
//! optional except the source address, amounts possibly still as typed
//! text) and is promoted to a [`TransactionDraft`] once validation passes.
//! Only complete drafts ever reach the ledger client.

use serde::{Deserialize, Serialize};

use crate::amount::{self, AmountRequest};
use crate::config::GasConfig;
use crate::errors::{PipelineError, PipelineResult};
use crate::types::{Address, Amount};

/// The closed set of transaction kinds the pipeline can drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TxKind {
    Transfer,
    ScriptCall,
    ContractDeploy,
}

impl TxKind {
    /// Title shown while the draft is being edited
    pub fn title(&self) -> &'static str {
        match self {
            TxKind::Transfer => "Send",
            TxKind::ScriptCall => "Call contract",
            TxKind::ContractDeploy => "Deploy contract",
        }
    }
}

impl std::str::FromStr for TxKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transfer" => Ok(TxKind::Transfer),
            "script" | "script-call" => Ok(TxKind::ScriptCall),
            "deploy" | "contract-deploy" => Ok(TxKind::ContractDeploy),
            other => Err(PipelineError::validation(format!("unknown transaction kind `{}`", other))),
        }
    }
}

/// Optional user overrides for gas
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasSettings {
    pub gas_amount: Option<u64>,
    pub gas_price: Option<Amount>,
}

impl GasSettings {
    fn validate(&self, limits: &GasConfig) -> PipelineResult<()> {
        if let Some(gas_amount) = self.gas_amount {
            if gas_amount < limits.min_gas_amount {
                return Err(PipelineError::validation(format!(
                    "gas amount must be at least {}",
                    limits.min_gas_amount
                )));
            }
        }
        if let Some(gas_price) = self.gas_price {
            if gas_price < limits.min_gas_price {
                return Err(PipelineError::validation(format!(
                    "gas price must be at least {}",
                    amount::format_amount(limits.min_gas_price, limits.decimals)
                )));
            }
        }
        Ok(())
    }

    /// Fee estimate used before the ledger has priced the transaction
    pub fn estimated_fee(&self, defaults: &GasConfig) -> PipelineResult<Amount> {
        amount::fee_for(
            self.gas_amount.unwrap_or(defaults.default_gas_amount),
            self.gas_price.unwrap_or(defaults.default_gas_price),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDraft {
    pub from_address: Address,
    pub to_address: String,
    pub amount: AmountRequest,
    pub lock_time_ms: Option<u64>,
    #[serde(default)]
    pub gas: GasSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptCallDraft {
    pub from_address: Address,
    pub bytecode: String,
    /// Native amount attached to the call
    pub amount: Option<Amount>,
    #[serde(default)]
    pub gas: GasSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDeployDraft {
    pub from_address: Address,
    pub bytecode: String,
    pub initial_amount: Option<Amount>,
    pub issue_token_amount: Option<Amount>,
    #[serde(default)]
    pub gas: GasSettings,
}

/// A complete, validated draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TransactionDraft {
    Transfer(TransferDraft),
    ScriptCall(ScriptCallDraft),
    ContractDeploy(ContractDeployDraft),
}

impl TransactionDraft {
    pub fn kind(&self) -> TxKind {
        match self {
            Self::Transfer(_) => TxKind::Transfer,
            Self::ScriptCall(_) => TxKind::ScriptCall,
            Self::ContractDeploy(_) => TxKind::ContractDeploy,
        }
    }

    pub fn from_address(&self) -> &Address {
        match self {
            Self::Transfer(d) => &d.from_address,
            Self::ScriptCall(d) => &d.from_address,
            Self::ContractDeploy(d) => &d.from_address,
        }
    }

    pub fn gas(&self) -> &GasSettings {
        match self {
            Self::Transfer(d) => &d.gas,
            Self::ScriptCall(d) => &d.gas,
            Self::ContractDeploy(d) => &d.gas,
        }
    }

    /// Destination shown on review, if the kind has one
    pub fn destination(&self) -> Option<&str> {
        match self {
            Self::Transfer(d) => Some(d.to_address.as_str()),
            Self::ScriptCall(_) | Self::ContractDeploy(_) => None,
        }
    }

    /// Native amount leaving the address once the fee is known
    pub fn expected_amount(&self, fee: Amount) -> PipelineResult<Option<Amount>> {
        match self {
            Self::Transfer(d) => {
                amount::resolve_amount(d.amount, d.from_address.available_balance, fee).map(Some)
            }
            Self::ScriptCall(d) => Ok(d.amount),
            Self::ContractDeploy(d) => Ok(d.initial_amount),
        }
    }
}

/// Draft as filled in by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialFields {
    pub to_address: Option<String>,
    /// Typed amount; empty together with `send_remaining` means drain
    pub amount: Option<String>,
    #[serde(default)]
    pub send_remaining: bool,
    pub bytecode: Option<String>,
    pub issue_token_amount: Option<String>,
    pub lock_time_ms: Option<u64>,
    #[serde(default)]
    pub gas: GasSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialDraft {
    pub kind: TxKind,
    pub from_address: Address,
    #[serde(flatten)]
    pub fields: PartialFields,
}

impl PartialDraft {
    pub fn new(kind: TxKind, from_address: Address) -> Self {
        Self {
            kind,
            from_address,
            fields: PartialFields::default(),
        }
    }

    pub fn to(mut self, to_address: impl Into<String>) -> Self {
        self.fields.to_address = Some(to_address.into());
        self
    }

    pub fn amount(mut self, amount: impl Into<String>) -> Self {
        self.fields.amount = Some(amount.into());
        self
    }

    pub fn send_remaining(mut self) -> Self {
        self.fields.amount = None;
        self.fields.send_remaining = true;
        self
    }

    pub fn bytecode(mut self, bytecode: impl Into<String>) -> Self {
        self.fields.bytecode = Some(bytecode.into());
        self
    }

    pub fn issue_tokens(mut self, amount: impl Into<String>) -> Self {
        self.fields.issue_token_amount = Some(amount.into());
        self
    }

    pub fn gas(mut self, gas: GasSettings) -> Self {
        self.fields.gas = gas;
        self
    }

    /// Validate and promote to a complete draft
    ///
    /// Runs entirely locally: no ledger call happens before this succeeds.
    pub fn complete(&self, gas_config: &GasConfig) -> PipelineResult<TransactionDraft> {
        let fields = &self.fields;
        let from_address = self.from_address.clone();
        let balance = from_address.available_balance;
        fields.gas.validate(gas_config)?;

        let draft = match self.kind {
            TxKind::Transfer => {
                let to_address = required_text(fields.to_address.as_deref(), "destination address")?;
                let amount = match parse_optional(fields.amount.as_deref(), gas_config.decimals)? {
                    Some(exact) => {
                        amount::check_within_range(exact, balance)?;
                        AmountRequest::Exact(exact)
                    }
                    None if fields.send_remaining => {
                        let fee = fields.gas.estimated_fee(gas_config)?;
                        amount::resolve_amount(AmountRequest::Remaining, balance, fee)?;
                        AmountRequest::Remaining
                    }
                    None => return Err(PipelineError::validation("amount is required")),
                };
                TransactionDraft::Transfer(TransferDraft {
                    from_address,
                    to_address,
                    amount,
                    lock_time_ms: fields.lock_time_ms,
                    gas: fields.gas,
                })
            }
            TxKind::ScriptCall => {
                let bytecode = required_text(fields.bytecode.as_deref(), "bytecode")?;
                let amount = parse_optional(fields.amount.as_deref(), gas_config.decimals)?;
                if let Some(attached) = amount {
                    amount::check_within_range(attached, balance)?;
                }
                TransactionDraft::ScriptCall(ScriptCallDraft {
                    from_address,
                    bytecode,
                    amount,
                    gas: fields.gas,
                })
            }
            TxKind::ContractDeploy => {
                let bytecode = required_text(fields.bytecode.as_deref(), "bytecode")?;
                let initial_amount = parse_optional(fields.amount.as_deref(), gas_config.decimals)?;
                if let Some(initial) = initial_amount {
                    amount::check_within_range(initial, balance)?;
                }
                // Token supply is not bounded by the native balance
                let issue_token_amount = parse_optional(fields.issue_token_amount.as_deref(), 0)?;
                TransactionDraft::ContractDeploy(ContractDeployDraft {
                    from_address,
                    bytecode,
                    initial_amount,
                    issue_token_amount,
                    gas: fields.gas,
                })
            }
        };
        Ok(draft)
    }
}

fn required_text(value: Option<&str>, field: &str) -> PipelineResult<String> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(PipelineError::validation(format!("{} is required", field))),
    }
}

fn parse_optional(value: Option<&str>, decimals: u32) -> PipelineResult<Option<Amount>> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => amount::parse_amount(text, decimals).map(Some),
        _ => Ok(None),
    }
}
