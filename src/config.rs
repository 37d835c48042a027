//! Configuration for the send pipeline
//!
//! Loaded from a TOML file, with `.env` and `SENDFLOW_*` environment
//! overrides applied on top. Every section has defaults so a missing file
//! still yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{PipelineError, PipelineResult};
use crate::types::{Amount, NetworkId};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendflowConfig {
    #[serde(default)]
    pub pipeline: PipelineSettings,

    #[serde(default)]
    pub consolidation: ConsolidationSettings,

    #[serde(default)]
    pub gas: GasConfig,

    /// Only read by the simulated ledger
    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Network the transactions are signed for
    #[serde(default)]
    pub network: NetworkId,

    /// Ask for the wallet password before every submission
    #[serde(default)]
    pub password_requirement: bool,

    /// How long error notices stay visible
    #[serde(default = "default_alert_duration_ms")]
    pub alert_duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationSettings {
    /// Substrings of a build error detail that mean "merge inputs first"
    #[serde(default = "default_vocabulary")]
    pub vocabulary: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasConfig {
    /// Smallest gas amount the ledger accepts
    #[serde(default = "default_min_gas_amount")]
    pub min_gas_amount: u64,

    /// Smallest gas price the ledger accepts
    #[serde(default = "default_min_gas_price")]
    pub min_gas_price: Amount,

    /// Gas amount assumed when estimating a fee before the build
    #[serde(default = "default_min_gas_amount")]
    pub default_gas_amount: u64,

    /// Gas price assumed when estimating a fee before the build
    #[serde(default = "default_min_gas_price")]
    pub default_gas_price: Amount,

    /// Fractional digits used when parsing human-readable amounts
    #[serde(default = "default_decimals")]
    pub decimals: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Inputs a single transaction may spend before the node asks for consolidation
    #[serde(default = "default_max_inputs_per_tx")]
    pub max_inputs_per_tx: usize,

    /// Inputs merged by one sweep transaction
    #[serde(default = "default_inputs_per_sweep_tx")]
    pub inputs_per_sweep_tx: usize,

    /// Gas amount charged per built transaction
    #[serde(default = "default_min_gas_amount")]
    pub gas_amount: u64,

    /// Gas price charged per built transaction
    #[serde(default = "default_min_gas_price")]
    pub gas_price: Amount,

    /// Inputs held by the demo address when the CLI starts
    #[serde(default = "default_initial_inputs")]
    pub initial_inputs: usize,

    /// Balance of the demo address
    #[serde(default = "default_balance")]
    pub balance: Amount,
}

// Default value functions
fn default_alert_duration_ms() -> u64 { 5_000 }
fn default_vocabulary() -> Vec<String> {
    vec!["consolidate".to_string(), "consolidating".to_string()]
}
fn default_min_gas_amount() -> u64 { 20_000 }
fn default_min_gas_price() -> Amount { 100_000_000_000 }
fn default_decimals() -> u32 { crate::amount::NATIVE_DECIMALS }
fn default_max_inputs_per_tx() -> usize { 256 }
fn default_inputs_per_sweep_tx() -> usize { 256 }
fn default_initial_inputs() -> usize { 12 }
fn default_balance() -> Amount { 10_000_000_000_000_000_000 }

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            network: NetworkId::default(),
            password_requirement: false,
            alert_duration_ms: default_alert_duration_ms(),
        }
    }
}

impl Default for ConsolidationSettings {
    fn default() -> Self {
        Self {
            vocabulary: default_vocabulary(),
        }
    }
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            min_gas_amount: default_min_gas_amount(),
            min_gas_price: default_min_gas_price(),
            default_gas_amount: default_min_gas_amount(),
            default_gas_price: default_min_gas_price(),
            decimals: default_decimals(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_inputs_per_tx: default_max_inputs_per_tx(),
            inputs_per_sweep_tx: default_inputs_per_sweep_tx(),
            gas_amount: default_min_gas_amount(),
            gas_price: default_min_gas_price(),
            initial_inputs: default_initial_inputs(),
            balance: default_balance(),
        }
    }
}

impl PipelineSettings {
    pub fn alert_duration(&self) -> Duration {
        Duration::from_millis(self.alert_duration_ms)
    }
}

impl SendflowConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("Failed to read {}: {}", path, e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> PipelineResult<Self> {
        let config: SendflowConfig =
            toml::from_str(content).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with `.env` and environment variable overrides
    ///
    /// A missing file falls back to defaults.
    pub fn load(path: &str) -> PipelineResult<Self> {
        dotenvy::dotenv().ok();
        let mut config = if std::path::Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SENDFLOW_*` overrides read through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> PipelineResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(network) = lookup("SENDFLOW_NETWORK") {
            self.pipeline.network = NetworkId::new(network);
        }
        if let Some(flag) = lookup("SENDFLOW_PASSWORD_REQUIRED") {
            self.pipeline.password_requirement = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(PipelineError::Config(format!(
                        "SENDFLOW_PASSWORD_REQUIRED: expected a boolean, got `{}`",
                        other
                    )))
                }
            };
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> PipelineResult<()> {
        if self.consolidation.vocabulary.iter().all(|w| w.trim().is_empty()) {
            return Err(PipelineError::Config(
                "consolidation.vocabulary must contain at least one word".to_string(),
            ));
        }
        if self.gas.default_gas_amount < self.gas.min_gas_amount {
            return Err(PipelineError::Config(format!(
                "gas.default_gas_amount {} is below gas.min_gas_amount {}",
                self.gas.default_gas_amount, self.gas.min_gas_amount
            )));
        }
        if self.gas.default_gas_price < self.gas.min_gas_price {
            return Err(PipelineError::Config(format!(
                "gas.default_gas_price {} is below gas.min_gas_price {}",
                self.gas.default_gas_price, self.gas.min_gas_price
            )));
        }
        if self.simulation.max_inputs_per_tx == 0 || self.simulation.inputs_per_sweep_tx < 2 {
            return Err(PipelineError::Config(
                "simulation needs max_inputs_per_tx >= 1 and inputs_per_sweep_tx >= 2".to_string(),
            ));
        }
        Ok(())
    }
}
