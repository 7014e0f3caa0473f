//! Chain presets and per-network settings

use crate::error::{DeployError, Result};
use crate::fee::GasPrice;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment variable holding the deployer mnemonic for local chains.
pub const LOCAL_MNEMONIC_ENV: &str = "LOCAL_MNEMONIC";
/// Environment variable holding the deployer mnemonic for test networks.
pub const TEST_MNEMONIC_ENV: &str = "TEST_MNEMONIC";
/// Environment variable holding the deployer mnemonic for main networks.
pub const MAIN_MNEMONIC_ENV: &str = "MAIN_MNEMONIC";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    Local,
    Testnet,
    Mainnet,
}

impl ChainKind {
    /// Name of the environment variable the deployer mnemonic is read from.
    pub fn mnemonic_env(&self) -> &'static str {
        match self {
            ChainKind::Local => LOCAL_MNEMONIC_ENV,
            ChainKind::Testnet => TEST_MNEMONIC_ENV,
            ChainKind::Mainnet => MAIN_MNEMONIC_ENV,
        }
    }
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainKind::Local => write!(f, "local"),
            ChainKind::Testnet => write!(f, "testnet"),
            ChainKind::Mainnet => write!(f, "mainnet"),
        }
    }
}

/// Everything needed to talk to one chain through its LCD endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainInfo {
    pub chain_id: String,
    pub kind: ChainKind,
    pub lcd_url: String,
    /// Bech32 account prefix
    pub prefix: String,
    /// SLIP-44 coin type used in the HD derivation path
    #[serde(default = "default_coin_type")]
    pub coin_type: u32,
    pub gas_denom: String,
    pub gas_price: f64,
}

impl ChainInfo {
    pub fn gas_price(&self) -> GasPrice {
        GasPrice {
            amount: self.gas_price,
            denom: self.gas_denom.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chain_id.trim().is_empty() {
            return Err(DeployError::Config("chain_id cannot be empty".to_string()));
        }
        if !(self.lcd_url.starts_with("http://") || self.lcd_url.starts_with("https://")) {
            return Err(DeployError::Config(format!(
                "lcd_url for {} must start with http:// or https://, got '{}'",
                self.chain_id, self.lcd_url
            )));
        }
        if self.prefix.is_empty() || !self.prefix.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(DeployError::Config(format!(
                "Invalid bech32 prefix '{}' for {}",
                self.prefix, self.chain_id
            )));
        }
        if self.gas_denom.is_empty() {
            return Err(DeployError::Config(format!(
                "gas_denom must be set for {}",
                self.chain_id
            )));
        }
        if !self.gas_price.is_finite() || self.gas_price < 0.0 {
            return Err(DeployError::Config(format!(
                "gas_price for {} must be a non-negative number",
                self.chain_id
            )));
        }
        Ok(())
    }
}

fn default_coin_type() -> u32 {
    118
}

fn preset(
    chain_id: &str,
    kind: ChainKind,
    lcd_url: &str,
    prefix: &str,
    coin_type: u32,
    gas_denom: &str,
    gas_price: f64,
) -> ChainInfo {
    ChainInfo {
        chain_id: chain_id.to_string(),
        kind,
        lcd_url: lcd_url.to_string(),
        prefix: prefix.to_string(),
        coin_type,
        gas_denom: gas_denom.to_string(),
        gas_price,
    }
}

static PRESETS: Lazy<Vec<ChainInfo>> = Lazy::new(|| {
    vec![
        preset("localterra", ChainKind::Local, "http://localhost:1317", "terra", 330, "uluna", 0.15),
        preset("pisco-1", ChainKind::Testnet, "https://pisco-lcd.terra.dev", "terra", 330, "uluna", 0.015),
        preset("phoenix-1", ChainKind::Mainnet, "https://phoenix-lcd.terra.dev", "terra", 330, "uluna", 0.015),
        preset("uni-6", ChainKind::Testnet, "https://api.uni.junonetwork.io", "juno", 118, "ujunox", 0.025),
        preset("juno-1", ChainKind::Mainnet, "https://juno-api.polkachu.com", "juno", 118, "ujuno", 0.075),
        preset("osmo-test-5", ChainKind::Testnet, "https://lcd.osmotest5.osmosis.zone", "osmo", 118, "uosmo", 0.025),
    ]
});

/// Built-in chain presets.
pub fn presets() -> &'static [ChainInfo] {
    &PRESETS
}

/// Finds a preset by chain id or by one of the short aliases
/// (`local`, `testnet`, `mainnet`).
pub fn lookup(name: &str) -> Option<ChainInfo> {
    let id = match name.trim() {
        "local" => "localterra",
        "testnet" => "pisco-1",
        "mainnet" => "phoenix-1",
        other => other,
    };
    PRESETS.iter().find(|c| c.chain_id == id).cloned()
}
