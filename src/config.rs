//! Configuration management for wasm-deployer

use crate::error::{DeployError, Result};
use crate::network::{self, ChainInfo};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File looked up in the working directory when no `--config` is given.
pub const LOCAL_CONFIG_FILE: &str = "deployer.toml";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub deployer: DeployerConfig,
    /// Extra networks, or overrides of built-in presets with the same chain id
    #[serde(default, rename = "network")]
    pub networks: Vec<ChainInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeployerConfig {
    #[serde(default = "default_network")]
    pub network: String,
    /// HD account used in the derivation path
    #[serde(default)]
    pub account: u32,
    /// HD address index used in the derivation path
    #[serde(default)]
    pub index: u32,
    #[serde(default = "default_state_file")]
    pub state_file: String,
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: String,
    /// Multiplier applied to simulated gas; the built-in buffers apply when unset
    #[serde(default)]
    pub gas_adjustment: Option<f64>,
    /// Fixed gas limit; skips simulation when set
    #[serde(default)]
    pub gas_limit: Option<u64>,
    #[serde(default = "default_broadcast_timeout")]
    pub broadcast_timeout: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
}

impl Default for DeployerConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            account: 0,
            index: 0,
            state_file: default_state_file(),
            artifacts_dir: default_artifacts_dir(),
            gas_adjustment: None,
            gas_limit: None,
            broadcast_timeout: default_broadcast_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

impl DeployerConfig {
    pub fn broadcast_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.broadcast_timeout).map_err(|e| {
            DeployError::Config(format!(
                "Invalid broadcast_timeout '{}': {}",
                self.broadcast_timeout, e
            ))
        })
    }

    pub fn poll_interval(&self) -> Result<Duration> {
        humantime::parse_duration(&self.poll_interval).map_err(|e| {
            DeployError::Config(format!(
                "Invalid poll_interval '{}': {}",
                self.poll_interval, e
            ))
        })
    }
}

impl Config {
    /// Resolves a chain by id or alias. Networks from the config file win over presets.
    pub fn chain(&self, name: &str) -> Result<ChainInfo> {
        let chain = self
            .networks
            .iter()
            .find(|c| c.chain_id == name)
            .cloned()
            .or_else(|| network::lookup(name))
            .ok_or_else(|| DeployError::Config(format!("Unknown network '{}'", name)))?;
        chain.validate()?;
        Ok(chain)
    }

    /// The network selected by `deployer.network`.
    pub fn default_chain(&self) -> Result<ChainInfo> {
        self.chain(&self.deployer.network)
    }

    /// All known networks: presets, with config-file entries replacing or extending them.
    pub fn all_chains(&self) -> Vec<ChainInfo> {
        let mut chains: Vec<ChainInfo> = network::presets()
            .iter()
            .filter(|p| !self.networks.iter().any(|n| n.chain_id == p.chain_id))
            .cloned()
            .collect();
        chains.extend(self.networks.iter().cloned());
        chains
    }

    fn validate(&self) -> Result<()> {
        if self.deployer.artifacts_dir.trim().is_empty() {
            return Err(DeployError::Config(
                "deployer.artifacts_dir must be set".to_string(),
            ));
        }
        if self.deployer.state_file.trim().is_empty() {
            return Err(DeployError::Config(
                "deployer.state_file must be set".to_string(),
            ));
        }
        if let Some(adj) = self.deployer.gas_adjustment {
            if !adj.is_finite() || adj < 1.0 {
                return Err(DeployError::Config(format!(
                    "deployer.gas_adjustment must be >= 1.0, got {}",
                    adj
                )));
            }
        }
        if self.deployer.gas_limit == Some(0) {
            return Err(DeployError::Config(
                "deployer.gas_limit cannot be zero".to_string(),
            ));
        }
        self.deployer.broadcast_timeout()?;
        self.deployer.poll_interval()?;
        for chain in &self.networks {
            chain.validate()?;
        }
        Ok(())
    }
}

/// Parses and validates a configuration document.
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents)?;
    config.validate()?;
    Ok(config)
}

/// Per-user configuration path (`~/.wasm-deployer/config.toml`).
pub fn get_user_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wasm-deployer")
        .join("config.toml")
}

/// Loads the configuration.
///
/// Lookup order: the explicit path (which must exist), `./deployer.toml`, the per-user
/// config file. When none exists the defaults target a local chain.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let candidate = match path {
        Some(p) => {
            if !p.exists() {
                return Err(DeployError::Config(format!(
                    "Config file {} does not exist",
                    p.display()
                )));
            }
            Some(p.to_path_buf())
        }
        None => [PathBuf::from(LOCAL_CONFIG_FILE), get_user_config_path()]
            .into_iter()
            .find(|p| p.exists()),
    };

    match candidate {
        Some(p) => {
            tracing::debug!("Loading config from {}", p.display());
            let contents = fs::read_to_string(&p)?;
            parse_config(&contents)
        }
        None => {
            tracing::debug!("No config file found, using defaults");
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn default_network() -> String {
    "localterra".to_string()
}

fn default_state_file() -> String {
    "./state.json".to_string()
}

fn default_artifacts_dir() -> String {
    "./artifacts".to_string()
}

fn default_broadcast_timeout() -> String {
    "60s".to_string()
}

fn default_poll_interval() -> String {
    "1s".to_string()
}
