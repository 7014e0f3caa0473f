//! Error types for wasm-deployer

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("LCD returned HTTP {status}: {body}")]
    Lcd { status: u16, body: String },

    #[error("Transaction {txhash} failed with code {code}: {log}")]
    Tx {
        txhash: String,
        code: u32,
        log: String,
    },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("State error: {0}")]
    State(String),

    #[error("Message error: {0}")]
    Msg(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Plan step {step} ({action}) failed: {source}")]
    Plan {
        step: usize,
        action: String,
        #[source]
        source: Box<DeployError>,
    },

    #[error("SDK error: {0}")]
    Sdk(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl DeployError {
    /// Wraps an error report coming out of the cosmrs SDK.
    pub fn sdk(err: impl std::fmt::Display) -> Self {
        DeployError::Sdk(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, DeployError>;
