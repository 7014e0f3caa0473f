//! wasm-deployer - store, instantiate, execute and query CosmWasm contracts
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Chain Access
//! - [`network`] - Chain presets (LocalTerra, Terra, Juno, Osmosis)
//! - [`wallet`] - Mnemonic to signing key and account address
//! - [`fee`] - Coins, gas prices and simulated gas buffers
//! - [`lcd`] - LCD REST client (accounts, simulate, broadcast, smart queries)
//! - [`chain`] - The [`chain::ChainClient`] seam, the live daemon and the mock
//!
//! ## Deployment
//! - [`msg`] - Message payload loading and `${...}` placeholders
//! - [`state`] - Per-chain code ids and contract addresses on disk
//! - [`deployer`] - Named store / instantiate / execute / query / migrate
//! - [`plan`] - TOML deployment plans run step by step
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//! - [`cli`] - CLI utilities

#![forbid(unsafe_code)]

// ============================================================================
// Chain Access
// ============================================================================
pub mod chain;
pub mod fee;
pub mod lcd;
pub mod network;
pub mod wallet;

// ============================================================================
// Deployment
// ============================================================================
pub mod deployer;
pub mod msg;
pub mod plan;
pub mod state;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod cli;
pub mod config;
pub mod error;

pub use chain::{ChainClient, Daemon, MockChain};
pub use deployer::{Deployer, InstantiateOptions};
pub use error::{DeployError, Result};
