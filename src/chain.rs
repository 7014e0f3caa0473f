//! Chain clients: the seam between deployment scripts and the chain
//!
//! [`ChainClient`] is what the [`Deployer`](crate::deployer::Deployer) talks to.
//! [`Daemon`] signs and broadcasts through an LCD endpoint; [`MockChain`] keeps
//! everything in memory for tests and dry runs.

pub mod daemon;
pub mod mock;
pub mod tx;

pub use daemon::Daemon;
pub use mock::MockChain;

use crate::error::Result;
use crate::fee::Coin;
pub use crate::lcd::ContractInfo;
use serde::Serialize;
use serde_json::Value;

/// The ID of a particular contract code assigned by the chain.
pub type ContractCodeId = u64;

/// Result of a broadcast transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TxOutcome {
    pub txhash: String,
    pub height: u64,
    pub gas_used: u64,
    /// Set for store transactions
    pub code_id: Option<ContractCodeId>,
    /// Set for instantiate transactions
    pub contract_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstantiateRequest {
    pub code_id: ContractCodeId,
    pub msg: Value,
    pub label: String,
    pub admin: Option<String>,
    pub funds: Vec<Coin>,
}

pub trait ChainClient {
    fn chain_id(&self) -> &str;

    /// Address that signs every transaction.
    fn sender(&self) -> &str;

    fn store_code(&self, wasm: &[u8]) -> Result<TxOutcome>;

    fn instantiate(&self, request: &InstantiateRequest) -> Result<TxOutcome>;

    fn execute(&self, contract: &str, msg: &Value, funds: &[Coin]) -> Result<TxOutcome>;

    fn query(&self, contract: &str, msg: &Value) -> Result<Value>;

    fn migrate(&self, contract: &str, new_code_id: ContractCodeId, msg: &Value) -> Result<TxOutcome>;

    /// Lowercase hex checksum of the wasm stored under `code_id`, `None` when the
    /// chain has no such code.
    fn code_checksum(&self, code_id: ContractCodeId) -> Result<Option<String>>;

    fn contract_info(&self, contract: &str) -> Result<ContractInfo>;
}
