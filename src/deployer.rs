//! The deployer: store, instantiate, execute, query and migrate named contracts
//!
//! A [`Deployer`] pairs a [`ChainClient`] with the [`DeploymentState`] so that
//! contracts can be referred to by name. Every payload goes through placeholder
//! resolution first, and the state is persisted after each successful step.

use crate::chain::{ChainClient, ContractCodeId, ContractInfo, InstantiateRequest, TxOutcome};
use crate::error::{DeployError, Result};
use crate::fee::Coin;
use crate::msg::Placeholders;
use crate::state::{validate_name, DeploymentState};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Optional knobs for instantiation.
#[derive(Debug, Clone, Default)]
pub struct InstantiateOptions {
    /// Defaults to the contract name
    pub label: Option<String>,
    /// Contract admin; `"sender"` means the deployer itself. No admin when unset.
    pub admin: Option<String>,
    pub funds: Vec<Coin>,
    /// Instantiate from the code stored under another name
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOutcome {
    pub code_id: ContractCodeId,
    pub checksum: String,
    /// `None` when the upload was skipped because the same wasm is already stored
    pub txhash: Option<String>,
}

impl StoreOutcome {
    pub fn skipped(&self) -> bool {
        self.txhash.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstantiateOutcome {
    pub address: String,
    pub code_id: ContractCodeId,
    pub txhash: String,
}

pub struct Deployer<C: ChainClient> {
    chain: C,
    state: DeploymentState,
    artifacts_dir: PathBuf,
    force_upload: bool,
}

impl<C: ChainClient> Deployer<C> {
    pub fn new(chain: C, state: DeploymentState, artifacts_dir: impl Into<PathBuf>) -> Self {
        Deployer {
            chain,
            state,
            artifacts_dir: artifacts_dir.into(),
            force_upload: false,
        }
    }

    /// Upload even when the recorded checksum matches the local wasm.
    pub fn with_force_upload(mut self, force: bool) -> Self {
        self.force_upload = force;
        self
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    pub fn state(&self) -> &DeploymentState {
        &self.state
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    pub fn sender(&self) -> &str {
        self.chain.sender()
    }

    /// Placeholder values for the current chain.
    pub fn placeholders(&self) -> Placeholders {
        let recorded = self.state.chain(self.chain.chain_id());
        let mut p = Placeholders::new(self.chain.sender());
        p.addresses = recorded.addresses;
        p.code_ids = recorded.code_ids;
        p
    }

    /// Locates `{name}.wasm` in the artifacts directory.
    ///
    /// Also accepts the `-aarch64` suffix written by the ARM optimizer image and the
    /// underscore spelling cargo uses for crate names.
    pub fn find_artifact(&self, name: &str) -> Result<PathBuf> {
        let underscored = name.replace(['-', ':'], "_");
        let mut bases = vec![name];
        if underscored != name {
            bases.push(underscored.as_str());
        }
        let candidates: Vec<PathBuf> = bases
            .iter()
            .flat_map(|base| {
                [
                    self.artifacts_dir.join(format!("{}.wasm", base)),
                    self.artifacts_dir.join(format!("{}-aarch64.wasm", base)),
                ]
            })
            .collect();

        candidates.iter().find(|p| p.is_file()).cloned().ok_or_else(|| {
            DeployError::Artifact(format!(
                "No wasm for '{}' (tried {})",
                name,
                candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
    }

    /// Stores the contract's wasm and records its code id.
    pub fn store_contract(&self, name: &str) -> Result<StoreOutcome> {
        self.store_contract_with(name, self.force_upload)
    }

    /// [`store_contract`](Self::store_contract) with an explicit force flag.
    pub fn store_contract_with(&self, name: &str, force: bool) -> Result<StoreOutcome> {
        validate_name(name)?;
        let path = self.find_artifact(name)?;
        let wasm = fs::read(&path)
            .map_err(|e| DeployError::Artifact(format!("Failed to read {}: {}", path.display(), e)))?;
        let checksum = hex::encode(Sha256::digest(&wasm));
        let chain_id = self.chain.chain_id();

        if !force {
            if let (Some(code_id), Some(recorded)) = (
                self.state.code_id(chain_id, name),
                self.state.checksum(chain_id, name),
            ) {
                if recorded == checksum {
                    match self.chain.code_checksum(code_id)? {
                        Some(on_chain) if on_chain.eq_ignore_ascii_case(&checksum) => {
                            info!("{} unchanged on {}, reusing code id {}", name, chain_id, code_id);
                            return Ok(StoreOutcome {
                                code_id,
                                checksum,
                                txhash: None,
                            });
                        }
                        Some(_) => warn!(
                            "Code id {} on {} holds different wasm than recorded for {}",
                            code_id, chain_id, name
                        ),
                        None => warn!("Code id {} for {} is gone from {}", code_id, name, chain_id),
                    }
                }
            }
        }

        info!("Storing {} ({} bytes) on {}", name, wasm.len(), chain_id);
        let outcome = self.chain.store_code(&wasm)?;
        let code_id = outcome.code_id.ok_or_else(|| {
            DeployError::Msg(format!("Store of {} returned no code id", name))
        })?;
        self.state.set_code_id(chain_id, name, code_id, &checksum)?;
        self.state.persist()?;
        info!("{} stored with code id {}", name, code_id);

        Ok(StoreOutcome {
            code_id,
            checksum,
            txhash: Some(outcome.txhash),
        })
    }

    /// Instantiates a stored contract and records its address under `name`.
    pub fn instantiate_contract(
        &self,
        name: &str,
        msg: &Value,
        opts: &InstantiateOptions,
    ) -> Result<InstantiateOutcome> {
        validate_name(name)?;
        let chain_id = self.chain.chain_id();
        let placeholders = self.placeholders();

        let code_name = opts.code.as_deref().unwrap_or(name);
        let code_id = self.code_id_of(code_name)?;
        let admin = opts
            .admin
            .as_deref()
            .map(|a| match a {
                "sender" => Ok(self.chain.sender().to_string()),
                other => placeholders.resolve_string(other),
            })
            .transpose()?;

        let request = InstantiateRequest {
            code_id,
            msg: placeholders.resolve(msg)?,
            label: opts.label.clone().unwrap_or_else(|| name.to_string()),
            admin,
            funds: opts.funds.clone(),
        };

        info!("Instantiating {} from code id {} on {}", name, code_id, chain_id);
        let outcome = self.chain.instantiate(&request)?;
        let address = outcome.contract_address.clone().ok_or_else(|| {
            DeployError::Msg(format!("Instantiate of {} returned no address", name))
        })?;
        self.state.set_address(chain_id, name, &address)?;
        self.state.persist()?;
        info!("{} instantiated at {}", name, address);

        Ok(InstantiateOutcome {
            address,
            code_id,
            txhash: outcome.txhash,
        })
    }

    /// Store followed by instantiate.
    pub fn deploy(
        &self,
        name: &str,
        msg: &Value,
        opts: &InstantiateOptions,
    ) -> Result<(StoreOutcome, InstantiateOutcome)> {
        let stored = self.store_contract(opts.code.as_deref().unwrap_or(name))?;
        let instantiated = self.instantiate_contract(name, msg, opts)?;
        Ok((stored, instantiated))
    }

    pub fn execute_contract(&self, target: &str, msg: &Value, funds: &[Coin]) -> Result<TxOutcome> {
        let contract = self.resolve_target(target)?;
        let msg = self.placeholders().resolve(msg)?;
        info!("Executing {} ({})", target, action_name(&msg));
        self.chain.execute(&contract, &msg, funds)
    }

    pub fn contract_query(&self, target: &str, msg: &Value) -> Result<Value> {
        let contract = self.resolve_target(target)?;
        let msg = self.placeholders().resolve(msg)?;
        tracing::debug!("Querying {} ({})", target, action_name(&msg));
        self.chain.query(&contract, &msg)
    }

    /// Migrates `target` to the code stored under `new_code` (a name or a numeric code id).
    pub fn migrate_contract(&self, target: &str, new_code: &str, msg: &Value) -> Result<TxOutcome> {
        let contract = self.resolve_target(target)?;
        let code_id = match new_code.parse::<ContractCodeId>() {
            Ok(id) => id,
            Err(_) => self.code_id_of(new_code)?,
        };
        let msg = self.placeholders().resolve(msg)?;
        info!("Migrating {} to code id {}", target, code_id);
        self.chain.migrate(&contract, code_id, &msg)
    }

    /// On-chain info of `target`, with the name it is recorded under, if any.
    pub fn contract_info(&self, target: &str) -> Result<(Option<String>, ContractInfo)> {
        let contract = self.resolve_target(target)?;
        let info = self.chain.contract_info(&contract)?;
        Ok((self.state.name_of(self.chain.chain_id(), &contract), info))
    }

    fn code_id_of(&self, name: &str) -> Result<ContractCodeId> {
        self.state
            .code_id(self.chain.chain_id(), name)
            .ok_or_else(|| {
                DeployError::State(format!(
                    "No code id recorded for '{}' on {}; store it first",
                    name,
                    self.chain.chain_id()
                ))
            })
    }

    /// A recorded contract name, a `${...}` placeholder, or a raw bech32 address.
    pub fn resolve_target(&self, target: &str) -> Result<String> {
        let target = self.placeholders().resolve_string(target)?;
        if let Some(address) = self.state.address(self.chain.chain_id(), &target) {
            return Ok(address);
        }
        if looks_like_address(&target) {
            return Ok(target);
        }
        Err(DeployError::State(format!(
            "Unknown contract '{}' on {}",
            target,
            self.chain.chain_id()
        )))
    }
}

fn looks_like_address(s: &str) -> bool {
    match s.rfind('1') {
        Some(sep) => {
            sep > 0
                && s.len() - sep > 6
                && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        }
        None => false,
    }
}

/// Top-level key of a message object, for log lines.
fn action_name(msg: &Value) -> &str {
    msg.as_object()
        .and_then(|m| m.keys().next())
        .map(String::as_str)
        .unwrap_or("?")
}
