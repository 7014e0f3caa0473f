//! In-memory chain for tests and `--dry-run`

use crate::chain::{ChainClient, ContractCodeId, ContractInfo, InstantiateRequest, TxOutcome};
use crate::error::{DeployError, Result};
use crate::fee::Coin;
use crate::state::ChainDeployment;
use parking_lot::Mutex;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// A call the mock received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Store { code_id: ContractCodeId, size: usize },
    Instantiate { code_id: ContractCodeId, address: String, msg: Value },
    Execute { contract: String, msg: Value, funds: Vec<Coin> },
    Query { contract: String, msg: Value },
    Migrate { contract: String, code_id: ContractCodeId, msg: Value },
}

#[derive(Debug, Clone)]
pub struct MockContract {
    pub code_id: ContractCodeId,
    pub label: String,
    pub admin: Option<String>,
    pub init_msg: Value,
}

#[derive(Debug, Default)]
struct MockInner {
    /// Wasm checksums by code id
    codes: HashMap<ContractCodeId, String>,
    last_code_id: ContractCodeId,
    contracts: HashMap<String, MockContract>,
    query_responses: HashMap<String, Value>,
    calls: Vec<MockCall>,
    fail_next: Option<String>,
    height: u64,
}

#[derive(Debug, Clone)]
pub struct MockChain {
    chain_id: String,
    prefix: String,
    sender: String,
    inner: Arc<Mutex<MockInner>>,
}

impl MockChain {
    pub fn new(chain_id: &str, prefix: &str, sender: &str) -> Self {
        MockChain {
            chain_id: chain_id.to_string(),
            prefix: prefix.to_string(),
            sender: sender.to_string(),
            inner: Arc::new(Mutex::new(MockInner::default())),
        }
    }

    /// Fixed response for any query sent to `contract`.
    pub fn set_query_response(&self, contract: &str, response: Value) {
        self.inner
            .lock()
            .query_responses
            .insert(contract.to_string(), response);
    }

    /// Makes the next mutating call or query fail with a transaction error.
    pub fn fail_next(&self, log: &str) {
        self.inner.lock().fail_next = Some(log.to_string());
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.inner.lock().calls.clone()
    }

    pub fn contract(&self, address: &str) -> Option<MockContract> {
        self.inner.lock().contracts.get(address).cloned()
    }

    /// Highest code id handed out so far, including imported ones.
    pub fn last_code_id(&self) -> ContractCodeId {
        self.inner.lock().last_code_id
    }

    /// Pretends everything recorded in `deployment` already exists on this chain,
    /// with the sender as admin of every contract.
    pub fn import(&self, deployment: &ChainDeployment) {
        let mut inner = self.inner.lock();
        for (name, code_id) in &deployment.code_ids {
            let checksum = deployment.checksums.get(name).cloned().unwrap_or_default();
            inner.codes.insert(*code_id, checksum);
            inner.last_code_id = inner.last_code_id.max(*code_id);
        }
        for (name, address) in &deployment.addresses {
            inner.contracts.insert(
                address.clone(),
                MockContract {
                    code_id: deployment.code_ids.get(name).copied().unwrap_or_default(),
                    label: name.clone(),
                    admin: Some(self.sender.clone()),
                    init_msg: Value::Null,
                },
            );
        }
    }

    fn begin(&self, inner: &mut MockInner) -> Result<TxOutcome> {
        inner.height += 1;
        let txhash = hex::encode_upper(Sha256::digest(
            format!("{}:{}", self.chain_id, inner.height).as_bytes(),
        ));
        if let Some(log) = inner.fail_next.take() {
            return Err(DeployError::Tx {
                txhash,
                code: 1,
                log,
            });
        }
        Ok(TxOutcome {
            txhash,
            height: inner.height,
            gas_used: 100_000,
            ..Default::default()
        })
    }

    fn contract_address(&self, code_id: ContractCodeId, instance: usize) -> String {
        let digest = Sha256::digest(format!("{}:{}", code_id, instance).as_bytes());
        format!("{}1{}", self.prefix, &hex::encode(digest)[..58])
    }
}

impl ChainClient for MockChain {
    fn chain_id(&self) -> &str {
        &self.chain_id
    }

    fn sender(&self) -> &str {
        &self.sender
    }

    fn store_code(&self, wasm: &[u8]) -> Result<TxOutcome> {
        let mut inner = self.inner.lock();
        let mut outcome = self.begin(&mut inner)?;
        inner.last_code_id += 1;
        let code_id = inner.last_code_id;
        inner.codes.insert(code_id, hex::encode(Sha256::digest(wasm)));
        inner.calls.push(MockCall::Store {
            code_id,
            size: wasm.len(),
        });
        outcome.code_id = Some(code_id);
        Ok(outcome)
    }

    fn instantiate(&self, request: &InstantiateRequest) -> Result<TxOutcome> {
        let mut inner = self.inner.lock();
        let mut outcome = self.begin(&mut inner)?;
        if !inner.codes.contains_key(&request.code_id) {
            return Err(DeployError::Tx {
                txhash: outcome.txhash,
                code: 2,
                log: format!("no such code id: {}", request.code_id),
            });
        }
        let address = self.contract_address(request.code_id, inner.contracts.len());
        inner.contracts.insert(
            address.clone(),
            MockContract {
                code_id: request.code_id,
                label: request.label.clone(),
                admin: request.admin.clone(),
                init_msg: request.msg.clone(),
            },
        );
        inner.calls.push(MockCall::Instantiate {
            code_id: request.code_id,
            address: address.clone(),
            msg: request.msg.clone(),
        });
        outcome.contract_address = Some(address);
        Ok(outcome)
    }

    fn execute(&self, contract: &str, msg: &Value, funds: &[Coin]) -> Result<TxOutcome> {
        let mut inner = self.inner.lock();
        let outcome = self.begin(&mut inner)?;
        if !inner.contracts.contains_key(contract) {
            return Err(DeployError::Tx {
                txhash: outcome.txhash,
                code: 2,
                log: format!("contract not found: {}", contract),
            });
        }
        inner.calls.push(MockCall::Execute {
            contract: contract.to_string(),
            msg: msg.clone(),
            funds: funds.to_vec(),
        });
        Ok(outcome)
    }

    fn query(&self, contract: &str, msg: &Value) -> Result<Value> {
        let mut inner = self.inner.lock();
        if let Some(log) = inner.fail_next.take() {
            return Err(DeployError::Lcd {
                status: 500,
                body: log,
            });
        }
        inner.calls.push(MockCall::Query {
            contract: contract.to_string(),
            msg: msg.clone(),
        });
        if let Some(resp) = inner.query_responses.get(contract) {
            return Ok(resp.clone());
        }
        let info = inner.contracts.get(contract).ok_or_else(|| DeployError::Lcd {
            status: 404,
            body: format!("contract not found: {}", contract),
        })?;
        Ok(json!({ "code_id": info.code_id, "label": info.label }))
    }

    fn migrate(&self, contract: &str, new_code_id: ContractCodeId, msg: &Value) -> Result<TxOutcome> {
        let mut inner = self.inner.lock();
        let outcome = self.begin(&mut inner)?;
        let known_code = inner.codes.contains_key(&new_code_id);
        let sender = self.sender.clone();
        let entry = inner.contracts.get_mut(contract);
        let entry = match entry {
            Some(e) if known_code && e.admin.as_deref() == Some(sender.as_str()) => e,
            Some(_) if !known_code => {
                return Err(DeployError::Tx {
                    txhash: outcome.txhash,
                    code: 2,
                    log: format!("no such code id: {}", new_code_id),
                })
            }
            Some(_) => {
                return Err(DeployError::Tx {
                    txhash: outcome.txhash,
                    code: 4,
                    log: "unauthorized: sender is not the contract admin".to_string(),
                })
            }
            None => {
                return Err(DeployError::Tx {
                    txhash: outcome.txhash,
                    code: 2,
                    log: format!("contract not found: {}", contract),
                })
            }
        };
        entry.code_id = new_code_id;
        inner.calls.push(MockCall::Migrate {
            contract: contract.to_string(),
            code_id: new_code_id,
            msg: msg.clone(),
        });
        Ok(outcome)
    }

    fn code_checksum(&self, code_id: ContractCodeId) -> Result<Option<String>> {
        Ok(self.inner.lock().codes.get(&code_id).cloned())
    }

    fn contract_info(&self, contract: &str) -> Result<ContractInfo> {
        let inner = self.inner.lock();
        let info = inner.contracts.get(contract).ok_or_else(|| DeployError::Lcd {
            status: 404,
            body: format!("contract not found: {}", contract),
        })?;
        Ok(ContractInfo {
            code_id: info.code_id,
            creator: self.sender.clone(),
            admin: info.admin.clone().unwrap_or_default(),
            label: info.label.clone(),
        })
    }
}
