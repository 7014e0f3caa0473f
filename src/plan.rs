//! Deployment plans: ordered scripts of deployer calls described in TOML
//!
//! ```toml
//! name = "terraswap-pair"
//!
//! [[step]]
//! action = "deploy"
//! contract = "terraswap_token"
//! msg = { name = "Whale", symbol = "WHALE", decimals = 6, initial_balances = [] }
//!
//! [[step]]
//! action = "query"
//! contract = "terraswap_token"
//! msg = { token_info = {} }
//! ```

use crate::chain::ChainClient;
use crate::deployer::{Deployer, InstantiateOptions};
use crate::error::{DeployError, Result};
use crate::fee::{parse_coins, Coin};
use crate::msg::load_msg_relative;
use crate::state::validate_name;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
    /// Directory `@file` messages are resolved against
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    Store {
        contract: String,
        #[serde(default)]
        force: bool,
    },
    Instantiate {
        contract: String,
        msg: Value,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        admin: Option<String>,
        #[serde(default)]
        funds: Option<String>,
        #[serde(default)]
        code: Option<String>,
    },
    Deploy {
        contract: String,
        msg: Value,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        admin: Option<String>,
        #[serde(default)]
        funds: Option<String>,
        #[serde(default)]
        code: Option<String>,
    },
    Execute {
        contract: String,
        msg: Value,
        #[serde(default)]
        funds: Option<String>,
    },
    Query {
        contract: String,
        msg: Value,
        /// Fields the response must contain with these exact values
        #[serde(default)]
        expect: Option<Value>,
    },
    Migrate {
        contract: String,
        new_code: String,
        #[serde(default = "empty_object")]
        msg: Value,
    },
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

impl Step {
    pub fn action(&self) -> &'static str {
        match self {
            Step::Store { .. } => "store",
            Step::Instantiate { .. } => "instantiate",
            Step::Deploy { .. } => "deploy",
            Step::Execute { .. } => "execute",
            Step::Query { .. } => "query",
            Step::Migrate { .. } => "migrate",
        }
    }

    pub fn contract(&self) -> &str {
        match self {
            Step::Store { contract, .. }
            | Step::Instantiate { contract, .. }
            | Step::Deploy { contract, .. }
            | Step::Execute { contract, .. }
            | Step::Query { contract, .. }
            | Step::Migrate { contract, .. } => contract,
        }
    }

    fn funds(&self) -> Result<Vec<Coin>> {
        match self {
            Step::Instantiate { funds, .. } | Step::Deploy { funds, .. } | Step::Execute { funds, .. } => {
                funds.as_deref().map(parse_coins).transpose().map(Option::unwrap_or_default)
            }
            _ => Ok(Vec::new()),
        }
    }
}

/// What one step produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StepOutcome {
    Stored {
        code_id: u64,
        txhash: Option<String>,
    },
    Instantiated {
        address: String,
        txhash: String,
    },
    Deployed {
        code_id: u64,
        address: String,
    },
    Executed {
        txhash: String,
        gas_used: u64,
    },
    Queried {
        response: Value,
    },
    Migrated {
        txhash: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub action: String,
    pub contract: String,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlanReport {
    pub plan: String,
    pub chain_id: String,
    pub steps: Vec<StepReport>,
}

impl Plan {
    /// Reads a plan file; `@file` messages are resolved relative to it.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            DeployError::InvalidPlan(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&contents, base)
    }

    pub fn parse(contents: &str, base_dir: &Path) -> Result<Self> {
        let raw: toml::Value = toml::from_str(contents)?;
        check_store_steps(&raw)?;
        let mut plan: Plan = raw.try_into()?;
        plan.base_dir = base_dir.to_path_buf();
        plan.load_file_messages()?;
        plan.validate()?;
        Ok(plan)
    }

    fn load_file_messages(&mut self) -> Result<()> {
        for step in &mut self.steps {
            let msg = match step {
                Step::Instantiate { msg, .. }
                | Step::Deploy { msg, .. }
                | Step::Execute { msg, .. }
                | Step::Query { msg, .. }
                | Step::Migrate { msg, .. } => msg,
                Step::Store { .. } => continue,
            };
            if let Value::String(s) = msg {
                if s.starts_with('@') {
                    *msg = load_msg_relative(s, &self.base_dir)?;
                }
            }
        }
        Ok(())
    }

    /// Shape checks that need no chain access.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DeployError::InvalidPlan("Plan name cannot be empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(DeployError::InvalidPlan(format!("Plan '{}' has no steps", self.name)));
        }
        for (i, step) in self.steps.iter().enumerate() {
            let index = i + 1;
            let invalid = |reason: String| {
                DeployError::InvalidPlan(format!("step {} ({}): {}", index, step.action(), reason))
            };

            let contract = step.contract();
            let is_placeholder = contract.starts_with("${");
            let named_only = matches!(
                step,
                Step::Store { .. } | Step::Instantiate { .. } | Step::Deploy { .. }
            );
            if named_only || !is_placeholder {
                validate_name(contract).map_err(|e| invalid(e.to_string()))?;
            }

            step.funds().map_err(|e| invalid(e.to_string()))?;

            match step {
                Step::Instantiate { msg, code, .. } | Step::Deploy { msg, code, .. } => {
                    if !msg.is_object() {
                        return Err(invalid("msg must be a table".to_string()));
                    }
                    if let Some(code) = code {
                        validate_name(code).map_err(|e| invalid(e.to_string()))?;
                    }
                }
                Step::Execute { msg, .. } | Step::Query { msg, .. } => {
                    if !msg.is_object() {
                        return Err(invalid("msg must be a table".to_string()));
                    }
                }
                Step::Migrate { new_code, .. } => {
                    if new_code.parse::<u64>().is_err() {
                        validate_name(new_code).map_err(|e| invalid(e.to_string()))?;
                    }
                }
                Step::Store { .. } => {}
            }
        }
        Ok(())
    }

    /// Runs every step in order, stopping at the first failure.
    pub fn run<C: ChainClient>(&self, deployer: &Deployer<C>) -> Result<PlanReport> {
        self.run_with(deployer, |_| {})
    }

    /// Like [`run`](Self::run), calling `on_step` after each successful step.
    pub fn run_with<C, F>(&self, deployer: &Deployer<C>, mut on_step: F) -> Result<PlanReport>
    where
        C: ChainClient,
        F: FnMut(&StepReport),
    {
        let mut report = PlanReport {
            plan: self.name.clone(),
            chain_id: deployer.chain().chain_id().to_string(),
            steps: Vec::with_capacity(self.steps.len()),
        };
        info!("Running plan '{}' ({} steps) on {}", self.name, self.steps.len(), report.chain_id);

        for (i, step) in self.steps.iter().enumerate() {
            let index = i + 1;
            let outcome = run_step(deployer, step).map_err(|e| DeployError::Plan {
                step: index,
                action: step.action().to_string(),
                source: Box::new(e),
            })?;
            let step_report = StepReport {
                index,
                action: step.action().to_string(),
                contract: step.contract().to_string(),
                outcome,
            };
            on_step(&step_report);
            report.steps.push(step_report);
        }
        Ok(report)
    }
}

/// Store steps upload a wasm file and take no message.
fn check_store_steps(raw: &toml::Value) -> Result<()> {
    let steps = raw.get("step").and_then(toml::Value::as_array);
    for (i, step) in steps.into_iter().flatten().enumerate() {
        let is_store = step.get("action").and_then(toml::Value::as_str) == Some("store");
        if is_store && step.get("msg").is_some() {
            return Err(DeployError::InvalidPlan(format!(
                "step {} (store): store takes no msg; use deploy to instantiate as well",
                i + 1
            )));
        }
    }
    Ok(())
}

fn run_step<C: ChainClient>(deployer: &Deployer<C>, step: &Step) -> Result<StepOutcome> {
    let funds = step.funds()?;
    match step {
        Step::Store { contract, force } => {
            let stored = if *force {
                deployer.store_contract_with(contract, true)
            } else {
                deployer.store_contract(contract)
            }?;
            Ok(StepOutcome::Stored {
                code_id: stored.code_id,
                txhash: stored.txhash,
            })
        }
        Step::Instantiate {
            contract,
            msg,
            label,
            admin,
            code,
            ..
        } => {
            let opts = InstantiateOptions {
                label: label.clone(),
                admin: admin.clone(),
                funds,
                code: code.clone(),
            };
            let out = deployer.instantiate_contract(contract, msg, &opts)?;
            Ok(StepOutcome::Instantiated {
                address: out.address,
                txhash: out.txhash,
            })
        }
        Step::Deploy {
            contract,
            msg,
            label,
            admin,
            code,
            ..
        } => {
            let opts = InstantiateOptions {
                label: label.clone(),
                admin: admin.clone(),
                funds,
                code: code.clone(),
            };
            let (stored, out) = deployer.deploy(contract, msg, &opts)?;
            Ok(StepOutcome::Deployed {
                code_id: stored.code_id,
                address: out.address,
            })
        }
        Step::Execute { contract, msg, .. } => {
            let out = deployer.execute_contract(contract, msg, &funds)?;
            Ok(StepOutcome::Executed {
                txhash: out.txhash,
                gas_used: out.gas_used,
            })
        }
        Step::Query {
            contract,
            msg,
            expect,
        } => {
            let response = deployer.contract_query(contract, msg)?;
            if let Some(expected) = expect {
                let expected = deployer.placeholders().resolve(expected)?;
                if !contains(&response, &expected) {
                    return Err(DeployError::Msg(format!(
                        "Query response {} does not match expected {}",
                        response, expected
                    )));
                }
            }
            Ok(StepOutcome::Queried { response })
        }
        Step::Migrate {
            contract,
            new_code,
            msg,
        } => {
            let out = deployer.migrate_contract(contract, new_code, msg)?;
            Ok(StepOutcome::Migrated { txhash: out.txhash })
        }
    }
}

/// True when every field of `expected` is present in `actual` with an equal value.
/// Arrays and scalars must match exactly.
pub fn contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(a), Value::Object(e)) => e
            .iter()
            .all(|(k, ev)| a.get(k).is_some_and(|av| contains(av, ev))),
        (Value::Number(a), Value::String(e)) | (Value::String(e), Value::Number(a)) => {
            a.to_string() == *e
        }
        (a, e) => a == e,
    }
}
