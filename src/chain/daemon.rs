//! Live chain client: signs with the deployer wallet and broadcasts through the LCD

use crate::chain::{tx, ChainClient, ContractCodeId, ContractInfo, InstantiateRequest, TxOutcome};
use crate::config::DeployerConfig;
use crate::error::{DeployError, Result};
use crate::fee::{gas_limit_from_simulation, Coin, FeeSpec, SIMULATION_GAS_LIMIT};
use crate::lcd::{LcdClient, TxResponse};
use crate::network::ChainInfo;
use crate::wallet::Wallet;
use cosmrs::Any;
use serde_json::Value;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// Gas handling for broadcasts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GasSettings {
    /// Multiplier for simulated gas; built-in buffers apply when `None`
    pub adjustment: Option<f64>,
    /// Fixed gas limit, skipping simulation
    pub fixed_limit: Option<u64>,
}

/// Chain client backed by a wallet and an LCD endpoint.
///
/// The LCD client is async; the daemon owns a tokio runtime and blocks on every
/// call so deployment scripts stay plain sequential code. Do not use it from
/// inside another tokio runtime.
pub struct Daemon {
    chain: ChainInfo,
    wallet: Wallet,
    lcd: LcdClient,
    rt: Runtime,
    gas: GasSettings,
    timeout: Duration,
    poll_interval: Duration,
    memo: String,
}

impl Daemon {
    pub fn new(chain: ChainInfo, wallet: Wallet) -> Result<Self> {
        let lcd = LcdClient::new(&chain.lcd_url)?;
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;
        Ok(Daemon {
            chain,
            wallet,
            lcd,
            rt,
            gas: GasSettings::default(),
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
            memo: String::new(),
        })
    }

    /// Applies gas and broadcast settings from the `[deployer]` config section.
    pub fn with_config(mut self, config: &DeployerConfig) -> Result<Self> {
        self.gas = GasSettings {
            adjustment: config.gas_adjustment,
            fixed_limit: config.gas_limit,
        };
        self.timeout = config.broadcast_timeout()?;
        self.poll_interval = config.poll_interval()?;
        Ok(self)
    }

    pub fn with_gas(mut self, gas: GasSettings) -> Self {
        self.gas = gas;
        self
    }

    pub fn with_timeouts(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn chain_info(&self) -> &ChainInfo {
        &self.chain
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    /// Runs an LCD future to completion on the daemon's runtime.
    fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.rt.block_on(future)
    }

    async fn gas_limit(&self, msg: &Any, account_number: u64, sequence: u64) -> Result<u64> {
        if let Some(limit) = self.gas.fixed_limit {
            return Ok(limit);
        }
        let sim_fee = FeeSpec {
            gas_limit: SIMULATION_GAS_LIMIT,
            amount: Coin::new(0, self.chain.gas_denom.clone()),
        };
        let sim_bytes = tx::sign_tx(
            &self.wallet,
            &self.chain.chain_id,
            msg.clone(),
            &sim_fee,
            account_number,
            sequence,
            &self.memo,
        )?;
        let simulated = self.lcd.simulate(&sim_bytes).await?;
        let limit = gas_limit_from_simulation(simulated, self.gas.adjustment);
        debug!("Simulated gas {} -> limit {}", simulated, limit);
        Ok(limit)
    }

    async fn broadcast_msg(&self, msg: Any) -> Result<TxResponse> {
        let account = self.lcd.account(self.wallet.address()).await?;
        let gas_limit = self
            .gas_limit(&msg, account.account_number, account.sequence)
            .await?;
        let fee = FeeSpec::from_gas(gas_limit, &self.chain.gas_price());
        let type_url = msg.type_url.clone();

        let tx_bytes = tx::sign_tx(
            &self.wallet,
            &self.chain.chain_id,
            msg,
            &fee,
            account.account_number,
            account.sequence,
            &self.memo,
        )?;
        let txhash = self.lcd.broadcast(&tx_bytes).await?;
        info!(
            "Broadcast {} as {} (gas limit {}, fee {})",
            type_url, txhash, fee.gas_limit, fee.amount
        );

        let response = self
            .lcd
            .wait_for_tx(&txhash, self.timeout, self.poll_interval)
            .await?;
        info!(
            "Transaction {} included at height {} (gas used {})",
            response.txhash, response.height, response.gas_used
        );
        Ok(response)
    }

    fn outcome(response: TxResponse) -> TxOutcome {
        TxOutcome {
            code_id: response.code_id(),
            contract_address: response.contract_address(),
            txhash: response.txhash,
            height: response.height,
            gas_used: response.gas_used,
        }
    }
}

impl ChainClient for Daemon {
    fn chain_id(&self) -> &str {
        &self.chain.chain_id
    }

    fn sender(&self) -> &str {
        self.wallet.address()
    }

    fn store_code(&self, wasm: &[u8]) -> Result<TxOutcome> {
        let msg = tx::store_code_msg(self.sender(), wasm)?;
        let response = self.block_on(self.broadcast_msg(msg))?;
        let outcome = Self::outcome(response);
        if outcome.code_id.is_none() {
            return Err(DeployError::Msg(format!(
                "No code_id in store_code events of {}",
                outcome.txhash
            )));
        }
        Ok(outcome)
    }

    fn instantiate(&self, request: &InstantiateRequest) -> Result<TxOutcome> {
        let msg = tx::instantiate_msg(self.sender(), request)?;
        let response = self.block_on(self.broadcast_msg(msg))?;
        let outcome = Self::outcome(response);
        if outcome.contract_address.is_none() {
            return Err(DeployError::Msg(format!(
                "No contract address in instantiate events of {}",
                outcome.txhash
            )));
        }
        Ok(outcome)
    }

    fn execute(&self, contract: &str, msg: &Value, funds: &[Coin]) -> Result<TxOutcome> {
        let msg = tx::execute_msg(self.sender(), contract, msg, funds)?;
        let response = self.block_on(self.broadcast_msg(msg))?;
        Ok(Self::outcome(response))
    }

    fn query(&self, contract: &str, msg: &Value) -> Result<Value> {
        self.block_on(self.lcd.smart_query(contract, msg))
    }

    fn migrate(&self, contract: &str, new_code_id: ContractCodeId, msg: &Value) -> Result<TxOutcome> {
        let msg = tx::migrate_msg(self.sender(), contract, new_code_id, msg)?;
        let response = self.block_on(self.broadcast_msg(msg))?;
        Ok(Self::outcome(response))
    }

    fn code_checksum(&self, code_id: ContractCodeId) -> Result<Option<String>> {
        match self.block_on(self.lcd.code_info(code_id)) {
            Ok(info) => Ok(Some(info.data_hash.to_ascii_lowercase())),
            Err(DeployError::Lcd { status, body })
                if status == 404 || body.contains("no such code") =>
            {
                debug!("Code id {} not found on {}", code_id, self.chain.chain_id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn contract_info(&self, contract: &str) -> Result<ContractInfo> {
        self.block_on(self.lcd.contract_info(contract))
    }
}
