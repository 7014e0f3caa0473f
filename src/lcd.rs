//! Async client for the chain's LCD (REST) endpoint

use crate::error::{DeployError, Result};
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Accepts integers encoded either as JSON numbers or as strings, as the LCD does.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) if s.is_empty() => Ok(0),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventAttribute {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<EventAttribute>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AbciLog {
    #[serde(default)]
    pub events: Vec<Event>,
}

/// The `tx_response` object returned by broadcast and tx lookups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxResponse {
    #[serde(default, deserialize_with = "string_or_number")]
    pub height: u64,
    pub txhash: String,
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub codespace: String,
    #[serde(default)]
    pub raw_log: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub gas_wanted: u64,
    #[serde(default, deserialize_with = "string_or_number")]
    pub gas_used: u64,
    #[serde(default)]
    pub logs: Vec<AbciLog>,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl TxResponse {
    /// First value of `key` on an event of type `kind`.
    ///
    /// Looks at top-level events first and falls back to the per-message logs
    /// older nodes still populate.
    pub fn event_attr(&self, kind: &str, key: &str) -> Option<String> {
        self.events
            .iter()
            .chain(self.logs.iter().flat_map(|l| l.events.iter()))
            .filter(|e| e.kind == kind)
            .flat_map(|e| e.attributes.iter())
            .find(|a| a.key == key)
            .map(|a| a.value.clone())
    }

    pub fn code_id(&self) -> Option<u64> {
        self.event_attr("store_code", "code_id")?.parse().ok()
    }

    pub fn contract_address(&self) -> Option<String> {
        self.event_attr("instantiate", "_contract_address")
    }

    /// Turns a non-zero result code into an error.
    pub fn check(self) -> Result<Self> {
        if self.code != 0 {
            return Err(DeployError::Tx {
                txhash: self.txhash,
                code: self.code,
                log: self.raw_log,
            });
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountInfo {
    pub account_number: u64,
    pub sequence: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CodeInfo {
    #[serde(deserialize_with = "string_or_number")]
    pub code_id: u64,
    pub creator: String,
    /// Hex checksum of the stored wasm
    #[serde(default)]
    pub data_hash: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ContractInfo {
    #[serde(deserialize_with = "string_or_number")]
    pub code_id: u64,
    pub creator: String,
    #[serde(default)]
    pub admin: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct LcdClient {
    http: Client,
    base: String,
}

impl LcdClient {
    pub fn new(lcd_url: &str) -> Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(LcdClient {
            http,
            base: lcd_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base, path);
        debug!("GET {}", url);
        let response = self.http.get(&url).send().await?;
        Self::decode(response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let url = format!("{}{}", self.base, path);
        debug!("POST {}", url);
        let response = self.http.post(&url).json(body).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeployError::Lcd {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }

    /// Account number and sequence of `address`.
    pub async fn account(&self, address: &str) -> Result<AccountInfo> {
        let body: Value = self
            .get(&format!("/cosmos/auth/v1beta1/accounts/{}", address))
            .await?;
        parse_account(&body).ok_or_else(|| {
            DeployError::Msg(format!("Unexpected account response for {}: {}", address, body))
        })
    }

    /// Gas used by a simulated execution of `tx_bytes`.
    pub async fn simulate(&self, tx_bytes: &[u8]) -> Result<u64> {
        #[derive(Deserialize)]
        struct GasInfo {
            #[serde(deserialize_with = "string_or_number")]
            gas_used: u64,
        }
        #[derive(Deserialize)]
        struct SimulateResponse {
            gas_info: GasInfo,
        }

        let resp: SimulateResponse = self
            .post(
                "/cosmos/tx/v1beta1/simulate",
                &json!({ "tx_bytes": STANDARD.encode(tx_bytes) }),
            )
            .await?;
        Ok(resp.gas_info.gas_used)
    }

    /// Broadcasts in sync mode and returns the tx hash once the mempool accepted it.
    pub async fn broadcast(&self, tx_bytes: &[u8]) -> Result<String> {
        #[derive(Deserialize)]
        struct BroadcastResponse {
            tx_response: TxResponse,
        }

        let resp: BroadcastResponse = self
            .post(
                "/cosmos/tx/v1beta1/txs",
                &json!({
                    "tx_bytes": STANDARD.encode(tx_bytes),
                    "mode": "BROADCAST_MODE_SYNC",
                }),
            )
            .await?;
        Ok(resp.tx_response.check()?.txhash)
    }

    /// Looks a transaction up by hash. `Ok(None)` while it is not yet indexed.
    pub async fn tx(&self, txhash: &str) -> Result<Option<TxResponse>> {
        #[derive(Deserialize)]
        struct GetTxResponse {
            tx_response: TxResponse,
        }

        match self
            .get::<GetTxResponse>(&format!("/cosmos/tx/v1beta1/txs/{}", txhash))
            .await
        {
            Ok(resp) => Ok(Some(resp.tx_response)),
            Err(DeployError::Lcd { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Polls until the transaction is included in a block, then checks its result code.
    pub async fn wait_for_tx(
        &self,
        txhash: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<TxResponse> {
        let started = Instant::now();
        loop {
            if let Some(resp) = self.tx(txhash).await? {
                return resp.check();
            }
            if started.elapsed() >= timeout {
                return Err(DeployError::Timeout(format!(
                    "transaction {} not included after {}",
                    txhash,
                    humantime::format_duration(timeout)
                )));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Runs a smart query against a contract.
    pub async fn smart_query(&self, contract: &str, msg: &Value) -> Result<Value> {
        #[derive(Deserialize)]
        struct QueryResponse {
            data: Value,
        }

        let encoded = URL_SAFE.encode(serde_json::to_vec(msg)?);
        let resp: QueryResponse = self
            .get(&format!(
                "/cosmwasm/wasm/v1/contract/{}/smart/{}",
                contract, encoded
            ))
            .await?;
        Ok(resp.data)
    }

    pub async fn code_info(&self, code_id: u64) -> Result<CodeInfo> {
        #[derive(Deserialize)]
        struct CodeResponse {
            code_info: CodeInfo,
        }

        let resp: CodeResponse = self
            .get(&format!("/cosmwasm/wasm/v1/code/{}", code_id))
            .await?;
        Ok(resp.code_info)
    }

    pub async fn contract_info(&self, contract: &str) -> Result<ContractInfo> {
        #[derive(Deserialize)]
        struct ContractResponse {
            contract_info: ContractInfo,
        }

        let resp: ContractResponse = self
            .get(&format!("/cosmwasm/wasm/v1/contract/{}", contract))
            .await?;
        Ok(resp.contract_info)
    }
}

/// Finds account number and sequence in a plain or wrapped (vesting, module) account.
fn parse_account(body: &Value) -> Option<AccountInfo> {
    fn find(value: &Value) -> Option<AccountInfo> {
        let obj = value.as_object()?;
        if let Some(number) = obj.get("account_number") {
            let account_number = as_u64(number)?;
            let sequence = obj.get("sequence").and_then(as_u64).unwrap_or(0);
            return Some(AccountInfo {
                account_number,
                sequence,
            });
        }
        obj.values().find_map(find)
    }
    find(body.get("account")?)
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
