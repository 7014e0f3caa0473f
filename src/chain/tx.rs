//! Building and signing wasm transactions with cosmrs

use crate::chain::InstantiateRequest;
use crate::error::{DeployError, Result};
use crate::fee::{Coin, FeeSpec};
use crate::wallet::Wallet;
use cosmrs::cosmwasm::{MsgExecuteContract, MsgInstantiateContract, MsgMigrateContract, MsgStoreCode};
use cosmrs::tendermint::chain;
use cosmrs::tx::{Body, Fee, Msg, SignDoc, SignerInfo};
use cosmrs::{AccountId, Any, Denom};
use serde_json::Value;

fn account_id(address: &str) -> Result<AccountId> {
    address
        .parse::<AccountId>()
        .map_err(|e| DeployError::Msg(format!("Invalid address '{}': {}", address, e)))
}

fn sdk_coin(coin: &Coin) -> Result<cosmrs::Coin> {
    let denom = coin
        .denom
        .parse::<Denom>()
        .map_err(|e| DeployError::Msg(format!("Invalid denom '{}': {}", coin.denom, e)))?;
    Ok(cosmrs::Coin {
        denom,
        amount: coin.amount,
    })
}

fn sdk_coins(coins: &[Coin]) -> Result<Vec<cosmrs::Coin>> {
    coins.iter().map(sdk_coin).collect()
}

pub fn store_code_msg(sender: &str, wasm: &[u8]) -> Result<Any> {
    MsgStoreCode {
        sender: account_id(sender)?,
        wasm_byte_code: wasm.to_vec(),
        instantiate_permission: None,
    }
    .to_any()
    .map_err(DeployError::sdk)
}

pub fn instantiate_msg(sender: &str, request: &InstantiateRequest) -> Result<Any> {
    let admin = request.admin.as_deref().map(account_id).transpose()?;
    MsgInstantiateContract {
        sender: account_id(sender)?,
        admin,
        code_id: request.code_id,
        label: Some(request.label.clone()),
        msg: serde_json::to_vec(&request.msg)?,
        funds: sdk_coins(&request.funds)?,
    }
    .to_any()
    .map_err(DeployError::sdk)
}

pub fn execute_msg(sender: &str, contract: &str, msg: &Value, funds: &[Coin]) -> Result<Any> {
    MsgExecuteContract {
        sender: account_id(sender)?,
        contract: account_id(contract)?,
        msg: serde_json::to_vec(msg)?,
        funds: sdk_coins(funds)?,
    }
    .to_any()
    .map_err(DeployError::sdk)
}

pub fn migrate_msg(sender: &str, contract: &str, code_id: u64, msg: &Value) -> Result<Any> {
    MsgMigrateContract {
        sender: account_id(sender)?,
        contract: account_id(contract)?,
        code_id,
        msg: serde_json::to_vec(msg)?,
    }
    .to_any()
    .map_err(DeployError::sdk)
}

/// Signs a single-message transaction in direct mode and returns the raw tx bytes.
pub fn sign_tx(
    wallet: &Wallet,
    chain_id: &str,
    msg: Any,
    fee: &FeeSpec,
    account_number: u64,
    sequence: u64,
    memo: &str,
) -> Result<Vec<u8>> {
    let chain_id = chain_id
        .parse::<chain::Id>()
        .map_err(|e| DeployError::Config(format!("Invalid chain id '{}': {}", chain_id, e)))?;

    let body = Body::new(vec![msg], memo, 0u32);
    let fee = Fee::from_amount_and_gas(sdk_coin(&fee.amount)?, fee.gas_limit);
    let auth_info = SignerInfo::single_direct(Some(wallet.public_key()), sequence).auth_info(fee);

    let sign_doc =
        SignDoc::new(&body, &auth_info, &chain_id, account_number).map_err(DeployError::sdk)?;
    let raw = sign_doc.sign(wallet.signing_key()).map_err(DeployError::sdk)?;
    raw.to_bytes().map_err(DeployError::sdk)
}
