//! LCD client against the fake LCD

mod common;

use common::{FakeLcd, CODE_ID, CONTRACT};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Duration;
use wasm_deployer::lcd::LcdClient;
use wasm_deployer::DeployError;

const ADDRESS: &str = "terra1x46rqay4d3cssq8gxxvqz8xt6nwlz4td20k38v";

#[tokio::test]
async fn test_account_and_simulate() {
    let url = common::start(FakeLcd::new());
    let client = LcdClient::new(&format!("{}/", url)).unwrap();
    assert_eq!(client.base_url(), url);

    let account = client.account(ADDRESS).await.unwrap();
    assert_eq!(account.account_number, 12);
    assert_eq!(account.sequence, 3);

    assert_eq!(client.simulate(b"signed tx").await.unwrap(), 150_000);
}

#[tokio::test]
async fn test_unknown_account_is_http_error() {
    let url = common::start(FakeLcd::new());
    let client = LcdClient::new(&url).unwrap();
    match client.account("terra1unknown").await.unwrap_err() {
        DeployError::Lcd { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("not found"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_broadcast_and_wait() {
    let lcd = FakeLcd::new();
    lcd.pending_polls.store(2, Ordering::SeqCst);
    let url = common::start(lcd.clone());
    let client = LcdClient::new(&url).unwrap();

    let txhash = client.broadcast(b"tx").await.unwrap();
    assert_eq!(txhash.len(), 64);
    let sent = lcd.broadcasts.lock()[0].clone();
    assert_eq!(sent["mode"], "BROADCAST_MODE_SYNC");
    assert_eq!(sent["tx_bytes"], "dHg=");

    // not indexed yet
    assert!(client.tx(&txhash).await.unwrap().is_none());

    let resp = client
        .wait_for_tx(&txhash, Duration::from_secs(5), Duration::from_millis(10))
        .await
        .unwrap();
    assert_eq!(resp.height, 42);
    assert_eq!(resp.gas_used, 151_234);
    assert_eq!(resp.code_id(), Some(CODE_ID));
    assert_eq!(resp.contract_address().as_deref(), Some(CONTRACT));
}

#[tokio::test]
async fn test_rejected_broadcast() {
    let lcd = FakeLcd::new();
    *lcd.check_tx_code.lock() = 13;
    let client = LcdClient::new(&common::start(lcd)).unwrap();
    match client.broadcast(b"tx").await.unwrap_err() {
        DeployError::Tx { code, log, .. } => {
            assert_eq!(code, 13);
            assert_eq!(log, "insufficient fees");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_tx_and_timeout() {
    let lcd = FakeLcd::new();
    *lcd.tx_code.lock() = 11;
    let client = LcdClient::new(&common::start(lcd.clone())).unwrap();

    let err = client
        .wait_for_tx("AB", Duration::from_secs(5), Duration::from_millis(10))
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::Tx { code: 11, .. }));

    lcd.pending_polls.store(usize::MAX, Ordering::SeqCst);
    let err = client
        .wait_for_tx("AB", Duration::from_millis(50), Duration::from_millis(10))
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::Timeout(_)));
}

#[tokio::test]
async fn test_smart_query_roundtrip() {
    let client = LcdClient::new(&common::start(FakeLcd::new())).unwrap();
    // characters that differ between the standard and url-safe alphabets
    let msg = json!({"balance": {"address": "??>>~~"}});
    let data = client.smart_query(CONTRACT, &msg).await.unwrap();
    assert_eq!(data["contract"], CONTRACT);
    assert_eq!(data["echo"], msg);

    let err = client
        .smart_query(CONTRACT, &json!({"fail": {}}))
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::Lcd { status: 500, .. }));
}

#[tokio::test]
async fn test_code_and_contract_info() {
    let lcd = FakeLcd::new();
    lcd.code_hashes.lock().insert(3, "E3B0C442".to_string());
    let client = LcdClient::new(&common::start(lcd)).unwrap();
    let code = client.code_info(3).await.unwrap();
    assert_eq!(code.code_id, 3);
    assert_eq!(code.creator, ADDRESS);
    assert_eq!(code.data_hash, "E3B0C442");
    assert!(matches!(
        client.code_info(4).await.unwrap_err(),
        DeployError::Lcd { status: 404, .. }
    ));

    let contract = client.contract_info(CONTRACT).await.unwrap();
    assert_eq!(contract.code_id, CODE_ID);
    assert_eq!(contract.label, "terraswap_pair");
    assert!(contract.admin.is_empty());
}
