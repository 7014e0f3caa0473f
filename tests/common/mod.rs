//! In-process fake LCD used by the client and daemon tests

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const CODE_ID: u64 = 7;
pub const CONTRACT: &str = "terra14hj2tavq8fpesdwxxcu44rty3hh90vhujrvcmstl4zr3txmfvw9ssrc8au";

#[derive(Default)]
pub struct FakeLcd {
    /// Number of tx lookups answered with 404 before the tx shows up
    pub pending_polls: AtomicUsize,
    /// Result code of included transactions
    pub tx_code: Mutex<u32>,
    /// Result code returned by the broadcast itself
    pub check_tx_code: Mutex<u32>,
    pub broadcasts: Mutex<Vec<Value>>,
    pub simulations: AtomicUsize,
    pub simulated: Mutex<Vec<Value>>,
    /// Uppercase hex checksums by code id; other code ids are unknown
    pub code_hashes: Mutex<HashMap<u64, String>>,
    tx_counter: AtomicUsize,
}

impl FakeLcd {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeLcd::default())
    }
}

async fn account(Path(address): Path<String>) -> Response {
    if address.starts_with("terra1unknown") {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"code": 5, "message": format!("account {} not found", address)})),
        )
            .into_response();
    }
    Json(json!({
        "account": {
            "@type": "/cosmos.auth.v1beta1.BaseAccount",
            "address": address,
            "pub_key": null,
            "account_number": "12",
            "sequence": "3"
        }
    }))
    .into_response()
}

async fn simulate(State(lcd): State<Arc<FakeLcd>>, Json(body): Json<Value>) -> Response {
    lcd.simulations.fetch_add(1, Ordering::SeqCst);
    if body["tx_bytes"].as_str().map_or(true, str::is_empty) {
        return (StatusCode::BAD_REQUEST, "missing tx_bytes").into_response();
    }
    lcd.simulated.lock().push(body);
    Json(json!({
        "gas_info": {"gas_wanted": "100000000", "gas_used": "150000"},
        "result": {"data": "", "log": "", "events": []}
    }))
    .into_response()
}

async fn broadcast(State(lcd): State<Arc<FakeLcd>>, Json(body): Json<Value>) -> Response {
    lcd.broadcasts.lock().push(body);
    let n = lcd.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
    let code = *lcd.check_tx_code.lock();
    let raw_log = if code == 0 { "[]" } else { "insufficient fees" };
    Json(json!({
        "tx_response": {
            "height": "0",
            "txhash": format!("{:064X}", n),
            "code": code,
            "raw_log": raw_log,
            "gas_wanted": "0",
            "gas_used": "0"
        }
    }))
    .into_response()
}

async fn tx(State(lcd): State<Arc<FakeLcd>>, Path(hash): Path<String>) -> Response {
    let pending = lcd.pending_polls.load(Ordering::SeqCst);
    if pending > 0 {
        lcd.pending_polls.store(pending - 1, Ordering::SeqCst);
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"code": 5, "message": format!("tx not found: {}", hash)})),
        )
            .into_response();
    }
    let code = *lcd.tx_code.lock();
    let raw_log = if code == 0 { "" } else { "out of gas" };
    Json(json!({
        "tx": {},
        "tx_response": {
            "height": "42",
            "txhash": hash,
            "code": code,
            "raw_log": raw_log,
            "gas_wanted": "195000",
            "gas_used": "151234",
            "logs": [],
            "events": [
                {"type": "message", "attributes": [{"key": "module", "value": "wasm"}]},
                {"type": "store_code", "attributes": [
                    {"key": "code_checksum", "value": "abcd"},
                    {"key": "code_id", "value": CODE_ID.to_string()}
                ]},
                {"type": "instantiate", "attributes": [
                    {"key": "_contract_address", "value": CONTRACT},
                    {"key": "code_id", "value": CODE_ID.to_string()}
                ]}
            ]
        }
    }))
    .into_response()
}

async fn smart_query(Path((address, query)): Path<(String, String)>) -> Response {
    let decoded = match URL_SAFE.decode(query.as_bytes()) {
        Ok(bytes) => bytes,
        Err(_) => return (StatusCode::BAD_REQUEST, "bad base64").into_response(),
    };
    let msg: Value = match serde_json::from_slice(&decoded) {
        Ok(v) => v,
        Err(_) => return (StatusCode::BAD_REQUEST, "bad json").into_response(),
    };
    if msg.get("fail").is_some() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"code": 2, "message": "query wasm contract failed: unknown variant `fail`"})),
        )
            .into_response();
    }
    Json(json!({"data": {"contract": address, "echo": msg}})).into_response()
}

async fn code_info(State(lcd): State<Arc<FakeLcd>>, Path(code_id): Path<u64>) -> Response {
    let data_hash = match lcd.code_hashes.lock().get(&code_id) {
        Some(hash) => hash.clone(),
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"code": 5, "message": format!("code id {}: not found", code_id)})),
            )
                .into_response()
        }
    };
    Json(json!({
        "code_info": {
            "code_id": code_id.to_string(),
            "creator": "terra1x46rqay4d3cssq8gxxvqz8xt6nwlz4td20k38v",
            "data_hash": data_hash,
            "instantiate_permission": {"permission": "Everybody", "addresses": []}
        },
        "data": ""
    }))
    .into_response()
}

async fn contract_info(Path(address): Path<String>) -> Response {
    Json(json!({
        "address": address,
        "contract_info": {
            "code_id": CODE_ID.to_string(),
            "creator": "terra1x46rqay4d3cssq8gxxvqz8xt6nwlz4td20k38v",
            "admin": "",
            "label": "terraswap_pair",
            "created": null,
            "ibc_port_id": "",
            "extension": null
        }
    }))
    .into_response()
}

pub fn router(lcd: Arc<FakeLcd>) -> Router {
    Router::new()
        .route("/cosmos/auth/v1beta1/accounts/:address", get(account))
        .route("/cosmos/tx/v1beta1/simulate", post(simulate))
        .route("/cosmos/tx/v1beta1/txs", post(broadcast))
        .route("/cosmos/tx/v1beta1/txs/:hash", get(tx))
        .route(
            "/cosmwasm/wasm/v1/contract/:address/smart/:query",
            get(smart_query),
        )
        .route("/cosmwasm/wasm/v1/contract/:address", get(contract_info))
        .route("/cosmwasm/wasm/v1/code/:code_id", get(code_info))
        .with_state(lcd)
}

/// Serves the fake LCD on a random local port from its own thread and runtime.
/// Returns the base URL.
pub fn start(lcd: Arc<FakeLcd>) -> String {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, router(lcd).into_make_service())
                .await
                .unwrap();
        });
    });
    let addr = rx.recv().unwrap();
    format!("http://{}", addr)
}
