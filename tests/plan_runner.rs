//! Running deployment plans against the in-memory chain

use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wasm_deployer::chain::mock::MockCall;
use wasm_deployer::chain::MockChain;
use wasm_deployer::config::parse_config;
use wasm_deployer::plan::{Plan, StepOutcome};
use wasm_deployer::state::DeploymentState;
use wasm_deployer::{DeployError, Deployer};

const SENDER: &str = "terra1x46rqay4d3cssq8gxxvqz8xt6nwlz4td20k38v";

fn demos_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos")
}

fn deployer_in(dir: &Path) -> Deployer<MockChain> {
    let artifacts = dir.join("artifacts");
    fs::create_dir_all(&artifacts).unwrap();
    for name in ["terraswap_token", "terraswap_pair", "registry"] {
        fs::write(artifacts.join(format!("{}.wasm", name)), format!("\0asm {}", name)).unwrap();
    }
    let state = DeploymentState::load_or_new(&dir.join("state.json")).unwrap();
    Deployer::new(MockChain::new("localterra", "terra", SENDER), state, artifacts)
}

#[test]
fn test_demo_plans_parse() {
    for file in ["terraswap_pair.toml", "withdraw_liquidity.toml", "register_contracts.toml"] {
        let plan = Plan::load(&demos_dir().join(file))
            .unwrap_or_else(|e| panic!("{} does not load: {}", file, e));
        assert!(!plan.steps.is_empty());
    }

    let config = parse_config(&fs::read_to_string(demos_dir().join("deployer.toml")).unwrap())
        .unwrap();
    assert_eq!(config.chain("devnet-1").unwrap().lcd_url, "http://127.0.0.1:1318");
}

#[test]
fn test_pair_plan_end_to_end() {
    let dir = TempDir::new().unwrap();
    let deployer = deployer_in(dir.path());

    // the pool query is answered once the pair exists; the address is deterministic
    let plan = Plan::load(&demos_dir().join("terraswap_pair.toml")).unwrap();
    let mut seen = Vec::new();
    let result = plan.run_with(&deployer, |step| {
        seen.push(step.action.clone());
        if step.contract == "terraswap_pair" && step.action == "deploy" {
            if let StepOutcome::Deployed { address, .. } = &step.outcome {
                deployer
                    .chain()
                    .set_query_response(address, json!({"assets": [], "total_share": "1000000000"}));
            }
        }
    });
    let report = result.unwrap();

    assert_eq!(
        seen,
        vec!["store", "instantiate", "deploy", "execute", "execute", "query"]
    );
    assert_eq!(report.chain_id, "localterra");
    assert_eq!(report.steps.len(), 6);

    let token = deployer.state().address("localterra", "whale_token").unwrap();
    let pair = deployer.state().address("localterra", "terraswap_pair").unwrap();
    let pair_contract = deployer.chain().contract(&pair).unwrap();
    assert_eq!(pair_contract.admin.as_deref(), Some(SENDER));
    assert_eq!(pair_contract.init_msg["token_code_id"], json!(1));
    assert_eq!(
        pair_contract.init_msg["asset_infos"][0]["token"]["contract_addr"],
        json!(token)
    );

    // the token message came from the json file next to the plan
    let token_contract = deployer.chain().contract(&token).unwrap();
    assert_eq!(token_contract.init_msg["initial_balances"][0]["address"], SENDER);

    let provide = deployer
        .chain()
        .calls()
        .into_iter()
        .find_map(|c| match c {
            MockCall::Execute { msg, funds, .. } if msg.get("provide_liquidity").is_some() => {
                Some(funds)
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(provide[0].to_string(), "1000000000uluna");
}

#[test]
fn test_plan_stops_at_first_failure() {
    let dir = TempDir::new().unwrap();
    let deployer = deployer_in(dir.path());
    let plan = Plan::parse(
        r#"
        name = "broken"

        [[step]]
        action = "deploy"
        contract = "terraswap_token"
        msg = {}

        [[step]]
        action = "execute"
        contract = "terraswap_pair"
        msg = { pool = {} }

        [[step]]
        action = "store"
        contract = "registry"
        "#,
        dir.path(),
    )
    .unwrap();

    let err = plan.run(&deployer).unwrap_err();
    match &err {
        DeployError::Plan { step, action, source } => {
            assert_eq!(*step, 2);
            assert_eq!(action, "execute");
            assert!(matches!(**source, DeployError::State(_)));
        }
        other => panic!("unexpected error {:?}", other),
    }

    // step 1 is recorded on disk, step 3 never ran
    let reloaded = DeploymentState::load(&dir.path().join("state.json")).unwrap();
    assert!(reloaded.address("localterra", "terraswap_token").is_some());
    assert_eq!(reloaded.code_id("localterra", "registry"), None);
}

#[test]
fn test_query_expectation_mismatch_fails() {
    let dir = TempDir::new().unwrap();
    let deployer = deployer_in(dir.path());
    let plan = Plan::parse(
        r#"
        name = "check"

        [[step]]
        action = "deploy"
        contract = "registry"
        msg = {}

        [[step]]
        action = "query"
        contract = "registry"
        msg = { config = {} }
        expect = { code_id = "${code_id:registry}", label = "registry" }

        [[step]]
        action = "query"
        contract = "registry"
        msg = { config = {} }
        expect = { label = "something else" }
        "#,
        dir.path(),
    )
    .unwrap();

    let err = plan.run(&deployer).unwrap_err();
    assert!(matches!(err, DeployError::Plan { step: 3, .. }));
    assert!(err.to_string().contains("does not match"));
}

#[test]
fn test_rerun_skips_unchanged_uploads() {
    let dir = TempDir::new().unwrap();
    let deployer = deployer_in(dir.path());
    let plan = Plan::parse(
        "name = \"store\"\n[[step]]\naction = \"store\"\ncontract = \"registry\"",
        dir.path(),
    )
    .unwrap();

    plan.run(&deployer).unwrap();
    let second = plan.run(&deployer).unwrap();
    assert_eq!(
        second.steps[0].outcome,
        StepOutcome::Stored {
            code_id: 1,
            txhash: None
        }
    );

    let forced = Plan::parse(
        "name = \"store\"\n[[step]]\naction = \"store\"\ncontract = \"registry\"\nforce = true",
        dir.path(),
    )
    .unwrap()
    .run(&deployer)
    .unwrap();
    assert!(matches!(
        forced.steps[0].outcome,
        StepOutcome::Stored { code_id: 2, txhash: Some(_) }
    ));
}
