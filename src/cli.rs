//! Shared setup for the binaries: tracing, config, wallet and deployer construction

use crate::chain::{Daemon, MockChain};
use crate::config::{load_config, Config};
use crate::deployer::Deployer;
use crate::error::{DeployError, Result};
use crate::network::ChainInfo;
use crate::state::DeploymentState;
use crate::wallet::Wallet;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Everything a command needs before it touches a chain.
#[derive(Debug)]
pub struct CliContext {
    pub config: Config,
    pub chain: ChainInfo,
    pub state_path: PathBuf,
    pub state: DeploymentState,
}

/// Loads the config, picks the network and opens the state file.
///
/// `network` and `state_file` override the `[deployer]` section.
pub fn load_context(
    config_path: Option<&Path>,
    network: Option<&str>,
    state_file: Option<&Path>,
) -> Result<CliContext> {
    let config = load_config(config_path)?;
    let chain = match network {
        Some(name) => config.chain(name)?,
        None => config.default_chain()?,
    };
    let state_path = state_file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.deployer.state_file));
    let state = DeploymentState::load_or_new(&state_path)?;
    Ok(CliContext {
        config,
        chain,
        state_path,
        state,
    })
}

/// Wallet from the chain's mnemonic variable, prompting on a terminal when it is unset.
pub fn load_wallet(ctx: &CliContext) -> Result<Wallet> {
    let deployer = &ctx.config.deployer;
    match Wallet::from_env(&ctx.chain, deployer.account, deployer.index) {
        Ok(wallet) => Ok(wallet),
        Err(err) if std::io::stdin().is_terminal() => {
            tracing::warn!("{}", err);
            let phrase = rpassword::prompt_password(format!(
                "Mnemonic for {} ({}): ",
                ctx.chain.chain_id,
                ctx.chain.kind.mnemonic_env()
            ))?;
            Wallet::from_mnemonic(&phrase, &ctx.chain, deployer.account, deployer.index)
        }
        Err(err) => Err(err),
    }
}

/// Deployer broadcasting to the live chain.
pub fn live_deployer(ctx: &CliContext, gas_limit: Option<u64>) -> Result<Deployer<Daemon>> {
    let wallet = load_wallet(ctx)?;
    let mut daemon = Daemon::new(ctx.chain.clone(), wallet)?.with_config(&ctx.config.deployer)?;
    if let Some(limit) = gas_limit {
        if limit == 0 {
            return Err(DeployError::Config("--gas cannot be zero".to_string()));
        }
        daemon = daemon.with_gas(crate::chain::daemon::GasSettings {
            adjustment: ctx.config.deployer.gas_adjustment,
            fixed_limit: Some(limit),
        });
    }
    Ok(Deployer::new(
        daemon,
        ctx.state.clone(),
        &ctx.config.deployer.artifacts_dir,
    ))
}

/// Deployer against an in-memory chain seeded from the recorded state.
/// Nothing is broadcast and the state file is not written.
pub fn dry_run_deployer(ctx: &CliContext) -> Deployer<MockChain> {
    let deployer = &ctx.config.deployer;
    let sender = Wallet::from_env(&ctx.chain, deployer.account, deployer.index)
        .map(|w| w.address().to_string())
        .unwrap_or_else(|_| format!("{}1{}", ctx.chain.prefix, "q".repeat(38)));

    let chain = MockChain::new(&ctx.chain.chain_id, &ctx.chain.prefix, &sender);
    chain.import(&ctx.state.chain(&ctx.chain.chain_id));
    Deployer::new(chain, ctx.state.detached(), &deployer.artifacts_dir)
}

pub fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `terra1abcdefgh...wxyz` for display in tables.
pub fn short_address(address: &str) -> String {
    if address.len() > 24 {
        format!("{}...{}", &address[..14], &address[address.len() - 6..])
    } else {
        address.to_string()
    }
}
