#![forbid(unsafe_code)]
//! Store, instantiate, execute, query and migrate CosmWasm contracts

use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use wasm_deployer::chain::ChainClient;
use wasm_deployer::cli::{self, CliContext};
use wasm_deployer::config::load_config;
use wasm_deployer::deployer::{Deployer, InstantiateOptions};
use wasm_deployer::fee::parse_coins;
use wasm_deployer::msg::load_msg;
use wasm_deployer::plan::{Plan, StepOutcome};
use wasm_deployer::wallet::Wallet;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to ./deployer.toml, then ~/.wasm-deployer/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Network id or alias (local, testnet, mainnet)
    #[arg(long, short, global = true)]
    network: Option<String>,
    /// Deployment state file
    #[arg(long, global = true)]
    state: Option<PathBuf>,
    /// Run against an in-memory chain; nothing is broadcast or saved
    #[arg(long, global = true)]
    dry_run: bool,
    /// Fixed gas limit instead of simulation
    #[arg(long, global = true)]
    gas: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Uploads a contract's wasm from the artifacts directory
    Store {
        contract: String,
        /// Upload even if the same wasm is already stored
        #[arg(long)]
        force: bool,
    },
    /// Instantiates a stored contract
    Instantiate {
        contract: String,
        /// JSON message, or @file.json
        msg: String,
        #[command(flatten)]
        opts: InitArgs,
    },
    /// Stores and instantiates a contract
    Deploy {
        contract: String,
        /// JSON message, or @file.json
        msg: String,
        #[command(flatten)]
        opts: InitArgs,
    },
    /// Executes a message on a contract (recorded name or address)
    Execute {
        contract: String,
        /// JSON message, or @file.json
        msg: String,
        /// Funds to send, e.g. 1000000uluna,500uusd
        #[arg(long)]
        funds: Option<String>,
    },
    /// Runs a smart query
    Query {
        contract: String,
        /// JSON message, or @file.json
        msg: String,
    },
    /// Migrates a contract to newly stored code
    Migrate {
        contract: String,
        /// Recorded contract name or numeric code id
        new_code: String,
        /// JSON message, or @file.json
        #[arg(default_value = "{}")]
        msg: String,
    },
    /// Shows the on-chain code id, admin and label of a contract
    Info { contract: String },
    /// Runs a TOML deployment plan
    Run { plan: PathBuf },
    /// Inspects the deployment state
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
    /// Wallet helpers
    Wallet {
        #[command(subcommand)]
        command: WalletCommands,
    },
    /// Lists known networks
    Networks,
}

#[derive(clap::Args)]
struct InitArgs {
    #[arg(long)]
    label: Option<String>,
    /// Admin address, or "sender"
    #[arg(long)]
    admin: Option<String>,
    #[arg(long)]
    funds: Option<String>,
    /// Use the code stored under another name
    #[arg(long)]
    code: Option<String>,
}

#[derive(Subcommand)]
enum StateCommands {
    /// Lists recorded contracts on the selected network
    List,
    /// Forgets a recorded contract
    Remove { contract: String },
    /// Writes the selected network's records as CSV
    Export { path: PathBuf },
}

#[derive(Subcommand)]
enum WalletCommands {
    /// Prints the deployer address
    Address,
    /// Generates a new mnemonic
    New {
        #[arg(long, default_value_t = 24)]
        words: usize,
    },
}

fn main() {
    cli::init_tracing();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{} {}", "❌ Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.command {
        Commands::Networks => return networks(&cli),
        Commands::Wallet {
            command: WalletCommands::New { words },
        } => {
            let mnemonic = Wallet::generate(*words)?;
            println!("{}", "🔑 New mnemonic (store it safely):".bright_yellow().bold());
            println!("{}", mnemonic);
            return Ok(());
        }
        _ => {}
    }

    let ctx = cli::load_context(
        cli.config.as_deref(),
        cli.network.as_deref(),
        cli.state.as_deref(),
    )?;

    match &cli.command {
        Commands::State { command } => return state(&ctx, command),
        Commands::Wallet {
            command: WalletCommands::Address,
        } => {
            let wallet = cli::load_wallet(&ctx)?;
            println!("{}", wallet.address());
            println!("{}", format!("path {}", wallet.derivation_path()).dimmed());
            return Ok(());
        }
        _ => {}
    }

    if cli.dry_run {
        println!("{}", "🧪 Dry run: nothing is broadcast".bright_yellow());
        run_command(&cli.command, &cli::dry_run_deployer(&ctx))
    } else {
        run_command(&cli.command, &cli::live_deployer(&ctx, cli.gas)?)
    }
}

fn init_options(opts: &InitArgs) -> Result<InstantiateOptions, Box<dyn std::error::Error>> {
    Ok(InstantiateOptions {
        label: opts.label.clone(),
        admin: opts.admin.clone(),
        funds: opts.funds.as_deref().map(parse_coins).transpose()?.unwrap_or_default(),
        code: opts.code.clone(),
    })
}

fn run_command<C: ChainClient>(
    command: &Commands,
    deployer: &Deployer<C>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "{}",
        format!(
            "🌐 {} as {}",
            deployer.chain().chain_id(),
            cli::short_address(deployer.sender())
        )
        .bright_cyan()
    );

    match command {
        Commands::Store { contract, force } => {
            let stored = deployer.store_contract_with(contract, *force)?;
            if stored.skipped() {
                println!(
                    "{} {} unchanged, code id {}",
                    "⏭️ ".yellow(),
                    contract.bright_white(),
                    stored.code_id.to_string().bright_green()
                );
            } else {
                println!(
                    "{} {} stored with code id {}",
                    "✅".green(),
                    contract.bright_white(),
                    stored.code_id.to_string().bright_green()
                );
            }
        }
        Commands::Instantiate { contract, msg, opts } => {
            let out = deployer.instantiate_contract(contract, &load_msg(msg)?, &init_options(opts)?)?;
            println!(
                "{} {} instantiated at {}",
                "✅".green(),
                contract.bright_white(),
                out.address.bright_green()
            );
        }
        Commands::Deploy { contract, msg, opts } => {
            let (stored, out) = deployer.deploy(contract, &load_msg(msg)?, &init_options(opts)?)?;
            println!(
                "{} {} (code id {}) at {}",
                "✅".green(),
                contract.bright_white(),
                stored.code_id,
                out.address.bright_green()
            );
        }
        Commands::Execute { contract, msg, funds } => {
            let funds = funds.as_deref().map(parse_coins).transpose()?.unwrap_or_default();
            let out = deployer.execute_contract(contract, &load_msg(msg)?, &funds)?;
            println!(
                "{} executed in {} (gas used {})",
                "✅".green(),
                out.txhash.bright_white(),
                out.gas_used
            );
        }
        Commands::Query { contract, msg } => {
            let response = deployer.contract_query(contract, &load_msg(msg)?)?;
            cli::print_json(&response)?;
        }
        Commands::Migrate {
            contract,
            new_code,
            msg,
        } => {
            let out = deployer.migrate_contract(contract, new_code, &load_msg(msg)?)?;
            println!("{} migrated in {}", "✅".green(), out.txhash.bright_white());
        }
        Commands::Info { contract } => {
            let (name, info) = deployer.contract_info(contract)?;
            println!(
                "{} {}",
                "📄".bright_cyan(),
                name.as_deref().unwrap_or(contract.as_str()).bright_white().bold()
            );
            println!("   code id  {}", info.code_id.to_string().bright_green());
            println!("   label    {}", info.label);
            println!("   creator  {}", info.creator);
            if info.admin.is_empty() {
                println!("   admin    {}", "none".dimmed());
            } else {
                println!("   admin    {}", info.admin);
            }
        }
        Commands::Run { plan } => run_plan(plan, deployer)?,
        Commands::State { .. } | Commands::Wallet { .. } | Commands::Networks => {}
    }
    Ok(())
}

fn run_plan<C: ChainClient>(
    path: &std::path::Path,
    deployer: &Deployer<C>,
) -> Result<(), Box<dyn std::error::Error>> {
    let plan = Plan::load(path)?;
    println!("{}", format!("📜 Plan: {}", plan.name).bright_magenta().bold());
    if let Some(description) = &plan.description {
        println!("{}", description.dimmed());
    }

    let bar = ProgressBar::new(plan.steps.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:30.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let result = plan.run_with(deployer, |step| {
        let line = match &step.outcome {
            StepOutcome::Stored { code_id, txhash } => match txhash {
                Some(_) => format!("stored code id {}", code_id),
                None => format!("unchanged, code id {}", code_id),
            },
            StepOutcome::Instantiated { address, .. } => format!("at {}", address),
            StepOutcome::Deployed { code_id, address } => {
                format!("code id {} at {}", code_id, address)
            }
            StepOutcome::Executed { txhash, .. } => format!("tx {}", txhash),
            StepOutcome::Queried { response } => response.to_string(),
            StepOutcome::Migrated { txhash } => format!("tx {}", txhash),
        };
        bar.println(format!(
            "  {} {} {} {}",
            format!("#{}", step.index).dimmed(),
            step.action.bright_cyan(),
            step.contract.bright_white(),
            line
        ));
        bar.inc(1);
    });

    match result {
        Ok(report) => {
            bar.finish_with_message("done");
            println!(
                "{}",
                format!("✅ {} steps completed on {}", report.steps.len(), report.chain_id)
                    .green()
                    .bold()
            );
            Ok(())
        }
        Err(e) => {
            bar.abandon_with_message("failed");
            Err(e.into())
        }
    }
}

fn state(ctx: &CliContext, command: &StateCommands) -> Result<(), Box<dyn std::error::Error>> {
    let chain_id = &ctx.chain.chain_id;
    match command {
        StateCommands::List => {
            let entries = ctx.state.list(chain_id);
            if entries.is_empty() {
                println!("{}", format!("Nothing recorded on {}", chain_id).yellow());
            }
            for entry in entries {
                println!(
                    "{:<24} {:>8} {}",
                    entry.name.bright_white(),
                    entry.code_id.map(|c| c.to_string()).unwrap_or_default(),
                    entry.address.unwrap_or_default().cyan()
                );
            }
        }
        StateCommands::Remove { contract } => {
            let removed = ctx.state.remove(chain_id, contract)?;
            ctx.state.persist()?;
            println!("{} forgot {} on {}", "🗑️ ".red(), removed.name, chain_id);
        }
        StateCommands::Export { path } => {
            ctx.state.export_csv(chain_id, path)?;
            println!("{} exported to {}", chain_id, path.display());
        }
    }
    Ok(())
}

fn networks(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(cli.config.as_deref())?;
    println!("{}", "Known networks:".bright_green().underline());
    for chain in config.all_chains() {
        let marker = if chain.chain_id == config.deployer.network {
            "*".bright_green().to_string()
        } else {
            " ".to_string()
        };
        println!(
            "{} {:<14} {:<8} {:<40} {}{}",
            marker,
            chain.chain_id.bright_white(),
            chain.kind.to_string(),
            chain.lcd_url,
            chain.gas_price,
            chain.gas_denom
        );
    }
    Ok(())
}
