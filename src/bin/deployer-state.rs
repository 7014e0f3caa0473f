#![forbid(unsafe_code)]
//! View recorded deployments - code ids and contract addresses per network

use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use std::path::PathBuf;
use wasm_deployer::cli::short_address;
use wasm_deployer::config::load_config;
use wasm_deployer::state::DeploymentState;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional argument: the state file; defaults to the configured one
    let config = load_config(None)?;
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&config.deployer.state_file));

    if !path.exists() {
        eprintln!("{}", "📭 No deployment state found".yellow().bold());
        eprintln!(
            "{}",
            format!("💡 {} is created by the first 'deployer store'", path.display()).yellow()
        );
        return Ok(());
    }

    let state = DeploymentState::load(&path)?;
    println!(
        "{}",
        format!("📦 Deployments recorded in {}", path.display())
            .bright_cyan()
            .bold()
    );
    println!();

    let mut total_codes = 0;
    let mut total_contracts = 0;

    for chain_id in state.chains() {
        let entries = state.list(&chain_id);
        let updated = state.chain(&chain_id).updated_at;
        let marker = if chain_id == config.deployer.network {
            " (default)"
        } else {
            ""
        };
        println!(
            "{}{}  {}",
            format!("🌐 {}", chain_id).bright_magenta().bold(),
            marker.green(),
            format_timestamp_short(&updated).dimmed()
        );

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Contract")
                    .fg(TableColor::Cyan)
                    .add_attribute(Attribute::Bold),
                Cell::new("Code ID")
                    .fg(TableColor::Cyan)
                    .add_attribute(Attribute::Bold),
                Cell::new("Address")
                    .fg(TableColor::Cyan)
                    .add_attribute(Attribute::Bold),
                Cell::new("Checksum")
                    .fg(TableColor::Cyan)
                    .add_attribute(Attribute::Bold),
            ]);

        for entry in &entries {
            if entry.code_id.is_some() {
                total_codes += 1;
            }
            let address = match &entry.address {
                Some(a) => {
                    total_contracts += 1;
                    Cell::new(short_address(a)).fg(TableColor::Green)
                }
                None => Cell::new("not instantiated").fg(TableColor::Grey),
            };
            let checksum = entry
                .checksum
                .as_deref()
                .map(|c| format!("{}...", &c[..c.len().min(12)]))
                .unwrap_or_default();

            table.add_row(vec![
                Cell::new(&entry.name).fg(TableColor::White),
                Cell::new(entry.code_id.map(|c| format!("#{}", c)).unwrap_or_default())
                    .fg(TableColor::Yellow),
                address,
                Cell::new(checksum).fg(TableColor::Grey),
            ]);
        }

        println!("{}", table);
        println!();
    }

    println!(
        "{}",
        format!(
            "📊 {} networks, {} stored codes, {} contracts",
            state.chains().len(),
            total_codes,
            total_contracts
        )
        .bright_blue()
        .bold()
    );
    Ok(())
}

fn format_timestamp_short(rfc3339: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(rfc3339)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
