#![forbid(unsafe_code)]

use colored::*;

fn main() {
    println!("{}", "wasm-deployer".bright_cyan().bold());
    println!("{}", "-------------".bright_cyan());
    println!();
    println!(
        "{}",
        "This is the main entry point, but most functionality is in separate binaries.".yellow()
    );
    println!(
        "{}",
        "Use 'cargo run --bin <binary_name>' to run a specific command.".yellow()
    );
    println!();
    println!("{}", "Available binaries:".bright_green().underline());
    println!(
        "  - {}  {}",
        "deployer".bright_white(),
        "store / instantiate / deploy / execute / query / migrate / info / run".dimmed()
    );
    println!(
        "  - {}  {}",
        "deployer-state".bright_white(),
        "table of recorded code ids and addresses".dimmed()
    );
    println!();
    println!("{}", "Mnemonics are read from:".bright_green().underline());
    println!("  - {} for local networks", "LOCAL_MNEMONIC".bright_white());
    println!("  - {} for testnets", "TEST_MNEMONIC".bright_white());
    println!("  - {} for mainnets", "MAIN_MNEMONIC".bright_white());
    println!();
    println!("{}", "Example:".bright_green().underline());
    println!(
        "{}",
        "  cargo run --bin deployer -- --network testnet run demos/terraswap_pair.toml".italic()
    );
}
