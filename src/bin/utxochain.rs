#![forbid(unsafe_code)]
//! Command-line front end: create a chain, query balances, send coins and
//! inspect stored blocks.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use utxochain::blockchain::Ledger;
use utxochain::cli::{create_ledger_from_config, load_ledger_from_config};
use utxochain::config::{load_config, Config};
use utxochain::error::ChainError;
use utxochain::miner::MiningControl;
use utxochain::transaction::Transaction;

#[derive(Parser)]
#[command(author, version, about = "Proof-of-work UTXO ledger", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Override the database path from the configuration
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Creates a new chain whose genesis reward goes to ADDRESS
    #[command(name = "createblockchain")]
    CreateBlockchain {
        #[arg(long)]
        address: String,
    },
    /// Prints the spendable balance of ADDRESS
    #[command(name = "getbalance")]
    GetBalance {
        #[arg(long)]
        address: String,
    },
    /// Sends AMOUNT coins from FROM to TO in a newly mined block
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u64,
    },
    /// Prints every block from tip to genesis
    #[command(name = "printchain")]
    PrintChain,
    /// Audits proof-of-work, links and spends of the whole chain
    #[command(name = "verifychain")]
    VerifyChain,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    run(cli).await?;
    Ok(())
}

async fn run(cli: Cli) -> Result<(), ChainError> {
    let mut config = load_config(&cli.config)?;
    if let Some(db) = cli.db {
        config.database.path = db;
    }
    config.validate()?;

    match cli.command {
        Commands::CreateBlockchain { address } => create_blockchain(config, address).await,
        Commands::GetBalance { address } => get_balance(&config, &address),
        Commands::Send { from, to, amount } => send(config, from, to, amount).await,
        Commands::PrintChain => print_chain(&config),
        Commands::VerifyChain => verify_chain(&config),
    }
}

/// Runs a mining job off the async runtime; Ctrl-C cancels the nonce search.
async fn mine_blocking<T, F>(control: MiningControl, job: F) -> Result<T, ChainError>
where
    T: Send + 'static,
    F: FnOnce(&MiningControl) -> Result<T, ChainError> + Send + 'static,
{
    let handle = control.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupt received, stopping miner...".yellow());
            handle.cancel();
        }
    });

    let result = tokio::task::spawn_blocking(move || job(&control))
        .await
        .map_err(|e| ChainError::StoreIo(format!("Mining task failed: {}", e)));
    watcher.abort();
    result?
}

async fn create_blockchain(config: Config, address: String) -> Result<(), ChainError> {
    println!("{}", "⛏️  Mining genesis block...".bright_cyan());
    let control = config.mining_control();
    let ledger = mine_blocking(control, move |control| {
        create_ledger_from_config(&config, &address, control)
    })
    .await?;

    println!(
        "{} {}",
        "✅ Genesis created:".bright_green(),
        hex::encode(ledger.tip()).bright_white()
    );
    Ok(())
}

fn get_balance(config: &Config, address: &str) -> Result<(), ChainError> {
    let ledger = load_ledger_from_config(config)?;
    let balance = ledger.balance(address)?;
    println!(
        "Balance of {}: {}",
        address.bright_yellow(),
        balance.to_string().bright_green()
    );
    Ok(())
}

async fn send(config: Config, from: String, to: String, amount: u64) -> Result<(), ChainError> {
    println!(
        "{} {} → {} ({})",
        "💸 Sending".bright_cyan(),
        from.bright_yellow(),
        to.bright_yellow(),
        amount
    );
    let control = config.mining_control();
    let block = mine_blocking(control, move |control| {
        let mut ledger = load_ledger_from_config(&config)?;
        let tx = Transaction::transfer(&from, &to, amount, &ledger)?;
        ledger.append_with(vec![tx], control)
    })
    .await?;

    println!(
        "{} {}",
        "✅ Success! Block:".bright_green(),
        block.hash_str().bright_white()
    );
    Ok(())
}

fn print_chain(config: &Config) -> Result<(), ChainError> {
    let ledger = load_ledger_from_config(config)?;
    let pow = *ledger.proof_of_work();

    for block in ledger.iter() {
        let block = block?;
        let prev = block
            .prev_hash
            .map(hex::encode)
            .unwrap_or_else(|| "(genesis)".to_string());
        let valid = if pow.validate(&block) {
            "true".bright_green()
        } else {
            "false".bright_red()
        };

        println!("{} {}", "Prev. hash:".bright_black(), prev);
        println!("{} {}", "Hash:".bright_black(), block.hash_str().bright_white());
        println!("{} {}", "Nonce:".bright_black(), block.nonce);
        println!("{} {}", "PoW:".bright_black(), valid);
        for tx in &block.transactions {
            print_transaction(tx);
        }
        println!();
    }
    Ok(())
}

fn print_transaction(tx: &Transaction) {
    let kind = if tx.is_coinbase() { "coinbase" } else { "transfer" };
    println!("  {} {} ({})", "Tx".bright_cyan(), tx.id_hex(), kind);
    if !tx.is_coinbase() {
        for input in &tx.inputs {
            println!(
                "    in  {}:{} by {}",
                hex::encode(&input.ref_tx_id),
                input.ref_out_index,
                input.auth_tag
            );
        }
    }
    for (i, output) in tx.outputs.iter().enumerate() {
        println!("    out {} {} → {}", i, output.value, output.lock_key);
    }
}

fn verify_chain(config: &Config) -> Result<(), ChainError> {
    let ledger: Ledger = load_ledger_from_config(config)?;
    let report = ledger.verify()?;
    println!(
        "{} {} blocks, {} transactions, difficulty {}",
        "✅ Chain valid:".bright_green(),
        report.blocks,
        report.transactions,
        ledger.difficulty()
    );
    Ok(())
}
