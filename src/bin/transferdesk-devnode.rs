#![forbid(unsafe_code)]
//! Local development node speaking the Ethereum JSON-RPC subset transferdesk uses

use clap::Parser;
use colored::*;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use transferdesk::config::{load_config, load_config_from};
use transferdesk::devnode::{DevNode, DevNodeOptions};
use transferdesk::units::{format_ether, format_gwei, WEI_PER_GWEI};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file to read instead of ./transferdesk.toml
    #[arg(long)]
    config: Option<std::path::PathBuf>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    chain_id: Option<u64>,
    /// Number of funded accounts
    #[arg(long)]
    accounts: Option<usize>,
    /// Initial balance per account, in ETH
    #[arg(long)]
    balance: Option<u64>,
    #[arg(long)]
    gas_price_gwei: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    }
    .devnode;

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(chain_id) = cli.chain_id {
        config.chain_id = chain_id;
    }
    if let Some(accounts) = cli.accounts {
        config.accounts = accounts;
    }
    if let Some(balance) = cli.balance {
        config.initial_balance = balance;
    }
    if let Some(gas_price) = cli.gas_price_gwei {
        config.gas_price_gwei = gas_price;
    }
    if config.accounts == 0 {
        return Err("--accounts must be at least 1".into());
    }

    let node = DevNode::new(DevNodeOptions::from(&config));

    println!("{}", "🧪 transferdesk dev node".bright_cyan().bold());
    println!("{}", "━━━━━━━━━━━━━━━━━━━━━━━━".bright_cyan());
    println!("Chain id:  {}", config.chain_id.to_string().bright_white());
    println!(
        "Gas price: {}",
        format_gwei(u128::from(config.gas_price_gwei) * WEI_PER_GWEI).bright_white()
    );
    println!();
    println!("{}", "Available accounts".bright_green().underline());
    for (i, account) in node.accounts().iter().enumerate() {
        println!(
            "  ({}) {} ({} ETH)",
            i,
            account.to_string().bright_white(),
            format_ether(node.balance_of(account))
        );
    }
    println!();

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    println!("🚀 Listening on http://{}", addr);

    axum::serve(listener, node.router())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    println!("{}", "Dev node stopped.".yellow());
    Ok(())
}
