#![forbid(unsafe_code)]
//! Terminal front-end: network badge, accounts, balances, transfers, block stats

use clap::{Parser, Subcommand};
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use std::path::PathBuf;
use std::time::Duration;
use transferdesk::block::BlockSummary;
use transferdesk::config::{load_config, load_config_from};
use transferdesk::network::NetworkSnapshot;
use transferdesk::{Address, DeskState, LedgerSession};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Node JSON-RPC endpoint (overrides the config file)
    #[arg(long, global = true)]
    endpoint: Option<String>,
    /// Config file to read instead of ./transferdesk.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Per-request timeout, e.g. "5s" or "500ms"
    #[arg(long, global = true, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shows the chain id, its label and the current block height
    Network,
    /// Lists the accounts managed by the node
    Accounts,
    /// Shows the balance of an account (defaults to the first account)
    Balance { address: Option<String> },
    /// Sends a native-currency transfer
    Send {
        /// Amount in ETH, e.g. 0.25
        #[arg(long)]
        amount: String,
        /// Sender (defaults to the first account)
        #[arg(long)]
        from: Option<String>,
        /// Recipient (defaults to the second account)
        #[arg(long)]
        to: Option<String>,
    },
    /// Shows statistics for the latest block
    Block,
    /// Shows network, default accounts and the sender balance
    Status,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "❌".red(), e.to_string().red());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(endpoint) = cli.endpoint {
        config.node.endpoint = endpoint;
    }
    if let Some(timeout) = cli.timeout {
        config.node.request_timeout = timeout;
    }
    config.validate()?;

    let session = LedgerSession::connect_with_config(&config.node).await.map_err(|e| {
        eprintln!(
            "{}",
            format!("💡 Make sure a node is running on {}", config.node.endpoint).yellow()
        );
        e
    })?;

    match cli.command {
        Commands::Network => {
            let snapshot = session.describe_network().await?;
            print_network(&snapshot);
        }
        Commands::Accounts => {
            let accounts = session.list_accounts().await?;
            let mut table = styled_table(vec!["#", "Account", "Balance (ETH)"]);
            for (i, account) in accounts.iter().enumerate() {
                let balance = session.get_balance(account.as_str()).await?;
                table.add_row(vec![
                    Cell::new(i).fg(TableColor::Grey),
                    Cell::new(account).fg(TableColor::White),
                    Cell::new(balance.ether()).fg(TableColor::Green),
                ]);
            }
            println!("{}", table);
        }
        Commands::Balance { address } => {
            let account = match address {
                Some(a) => a,
                None => first_account(&session).await?,
            };
            let balance = session.get_balance(&account).await?;
            println!("{}", "💰 Account Balance".bright_cyan().bold());
            println!("   {}", balance.account.to_string().white());
            println!("   {} ETH", balance.ether().bright_green().bold());
        }
        Commands::Send { amount, from, to } => {
            let mut desk = DeskState::load(&session).await?;
            if let Some(from) = from {
                desk.select_sender(&session, &from).await?;
            }
            if let Some(to) = to {
                desk.select_recipient(&to)?;
            }

            println!(
                "{}",
                format!(
                    "⏳ Sending {} ETH {} → {}",
                    amount,
                    show(&desk.sender),
                    show(&desk.recipient)
                )
                .bright_cyan()
            );

            let tx_hash = desk.transfer(&session, &amount).await?;
            println!("{}", "✅ Transaction successful!".bright_green().bold());
            println!("   TX: {}", tx_hash.white());
            if let Some(balance) = &desk.balance {
                println!("   Sender balance: {} ETH", balance.ether().bright_green());
            }
        }
        Commands::Block => {
            let summary = session.fetch_latest_block().await?;
            print_block(&summary);
        }
        Commands::Status => {
            let desk = DeskState::load(&session).await?;
            match &desk.network {
                Some(snapshot) => print_network(snapshot),
                None => println!("{}", "⚠️  Network info unavailable".yellow()),
            }
            println!("   From: {}", show(&desk.sender).white());
            println!("   To:   {}", show(&desk.recipient).white());
            if let Some(balance) = &desk.balance {
                println!("   Balance: {} ETH", balance.ether().bright_green().bold());
            }
        }
    }

    Ok(())
}

fn show(account: &Option<Address>) -> String {
    account
        .as_ref()
        .map(|a| a.to_string())
        .unwrap_or_else(|| "-".to_string())
}

async fn first_account(session: &LedgerSession) -> Result<String, Box<dyn std::error::Error>> {
    let accounts = session.list_accounts().await?;
    let first = accounts.first().ok_or("Node manages no accounts")?;
    Ok(first.to_string())
}

fn print_network(snapshot: &NetworkSnapshot) {
    println!(
        "{} {} {}",
        "🔗".bright_cyan(),
        snapshot.label.bright_cyan().bold(),
        format!("• Block #{}", snapshot.block_height).white()
    );
}

fn print_block(summary: &BlockSummary) {
    let mut table = styled_table(vec!["Blockchain Statistics", ""]);
    table.add_row(vec![Cell::new("Block Number"), Cell::new(summary.height)]);
    table.add_row(vec![Cell::new("Block Hash"), Cell::new(&summary.hash)]);
    table.add_row(vec![
        Cell::new("Timestamp"),
        Cell::new(&summary.timestamp_display),
    ]);
    table.add_row(vec![
        Cell::new("Gas Price"),
        Cell::new(&summary.gas_price_display),
    ]);
    table.add_row(vec![
        Cell::new("Transactions"),
        Cell::new(summary.transaction_count),
    ]);
    println!("{}", table);
}

fn styled_table(headers: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .into_iter()
                .map(|h| Cell::new(h).fg(TableColor::Cyan).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );
    table
}
