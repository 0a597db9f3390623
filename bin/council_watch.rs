//! # Council Watch
//!
//! Read-only command line view of a council deployment: pools, balances,
//! proposal status, ballots and delegations.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin council_watch -- pools
//! cargo run --bin council_watch -- pool 3
//! cargo run --bin council_watch -- proposal 12 --created 18000000 --quorum 50
//! ```
//!
//! Settings come from `Config.toml` (or `--config`), with `SDK_*` overrides
//! read from the environment and `.env`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use council_sync_sdk::multi_pool::MultiPoolDataSource;
use council_sync_sdk::proposal_status::{quorum_progress, vote_count};
use council_sync_sdk::types::{Proposal, PoolId};
use council_sync_sdk::{CouncilClient, Settings};
use ethers::types::{Address, U256};
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Inspect council governance state")]
struct Cli {
    /// Settings file; defaults to ./Config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serve Prometheus metrics on this address (observability builds only)
    #[arg(long)]
    metrics_addr: Option<std::net::SocketAddr>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered pool ids
    Pools {
        #[arg(long)]
        from: Option<u64>,
        #[arg(long)]
        to: Option<u64>,
    },
    /// Reserves, parameters and metadata of one pool
    Pool { id: PoolId },
    /// Raw balance of an address in a pool
    Balance {
        id: PoolId,
        #[arg(value_parser = parse_address)]
        address: Address,
    },
    /// Status and tally of a proposal
    Proposal {
        #[arg(value_parser = parse_u256)]
        id: U256,
        /// Block the proposal was created at
        #[arg(long)]
        created: u64,
        /// Quorum in whole voting tokens
        #[arg(long)]
        quorum: String,
    },
    /// How an account voted on a proposal
    Ballot {
        #[arg(value_parser = parse_address)]
        account: Address,
        #[arg(value_parser = parse_u256)]
        id: U256,
    },
    /// Locking vault deposit and delegate of an account
    Delegate {
        #[arg(value_parser = parse_address)]
        account: Address,
    },
}

fn parse_address(raw: &str) -> Result<Address, String> {
    raw.parse().map_err(|e| format!("invalid address {}: {}", raw, e))
}

/// Decimal, unlike `U256::from_str` which reads hex.
fn parse_u256(raw: &str) -> Result<U256, String> {
    U256::from_dec_str(raw).map_err(|e| format!("invalid number {}: {}", raw, e))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_path(path),
        None => Settings::new(),
    }
    .context("loading settings")?;

    init_logging(&settings);
    init_metrics(cli.metrics_addr)?;

    let client: CouncilClient = CouncilClient::connect(settings)?;
    let output = run(&client, cli.cmd).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(client: &CouncilClient, cmd: Command) -> Result<serde_json::Value> {
    let pools = client.multi_pool();
    Ok(match cmd {
        Command::Pools { from, to } => json!(pools.get_pool_ids(from, to).await?),
        Command::Pool { id } => {
            let (reserves, parameters, name, symbol) = futures::try_join!(
                pools.get_pool_reserves(id),
                pools.get_pool_parameters(id),
                pools.get_name(id),
                pools.get_symbol(id),
            )?;
            json!({
                "id": id,
                "name": name,
                "symbol": symbol,
                "reserves": reserves,
                "parameters": parameters,
            })
        }
        Command::Balance { id, address } => json!({
            "id": id,
            "address": address,
            "balance": pools.get_balance_of(id, address).await?,
        }),
        Command::Proposal { id, created, quorum } => {
            let proposal = Proposal {
                proposal_id: id,
                snapshot_id: String::new(),
                quorum,
                created,
            };
            let status = client.proposal_status(&proposal).await?;
            let tally = client.core_voting().proposal_voting_power(id).await?;
            json!({
                "id": id.to_string(),
                "status": status,
                "votes": vote_count(&tally)?,
                "quorum": proposal.quorum,
                "quorum_progress_percent": quorum_progress(&tally, &proposal.quorum)?,
            })
        }
        Command::Ballot { account, id } => {
            let ballot = client.core_voting().ballot(account, id).await?;
            json!({ "account": account, "id": id.to_string(), "ballot": ballot })
        }
        Command::Delegate { account } => {
            let deposit = client.locking_vault().deposits(account).await?;
            json!({ "account": account, "deposit": deposit })
        }
    })
}

/// The fmt subscriber also captures `log` records, so env_logger is only
/// installed when it is absent.
#[cfg(feature = "observability")]
fn init_logging(settings: &Settings) {
    use std::str::FromStr;
    let level = tracing::Level::from_str(&settings.log.level).unwrap_or(tracing::Level::INFO);
    let builder = tracing_subscriber::fmt().with_max_level(level);
    if settings.log.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(not(feature = "observability"))]
fn init_logging(settings: &Settings) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&settings.log.level))
        .init();
}

#[cfg(feature = "observability")]
fn init_metrics(addr: Option<std::net::SocketAddr>) -> Result<()> {
    if let Some(addr) = addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("installing Prometheus exporter")?;
        council_sync_sdk::metrics::describe_metrics();
        log::info!("Serving metrics on {}", addr);
    }
    Ok(())
}

#[cfg(not(feature = "observability"))]
fn init_metrics(addr: Option<std::net::SocketAddr>) -> Result<()> {
    if addr.is_some() {
        log::warn!("--metrics-addr ignored: built without the observability feature");
    }
    Ok(())
}
