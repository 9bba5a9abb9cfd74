use std::{path::PathBuf, time::Duration};

use alloy::primitives::Address;
use anyhow::Context;
use clap::Parser;
use url::Url;

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x59b670e9fA9D0A427751Af201D676719a970857b";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
/// Slightly more than the hour a demo election usually runs.
pub const DEFAULT_ADVANCE_SECS: u64 = 4000;
pub const DEFAULT_SESSION_FILE: &str = ".de-vote-session.json";

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Terminal client for on-chain elections", long_about = None)]
pub struct Args {
    /// JSON-RPC endpoint of the chain hosting the voting contract
    #[arg(long, env = "VOTE_RPC_URL", default_value = DEFAULT_RPC_URL)]
    pub rpc_url: String,

    /// Address of the deployed voting contract
    #[arg(long = "contract", env = "VOTE_CONTRACT_ADDRESS", default_value = DEFAULT_CONTRACT_ADDRESS)]
    pub contract_address: String,

    /// Private key of a wallet account, may be repeated
    #[arg(
        short = 'K',
        long = "private-key",
        env = "VOTE_PRIVATE_KEYS",
        value_delimiter = ','
    )]
    pub private_keys: Vec<String>,

    /// Seconds between status polls
    #[arg(long, env = "VOTE_POLL_INTERVAL", default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    pub poll_interval_secs: u64,

    /// Seconds added by `advance-time` on a local development chain
    #[arg(long, env = "VOTE_ADVANCE_SECS", default_value_t = DEFAULT_ADVANCE_SECS)]
    pub advance_secs: u64,

    /// Where the connected account is remembered between runs
    #[arg(long, env = "VOTE_SESSION_FILE", default_value = DEFAULT_SESSION_FILE)]
    pub session_file: PathBuf,

    /// Run against an in-process contract instead of a chain
    #[arg(long)]
    pub simulate: bool,

    /// Print one JSON event per line instead of text
    #[arg(long)]
    pub json: bool,
}

/// Validated client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub rpc_url: Url,
    pub contract_address: Address,
    pub private_keys: Vec<String>,
    pub poll_interval: Duration,
    pub advance_secs: u64,
    pub session_file: PathBuf,
    pub simulate: bool,
    pub json: bool,
}

impl ClientConfig {
    pub fn from_args(args: Args) -> anyhow::Result<Self> {
        let rpc_url = args
            .rpc_url
            .parse::<Url>()
            .context(format!("Failed to parse RPC url: {}", args.rpc_url))?;
        let contract_address = args
            .contract_address
            .parse::<Address>()
            .context(format!(
                "Failed to parse contract address: {}",
                args.contract_address
            ))?;
        anyhow::ensure!(
            args.poll_interval_secs > 0,
            "Poll interval must be at least one second"
        );
        Ok(Self {
            rpc_url,
            contract_address,
            private_keys: args
                .private_keys
                .into_iter()
                .filter(|k| !k.trim().is_empty())
                .collect(),
            poll_interval: Duration::from_secs(args.poll_interval_secs),
            advance_secs: args.advance_secs,
            session_file: args.session_file,
            simulate: args.simulate,
            json: args.json,
        })
    }
}
