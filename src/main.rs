use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use alloy::{network::Ethereum, providers::ProviderBuilder};
use anyhow::Context;
use clap::Parser;
use log::{error, info};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};

use de_vote::{
    app::{spawn_app, AppConfig},
    cli::{help_text, parse_line, ReplInput},
    config::{Args, ClientConfig},
    session::{LocalWallet, WalletSession},
    view,
};
use election_contract::{local_voting::LocalVoting, sc_voting::ScVoting, ElectionContract};

const SIMULATED_ACCOUNTS: usize = 3;

async fn simulated_contract() -> anyhow::Result<Arc<dyn ElectionContract>> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock is before the unix epoch")?
        .as_secs();
    let contract = LocalVoting::new(now);
    contract
        .create_election("Student Council 2025", &["Alice", "Bob"], 3600)
        .await;
    Ok(Arc::new(contract))
}

async fn build_contract(
    config: &ClientConfig,
) -> anyhow::Result<(Arc<dyn ElectionContract>, Option<LocalWallet>)> {
    let wallet = if config.private_keys.is_empty() {
        None
    } else {
        Some(
            LocalWallet::from_private_keys(&config.private_keys)
                .context("Failed to load private keys")?,
        )
    };

    if config.simulate {
        info!("Running against a simulated contract");
        let wallet = wallet.unwrap_or_else(|| LocalWallet::random(SIMULATED_ACCOUNTS));
        return Ok((simulated_contract().await?, Some(wallet)));
    }

    info!(
        "Using contract {} at {}",
        config.contract_address, config.rpc_url
    );
    let contract: Arc<dyn ElectionContract> = match &wallet {
        Some(wallet) => {
            let provider = ProviderBuilder::new()
                .wallet(wallet.ethereum_wallet()?)
                .on_http(config.rpc_url.clone());
            Arc::new(ScVoting::<_, Ethereum>::new(
                provider,
                config.contract_address,
            ))
        }
        None => {
            let provider = ProviderBuilder::new().on_http(config.rpc_url.clone());
            Arc::new(ScVoting::<_, Ethereum>::new(
                provider,
                config.contract_address,
            ))
        }
    };
    Ok((contract, wallet))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ClientConfig::from_args(Args::parse())?;
    let (contract, wallet) = build_contract(&config).await?;
    if wallet.is_none() {
        info!("No private keys configured, voting is unavailable");
    }
    let session = WalletSession::new(wallet, config.session_file.clone());

    let mut handle = spawn_app(
        contract,
        session,
        AppConfig {
            poll_interval: config.poll_interval,
            advance_secs: config.advance_secs,
        },
    )
    .await;

    let (lines_tx, mut lines_rx) = mpsc::channel::<String>(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if lines_tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read stdin: {e}");
                    break;
                }
            }
        }
    });

    if !config.json {
        println!("{}", help_text());
    }
    loop {
        tokio::select! {
            maybe = lines_rx.recv() => {
                let Some(line) = maybe else { break };
                match parse_line(&line) {
                    Ok(None) => {}
                    Ok(Some(ReplInput::Exit)) => break,
                    Ok(Some(ReplInput::Help)) => println!("{}", help_text()),
                    Ok(Some(ReplInput::Cmd(cmd))) => {
                        if let Err(e) = handle.app.ask(cmd).await {
                            error!("App is not responding: {e}");
                            break;
                        }
                    }
                    Err(e) => eprintln!("{e}"),
                }
            }
            maybe = handle.events.recv() => {
                let Some(event) = maybe else { break };
                println!("{}", view::render(&event, config.json));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}
