//! wallet-session: headless shell over a synchronized EIP-1193 wallet session

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use eyre::{eyre, WrapErr};

use wallet_session_adapters::{Eip1193Adapter, RuntimeProfile, SessionAdapterConfig};
use wallet_session_core::{ConnectOutcome, SendOutcome, SessionController, WalletSession};

#[derive(Debug, Parser)]
#[command(name = "wallet-session", version, about)]
struct Cli {
    /// JSON-RPC endpoint of an EIP-1193 proxy; overrides WALLET_SESSION_EIP1193_PROXY_URL
    #[arg(long, global = true)]
    proxy_url: Option<String>,

    /// development | production; overrides WALLET_SESSION_RUNTIME_PROFILE
    #[arg(long, global = true)]
    profile: Option<RuntimeProfile>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Probe the provider, sync silently and print the session
    Status,
    /// Ask the wallet for account access
    Connect,
    /// Send the fixed 0.001 ether transfer from the primary account
    Send {
        #[arg(long)]
        to: String,
        /// Request account access first if the wallet is not connected yet
        #[arg(long)]
        connect: bool,
    },
    /// Follow account and chain changes until interrupted
    Watch,
}

type Controller = SessionController<Eip1193Adapter>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = SessionAdapterConfig::from_env();
    if let Some(url) = cli.proxy_url {
        config.eip1193_proxy_url = Some(url);
    }
    if let Some(profile) = cli.profile {
        config.runtime_profile = profile;
    }
    let poll_interval = Duration::from_millis(config.event_poll_interval_ms);

    let adapter = Eip1193Adapter::with_config(config);
    tracing::info!(mode = adapter.mode_name(), "Starting wallet-session");
    let controller = SessionController::start(Arc::new(adapter.clone())).await;
    controller.flush().await;

    let result = run(&controller, &adapter, cli.command, poll_interval).await;
    controller.teardown();
    result
}

async fn run(
    controller: &Controller,
    adapter: &Eip1193Adapter,
    command: Command,
    poll_interval: Duration,
) -> eyre::Result<()> {
    match command {
        Command::Status => print_session(&controller.snapshot()),
        Command::Connect => {
            match controller.connect().await {
                ConnectOutcome::Connected(accounts) => {
                    tracing::info!(accounts = accounts.len(), "connected")
                }
                ConnectOutcome::Failed(message) => tracing::warn!(%message, "connect failed"),
                ConnectOutcome::AlreadyConnecting | ConnectOutcome::TornDown => {}
                ConnectOutcome::Unavailable => {
                    return Err(eyre!("no compatible wallet provider detected"))
                }
            }
            controller.flush().await;
            print_session(&controller.snapshot())
        }
        Command::Send { to, connect } => {
            if connect && !controller.snapshot().is_connected() {
                controller.connect().await;
                controller.flush().await;
            }
            if let SendOutcome::NoAccount = controller.send(&to).await {
                tracing::warn!("no connected account; run `connect` first or pass --connect");
            }
            print_session(&controller.snapshot())
        }
        Command::Watch => watch(controller, adapter, poll_interval).await,
    }
}

async fn watch(
    controller: &Controller,
    adapter: &Eip1193Adapter,
    poll_interval: Duration,
) -> eyre::Result<()> {
    let mut updates = controller.subscribe();
    let mut ticker = tokio::time::interval(poll_interval);
    print_session(&controller.snapshot())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                return Ok(());
            }
            _ = ticker.tick() => {
                if let Err(e) = adapter.poll_events().await {
                    tracing::warn!(error = %e, "event poll failed");
                }
            }
            changed = updates.changed() => {
                changed.wrap_err("session store closed")?;
                let snapshot = updates.borrow_and_update().clone();
                print_session(&snapshot)?;
            }
        }
    }
}

fn print_session(session: &WalletSession) -> eyre::Result<()> {
    let mut view = serde_json::to_value(session).wrap_err("serialize session")?;
    if let Some(obj) = view.as_object_mut() {
        obj.insert(
            "chain_id_decimal".to_owned(),
            serde_json::json!(session.chain_id_decimal()),
        );
        obj.insert(
            "last_tx_display".to_owned(),
            serde_json::json!(session.last_tx.to_string()),
        );
    }
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
