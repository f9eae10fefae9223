use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::warn;

use hostpulse::config::Config;
use hostpulse::server::AppState;
use hostpulse::source::{QuicStatusSource, StatusSource};
use hostpulse::{feed, server, BroadcastHub, TransportClient};

#[derive(Debug, Parser)]
#[command(name = "hostpulse", about = "Real-time host health feed")]
struct Cli {
    /// Path to the JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listen host from the config file.
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port from the config file.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Diagnostics are configured exactly once, here; nothing mutates logging
    // state afterwards.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    let bind_addr = config.bind_addr()?;

    let transport = TransportClient::new(config.transport_options())
        .context("building transport client")?;

    // Best effort: the feed task and inline reconnects keep trying if the
    // backend is not up yet.
    if let Err(e) = transport.connect().await {
        warn!("backend not reachable at startup: {e}");
    }

    let hub = BroadcastHub::spawn(config.hub_config());
    let source: Arc<dyn StatusSource> = Arc::new(QuicStatusSource::new(transport.clone()));
    let _feed = feed::spawn(transport.clone(), source.clone(), hub.clone());

    let state = AppState::new(hub, source, transport);
    server::serve(state, bind_addr).await.context("server error")?;
    Ok(())
}
