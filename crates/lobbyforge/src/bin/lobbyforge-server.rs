//! Lobby server binary.
//!
//! Loads an optional JSON config, binds, and serves until Ctrl-C.

use std::path::PathBuf;

use clap::Parser;
use lobbyforge::{init_tracing, LobbyConfig, LobbyServer};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Lobbyforge lobby server", long_about = None)]
struct Args {
    /// JSON config file. Built-in defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `bind_addr` from the config
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    init_tracing()?;

    let mut config = match &args.config {
        Some(path) => LobbyConfig::load(path)?,
        None => LobbyConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    let server = LobbyServer::builder().config(config).build().await?;
    let handle = server.handle();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("ctrl-c received");
        handle.shutdown();
    });

    server.run().await?;
    Ok(())
}
