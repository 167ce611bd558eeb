//! CTF Arena Server
//!
//! Loads the game parameters and map, then runs the tick driver until
//! Ctrl-C.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use ctf_arena::{
    network::server::{load_world, GameServer, ServerConfig},
    VERSION,
};

/// Authoritative capture-the-flag arena server.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Address to listen on
    #[clap(short, long, default_value = "0.0.0.0:8080")]
    bind: SocketAddr,
    /// Game parameters JSON, defaults when absent
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Binary map file, built-in arena when absent
    #[clap(short, long)]
    map: Option<PathBuf>,
    /// Write the game parameters for clients to this path and continue
    #[clap(long)]
    write_shared: Option<PathBuf>,
    /// World RNG seed
    #[clap(long)]
    seed: Option<u64>,
    /// Log filter used when RUST_LOG is unset
    #[clap(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    info!("CTF Arena Server v{}", VERSION);

    let server_config = ServerConfig {
        bind_addr: args.bind,
        seed: args.seed,
        ..Default::default()
    };
    let world = load_world(args.config.as_deref(), args.map.as_deref(), server_config.world_seed())
        .context("failed to load world")?;

    if let Some(path) = &args.write_shared {
        world
            .config
            .write_shared(path)
            .with_context(|| format!("failed to write shared config to {}", path.display()))?;
        info!("Shared config written to {}", path.display());
    }

    let server = Arc::new(
        GameServer::bind(server_config)
            .await
            .with_context(|| format!("failed to bind {}", args.bind))?,
    );

    // Handle shutdown gracefully
    {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl-C received, shutting down");
                    server.shutdown();
                }
                Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
            }
        });
    }

    server.run(world).await.context("server stopped")?;
    info!("Server stopped");
    Ok(())
}
