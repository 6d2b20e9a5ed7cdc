//! Coin Flip Lobby Server
//!
//! Serves the lobby over WebSocket until Ctrl-C.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use coinflip::{
    GameServer, ServerConfig, GAME_TTL_SECS, RESULT_DISPLAY_SECS, SWEEP_INTERVAL_SECS, VERSION,
};

#[cfg(feature = "debug-tracing")]
const DEFAULT_FILTER: &str = "debug";
#[cfg(not(feature = "debug-tracing"))]
const DEFAULT_FILTER: &str = "info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Coin Flip Server v{}", VERSION);
    info!(
        "Sweep every {}s, game TTL {}s, results shown for {}s",
        SWEEP_INTERVAL_SECS, GAME_TTL_SECS, RESULT_DISPLAY_SECS
    );

    let config = ServerConfig::from_env()?;
    let server = Arc::new(GameServer::new(config));

    let signal_server = server.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => signal_server.shutdown(),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    server.run().await?;
    info!("Server stopped");
    Ok(())
}
