//! WebSocket Game Server
//!
//! Async WebSocket server for the coin-flip lobby.
//! Accepts connections, feeds their frames to the router and drains
//! their outbound queues. The expiry scheduler runs alongside.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::game::registry::GameRegistry;
use crate::network::connection::{ConnectionId, ConnectionRegistry};
use crate::network::expiry::{ExpiryConfig, ExpiryScheduler};
use crate::network::protocol::{ErrorCode, ServerMessage};
use crate::network::router::{Router, SharedConnections, SharedGames};

/// Environment variable holding the full listen address.
pub const BIND_ADDR_ENV: &str = "COINFLIP_BIND_ADDR";

/// Environment variable holding just the port (binds on all interfaces).
pub const PORT_ENV: &str = "COINFLIP_PORT";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Per-connection outbound queue depth.
    pub outbound_buffer: usize,
    /// Period between TTL sweeps.
    pub sweep_interval: Duration,
    /// Age after which the sweep removes a game.
    pub game_ttl: Duration,
    /// How long a finished game stays before removal.
    pub finished_removal_delay: Duration,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], crate::DEFAULT_PORT)),
            max_connections: 1000,
            outbound_buffer: 256,
            sweep_interval: Duration::from_secs(crate::SWEEP_INTERVAL_SECS),
            game_ttl: Duration::from_secs(crate::GAME_TTL_SECS),
            finished_removal_delay: Duration::from_secs(crate::RESULT_DISPLAY_SECS),
            version: crate::VERSION.to_string(),
        }
    }
}

impl ServerConfig {
    /// Defaults, with the listen endpoint taken from the environment.
    ///
    /// `COINFLIP_BIND_ADDR` wins over `COINFLIP_PORT`.
    pub fn from_env() -> Result<Self, GameServerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GameServerError> {
        let mut config = Self::default();

        if let Some(addr) = lookup(BIND_ADDR_ENV) {
            config.bind_addr = addr
                .parse()
                .map_err(|e| GameServerError::Config(format!("{}={}: {}", BIND_ADDR_ENV, addr, e)))?;
        } else if let Some(port) = lookup(PORT_ENV) {
            let port: u16 = port
                .parse()
                .map_err(|e| GameServerError::Config(format!("{}={}: {}", PORT_ENV, port, e)))?;
            config.bind_addr.set_port(port);
        }

        Ok(config)
    }

    fn expiry(&self) -> ExpiryConfig {
        ExpiryConfig {
            sweep_interval: self.sweep_interval,
            game_ttl: self.game_ttl,
            removal_delay: self.finished_removal_delay,
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// All games.
    games: SharedGames,
    /// Connected clients.
    connections: SharedConnections,
    /// Inbound dispatch.
    router: Router,
    /// TTL sweep and finished-game removal.
    expiry: ExpiryScheduler,
    /// Shutdown signal. A watch so late subscribers still see it.
    shutdown_tx: watch::Sender<bool>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry(config, GameRegistry::new())
    }

    /// Create a server around an existing game registry.
    pub fn with_registry(config: ServerConfig, registry: GameRegistry) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let games: SharedGames = Arc::new(RwLock::new(registry));
        let connections: SharedConnections = Arc::new(RwLock::new(ConnectionRegistry::new()));
        let expiry = ExpiryScheduler::new(games.clone(), connections.clone(), config.expiry());
        let router = Router::new(games.clone(), connections.clone(), expiry.clone());

        Self {
            config,
            games,
            connections,
            router,
            expiry,
            shutdown_tx,
        }
    }

    /// Bind the configured address and run until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run on an already-bound listener until shutdown.
    #[instrument(skip(self, listener))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Coin flip server v{} listening on {}", self.config.version, listener.local_addr()?);

        let sweep_handle = tokio::spawn(self.expiry.clone().run());
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        while !*shutdown_rx.borrow() {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.connections.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("Shutdown signal received");
                }
            }
        }

        sweep_handle.abort();
        self.expiry.cancel_all().await;

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let connections = self.connections.clone();
        let router = self.router.clone();
        let buffer = self.config.outbound_buffer;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(buffer);

            let conn_id = ConnectionId::new();
            connections.write().await.register(conn_id, addr, msg_tx);
            debug!("Connection {} registered for {}", conn_id, addr);

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                router.handle_text(conn_id, &text).await;
                            }
                            Some(Ok(Message::Binary(data))) => {
                                match String::from_utf8(data) {
                                    Ok(text) => router.handle_text(conn_id, &text).await,
                                    Err(_) => {
                                        let conns = connections.read().await;
                                        if let Some(state) = conns.lookup(conn_id) {
                                            crate::network::fanout::send_to(
                                                conn_id,
                                                state,
                                                ServerMessage::error(ErrorCode::InvalidInput, "Binary frames must be UTF-8 JSON"),
                                            );
                                        }
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        break;
                    }
                }
            }

            // Cleanup
            sender_task.abort();
            let removed = router.on_disconnect(conn_id).await;
            info!("Client {} cleaned up ({} waiting games removed)", addr, removed);
        });
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Get live game count.
    pub async fn game_count(&self) -> usize {
        self.games.read().await.len()
    }
}
