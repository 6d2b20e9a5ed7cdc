//! Message Router
//!
//! Validates inbound envelopes and dispatches them against the game and
//! connection registries. Each handler takes the game registry lock and
//! then the connection registry lock, and holds both until it has
//! finished mutating and fanning out, so a handler is one atomic step.
//!
//! Errors go back to the originating connection only.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::core::clock::now_millis;
use crate::game::registry::{ChoiceOutcome, GameError, GameRegistry};
use crate::game::state::{CoinSide, PlayerHandle};
use crate::network::connection::{ConnectionId, ConnectionRegistry};
use crate::network::expiry::ExpiryScheduler;
use crate::network::fanout::{broadcast_lobby, lobby_snapshot, notify_participants, send_to};
use crate::network::protocol::{ClientMessage, ErrorCode, ServerMessage};

/// Game registry shared between router, scheduler and server.
pub type SharedGames = Arc<RwLock<GameRegistry>>;

/// Connection registry shared between router, scheduler and server.
pub type SharedConnections = Arc<RwLock<ConnectionRegistry>>;

/// Errors reported back to a client.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouterError {
    /// Game registry rejected the request.
    #[error(transparent)]
    Game(#[from] GameError),

    /// Game action before a handle was bound.
    #[error("Not connected: send a connect message first")]
    NotConnected,

    /// Envelope or payload could not be understood.
    #[error("Invalid message: {0}")]
    Malformed(String),
}

impl RouterError {
    /// Wire error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            RouterError::Game(GameError::NotFound) => ErrorCode::NotFound,
            RouterError::Game(GameError::InvalidState(_)) => ErrorCode::InvalidState,
            RouterError::Game(GameError::InvalidInput(_)) => ErrorCode::InvalidInput,
            RouterError::Game(GameError::SelfJoin) => ErrorCode::SelfJoin,
            RouterError::NotConnected => ErrorCode::NotConnected,
            RouterError::Malformed(_) => ErrorCode::InvalidInput,
        }
    }

    /// Error envelope for the client.
    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::error(self.code(), self.to_string())
    }
}

/// Parse a text frame.
///
/// Returns `Ok(None)` for a well-formed envelope whose `type` is not one
/// the server handles; those are logged and dropped.
pub fn parse_envelope(text: &str) -> Result<Option<ClientMessage>, RouterError> {
    let value: Value = serde_json::from_str(text).map_err(|e| RouterError::Malformed(e.to_string()))?;

    let kind = match value.as_object().and_then(|o| o.get("type")) {
        Some(Value::String(kind)) => kind.clone(),
        Some(_) => return Err(RouterError::Malformed("`type` must be a string".into())),
        None => return Err(RouterError::Malformed("expected an object with a `type` field".into())),
    };

    if !ClientMessage::is_known_type(&kind) {
        warn!("Unknown message type: {}", kind);
        return Ok(None);
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| RouterError::Malformed(format!("{}: {}", kind, e)))
}

/// Dispatches client messages.
#[derive(Clone)]
pub struct Router {
    games: SharedGames,
    connections: SharedConnections,
    expiry: ExpiryScheduler,
}

impl Router {
    /// Create a router over the shared registries.
    pub fn new(games: SharedGames, connections: SharedConnections, expiry: ExpiryScheduler) -> Self {
        Self {
            games,
            connections,
            expiry,
        }
    }

    /// Handle one text frame from `conn`. Never fails outward.
    pub async fn handle_text(&self, conn: ConnectionId, text: &str) {
        let result = match parse_envelope(text) {
            Ok(Some(msg)) => self.handle(conn, msg).await,
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            debug!("Rejected message from {}: {}", conn, e);
            self.reply_error(conn, &e).await;
        }
    }

    /// Dispatch a parsed message.
    pub async fn handle(&self, conn: ConnectionId, msg: ClientMessage) -> Result<(), RouterError> {
        debug!("{} -> {}", conn, msg.kind());
        match msg {
            ClientMessage::Connect { wallet } => self.handle_connect(conn, wallet).await,
            ClientMessage::CreateGame { bet } => self.handle_create_game(conn, bet).await,
            ClientMessage::JoinGame { game_id } => self.handle_join_game(conn, &game_id).await,
            ClientMessage::MakeChoice { game_id, choice } => {
                self.handle_make_choice(conn, &game_id, choice).await
            }
            ClientMessage::CancelGame { game_id } => self.handle_cancel_game(conn, &game_id).await,
            ClientMessage::GetGames => self.handle_get_games(conn).await,
        }
    }

    async fn handle_connect(&self, conn: ConnectionId, wallet: String) -> Result<(), RouterError> {
        if wallet.trim().is_empty() {
            return Err(GameError::InvalidInput("wallet must not be empty".into()).into());
        }

        let games = self.games.read().await;
        let mut conns = self.connections.write().await;

        if !conns.bind(conn, PlayerHandle::new(wallet.clone())) {
            return Ok(());
        }
        info!("Connection {} bound to wallet {}", conn, wallet);

        if let Some(state) = conns.lookup(conn) {
            send_to(conn, state, ServerMessage::Connected { wallet });
            send_to(conn, state, lobby_snapshot(&games));
        }
        Ok(())
    }

    async fn handle_create_game(&self, conn: ConnectionId, bet: f64) -> Result<(), RouterError> {
        let mut games = self.games.write().await;
        let mut conns = self.connections.write().await;

        let host = conns.handle_of(conn).cloned().ok_or(RouterError::NotConnected)?;
        let game = games.create(host, bet, now_millis())?;
        conns.record_game(conn, game.id());

        if let Some(state) = conns.lookup(conn) {
            send_to(conn, state, ServerMessage::GameCreated { game });
        }
        broadcast_lobby(&conns, &games);
        Ok(())
    }

    async fn handle_join_game(&self, conn: ConnectionId, game_id: &str) -> Result<(), RouterError> {
        let mut games = self.games.write().await;
        let mut conns = self.connections.write().await;

        let guest = conns.handle_of(conn).cloned().ok_or(RouterError::NotConnected)?;
        let id = GameRegistry::parse_id(game_id)?;
        let game = games.join(id, guest)?;
        conns.record_game(conn, id);

        notify_participants(&conns, &game, &ServerMessage::GameStarted { game: game.clone() });
        broadcast_lobby(&conns, &games);
        Ok(())
    }

    async fn handle_make_choice(
        &self,
        conn: ConnectionId,
        game_id: &str,
        choice: CoinSide,
    ) -> Result<(), RouterError> {
        let mut games = self.games.write().await;
        let conns = self.connections.read().await;

        let player = conns.handle_of(conn).cloned().ok_or(RouterError::NotConnected)?;
        let id = GameRegistry::parse_id(game_id)?;
        let outcome = games.submit_choice(id, &player, choice)?;

        let Some(game) = outcome.game() else {
            return Ok(());
        };
        notify_participants(&conns, game, &ServerMessage::OpponentChose { game_id: id });

        if let ChoiceOutcome::Resolved(game) = &outcome {
            notify_participants(&conns, game, &ServerMessage::GameResult { game: game.clone() });
            self.expiry.schedule_removal(id).await;
        }
        Ok(())
    }

    async fn handle_cancel_game(&self, conn: ConnectionId, game_id: &str) -> Result<(), RouterError> {
        let mut games = self.games.write().await;
        let conns = self.connections.read().await;

        let requester = conns.handle_of(conn).cloned().ok_or(RouterError::NotConnected)?;
        let Ok(id) = GameRegistry::parse_id(game_id) else {
            return Ok(());
        };

        if games.cancel(id, &requester).is_some() {
            broadcast_lobby(&conns, &games);
        }
        Ok(())
    }

    async fn handle_get_games(&self, conn: ConnectionId) -> Result<(), RouterError> {
        let games = self.games.read().await;
        let conns = self.connections.read().await;

        if let Some(state) = conns.lookup(conn) {
            send_to(conn, state, lobby_snapshot(&games));
        }
        Ok(())
    }

    /// Release a closed connection and drop the waiting games it hosted.
    ///
    /// Safe to call more than once; only the first call does anything.
    /// Returns how many games were removed.
    pub async fn on_disconnect(&self, conn: ConnectionId) -> usize {
        let mut games = self.games.write().await;
        let mut conns = self.connections.write().await;

        let Some(state) = conns.unregister(conn) else {
            return 0;
        };
        info!("Connection {} ({}) released", conn, state.addr);

        let removed = games.on_disconnect(state.handle.as_ref(), &state.games);
        if !removed.is_empty() {
            broadcast_lobby(&conns, &games);
        }
        removed.len()
    }

    async fn reply_error(&self, conn: ConnectionId, error: &RouterError) {
        let conns = self.connections.read().await;
        if let Some(state) = conns.lookup(conn) {
            send_to(conn, state, error.to_message());
        }
    }
}
