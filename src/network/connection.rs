//! Connection Registry
//!
//! Tracks live transport sessions: the handle bound to each one, the games
//! it created or joined, and the outbound queue used to reach it.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::debug;

use crate::game::state::{GameId, PlayerHandle};
use crate::network::protocol::ServerMessage;

/// Unique connection identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Fresh random id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form is enough to correlate log lines.
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}

/// Outbound message queue for one connection.
pub type Outbound = mpsc::Sender<ServerMessage>;

/// State attached to a live connection.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    /// Player handle, unset until `connect`.
    pub handle: Option<PlayerHandle>,
    /// Games this connection created or joined, in order.
    pub games: Vec<GameId>,
    /// Peer address.
    pub addr: SocketAddr,
    /// When the transport was accepted.
    pub connected_at: Instant,
    /// Queue drained by the connection's writer task.
    pub sender: Outbound,
}

impl ConnectionState {
    fn new(addr: SocketAddr, sender: Outbound) -> Self {
        Self {
            handle: None,
            games: Vec::new(),
            addr,
            connected_at: Instant::now(),
            sender,
        }
    }

    /// Whether this connection's bound handle is `handle`.
    pub fn is_bound_to(&self, handle: &PlayerHandle) -> bool {
        self.handle.as_ref() == Some(handle)
    }
}

/// All live connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: BTreeMap<ConnectionId, ConnectionState>,
}

impl ConnectionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly accepted connection.
    pub fn register(&mut self, id: ConnectionId, addr: SocketAddr, sender: Outbound) -> ConnectionState {
        let state = ConnectionState::new(addr, sender);
        self.connections.insert(id, state.clone());
        state
    }

    /// Bind (or re-bind) a player handle. Returns false for unknown ids.
    pub fn bind(&mut self, id: ConnectionId, handle: PlayerHandle) -> bool {
        match self.connections.get_mut(&id) {
            Some(conn) => {
                if let Some(previous) = conn.handle.replace(handle) {
                    debug!("Connection {} re-bound from {}", id, previous);
                }
                true
            }
            None => false,
        }
    }

    /// Note that a connection created or joined a game.
    pub fn record_game(&mut self, id: ConnectionId, game: GameId) {
        if let Some(conn) = self.connections.get_mut(&id) {
            if !conn.games.contains(&game) {
                conn.games.push(game);
            }
        }
    }

    /// Look up a connection.
    pub fn lookup(&self, id: ConnectionId) -> Option<&ConnectionState> {
        self.connections.get(&id)
    }

    /// Bound handle of a connection, if any.
    pub fn handle_of(&self, id: ConnectionId) -> Option<&PlayerHandle> {
        self.connections.get(&id).and_then(|c| c.handle.as_ref())
    }

    /// Stop tracking a connection. Returns its state the first time only.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<ConnectionState> {
        self.connections.remove(&id)
    }

    /// Iterate all connections.
    pub fn iter(&self) -> impl Iterator<Item = (&ConnectionId, &ConnectionState)> {
        self.connections.iter()
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// No live connections.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
