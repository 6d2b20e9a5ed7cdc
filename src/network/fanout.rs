//! Broadcast/Notification Fanout
//!
//! Pushes lobby snapshots and game updates onto connection queues.
//! Sends never wait: a connection whose queue is closed or full is skipped.

use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::game::registry::GameRegistry;
use crate::game::state::Game;
use crate::network::connection::{ConnectionId, ConnectionRegistry, ConnectionState};
use crate::network::protocol::ServerMessage;

/// Queue a message for one connection. Returns whether it was queued.
pub fn send_to(id: ConnectionId, conn: &ConnectionState, message: ServerMessage) -> bool {
    match conn.sender.try_send(message) {
        Ok(()) => true,
        Err(TrySendError::Closed(_)) => {
            debug!("Skipping closed connection {}", id);
            false
        }
        Err(TrySendError::Full(_)) => {
            debug!("Outbound queue full for {}, dropping message", id);
            false
        }
    }
}

/// Current lobby as a `games_list` message.
pub fn lobby_snapshot(games: &GameRegistry) -> ServerMessage {
    ServerMessage::GamesList {
        games: games.list_waiting(),
    }
}

/// Send the lobby to every open connection. Returns deliveries.
pub fn broadcast_lobby(connections: &ConnectionRegistry, games: &GameRegistry) -> usize {
    let snapshot = lobby_snapshot(games);
    connections
        .iter()
        .filter(|(id, conn)| send_to(**id, conn, snapshot.clone()))
        .count()
}

/// Send `message` to connections bound to the game's host or guest.
pub fn notify_participants(connections: &ConnectionRegistry, game: &Game, message: &ServerMessage) -> usize {
    connections
        .iter()
        .filter(|(_, conn)| conn.handle.as_ref().is_some_and(|h| game.is_participant(h)))
        .filter(|(id, conn)| send_to(**id, conn, message.clone()))
        .count()
}
