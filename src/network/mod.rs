//! Network Layer
//!
//! WebSocket server, wire protocol, connection tracking, routing, fanout
//! and timed cleanup. All game rules live in `game/`.

pub mod connection;
pub mod expiry;
pub mod fanout;
pub mod protocol;
pub mod router;
pub mod server;

pub use connection::{ConnectionId, ConnectionRegistry, ConnectionState};
pub use expiry::{ExpiryConfig, ExpiryScheduler};
pub use protocol::{ClientMessage, ErrorCode, ServerMessage};
pub use router::{Router, RouterError, SharedConnections, SharedGames};
pub use server::{GameServer, GameServerError, ServerConfig};
