//! # Coin Flip Lobby Server
//!
//! Real-time matchmaking and session server for two-player coin-flip games.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    COINFLIP SERVER                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Pure primitives                         │
//! │  ├── rng.rs        - Xorshift128+ coin RNG                   │
//! │  └── clock.rs      - Unix millis, monotonic game ids         │
//! │                                                              │
//! │  game/             - Lifecycle state machine (no I/O)        │
//! │  ├── state.rs      - Game entity and value types             │
//! │  ├── resolve.rs    - Coin flip and winner determination      │
//! │  └── registry.rs   - Game ownership and transitions          │
//! │                                                              │
//! │  network/          - Transport-facing                        │
//! │  ├── protocol.rs   - Message types                           │
//! │  ├── connection.rs - Connection registry                     │
//! │  ├── router.rs     - Envelope validation and dispatch        │
//! │  ├── fanout.rs     - Lobby broadcast, participant notify     │
//! │  ├── expiry.rs     - TTL sweep, finished-game removal        │
//! │  └── server.rs     - WebSocket server                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! The game registry and the connection registry each sit behind one
//! `RwLock`. Every handler takes the game lock, then the connection lock,
//! and keeps both until it is done, so each operation is a single atomic
//! step and a game can only be resolved once.
//!
//! All state is in memory and lost on restart.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use crate::core::rng::CoinRng;
pub use crate::game::registry::{ChoiceOutcome, GameError, GameRegistry};
pub use crate::game::state::{CoinSide, Game, GameId, GameResult, GameStatus, PlayerHandle};
pub use crate::network::server::{GameServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;

/// Seconds between TTL sweeps.
pub const SWEEP_INTERVAL_SECS: u64 = 60;

/// Game age (seconds) after which the sweep removes it.
pub const GAME_TTL_SECS: u64 = 300;

/// Seconds a finished game stays visible before removal.
pub const RESULT_DISPLAY_SECS: u64 = 5;
