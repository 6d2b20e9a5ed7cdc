//! Game Logic Module
//!
//! The coin-flip lifecycle. No I/O happens here.
//!
//! ## Module Structure
//!
//! - `state`: Game entity and value types
//! - `resolve`: Coin flip and winner determination
//! - `registry`: Game ownership and state transitions

pub mod registry;
pub mod resolve;
pub mod state;

// Re-export key types
pub use registry::{ChoiceOutcome, GameError, GameRegistry};
pub use resolve::{CoinSource, FixedCoin, Resolution, Seat};
pub use state::{CoinSide, Game, GameId, GameResult, GameStatus, PlayerHandle};
