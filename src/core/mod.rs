//! Core primitives.
//!
//! Pure helpers with no networking: randomness for the coin and
//! time/id allocation for games.

pub mod clock;
pub mod rng;

// Re-export core types
pub use clock::{now_millis, Millis, MonotonicIds};
pub use rng::CoinRng;
