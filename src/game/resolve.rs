//! Resolution Engine
//!
//! Flips the coin and decides the winner once both players have chosen.
//! Stateless apart from the randomness it consumes; running it at most once
//! per game is enforced by `Game::finish`.

use crate::core::rng::CoinRng;
use crate::game::state::CoinSide;

/// Source of coin outcomes.
pub trait CoinSource: Send + Sync {
    /// Flip once.
    fn flip(&mut self) -> CoinSide;
}

impl CoinSource for CoinRng {
    fn flip(&mut self) -> CoinSide {
        if self.next_fair_bool() {
            CoinSide::Heads
        } else {
            CoinSide::Tails
        }
    }
}

/// A coin that always lands on the same side.
#[derive(Clone, Copy, Debug)]
pub struct FixedCoin(pub CoinSide);

impl CoinSource for FixedCoin {
    fn flip(&mut self) -> CoinSide {
        self.0
    }
}

/// Seat in a two-player game.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Seat {
    /// Game creator.
    Host,
    /// Player who joined.
    Guest,
}

/// Coin outcome plus winning seat (`None` on a draw).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// Side the coin landed on.
    pub outcome: CoinSide,
    /// Winning seat.
    pub winner: Option<Seat>,
}

/// Winner for a known outcome.
///
/// A seat wins only if it matched and the other seat did not; both-right
/// and both-wrong are draws.
pub fn determine_winner(host_choice: CoinSide, guest_choice: CoinSide, outcome: CoinSide) -> Option<Seat> {
    let host_won = host_choice == outcome;
    let guest_won = guest_choice == outcome;

    match (host_won, guest_won) {
        (true, false) => Some(Seat::Host),
        (false, true) => Some(Seat::Guest),
        _ => None,
    }
}

/// Flip the coin and resolve.
pub fn resolve<C: CoinSource + ?Sized>(host_choice: CoinSide, guest_choice: CoinSide, coin: &mut C) -> Resolution {
    let outcome = coin.flip();
    Resolution {
        outcome,
        winner: determine_winner(host_choice, guest_choice, outcome),
    }
}
