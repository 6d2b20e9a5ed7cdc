//! Game State Definitions
//!
//! The coin-flip game entity and its value types. `Game` only changes
//! through the transition methods below, which keep these invariants:
//!
//! - `guest` is set if and only if status is not `Waiting`
//! - `result` is set if and only if status is `Finished`
//! - each player's choice is recorded at most once

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::clock::Millis;
use crate::game::resolve::{Resolution, Seat};

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Opaque player handle (the client's wallet string).
///
/// Never verified; two connections presenting the same string are the
/// same player as far as games are concerned.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerHandle(String);

impl PlayerHandle {
    /// Wrap a raw handle.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Borrow the raw handle.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Game identifier.
///
/// Ordered by creation, so a `BTreeMap<GameId, _>` iterates in insertion
/// order. On the wire it is a decimal string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GameId(u64);

impl GameId {
    /// Create from a raw value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GameId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl Serialize for GameId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GameId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// VALUE TYPES
// =============================================================================

/// A side of the coin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoinSide {
    /// Heads.
    Heads,
    /// Tails.
    Tails,
}

impl CoinSide {
    /// The other side.
    pub fn opposite(self) -> Self {
        match self {
            CoinSide::Heads => CoinSide::Tails,
            CoinSide::Tails => CoinSide::Heads,
        }
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            CoinSide::Heads => "heads",
            CoinSide::Tails => "tails",
        }
    }
}

impl fmt::Display for CoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CoinSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "heads" => Ok(CoinSide::Heads),
            "tails" => Ok(CoinSide::Tails),
            other => Err(format!("invalid choice '{}', expected heads or tails", other)),
        }
    }
}

/// Game lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    /// Listed in the lobby, waiting for a guest.
    Waiting,
    /// Both seats taken, collecting choices.
    Playing,
    /// Resolved; kept briefly so participants can see the result.
    Finished,
}

/// Outcome of a resolved game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    /// Side the coin landed on.
    pub coin_flip: CoinSide,
    /// Winning player, `None` on a draw.
    pub winner: Option<PlayerHandle>,
    /// Both players guessed right, or both guessed wrong.
    pub is_draw: bool,
}

/// What happened to a submitted choice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChoiceRecord {
    /// Stored; the caller should check `both_chosen`.
    Recorded,
    /// The player had already chosen; nothing changed.
    AlreadyChosen,
    /// The submitter is neither host nor guest; nothing changed.
    NotParticipant,
}

// =============================================================================
// GAME
// =============================================================================

/// A two-player coin-flip contest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    id: GameId,
    host: PlayerHandle,
    host_bet: f64,
    guest: Option<PlayerHandle>,
    status: GameStatus,
    host_choice: Option<CoinSide>,
    guest_choice: Option<CoinSide>,
    result: Option<GameResult>,
    timestamp: Millis,
}

impl Game {
    /// Create a waiting game. Stake validation is the registry's job.
    pub fn new(id: GameId, host: PlayerHandle, host_bet: f64, timestamp: Millis) -> Self {
        Self {
            id,
            host,
            host_bet,
            guest: None,
            status: GameStatus::Waiting,
            host_choice: None,
            guest_choice: None,
            result: None,
            timestamp,
        }
    }

    /// Game identifier.
    pub fn id(&self) -> GameId {
        self.id
    }

    /// Host handle.
    pub fn host(&self) -> &PlayerHandle {
        &self.host
    }

    /// Host stake.
    pub fn host_bet(&self) -> f64 {
        self.host_bet
    }

    /// Guest handle, once joined.
    pub fn guest(&self) -> Option<&PlayerHandle> {
        self.guest.as_ref()
    }

    /// Current status.
    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// Host's recorded choice.
    pub fn host_choice(&self) -> Option<CoinSide> {
        self.host_choice
    }

    /// Guest's recorded choice.
    pub fn guest_choice(&self) -> Option<CoinSide> {
        self.guest_choice
    }

    /// Result, once finished.
    pub fn result(&self) -> Option<&GameResult> {
        self.result.as_ref()
    }

    /// Creation time (Unix millis). Never refreshed.
    pub fn timestamp(&self) -> Millis {
        self.timestamp
    }

    /// Milliseconds since creation.
    pub fn age(&self, now: Millis) -> Millis {
        now.saturating_sub(self.timestamp)
    }

    /// Whether `handle` is host or guest.
    pub fn is_participant(&self, handle: &PlayerHandle) -> bool {
        &self.host == handle || self.guest.as_ref() == Some(handle)
    }

    /// Both choices are present.
    pub fn both_chosen(&self) -> bool {
        self.host_choice.is_some() && self.guest_choice.is_some()
    }

    /// `waiting -> playing`. Returns false if the game was not waiting.
    pub(crate) fn seat_guest(&mut self, guest: PlayerHandle) -> bool {
        if self.status != GameStatus::Waiting {
            return false;
        }
        self.guest = Some(guest);
        self.status = GameStatus::Playing;
        true
    }

    /// Record a player's choice. Only the first choice per player sticks.
    pub(crate) fn record_choice(&mut self, player: &PlayerHandle, choice: CoinSide) -> ChoiceRecord {
        let slot = if &self.host == player {
            &mut self.host_choice
        } else if self.guest.as_ref() == Some(player) {
            &mut self.guest_choice
        } else {
            return ChoiceRecord::NotParticipant;
        };

        if slot.is_some() {
            return ChoiceRecord::AlreadyChosen;
        }
        *slot = Some(choice);
        ChoiceRecord::Recorded
    }

    /// `playing -> finished`, applied as a single check-and-set.
    ///
    /// Returns false without touching the game unless it is playing with
    /// both choices in, so a second trigger can never resolve twice.
    pub(crate) fn finish(&mut self, resolution: Resolution) -> bool {
        if self.status != GameStatus::Playing || !self.both_chosen() {
            return false;
        }

        let winner = match resolution.winner {
            Some(Seat::Host) => Some(self.host.clone()),
            Some(Seat::Guest) => self.guest.clone(),
            None => None,
        };

        self.result = Some(GameResult {
            coin_flip: resolution.outcome,
            is_draw: winner.is_none(),
            winner,
        });
        self.status = GameStatus::Finished;
        true
    }

    /// Check the structural invariants listed in the module docs.
    pub fn is_consistent(&self) -> bool {
        let guest_ok = self.guest.is_some() == (self.status != GameStatus::Waiting);
        let result_ok = self.result.is_some() == (self.status == GameStatus::Finished);
        let choices_ok = self.guest.is_some() || self.guest_choice.is_none();
        let draw_ok = self
            .result
            .as_ref()
            .map_or(true, |r| r.is_draw == r.winner.is_none());
        guest_ok && result_ok && choices_ok && draw_ok
    }
}

// =============================================================================
// TESTS
// =============================================================================
