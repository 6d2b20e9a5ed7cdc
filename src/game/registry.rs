//! Game Registry
//!
//! Owns every game and enforces the lifecycle:
//!
//! ```text
//! waiting  --join(guest)-------------------> playing
//! waiting  --cancel(host) / host disconnect-> removed
//! playing  --both choices submitted--------> finished
//! finished --removal delay elapses---------> removed
//! any      --age > TTL (sweep)-------------> removed
//! ```
//!
//! All operations are synchronous and in-memory. Callers serialize access
//! (the server keeps the registry behind a single lock), so each operation
//! is one atomic read-modify-write.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, info};

use crate::core::clock::{Millis, MonotonicIds};
use crate::core::rng::CoinRng;
use crate::game::resolve::{resolve, CoinSource};
use crate::game::state::{ChoiceRecord, CoinSide, Game, GameId, GameStatus, PlayerHandle};

/// Game registry errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    /// No game with that id.
    #[error("Game not found")]
    NotFound,

    /// Operation not valid for the game's current status.
    #[error("{0}")]
    InvalidState(&'static str),

    /// Malformed field value.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Host tried to join their own game.
    #[error("Cannot join your own game")]
    SelfJoin,
}

/// Result of `submit_choice`.
#[derive(Debug, Clone, PartialEq)]
pub enum ChoiceOutcome {
    /// Duplicate or non-participant submission; nothing changed.
    Ignored,
    /// Choice stored, still waiting on the other player.
    Recorded(Game),
    /// Choice stored and the game resolved.
    Resolved(Game),
}

impl ChoiceOutcome {
    /// Whether this submission resolved the game.
    pub fn resolved(&self) -> bool {
        matches!(self, ChoiceOutcome::Resolved(_))
    }

    /// Game snapshot after the change, if anything changed.
    pub fn game(&self) -> Option<&Game> {
        match self {
            ChoiceOutcome::Ignored => None,
            ChoiceOutcome::Recorded(game) | ChoiceOutcome::Resolved(game) => Some(game),
        }
    }
}

/// All live games, keyed (and therefore ordered) by creation.
pub struct GameRegistry {
    games: BTreeMap<GameId, Game>,
    ids: MonotonicIds,
    coin: Box<dyn CoinSource>,
}

impl GameRegistry {
    /// Registry flipping with an entropy-seeded RNG.
    pub fn new() -> Self {
        Self::with_coin(CoinRng::from_entropy())
    }

    /// Registry flipping with the given coin source.
    pub fn with_coin(coin: impl CoinSource + 'static) -> Self {
        Self {
            games: BTreeMap::new(),
            ids: MonotonicIds::new(),
            coin: Box::new(coin),
        }
    }

    /// Parse a wire id. Anything unparseable cannot name a game.
    pub fn parse_id(raw: &str) -> Result<GameId, GameError> {
        raw.parse().map_err(|_| GameError::NotFound)
    }

    /// Create a waiting game hosted by `host`.
    pub fn create(&mut self, host: PlayerHandle, stake: f64, now: Millis) -> Result<Game, GameError> {
        if !stake.is_finite() || stake <= 0.0 {
            return Err(GameError::InvalidInput(format!(
                "bet must be a positive number, got {}",
                stake
            )));
        }

        let id = GameId::new(self.ids.next(now));
        let game = Game::new(id, host, stake, now);
        self.games.insert(id, game.clone());

        info!("Game {} created by {} (bet {})", id, game.host(), stake);
        Ok(game)
    }

    /// Seat `guest` in a waiting game.
    pub fn join(&mut self, id: GameId, guest: PlayerHandle) -> Result<Game, GameError> {
        let game = self.games.get_mut(&id).ok_or(GameError::NotFound)?;

        if game.status() != GameStatus::Waiting {
            return Err(GameError::InvalidState("Game already started"));
        }
        if game.host() == &guest {
            return Err(GameError::SelfJoin);
        }

        info!("{} joined game {}", guest, id);
        game.seat_guest(guest);
        Ok(game.clone())
    }

    /// Record a choice and resolve once both are in.
    ///
    /// Duplicate submissions and submissions from non-participants are
    /// ignored. Resolution is a single check-and-transition on the game,
    /// so it fires at most once.
    pub fn submit_choice(
        &mut self,
        id: GameId,
        player: &PlayerHandle,
        choice: CoinSide,
    ) -> Result<ChoiceOutcome, GameError> {
        let game = self.games.get_mut(&id).ok_or(GameError::NotFound)?;

        if game.status() == GameStatus::Waiting {
            return Err(GameError::InvalidState("Game has not started"));
        }

        match game.record_choice(player, choice) {
            ChoiceRecord::Recorded => {}
            ChoiceRecord::AlreadyChosen | ChoiceRecord::NotParticipant => {
                debug!("Ignoring choice from {} on game {}", player, id);
                return Ok(ChoiceOutcome::Ignored);
            }
        }
        info!("{} chose {} in game {}", player, choice, id);

        let (host_choice, guest_choice) = match (game.host_choice(), game.guest_choice()) {
            (Some(h), Some(g)) => (h, g),
            _ => return Ok(ChoiceOutcome::Recorded(game.clone())),
        };

        let resolution = resolve(host_choice, guest_choice, self.coin.as_mut());
        if !game.finish(resolution) {
            return Ok(ChoiceOutcome::Recorded(game.clone()));
        }

        info!(
            "Game {} resolved: {}, winner: {}",
            id,
            resolution.outcome,
            game.result()
                .and_then(|r| r.winner.as_ref())
                .map_or("draw", |w| w.as_str())
        );
        Ok(ChoiceOutcome::Resolved(game.clone()))
    }

    /// Remove a waiting game at its host's request.
    ///
    /// Anything else (unknown id, non-host, started game) is a silent no-op.
    pub fn cancel(&mut self, id: GameId, requester: &PlayerHandle) -> Option<Game> {
        let game = self.games.get(&id)?;
        if game.host() != requester || game.status() != GameStatus::Waiting {
            debug!("Ignoring cancel of game {} by {}", id, requester);
            return None;
        }

        info!("Game {} cancelled by host", id);
        self.games.remove(&id)
    }

    /// Drop the waiting games a closed connection was hosting.
    ///
    /// Started and finished games are left to finish or expire.
    pub fn on_disconnect(&mut self, handle: Option<&PlayerHandle>, owned: &[GameId]) -> Vec<GameId> {
        let Some(handle) = handle else {
            return Vec::new();
        };

        let removed: Vec<GameId> = owned
            .iter()
            .copied()
            .filter(|id| {
                self.games.get(id).is_some_and(|g| {
                    g.host() == handle && g.status() == GameStatus::Waiting
                })
            })
            .collect();

        for id in &removed {
            self.games.remove(id);
            info!("Game {} removed, host {} disconnected", id, handle);
        }
        removed
    }

    /// Snapshot of waiting games in creation order.
    pub fn list_waiting(&self) -> Vec<Game> {
        self.games
            .values()
            .filter(|g| g.status() == GameStatus::Waiting)
            .cloned()
            .collect()
    }

    /// Remove every game older than `ttl_ms`, whatever its status.
    pub fn sweep(&mut self, now: Millis, ttl_ms: Millis) -> Vec<GameId> {
        let expired: Vec<GameId> = self
            .games
            .values()
            .filter(|g| g.age(now) > ttl_ms)
            .map(|g| g.id())
            .collect();

        for id in &expired {
            self.games.remove(id);
        }
        expired
    }

    /// Remove a finished game. No-op if it is gone or not finished.
    pub fn remove_finished(&mut self, id: GameId) -> Option<Game> {
        match self.games.get(&id) {
            Some(g) if g.status() == GameStatus::Finished => self.games.remove(&id),
            _ => None,
        }
    }

    /// Look up a game.
    pub fn get(&self, id: GameId) -> Option<&Game> {
        self.games.get(&id)
    }

    /// Iterate all games in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Game> {
        self.games.values()
    }

    /// Number of live games.
    pub fn len(&self) -> usize {
        self.games.len()
    }

    /// No live games.
    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GameRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameRegistry")
            .field("games", &self.games)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::resolve::FixedCoin;
    use proptest::prelude::*;
    use CoinSide::{Heads, Tails};

    fn handle(s: &str) -> PlayerHandle {
        PlayerHandle::new(s)
    }

    fn registry(outcome: CoinSide) -> GameRegistry {
        GameRegistry::with_coin(FixedCoin(outcome))
    }

    fn playing_game(reg: &mut GameRegistry) -> GameId {
        let game = reg.create(handle("A"), 1.0, 1_000).unwrap();
        reg.join(game.id(), handle("B")).unwrap();
        game.id()
    }

    #[test]
    fn test_create_validates_stake() {
        let mut reg = registry(Heads);
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                reg.create(handle("A"), bad, 0),
                Err(GameError::InvalidInput(_))
            ));
        }
        assert!(reg.is_empty());

        let game = reg.create(handle("A"), 0.5, 0).unwrap();
        assert_eq!(game.status(), GameStatus::Waiting);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_create_ids_unique_in_same_millisecond() {
        let mut reg = registry(Heads);
        let a = reg.create(handle("A"), 1.0, 5_000).unwrap();
        let b = reg.create(handle("B"), 1.0, 5_000).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_scenario_host_wins() {
        let mut reg = registry(Heads);
        let id = playing_game(&mut reg);
        assert_eq!(reg.get(id).unwrap().status(), GameStatus::Playing);

        let first = reg.submit_choice(id, &handle("A"), Heads).unwrap();
        assert!(!first.resolved());
        assert!(matches!(first, ChoiceOutcome::Recorded(_)));

        let second = reg.submit_choice(id, &handle("B"), Tails).unwrap();
        assert!(second.resolved());

        let game = reg.get(id).unwrap();
        assert_eq!(game.status(), GameStatus::Finished);
        let result = game.result().unwrap();
        assert_eq!(result.coin_flip, Heads);
        assert_eq!(result.winner, Some(handle("A")));
        assert!(!result.is_draw);
    }

    #[test]
    fn test_scenario_both_match_is_draw() {
        let mut reg = registry(Heads);
        let id = playing_game(&mut reg);

        reg.submit_choice(id, &handle("A"), Heads).unwrap();
        reg.submit_choice(id, &handle("B"), Heads).unwrap();

        let result = reg.get(id).unwrap().result().unwrap();
        assert_eq!(result.winner, None);
        assert!(result.is_draw);
    }

    #[test]
    fn test_both_wrong_is_draw() {
        let mut reg = registry(Tails);
        let id = playing_game(&mut reg);

        reg.submit_choice(id, &handle("A"), Heads).unwrap();
        reg.submit_choice(id, &handle("B"), Heads).unwrap();

        assert!(reg.get(id).unwrap().result().unwrap().is_draw);
    }

    #[test]
    fn test_duplicate_choice_is_ignored() {
        let mut reg = registry(Heads);
        let id = playing_game(&mut reg);

        reg.submit_choice(id, &handle("A"), Heads).unwrap();
        let again = reg.submit_choice(id, &handle("A"), Tails).unwrap();
        assert_eq!(again, ChoiceOutcome::Ignored);
        assert_eq!(reg.get(id).unwrap().host_choice(), Some(Heads));
    }

    #[test]
    fn test_resolution_fires_once() {
        let mut reg = registry(Heads);
        let id = playing_game(&mut reg);

        reg.submit_choice(id, &handle("A"), Heads).unwrap();
        assert!(reg.submit_choice(id, &handle("B"), Tails).unwrap().resolved());
        assert_eq!(reg.submit_choice(id, &handle("B"), Tails).unwrap(), ChoiceOutcome::Ignored);
        assert_eq!(reg.submit_choice(id, &handle("A"), Heads).unwrap(), ChoiceOutcome::Ignored);
    }

    #[test]
    fn test_non_participant_choice_ignored() {
        let mut reg = registry(Heads);
        let id = playing_game(&mut reg);

        let outcome = reg.submit_choice(id, &handle("C"), Heads).unwrap();
        assert_eq!(outcome, ChoiceOutcome::Ignored);
        let game = reg.get(id).unwrap();
        assert!(game.host_choice().is_none() && game.guest_choice().is_none());
    }

    #[test]
    fn test_choice_errors() {
        let mut reg = registry(Heads);
        assert_eq!(
            reg.submit_choice(GameId::new(404), &handle("A"), Heads),
            Err(GameError::NotFound)
        );

        let waiting = reg.create(handle("A"), 1.0, 0).unwrap();
        assert!(matches!(
            reg.submit_choice(waiting.id(), &handle("A"), Heads),
            Err(GameError::InvalidState(_))
        ));
    }

    #[test]
    fn test_join_errors() {
        let mut reg = registry(Heads);
        assert_eq!(reg.join(GameId::new(7), handle("B")), Err(GameError::NotFound));

        let game = reg.create(handle("A"), 1.0, 0).unwrap();
        assert_eq!(reg.join(game.id(), handle("A")), Err(GameError::SelfJoin));
        assert_eq!(reg.get(game.id()).unwrap().status(), GameStatus::Waiting);

        reg.join(game.id(), handle("B")).unwrap();
        assert!(matches!(
            reg.join(game.id(), handle("C")),
            Err(GameError::InvalidState(_))
        ));
        assert_eq!(reg.get(game.id()).unwrap().guest(), Some(&handle("B")));
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(GameRegistry::parse_id("12"), Ok(GameId::new(12)));
        assert_eq!(GameRegistry::parse_id("bogus"), Err(GameError::NotFound));
    }

    #[test]
    fn test_cancel_by_host_only() {
        let mut reg = registry(Heads);
        let game = reg.create(handle("A"), 1.0, 0).unwrap();

        assert!(reg.cancel(game.id(), &handle("B")).is_none());
        assert_eq!(reg.list_waiting().len(), 1);

        assert!(reg.cancel(game.id(), &handle("A")).is_some());
        assert!(reg.is_empty());
        assert!(reg.cancel(game.id(), &handle("A")).is_none());
    }

    #[test]
    fn test_cancel_started_game_is_noop() {
        let mut reg = registry(Heads);
        let id = playing_game(&mut reg);
        assert!(reg.cancel(id, &handle("A")).is_none());
        assert_eq!(reg.get(id).unwrap().status(), GameStatus::Playing);
    }

    #[test]
    fn test_disconnect_removes_only_waiting_hosted() {
        let mut reg = registry(Heads);
        let waiting = reg.create(handle("A"), 1.0, 0).unwrap().id();
        let playing = playing_game(&mut reg);
        let other = reg.create(handle("C"), 1.0, 0).unwrap().id();

        let removed = reg.on_disconnect(Some(&handle("A")), &[waiting, playing, other]);
        assert_eq!(removed, vec![waiting]);
        assert!(reg.get(waiting).is_none());
        assert!(reg.get(playing).is_some());
        assert!(reg.get(other).is_some());

        assert!(reg.on_disconnect(None, &[other]).is_empty());
    }

    #[test]
    fn test_list_waiting_in_creation_order() {
        let mut reg = registry(Heads);
        let first = reg.create(handle("A"), 1.0, 100).unwrap().id();
        let started = reg.create(handle("B"), 1.0, 200).unwrap().id();
        let third = reg.create(handle("C"), 1.0, 300).unwrap().id();
        reg.join(started, handle("D")).unwrap();

        let ids: Vec<GameId> = reg.list_waiting().iter().map(Game::id).collect();
        assert_eq!(ids, vec![first, third]);
    }

    #[test]
    fn test_sweep_ignores_status() {
        let mut reg = registry(Heads);
        let old_waiting = reg.create(handle("A"), 1.0, 0).unwrap().id();
        let old_playing = reg.create(handle("B"), 1.0, 10).unwrap().id();
        reg.join(old_playing, handle("C")).unwrap();
        let young = reg.create(handle("D"), 1.0, 1_000).unwrap().id();

        let removed = reg.sweep(1_100, 300);
        assert_eq!(removed, vec![old_waiting, old_playing]);
        assert!(reg.get(young).is_some());
    }

    #[test]
    fn test_sweep_boundary_is_exclusive() {
        let mut reg = registry(Heads);
        let id = reg.create(handle("A"), 1.0, 0).unwrap().id();
        assert!(reg.sweep(300, 300).is_empty());
        assert_eq!(reg.sweep(301, 300), vec![id]);
    }

    #[test]
    fn test_remove_finished() {
        let mut reg = registry(Heads);
        let id = playing_game(&mut reg);
        assert!(reg.remove_finished(id).is_none());

        reg.submit_choice(id, &handle("A"), Heads).unwrap();
        reg.submit_choice(id, &handle("B"), Heads).unwrap();
        assert!(reg.remove_finished(id).is_some());
        assert!(reg.remove_finished(id).is_none());
    }

    // -------------------------------------------------------------------------
    // Lifecycle invariants over random operation sequences
    // -------------------------------------------------------------------------

    #[derive(Debug, Clone)]
    enum Op {
        Create(u8),
        Join(u8, u8),
        Choose(u8, u8, bool),
        Cancel(u8, u8),
        Disconnect(u8),
        Sweep(u16),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..4).prop_map(Op::Create),
            (0u8..8, 0u8..4).prop_map(|(g, p)| Op::Join(g, p)),
            (0u8..8, 0u8..4, any::<bool>()).prop_map(|(g, p, h)| Op::Choose(g, p, h)),
            (0u8..8, 0u8..4).prop_map(|(g, p)| Op::Cancel(g, p)),
            (0u8..4).prop_map(Op::Disconnect),
            (0u16..400).prop_map(Op::Sweep),
        ]
    }

    fn rank(status: GameStatus) -> u8 {
        match status {
            GameStatus::Waiting => 0,
            GameStatus::Playing => 1,
            GameStatus::Finished => 2,
        }
    }

    proptest! {
        #[test]
        fn prop_lifecycle_invariants(ops in proptest::collection::vec(op_strategy(), 1..60), heads in any::<bool>()) {
            let outcome = if heads { Heads } else { Tails };
            let mut reg = registry(outcome);
            let players: Vec<PlayerHandle> = (0..4).map(|i| handle(&format!("p{}", i))).collect();
            let mut created: Vec<GameId> = Vec::new();
            let mut last_status: BTreeMap<GameId, GameStatus> = BTreeMap::new();
            let mut now: Millis = 0;

            for op in ops {
                now += 10;
                match op {
                    Op::Create(p) => {
                        let game = reg.create(players[p as usize].clone(), 1.0, now).unwrap();
                        created.push(game.id());
                    }
                    Op::Join(g, p) => {
                        if let Some(id) = created.get(g as usize) {
                            let _ = reg.join(*id, players[p as usize].clone());
                        }
                    }
                    Op::Choose(g, p, h) => {
                        if let Some(id) = created.get(g as usize) {
                            let side = if h { Heads } else { Tails };
                            let before = reg.get(*id).cloned();
                            let res = reg.submit_choice(*id, &players[p as usize], side);
                            if let (Ok(ChoiceOutcome::Ignored), Some(before)) = (res, before) {
                                prop_assert_eq!(reg.get(*id), Some(&before));
                            }
                        }
                    }
                    Op::Cancel(g, p) => {
                        if let Some(id) = created.get(g as usize) {
                            let _ = reg.cancel(*id, &players[p as usize]);
                        }
                    }
                    Op::Disconnect(p) => {
                        let _ = reg.on_disconnect(Some(&players[p as usize]), &created);
                    }
                    Op::Sweep(ttl) => {
                        let ttl = Millis::from(ttl);
                        reg.sweep(now, ttl);
                        prop_assert!(reg.iter().all(|g| g.age(now) <= ttl));
                    }
                }

                for game in reg.iter() {
                    prop_assert!(game.is_consistent());
                    if let Some(prev) = last_status.get(&game.id()) {
                        prop_assert!(rank(game.status()) >= rank(*prev));
                    }
                    if let Some(result) = game.result() {
                        prop_assert_eq!(result.coin_flip, outcome);
                    }
                }
                last_status = reg.iter().map(|g| (g.id(), g.status())).collect();
            }
        }
    }
}
