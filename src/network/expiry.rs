//! Expiry/Cleanup Scheduler
//!
//! Two timers keep the game registry from leaking:
//!
//! - a periodic sweep removing every game older than the TTL, whatever
//!   its status (a long-running playing game can be swept too; the
//!   creation timestamp is never refreshed)
//! - a one-shot removal of each finished game after a short delay, so
//!   participants can see the result first
//!
//! Pending removals are tracked by game id. The sweep aborts the pending
//! removal of any game it takes, and a removal that finds its game gone
//! does nothing, so no game is removed or broadcast twice.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info};

use crate::core::clock::{now_millis, Millis};
use crate::game::state::GameId;
use crate::network::fanout::broadcast_lobby;
use crate::network::router::{SharedConnections, SharedGames};

/// Scheduler timings.
#[derive(Debug, Clone, Copy)]
pub struct ExpiryConfig {
    /// Period between sweeps.
    pub sweep_interval: Duration,
    /// Maximum game age before the sweep removes it.
    pub game_ttl: Duration,
    /// Delay between resolution and removal of a finished game.
    pub removal_delay: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(crate::SWEEP_INTERVAL_SECS),
            game_ttl: Duration::from_secs(crate::GAME_TTL_SECS),
            removal_delay: Duration::from_secs(crate::RESULT_DISPLAY_SECS),
        }
    }
}

/// Owns the sweep loop and the delayed finished-game removals.
#[derive(Clone)]
pub struct ExpiryScheduler {
    games: SharedGames,
    connections: SharedConnections,
    config: ExpiryConfig,
    pending: Arc<Mutex<BTreeMap<GameId, JoinHandle<()>>>>,
}

impl ExpiryScheduler {
    /// Create a scheduler over the shared registries.
    pub fn new(games: SharedGames, connections: SharedConnections, config: ExpiryConfig) -> Self {
        Self {
            games,
            connections,
            config,
            pending: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Timings in use.
    pub fn config(&self) -> ExpiryConfig {
        self.config
    }

    /// Remove `id` after the configured delay if it is still finished.
    ///
    /// Rescheduling a game replaces its earlier pending removal.
    pub async fn schedule_removal(&self, id: GameId) {
        let scheduler = self.clone();
        let delay = self.config.removal_delay;

        let handle = tokio::spawn(async move {
            sleep(delay).await;
            scheduler.remove_finished(id).await;
        });

        if let Some(previous) = self.pending.lock().await.insert(id, handle) {
            previous.abort();
        }
    }

    async fn remove_finished(&self, id: GameId) {
        {
            let mut games = self.games.write().await;
            let conns = self.connections.read().await;

            if games.remove_finished(id).is_some() {
                debug!("Finished game {} removed", id);
                broadcast_lobby(&conns, &games);
            }
        }
        self.pending.lock().await.remove(&id);
    }

    /// Run one sweep now. Returns the removed ids.
    pub async fn sweep_once(&self) -> Vec<GameId> {
        let mut games = self.games.write().await;
        let conns = self.connections.read().await;

        let ttl = self.config.game_ttl.as_millis() as Millis;
        let expired = games.sweep(now_millis(), ttl);
        if expired.is_empty() {
            return expired;
        }

        {
            let mut pending = self.pending.lock().await;
            for id in &expired {
                if let Some(handle) = pending.remove(id) {
                    handle.abort();
                }
            }
        }

        info!("Cleaned up {} old games", expired.len());
        broadcast_lobby(&conns, &games);
        expired
    }

    /// Sweep forever on the configured period.
    pub async fn run(self) {
        let mut ticker = interval(self.config.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.sweep_once().await;
        }
    }

    /// Abort every pending removal (shutdown).
    pub async fn cancel_all(&self) {
        let mut pending = self.pending.lock().await;
        for (_, handle) in std::mem::take(&mut *pending) {
            handle.abort();
        }
    }

    /// Number of scheduled removals not yet run.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
