//! Ranked matchmaking queue
//!
//! Players wait in a single pool. Every tick the pool is pruned of dead
//! connections, sorted by rating and scanned for the first adjacent pair whose
//! rating gap fits a tolerance that widens the longer they wait. At most one
//! match starts per tick. Pairing is greedy nearest-neighbour rather than
//! globally optimal; the widening tolerance guarantees every player is
//! eventually matched.

use crate::error::{ArenaError, ArenaResult};
use crate::gateway::connection::ConnectionHandle;
use crate::gateway::session::SessionTable;
use crate::metrics::MetricsCollector;
use crate::questions::{QuestionRequest, QuestionSource};
use crate::rating::ProfileStore;
use crate::room::{RankedSeat, RoomRegistry};
use crate::types::{ConnectionId, Difficulty, RoomSettings, UserId};
use crate::utils::ratings_within_tolerance;
use crate::validation;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Tuning knobs for pairing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueuePolicy {
    /// Rating gap accepted for players who just joined
    pub base_tolerance: f64,
    /// Extra gap accepted per second waited
    pub tolerance_per_second: f64,
    pub questions_per_match: usize,
    pub initial_rating: i32,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            base_tolerance: 50.0,
            tolerance_per_second: 2.0,
            questions_per_match: 10,
            initial_rating: 1000,
        }
    }
}

impl QueuePolicy {
    /// Allowed rating gap after `waited`
    pub fn tolerance(&self, waited: Duration) -> f64 {
        self.base_tolerance + self.tolerance_per_second * waited.as_secs() as f64
    }
}

/// A player waiting for a ranked opponent
#[derive(Debug, Clone)]
pub struct QueuedPlayer {
    pub user_id: UserId,
    pub username: String,
    pub rating: i32,
    pub connection: ConnectionHandle,
    pub joined_at: Instant,
}

impl QueuedPlayer {
    pub fn waited(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.joined_at)
    }
}

/// Where a player landed in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueTicket {
    /// 1-based position in join order
    pub position: usize,
    pub queue_size: usize,
}

/// Pull the first matchable adjacent pair out of `pool`
///
/// The pool is left sorted by rating. Anyone left over waits for the next tick.
pub fn pair_first_match(
    pool: &mut Vec<QueuedPlayer>,
    now: Instant,
    policy: &QueuePolicy,
) -> Option<(QueuedPlayer, QueuedPlayer)> {
    pool.sort_by_key(|p| p.rating);

    let index = pool.windows(2).position(|pair| {
        let waited = pair[0].waited(now).min(pair[1].waited(now));
        ratings_within_tolerance(pair[0].rating, pair[1].rating, policy.tolerance(waited))
    })?;
    let second = pool.remove(index + 1);
    let first = pool.remove(index);
    Some((first, second))
}

/// The ranked queue and the process that drains it
pub struct MatchmakingQueue {
    pool: Mutex<Vec<QueuedPlayer>>,
    policy: QueuePolicy,
    registry: Arc<RoomRegistry>,
    questions: Arc<dyn QuestionSource>,
    profiles: Arc<dyn ProfileStore>,
    sessions: Arc<SessionTable>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl MatchmakingQueue {
    pub fn new(
        policy: QueuePolicy,
        registry: Arc<RoomRegistry>,
        questions: Arc<dyn QuestionSource>,
        profiles: Arc<dyn ProfileStore>,
        sessions: Arc<SessionTable>,
    ) -> Self {
        Self {
            pool: Mutex::new(Vec::new()),
            policy,
            registry,
            questions,
            profiles,
            sessions,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn lock_pool(&self) -> ArenaResult<MutexGuard<'_, Vec<QueuedPlayer>>> {
        self.pool.lock().map_err(|_| ArenaError::Internal {
            message: "Failed to acquire matchmaking pool lock".to_string(),
        })
    }

    fn rating_of(&self, user_id: &str) -> i32 {
        match self.profiles.get_profile(user_id) {
            Ok(Some(profile)) => profile.rating,
            Ok(None) => self.policy.initial_rating,
            Err(e) => {
                warn!(
                    "Could not load rating for {}, queueing at default: {}",
                    user_id, e
                );
                self.policy.initial_rating
            }
        }
    }

    /// Add a player, or refresh the entry of one already waiting
    ///
    /// A repeat enqueue swaps in the new connection and restarts the wait.
    pub fn enqueue(
        &self,
        user_id: &str,
        username: &str,
        connection: ConnectionHandle,
    ) -> ArenaResult<QueueTicket> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(ArenaError::InvalidInput);
        }
        let username = validation::validate_player_name(username)?;
        let rating = self.rating_of(user_id);

        let entry = QueuedPlayer {
            user_id: user_id.to_string(),
            username,
            rating,
            connection,
            joined_at: Instant::now(),
        };

        let mut pool = self.lock_pool()?;
        let position = match pool.iter().position(|p| p.user_id == entry.user_id) {
            Some(index) => {
                debug!("Refreshing queue entry for {}", entry.user_id);
                pool[index] = entry;
                index + 1
            }
            None => {
                info!("{} joined the ranked queue at {}", entry.user_id, rating);
                pool.push(entry);
                if let Some(metrics) = &self.metrics {
                    metrics.record_enqueued();
                }
                pool.len()
            }
        };
        let ticket = QueueTicket {
            position,
            queue_size: pool.len(),
        };
        self.publish_size(pool.len());
        Ok(ticket)
    }

    /// Remove a player by their external id
    pub fn dequeue(&self, user_id: &str) -> bool {
        self.remove_where(|p| p.user_id == user_id)
    }

    /// Remove whoever is queued on this connection
    pub fn dequeue_connection(&self, connection_id: ConnectionId) -> bool {
        self.remove_where(|p| p.connection.id() == connection_id)
    }

    fn remove_where(&self, predicate: impl Fn(&QueuedPlayer) -> bool) -> bool {
        let Ok(mut pool) = self.lock_pool() else {
            return false;
        };
        let before = pool.len();
        pool.retain(|p| !predicate(p));
        let removed = pool.len() != before;
        if removed {
            self.publish_size(pool.len());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.pool.lock().map(|pool| pool.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn publish_size(&self, size: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.set_queue_size(size);
        }
    }

    /// Run one matching pass; returns how many matches started
    pub async fn tick(&self) -> usize {
        let now = Instant::now();
        let pair = {
            let Ok(mut pool) = self.lock_pool() else {
                error!("Matchmaking pool lock poisoned, skipping tick");
                return 0;
            };
            let before = pool.len();
            pool.retain(|p| p.connection.is_live());
            if pool.len() != before {
                debug!("Pruned {} disconnected players", before - pool.len());
            }
            let pair = pair_first_match(&mut pool, now, &self.policy);
            self.publish_size(pool.len());
            pair
        };

        match pair {
            Some((first, second)) => {
                if self.start_match(first, second, now).await {
                    1
                } else {
                    0
                }
            }
            None => 0,
        }
    }

    async fn start_match(&self, first: QueuedPlayer, second: QueuedPlayer, now: Instant) -> bool {
        let request = QuestionRequest::new(
            Difficulty::Medium,
            "general",
            self.policy.questions_per_match,
        );
        let questions = match self.questions.fetch(&request).await {
            Ok(questions) if !questions.is_empty() => questions,
            Ok(_) => {
                warn!("{} returned no questions for a ranked match", self.questions.name());
                self.requeue([first, second]);
                return false;
            }
            Err(e) => {
                warn!("Failed to fetch ranked questions: {}", e);
                self.requeue([first, second]);
                return false;
            }
        };

        let settings = RoomSettings {
            question_count: questions.len(),
            ..RoomSettings::default()
        };
        let seats = [seat(&first), seat(&second)];
        let (handle, player_ids) = match self.registry.create_ranked(seats, questions, settings) {
            Ok(created) => created,
            Err(e) => {
                error!("Failed to create ranked room: {}", e);
                self.requeue([first, second]);
                return false;
            }
        };

        for (queued, player_id) in [&first, &second].into_iter().zip(player_ids) {
            self.sessions
                .bind(queued.connection.id(), handle.id(), player_id);
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_match(
                [first.waited(now), second.waited(now)],
                [first.rating, second.rating],
            );
        }
        info!(
            "Matched {} ({}) with {} ({}) in room {}",
            first.user_id,
            first.rating,
            second.user_id,
            second.rating,
            handle.id()
        );
        true
    }

    /// Put players back with their original join time
    fn requeue(&self, players: [QueuedPlayer; 2]) {
        let Ok(mut pool) = self.lock_pool() else {
            return;
        };
        for player in players {
            // They may have re-enqueued on a new connection in the meantime
            if !pool.iter().any(|p| p.user_id == player.user_id) {
                pool.push(player);
            }
        }
        self.publish_size(pool.len());
    }

    /// Start the background matching loop
    pub fn start(self: Arc<Self>, tick_interval: Duration) -> JoinHandle<()> {
        info!(
            "Started matchmaking task (every {}s)",
            tick_interval.as_secs_f64()
        );
        tokio::spawn(async move {
            let mut ticker = interval(tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }
}

fn seat(player: &QueuedPlayer) -> RankedSeat {
    RankedSeat {
        user_id: player.user_id.clone(),
        name: player.username.clone(),
        rating: player.rating,
        connection: player.connection.clone(),
    }
}
