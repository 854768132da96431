//! Room state machine
//!
//! A [`Room`] owns its players and game state and performs every transition
//! synchronously. It never sleeps: timers are described by [`Timer`] and
//! driven by the owning actor, which calls [`Room::on_timer`] when one fires.
//! Outbound messages go straight to the players' connection handles in the
//! order the transitions produce them.

use crate::error::{ArenaError, ArenaResult};
use crate::gateway::connection::ConnectionHandle;
use crate::gateway::protocol::{
    GameStateView, OpponentProfile, QuestionView, ScoreLine, ServerMessage, SettingsPatch,
};
use crate::questions::{normalize_questions, Question, RawQuestion};
use crate::rating::{tier_for, MatchOutcome, RankedEntrant, SettlementReport};
use crate::types::{
    ConnectionId, GamePhase, PlayerId, PlayerView, RoomId, RoomSettings, RoomStatus, RoomView,
    UserId, MAX_CAPACITY, MAX_QUESTION_COUNT, MIN_CAPACITY,
};
use crate::utils::{current_timestamp, generate_match_id, generate_player_id};
use crate::validation;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info};

/// Durations that drive a game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomTimings {
    pub countdown_seconds: u32,
    pub question_seconds: u32,
    pub reveal: Duration,
    pub pressure_threshold_seconds: u32,
    pub match_intro: Duration,
    pub tick: Duration,
    pub max_chat_length: usize,
}

impl Default for RoomTimings {
    fn default() -> Self {
        Self {
            countdown_seconds: 3,
            question_seconds: 20,
            reveal: Duration::from_secs(2),
            pressure_threshold_seconds: 5,
            match_intro: Duration::from_millis(2000),
            tick: Duration::from_secs(1),
            max_chat_length: 500,
        }
    }
}

/// Membership record of a player inside one room
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
    pub is_ready: bool,
    pub score: u32,
    pub connection: ConnectionHandle,
    pub user_id: Option<UserId>,
    pub joined_at: DateTime<Utc>,
}

impl Player {
    fn new(id: PlayerId, name: String, connection: ConnectionHandle) -> Self {
        Self {
            id,
            name,
            is_host: false,
            is_ready: false,
            score: 0,
            connection,
            user_id: None,
            joined_at: current_timestamp(),
        }
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id.clone(),
            name: self.name.clone(),
            is_host: self.is_host,
            is_ready: self.is_ready,
            score: self.score,
        }
    }
}

/// State attached to a room once play starts
#[derive(Debug, Clone)]
pub struct GameState {
    pub questions: Vec<Question>,
    pub question_index: usize,
    /// Answers for the current question only
    pub answers: HashMap<PlayerId, String>,
    pub scores: BTreeMap<PlayerId, u32>,
    pub phase: GamePhase,
    pub countdown: u32,
    pub time_remaining: u32,
}

impl GameState {
    fn new(questions: Vec<Question>, players: &[Player]) -> Self {
        Self {
            questions,
            question_index: 0,
            answers: HashMap::new(),
            scores: players.iter().map(|p| (p.id.clone(), 0)).collect(),
            phase: GamePhase::Starting,
            countdown: 0,
            time_remaining: 0,
        }
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.question_index)
    }
}

/// Which timer is armed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    MatchIntro,
    Countdown,
    Question,
    Reveal,
}

/// A timer the owning actor should run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    pub kind: TimerKind,
    pub period: Duration,
    pub repeating: bool,
}

/// Why a room closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Empty,
    Disbanded,
    Deleted,
}

/// Things the owning actor reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    PhaseChanged(GamePhase),
    GameCompleted { settlement: Option<MatchOutcome> },
    Closed(CloseReason),
}

/// Parameters of a room created through the lobby
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoom {
    pub name: String,
    pub is_private: bool,
    pub password: Option<String>,
    pub capacity: usize,
    pub settings: RoomSettings,
}

/// One of the two players of a matchmaking-synthesized room
#[derive(Debug, Clone)]
pub struct RankedSeat {
    pub user_id: UserId,
    pub name: String,
    pub rating: i32,
    pub connection: ConnectionHandle,
}

/// Result of a successful join
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub player_id: PlayerId,
    pub rejoined: bool,
    pub room: RoomView,
}

/// What a leave did to the room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Unknown player, or a stale connection of a rebound player
    Ignored,
    Left,
    Disbanded,
    Emptied,
}

/// A single room and its state machine
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    name: String,
    host_id: Option<PlayerId>,
    players: Vec<Player>,
    capacity: usize,
    is_private: bool,
    password: Option<String>,
    status: RoomStatus,
    settings: RoomSettings,
    created_at: DateTime<Utc>,
    game: Option<GameState>,
    ranked: bool,
    ranked_started_at: Option<DateTime<Utc>>,
    reserved_host_id: Option<PlayerId>,
    timings: RoomTimings,
    timer: Option<Timer>,
    timer_epoch: u64,
    events: Vec<RoomEvent>,
    closed: bool,
}

impl Room {
    /// Create an empty room in `waiting` status
    pub fn new(id: RoomId, params: NewRoom, timings: RoomTimings) -> Self {
        Self {
            id,
            name: params.name,
            host_id: None,
            players: Vec::new(),
            capacity: params.capacity.clamp(MIN_CAPACITY, MAX_CAPACITY),
            is_private: params.is_private,
            password: params.password,
            status: RoomStatus::Waiting,
            settings: params.settings,
            created_at: current_timestamp(),
            game: None,
            ranked: false,
            ranked_started_at: None,
            reserved_host_id: None,
            timings,
            timer: None,
            timer_epoch: 0,
            events: Vec::new(),
            closed: false,
        }
    }

    /// Hand the first joiner a pre-allocated player id
    pub fn with_reserved_host(mut self, player_id: PlayerId) -> Self {
        self.reserved_host_id = Some(player_id);
        self
    }

    /// Synthesize a ranked 1v1 room with both players locked in
    ///
    /// Each player is told about their opponent right away; the countdown
    /// starts once the match intro delay elapses.
    pub fn ranked(
        id: RoomId,
        seats: [RankedSeat; 2],
        questions: Vec<Question>,
        settings: RoomSettings,
        timings: RoomTimings,
    ) -> Self {
        let name = format!("{} vs {}", seats[0].name, seats[1].name);
        let mut room = Self::new(
            id,
            NewRoom {
                name,
                is_private: true,
                password: None,
                capacity: MIN_CAPACITY,
                settings,
            },
            timings,
        );
        room.ranked = true;
        room.ranked_started_at = Some(current_timestamp());

        for seat in &seats {
            let mut player = Player::new(
                generate_player_id(),
                seat.name.clone(),
                seat.connection.clone(),
            );
            player.is_ready = true;
            player.user_id = Some(seat.user_id.clone());
            room.players.push(player);
        }
        room.players[0].is_host = true;
        room.host_id = Some(room.players[0].id.clone());

        for (index, player) in room.players.iter().enumerate() {
            let opponent = &seats[1 - index];
            player.connection.send(ServerMessage::MatchFound {
                room_id: room.id,
                player_id: player.id.clone(),
                opponent: OpponentProfile {
                    name: opponent.name.clone(),
                    rating: opponent.rating,
                    tier: tier_for(opponent.rating),
                },
            });
        }

        room.game = Some(GameState::new(questions, &room.players));
        room.status = RoomStatus::Starting;
        room.events.push(RoomEvent::PhaseChanged(GamePhase::Starting));
        room.arm(TimerKind::MatchIntro, room.timings.match_intro, false);
        room
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn host_id(&self) -> Option<&PlayerId> {
        self.host_id.as_ref()
    }

    pub fn game(&self) -> Option<&GameState> {
        self.game.as_ref()
    }

    pub fn is_ranked(&self) -> bool {
        self.ranked
    }

    pub fn ranked_started_at(&self) -> Option<DateTime<Utc>> {
        self.ranked_started_at
    }

    pub fn is_one_vs_one(&self) -> bool {
        self.capacity == MIN_CAPACITY
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Currently armed timer, if any
    pub fn timer(&self) -> Option<Timer> {
        self.timer
    }

    /// Bumped every time the timer is armed or cancelled
    pub fn timer_epoch(&self) -> u64 {
        self.timer_epoch
    }

    pub fn take_events(&mut self) -> Vec<RoomEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    /// Public snapshot of the room
    pub fn view(&self) -> RoomView {
        RoomView {
            id: self.id,
            name: self.name.clone(),
            host_id: self.host_id.clone(),
            players: self.player_views(),
            player_count: self.players.len(),
            max_players: self.capacity,
            is_private: self.is_private,
            has_password: self.password.is_some(),
            status: self.status,
            settings: self.settings.clone(),
            ranked: self.ranked,
            created_at: self.created_at,
        }
    }

    fn player_views(&self) -> Vec<PlayerView> {
        self.players.iter().map(Player::view).collect()
    }

    /// Snapshot of the running game; answers only show after reveal
    pub fn game_state_view(&self) -> Option<GameStateView> {
        let game = self.game.as_ref()?;
        let revealed = matches!(game.phase, GamePhase::Reveal | GamePhase::Final);
        let question = match game.phase {
            GamePhase::Starting | GamePhase::Countdown => None,
            _ => game.current_question(),
        };

        let mut answered_player_ids: Vec<PlayerId> = game.answers.keys().cloned().collect();
        answered_player_ids.sort();

        Some(GameStateView {
            phase: game.phase,
            question_index: game.question_index,
            total_questions: game.questions.len(),
            question: question.map(|q| QuestionView {
                prompt: q.prompt.clone(),
                options: q.options.clone(),
                category: q.category.clone(),
                difficulty: q.difficulty.clone(),
            }),
            question_time_remaining: game.time_remaining,
            scores: game.scores.clone(),
            answered_player_ids,
            answers: revealed.then(|| {
                game.answers
                    .iter()
                    .map(|(id, answer)| (id.clone(), answer.clone()))
                    .collect()
            }),
            correct_answer: question
                .filter(|_| revealed)
                .map(|q| q.correct_answer.clone()),
            explanation: question
                .filter(|_| revealed)
                .and_then(|q| q.explanation.clone()),
        })
    }

    // ---- membership -------------------------------------------------------

    /// Join, or rebind an existing player of the same name to a new connection
    pub fn join(
        &mut self,
        player_name: &str,
        password: Option<&str>,
        connection: ConnectionHandle,
    ) -> ArenaResult<JoinOutcome> {
        if self.closed {
            return Err(ArenaError::RoomNotFound);
        }
        let name = validation::validate_player_name(player_name)?;

        if self.is_private {
            if let Some(secret) = &self.password {
                if password != Some(secret.as_str()) {
                    return Err(ArenaError::Unauthorized);
                }
            }
        }

        // One connection never backs two players
        if self
            .players
            .iter()
            .any(|p| p.connection.id() == connection.id() && p.name != name)
        {
            return Err(ArenaError::AlreadySeated);
        }

        // Reconnect by name: checked before capacity so a full room can resync
        if let Some(index) = self.players.iter().position(|p| p.name == name) {
            self.players[index].connection = connection;
            let player = &self.players[index];
            info!("Player {} rebound to room {}", player.name, self.id);
            let outcome = JoinOutcome {
                player_id: player.id.clone(),
                rejoined: true,
                room: self.view(),
            };
            self.reply_joined(index);
            return Ok(outcome);
        }

        if self.players.len() >= self.capacity {
            return Err(ArenaError::RoomFull);
        }
        if self.status != RoomStatus::Waiting {
            return Err(ArenaError::GameInProgress);
        }

        let becomes_host = self.players.is_empty();
        let id = if becomes_host {
            self.reserved_host_id.take().unwrap_or_else(generate_player_id)
        } else {
            generate_player_id()
        };

        let mut player = Player::new(id, name, connection);
        if becomes_host {
            player.is_host = true;
            player.is_ready = true;
            self.host_id = Some(player.id.clone());
        }

        let joined = player.view();
        self.players.push(player);
        let index = self.players.len() - 1;

        info!(
            "Player {} joined room {} ({}/{})",
            joined.name,
            self.id,
            self.players.len(),
            self.capacity
        );

        let players = self.player_views();
        self.broadcast_except(
            &joined.id,
            ServerMessage::PlayerJoined {
                player: joined.clone(),
                players,
            },
        );
        self.reply_joined(index);

        Ok(JoinOutcome {
            player_id: joined.id,
            rejoined: false,
            room: self.view(),
        })
    }

    fn reply_joined(&self, index: usize) {
        let player = &self.players[index];
        player.connection.send(ServerMessage::RoomJoined {
            room: self.view(),
            player_id: player.id.clone(),
            player: player.view(),
            game_state: self.game_state_view(),
        });
    }

    /// Remove a player, explicitly or because their connection dropped
    ///
    /// With `connection` set the leave only applies if the player is still
    /// bound to that connection.
    pub fn leave(&mut self, player_id: &str, connection: Option<ConnectionId>) -> LeaveOutcome {
        let Some(index) = self.players.iter().position(|p| p.id == player_id) else {
            return LeaveOutcome::Ignored;
        };
        if let Some(connection_id) = connection {
            if self.players[index].connection.id() != connection_id {
                debug!(
                    "Ignoring stale leave for player {} in room {}",
                    player_id, self.id
                );
                return LeaveOutcome::Ignored;
            }
        }

        let departed = self.players.remove(index);
        info!("Player {} left room {}", departed.name, self.id);

        if self.is_one_vs_one() && !self.players.is_empty() {
            self.broadcast(ServerMessage::RoomDisbanded {
                reason: format!("{} left the match", departed.name),
            });
            info!("Room {} disbanded after {} left", self.id, departed.name);
            self.players.clear();
            self.host_id = None;
            self.close(CloseReason::Disbanded);
            return LeaveOutcome::Disbanded;
        }

        if self.players.is_empty() {
            self.host_id = None;
            self.close(CloseReason::Empty);
            return LeaveOutcome::Emptied;
        }

        let new_host_id = if departed.is_host {
            let next = &mut self.players[0];
            next.is_host = true;
            next.is_ready = true;
            self.host_id = Some(next.id.clone());
            info!("Player {} is now host of room {}", next.name, self.id);
            Some(next.id.clone())
        } else {
            None
        };

        let players = self.player_views();
        self.broadcast(ServerMessage::PlayerLeft {
            player_id: departed.id,
            player_name: departed.name,
            new_host_id,
            players,
        });

        // The departed player may have been the last one we were waiting on
        if self.phase() == Some(GamePhase::Playing) && self.all_answered() {
            self.reveal();
        }

        LeaveOutcome::Left
    }

    /// Tear the room down on request, notifying whoever is still inside
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.broadcast(ServerMessage::RoomDisbanded {
            reason: "Room was closed".to_string(),
        });
        self.players.clear();
        self.host_id = None;
        self.close(CloseReason::Deleted);
    }

    fn close(&mut self, reason: CloseReason) {
        self.closed = true;
        self.disarm();
        self.events.push(RoomEvent::Closed(reason));
    }

    // ---- lobby ------------------------------------------------------------

    pub fn set_ready(&mut self, player_id: &str, ready: bool) -> ArenaResult<()> {
        let index = self.player_index(player_id)?;
        if self.status != RoomStatus::Waiting {
            return Err(ArenaError::GameInProgress);
        }

        self.players[index].is_ready = ready;
        let players = self.player_views();
        self.broadcast(ServerMessage::PlayerReadyChanged {
            player_id: player_id.to_string(),
            ready,
            players,
        });

        if self.all_ready() {
            self.broadcast(ServerMessage::AllPlayersReady { can_start: true });
        }
        Ok(())
    }

    /// At least two players and every non-host player ready
    pub fn all_ready(&self) -> bool {
        self.players.len() >= MIN_CAPACITY
            && self
                .players
                .iter()
                .filter(|p| !p.is_host)
                .all(|p| p.is_ready)
    }

    pub fn update_settings(
        &mut self,
        player_id: &str,
        max_players: Option<usize>,
        patch: Option<SettingsPatch>,
    ) -> ArenaResult<()> {
        let index = self.player_index(player_id)?;
        if !self.players[index].is_host {
            return Err(ArenaError::NotHost);
        }
        if self.status != RoomStatus::Waiting {
            return Err(ArenaError::SettingsLocked);
        }

        if let Some(capacity) = max_players {
            if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) {
                return Err(ArenaError::InvalidInput);
            }
            if capacity < self.players.len() {
                return Err(ArenaError::CapacityConflict);
            }
        }

        let mut settings = self.settings.clone();
        if let Some(patch) = patch {
            if let Some(difficulty) = patch.difficulty {
                settings.difficulty = difficulty;
            }
            if let Some(category) = patch.category {
                settings.category = validation::validate_room_name(&category)?;
            }
            if let Some(count) = patch.question_count {
                if !(1..=MAX_QUESTION_COUNT).contains(&count) {
                    return Err(ArenaError::InvalidInput);
                }
                settings.question_count = count;
            }
        }

        if let Some(capacity) = max_players {
            self.capacity = capacity;
        }
        self.settings = settings;
        info!(
            "Room {} settings updated: {} seats, {} {} x{}",
            self.id,
            self.capacity,
            self.settings.difficulty,
            self.settings.category,
            self.settings.question_count
        );

        self.broadcast(ServerMessage::SettingsUpdated {
            max_players: self.capacity,
            settings: self.settings.clone(),
        });
        Ok(())
    }

    pub fn chat(&mut self, player_id: &str, message: &str) -> ArenaResult<()> {
        let index = self.player_index(player_id)?;
        let message = validation::validate_chat_message(message, self.timings.max_chat_length)?;
        let player = &self.players[index];

        self.broadcast(ServerMessage::ChatMessage {
            player_id: player.id.clone(),
            player_name: player.name.clone(),
            message,
            timestamp: current_timestamp(),
        });
        Ok(())
    }

    // ---- game -------------------------------------------------------------

    /// Host-only start with a pre-fetched question payload
    pub fn start_game(
        &mut self,
        player_id: &str,
        questions: Option<Vec<RawQuestion>>,
    ) -> ArenaResult<()> {
        let index = self.player_index(player_id)?;
        if !self.players[index].is_host {
            return Err(ArenaError::NotHost);
        }
        if self.status != RoomStatus::Waiting {
            return Err(ArenaError::GameInProgress);
        }
        if self.players.len() < MIN_CAPACITY {
            return Err(ArenaError::InsufficientPlayers);
        }
        if !self.all_ready() {
            return Err(ArenaError::PlayersNotReady);
        }

        let mut questions = normalize_questions(questions.as_deref().unwrap_or_default());
        if questions.is_empty() {
            return Err(ArenaError::NoQuestions);
        }
        questions.truncate(self.settings.question_count.max(1));

        for player in &mut self.players {
            player.score = 0;
        }
        self.game = Some(GameState::new(questions, &self.players));
        self.status = RoomStatus::Starting;
        self.events.push(RoomEvent::PhaseChanged(GamePhase::Starting));
        info!(
            "Room {} starting with {} players and {} questions",
            self.id,
            self.players.len(),
            self.game.as_ref().map_or(0, |g| g.questions.len())
        );

        self.begin_countdown();
        Ok(())
    }

    /// Record a player's answer for the open question
    ///
    /// Only the first answer per question counts; answers outside the
    /// `playing` phase are dropped.
    pub fn answer(&mut self, player_id: &str, answer: &str) -> ArenaResult<()> {
        let index = self.player_index(player_id)?;
        let pressure = self.players.len() == MIN_CAPACITY;
        let threshold = self.timings.pressure_threshold_seconds;

        let Some(game) = self.game.as_mut() else {
            return Ok(());
        };
        if game.phase != GamePhase::Playing || game.answers.contains_key(player_id) {
            return Ok(());
        }
        game.answers
            .insert(player_id.to_string(), answer.trim().to_string());
        let answered = game.answers.len();

        if self.all_answered() {
            self.reveal();
            return Ok(());
        }

        if pressure && answered == 1 {
            if let Some(game) = self.game.as_mut() {
                if game.time_remaining > threshold {
                    game.time_remaining = threshold;
                }
            }
            let answering = &self.players[index];
            let message = ServerMessage::PlayerAnswered {
                player_id: answering.id.clone(),
                player_name: answering.name.clone(),
            };
            for other in self.players.iter().filter(|p| p.id != player_id) {
                other.connection.send(message.clone());
            }
        }
        Ok(())
    }

    /// Deliver private rating results once settlement finishes
    pub fn apply_settlement(&mut self, report: &SettlementReport) {
        for result in &report.players {
            match self.player(&result.player_id) {
                Some(player) => {
                    player.connection.send(ServerMessage::RankedResult {
                        rating: result.rating,
                        delta: result.delta,
                        tier: result.tier,
                        result: result.result,
                    });
                }
                None => debug!(
                    "Player {} left room {} before ranked result arrived",
                    result.player_id, self.id
                ),
            }
        }
    }

    /// Handle an expired timer; stale kinds are ignored
    pub fn on_timer(&mut self, kind: TimerKind) {
        if self.timer.map(|t| t.kind) != Some(kind) {
            debug!("Ignoring stale {:?} timer in room {}", kind, self.id);
            return;
        }

        match kind {
            TimerKind::MatchIntro => self.begin_countdown(),
            TimerKind::Countdown => self.countdown_tick(),
            TimerKind::Question => self.question_tick(),
            TimerKind::Reveal => self.advance(),
        }
    }

    fn begin_countdown(&mut self) {
        let countdown = self.timings.countdown_seconds;
        let Some(game) = self.game.as_mut() else {
            return;
        };
        game.phase = GamePhase::Countdown;
        game.countdown = countdown;
        self.status = RoomStatus::Countdown;
        self.events.push(RoomEvent::PhaseChanged(GamePhase::Countdown));

        let players = self.player_views();
        self.broadcast(ServerMessage::CountdownStarted { countdown, players });
        self.arm(TimerKind::Countdown, self.timings.tick, true);
    }

    fn countdown_tick(&mut self) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        game.countdown = game.countdown.saturating_sub(1);
        let countdown = game.countdown;

        self.broadcast(ServerMessage::CountdownTick { countdown });
        if countdown == 0 {
            self.begin_playing();
        } else {
            self.events.push(RoomEvent::PhaseChanged(GamePhase::Countdown));
        }
    }

    fn begin_playing(&mut self) {
        let question_seconds = self.timings.question_seconds;
        let Some(game) = self.game.as_mut() else {
            return;
        };
        game.phase = GamePhase::Playing;
        game.time_remaining = question_seconds;
        self.status = RoomStatus::Playing;
        self.events.push(RoomEvent::PhaseChanged(GamePhase::Playing));
        info!("Room {} is playing", self.id);

        let players = self.player_views();
        self.broadcast(ServerMessage::GameStarted {
            settings: self.settings.clone(),
            players,
        });
        self.broadcast_game_state();
        self.arm(TimerKind::Question, self.timings.tick, true);
    }

    fn question_tick(&mut self) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        game.time_remaining = game.time_remaining.saturating_sub(1);
        if game.time_remaining == 0 {
            self.reveal();
        } else {
            self.broadcast_game_state();
        }
    }

    fn all_answered(&self) -> bool {
        match &self.game {
            Some(game) => {
                !self.players.is_empty()
                    && self.players.iter().all(|p| game.answers.contains_key(&p.id))
            }
            None => false,
        }
    }

    fn reveal(&mut self) {
        self.disarm();
        let Some(game) = self.game.as_mut() else {
            return;
        };
        let Some(question) = game.questions.get(game.question_index) else {
            return;
        };

        let correct: Vec<PlayerId> = game
            .answers
            .iter()
            .filter(|(_, answer)| question.is_correct(answer))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &correct {
            *game.scores.entry(id.clone()).or_insert(0) += 1;
        }
        game.phase = GamePhase::Reveal;
        for player in &mut self.players {
            if let Some(score) = game.scores.get(&player.id) {
                player.score = *score;
            }
        }
        self.events.push(RoomEvent::PhaseChanged(GamePhase::Reveal));
        debug!(
            "Room {} revealed question {} ({} correct)",
            self.id,
            game.question_index + 1,
            correct.len()
        );

        self.broadcast_game_state();
        self.arm(TimerKind::Reveal, self.timings.reveal, false);
    }

    fn advance(&mut self) {
        let question_seconds = self.timings.question_seconds;
        let Some(game) = self.game.as_mut() else {
            return;
        };

        if game.question_index + 1 < game.questions.len() {
            game.question_index += 1;
            game.answers.clear();
            game.phase = GamePhase::Playing;
            game.time_remaining = question_seconds;
            self.events.push(RoomEvent::PhaseChanged(GamePhase::Playing));
            self.broadcast_game_state();
            self.arm(TimerKind::Question, self.timings.tick, true);
        } else {
            game.phase = GamePhase::Final;
            self.status = RoomStatus::Finished;
            self.disarm();
            self.events.push(RoomEvent::PhaseChanged(GamePhase::Final));
            self.broadcast_game_state();
            self.finish();
        }
    }

    fn finish(&mut self) {
        let Some(game) = self.game.as_ref() else {
            return;
        };

        let mut final_scores: Vec<ScoreLine> = self
            .players
            .iter()
            .map(|p| ScoreLine {
                player_id: p.id.clone(),
                player_name: p.name.clone(),
                score: game.scores.get(&p.id).copied().unwrap_or(0),
            })
            .collect();
        final_scores.sort_by(|a, b| b.score.cmp(&a.score));

        let top = final_scores.first().map(|line| line.score);
        let winner_ids: Vec<PlayerId> = final_scores
            .iter()
            .filter(|line| Some(line.score) == top)
            .map(|line| line.player_id.clone())
            .collect();

        let settlement = self.settlement_outcome(&final_scores);
        info!(
            "Room {} finished after {} questions",
            self.id,
            game.questions.len()
        );

        let players = self.player_views();
        self.broadcast(ServerMessage::GameEnd {
            final_scores,
            winner_ids,
            players,
        });
        self.events.push(RoomEvent::GameCompleted { settlement });
    }

    fn settlement_outcome(&self, scores: &[ScoreLine]) -> Option<MatchOutcome> {
        if !self.ranked || self.players.len() != MIN_CAPACITY {
            return None;
        }
        let entrant = |player: &Player| -> Option<RankedEntrant> {
            Some(RankedEntrant {
                player_id: player.id.clone(),
                user_id: player.user_id.clone()?,
                username: player.name.clone(),
                score: scores
                    .iter()
                    .find(|line| line.player_id == player.id)
                    .map_or(0, |line| line.score),
            })
        };
        Some(MatchOutcome {
            match_id: generate_match_id(),
            entrants: [entrant(&self.players[0])?, entrant(&self.players[1])?],
        })
    }

    pub fn phase(&self) -> Option<GamePhase> {
        self.game.as_ref().map(|g| g.phase)
    }

    // ---- plumbing ---------------------------------------------------------

    fn player_index(&self, player_id: &str) -> ArenaResult<usize> {
        self.players
            .iter()
            .position(|p| p.id == player_id)
            .ok_or(ArenaError::RoomNotFound)
    }

    fn arm(&mut self, kind: TimerKind, period: Duration, repeating: bool) {
        self.timer = Some(Timer {
            kind,
            period,
            repeating,
        });
        self.timer_epoch += 1;
    }

    fn disarm(&mut self) {
        if self.timer.take().is_some() {
            self.timer_epoch += 1;
        }
    }

    fn broadcast_game_state(&self) {
        if let Some(game_state) = self.game_state_view() {
            self.broadcast(ServerMessage::GameState { game_state });
        }
    }

    fn broadcast(&self, message: ServerMessage) {
        for player in &self.players {
            player.connection.send(message.clone());
        }
    }

    fn broadcast_except(&self, player_id: &str, message: ServerMessage) {
        for player in self.players.iter().filter(|p| p.id != player_id) {
            player.connection.send(message.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questions::CorrectAnswer;
    use crate::rating::{MatchResult, PlayerSettlement};
    use crate::types::Tier;
    use proptest::prelude::*;
    use tokio::sync::mpsc::UnboundedReceiver;
    use uuid::Uuid;

    type Inbox = UnboundedReceiver<ServerMessage>;

    fn room(capacity: usize) -> Room {
        Room::new(
            Uuid::new_v4(),
            NewRoom {
                name: "Battle Arena".to_string(),
                is_private: false,
                password: None,
                capacity,
                settings: RoomSettings::default(),
            },
            RoomTimings::default(),
        )
    }

    fn join(room: &mut Room, name: &str) -> (PlayerId, ConnectionHandle, Inbox) {
        let (connection, rx) = ConnectionHandle::channel();
        let outcome = room.join(name, None, connection.clone()).unwrap();
        (outcome.player_id, connection, rx)
    }

    fn drain(rx: &mut Inbox) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    fn question(prompt: &str) -> RawQuestion {
        RawQuestion {
            question: prompt.to_string(),
            options: vec!["Paris".to_string(), "London".to_string()],
            correct: CorrectAnswer::Text("Paris".to_string()),
            explanation: None,
            category: None,
            difficulty: None,
        }
    }

    fn host_count(room: &Room) -> usize {
        room.players().iter().filter(|p| p.is_host).count()
    }

    /// Fire timers until the game reaches the given phase
    fn run_until(room: &mut Room, phase: GamePhase) {
        for _ in 0..1000 {
            if room.phase() == Some(phase) {
                return;
            }
            let timer = room.timer().expect("a timer should be armed");
            room.on_timer(timer.kind);
        }
        panic!("room never reached {:?}", phase);
    }

    fn started_duel() -> (Room, PlayerId, PlayerId, Inbox, Inbox) {
        let mut room = room(2);
        let (a, _, rx_a) = join(&mut room, "Alice");
        let (b, _, rx_b) = join(&mut room, "Bob");
        room.set_ready(&b, true).unwrap();
        room.start_game(&a, Some(vec![question("Capital of France?")]))
            .unwrap();
        run_until(&mut room, GamePhase::Playing);
        (room, a, b, rx_a, rx_b)
    }

    #[test]
    fn test_first_joiner_is_ready_host() {
        let mut room = room(4).with_reserved_host("host-1".to_string());
        let (a, _, mut rx_a) = join(&mut room, "Alice");
        assert_eq!(a, "host-1");
        let alice = room.player(&a).unwrap();
        assert!(alice.is_host && alice.is_ready);
        assert!(matches!(drain(&mut rx_a)[0], ServerMessage::RoomJoined { .. }));

        let (b, _, _) = join(&mut room, "Bob");
        assert!(!room.player(&b).unwrap().is_host);
        match drain(&mut rx_a).as_slice() {
            [ServerMessage::PlayerJoined { player, players }] => {
                assert_eq!(player.id, b);
                assert_eq!(players.len(), 2);
            }
            other => panic!("unexpected messages {:?}", other),
        }
    }

    #[test]
    fn test_join_rejections() {
        let mut private = Room::new(
            Uuid::new_v4(),
            NewRoom {
                name: "Secret".to_string(),
                is_private: true,
                password: Some("pass1234".to_string()),
                capacity: 2,
                settings: RoomSettings::default(),
            },
            RoomTimings::default(),
        );
        let (connection, _rx) = ConnectionHandle::channel();
        assert_eq!(
            private.join("Alice", Some("wrong"), connection.clone()),
            Err(ArenaError::Unauthorized)
        );
        assert!(private.join("Alice", Some("pass1234"), connection.clone()).is_ok());
        assert!(private.join("Bob", Some("pass1234"), connection.clone()).is_ok());
        assert_eq!(
            private.join("Carol", Some("pass1234"), connection.clone()),
            Err(ArenaError::RoomFull)
        );
        assert_eq!(
            private.join("<b>x</b>", Some("pass1234"), connection),
            Err(ArenaError::InvalidInput)
        );
    }

    #[test]
    fn test_late_join_is_rejected() {
        let mut room = room(4);
        let (a, _, _) = join(&mut room, "Alice");
        let (b, _, _) = join(&mut room, "Bob");
        room.set_ready(&b, true).unwrap();
        room.start_game(&a, Some(vec![question("Q")])).unwrap();

        let (connection, _rx) = ConnectionHandle::channel();
        assert_eq!(
            room.join("Carol", None, connection).map(|o| o.player_id),
            Err(ArenaError::GameInProgress)
        );
    }

    #[test]
    fn test_reconnect_is_idempotent() {
        let (mut room, a, b, _rx_a, _rx_b) = started_duel();
        room.answer(&a, "Paris").unwrap();
        room.answer(&b, "London").unwrap();
        let score_before = room.player(&a).unwrap().score;
        assert_eq!(score_before, 1);

        let (connection, mut rx) = ConnectionHandle::channel();
        let outcome = room.join("Alice", None, connection.clone()).unwrap();
        assert!(outcome.rejoined);
        assert_eq!(outcome.player_id, a);
        assert_eq!(room.players().len(), 2);
        assert_eq!(room.player(&a).unwrap().score, score_before);
        assert_eq!(room.player(&a).unwrap().connection, connection);

        match drain(&mut rx).as_slice() {
            [ServerMessage::RoomJoined { game_state, .. }] => {
                assert_eq!(game_state.as_ref().unwrap().phase, GamePhase::Reveal);
            }
            other => panic!("unexpected messages {:?}", other),
        }
    }

    #[test]
    fn test_connection_cannot_take_a_second_seat() {
        let mut room = room(4);
        let (a, connection, _rx) = join(&mut room, "Alice");

        assert_eq!(
            room.join("Bob", None, connection.clone()).map(|o| o.player_id),
            Err(ArenaError::AlreadySeated)
        );
        assert_eq!(room.players().len(), 1);

        // The same name on the same connection is still a resync
        assert_eq!(room.join("Alice", None, connection).unwrap().player_id, a);
    }

    #[test]
    fn test_stale_connection_leave_is_ignored() {
        let mut room = room(4);
        let (a, old_connection, _) = join(&mut room, "Alice");
        let (new_connection, _rx) = ConnectionHandle::channel();
        room.join("Alice", None, new_connection.clone()).unwrap();

        assert_eq!(
            room.leave(&a, Some(old_connection.id())),
            LeaveOutcome::Ignored
        );
        assert_eq!(room.players().len(), 1);
        assert_eq!(room.leave(&a, Some(new_connection.id())), LeaveOutcome::Emptied);
        assert!(room.is_closed());
    }

    #[test]
    fn test_host_leaving_promotes_earliest_joiner() {
        let mut room = room(4);
        let (a, _, _) = join(&mut room, "Alice");
        let (b, _, mut rx_b) = join(&mut room, "Bob");
        let (_c, _, _) = join(&mut room, "Carol");
        drain(&mut rx_b);

        assert_eq!(room.leave(&a, None), LeaveOutcome::Left);
        assert_eq!(room.host_id(), Some(&b));
        assert_eq!(host_count(&room), 1);
        match drain(&mut rx_b).as_slice() {
            [ServerMessage::PlayerLeft { new_host_id, .. }] => {
                assert_eq!(new_host_id.as_ref(), Some(&b));
            }
            other => panic!("unexpected messages {:?}", other),
        }
    }

    #[test]
    fn test_one_vs_one_disbands_on_any_departure() {
        for host_leaves in [true, false] {
            let mut room = room(2);
            let (a, _, mut rx_a) = join(&mut room, "Alice");
            let (b, _, mut rx_b) = join(&mut room, "Bob");
            drain(&mut rx_a);
            drain(&mut rx_b);

            let (leaver, stayer_rx) = if host_leaves {
                (a.clone(), &mut rx_b)
            } else {
                (b.clone(), &mut rx_a)
            };
            assert_eq!(room.leave(&leaver, None), LeaveOutcome::Disbanded);
            assert!(room.is_closed());
            assert!(room.players().is_empty());
            assert!(room.timer().is_none());
            assert!(matches!(
                drain(stayer_rx).as_slice(),
                [ServerMessage::RoomDisbanded { .. }]
            ));
            assert!(room
                .take_events()
                .contains(&RoomEvent::Closed(CloseReason::Disbanded)));
        }
    }

    #[test]
    fn test_all_players_ready_excludes_host() {
        let mut room = room(4);
        let (a, _, mut rx_a) = join(&mut room, "Alice");
        let (b, _, _) = join(&mut room, "Bob");
        let (c, _, _) = join(&mut room, "Carol");
        drain(&mut rx_a);

        room.set_ready(&b, true).unwrap();
        assert!(!drain(&mut rx_a)
            .iter()
            .any(|m| matches!(m, ServerMessage::AllPlayersReady { .. })));

        room.set_ready(&c, true).unwrap();
        assert!(drain(&mut rx_a)
            .iter()
            .any(|m| matches!(m, ServerMessage::AllPlayersReady { can_start: true })));

        room.set_ready(&a, false).unwrap();
        assert!(room.all_ready());
    }

    #[test]
    fn test_start_preconditions() {
        let mut room = room(4);
        let (a, _, _) = join(&mut room, "Alice");
        assert_eq!(
            room.start_game(&a, Some(vec![question("Q")])),
            Err(ArenaError::InsufficientPlayers)
        );

        let (b, _, _) = join(&mut room, "Bob");
        assert_eq!(
            room.start_game(&b, Some(vec![question("Q")])),
            Err(ArenaError::NotHost)
        );
        assert_eq!(
            room.start_game(&a, Some(vec![question("Q")])),
            Err(ArenaError::PlayersNotReady)
        );

        room.set_ready(&b, true).unwrap();
        assert_eq!(room.start_game(&a, None), Err(ArenaError::NoQuestions));
        assert_eq!(room.start_game(&a, Some(Vec::new())), Err(ArenaError::NoQuestions));
        assert!(room.start_game(&a, Some(vec![question("Q")])).is_ok());
        assert_eq!(room.status(), RoomStatus::Countdown);
        assert_eq!(room.set_ready(&b, false), Err(ArenaError::GameInProgress));
    }

    #[test]
    fn test_phase_progression() {
        let mut room = room(4);
        let (a, _, _) = join(&mut room, "Alice");
        let (b, _, _) = join(&mut room, "Bob");
        room.set_ready(&b, true).unwrap();
        room.take_events();

        room.start_game(&a, Some(vec![question("Q1"), question("Q2")]))
            .unwrap();
        run_until(&mut room, GamePhase::Final);

        let phases: Vec<GamePhase> = room
            .take_events()
            .into_iter()
            .filter_map(|event| match event {
                RoomEvent::PhaseChanged(phase) => Some(phase),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![
                GamePhase::Starting,
                GamePhase::Countdown,
                GamePhase::Countdown,
                GamePhase::Countdown,
                GamePhase::Playing,
                GamePhase::Reveal,
                GamePhase::Playing,
                GamePhase::Reveal,
                GamePhase::Final,
            ]
        );
        assert_eq!(room.status(), RoomStatus::Finished);
        assert!(room.timer().is_none());
    }

    #[test]
    fn test_countdown_broadcasts() {
        let mut room = room(4);
        let (a, _, mut rx_a) = join(&mut room, "Alice");
        let (b, _, _) = join(&mut room, "Bob");
        room.set_ready(&b, true).unwrap();
        drain(&mut rx_a);

        room.start_game(&a, Some(vec![question("Q")])).unwrap();
        run_until(&mut room, GamePhase::Playing);

        let messages = drain(&mut rx_a);
        assert!(matches!(
            messages[0],
            ServerMessage::CountdownStarted { countdown: 3, .. }
        ));
        let ticks: Vec<u32> = messages
            .iter()
            .filter_map(|m| match m {
                ServerMessage::CountdownTick { countdown } => Some(*countdown),
                _ => None,
            })
            .collect();
        assert_eq!(ticks, vec![2, 1, 0]);
        assert!(matches!(messages[4], ServerMessage::GameStarted { .. }));
        assert!(matches!(messages[5], ServerMessage::GameState { .. }));
    }

    #[test]
    fn test_answer_scoring() {
        let (mut room, a, b, mut rx_a, _rx_b) = started_duel();
        drain(&mut rx_a);

        room.answer(&a, "Paris").unwrap();
        room.answer(&b, "London").unwrap();

        assert_eq!(room.phase(), Some(GamePhase::Reveal));
        assert_eq!(room.player(&a).unwrap().score, 1);
        assert_eq!(room.player(&b).unwrap().score, 0);

        let reveal = drain(&mut rx_a)
            .into_iter()
            .find_map(|m| match m {
                ServerMessage::GameState { game_state } => Some(game_state),
                _ => None,
            })
            .unwrap();
        assert_eq!(reveal.correct_answer.as_deref(), Some("Paris"));
        assert_eq!(reveal.scores[&a], 1);
        assert_eq!(reveal.scores[&b], 0);
    }

    #[test]
    fn test_first_answer_locks_in() {
        let mut room = room(4);
        let (a, _, _) = join(&mut room, "Alice");
        let (b, _, _) = join(&mut room, "Bob");
        let (c, _, _) = join(&mut room, "Carol");
        room.set_ready(&b, true).unwrap();
        room.set_ready(&c, true).unwrap();
        room.start_game(&a, Some(vec![question("Q")])).unwrap();
        run_until(&mut room, GamePhase::Playing);

        room.answer(&a, "London").unwrap();
        room.answer(&a, "Paris").unwrap();
        let game = room.game().unwrap();
        assert_eq!(game.answers[&a], "London");
        // No pressure clamp outside 1v1
        assert_eq!(game.time_remaining, 20);
    }

    #[test]
    fn test_answers_hidden_until_reveal() {
        let (mut room, a, _b, _rx_a, _rx_b) = started_duel();
        room.answer(&a, "Paris").unwrap();
        let view = room.game_state_view().unwrap();
        assert_eq!(view.answered_player_ids, vec![a]);
        assert!(view.answers.is_none());
        assert!(view.correct_answer.is_none());
    }

    #[test]
    fn test_pressure_rule_in_duels() {
        let (mut room, a, b, _rx_a, mut rx_b) = started_duel();
        drain(&mut rx_b);

        room.answer(&a, "Paris").unwrap();
        assert_eq!(room.game().unwrap().time_remaining, 5);
        match drain(&mut rx_b).as_slice() {
            [ServerMessage::PlayerAnswered { player_id, player_name }] => {
                assert_eq!(player_id, &a);
                assert_eq!(player_name, "Alice");
            }
            other => panic!("unexpected messages {:?}", other),
        }

        for _ in 0..5 {
            room.on_timer(TimerKind::Question);
        }
        assert_eq!(room.phase(), Some(GamePhase::Reveal));
        assert!(room.game().unwrap().answers.get(&b).is_none());
    }

    #[test]
    fn test_pressure_does_not_extend_time() {
        let (mut room, a, _b, _rx_a, _rx_b) = started_duel();
        for _ in 0..17 {
            room.on_timer(TimerKind::Question);
        }
        room.answer(&a, "Paris").unwrap();
        assert_eq!(room.game().unwrap().time_remaining, 3);
    }

    #[test]
    fn test_leave_during_question_can_trigger_reveal() {
        let mut room = room(4);
        let (a, _, _) = join(&mut room, "Alice");
        let (b, _, _) = join(&mut room, "Bob");
        let (c, _, _) = join(&mut room, "Carol");
        room.set_ready(&b, true).unwrap();
        room.set_ready(&c, true).unwrap();
        room.start_game(&a, Some(vec![question("Q")])).unwrap();
        run_until(&mut room, GamePhase::Playing);

        room.answer(&a, "Paris").unwrap();
        room.answer(&b, "Paris").unwrap();
        assert_eq!(room.phase(), Some(GamePhase::Playing));
        room.leave(&c, None);
        assert_eq!(room.phase(), Some(GamePhase::Reveal));
    }

    #[test]
    fn test_stale_timer_is_ignored() {
        let (mut room, _a, _b, _rx_a, _rx_b) = started_duel();
        room.on_timer(TimerKind::Reveal);
        assert_eq!(room.phase(), Some(GamePhase::Playing));
    }

    #[test]
    fn test_game_end_reaches_everyone() {
        let (mut room, a, b, mut rx_a, mut rx_b) = started_duel();
        room.answer(&a, "Paris").unwrap();
        room.answer(&b, "London").unwrap();
        run_until(&mut room, GamePhase::Final);

        for rx in [&mut rx_a, &mut rx_b] {
            let messages = drain(rx);
            match messages.last() {
                Some(ServerMessage::GameEnd { winner_ids, final_scores, .. }) => {
                    assert_eq!(winner_ids, &vec![a.clone()]);
                    assert_eq!(final_scores[0].score, 1);
                }
                other => panic!("unexpected last message {:?}", other),
            }
        }
        // Not ranked, nothing to settle
        assert!(room
            .take_events()
            .contains(&RoomEvent::GameCompleted { settlement: None }));
    }

    #[test]
    fn test_settings_update_rules() {
        let mut room = room(4);
        let (a, _, _) = join(&mut room, "Alice");
        let (b, _, _) = join(&mut room, "Bob");
        let (c, _, _) = join(&mut room, "Carol");

        assert_eq!(room.update_settings(&b, Some(5), None), Err(ArenaError::NotHost));
        assert_eq!(room.update_settings(&a, Some(9), None), Err(ArenaError::InvalidInput));
        assert_eq!(
            room.update_settings(&a, Some(2), None),
            Err(ArenaError::CapacityConflict)
        );

        let patch = SettingsPatch {
            difficulty: Some(crate::types::Difficulty::Hard),
            category: Some("science".to_string()),
            question_count: Some(5),
        };
        room.update_settings(&a, Some(6), Some(patch)).unwrap();
        assert_eq!(room.capacity(), 6);
        assert_eq!(room.view().settings.question_count, 5);

        room.set_ready(&b, true).unwrap();
        room.set_ready(&c, true).unwrap();
        room.start_game(&a, Some(vec![question("Q")])).unwrap();
        assert_eq!(
            room.update_settings(&a, Some(8), None),
            Err(ArenaError::SettingsLocked)
        );
    }

    #[test]
    fn test_chat_relay() {
        let mut room = room(4);
        let (a, _, mut rx_a) = join(&mut room, "Alice");
        let (_b, _, mut rx_b) = join(&mut room, "Bob");
        drain(&mut rx_a);
        drain(&mut rx_b);

        room.chat(&a, "  good luck  ").unwrap();
        for rx in [&mut rx_a, &mut rx_b] {
            match drain(rx).as_slice() {
                [ServerMessage::ChatMessage { message, player_name, .. }] => {
                    assert_eq!(message, "good luck");
                    assert_eq!(player_name, "Alice");
                }
                other => panic!("unexpected messages {:?}", other),
            }
        }
        assert_eq!(room.chat(&a, "   "), Err(ArenaError::InvalidInput));
    }

    #[test]
    fn test_ranked_room_lifecycle() {
        let (conn_a, mut rx_a) = ConnectionHandle::channel();
        let (conn_b, mut rx_b) = ConnectionHandle::channel();
        let seats = [
            RankedSeat {
                user_id: "u-a".to_string(),
                name: "Alice".to_string(),
                rating: 1000,
                connection: conn_a,
            },
            RankedSeat {
                user_id: "u-b".to_string(),
                name: "Bob".to_string(),
                rating: 1320,
                connection: conn_b,
            },
        ];
        let questions = normalize_questions(&[question("Q")]);
        let mut room = Room::ranked(
            Uuid::new_v4(),
            seats,
            questions,
            RoomSettings::default(),
            RoomTimings::default(),
        );

        assert!(room.is_ranked());
        assert_eq!(room.timer().unwrap().kind, TimerKind::MatchIntro);
        assert_eq!(host_count(&room), 1);
        match drain(&mut rx_a).as_slice() {
            [ServerMessage::MatchFound { opponent, player_id, .. }] => {
                assert_eq!(opponent.name, "Bob");
                assert_eq!(opponent.tier, Tier::Gold);
                assert_eq!(player_id, &room.players()[0].id);
            }
            other => panic!("unexpected messages {:?}", other),
        }

        run_until(&mut room, GamePhase::Playing);
        let a = room.players()[0].id.clone();
        let b = room.players()[1].id.clone();
        room.answer(&a, "Paris").unwrap();
        room.answer(&b, "Paris").unwrap();
        run_until(&mut room, GamePhase::Final);

        let settlement = room.take_events().into_iter().find_map(|event| match event {
            RoomEvent::GameCompleted { settlement } => settlement,
            _ => None,
        });
        let outcome = settlement.expect("ranked rooms settle");
        assert_eq!(outcome.entrants[0].user_id, "u-a");
        assert_eq!(outcome.entrants[1].score, 1);

        drain(&mut rx_b);
        room.apply_settlement(&SettlementReport {
            match_id: outcome.match_id,
            players: vec![PlayerSettlement {
                player_id: b.clone(),
                user_id: "u-b".to_string(),
                rating: 1320,
                delta: 0,
                tier: Tier::Gold,
                result: MatchResult::Draw,
            }],
        });
        assert!(matches!(
            drain(&mut rx_b).as_slice(),
            [ServerMessage::RankedResult { delta: 0, .. }]
        ));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Join(u8),
        Leave(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![(0u8..12).prop_map(Op::Join), (0u8..12).prop_map(Op::Leave)]
    }

    proptest! {
        #[test]
        fn prop_capacity_and_single_host(capacity in 3usize..=8, ops in prop::collection::vec(op(), 1..60)) {
            let mut room = room(capacity);
            let mut ids: HashMap<u8, PlayerId> = HashMap::new();
            let mut inboxes = Vec::new();

            for op in ops {
                match op {
                    Op::Join(n) => {
                        let before = room.players().len();
                        let (connection, rx) = ConnectionHandle::channel();
                        inboxes.push(rx);
                        match room.join(&format!("Player{}", n), None, connection) {
                            Ok(outcome) => { ids.insert(n, outcome.player_id); }
                            Err(ArenaError::RoomFull) => prop_assert_eq!(room.players().len(), before),
                            Err(ArenaError::RoomNotFound) => prop_assert!(room.is_closed()),
                            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                        }
                    }
                    Op::Leave(n) => {
                        if let Some(id) = ids.get(&n) {
                            room.leave(id, None);
                        }
                    }
                }

                prop_assert!(room.players().len() <= room.capacity());
                if room.players().is_empty() {
                    prop_assert_eq!(host_count(&room), 0);
                } else {
                    prop_assert_eq!(host_count(&room), 1);
                    prop_assert_eq!(room.host_id(), Some(&room.players().iter().find(|p| p.is_host).unwrap().id));
                }
            }
        }
    }
}
