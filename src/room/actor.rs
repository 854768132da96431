//! Per-room actor
//!
//! Every room runs in its own task. All mutation arrives through the
//! mailbox, and the one armed timer is awaited in the same `select!` loop, so
//! transitions within a room are strictly serialized while rooms run
//! independently of each other.

use crate::error::{ArenaError, ArenaResult};
use crate::gateway::connection::ConnectionHandle;
use crate::gateway::protocol::{ServerMessage, SettingsPatch};
use crate::metrics::MetricsCollector;
use crate::questions::RawQuestion;
use crate::rating::{MatchOutcome, RatingSettlement, SettlementReport};
use crate::room::model::{CloseReason, JoinOutcome, LeaveOutcome, Room, RoomEvent};
use crate::types::{ConnectionId, GamePhase, PlayerId, RoomId, RoomView};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// Mailbox depth per room
const MAILBOX_CAPACITY: usize = 256;

/// Collaborators a room needs outside its own state
#[derive(Clone, Default)]
pub struct RoomServices {
    pub settlement: Option<Arc<RatingSettlement>>,
    pub metrics: Option<Arc<MetricsCollector>>,
}

type Reply<T> = oneshot::Sender<ArenaResult<T>>;

/// Commands accepted by a room actor
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        player_name: String,
        password: Option<String>,
        connection: ConnectionHandle,
        reply: Reply<JoinOutcome>,
    },
    Leave {
        player_id: PlayerId,
        connection_id: Option<ConnectionId>,
        reply: Reply<LeaveOutcome>,
    },
    SetReady {
        player_id: PlayerId,
        ready: bool,
        reply: Reply<()>,
    },
    StartGame {
        player_id: PlayerId,
        questions: Option<Vec<RawQuestion>>,
        reply: Reply<()>,
    },
    Answer {
        player_id: PlayerId,
        answer: String,
        reply: Reply<()>,
    },
    Chat {
        player_id: PlayerId,
        message: String,
        reply: Reply<()>,
    },
    UpdateSettings {
        player_id: PlayerId,
        max_players: Option<usize>,
        settings: Option<SettingsPatch>,
        reply: Reply<()>,
    },
    RankedSettled(SettlementReport),
    Shutdown,
}

/// Cloneable handle used to talk to a room actor
#[derive(Debug, Clone)]
pub struct RoomHandle {
    id: RoomId,
    commands: mpsc::Sender<RoomCommand>,
    snapshot: watch::Receiver<RoomView>,
}

impl RoomHandle {
    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Latest published snapshot of the room
    pub fn view(&self) -> RoomView {
        self.snapshot.borrow().clone()
    }

    /// Whether the actor behind this handle has stopped
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> RoomCommand) -> ArenaResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| ArenaError::RoomNotFound)?;
        response.await.map_err(|_| ArenaError::RoomNotFound)?
    }

    pub async fn join(
        &self,
        player_name: String,
        password: Option<String>,
        connection: ConnectionHandle,
    ) -> ArenaResult<JoinOutcome> {
        self.request(|reply| RoomCommand::Join {
            player_name,
            password,
            connection,
            reply,
        })
        .await
    }

    /// Leave the room; a vanished room counts as already left
    pub async fn leave(
        &self,
        player_id: PlayerId,
        connection_id: Option<ConnectionId>,
    ) -> LeaveOutcome {
        self.request(|reply| RoomCommand::Leave {
            player_id,
            connection_id,
            reply,
        })
        .await
        .unwrap_or(LeaveOutcome::Ignored)
    }

    pub async fn set_ready(&self, player_id: PlayerId, ready: bool) -> ArenaResult<()> {
        self.request(|reply| RoomCommand::SetReady {
            player_id,
            ready,
            reply,
        })
        .await
    }

    pub async fn start_game(
        &self,
        player_id: PlayerId,
        questions: Option<Vec<RawQuestion>>,
    ) -> ArenaResult<()> {
        self.request(|reply| RoomCommand::StartGame {
            player_id,
            questions,
            reply,
        })
        .await
    }

    pub async fn answer(&self, player_id: PlayerId, answer: String) -> ArenaResult<()> {
        self.request(|reply| RoomCommand::Answer {
            player_id,
            answer,
            reply,
        })
        .await
    }

    pub async fn chat(&self, player_id: PlayerId, message: String) -> ArenaResult<()> {
        self.request(|reply| RoomCommand::Chat {
            player_id,
            message,
            reply,
        })
        .await
    }

    pub async fn update_settings(
        &self,
        player_id: PlayerId,
        max_players: Option<usize>,
        settings: Option<SettingsPatch>,
    ) -> ArenaResult<()> {
        self.request(|reply| RoomCommand::UpdateSettings {
            player_id,
            max_players,
            settings,
            reply,
        })
        .await
    }

    /// Ask the room to close, notifying anyone still inside
    pub async fn shutdown(&self) {
        if self.commands.send(RoomCommand::Shutdown).await.is_err() {
            debug!("Room {} already stopped", self.id);
        }
    }
}

/// The task that owns a [`Room`]
pub struct RoomActor {
    room: Room,
    commands: mpsc::Receiver<RoomCommand>,
    mailbox: mpsc::WeakSender<RoomCommand>,
    snapshot: watch::Sender<RoomView>,
    services: RoomServices,
    armed_epoch: Option<u64>,
    deadline: Option<Instant>,
}

impl RoomActor {
    /// Build the actor and the handle that talks to it
    pub fn new(room: Room, services: RoomServices) -> (RoomHandle, RoomActor) {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let (snapshot, snapshot_rx) = watch::channel(room.view());

        let handle = RoomHandle {
            id: room.id(),
            commands: tx.clone(),
            snapshot: snapshot_rx,
        };
        let actor = RoomActor {
            room,
            commands: rx,
            mailbox: tx.downgrade(),
            snapshot,
            services,
            armed_epoch: None,
            deadline: None,
        };
        (handle, actor)
    }

    /// Run until the room closes
    pub async fn run(mut self) {
        let room_id = self.room.id();
        debug!("Room {} actor started", room_id);
        self.after_transition();

        while !self.room.is_closed() {
            self.sync_timer();

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    // Every handle is gone; nobody can reach this room any more
                    None => self.room.shutdown(),
                },
                _ = wait_for(self.deadline) => self.fire_timer(),
            }

            self.after_transition();
        }

        debug!("Room {} actor stopped", room_id);
    }

    fn handle(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Join {
                player_name,
                password,
                connection,
                reply,
            } => {
                let result = self
                    .room
                    .join(&player_name, password.as_deref(), connection);
                let _ = reply.send(result);
            }
            RoomCommand::Leave {
                player_id,
                connection_id,
                reply,
            } => {
                let outcome = self.room.leave(&player_id, connection_id);
                let _ = reply.send(Ok(outcome));
            }
            RoomCommand::SetReady {
                player_id,
                ready,
                reply,
            } => {
                let _ = reply.send(self.room.set_ready(&player_id, ready));
            }
            RoomCommand::StartGame {
                player_id,
                questions,
                reply,
            } => {
                let _ = reply.send(self.room.start_game(&player_id, questions));
            }
            RoomCommand::Answer {
                player_id,
                answer,
                reply,
            } => {
                let _ = reply.send(self.room.answer(&player_id, &answer));
            }
            RoomCommand::Chat {
                player_id,
                message,
                reply,
            } => {
                let _ = reply.send(self.room.chat(&player_id, &message));
            }
            RoomCommand::UpdateSettings {
                player_id,
                max_players,
                settings,
                reply,
            } => {
                let _ = reply.send(self.room.update_settings(&player_id, max_players, settings));
            }
            RoomCommand::RankedSettled(report) => self.room.apply_settlement(&report),
            RoomCommand::Shutdown => self.room.shutdown(),
        }
    }

    /// Re-arm the deadline whenever the room swapped or cancelled its timer
    fn sync_timer(&mut self) {
        let epoch = self.room.timer_epoch();
        if self.armed_epoch == Some(epoch) {
            return;
        }
        self.armed_epoch = Some(epoch);
        self.deadline = self.room.timer().map(|timer| Instant::now() + timer.period);
    }

    fn fire_timer(&mut self) {
        let Some(timer) = self.room.timer() else {
            self.deadline = None;
            return;
        };
        let epoch = self.room.timer_epoch();
        self.room.on_timer(timer.kind);

        // Same timer still armed: keep a fixed cadence instead of drifting
        if timer.repeating && self.room.timer_epoch() == epoch {
            self.deadline = self.deadline.map(|deadline| deadline + timer.period);
        }
    }

    fn after_transition(&mut self) {
        for event in self.room.take_events() {
            match event {
                RoomEvent::PhaseChanged(phase) => {
                    debug!("Room {} entered {:?}", self.room.id(), phase);
                    if phase == GamePhase::Starting {
                        if let Some(metrics) = &self.services.metrics {
                            metrics.record_game_started(self.room.is_ranked());
                        }
                    }
                }
                RoomEvent::GameCompleted { settlement } => {
                    if let Some(metrics) = &self.services.metrics {
                        metrics.record_game_completed(self.room.is_ranked());
                    }
                    if let Some(started) = self.room.ranked_started_at() {
                        info!(
                            "Ranked room {} finished in {}s",
                            self.room.id(),
                            (chrono::Utc::now() - started).num_seconds()
                        );
                    }
                    if let Some(outcome) = settlement {
                        self.spawn_settlement(outcome);
                    }
                }
                RoomEvent::Closed(reason) => {
                    let label = match reason {
                        CloseReason::Empty => "empty",
                        CloseReason::Disbanded => "disbanded",
                        CloseReason::Deleted => "deleted",
                    };
                    info!("Room {} closed ({})", self.room.id(), label);
                    if let Some(metrics) = &self.services.metrics {
                        metrics.record_room_closed(self.room.is_ranked(), label);
                    }
                }
            }
        }

        self.snapshot.send_replace(self.room.view());
    }

    /// Settle off the room's critical path and report back through the mailbox
    fn spawn_settlement(&self, outcome: MatchOutcome) {
        let Some(settlement) = self.services.settlement.clone() else {
            warn!(
                "No rating settlement configured, skipping ranked match {}",
                outcome.match_id
            );
            return;
        };
        let mailbox = self.mailbox.clone();
        let metrics = self.services.metrics.clone();
        let room_id = self.room.id();
        let connections: Vec<(PlayerId, ConnectionHandle)> = self
            .room
            .players()
            .iter()
            .map(|p| (p.id.clone(), p.connection.clone()))
            .collect();

        tokio::spawn(async move {
            let started = Instant::now();
            let result = settlement.settle(&outcome).await;
            if let Some(metrics) = &metrics {
                metrics.record_settlement(result.is_ok(), started.elapsed());
            }

            let report = match result {
                Ok(report) => report,
                Err(e) => {
                    error!(
                        "Ranked settlement for match {} in room {} failed: {}",
                        outcome.match_id, room_id, e
                    );
                    return;
                }
            };

            let delivered = match mailbox.upgrade() {
                Some(tx) => tx
                    .send(RoomCommand::RankedSettled(report.clone()))
                    .await
                    .is_ok(),
                None => false,
            };
            if !delivered {
                debug!(
                    "Room {} closed before settlement finished, delivering directly",
                    room_id
                );
                deliver_directly(&report, &connections);
            }
        });
    }
}

fn deliver_directly(report: &SettlementReport, connections: &[(PlayerId, ConnectionHandle)]) {
    for result in &report.players {
        if let Some((_, connection)) = connections.iter().find(|(id, _)| *id == result.player_id) {
            connection.send(ServerMessage::RankedResult {
                rating: result.rating,
                delta: result.delta,
                tier: result.tier,
                result: result.result,
            });
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
