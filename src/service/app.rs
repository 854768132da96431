//! Main application state and service coordination
//!
//! [`AppState`] owns the running service: it wires every component from the
//! configuration, serves HTTP and WebSocket traffic, and runs the background
//! tasks. Request handlers share the cheaply cloneable [`ArenaState`].

use crate::config::AppConfig;
use crate::gateway::{ws_handler, Gateway, SessionTable};
use crate::matchmaking::MatchmakingQueue;
use crate::metrics::{health_router, MetricsCollector};
use crate::questions::{HttpQuestionGenerator, QuestionPool, QuestionSource};
use crate::rating::{EloCalculator, InMemoryProfileStore, ProfileStore, RatingSettlement};
use crate::room::{RoomRegistry, RoomServices};
use crate::service::api;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Components shared by every request handler and background task
#[derive(Clone)]
pub struct ArenaState {
    config: Arc<AppConfig>,
    registry: Arc<RoomRegistry>,
    queue: Arc<MatchmakingQueue>,
    gateway: Arc<Gateway>,
    profiles: Arc<dyn ProfileStore>,
    questions: Arc<dyn QuestionSource>,
    metrics: Arc<MetricsCollector>,
    is_running: Arc<RwLock<bool>>,
    started_at: Instant,
}

impl ArenaState {
    /// Wire every component with an in-memory profile store
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        Self::with_profile_store(config, Arc::new(InMemoryProfileStore::new()))
    }

    /// Wire every component around an existing profile store
    pub fn with_profile_store(
        config: AppConfig,
        profiles: Arc<dyn ProfileStore>,
    ) -> Result<Self, ServiceError> {
        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        let pool = Arc::new(Self::initialize_pool(&config)?);
        let questions = Self::initialize_question_source(&config, pool.clone())?;

        let settlement = Arc::new(RatingSettlement::new(
            profiles.clone(),
            EloCalculator::new(config.rating.elo()),
            config.rating.settlement(),
        ));
        let registry = Arc::new(RoomRegistry::new(
            RoomServices {
                settlement: Some(settlement),
                metrics: Some(metrics.clone()),
            },
            config.game.timings(),
            config.game.default_capacity,
        ));

        let sessions = Arc::new(SessionTable::new());
        let queue = Arc::new(
            MatchmakingQueue::new(
                config.matchmaking.policy(config.rating.initial_rating),
                registry.clone(),
                pool,
                profiles.clone(),
                sessions.clone(),
            )
            .with_metrics(metrics.clone()),
        );
        let gateway = Arc::new(
            Gateway::new(registry.clone(), queue.clone(), sessions).with_metrics(metrics.clone()),
        );

        Ok(Self {
            config: Arc::new(config),
            registry,
            queue,
            gateway,
            profiles,
            questions,
            metrics,
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        })
    }

    fn initialize_pool(config: &AppConfig) -> Result<QuestionPool, ServiceError> {
        let pool = QuestionPool::seeded();
        if let Some(path) = &config.questions.pool_file {
            let extra = QuestionPool::from_file(path).map_err(|e| ServiceError::Configuration {
                message: format!("Failed to load question pool {}: {}", path.display(), e),
            })?;
            pool.extend(extra.into_questions())
                .map_err(|e| ServiceError::Initialization {
                    message: e.to_string(),
                })?;
        }
        Ok(pool)
    }

    fn initialize_question_source(
        config: &AppConfig,
        pool: Arc<QuestionPool>,
    ) -> Result<Arc<dyn QuestionSource>, ServiceError> {
        match &config.questions.generator_url {
            Some(url) => {
                let generator = HttpQuestionGenerator::new(url, config.generator_timeout())
                    .map_err(|e| ServiceError::Initialization {
                        message: format!("Failed to create question generator: {}", e),
                    })?;
                info!("On-demand questions from {}", url);
                Ok(Arc::new(generator))
            }
            None => {
                info!("No question generator configured, serving from the seeded pool");
                Ok(pool)
            }
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn queue(&self) -> &Arc<MatchmakingQueue> {
        &self.queue
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    pub fn profiles(&self) -> &Arc<dyn ProfileStore> {
        &self.profiles
    }

    pub fn questions(&self) -> &Arc<dyn QuestionSource> {
        &self.questions
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    async fn set_running(&self, running: bool) {
        *self.is_running.write().await = running;
    }

    /// Full HTTP surface: REST API, WebSocket gateway and health routes
    pub fn router(&self) -> Router {
        Router::new()
            .merge(api::router(self.clone()))
            .merge(health_router(self.clone()))
            .merge(
                Router::new()
                    .route("/ws", get(ws_handler))
                    .with_state(self.gateway.clone()),
            )
    }
}

/// The running service
pub struct AppState {
    state: ArenaState,
    background_tasks: Vec<JoinHandle<()>>,
    server_task: Option<JoinHandle<()>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing trivia arena service");
        let state = ArenaState::new(config)?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            state,
            background_tasks: Vec::new(),
            server_task: None,
            shutdown_tx,
        })
    }

    pub fn state(&self) -> &ArenaState {
        &self.state
    }

    pub fn config(&self) -> &AppConfig {
        self.state.config()
    }

    /// Bind the HTTP server and start background tasks
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting trivia arena service");

        let address = self.config().bind_address();
        let listener =
            TcpListener::bind(&address)
                .await
                .map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to bind {}: {}", address, e),
                })?;
        info!("HTTP server listening on http://{}", address);

        self.state.set_running(true).await;

        let router = self.state.router();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        self.server_task = Some(tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                    info!("HTTP server shutdown signal received");
                })
                .await;
            if let Err(e) = served {
                error!("HTTP server failed: {}", e);
            }
            info!("HTTP server stopped");
        }));

        self.start_background_tasks();

        info!("Trivia arena service started");
        Ok(())
    }

    fn start_background_tasks(&mut self) {
        let tick_interval = self.config().matchmaking.tick_interval();
        self.background_tasks
            .push(self.state.queue.clone().start(tick_interval));

        info!("Starting health metrics task (30s interval)...");
        let state = self.state.clone();
        self.background_tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            while state.is_running().await {
                interval.tick().await;

                let metrics = state.metrics();
                metrics
                    .service()
                    .uptime_seconds
                    .set(state.uptime().as_secs() as i64);
                metrics.set_queue_size(state.queue.len());
                metrics.update_health_status(2);
                metrics.update_component_health("room_registry", true);
                metrics.update_component_health("matchmaking_queue", true);
                debug!(
                    "Updated service metrics - rooms: {}, queued: {}",
                    state.registry.len(),
                    state.queue.len()
                );
            }
        }));

        info!(
            "{} background tasks started successfully",
            self.background_tasks.len()
        );
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of trivia arena service");
        self.state.set_running(false).await;

        for task in self.background_tasks.drain(..) {
            task.abort();
        }

        let rooms = self.state.registry.len();
        self.state.registry.close_all().await;
        info!("Closed {} rooms", rooms);

        if self.shutdown_tx.send(()).is_err() {
            debug!("HTTP server already stopped");
        }
        if let Some(server) = self.server_task.take() {
            let timeout = self.config().shutdown_timeout();
            if tokio::time::timeout(timeout, server).await.is_err() {
                warn!("HTTP server did not stop within {}s", timeout.as_secs());
                return Err(ServiceError::BackgroundTask {
                    message: "HTTP server shutdown timed out".to_string(),
                });
            }
        }

        info!("Trivia arena service shutdown completed");
        Ok(())
    }
}
