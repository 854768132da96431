//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the trivia arena: rooms,
//! games, the ranked queue, settlement and the connection gateway.

use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::Duration;

/// Label for rooms created through the lobby
pub const ORIGIN_CUSTOM: &str = "custom";

/// Label for rooms synthesized by matchmaking
pub const ORIGIN_RANKED: &str = "ranked";

/// Map the ranked flag onto the origin/mode label
pub fn origin_label(ranked: bool) -> &'static str {
    if ranked {
        ORIGIN_RANKED
    } else {
        ORIGIN_CUSTOM
    }
}

/// Main metrics collector for the arena
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Room and game metrics
    room_metrics: RoomMetrics,

    /// Ranked queue metrics
    queue_metrics: QueueMetrics,

    /// Settlement metrics
    settlement_metrics: SettlementMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Live duplex connections
    pub connections: IntGauge,

    /// Inbound messages by type
    pub messages_total: IntCounterVec,

    /// Errors reported to clients, by kind
    pub errors_total: IntCounterVec,

    /// Inbound message handling time
    pub message_duration: HistogramVec,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Room and game metrics
#[derive(Clone)]
pub struct RoomMetrics {
    /// Rooms currently alive, by origin
    pub active_rooms: IntGaugeVec,

    /// Total rooms created, by origin
    pub rooms_created_total: IntCounterVec,

    /// Total rooms closed, by reason
    pub rooms_closed_total: IntCounterVec,

    /// Total games started, by mode
    pub games_started_total: IntCounterVec,

    /// Total games that reached the final phase, by mode
    pub games_completed_total: IntCounterVec,
}

/// Ranked queue metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Players currently waiting
    pub queue_size: IntGauge,

    /// Total enqueue requests
    pub players_queued_total: IntCounter,

    /// Total pairs matched
    pub matches_total: IntCounter,

    /// Time spent waiting before a match
    pub queue_wait_time_seconds: Histogram,

    /// Rating of matched players
    pub rating_distribution: Histogram,
}

/// Ranked settlement metrics
#[derive(Clone)]
pub struct SettlementMetrics {
    /// Settlements by status
    pub settlements_total: IntCounterVec,

    /// Settlement duration including retries
    pub settlement_duration: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let room_metrics = RoomMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let settlement_metrics = SettlementMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            room_metrics,
            queue_metrics,
            settlement_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get room metrics
    pub fn rooms(&self) -> &RoomMetrics {
        &self.room_metrics
    }

    /// Get queue metrics
    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    /// Get settlement metrics
    pub fn settlement(&self) -> &SettlementMetrics {
        &self.settlement_metrics
    }

    /// Record a room being created
    pub fn record_room_created(&self, ranked: bool) {
        let origin = origin_label(ranked);
        self.room_metrics
            .rooms_created_total
            .with_label_values(&[origin])
            .inc();
        self.room_metrics
            .active_rooms
            .with_label_values(&[origin])
            .inc();
    }

    /// Record a room being torn down
    pub fn record_room_closed(&self, ranked: bool, reason: &str) {
        self.room_metrics
            .rooms_closed_total
            .with_label_values(&[reason])
            .inc();
        self.room_metrics
            .active_rooms
            .with_label_values(&[origin_label(ranked)])
            .dec();
    }

    /// Record a game starting
    pub fn record_game_started(&self, ranked: bool) {
        self.room_metrics
            .games_started_total
            .with_label_values(&[origin_label(ranked)])
            .inc();
    }

    /// Record a game reaching the final phase
    pub fn record_game_completed(&self, ranked: bool) {
        self.room_metrics
            .games_completed_total
            .with_label_values(&[origin_label(ranked)])
            .inc();
    }

    /// Record a connection opening or closing
    pub fn record_connection(&self, opened: bool) {
        if opened {
            self.service_metrics.connections.inc();
        } else {
            self.service_metrics.connections.dec();
        }
    }

    /// Record an inbound message being handled
    pub fn record_message(&self, kind: &str, duration: Duration) {
        self.service_metrics
            .messages_total
            .with_label_values(&[kind])
            .inc();
        self.service_metrics
            .message_duration
            .with_label_values(&[kind])
            .observe(duration.as_secs_f64());
    }

    /// Record an error sent back to a client
    pub fn record_error(&self, kind: &str) {
        self.service_metrics
            .errors_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Record a player entering the ranked queue
    pub fn record_enqueued(&self) {
        self.queue_metrics.players_queued_total.inc();
    }

    /// Update the current queue size
    pub fn set_queue_size(&self, size: usize) {
        self.queue_metrics.queue_size.set(size as i64);
    }

    /// Record a pair being matched
    pub fn record_match(&self, waits: [Duration; 2], ratings: [i32; 2]) {
        self.queue_metrics.matches_total.inc();
        for wait in waits {
            self.queue_metrics
                .queue_wait_time_seconds
                .observe(wait.as_secs_f64());
        }
        for rating in ratings {
            self.queue_metrics
                .rating_distribution
                .observe(rating as f64);
        }
    }

    /// Record a settlement outcome
    pub fn record_settlement(&self, success: bool, duration: Duration) {
        let status = if success { "success" } else { "failed" };
        self.settlement_metrics
            .settlements_total
            .with_label_values(&[status])
            .inc();
        self.settlement_metrics
            .settlement_duration
            .observe(duration.as_secs_f64());
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("trivia_arena_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let connections = IntGauge::new("trivia_arena_connections", "Live client connections")?;
        registry.register(Box::new(connections.clone()))?;

        let messages_total = IntCounterVec::new(
            Opts::new(
                "trivia_arena_messages_total",
                "Total inbound messages handled",
            ),
            &["type"],
        )?;
        registry.register(Box::new(messages_total.clone()))?;

        let errors_total = IntCounterVec::new(
            Opts::new(
                "trivia_arena_errors_total",
                "Total errors reported to clients",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(errors_total.clone()))?;

        let message_duration = HistogramVec::new(
            HistogramOpts::new(
                "trivia_arena_message_duration_seconds",
                "Inbound message handling time",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
            &["type"],
        )?;
        registry.register(Box::new(message_duration.clone()))?;

        let health_status = IntGauge::new(
            "trivia_arena_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("trivia_arena_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            connections,
            messages_total,
            errors_total,
            message_duration,
            health_status,
            component_health,
        })
    }
}

impl RoomMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_rooms = IntGaugeVec::new(
            Opts::new("trivia_arena_active_rooms", "Number of active rooms"),
            &["origin"],
        )?;
        registry.register(Box::new(active_rooms.clone()))?;

        let rooms_created_total = IntCounterVec::new(
            Opts::new("trivia_arena_rooms_created_total", "Total rooms created"),
            &["origin"],
        )?;
        registry.register(Box::new(rooms_created_total.clone()))?;

        let rooms_closed_total = IntCounterVec::new(
            Opts::new("trivia_arena_rooms_closed_total", "Total rooms closed"),
            &["reason"],
        )?;
        registry.register(Box::new(rooms_closed_total.clone()))?;

        let games_started_total = IntCounterVec::new(
            Opts::new("trivia_arena_games_started_total", "Total games started"),
            &["mode"],
        )?;
        registry.register(Box::new(games_started_total.clone()))?;

        let games_completed_total = IntCounterVec::new(
            Opts::new(
                "trivia_arena_games_completed_total",
                "Total games played to the end",
            ),
            &["mode"],
        )?;
        registry.register(Box::new(games_completed_total.clone()))?;

        Ok(Self {
            active_rooms,
            rooms_created_total,
            rooms_closed_total,
            games_started_total,
            games_completed_total,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let queue_size = IntGauge::new(
            "trivia_arena_queue_size",
            "Players currently waiting for a ranked match",
        )?;
        registry.register(Box::new(queue_size.clone()))?;

        let players_queued_total = IntCounter::new(
            "trivia_arena_players_queued_total",
            "Total ranked queue joins",
        )?;
        registry.register(Box::new(players_queued_total.clone()))?;

        let matches_total =
            IntCounter::new("trivia_arena_matches_total", "Total ranked pairs matched")?;
        registry.register(Box::new(matches_total.clone()))?;

        let queue_wait_time_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "trivia_arena_queue_wait_time_seconds",
                "Ranked queue wait time",
            )
            .buckets(vec![1.0, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0, 300.0]),
        )?;
        registry.register(Box::new(queue_wait_time_seconds.clone()))?;

        let rating_distribution = Histogram::with_opts(
            HistogramOpts::new(
                "trivia_arena_rating_distribution",
                "Rating of matched players",
            )
            .buckets(vec![
                500.0, 1000.0, 1100.0, 1300.0, 1500.0, 1700.0, 1900.0, 2500.0,
            ]),
        )?;
        registry.register(Box::new(rating_distribution.clone()))?;

        Ok(Self {
            queue_size,
            players_queued_total,
            matches_total,
            queue_wait_time_seconds,
            rating_distribution,
        })
    }
}

impl SettlementMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let settlements_total = IntCounterVec::new(
            Opts::new(
                "trivia_arena_settlements_total",
                "Ranked settlements by status",
            ),
            &["status"],
        )?;
        registry.register(Box::new(settlements_total.clone()))?;

        let settlement_duration = Histogram::with_opts(
            HistogramOpts::new(
                "trivia_arena_settlement_duration_seconds",
                "Ranked settlement time including retries",
            )
            .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(settlement_duration.clone()))?;

        Ok(Self {
            settlements_total,
            settlement_duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().unwrap();
        assert!(!collector.registry().gather().is_empty());
    }

    #[test]
    fn test_room_lifecycle_metrics() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_room_created(false);
        collector.record_room_created(true);
        collector.record_room_closed(false, "empty");

        let rooms = collector.rooms();
        assert_eq!(rooms.active_rooms.with_label_values(&["custom"]).get(), 0);
        assert_eq!(rooms.active_rooms.with_label_values(&["ranked"]).get(), 1);
        assert_eq!(
            rooms.rooms_created_total.with_label_values(&["custom"]).get(),
            1
        );
    }

    #[test]
    fn test_queue_and_settlement_metrics() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_enqueued();
        collector.set_queue_size(3);
        collector.record_match([Duration::from_secs(4), Duration::from_secs(9)], [1000, 1040]);
        collector.record_settlement(false, Duration::from_millis(20));

        assert_eq!(collector.queue().queue_size.get(), 3);
        assert_eq!(collector.queue().matches_total.get(), 1);
        assert_eq!(collector.queue().queue_wait_time_seconds.get_sample_count(), 2);
        assert_eq!(
            collector
                .settlement()
                .settlements_total
                .with_label_values(&["failed"])
                .get(),
            1
        );
    }
}
