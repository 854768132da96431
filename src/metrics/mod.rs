//! Metrics and monitoring for the trivia arena
//!
//! Prometheus collectors plus the health and metrics HTTP routes.

pub mod collector;
pub mod health;

pub use collector::{
    origin_label, MetricsCollector, QueueMetrics, RoomMetrics, ServiceMetrics,
    SettlementMetrics, ORIGIN_CUSTOM, ORIGIN_RANKED,
};
pub use health::health_router;
