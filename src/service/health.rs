//! Health checks for the trivia arena service
//!
//! Readiness and liveness probes plus a detailed component report used by the
//! `/stats` endpoint and the `--health-check` command line flag.

use crate::service::app::ArenaState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Gauge value exported as `trivia_arena_health_status`
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    fn worst(self, other: &HealthStatus) -> HealthStatus {
        match (&self, other) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Optional error message if not healthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    pub active_rooms: usize,
    pub players_queued: usize,
    /// Connections currently bound to a room
    pub sessions: usize,
    /// Stored ranked profiles, when the store can be read
    pub profiles: Option<usize>,
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(state: &ArenaState) -> Result<Self> {
        let checks = vec![
            Self::check_service_running(state).await,
            Self::check_room_registry(state),
            Self::check_matchmaking_queue(state).await,
            Self::check_profile_store(state),
        ];

        let status = checks
            .iter()
            .fold(HealthStatus::Healthy, |overall, check| {
                overall.worst(&check.status)
            });

        for check in &checks {
            state
                .metrics()
                .update_component_health(&check.name, check.status != HealthStatus::Unhealthy);
        }
        state.metrics().update_health_status(status.as_gauge());

        Ok(HealthCheck {
            status,
            service: state.config().service.name.clone(),
            version: crate::VERSION.to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats: Self::gather_service_stats(state),
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(state: &ArenaState) -> Result<HealthStatus> {
        if state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify service can handle requests
    pub async fn readiness_check(state: &ArenaState) -> Result<HealthStatus> {
        if !state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_room_registry(state)
            .status
            .worst(&Self::check_profile_store(state).status))
    }

    async fn check_service_running(state: &ArenaState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// A room whose actor stopped but is still registered is a leak
    fn check_room_registry(state: &ArenaState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let stale = state
            .registry()
            .handles()
            .iter()
            .filter(|room| room.is_closed())
            .count();
        let (status, message) = if stale == 0 {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Degraded,
                Some(format!("{} closed rooms still registered", stale)),
            )
        };

        ComponentCheck {
            name: "room_registry".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn check_matchmaking_queue(state: &ArenaState) -> ComponentCheck {
        let start = std::time::Instant::now();

        // The queue only ticks while the service runs
        let (status, message) = if state.is_running().await || state.queue().is_empty() {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Degraded,
                Some(format!(
                    "{} players queued while matchmaking is stopped",
                    state.queue().len()
                )),
            )
        };

        ComponentCheck {
            name: "matchmaking_queue".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_profile_store(state: &ArenaState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match state.profiles().profile_count() {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Profile store check failed: {}", e);
                (
                    HealthStatus::Degraded,
                    Some(format!("Profile store unavailable: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "profile_store".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn gather_service_stats(state: &ArenaState) -> ServiceStats {
        let profiles = match state.profiles().profile_count() {
            Ok(count) => Some(count),
            Err(e) => {
                debug!("Failed to count profiles for health check: {}", e);
                None
            }
        };

        ServiceStats {
            active_rooms: state.registry().len(),
            players_queued: state.queue().len(),
            sessions: state.gateway().sessions().len(),
            profiles,
            uptime_seconds: state.uptime().as_secs(),
        }
    }
}

/// Convert health check to JSON string
impl HealthCheck {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::rating::storage::MockProfileStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_stopped_service_is_unhealthy() {
        let state = ArenaState::new(AppConfig::default()).unwrap();
        let health = HealthCheck::check(&state).await.unwrap();

        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(health.service, "trivia-arena");
        assert_eq!(health.checks.len(), 4);
        assert_eq!(health.stats.active_rooms, 0);
        assert_eq!(health.stats.profiles, Some(0));
        assert_eq!(
            HealthCheck::liveness_check(&state).await.unwrap(),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            HealthCheck::readiness_check(&state).await.unwrap(),
            HealthStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn test_broken_profile_store_degrades() {
        let mut store = MockProfileStore::new();
        store
            .expect_profile_count()
            .returning(|| Err(anyhow::anyhow!("disk gone")));
        let state =
            ArenaState::with_profile_store(AppConfig::default(), Arc::new(store)).unwrap();

        let health = HealthCheck::check(&state).await.unwrap();
        let profile_check = health
            .checks
            .iter()
            .find(|check| check.name == "profile_store")
            .unwrap();
        assert_eq!(profile_check.status, HealthStatus::Degraded);
        assert_eq!(health.stats.profiles, None);
    }

    #[test]
    fn test_worst_status_wins() {
        assert_eq!(
            HealthStatus::Healthy.worst(&HealthStatus::Degraded),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::Degraded.worst(&HealthStatus::Unhealthy),
            HealthStatus::Unhealthy
        );
        assert_eq!(HealthStatus::Healthy.as_gauge(), 2);
    }

    #[test]
    fn test_health_check_serializes() {
        let health = HealthCheck {
            status: HealthStatus::Healthy,
            service: "trivia-arena".to_string(),
            version: crate::VERSION.to_string(),
            timestamp: chrono::Utc::now(),
            checks: vec![],
            stats: ServiceStats {
                active_rooms: 1,
                players_queued: 2,
                sessions: 3,
                profiles: Some(4),
                uptime_seconds: 5,
            },
        };
        let json = health.to_json().unwrap();
        assert!(json.contains("\"healthy\""));
        assert!(json.contains("\"players_queued\": 2"));
    }
}
