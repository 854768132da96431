//! Service layer for the trivia arena
//!
//! This module contains the shared application state, the REST surface,
//! health checks and background task management.

pub mod api;
pub mod app;
pub mod health;

pub use app::{AppState, ArenaState, ServiceError};
pub use health::{HealthCheck, HealthStatus};
