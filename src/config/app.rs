//! Main application configuration
//!
//! Defaults come from [`Default`], then a TOML file or the environment
//! overrides them. Every loader ends in [`validate_config`].

use crate::config::game::{GameSettings, MatchmakingSettings};
use crate::config::rating::RatingSettings;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub game: GameSettings,
    pub matchmaking: MatchmakingSettings,
    pub rating: RatingSettings,
    pub questions: QuestionSettings,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Address the HTTP server binds to
    pub host: String,
    /// Port serving the REST API, the WebSocket gateway and health routes
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Question backends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionSettings {
    /// On-demand generator endpoint; the seeded pool is used when unset
    pub generator_url: Option<String>,
    pub generator_timeout_seconds: u64,
    /// JSON file of extra seed questions
    pub pool_file: Option<PathBuf>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "trivia-arena".to_string(),
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            http_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for QuestionSettings {
    fn default() -> Self {
        Self {
            generator_url: None,
            generator_timeout_seconds: 15,
            pool_file: None,
        }
    }
}

/// Overwrite `target` with the parsed value of `key` when it is set
fn override_from_env<T: FromStr>(key: &str, target: &mut T) -> Result<()> {
    if let Ok(raw) = env::var(key) {
        *target = raw
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", key, raw))?;
    }
    Ok(())
}

fn optional_from_env(key: &str, target: &mut Option<String>) {
    if let Ok(raw) = env::var(key) {
        *target = if raw.trim().is_empty() { None } else { Some(raw) };
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load a TOML file, then let the environment override it
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        override_from_env("SERVICE_NAME", &mut self.service.name)?;
        override_from_env("LOG_LEVEL", &mut self.service.log_level)?;
        override_from_env("HOST", &mut self.service.host)?;
        override_from_env("HTTP_PORT", &mut self.service.http_port)?;
        override_from_env(
            "SHUTDOWN_TIMEOUT_SECONDS",
            &mut self.service.shutdown_timeout_seconds,
        )?;

        // Game timing
        override_from_env("COUNTDOWN_SECONDS", &mut self.game.countdown_seconds)?;
        override_from_env("QUESTION_SECONDS", &mut self.game.question_seconds)?;
        override_from_env("REVEAL_SECONDS", &mut self.game.reveal_seconds)?;
        override_from_env(
            "PRESSURE_THRESHOLD_SECONDS",
            &mut self.game.pressure_threshold_seconds,
        )?;
        override_from_env("DEFAULT_CAPACITY", &mut self.game.default_capacity)?;
        override_from_env("MATCH_INTRO_MILLIS", &mut self.game.match_intro_millis)?;
        override_from_env("MAX_CHAT_LENGTH", &mut self.game.max_chat_length)?;

        // Matchmaking
        override_from_env(
            "MATCHMAKING_TICK_SECONDS",
            &mut self.matchmaking.tick_interval_seconds,
        )?;
        override_from_env("BASE_TOLERANCE", &mut self.matchmaking.base_tolerance)?;
        override_from_env(
            "TOLERANCE_PER_SECOND",
            &mut self.matchmaking.tolerance_per_second,
        )?;
        override_from_env(
            "QUESTIONS_PER_MATCH",
            &mut self.matchmaking.questions_per_match,
        )?;

        // Rating
        override_from_env("INITIAL_RATING", &mut self.rating.initial_rating)?;
        override_from_env("K_FACTOR", &mut self.rating.k_factor)?;
        override_from_env("MIN_DELTA", &mut self.rating.min_delta)?;
        override_from_env("SETTLEMENT_ATTEMPTS", &mut self.rating.settlement_attempts)?;
        override_from_env(
            "SETTLEMENT_RETRY_DELAY_MS",
            &mut self.rating.settlement_retry_delay_ms,
        )?;

        // Questions
        optional_from_env("QUESTION_GENERATOR_URL", &mut self.questions.generator_url);
        override_from_env(
            "QUESTION_GENERATOR_TIMEOUT_SECONDS",
            &mut self.questions.generator_timeout_seconds,
        )?;
        if let Ok(path) = env::var("QUESTION_POOL_FILE") {
            self.questions.pool_file = Some(PathBuf::from(path));
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.service.host, self.service.http_port)
    }

    pub fn generator_timeout(&self) -> Duration {
        Duration::from_secs(self.questions.generator_timeout_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    config.game.validate()?;
    config.matchmaking.validate()?;
    config.rating.validate()?;

    if config.questions.generator_timeout_seconds == 0 {
        return Err(anyhow!("Question generator timeout must be greater than 0"));
    }
    if let Some(url) = &config.questions.generator_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(anyhow!("Question generator URL must be http(s): {}", url));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.service.http_port, 8080);
        assert_eq!(config.game.question_seconds, 20);
        assert_eq!(config.matchmaking.tick_interval_seconds, 5);
        assert_eq!(config.rating.k_factor, 32.0);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.service.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.service.http_port = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.game.default_capacity = 9;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.game.question_seconds = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.questions.generator_url = Some("ftp://questions".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [service]
            http_port = 9000

            [game]
            question_seconds = 15
            "#,
        )
        .unwrap();
        assert_eq!(config.service.http_port, 9000);
        assert_eq!(config.service.name, "trivia-arena");
        assert_eq!(config.game.question_seconds, 15);
        assert_eq!(config.game.countdown_seconds, 3);
        assert!(validate_config(&config).is_ok());
    }
}
