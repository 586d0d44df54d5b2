//! services/coach_api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono::FixedOffset;
use run_coach_core::profile::NormalizeOptions;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub openai_api_base: Option<String>,
    pub plan_model: String,
    pub vision_model: String,
    pub completion_timeout: Duration,
    /// The runner's local timezone, used to decide what "today" is.
    pub timezone: FixedOffset,
    pub default_goal_distance_km: f64,
    pub default_sessions_per_week: u32,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_address = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:3000".parse::<SocketAddr>())?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Completion Provider ---
        let openai_api_key = lookup("OPENAI_API_KEY").filter(|v| !v.trim().is_empty());
        let openai_api_base = lookup("OPENAI_API_BASE").filter(|v| !v.trim().is_empty());
        let plan_model = lookup("PLAN_MODEL").unwrap_or_else(|| "gpt-4o".to_string());
        let vision_model = lookup("VISION_MODEL").unwrap_or_else(|| "gpt-4o".to_string());
        let timeout_secs: u64 = parse_or(&lookup, "COMPLETION_TIMEOUT_SECS", Ok(180))?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "COMPLETION_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        // --- Scheduling Defaults ---
        let offset_hours: i32 = parse_or(&lookup, "TIMEZONE_OFFSET_HOURS", Ok(3))?;
        let timezone = FixedOffset::east_opt(offset_hours * 3600).ok_or_else(|| {
            ConfigError::InvalidValue(
                "TIMEZONE_OFFSET_HOURS".to_string(),
                format!("{offset_hours} is not a valid UTC offset"),
            )
        })?;
        let default_goal_distance_km: f64 = parse_or(&lookup, "DEFAULT_GOAL_DISTANCE_KM", Ok(5.0))?;
        if !default_goal_distance_km.is_finite() || default_goal_distance_km <= 0.0 {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_GOAL_DISTANCE_KM".to_string(),
                "must be a positive distance".to_string(),
            ));
        }
        let default_sessions_per_week: u32 = parse_or(&lookup, "DEFAULT_SESSIONS_PER_WEEK", Ok(3))?;
        if !(1..=7).contains(&default_sessions_per_week) {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_SESSIONS_PER_WEEK".to_string(),
                "must be between 1 and 7".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            log_level,
            openai_api_key,
            openai_api_base,
            plan_model,
            vision_model,
            completion_timeout: Duration::from_secs(timeout_secs),
            timezone,
            default_goal_distance_km,
            default_sessions_per_week,
        })
    }

    /// The key the OpenAI adapters need; the server cannot start without it.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            default_goal_distance_km: self.default_goal_distance_km,
            default_sessions_per_week: self.default_sessions_per_week,
        }
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: Result<T, T::Err>) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => default.map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
    }
}
