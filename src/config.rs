//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::InvalidValue("LOG_FORMAT")),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    pub host: String,
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    pub engine: EngineSettings,

    /// Run the background maintenance jobs
    pub jobs_enabled: bool,
    pub idempotency_cleanup_interval: Duration,
    pub drift_check_interval: Duration,

    pub log_format: LogFormat,
}

/// Knobs the purchase engine reads on every request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Upper bound for every statement inside a purchase transaction
    pub transaction_timeout: Duration,
    /// How long an idempotency key is remembered
    pub idempotency_ttl_hours: i32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            transaction_timeout: Duration::from_millis(5000),
            idempotency_ttl_hours: 24,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 10u32)?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("PORT", 3000u16)?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let timeout_ms: u64 = parse_or("TRANSACTION_TIMEOUT_MS", 5000)?;
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue("TRANSACTION_TIMEOUT_MS"));
        }

        let idempotency_ttl_hours: i32 = parse_or("IDEMPOTENCY_TTL_HOURS", 24)?;
        if idempotency_ttl_hours <= 0 {
            return Err(ConfigError::InvalidValue("IDEMPOTENCY_TTL_HOURS"));
        }

        let jobs_enabled = parse_or("JOBS_ENABLED", true)?;
        let idempotency_cleanup_interval =
            interval_secs("IDEMPOTENCY_CLEANUP_INTERVAL_SECS", 60)?;
        let drift_check_interval = interval_secs("DRIFT_CHECK_INTERVAL_SECS", 3600)?;
        let log_format = parse_or("LOG_FORMAT", LogFormat::Text)?;

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            engine: EngineSettings {
                transaction_timeout: Duration::from_millis(timeout_ms),
                idempotency_ttl_hours,
            },
            jobs_enabled,
            idempotency_cleanup_interval,
            drift_check_interval,
            log_format,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Job interval in seconds; zero would make the scheduler spin
fn interval_secs(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_or(name, default)?;
    if secs == 0 {
        return Err(ConfigError::InvalidValue(name));
    }
    Ok(Duration::from_secs(secs))
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_engine_settings_default() {
        let settings = EngineSettings::default();
        assert_eq!(settings.transaction_timeout, Duration::from_secs(5));
        assert_eq!(settings.idempotency_ttl_hours, 24);
    }

    fn config(environment: &str) -> Config {
        Config {
            database_url: "postgres://localhost/crm".to_string(),
            database_max_connections: 10,
            host: "127.0.0.1".to_string(),
            port: 3000,
            environment: environment.to_string(),
            engine: EngineSettings::default(),
            jobs_enabled: true,
            idempotency_cleanup_interval: Duration::from_secs(60),
            drift_check_interval: Duration::from_secs(3600),
            log_format: LogFormat::Text,
        }
    }

    #[test]
    fn test_is_production() {
        assert!(config("production").is_production());
        assert!(!config("development").is_production());
        assert!(!config("staging").is_production());
    }

    #[test]
    fn test_interval_secs_default() {
        let interval = interval_secs("CRM_ENGINE_TEST_UNSET_INTERVAL", 90).unwrap();
        assert_eq!(interval, Duration::from_secs(90));
    }

    #[test]
    fn test_parse_or_falls_back_for_unset_variable() {
        let value: u32 = parse_or("CRM_ENGINE_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }
}
