use secrecy::SecretString;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub openai_api_key: SecretString,
    pub eleven_api_key: SecretString,
    pub openai_api_base: String,
    pub eleven_api_base: String,
    pub eleven_ws_base: String,
    /// Longest wait for a single upstream message; `None` waits indefinitely.
    pub idle_timeout: Option<Duration>,
    pub log_level: Level,
}

fn required_key(name: &str) -> Result<SecretString, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(SecretString::from(value)),
        _ => Err(ConfigError::MissingVar(name.to_string())),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8002".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let openai_api_key = required_key("OPENAI_API_KEY")?;
        let eleven_api_key = required_key("ELEVEN_API_KEY")?;

        let openai_api_base = std::env::var("OPENAI_API_BASE")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let eleven_api_base = std::env::var("ELEVEN_API_BASE")
            .unwrap_or_else(|_| "https://api.elevenlabs.io".to_string());
        let eleven_ws_base = std::env::var("ELEVEN_WS_BASE")
            .unwrap_or_else(|_| "wss://api.elevenlabs.io".to_string());

        let timeout_str =
            std::env::var("RELAY_IDLE_TIMEOUT_SECS").unwrap_or_else(|_| "30".to_string());
        let timeout_secs = timeout_str.parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(
                "RELAY_IDLE_TIMEOUT_SECS".to_string(),
                format!("'{}' is not a whole number of seconds", timeout_str),
            )
        })?;
        let idle_timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            openai_api_key,
            eleven_api_key,
            openai_api_base,
            eleven_api_base,
            eleven_ws_base,
            idle_timeout,
            log_level,
        })
    }
}
