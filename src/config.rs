//! Server configuration parsed from environment variables.
//!
//! All keys are optional:
//! - `BIND_ADDR`: listen address, default `0.0.0.0`
//! - `PORT`: listen port, default 3000
//! - `QUESTIONS_PATH`: YAML or JSON question bank, built-in bank when absent
//! - `CLIENT_CHANNEL_CAPACITY`: per-connection outbound buffer, default 256

use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CLIENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
    pub questions_path: Option<PathBuf>,
    pub client_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            port: DEFAULT_PORT,
            questions_path: None,
            client_channel_capacity: DEFAULT_CLIENT_CHANNEL_CAPACITY,
        }
    }
}

impl Config {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;
        let questions_path = get("QUESTIONS_PATH").map(PathBuf::from);
        let client_channel_capacity =
            parse_or("CLIENT_CHANNEL_CAPACITY", get("CLIENT_CHANNEL_CAPACITY"), DEFAULT_CLIENT_CHANNEL_CAPACITY)?;

        // mpsc::channel panics on zero capacity.
        if client_channel_capacity == 0 {
            return Err(ConfigError::InvalidValue { key: "CLIENT_CHANNEL_CAPACITY", value: "0".into() });
        }

        Ok(Self { bind_addr, port, questions_path, client_channel_capacity })
    }
}

fn parse_or<T: std::str::FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
