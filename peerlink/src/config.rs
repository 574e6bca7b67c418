//! Ambient process configuration, loaded from `PEERLINK_*` environment variables.
//!
//! Mirrors the teacher's `RouterConfig` shape (address/port/protocol knobs) without pulling in a
//! dedicated config crate — nothing else in the dependency stack needs one, and the variable set
//! here is small enough that `str::parse` plus sensible defaults covers it.

use std::env;

use thiserror::Error;

/// Process-wide listener configuration sourced from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub address: String,
    pub port: u16,
    pub websocket_path: String,
    pub outbound_buffer: usize,
    pub subscription_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_owned(),
            port: 4242,
            websocket_path: "connect".to_owned(),
            outbound_buffer: 64,
            subscription_buffer: 16,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {variable}: {source}")]
    Invalid {
        variable: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Config {
    /// Reads `PEERLINK_ADDRESS`, `PEERLINK_PORT`, `PEERLINK_WEBSOCKET_PATH`,
    /// `PEERLINK_OUTBOUND_BUFFER`, and `PEERLINK_SUBSCRIPTION_BUFFER`, falling back to
    /// [`Config::default`] for any variable that is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            address: env::var("PEERLINK_ADDRESS").unwrap_or(defaults.address),
            port: Self::parse_env("PEERLINK_PORT", defaults.port)?,
            websocket_path: env::var("PEERLINK_WEBSOCKET_PATH").unwrap_or(defaults.websocket_path),
            outbound_buffer: Self::parse_env("PEERLINK_OUTBOUND_BUFFER", defaults.outbound_buffer)?,
            subscription_buffer: Self::parse_env(
                "PEERLINK_SUBSCRIPTION_BUFFER",
                defaults.subscription_buffer,
            )?,
        })
    }

    fn parse_env<T>(variable: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match env::var(variable) {
            Ok(raw) => raw
                .parse()
                .map_err(|err| ConfigError::Invalid { variable, source: Box::new(err) }),
            Err(_) => Ok(default),
        }
    }
}
