use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use anyhow::Context;

use crate::model::MAX_ROOM_DURATION_MINUTES;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub room_duration_minutes: u32,
    pub sweep_interval: Duration,
    pub max_message_chars: usize,
    pub min_password_chars: usize,
    pub max_username_chars: usize,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            room_duration_minutes: MAX_ROOM_DURATION_MINUTES,
            sweep_interval: Duration::from_secs(60),
            max_message_chars: 2000,
            min_password_chars: 6,
            max_username_chars: 50,
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 5 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Reads settings from the environment (and `.env`), falling back to defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let config = Self {
            bind_addr: parse_or(&lookup, "BIND_ADDR", defaults.bind_addr)?,
            room_duration_minutes: parse_or(&lookup, "ROOM_DURATION_MINUTES", defaults.room_duration_minutes)?
                .min(MAX_ROOM_DURATION_MINUTES),
            sweep_interval: Duration::from_secs(parse_or(
                &lookup,
                "SWEEP_INTERVAL_SECS",
                defaults.sweep_interval.as_secs(),
            )?),
            max_message_chars: parse_or(&lookup, "MAX_MESSAGE_CHARS", defaults.max_message_chars)?,
            min_password_chars: parse_or(&lookup, "MIN_PASSWORD_CHARS", defaults.min_password_chars)?,
            max_username_chars: parse_or(&lookup, "MAX_USERNAME_CHARS", defaults.max_username_chars)?,
            upload_dir: lookup("UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
        };

        anyhow::ensure!(config.room_duration_minutes > 0, "ROOM_DURATION_MINUTES must be positive");
        anyhow::ensure!(!config.sweep_interval.is_zero(), "SWEEP_INTERVAL_SECS must be positive");
        anyhow::ensure!(config.max_message_chars > 0, "MAX_MESSAGE_CHARS must be positive");

        Ok(config)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}
