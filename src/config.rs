use std::{
    fs,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use thiserror::Error;

use crate::types::{default_mines, Mine};
use crate::weather::OPEN_METEO_FORECAST_URL;

pub const DEFAULT_MODEL_PATH: &str = "models/rockfall_model.json";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_WEATHER_TIMEOUT_SECS: u64 = 6;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}")]
    InvalidVar { var: &'static str, value: String },
    #[error("failed to read mine list {path}: {source}")]
    ReadMines {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse mine list {path}: {source}")]
    ParseMines {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub model_path: PathBuf,
    pub meta_path: Option<PathBuf>, // feature list for TorchScript artifacts
    pub mines_path: Option<PathBuf>,
    pub weather_base_url: String,
    pub weather_timeout: Duration,
    pub require_model: bool,
    pub log_features: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host: IpAddr = parse_or(&lookup, "HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port: u16 = parse_or(&lookup, "PORT", DEFAULT_PORT)?;
        let timeout_secs: u64 =
            parse_or(&lookup, "WEATHER_TIMEOUT_SECS", DEFAULT_WEATHER_TIMEOUT_SECS)?;

        Ok(Self {
            bind_addr: SocketAddr::new(host, port),
            model_path: lookup("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            meta_path: lookup("META_PATH").map(PathBuf::from),
            mines_path: lookup("MINES_PATH").map(PathBuf::from),
            weather_base_url: lookup("WEATHER_BASE_URL")
                .unwrap_or_else(|| OPEN_METEO_FORECAST_URL.to_string()),
            weather_timeout: Duration::from_secs(timeout_secs),
            require_model: flag(&lookup, "REQUIRE_MODEL"),
            log_features: flag(&lookup, "LOG_PRED"),
        })
    }

    /// The configured mine list, or the built-in one.
    pub fn mines(&self) -> Result<Vec<Mine>, ConfigError> {
        match &self.mines_path {
            Some(path) => load_mines(path),
            None => Ok(default_mines()),
        }
    }
}

pub fn load_mines(path: &Path) -> Result<Vec<Mine>, ConfigError> {
    let data = fs::read_to_string(path).map_err(|source| ConfigError::ReadMines {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| ConfigError::ParseMines {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidVar { var, value }),
        None => Ok(default),
    }
}

fn flag<F>(lookup: &F, var: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var).as_deref() == Some("1")
}
