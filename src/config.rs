use crate::error::AppError;
use crate::ticker::types::AssetSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_DB_FILENAME: &str = "app.db";
pub const DEFAULT_COINCAP_WS_URL: &str = "wss://ws.coincap.io/prices";
pub const DEFAULT_COINCAP_REST_URL: &str = "https://api.coincap.io/v2/assets";
pub const DEFAULT_SNAPSHOT_TIMEOUT_MS: u64 = 3_500;
pub const MIN_SNAPSHOT_TIMEOUT_MS: u64 = 500;
pub const MAX_SNAPSHOT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_TICKER_ASSETS: &str = "bitcoin";
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 120;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub db_filename: String,
    pub coincap_ws_url: String,
    pub coincap_rest_url: String,
    pub snapshot_timeout_ms: u64,
    pub initial_assets: AssetSet,
    pub rate_limit_per_minute: u32,
    pub rate_limit_trust_forwarded: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            port: DEFAULT_PORT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            db_filename: DEFAULT_DB_FILENAME.to_string(),
            coincap_ws_url: DEFAULT_COINCAP_WS_URL.to_string(),
            coincap_rest_url: DEFAULT_COINCAP_REST_URL.to_string(),
            snapshot_timeout_ms: DEFAULT_SNAPSHOT_TIMEOUT_MS,
            initial_assets: AssetSet::from_raw(DEFAULT_TICKER_ASSETS.split(',')),
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            rate_limit_trust_forwarded: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port = match read("PORT") {
            Some(raw) => parse_number::<u16>("PORT", &raw)?,
            None => defaults.port,
        };

        let snapshot_timeout_ms = match read("TICKER_SNAPSHOT_TIMEOUT_MS") {
            Some(raw) => parse_number::<u64>("TICKER_SNAPSHOT_TIMEOUT_MS", &raw)?,
            None => defaults.snapshot_timeout_ms,
        };
        if !(MIN_SNAPSHOT_TIMEOUT_MS..=MAX_SNAPSHOT_TIMEOUT_MS).contains(&snapshot_timeout_ms) {
            return Err(AppError::Config(format!(
                "TICKER_SNAPSHOT_TIMEOUT_MS must be between {MIN_SNAPSHOT_TIMEOUT_MS} and {MAX_SNAPSHOT_TIMEOUT_MS}"
            )));
        }

        let rate_limit_per_minute = match read("RATE_LIMIT_PER_MINUTE") {
            Some(raw) => parse_number::<u32>("RATE_LIMIT_PER_MINUTE", &raw)?,
            None => defaults.rate_limit_per_minute,
        };

        let rate_limit_trust_forwarded = match read("RATE_LIMIT_TRUST_FORWARDED") {
            Some(raw) => parse_flag("RATE_LIMIT_TRUST_FORWARDED", &raw)?,
            None => defaults.rate_limit_trust_forwarded,
        };

        // An explicitly empty TICKER_ASSETS means "start idle", so it is not
        // filtered like the other variables.
        let initial_assets = match lookup("TICKER_ASSETS") {
            Some(raw) => AssetSet::from_raw(raw.split(',')),
            None => defaults.initial_assets,
        };

        Ok(Self {
            bind_addr: read("APP_BIND_ADDR").unwrap_or(defaults.bind_addr),
            port,
            data_dir: read("APP_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            db_filename: read("APP_DB_FILENAME").unwrap_or(defaults.db_filename),
            coincap_ws_url: read("COINCAP_WS_URL").unwrap_or(defaults.coincap_ws_url),
            coincap_rest_url: read("COINCAP_REST_URL").unwrap_or(defaults.coincap_rest_url),
            snapshot_timeout_ms,
            initial_assets,
            rate_limit_per_minute,
            rate_limit_trust_forwarded,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse()
            .map_err(|error| AppError::Config(format!("invalid bind address: {error}")))
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_filename)
    }

    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot_timeout_ms)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, AppError> {
    raw.parse::<T>()
        .map_err(|_| AppError::Config(format!("{name} must be a number, got '{raw}'")))
}

fn parse_flag(name: &str, raw: &str) -> Result<bool, AppError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::Config(format!(
            "{name} must be a boolean, got '{raw}'"
        ))),
    }
}
