//! Connection configuration.
use std::{env::var, str::FromStr, time::Duration};

use crate::{
    common::warning,
    fetch::DEFAULT_FETCH_SIZE,
    stream::{DEFAULT_CHUNK_SIZE, DEFAULT_INLINE_THRESHOLD},
    transport::DEFAULT_MAX_FRAME_LEN,
};

/// Connection config.
#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) socket: Option<String>,
    pub(crate) fetch_size: u32,
    pub(crate) timeout: Duration,
    pub(crate) chunk_size: usize,
    pub(crate) inline_threshold: usize,
    pub(crate) max_frame_len: u64,
}

fn parse_env<T: FromStr>(name: &'static str, default: T) -> T {
    match var(name) {
        Ok(value) => match value.parse() {
            Ok(ok) => ok,
            Err(_) => {
                warning!("invalid `{name}` value {value:?}, using default");
                default
            }
        },
        Err(_) => default,
    }
}

impl Config {
    /// Retrieve configuration from environment variable.
    ///
    /// It reads:
    /// - `RIVET_HOST`
    /// - `RIVET_PORT`
    /// - `RIVET_SOCKET`, unix socket path preferred over host and port
    /// - `RIVET_FETCH_SIZE`
    /// - `RIVET_TIMEOUT_MS`
    /// - `RIVET_CHUNK_SIZE`
    /// - `RIVET_INLINE_THRESHOLD`
    /// - `RIVET_MAX_FRAME`
    ///
    /// Missing or unparsable variable falls back to its default.
    pub fn from_env() -> Config {
        let default = Config::default();
        Config {
            host: var("RIVET_HOST").unwrap_or(default.host),
            port: parse_env("RIVET_PORT", default.port),
            socket: var("RIVET_SOCKET").ok(),
            fetch_size: parse_env("RIVET_FETCH_SIZE", default.fetch_size),
            timeout: Duration::from_millis(parse_env("RIVET_TIMEOUT_MS", default.timeout.as_millis() as u64)),
            chunk_size: parse_env("RIVET_CHUNK_SIZE", default.chunk_size).max(1),
            inline_threshold: parse_env("RIVET_INLINE_THRESHOLD", default.inline_threshold),
            max_frame_len: parse_env("RIVET_MAX_FRAME", default.max_frame_len),
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn socket(mut self, path: impl Into<String>) -> Self {
        self.socket = Some(path.into());
        self
    }

    /// Items requested per result frame.
    pub fn fetch_size(mut self, fetch_size: u32) -> Self {
        self.fetch_size = fetch_size;
        self
    }

    /// Response and acknowledgement timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Upload frame and download window size.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Largest large object parameter sent inline.
    pub fn inline_threshold(mut self, inline_threshold: usize) -> Self {
        self.inline_threshold = inline_threshold;
        self
    }

    pub fn max_frame_len(mut self, max_frame_len: u64) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub(crate) fn timeout_ms(&self) -> u32 {
        self.timeout.as_millis().min(u32::MAX as u128) as u32
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "localhost".into(),
            port: 6543,
            socket: None,
            fetch_size: DEFAULT_FETCH_SIZE,
            timeout: Duration::from_secs(30),
            chunk_size: DEFAULT_CHUNK_SIZE,
            inline_threshold: DEFAULT_INLINE_THRESHOLD,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}
