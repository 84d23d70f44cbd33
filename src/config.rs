//! Server configuration.
//!
//! [`ServerConfig`] holds every tunable the server reads at start-up. It can
//! be built in code, deserialised from TOML, or loaded from a file; missing
//! keys fall back to the defaults listed on each field.
//!
//! ```toml
//! name = "chat"
//! host = "0.0.0.0"
//! port = 8999
//! worker_pool_size = 8
//! queue_full_policy = "reject"
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

use crate::{connection::ConnectionSettings, dispatch::DispatchConfig, dispatch::QueueFullPolicy};

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration text is not valid TOML for [`ServerConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunables for a [`crate::server::Server`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Human-readable server name used in logs. Default `"wirework"`.
    pub name: String,
    /// Interface to bind. Default `"0.0.0.0"`.
    pub host: String,
    /// TCP port to bind. Default `8999`.
    pub port: u16,
    /// Live connections allowed before new sockets are refused. Default `12000`.
    pub max_conn: usize,
    /// Largest payload accepted or sent, in bytes. Default `4096`.
    pub max_packet_size: usize,
    /// Persistent dispatch workers; `0` handles requests inline. Default `10`.
    pub worker_pool_size: usize,
    /// Capacity of each worker queue. Default `1024`.
    pub max_worker_task_len: usize,
    /// Capacity of each connection's outbound queue. Default `1024`.
    pub max_msg_chan_len: usize,
    /// Close a connection after this many idle milliseconds. Default none.
    pub read_timeout_ms: Option<u64>,
    /// Close a connection when one frame write exceeds this. Default none.
    pub write_timeout_ms: Option<u64>,
    /// Behaviour when a worker queue is full. Default `"block"`.
    pub queue_full_policy: QueueFullPolicy,
    /// Default log filter for the binary. Default `"info"`.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: String::from("wirework"),
            host: String::from("0.0.0.0"),
            port: 8999,
            max_conn: 12_000,
            max_packet_size: crate::codec::DEFAULT_MAX_PAYLOAD,
            worker_pool_size: 10,
            max_worker_task_len: 1024,
            max_msg_chan_len: 1024,
            read_timeout_ms: None,
            write_timeout_ms: None,
            queue_full_policy: QueueFullPolicy::Block,
            log_level: String::from("info"),
        }
    }
}

impl ServerConfig {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is malformed or names an
    /// unknown key.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str::<Self>(text)?.normalized())
    }

    /// Read and parse a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read and
    /// [`ConfigError::Parse`] if its contents are invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Clamp capacities so every queue and limit is usable.
    ///
    /// Queue capacities and `max_conn` are raised to at least one. Zero
    /// timeouts are treated as absent.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.max_conn = self.max_conn.max(1);
        self.max_worker_task_len = self.max_worker_task_len.max(1);
        self.max_msg_chan_len = self.max_msg_chan_len.max(1);
        self.read_timeout_ms = self.read_timeout_ms.filter(|ms| *ms > 0);
        self.write_timeout_ms = self.write_timeout_ms.filter(|ms| *ms > 0);
        self
    }

    /// `host:port` to bind.
    #[must_use]
    pub fn bind_addr(&self) -> String { format!("{}:{}", self.host, self.port) }

    /// Per-connection settings derived from this configuration.
    #[must_use]
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            max_payload: self.max_packet_size,
            outbound_capacity: self.max_msg_chan_len,
            read_timeout: self.read_timeout_ms.map(Duration::from_millis),
            write_timeout: self.write_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Worker pool settings derived from this configuration.
    #[must_use]
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            workers: self.worker_pool_size,
            queue_capacity: self.max_worker_task_len,
            queue_full: self.queue_full_policy,
        }
    }
}
