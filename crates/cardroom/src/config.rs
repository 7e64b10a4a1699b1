//! Server configuration.

use std::time::Duration;

use cardroom_table::WorkerConfig;
use serde::{Deserialize, Serialize};

/// Settings for a [`CardroomServer`](crate::CardroomServer).
///
/// Every field has a default; override them through
/// [`CardroomServerBuilder`](crate::CardroomServerBuilder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// How long a new connection has to send its handshake.
    pub handshake_timeout: Duration,

    /// A connection that sends nothing for this long is closed.
    pub idle_timeout: Duration,

    /// Broadcasts buffered per table channel before a slow subscriber
    /// starts missing them.
    pub topic_capacity: usize,

    /// Applied to every game worker the server starts.
    pub worker: WorkerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            handshake_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(15),
            topic_capacity: 256,
            worker: WorkerConfig::default(),
        }
    }
}
