//! Per-table concurrency for Cardroom.
//!
//! Everything that must happen "one table at a time" lives here:
//!
//! - [`TableMutexRegistry`]: a lock per table id, created on demand; the
//!   primitive every membership change serializes on
//! - [`BroadcastDispatcher`]: encodes a [`WireMessage`](cardroom_protocol::WireMessage)
//!   and publishes it on the table's channel
//! - [`GameWorkerRegistry`]: at most one game worker per table
//! - [`WorkerHandle`] / [`WorkerState`]: talk to a running worker and
//!   observe its lifecycle
//! - [`GameRules`]: the trait a card game implements to drive a worker
//!
//! Workers run on their own Tokio tasks. Notifications reach them over a
//! bounded channel and never wait on the worker, so a slow game step can
//! not hold up connects and disconnects at the same table.

mod config;
mod dispatcher;
mod error;
mod lock;
mod registry;
mod rules;
mod worker;

pub use config::{WorkerConfig, WorkerState};
pub use dispatcher::BroadcastDispatcher;
pub use error::WorkerError;
pub use lock::{TableGuard, TableMutexRegistry};
pub use registry::GameWorkerRegistry;
pub use rules::GameRules;
pub use worker::WorkerHandle;
