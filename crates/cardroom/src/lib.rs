//! # Cardroom
//!
//! Connection orchestration for multiplayer card tables.
//!
//! Participants attach to a table as players or observers. Cardroom keeps
//! three things consistent per table under concurrent connects and
//! disconnects: the live sessions, the single game worker that exists
//! while at least one player is seated, and the broadcasts that tell
//! everyone at the table who came and went.
//!
//! Game authors implement [`GameRules`](cardroom_table::GameRules); storage
//! backends implement the [`Repository`](cardroom_session::Repository)
//! seams. The [`ConnectionOrchestrator`] can be driven directly, or through
//! the WebSocket [`CardroomServer`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use cardroom::prelude::*;
//!
//! struct Quiet;
//!
//! impl GameRules for Quiet {
//!     type State = ();
//!     fn init(_table: &Table) {}
//! }
//!
//! struct NameIsToken;
//!
//! impl Authenticator for NameIsToken {
//!     async fn authenticate(&self, token: &str) -> Result<Username, SessionError> {
//!         Ok(Username::from(token))
//!     }
//! }
//!
//! # async fn run() -> Result<(), CardroomError> {
//! let store = Arc::new(InMemoryStore::new());
//! let server = CardroomServer::<Quiet, InMemoryStore, NameIsToken, JsonCodec>::builder()
//!     .bind("0.0.0.0:8080")
//!     .build::<Quiet, _, _>(store, NameIsToken)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod orchestrator;
mod server;
mod telemetry;

pub use config::ServerConfig;
pub use error::CardroomError;
pub use orchestrator::ConnectionOrchestrator;
pub use server::{CardroomServer, CardroomServerBuilder, PROTOCOL_VERSION};
pub use telemetry::init_tracing;

/// Everything needed to run a server or drive the orchestrator.
pub mod prelude {
    pub use cardroom_protocol::{
        Codec, ConnectionKind, Envelope, JsonCodec, SessionView, SubscriptionView, TableId,
        Username, WireMessage, table_topic,
    };
    pub use cardroom_session::{
        Authenticator, InMemoryStore, Participant, ParticipantStore, Repository, Session,
        SessionError, SessionStore, Table, TableStore,
    };
    pub use cardroom_table::{
        BroadcastDispatcher, GameRules, WorkerConfig, WorkerHandle, WorkerState,
    };
    pub use cardroom_transport::{Publisher, TopicHub, TopicReceiver};

    pub use crate::{
        CardroomError, CardroomServer, CardroomServerBuilder, ConnectionOrchestrator,
        ServerConfig, init_tracing,
    };
}
