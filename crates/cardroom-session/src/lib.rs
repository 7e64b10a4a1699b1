//! Table sessions and the storage seams behind them.
//!
//! This crate holds everything the orchestrator needs to know about *who*
//! is at a table, without owning any concurrency policy itself:
//!
//! 1. **Models**: [`Table`], [`Participant`], [`Session`]
//! 2. **Storage seams**: [`TableStore`], [`ParticipantStore`],
//!    [`SessionStore`], with [`InMemoryStore`] implementing all three
//! 3. **Connection context**: [`ConnectionContext`], the typed record a
//!    physical connection carries so a later disconnect can be matched back
//!    to its session
//! 4. **Identity**: the [`Authenticator`] hook turning a handshake token
//!    into a [`Username`](cardroom_protocol::Username)
//!
//! # Concurrency note
//!
//! The stores are internally synchronized so they can be shared, but they
//! do not serialize multi-step protocols. Callers that check-then-create
//! (the connect protocol) must hold the table's lock around the sequence.

#![allow(async_fn_in_trait)]

mod auth;
mod context;
mod error;
mod memory;
mod session;
mod store;

pub use auth::Authenticator;
pub use context::ConnectionContext;
pub use error::SessionError;
pub use memory::InMemoryStore;
pub use session::{Participant, Session, Table};
pub use store::{ParticipantStore, Repository, SessionStore, TableStore};
