//! Wire protocol for Cardroom.
//!
//! This crate defines what travels between a card table and its clients:
//!
//! - **Identity** ([`TableId`], [`Username`], [`ConnectionKind`]): who is
//!   talking and how they are attached to a table.
//! - **Messages** ([`Envelope`], [`WireMessage`], [`SessionView`]): the
//!   frames exchanged with clients and broadcast to table channels.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames become bytes.
//! - **Channel keys** ([`table_topic`]): the transport topic a table's
//!   broadcasts are published on.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Orchestration (sessions, workers)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ConnectionKind, Envelope, SessionView, SubscriptionView, TOPIC_PREFIX,
    TableId, Username, WireMessage, table_topic,
};
