//! `CardroomServer` builder and accept loop.
//!
//! Ties the layers together: WebSocket transport, protocol codec,
//! authentication, the connection orchestrator, and the topic hub that
//! table broadcasts are fanned out through.

use std::sync::Arc;
use std::time::Duration;

use cardroom_protocol::{Codec, JsonCodec};
use cardroom_session::{Authenticator, Repository};
use cardroom_table::{BroadcastDispatcher, GameRules, WorkerConfig};
use cardroom_transport::{TopicHub, Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{CardroomError, ConnectionOrchestrator, ServerConfig};

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<G: GameRules, S: Repository, A: Authenticator, C: Codec> {
    pub(crate) orchestrator: Arc<ConnectionOrchestrator<G, S, C>>,
    pub(crate) hub: Arc<TopicHub>,
    /// Encodes and stamps direct replies, so they share the broadcast clock.
    pub(crate) dispatcher: Arc<BroadcastDispatcher<C>>,
    pub(crate) auth: A,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Cardroom server.
///
/// # Example
///
/// ```rust,ignore
/// use cardroom::prelude::*;
///
/// let server = CardroomServer::builder()
///     .bind("0.0.0.0:8080")
///     .step_interval(Duration::from_secs(3))
///     .build::<MyGame, _, _>(Arc::new(store), my_auth)
///     .await?;
/// server.run().await
/// ```
pub struct CardroomServerBuilder {
    config: ServerConfig,
}

impl CardroomServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn topic_capacity(mut self, capacity: usize) -> Self {
        self.config.topic_capacity = capacity;
        self
    }

    /// Sets how often game workers step. Zero makes them event-driven.
    pub fn step_interval(mut self, interval: Duration) -> Self {
        self.config.worker.step_interval = interval;
        self
    }

    pub fn worker_config(mut self, config: WorkerConfig) -> Self {
        self.config.worker = config;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and builds the server around `store` and `auth`.
    ///
    /// Uses `JsonCodec` on the wire.
    pub async fn build<G, S, A>(
        self,
        store: Arc<S>,
        auth: A,
    ) -> Result<CardroomServer<G, S, A, JsonCodec>, CardroomError>
    where
        G: GameRules,
        S: Repository,
        A: Authenticator,
    {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let hub = Arc::new(TopicHub::with_capacity(self.config.topic_capacity));
        let dispatcher = Arc::new(BroadcastDispatcher::json(hub.clone()));
        let orchestrator = Arc::new(ConnectionOrchestrator::new(
            store,
            Arc::clone(&dispatcher),
            self.config.worker.clone(),
        ));

        let state = Arc::new(ServerState {
            orchestrator,
            hub,
            dispatcher,
            auth,
            config: self.config,
        });

        Ok(CardroomServer { transport, state })
    }
}

impl Default for CardroomServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Cardroom server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct CardroomServer<G: GameRules, S: Repository, A: Authenticator, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<G, S, A, C>>,
}

impl<G, S, A, C> CardroomServer<G, S, A, C>
where
    G: GameRules,
    S: Repository,
    A: Authenticator,
    C: Codec,
{
    /// Creates a new builder.
    pub fn builder() -> CardroomServerBuilder {
        CardroomServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The orchestrator every connection handler routes through.
    pub fn orchestrator(&self) -> Arc<ConnectionOrchestrator<G, S, C>> {
        Arc::clone(&self.state.orchestrator)
    }

    /// Runs the accept loop until the process is terminated.
    ///
    /// Each accepted connection gets its own handler task.
    pub async fn run(mut self) -> Result<(), CardroomError> {
        tracing::info!(addr = %self.state.config.bind_addr, "cardroom server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
