//! Per-connection handler: handshake, auth, and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive HANDSHAKE → validate version
//!   2. Authenticate token → get Username
//!   3. Send HANDSHAKE_ACK
//!   4. Loop: route client frames, and forward broadcasts from the table
//!      the connection is subscribed to
//!
//! However the loop ends, the connection's table session is disconnected.

use std::sync::Arc;

use cardroom_protocol::{Codec, Envelope, ProtocolError, Username, WireMessage, table_topic};
use cardroom_session::{Authenticator, ConnectionContext, Repository};
use cardroom_table::{BroadcastDispatcher, GameRules};
use cardroom_transport::{Connection, TopicReceiver, WebSocketConnection};
use tokio::sync::broadcast::error::RecvError;
use tokio::time;

use crate::CardroomError;
use crate::server::{PROTOCOL_VERSION, ServerState};

/// Drop guard that runs the disconnect protocol when the handler exits.
///
/// Covers graceful leave, dropped sockets, timeouts, and panics alike.
/// `Drop` is synchronous, so the disconnect is spawned fire-and-forget.
struct ConnectionGuard<G: GameRules, S: Repository, A: Authenticator, C: Codec> {
    context: ConnectionContext,
    state: Arc<ServerState<G, S, A, C>>,
}

impl<G: GameRules, S: Repository, A: Authenticator, C: Codec> Drop for ConnectionGuard<G, S, A, C> {
    fn drop(&mut self) {
        let Some((table_id, username)) = self.context.detach() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let state = Arc::clone(&self.state);
        runtime.spawn(async move {
            if let Err(e) = state.orchestrator.disconnect(table_id, &username).await {
                tracing::warn!(%table_id, %username, error = %e, "disconnect on close failed");
            }
        });
    }
}

/// Frames sent directly to this connection, as opposed to table broadcasts.
struct Replies<'a, C: Codec> {
    conn: &'a WebSocketConnection,
    dispatcher: &'a BroadcastDispatcher<C>,
}

impl<'a, C: Codec> Replies<'a, C> {
    fn new(conn: &'a WebSocketConnection, dispatcher: &'a BroadcastDispatcher<C>) -> Self {
        Self { conn, dispatcher }
    }

    fn elapsed_ms(&self) -> u64 {
        self.dispatcher.elapsed_ms()
    }

    async fn send(&mut self, message: WireMessage) -> Result<(), CardroomError> {
        let envelope = self.dispatcher.direct(message);
        let bytes = self.dispatcher.codec().encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }

    async fn reject(&mut self, code: u16, message: impl Into<String>) -> Result<(), CardroomError> {
        self.send(WireMessage::Error {
            code,
            message: message.into(),
        })
        .await
    }

    async fn error(&mut self, err: &CardroomError) -> Result<(), CardroomError> {
        self.reject(err.code(), err.to_string()).await
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<G, S, A, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<G, S, A, C>>,
) -> Result<(), CardroomError>
where
    G: GameRules,
    S: Repository,
    A: Authenticator,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let mut replies = Replies::new(&conn, &state.dispatcher);

    // --- Step 1: Handshake ---
    let username = perform_handshake(&conn, &state, &mut replies).await?;
    tracing::info!(%conn_id, %username, "participant authenticated");

    let mut guard = ConnectionGuard {
        context: ConnectionContext::authenticated(username),
        state: Arc::clone(&state),
    };
    let mut table_rx: Option<TopicReceiver> = None;

    // --- Step 2: Message loop ---
    let idle = state.config.idle_timeout;
    let mut deadline = time::Instant::now() + idle;

    loop {
        tokio::select! {
            frame = time::timeout_at(deadline, conn.recv()) => {
                let data = match frame {
                    Ok(Ok(Some(data))) => data,
                    Ok(Ok(None)) => {
                        tracing::info!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                    Err(_) => {
                        tracing::info!(%conn_id, "connection timed out");
                        break;
                    }
                };
                deadline = time::Instant::now() + idle;

                let envelope: Envelope = match state.dispatcher.codec().decode(&data) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                        replies.error(&CardroomError::from(e)).await?;
                        continue;
                    }
                };

                let close = route_message(
                    &state,
                    &mut guard.context,
                    &mut table_rx,
                    &mut replies,
                    envelope.message,
                )
                .await?;
                if close {
                    break;
                }
            }

            broadcast = next_broadcast(&mut table_rx) => match broadcast {
                Ok(payload) => conn.send(&payload).await?,
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(%conn_id, missed, "subscriber lagged, broadcasts dropped");
                }
                Err(RecvError::Closed) => table_rx = None,
            },
        }
    }

    // guard drops here → disconnect fires if still subscribed.
    Ok(())
}

/// Receives the HANDSHAKE frame, checks its version, authenticates, and
/// acknowledges.
async fn perform_handshake<G, S, A, C>(
    conn: &WebSocketConnection,
    state: &ServerState<G, S, A, C>,
    replies: &mut Replies<'_, C>,
) -> Result<Username, CardroomError>
where
    G: GameRules,
    S: Repository,
    A: Authenticator,
    C: Codec,
{
    let data = match time::timeout(state.config.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before handshake".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let envelope: Envelope = state.dispatcher.codec().decode(&data)?;

    let WireMessage::Handshake { version, token } = envelope.message else {
        replies.reject(400, "expected HANDSHAKE").await?;
        return Err(ProtocolError::InvalidMessage("first message must be HANDSHAKE".into()).into());
    };

    if version != PROTOCOL_VERSION {
        replies
            .reject(
                400,
                format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
            )
            .await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    let username = match state.auth.authenticate(token.as_deref().unwrap_or("")).await {
        Ok(username) => username,
        Err(e) => {
            replies.reject(401, "unauthorized").await?;
            return Err(e.into());
        }
    };

    replies
        .send(WireMessage::HandshakeAck {
            username: username.clone(),
            server_time: replies.elapsed_ms(),
        })
        .await?;

    Ok(username)
}

/// Routes one client message. Returns `true` if the connection should close.
async fn route_message<G, S, A, C>(
    state: &ServerState<G, S, A, C>,
    context: &mut ConnectionContext,
    table_rx: &mut Option<TopicReceiver>,
    replies: &mut Replies<'_, C>,
    message: WireMessage,
) -> Result<bool, CardroomError>
where
    G: GameRules,
    S: Repository,
    A: Authenticator,
    C: Codec,
{
    let Some(username) = context.username().cloned() else {
        return Ok(true);
    };

    match message {
        WireMessage::Heartbeat { client_time } => {
            replies
                .send(WireMessage::HeartbeatAck {
                    client_time,
                    server_time: replies.elapsed_ms(),
                })
                .await?;
        }

        WireMessage::Subscribe { table_id, kind } => {
            if let Some(current) = context.table_id() {
                replies.error(&CardroomError::AlreadySubscribed(current)).await?;
                return Ok(false);
            }

            // Subscribe before connecting so no broadcast after our own
            // PLAYER_CONNECTED can be missed.
            let rx = state.hub.subscribe(&table_topic(table_id));
            match state.orchestrator.connect(table_id, kind, &username).await {
                Ok(view) => {
                    context.attach(table_id, kind);
                    *table_rx = Some(rx);
                    replies.send(WireMessage::PlayerSubscribed(view)).await?;
                }
                Err(e) => {
                    tracing::debug!(%table_id, %username, error = %e, "subscribe rejected");
                    replies.error(&e).await?;
                }
            }
        }

        WireMessage::Unsubscribe => {
            *table_rx = None;
            match context.detach() {
                Some((table_id, username)) => {
                    state.orchestrator.disconnect(table_id, &username).await?;
                }
                None => tracing::debug!(%username, "unsubscribe while not subscribed"),
            }
        }

        WireMessage::Chat { message, .. } => {
            let result = match context.table_id() {
                Some(table_id) => state.orchestrator.chat(table_id, &username, message),
                None => Err(CardroomError::NotSubscribed),
            };
            if let Err(e) = result {
                replies.error(&e).await?;
            }
        }

        WireMessage::Disconnect { reason } => {
            tracing::info!(%username, %reason, "client disconnected");
            return Ok(true);
        }

        other => {
            tracing::debug!(%username, message = ?other, "ignoring unexpected message");
        }
    }

    Ok(false)
}

async fn next_broadcast(rx: &mut Option<TopicReceiver>) -> Result<Arc<[u8]>, RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
