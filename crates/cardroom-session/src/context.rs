//! Per-connection context.
//!
//! Disconnect signals from the transport do not always say which table the
//! connection was attached to. Each physical connection therefore carries
//! a [`ConnectionContext`] for its lifetime, recording who authenticated on
//! it and which table it joined, so the disconnect protocol can be run
//! against the right session when the connection ends.

use cardroom_protocol::{ConnectionKind, TableId, Username};

/// Typed attributes of one physical connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionContext {
    username: Option<Username>,
    table_id: Option<TableId>,
    kind: Option<ConnectionKind>,
}

impl ConnectionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the identity established by the handshake.
    pub fn authenticated(username: Username) -> Self {
        Self {
            username: Some(username),
            ..Self::default()
        }
    }

    /// Records that this connection joined `table_id` as `kind`.
    pub fn attach(&mut self, table_id: TableId, kind: ConnectionKind) {
        self.table_id = Some(table_id);
        self.kind = Some(kind);
    }

    /// Forgets the table attachment and returns what a disconnect needs,
    /// or `None` if the connection was not at a table.
    pub fn detach(&mut self) -> Option<(TableId, Username)> {
        let table_id = self.table_id.take()?;
        self.kind = None;
        let username = self.username.clone()?;
        Some((table_id, username))
    }

    pub fn username(&self) -> Option<&Username> {
        self.username.as_ref()
    }

    pub fn table_id(&self) -> Option<TableId> {
        self.table_id
    }

    pub fn kind(&self) -> Option<ConnectionKind> {
        self.kind
    }

    pub fn is_attached(&self) -> bool {
        self.table_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_empty() {
        let ctx = ConnectionContext::new();
        assert!(ctx.username().is_none());
        assert!(!ctx.is_attached());
        assert!(ctx.kind().is_none());
    }

    #[test]
    fn test_attach_then_detach_yields_disconnect_target() {
        let table_id = TableId::new();
        let mut ctx = ConnectionContext::authenticated(Username::from("alice"));
        ctx.attach(table_id, ConnectionKind::Player);

        assert_eq!(ctx.kind(), Some(ConnectionKind::Player));
        assert_eq!(ctx.detach(), Some((table_id, Username::from("alice"))));

        assert!(!ctx.is_attached());
        assert!(ctx.kind().is_none());
        assert_eq!(ctx.username().map(Username::as_str), Some("alice"));
    }

    #[test]
    fn test_detach_twice_yields_nothing_the_second_time() {
        let mut ctx = ConnectionContext::authenticated(Username::from("bob"));
        ctx.attach(TableId::new(), ConnectionKind::Observer);

        assert!(ctx.detach().is_some());
        assert!(ctx.detach().is_none());
    }

    #[test]
    fn test_detach_without_identity_yields_nothing() {
        let mut ctx = ConnectionContext::new();
        ctx.attach(TableId::new(), ConnectionKind::Observer);
        assert!(ctx.detach().is_none());
    }
}
