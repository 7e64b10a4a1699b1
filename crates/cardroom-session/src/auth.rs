//! Authentication hook for resolving a caller's identity.
//!
//! Cardroom does not validate credentials. The server hands the token from
//! the client's handshake to an [`Authenticator`] and trusts the
//! [`Username`] it returns.

use cardroom_protocol::Username;

use crate::SessionError;

/// Validates a client's token and returns their username.
///
/// ```rust
/// use cardroom_protocol::Username;
/// use cardroom_session::{Authenticator, SessionError};
///
/// /// Treats the token itself as the username. Development only.
/// struct NameIsToken;
///
/// impl Authenticator for NameIsToken {
///     async fn authenticate(&self, token: &str) -> Result<Username, SessionError> {
///         if token.is_empty() {
///             return Err(SessionError::AuthFailed("empty token".into()));
///         }
///         Ok(Username::from(token))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates `token` and returns the authenticated username.
    ///
    /// # Errors
    /// [`SessionError::AuthFailed`] if the token is invalid or expired.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Username, SessionError>> + Send;
}
