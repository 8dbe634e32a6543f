//! Session token injection.
//!
//! The orchestrator never reads ambient request context; whoever constructs
//! it hands over a token source. A source that has no token fails closed.

/// Opaque bearer token for the analysis backend.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token value for the Authorization header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

// Keep tokens out of debug output and logs
impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionToken(****)")
    }
}

/// Capability for looking up the caller's current session.
///
/// Returning `None` means unauthenticated; the orchestrator surfaces that as
/// an authentication error before any network call.
pub trait TokenProvider: Send + Sync {
    fn session_token(&self) -> Option<SessionToken>;
}

/// Fixed token, for server-side callers and tests.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider(Option<SessionToken>);

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(SessionToken::new(token)))
    }

    /// A provider with no session at all.
    pub fn unauthenticated() -> Self {
        Self(None)
    }
}

impl TokenProvider for StaticTokenProvider {
    fn session_token(&self) -> Option<SessionToken> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let token = SessionToken::new("secret-value");
        assert_eq!(format!("{:?}", token), "SessionToken(****)");
        assert_eq!(token.expose(), "secret-value");
    }

    #[test]
    fn test_static_provider() {
        let provider = StaticTokenProvider::new("abc");
        assert_eq!(provider.session_token().unwrap().expose(), "abc");

        let provider = StaticTokenProvider::unauthenticated();
        assert!(provider.session_token().is_none());
    }
}
