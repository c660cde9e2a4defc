//! Credential checks.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use promptlib_primitives::UserRole;

/// Pluggable credential check used by [`LibraryApp::login`](crate::LibraryApp::login).
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns the user's access level when the credentials are valid.
    async fn authenticate(&self, username: &str, password: &str) -> Option<UserRole>;
}

/// Authenticator backed by a fixed credential table supplied at runtime.
#[derive(Clone, Default)]
pub struct StaticAuthenticator {
    users: HashMap<String, (String, UserRole)>,
}

impl fmt::Debug for StaticAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.users.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("StaticAuthenticator")
            .field("users", &names)
            .finish()
    }
}

impl StaticAuthenticator {
    /// Creates an authenticator with no users.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user.
    #[must_use]
    pub fn with_user(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        role: UserRole,
    ) -> Self {
        self.users.insert(username.into(), (password.into(), role));
        self
    }

    /// Returns the number of registered users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns `true` when no users are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, username: &str, password: &str) -> Option<UserRole> {
        self.users
            .get(username)
            .filter(|(expected, _)| expected == password)
            .map(|(_, role)| *role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn checks_username_and_password() {
        let auth = StaticAuthenticator::new()
            .with_user("ada", "pw-1", UserRole::Admin)
            .with_user("bob", "pw-2", UserRole::Standard);

        assert_eq!(auth.authenticate("ada", "pw-1").await, Some(UserRole::Admin));
        assert_eq!(auth.authenticate("bob", "pw-2").await, Some(UserRole::Standard));
        assert_eq!(auth.authenticate("ada", "pw-2").await, None);
        assert_eq!(auth.authenticate("eve", "pw-1").await, None);
    }

    #[test]
    fn debug_hides_passwords() {
        let auth = StaticAuthenticator::new().with_user("ada", "secret-pw", UserRole::Admin);
        let rendered = format!("{auth:?}");
        assert!(rendered.contains("ada"));
        assert!(!rendered.contains("secret-pw"));
    }
}
