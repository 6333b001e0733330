//! Users and their roles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An application user.
///
/// The encoded password and salt are only carried between a
/// [`crate::UserProvider`] and the [`crate::Authenticator`]; the copy stored
/// in a session is always [`User::sanitized`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    username: String,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    salt: Option<String>,
}

impl User {
    /// Creates a user with the given roles and no credentials.
    pub fn new<I, S>(username: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            username: username.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            password: None,
            salt: None,
        }
    }

    /// Sets the encoded password.
    #[must_use]
    pub fn with_password(mut self, encoded: impl Into<String>) -> Self {
        self.password = Some(encoded.into());
        self
    }

    /// Sets the password salt.
    #[must_use]
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the roles.
    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Returns `true` if the user holds `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Returns the encoded password, or an empty string.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.as_deref().unwrap_or_default()
    }

    /// Returns the salt, if any.
    #[must_use]
    pub fn salt(&self) -> Option<&str> {
        self.salt.as_deref()
    }

    /// Returns a copy without password and salt.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        Self {
            username: self.username.clone(),
            roles: self.roles.clone(),
            password: None,
            salt: None,
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("username", &self.username)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

/// The user a shield authorized for the current request.
///
/// Inserted into the request extensions before the request continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub User);

impl AuthenticatedUser {
    /// Returns the user.
    #[must_use]
    pub const fn user(&self) -> &User {
        &self.0
    }
}
