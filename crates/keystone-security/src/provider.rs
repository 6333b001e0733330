//! User providers.

use crate::user::User;
use indexmap::IndexMap;
use std::fmt;

/// Looks users up by username.
pub trait UserProvider: Send + Sync + fmt::Debug + 'static {
    /// Returns the user with encoded credentials, `None` if unknown.
    fn load_user_by_username(&self, username: &str) -> Option<User>;
}

/// A fixed set of users held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserProvider {
    users: IndexMap<String, User>,
}

impl InMemoryUserProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user, replacing one with the same username.
    pub fn add(&mut self, user: User) -> &mut Self {
        self.users.insert(user.username().to_string(), user);
        self
    }

    /// Adds a user, builder style.
    #[must_use]
    pub fn with_user(mut self, user: User) -> Self {
        self.add(user);
        self
    }

    /// Returns the number of users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns `true` if there are no users.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserProvider for InMemoryUserProvider {
    fn load_user_by_username(&self, username: &str) -> Option<User> {
        self.users.get(username).cloned()
    }
}

impl FromIterator<User> for InMemoryUserProvider {
    fn from_iter<I: IntoIterator<Item = User>>(iter: I) -> Self {
        let mut provider = Self::new();
        for user in iter {
            provider.add(user);
        }
        provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let provider: InMemoryUserProvider = [
            User::new("ada", ["admin"]).with_password("a"),
            User::new("bob", ["user"]).with_password("b"),
        ]
        .into_iter()
        .collect();

        assert_eq!(provider.len(), 2);
        assert_eq!(provider.load_user_by_username("ada").unwrap().password(), "a");
        assert!(provider.load_user_by_username("eve").is_none());
    }

    #[test]
    fn test_replace_by_username() {
        let provider = InMemoryUserProvider::new()
            .with_user(User::new("ada", ["user"]))
            .with_user(User::new("ada", ["admin"]));

        assert_eq!(provider.len(), 1);
        assert!(provider.load_user_by_username("ada").unwrap().has_role("admin"));
    }
}
