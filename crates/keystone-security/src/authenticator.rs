//! Credential verification.

use crate::encoder::{PasswordEncoder, MAX_PASSWORD_LENGTH};
use crate::error::{SecurityError, SecurityResult};
use crate::provider::UserProvider;
use crate::user::User;
use std::sync::Arc;

/// Verifies a username and password against a provider.
#[derive(Debug, Clone)]
pub struct Authenticator {
    provider: Arc<dyn UserProvider>,
    encoder: Arc<dyn PasswordEncoder>,
    /// Checked against when the username is unknown, so both failures cost
    /// one full verification.
    decoy: String,
}

impl Authenticator {
    /// Creates an authenticator.
    #[must_use]
    pub fn new(provider: Arc<dyn UserProvider>, encoder: Arc<dyn PasswordEncoder>) -> Self {
        let decoy = encoder.encode("keystone-decoy", None).unwrap_or_default();
        Self {
            provider,
            encoder,
            decoy,
        }
    }

    /// Returns the password encoder.
    #[must_use]
    pub fn encoder(&self) -> &Arc<dyn PasswordEncoder> {
        &self.encoder
    }

    /// Returns the sanitized user on success.
    ///
    /// # Errors
    ///
    /// - [`SecurityError::PasswordTooLong`] before any lookup is made
    /// - [`SecurityError::InvalidUsername`] if the provider has no such user
    /// - [`SecurityError::InvalidPassword`] if the password does not verify
    pub fn authenticate(&self, username: &str, password: &str) -> SecurityResult<User> {
        if self.encoder.is_password_too_long(password) {
            return Err(SecurityError::PasswordTooLong {
                max: MAX_PASSWORD_LENGTH,
            });
        }

        let Some(user) = self.provider.load_user_by_username(username) else {
            self.encoder.verify(&self.decoy, password, None);
            return Err(SecurityError::InvalidUsername);
        };

        if !self.encoder.verify(user.password(), password, user.salt()) {
            return Err(SecurityError::InvalidPassword);
        }

        tracing::debug!(user = user.username(), "Credentials verified");
        Ok(user.sanitized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{DigestAlgorithm, DigestEncoder};
    use crate::provider::InMemoryUserProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingEncoder {
        verifications: AtomicUsize,
    }

    impl PasswordEncoder for CountingEncoder {
        fn encode(&self, raw: &str, _salt: Option<&str>) -> SecurityResult<String> {
            Ok(raw.to_string())
        }

        fn verify(&self, encoded: &str, raw: &str, _salt: Option<&str>) -> bool {
            self.verifications.fetch_add(1, Ordering::SeqCst);
            encoded == raw
        }
    }

    fn authenticator() -> Authenticator {
        let encoder = DigestEncoder::new(DigestAlgorithm::Sha256).with_iterations(10);
        let hash = encoder.encode("s3cret", Some("ada-salt")).unwrap();
        let provider = InMemoryUserProvider::new()
            .with_user(User::new("ada", ["admin"]).with_password(hash).with_salt("ada-salt"));
        Authenticator::new(Arc::new(provider), Arc::new(encoder))
    }

    #[test]
    fn test_success_returns_sanitized_user() {
        let user = authenticator().authenticate("ada", "s3cret").unwrap();
        assert_eq!(user.username(), "ada");
        assert_eq!(user.password(), "");
        assert_eq!(user.salt(), None);
    }

    #[test]
    fn test_failures() {
        let auth = authenticator();
        assert!(matches!(
            auth.authenticate("eve", "s3cret"),
            Err(SecurityError::InvalidUsername)
        ));
        assert!(matches!(
            auth.authenticate("ada", "wrong"),
            Err(SecurityError::InvalidPassword)
        ));
        assert!(matches!(
            auth.authenticate("ada", &"x".repeat(MAX_PASSWORD_LENGTH + 1)),
            Err(SecurityError::PasswordTooLong { .. })
        ));
    }

    #[test]
    fn test_unknown_user_costs_a_verification() {
        let encoder = Arc::new(CountingEncoder::default());
        let provider =
            InMemoryUserProvider::new().with_user(User::new("ada", ["admin"]).with_password("pw"));
        let auth = Authenticator::new(Arc::new(provider), Arc::clone(&encoder) as _);

        assert!(matches!(
            auth.authenticate("ada", "nope"),
            Err(SecurityError::InvalidPassword)
        ));
        assert_eq!(encoder.verifications.load(Ordering::SeqCst), 1);

        assert!(matches!(
            auth.authenticate("eve", "keystone-decoy"),
            Err(SecurityError::InvalidUsername)
        ));
        assert_eq!(encoder.verifications.load(Ordering::SeqCst), 2);
    }
}
