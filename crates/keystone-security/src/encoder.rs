//! Password encoders.
//!
//! Encoders are plain strategies behind [`PasswordEncoder`]; pick one per
//! user provider. Every comparison runs in constant time.

use crate::error::{SecurityError, SecurityResult};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;

/// Longest password, in bytes, that encoders accept.
pub const MAX_PASSWORD_LENGTH: usize = 4096;

/// Default number of digest rounds.
pub const DEFAULT_ITERATIONS: u32 = 5000;

/// Encodes and verifies passwords.
pub trait PasswordEncoder: Send + Sync + fmt::Debug + 'static {
    /// Encodes `raw` with an optional salt.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::PasswordTooLong`] when `raw` exceeds
    /// [`MAX_PASSWORD_LENGTH`].
    fn encode(&self, raw: &str, salt: Option<&str>) -> SecurityResult<String>;

    /// Returns `true` if `raw` encodes to `encoded`.
    fn verify(&self, encoded: &str, raw: &str, salt: Option<&str>) -> bool;

    /// Returns `true` if `raw` is too long to be hashed.
    fn is_password_too_long(&self, raw: &str) -> bool {
        raw.len() > MAX_PASSWORD_LENGTH
    }
}

/// Stores passwords as given. Only for tests and fixtures.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextEncoder {
    ignore_case: bool,
}

impl PlaintextEncoder {
    /// Creates a case-sensitive encoder.
    #[must_use]
    pub const fn new() -> Self {
        Self { ignore_case: false }
    }

    /// Creates an encoder that compares case-insensitively.
    #[must_use]
    pub const fn ignore_case() -> Self {
        Self { ignore_case: true }
    }
}

impl PasswordEncoder for PlaintextEncoder {
    fn encode(&self, raw: &str, salt: Option<&str>) -> SecurityResult<String> {
        if self.is_password_too_long(raw) {
            return Err(SecurityError::PasswordTooLong {
                max: MAX_PASSWORD_LENGTH,
            });
        }
        Ok(merge_password_and_salt(raw, salt))
    }

    fn verify(&self, encoded: &str, raw: &str, salt: Option<&str>) -> bool {
        if self.is_password_too_long(raw) {
            return false;
        }
        let candidate = merge_password_and_salt(raw, salt);
        if self.ignore_case {
            constant_time_eq(
                encoded.to_lowercase().as_bytes(),
                candidate.to_lowercase().as_bytes(),
            )
        } else {
            constant_time_eq(encoded.as_bytes(), candidate.as_bytes())
        }
    }
}

/// Digest algorithm used by [`DigestEncoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// SHA-256.
    Sha256,
    /// SHA-512.
    #[default]
    Sha512,
}

/// Iterated salted digest, base64 encoded.
///
/// The first round hashes `password{salt}`; every further round hashes the
/// previous digest followed by `password{salt}` again.
#[derive(Debug, Clone, Copy)]
pub struct DigestEncoder {
    algorithm: DigestAlgorithm,
    iterations: u32,
}

impl Default for DigestEncoder {
    fn default() -> Self {
        Self::new(DigestAlgorithm::default())
    }
}

impl DigestEncoder {
    /// Creates an encoder with [`DEFAULT_ITERATIONS`] rounds.
    #[must_use]
    pub const fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            algorithm,
            iterations: DEFAULT_ITERATIONS,
        }
    }

    /// Sets the number of rounds (at least one).
    #[must_use]
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    /// Returns the algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Returns the number of rounds.
    #[must_use]
    pub const fn iterations(&self) -> u32 {
        self.iterations
    }

    fn digest(&self, salted: &[u8]) -> Vec<u8> {
        match self.algorithm {
            DigestAlgorithm::Sha256 => stretch::<Sha256>(salted, self.iterations),
            DigestAlgorithm::Sha512 => stretch::<Sha512>(salted, self.iterations),
        }
    }
}

impl PasswordEncoder for DigestEncoder {
    fn encode(&self, raw: &str, salt: Option<&str>) -> SecurityResult<String> {
        if self.is_password_too_long(raw) {
            return Err(SecurityError::PasswordTooLong {
                max: MAX_PASSWORD_LENGTH,
            });
        }
        let salted = merge_password_and_salt(raw, salt);
        Ok(general_purpose::STANDARD.encode(self.digest(salted.as_bytes())))
    }

    fn verify(&self, encoded: &str, raw: &str, salt: Option<&str>) -> bool {
        self.encode(raw, salt)
            .is_ok_and(|candidate| constant_time_eq(encoded.as_bytes(), candidate.as_bytes()))
    }
}

fn stretch<D: Digest>(salted: &[u8], iterations: u32) -> Vec<u8> {
    let mut digest = D::digest(salted).to_vec();
    for _ in 1..iterations {
        let mut hasher = D::new();
        hasher.update(&digest);
        hasher.update(salted);
        digest = hasher.finalize().to_vec();
    }
    digest
}

/// `password{salt}`, or the bare password without a salt.
fn merge_password_and_salt(raw: &str, salt: Option<&str>) -> String {
    match salt {
        Some(salt) if !salt.is_empty() => format!("{raw}{{{salt}}}"),
        _ => raw.to_string(),
    }
}

/// Compares without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
