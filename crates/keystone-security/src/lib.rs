//! # Keystone Security
//!
//! Sessions, security contexts and the shield state machine for the Keystone
//! micro-framework.
//!
//! ```text
//! Request → SessionMiddleware → Shield(context) → ... → Dispatch
//!              │                   │
//!              └─ Session ─────────┴─ SecurityContext bucket `_security.<name>`
//! ```
//!
//! - [`SessionMiddleware`] / [`Session`] / [`SessionStore`] - cookie sessions
//! - [`SecurityContext`] / [`ContextMap`] - protected paths and session-scoped
//!   login state with TTL, idle and grace-window expiry
//! - [`Shield`] - Basic or form challenge, login, logout, role checks
//! - [`PasswordEncoder`], [`UserProvider`], [`Authenticator`], [`Authorizer`]
//!
//! ## Example
//!
//! ```
//! use keystone_security::{
//!     Authenticator, InMemoryUserProvider, PlaintextEncoder, SecurityContext, Shield, User,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let context = SecurityContext::new("admin")
//!     .with_idle_timeout(Duration::from_secs(900))
//!     .with_rule("^/admin", ["admin"])
//!     .unwrap();
//!
//! let users = InMemoryUserProvider::new()
//!     .with_user(User::new("ada", ["admin"]).with_password("secret"));
//! let authenticator = Authenticator::new(Arc::new(users), Arc::new(PlaintextEncoder::new()));
//!
//! let shield = Shield::basic(Arc::new(context), "Admin area", Arc::new(authenticator));
//! assert_eq!(shield.context().name(), "admin");
//! ```

#![doc(html_root_url = "https://docs.rs/keystone-security/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod authenticator;
mod authorizer;
mod clock;
mod context;
mod encoder;
mod error;
mod provider;
mod session;
mod shield;
mod user;

pub use authenticator::Authenticator;
pub use authorizer::{Authorizer, RoleAuthorizer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{AccessRule, ContextMap, SecurityContext, USER_KEY};
pub use encoder::{
    DigestAlgorithm, DigestEncoder, PasswordEncoder, PlaintextEncoder, DEFAULT_ITERATIONS,
    MAX_PASSWORD_LENGTH,
};
pub use error::{SecurityError, SecurityResult};
pub use provider::{InMemoryUserProvider, UserProvider};
pub use session::{
    MemorySessionStore, Session, SessionConfig, SessionData, SessionMiddleware, SessionStore,
    DEFAULT_COOKIE_NAME, DEFAULT_MAX_LIFETIME,
};
pub use shield::{FormConfig, Shield, ShieldScheme, ShieldState};
pub use user::{AuthenticatedUser, User};
