//! Role checks.

use crate::user::User;
use std::fmt;

/// Decides whether a user may access a rule's paths.
pub trait Authorizer: Send + Sync + fmt::Debug + 'static {
    /// Returns `true` if `user` satisfies `required_roles`.
    fn is_granted(&self, user: &User, required_roles: &[String]) -> bool;
}

/// Grants when no roles are required or the user holds any one of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleAuthorizer;

impl Authorizer for RoleAuthorizer {
    fn is_granted(&self, user: &User, required_roles: &[String]) -> bool {
        required_roles.is_empty() || required_roles.iter().any(|role| user.has_role(role))
    }
}
