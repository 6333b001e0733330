//! Configuration schema types.
//!
//! This module defines the structure of every configuration section.

use keystone_router::DuplicateRoutePolicy;
use keystone_telemetry::LogConfig;
use serde::{Deserialize, Serialize};

/// Routing section.
///
/// # Example
///
/// ```
/// use keystone_config::RoutingConfig;
///
/// let config: RoutingConfig = toml::from_str(r#"
///     duplicate_routes = "reject"
///     base_url = "https://example.com"
/// "#).unwrap();
/// assert_eq!(config.base_url.as_deref(), Some("https://example.com"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// What happens when a route name is registered twice.
    #[serde(default)]
    pub duplicate_routes: DuplicateRoutePolicy,

    /// Scheme and host prepended by absolute URL generation.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Session cookie section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SessionSection {
    /// Cookie name.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Cookie `Path` attribute.
    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,

    /// Only send the cookie over HTTPS.
    #[serde(default)]
    pub secure: bool,

    /// Hide the cookie from scripts.
    #[serde(default = "default_true")]
    pub http_only: bool,

    /// Seconds a stored session survives without being read or written.
    /// `0` keeps sessions until they are destroyed.
    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            cookie_path: default_cookie_path(),
            secure: false,
            http_only: true,
            max_lifetime_secs: default_max_lifetime_secs(),
        }
    }
}

const fn default_max_lifetime_secs() -> u64 {
    1_800
}

fn default_cookie_name() -> String {
    "KEYSTONE_SESSION".to_string()
}

fn default_cookie_path() -> String {
    "/".to_string()
}

/// One protected path pattern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AccessRuleConfig {
    /// Regular expression searched in the request path.
    pub pattern: String,

    /// Roles of which the user needs any one. Empty means any user.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// A security context.
///
/// Durations are in seconds; `0` disables that deadline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    /// Context name, unique.
    pub name: String,

    /// Use this context when none is named.
    #[serde(default)]
    pub default: bool,

    /// Absolute login lifetime.
    #[serde(default)]
    pub ttl_secs: u64,

    /// Inactivity timeout.
    #[serde(default)]
    pub idle_timeout_secs: u64,

    /// Grace window of a replaced session id after login.
    #[serde(default)]
    pub regeneration_delay_secs: u64,

    /// Lifetime of remember-me logins.
    #[serde(default)]
    pub remember_lifetime_secs: u64,

    /// Protected paths, first match wins.
    #[serde(default)]
    pub rules: Vec<AccessRuleConfig>,
}

/// Challenge scheme of a shield.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShieldSchemeKind {
    /// HTTP Basic.
    Basic,
    /// Login form.
    #[default]
    Form,
}

/// A shield guarding one context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ShieldConfig {
    /// Name of the guarded context.
    pub context: String,

    /// Challenge scheme.
    #[serde(default)]
    pub scheme: ShieldSchemeKind,

    /// Realm announced by Basic challenges.
    #[serde(default = "default_realm")]
    pub realm: String,

    /// Login form path.
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Redirect target after login.
    #[serde(default = "default_target")]
    pub login_target: String,

    /// Logout path. No logout handling when unset.
    #[serde(default)]
    pub logout_path: Option<String>,

    /// Redirect target after logout.
    #[serde(default = "default_target")]
    pub logout_target: String,

    /// Username form field.
    #[serde(default = "default_username_field")]
    pub username_field: String,

    /// Password form field.
    #[serde(default = "default_password_field")]
    pub password_field: String,

    /// Remember-me form field.
    #[serde(default = "default_remember_field")]
    pub remember_field: String,

    /// Redirect back to the page that triggered the login.
    #[serde(default = "default_true")]
    pub use_referer: bool,
}

impl ShieldConfig {
    /// Creates a form shield config with default paths and fields.
    pub fn new(context: impl Into<String>, scheme: ShieldSchemeKind) -> Self {
        Self {
            context: context.into(),
            scheme,
            realm: default_realm(),
            login_path: default_login_path(),
            login_target: default_target(),
            logout_path: None,
            logout_target: default_target(),
            username_field: default_username_field(),
            password_field: default_password_field(),
            remember_field: default_remember_field(),
            use_referer: true,
        }
    }
}

fn default_realm() -> String {
    "Restricted".to_string()
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_target() -> String {
    "/".to_string()
}

fn default_username_field() -> String {
    "_username".to_string()
}

fn default_password_field() -> String {
    "_password".to_string()
}

fn default_remember_field() -> String {
    "_remember".to_string()
}

/// Password encoder algorithm.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EncoderAlgorithm {
    /// No hashing. Tests and fixtures only.
    Plaintext,
    /// Iterated SHA-256.
    Sha256,
    /// Iterated SHA-512.
    #[default]
    Sha512,
}

/// Password encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EncoderConfig {
    /// Algorithm.
    #[serde(default)]
    pub algorithm: EncoderAlgorithm,

    /// Digest rounds.
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Case-insensitive comparison (plaintext only).
    #[serde(default)]
    pub ignore_case: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            algorithm: EncoderAlgorithm::default(),
            iterations: default_iterations(),
            ignore_case: false,
        }
    }
}

fn default_iterations() -> u32 {
    5000
}

/// A user of the in-memory provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    /// Username, unique.
    pub username: String,

    /// Password, already encoded with the configured encoder.
    pub password: String,

    /// Salt used when encoding.
    #[serde(default)]
    pub salt: Option<String>,

    /// Roles.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Security section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct SecuritySection {
    /// Security contexts.
    #[serde(default)]
    pub contexts: Vec<ContextConfig>,

    /// Shields, in chain order.
    #[serde(default)]
    pub shields: Vec<ShieldConfig>,

    /// Password encoder.
    #[serde(default)]
    pub encoder: EncoderConfig,

    /// Users of the in-memory provider.
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

/// Telemetry section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Service name attached to startup logs.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LogConfig,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            logging: LogConfig::default(),
        }
    }
}

fn default_service_name() -> String {
    "keystone-app".to_string()
}

fn default_true() -> bool {
    true
}
