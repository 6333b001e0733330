//! Main configuration types.
//!
//! This module provides the top-level [`KeystoneConfig`] struct and its builder.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{
    ConfigError, EncoderAlgorithm, RoutingConfig, SecuritySection, SessionSection,
    ShieldSchemeKind, TelemetrySection,
};
use keystone_telemetry::LogConfig;

/// Complete Keystone application configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use keystone_config::KeystoneConfig;
///
/// let config = KeystoneConfig::default();
/// assert_eq!(config.session.cookie_name, "KEYSTONE_SESSION");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct KeystoneConfig {
    /// Routing configuration.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Session cookie configuration.
    #[serde(default)]
    pub session: SessionSection,

    /// Security contexts, shields, encoder and users.
    #[serde(default)]
    pub security: SecuritySection,

    /// Logging configuration.
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl KeystoneConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> KeystoneConfigBuilder {
        KeystoneConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `routing.base_url` is not an absolute `scheme://host` URL
    /// - the session cookie name is empty or not a cookie token
    /// - context names repeat, or more than one context is default
    /// - an access rule pattern does not compile
    /// - a shield names an unknown context or has relative paths
    /// - usernames repeat, or the encoder has zero iterations
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_routing()?;
        self.validate_session()?;
        self.validate_security()?;

        if self.telemetry.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "telemetry.logging.level",
                "must not be empty",
            ));
        }

        Ok(())
    }

    fn validate_routing(&self) -> Result<(), ConfigError> {
        let Some(base_url) = &self.routing.base_url else {
            return Ok(());
        };
        let uri: http::Uri = base_url
            .parse()
            .map_err(|e| ConfigError::invalid_value("routing.base_url", format!("{e}")))?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(ConfigError::invalid_value(
                "routing.base_url",
                "must include scheme and host",
            ));
        }
        Ok(())
    }

    fn validate_session(&self) -> Result<(), ConfigError> {
        let name = &self.session.cookie_name;
        let is_token = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.');
        if name.is_empty() || !name.chars().all(is_token) {
            return Err(ConfigError::invalid_value(
                "session.cookie_name",
                format!("'{name}' is not a valid cookie name"),
            ));
        }
        if !self.session.cookie_path.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "session.cookie_path",
                "must start with '/'",
            ));
        }
        Ok(())
    }

    fn validate_security(&self) -> Result<(), ConfigError> {
        let security = &self.security;

        let mut names = HashSet::new();
        for context in &security.contexts {
            if context.name.is_empty() {
                return Err(ConfigError::invalid_value(
                    "security.contexts.name",
                    "must not be empty",
                ));
            }
            if !names.insert(context.name.as_str()) {
                return Err(ConfigError::validation_error(format!(
                    "duplicate security context '{}'",
                    context.name
                )));
            }
            for rule in &context.rules {
                regex::Regex::new(&rule.pattern).map_err(|e| {
                    ConfigError::invalid_value(
                        format!("security.contexts.{}.rules", context.name),
                        e.to_string(),
                    )
                })?;
            }
        }
        if security.contexts.iter().filter(|c| c.default).count() > 1 {
            return Err(ConfigError::validation_error(
                "at most one security context may be default",
            ));
        }

        for shield in &security.shields {
            if !names.contains(shield.context.as_str()) {
                return Err(ConfigError::validation_error(format!(
                    "shield references unknown context '{}'",
                    shield.context
                )));
            }
            let field = |name: &str| format!("security.shields.{}.{name}", shield.context);
            if shield.scheme == ShieldSchemeKind::Form && !shield.login_path.starts_with('/') {
                return Err(ConfigError::invalid_value(field("login_path"), "must start with '/'"));
            }
            if let Some(logout) = &shield.logout_path {
                if !logout.starts_with('/') {
                    return Err(ConfigError::invalid_value(
                        field("logout_path"),
                        "must start with '/'",
                    ));
                }
                if shield.scheme == ShieldSchemeKind::Form && *logout == shield.login_path {
                    return Err(ConfigError::invalid_value(
                        field("logout_path"),
                        "must differ from login_path",
                    ));
                }
            }
        }

        if security.encoder.algorithm != EncoderAlgorithm::Plaintext
            && security.encoder.iterations == 0
        {
            return Err(ConfigError::invalid_value(
                "security.encoder.iterations",
                "must be at least 1",
            ));
        }

        let mut usernames = HashSet::new();
        for user in &security.users {
            if !usernames.insert(user.username.as_str()) {
                return Err(ConfigError::validation_error(format!(
                    "duplicate user '{}'",
                    user.username
                )));
            }
        }

        Ok(())
    }

    /// Development preset: pretty debug logs, non-secure cookies.
    ///
    /// # Example
    ///
    /// ```
    /// use keystone_config::KeystoneConfig;
    ///
    /// let config = KeystoneConfig::development();
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.telemetry.logging = LogConfig::development();
        config.session.secure = false;
        config
    }

    /// Production preset: JSON logs, secure cookies, duplicate route names
    /// rejected.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.telemetry.logging = LogConfig::production();
        config.session.secure = true;
        config.routing.duplicate_routes = keystone_router::DuplicateRoutePolicy::Reject;
        config
    }
}

/// Builder for [`KeystoneConfig`].
#[derive(Debug, Default)]
pub struct KeystoneConfigBuilder {
    routing: Option<RoutingConfig>,
    session: Option<SessionSection>,
    security: Option<SecuritySection>,
    telemetry: Option<TelemetrySection>,
}

impl KeystoneConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the routing configuration.
    #[must_use]
    pub fn routing(mut self, routing: RoutingConfig) -> Self {
        self.routing = Some(routing);
        self
    }

    /// Set the session configuration.
    #[must_use]
    pub fn session(mut self, session: SessionSection) -> Self {
        self.session = Some(session);
        self
    }

    /// Set the security configuration.
    #[must_use]
    pub fn security(mut self, security: SecuritySection) -> Self {
        self.security = Some(security);
        self
    }

    /// Set the telemetry configuration.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetrySection) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Build the configuration. Unset sections use their defaults.
    #[must_use]
    pub fn build(self) -> KeystoneConfig {
        KeystoneConfig {
            routing: self.routing.unwrap_or_default(),
            session: self.session.unwrap_or_default(),
            security: self.security.unwrap_or_default(),
            telemetry: self.telemetry.unwrap_or_default(),
        }
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<KeystoneConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
