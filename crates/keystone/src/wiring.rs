//! Turns configuration sections into security components.

use keystone_config::{
    ContextConfig, EncoderAlgorithm, EncoderConfig, SessionSection, ShieldConfig,
    ShieldSchemeKind, UserConfig,
};
use keystone_core::KeystoneResult;
use keystone_security::{
    Authenticator, Clock, ContextMap, DigestAlgorithm, DigestEncoder, FormConfig,
    InMemoryUserProvider, PasswordEncoder, PlaintextEncoder, SecurityContext, SessionConfig,
    Shield, User,
};
use std::sync::Arc;
use std::time::Duration;

pub(crate) fn session_config(section: &SessionSection) -> SessionConfig {
    SessionConfig {
        cookie_name: section.cookie_name.clone(),
        cookie_path: section.cookie_path.clone(),
        secure: section.secure,
        http_only: section.http_only,
    }
}

pub(crate) fn context(
    config: &ContextConfig,
    clock: Option<&Arc<dyn Clock>>,
) -> KeystoneResult<SecurityContext> {
    let mut context = SecurityContext::new(&config.name)
        .with_ttl(Duration::from_secs(config.ttl_secs))
        .with_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .with_regeneration_delay(Duration::from_secs(config.regeneration_delay_secs))
        .with_remember_lifetime(Duration::from_secs(config.remember_lifetime_secs));
    if config.default {
        context = context.as_default();
    }
    if let Some(clock) = clock {
        context = context.with_clock(Arc::clone(clock));
    }
    for rule in &config.rules {
        context = context.with_rule(&rule.pattern, &rule.roles)?;
    }
    Ok(context)
}

pub(crate) fn encoder(config: &EncoderConfig) -> Arc<dyn PasswordEncoder> {
    let digest = match config.algorithm {
        EncoderAlgorithm::Plaintext if config.ignore_case => {
            return Arc::new(PlaintextEncoder::ignore_case())
        }
        EncoderAlgorithm::Plaintext => return Arc::new(PlaintextEncoder::new()),
        EncoderAlgorithm::Sha256 => DigestAlgorithm::Sha256,
        EncoderAlgorithm::Sha512 => DigestAlgorithm::Sha512,
    };
    Arc::new(DigestEncoder::new(digest).with_iterations(config.iterations))
}

/// Configured passwords are stored already encoded.
pub(crate) fn provider(users: &[UserConfig]) -> InMemoryUserProvider {
    users
        .iter()
        .map(|config| {
            let user = User::new(&config.username, &config.roles).with_password(&config.password);
            match &config.salt {
                Some(salt) => user.with_salt(salt),
                None => user,
            }
        })
        .collect()
}

pub(crate) fn shield(
    config: &ShieldConfig,
    contexts: &ContextMap,
    authenticator: &Arc<Authenticator>,
) -> KeystoneResult<Shield> {
    let context = Arc::clone(contexts.require(&config.context)?);
    let authenticator = Arc::clone(authenticator);

    let shield = match config.scheme {
        ShieldSchemeKind::Basic => Shield::basic(context, &config.realm, authenticator),
        ShieldSchemeKind::Form => Shield::form(
            context,
            FormConfig {
                login_path: config.login_path.clone(),
                login_target: config.login_target.clone(),
                username_field: config.username_field.clone(),
                password_field: config.password_field.clone(),
                remember_field: config.remember_field.clone(),
                use_referer: config.use_referer,
            },
            authenticator,
        ),
    };

    Ok(match &config.logout_path {
        Some(path) => shield.with_logout(path, &config.logout_target),
        None => shield,
    })
}
