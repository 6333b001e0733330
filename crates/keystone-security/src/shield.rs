//! Shield middleware: the per-request security state machine.
//!
//! For one [`SecurityContext`] a shield classifies every request:
//!
//! ```text
//! login path (form)  ── POST ──→ LoginSubmission  → verify, regenerate, 302
//!                    └─ other ─→ Unshielded        → next
//! logout path        ─────────→ LogoutRequest     → clear bucket, 302
//! no rule matches    ─────────→ Unshielded        → next
//! rule, no user      ─────────→ ShieldedUnauthenticated → 401 / 302 login
//! rule, user, denied ─────────→ ShieldedUnauthorized    → 403
//! rule, user, granted ────────→ ShieldedAuthorized      → next
//! ```
//!
//! Shields read the [`Session`] extension, so they must run inside a
//! [`crate::SessionMiddleware`].

use crate::authenticator::Authenticator;
use crate::authorizer::{Authorizer, RoleAuthorizer};
use crate::context::SecurityContext;
use crate::error::SecurityResult;
use crate::session::Session;
use crate::user::{AuthenticatedUser, User};
use base64::{engine::general_purpose, Engine as _};
use http::header::{HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE};
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Collected};
use keystone_core::{
    normalize_path, BoxFuture, KeystoneError, KeystoneResult, Request, Response, ResponseExt,
};
use keystone_middleware::{Middleware, Next};
use std::sync::Arc;

/// Where a request stands relative to one security context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShieldState {
    /// No rule covers the path.
    Unshielded,
    /// A rule covers the path and nobody is logged in.
    ShieldedUnauthenticated,
    /// A rule covers the path and the user lacks its roles.
    ShieldedUnauthorized,
    /// A rule covers the path and the user may proceed.
    ShieldedAuthorized(User),
    /// Credentials posted to the login path.
    LoginSubmission,
    /// The logout path was requested.
    LogoutRequest,
}

impl ShieldState {
    /// Returns a short name for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unshielded => "unshielded",
            Self::ShieldedUnauthenticated => "shielded_unauthenticated",
            Self::ShieldedUnauthorized => "shielded_unauthorized",
            Self::ShieldedAuthorized(_) => "shielded_authorized",
            Self::LoginSubmission => "login_submission",
            Self::LogoutRequest => "logout_request",
        }
    }
}

/// Login form settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormConfig {
    /// Path of the login form; credentials are posted here.
    pub login_path: String,
    /// Redirect target after login when no referrer applies.
    pub login_target: String,
    /// Form field carrying the username.
    pub username_field: String,
    /// Form field carrying the password.
    pub password_field: String,
    /// Form field carrying the remember-me flag.
    pub remember_field: String,
    /// Redirect back to the page that triggered the login.
    pub use_referer: bool,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            login_target: "/".to_string(),
            username_field: "_username".to_string(),
            password_field: "_password".to_string(),
            remember_field: "_remember".to_string(),
            use_referer: true,
        }
    }
}

/// How a shield challenges unauthenticated visitors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShieldScheme {
    /// HTTP Basic: `401` with a `WWW-Authenticate` challenge.
    Basic {
        /// Realm announced in the challenge.
        realm: String,
    },
    /// Login form: `302` to the login path.
    Form(FormConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Logout {
    path: String,
    target: String,
}

/// Guards the paths of one security context.
#[derive(Debug, Clone)]
pub struct Shield {
    context: Arc<SecurityContext>,
    scheme: ShieldScheme,
    authenticator: Arc<Authenticator>,
    authorizer: Arc<dyn Authorizer>,
    logout: Option<Logout>,
}

impl Shield {
    /// Creates a shield using [`RoleAuthorizer`].
    #[must_use]
    pub fn new(
        context: Arc<SecurityContext>,
        scheme: ShieldScheme,
        authenticator: Arc<Authenticator>,
    ) -> Self {
        Self {
            context,
            scheme,
            authenticator,
            authorizer: Arc::new(RoleAuthorizer),
            logout: None,
        }
    }

    /// Creates an HTTP Basic shield.
    #[must_use]
    pub fn basic(
        context: Arc<SecurityContext>,
        realm: impl Into<String>,
        authenticator: Arc<Authenticator>,
    ) -> Self {
        Self::new(
            context,
            ShieldScheme::Basic {
                realm: realm.into(),
            },
            authenticator,
        )
    }

    /// Creates a login form shield.
    #[must_use]
    pub fn form(
        context: Arc<SecurityContext>,
        form: FormConfig,
        authenticator: Arc<Authenticator>,
    ) -> Self {
        Self::new(context, ShieldScheme::Form(form), authenticator)
    }

    /// Replaces the authorizer.
    #[must_use]
    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    /// Enables a logout path that redirects to `target`.
    #[must_use]
    pub fn with_logout(mut self, path: impl Into<String>, target: impl Into<String>) -> Self {
        self.logout = Some(Logout {
            path: path.into(),
            target: target.into(),
        });
        self
    }

    /// Returns the guarded context.
    #[must_use]
    pub const fn context(&self) -> &Arc<SecurityContext> {
        &self.context
    }

    /// Returns the challenge scheme.
    #[must_use]
    pub const fn scheme(&self) -> &ShieldScheme {
        &self.scheme
    }

    /// Classifies a request.
    ///
    /// For Basic shields a request carrying an `Authorization` header on a
    /// guarded path logs its user into the context as a side effect.
    ///
    /// # Errors
    ///
    /// Fails only on session or serialization errors; bad credentials are
    /// reported as [`ShieldState::ShieldedUnauthenticated`].
    pub fn evaluate(&self, request: &Request, session: &Session) -> SecurityResult<ShieldState> {
        let path = normalize_path(request.uri().path());
        let path = path.as_ref();

        if let ShieldScheme::Form(form) = &self.scheme {
            if path == form.login_path {
                return Ok(if *request.method() == Method::POST {
                    ShieldState::LoginSubmission
                } else {
                    ShieldState::Unshielded
                });
            }
        }

        if self.logout.as_ref().is_some_and(|logout| logout.path == path) {
            return Ok(ShieldState::LogoutRequest);
        }

        let Some(rule) = self.context.rule_for(path) else {
            return Ok(ShieldState::Unshielded);
        };

        let user = match self.context.user(session) {
            Some(user) => Some(user),
            None => self.basic_login(request, session)?,
        };

        Ok(match user {
            None => ShieldState::ShieldedUnauthenticated,
            Some(user) if self.authorizer.is_granted(&user, rule.roles()) => {
                ShieldState::ShieldedAuthorized(user)
            }
            Some(_) => ShieldState::ShieldedUnauthorized,
        })
    }

    fn basic_login(&self, request: &Request, session: &Session) -> SecurityResult<Option<User>> {
        if !matches!(self.scheme, ShieldScheme::Basic { .. }) {
            return Ok(None);
        }
        let Some((username, password)) = basic_credentials(request) else {
            return Ok(None);
        };

        match self.authenticator.authenticate(&username, &password) {
            Ok(user) => {
                self.context.set_user(session, &user)?;
                Ok(Some(user))
            }
            Err(err) if err.is_authentication_failure() => {
                tracing::info!(
                    context = self.context.name(),
                    reason = %err,
                    "Basic authentication failed"
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn challenge(&self, request: &Request, session: &Session) -> KeystoneResult<Response> {
        match &self.scheme {
            ShieldScheme::Basic { realm } => {
                let challenge = format!("Basic realm=\"{}\"", realm.replace('"', "\\\""));
                let value = HeaderValue::from_str(&challenge)
                    .map_err(|e| KeystoneError::internal_with_source("invalid realm", e))?;
                let mut response = Response::empty(StatusCode::UNAUTHORIZED);
                response.headers_mut().insert(WWW_AUTHENTICATE, value);
                Ok(response)
            }
            ShieldScheme::Form(form) => {
                let uri = request.uri();
                let path = normalize_path(uri.path());
                let target = match uri.query() {
                    Some(query) => format!("{path}?{query}"),
                    None => path.into_owned(),
                };
                self.context.save_referer(session, &target);
                Ok(Response::redirect(&form.login_path))
            }
        }
    }

    async fn login(
        &self,
        form: &FormConfig,
        request: Request,
        session: &Session,
    ) -> KeystoneResult<Response> {
        let body = request
            .into_body()
            .collect()
            .await
            .map(Collected::to_bytes)
            .unwrap_or_default();
        let fields: Vec<(String, String)> = serde_urlencoded::from_bytes(&body).unwrap_or_default();
        let field = |name: &str| {
            fields
                .iter()
                .find(|(key, _)| key == name)
                .map_or("", |(_, value)| value.as_str())
        };

        match self
            .authenticator
            .authenticate(field(&form.username_field), field(&form.password_field))
        {
            Ok(user) => {
                let referer = if form.use_referer {
                    self.context.take_referer(session)
                } else {
                    None
                };

                // The old id keeps the current bucket, stamped with its
                // destroy deadline; the new id starts clean.
                let keep_until = self.context.mark_for_destruction(session);
                session.regenerate(keep_until);
                self.context.clear(session);
                self.context.set_user(session, &user)?;
                if is_truthy(field(&form.remember_field)) {
                    self.context.set_remember(session);
                }

                tracing::info!(
                    context = self.context.name(),
                    user = user.username(),
                    "Login succeeded"
                );
                Ok(Response::redirect(
                    referer.as_deref().unwrap_or(&form.login_target),
                ))
            }
            Err(err) if err.is_authentication_failure() => {
                tracing::info!(context = self.context.name(), reason = %err, "Login failed");
                self.context.flag_auth_error(session);
                Ok(Response::redirect(&form.login_path))
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl Middleware for Shield {
    fn name(&self) -> &'static str {
        "shield"
    }

    fn process<'a>(
        &'a self,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, KeystoneResult<Response>> {
        Box::pin(async move {
            let session = Session::from_request(&request).ok_or_else(|| {
                KeystoneError::internal("shield requires the session middleware")
            })?;
            let state = self.evaluate(&request, &session)?;

            tracing::debug!(
                context = self.context.name(),
                state = state.as_str(),
                http.path = %request.uri().path(),
                "Shield evaluated"
            );

            match state {
                ShieldState::Unshielded => next.run(request).await,
                ShieldState::LoginSubmission => match &self.scheme {
                    ShieldScheme::Form(form) => self.login(form, request, &session).await,
                    ShieldScheme::Basic { .. } => next.run(request).await,
                },
                ShieldState::LogoutRequest => {
                    self.context.clear(&session);
                    let target = self.logout.as_ref().map_or("/", |l| l.target.as_str());
                    Ok(Response::redirect(target))
                }
                ShieldState::ShieldedUnauthenticated => self.challenge(&request, &session),
                ShieldState::ShieldedUnauthorized => Ok(Response::empty(StatusCode::FORBIDDEN)),
                ShieldState::ShieldedAuthorized(user) => {
                    request.extensions_mut().insert(AuthenticatedUser(user));
                    next.run(request).await
                }
            }
        })
    }
}

/// Decodes `Authorization: Basic base64(user:password)`.
fn basic_credentials(request: &Request) -> Option<(String, String)> {
    let header = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "on" | "true" | "yes"
    )
}
