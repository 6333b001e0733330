//! Application assembly and the request entry point.

use crate::wiring;
use keystone_config::KeystoneConfig;
use keystone_core::{
    BoxFuture, CallbackResolver, Container, Controller, KeystoneError, KeystoneResult, Request,
    Response,
};
use keystone_middleware::stages::{
    error_response, ErrorBoundaryMiddleware, RequestIdMiddleware, RequestLoggingMiddleware,
};
use keystone_middleware::{
    BoxedMiddleware, DispatchHandler, Middleware, MiddlewareChain, RequestHandler,
};
use keystone_router::{DuplicateRoutePolicy, RouteMatcher, RouteTable, UriGenerator};
use keystone_security::{
    Authenticator, Clock, ContextMap, MemorySessionStore, SecurityContext, SessionConfig,
    SessionMiddleware, SessionStore, Shield, DEFAULT_MAX_LIFETIME,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Container id under which the built [`UriGenerator`] is registered.
pub const URL_GENERATOR_SERVICE: &str = "url_generator";

type Registration = Box<dyn FnOnce(&mut CallbackResolver) + Send>;

/// A fully assembled application.
///
/// Requests flow through the built-in stages, the session and shield layers,
/// user middleware and finally the dispatcher:
///
/// ```text
/// RequestId → ErrorBoundary → Logging → Session → Shields → user middleware → Dispatch
/// ```
pub struct App {
    chain: MiddlewareChain,
    routes: Arc<RouteTable>,
    generator: UriGenerator,
    container: Arc<Container>,
    contexts: ContextMap,
}

impl App {
    /// Starts building an application.
    #[must_use]
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// Handles one request. Never fails: errors become JSON error responses.
    pub async fn handle(&self, request: Request) -> Response {
        match self.chain.handle(request).await {
            Ok(response) => response,
            Err(err) => error_response(&err, None),
        }
    }

    /// Returns the route table.
    #[must_use]
    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    /// Returns the URL generator for the route table.
    #[must_use]
    pub fn url_generator(&self) -> &UriGenerator {
        &self.generator
    }

    /// Returns the service container.
    #[must_use]
    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Returns the security contexts.
    #[must_use]
    pub fn contexts(&self) -> &ContextMap {
        &self.contexts
    }

    /// Returns middleware names in execution order.
    #[must_use]
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.chain.middleware_names()
    }
}

impl RequestHandler for App {
    fn handle(&self, request: Request) -> BoxFuture<'_, KeystoneResult<Response>> {
        Box::pin(async move { Ok(App::handle(self, request).await) })
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.routes.len())
            .field("middleware", &self.middleware_names())
            .field("contexts", &self.contexts.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`App`].
///
/// # Example
///
/// ```rust
/// use keystone::prelude::*;
///
/// let mut builder = App::builder();
/// builder
///     .routes_mut()
///     .add_get("/", Callback::closure(|_req, _params| async { Ok("home") }))
///     .unwrap();
/// let app = builder.build().unwrap();
/// assert_eq!(app.routes().len(), 1);
/// ```
pub struct AppBuilder {
    routes: RouteTable,
    container: Arc<Container>,
    registrations: Vec<Registration>,
    middleware: Vec<BoxedMiddleware>,
    session_store: Option<Arc<dyn SessionStore>>,
    session_config: SessionConfig,
    session_lifetime: Duration,
    sessions: bool,
    contexts: ContextMap,
    shields: Vec<Shield>,
    authenticator: Option<Arc<Authenticator>>,
    clock: Option<Arc<dyn Clock>>,
    base_url: Option<String>,
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppBuilder {
    /// Creates an empty builder with its own container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            routes: RouteTable::new(),
            container: Arc::new(Container::new()),
            registrations: Vec::new(),
            middleware: Vec::new(),
            session_store: None,
            session_config: SessionConfig::default(),
            session_lifetime: DEFAULT_MAX_LIFETIME,
            sessions: false,
            contexts: ContextMap::new(),
            shields: Vec::new(),
            authenticator: None,
            clock: None,
            base_url: None,
        }
    }

    /// Applies routing, session and security settings from `config`.
    ///
    /// Contexts pick up a clock set earlier with [`AppBuilder::with_clock`].
    ///
    /// # Errors
    ///
    /// Fails when the configuration does not validate or names an unknown
    /// security context.
    pub fn with_config(mut self, config: &KeystoneConfig) -> KeystoneResult<Self> {
        config
            .validate()
            .map_err(|e| KeystoneError::internal_with_source("invalid configuration", e))?;

        self.routes.set_policy(config.routing.duplicate_routes);
        self.base_url.clone_from(&config.routing.base_url);
        self.session_config = wiring::session_config(&config.session);
        self.session_lifetime = Duration::from_secs(config.session.max_lifetime_secs);

        let security = &config.security;
        for context in &security.contexts {
            self.contexts
                .insert(wiring::context(context, self.clock.as_ref())?);
        }

        let authenticator = Arc::new(Authenticator::new(
            Arc::new(wiring::provider(&security.users)),
            wiring::encoder(&security.encoder),
        ));
        for shield in &security.shields {
            self.shields
                .push(wiring::shield(shield, &self.contexts, &authenticator)?);
        }
        self.authenticator = Some(authenticator);

        tracing::debug!(
            contexts = self.contexts.len(),
            shields = self.shields.len(),
            users = security.users.len(),
            "Configuration applied"
        );
        Ok(self)
    }

    /// Returns the route table for registration.
    pub fn routes_mut(&mut self) -> &mut RouteTable {
        &mut self.routes
    }

    /// Replaces the route table.
    #[must_use]
    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    /// Sets the duplicate route name policy for routes added afterwards.
    #[must_use]
    pub fn with_route_policy(mut self, policy: DuplicateRoutePolicy) -> Self {
        self.routes.set_policy(policy);
        self
    }

    /// Sets the scheme and host for absolute URL generation.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Returns the service container.
    #[must_use]
    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Uses `container` instead of the builder's own.
    #[must_use]
    pub fn with_container(mut self, container: Arc<Container>) -> Self {
        self.container = container;
        self
    }

    /// Registers a controller constructor for `Class` and `Class:action`
    /// callbacks not found in the container.
    #[must_use]
    pub fn controller<C, F>(mut self, name: impl Into<String>, constructor: F) -> Self
    where
        C: Controller,
        F: Fn() -> C + Send + Sync + 'static,
    {
        let name = name.into();
        self.registrations
            .push(Box::new(move |resolver| resolver.register_controller(name, constructor)));
        self
    }

    /// Appends a user middleware. User middleware run after the shields.
    #[must_use]
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Appends an already shared user middleware.
    #[must_use]
    pub fn middleware_shared(mut self, middleware: BoxedMiddleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Enables sessions even when no shield is configured.
    #[must_use]
    pub fn with_sessions(mut self) -> Self {
        self.sessions = true;
        self
    }

    /// Uses `store` for sessions. Defaults to a [`MemorySessionStore`].
    #[must_use]
    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self.sessions = true;
        self
    }

    /// Sets the session cookie attributes.
    #[must_use]
    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets how long the default [`MemorySessionStore`] keeps a session that
    /// is neither read nor written.
    #[must_use]
    pub fn with_session_lifetime(mut self, lifetime: Duration) -> Self {
        self.session_lifetime = lifetime;
        self
    }

    /// Sets the clock used by contexts built from configuration and by the
    /// default session store.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Adds a security context.
    #[must_use]
    pub fn with_context(mut self, context: SecurityContext) -> Self {
        self.contexts.insert(context);
        self
    }

    /// Returns a context added so far.
    #[must_use]
    pub fn context(&self, name: &str) -> Option<Arc<SecurityContext>> {
        self.contexts.get(name).cloned()
    }

    /// Returns the authenticator built from configuration, if any.
    #[must_use]
    pub fn authenticator(&self) -> Option<&Arc<Authenticator>> {
        self.authenticator.as_ref()
    }

    /// Appends a shield. Shields run in the order added.
    #[must_use]
    pub fn shield(mut self, shield: Shield) -> Self {
        self.shields.push(shield);
        self
    }

    /// Assembles the application.
    ///
    /// # Errors
    ///
    /// Fails when the base URL is invalid.
    pub fn build(self) -> KeystoneResult<App> {
        let mut resolver = CallbackResolver::new(Arc::clone(&self.container));
        for registration in self.registrations {
            registration(&mut resolver);
        }

        let routes = Arc::new(self.routes);
        let mut generator = UriGenerator::new(Arc::clone(&routes));
        if let Some(base_url) = &self.base_url {
            generator = generator.with_base_url(base_url)?;
        }
        self.container
            .set(URL_GENERATOR_SERVICE, Arc::new(generator.clone()));

        let mut chain = MiddlewareChain::new();
        chain
            .add(RequestIdMiddleware::new())
            .add(ErrorBoundaryMiddleware::new())
            .add(RequestLoggingMiddleware::new());

        if self.sessions || !self.shields.is_empty() {
            let store = self.session_store.unwrap_or_else(|| {
                let store = MemorySessionStore::new().with_max_lifetime(self.session_lifetime);
                Arc::new(match self.clock {
                    Some(clock) => store.with_clock(clock),
                    None => store,
                })
            });
            chain.add(SessionMiddleware::with_config(store, self.session_config));
        }
        for shield in self.shields {
            chain.add(shield);
        }
        for middleware in self.middleware {
            chain.add_shared(middleware);
        }
        chain.set_terminal(DispatchHandler::new(
            RouteMatcher::new(Arc::clone(&routes)),
            Arc::new(resolver),
        ));

        tracing::info!(
            routes = routes.len(),
            middleware = ?chain.middleware_names(),
            contexts = self.contexts.len(),
            "Application built"
        );

        Ok(App {
            chain,
            routes,
            generator,
            container: self.container,
            contexts: self.contexts,
        })
    }
}

impl fmt::Debug for AppBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppBuilder")
            .field("routes", &self.routes.len())
            .field("controllers", &self.registrations.len())
            .field("middleware", &self.middleware.len())
            .field("contexts", &self.contexts.len())
            .field("shields", &self.shields.len())
            .finish_non_exhaustive()
    }
}
