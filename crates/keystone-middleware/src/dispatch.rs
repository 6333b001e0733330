//! Terminal handler that routes and invokes callbacks.

use crate::middleware::RequestHandler;
use keystone_core::{
    normalize_path, BoxFuture, CallbackResolver, KeystoneResult, Params, Request, Response,
};
use keystone_router::RouteMatcher;
use std::sync::Arc;

/// The route a request was dispatched to.
///
/// Inserted into the request extensions before the callback runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute {
    /// Route name.
    pub name: String,
    /// Route pattern.
    pub pattern: String,
    /// Captured placeholder values.
    pub params: Params,
}

/// Matches the request against the route table, resolves the route's
/// callback and normalizes its output into a response.
///
/// Unmatched requests fail with [`keystone_core::KeystoneError::NotFound`];
/// mapping that to a `404` is left to the error boundary.
#[derive(Debug, Clone)]
pub struct DispatchHandler {
    matcher: RouteMatcher,
    resolver: Arc<CallbackResolver>,
}

impl DispatchHandler {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(matcher: RouteMatcher, resolver: Arc<CallbackResolver>) -> Self {
        Self { matcher, resolver }
    }

    /// Returns the route matcher.
    #[must_use]
    pub fn matcher(&self) -> &RouteMatcher {
        &self.matcher
    }

    async fn dispatch(&self, mut request: Request) -> KeystoneResult<Response> {
        let path = normalize_path(request.uri().path()).into_owned();
        let method = request.method().clone();

        let matched = self.matcher.match_route(&path, &method)?;
        let callback = self.resolver.resolve(matched.route.callback())?;

        tracing::debug!(
            http.method = %method,
            http.path = %path,
            route = matched.name(),
            "Dispatching"
        );

        request.extensions_mut().insert(MatchedRoute {
            name: matched.name().to_string(),
            pattern: matched.route.pattern().to_string(),
            params: matched.params.clone(),
        });

        callback.invoke(request, matched.params).await
    }
}

impl RequestHandler for DispatchHandler {
    fn handle(&self, request: Request) -> BoxFuture<'_, KeystoneResult<Response>> {
        Box::pin(self.dispatch(request))
    }
}
