//! Core middleware and handler traits.
//!
//! A [`Middleware`] receives the request and a [`Next`] for the rest of the
//! chain. It either delegates by calling [`Next::run`], optionally working on
//! the response afterwards, or short-circuits by returning its own response.
//! There is no implicit continuation: a middleware that never calls `next`
//! ends the chain for that request.
//!
//! The innermost element is a [`RequestHandler`], the terminal handler.
//!
//! # Example
//!
//! ```rust
//! use keystone_middleware::{BoxFuture, KeystoneResult, Middleware, Next, Request, Response};
//!
//! struct PoweredBy;
//!
//! impl Middleware for PoweredBy {
//!     fn name(&self) -> &'static str {
//!         "powered_by"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, KeystoneResult<Response>> {
//!         Box::pin(async move {
//!             let mut response = next.run(request).await?;
//!             response
//!                 .headers_mut()
//!                 .insert("x-powered-by", http::HeaderValue::from_static("keystone"));
//!             Ok(response)
//!         })
//!     }
//! }
//! ```

use keystone_core::{BoxFuture, KeystoneResult, Request, Response};
use std::fmt;
use std::future::Future;

/// The middleware trait.
///
/// # Invariants
///
/// - `next.run()` is called at most once; [`Next`] is consumed by it
/// - Errors from downstream are propagated, not swallowed, unless the
///   middleware's purpose is to translate them
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name of this middleware, used in logs.
    fn name(&self) -> &'static str;

    /// Processes the request.
    fn process<'a>(
        &'a self,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, KeystoneResult<Response>>;
}

/// The terminal handler at the end of a middleware chain.
pub trait RequestHandler: Send + Sync + 'static {
    /// Handles the request.
    fn handle(&self, request: Request) -> BoxFuture<'_, KeystoneResult<Response>>;
}

/// The remainder of the chain after the current middleware.
///
/// Built fresh for every request as a linked list of borrowed middleware
/// ending in the terminal handler.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Handler(&'a dyn RequestHandler),
}

impl<'a> Next<'a> {
    /// Wraps `next` with `middleware`.
    pub(crate) fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates the innermost link, which calls the terminal handler.
    pub(crate) fn handler(handler: &'a dyn RequestHandler) -> Self {
        Self {
            inner: NextInner::Handler(handler),
        }
    }

    /// Invokes the next middleware, or the terminal handler.
    ///
    /// This consumes `self` so it can only be called once.
    pub fn run(self, request: Request) -> BoxFuture<'a, KeystoneResult<Response>> {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.process(request, *next),
            NextInner::Handler(handler) => handler.handle(request),
        }
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            NextInner::Chain { middleware, .. } => f
                .debug_struct("Next")
                .field("middleware", &middleware.name())
                .finish_non_exhaustive(),
            NextInner::Handler(_) => f.write_str("Next(terminal)"),
        }
    }
}

/// A middleware built from a closure.
///
/// # Example
///
/// ```rust
/// use keystone_middleware::{FnMiddleware, Middleware};
///
/// let timing = FnMiddleware::new("timing", |request, next| {
///     Box::pin(async move {
///         let start = std::time::Instant::now();
///         let response = next.run(request).await;
///         tracing::debug!(elapsed = ?start.elapsed(), "request timed");
///         response
///     })
/// });
/// assert_eq!(timing.name(), "timing");
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: for<'a> Fn(Request, Next<'a>) -> BoxFuture<'a, KeystoneResult<Response>>
        + Send
        + Sync
        + 'static,
{
    /// Creates a new closure-based middleware.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(Request, Next<'a>) -> BoxFuture<'a, KeystoneResult<Response>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process<'a>(
        &'a self,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, KeystoneResult<Response>> {
        (self.func)(request, next)
    }
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A terminal handler built from an async closure.
pub struct FnHandler<F> {
    func: F,
}

/// Creates a [`RequestHandler`] from an async closure.
///
/// # Example
///
/// ```rust
/// use http::StatusCode;
/// use keystone_middleware::{handler_fn, Response, ResponseExt};
///
/// let handler = handler_fn(|_request| async { Ok(Response::empty(StatusCode::NO_CONTENT)) });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(func: F) -> FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = KeystoneResult<Response>> + Send + 'static,
{
    FnHandler { func }
}

impl<F, Fut> RequestHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = KeystoneResult<Response>> + Send + 'static,
{
    fn handle(&self, request: Request) -> BoxFuture<'_, KeystoneResult<Response>> {
        Box::pin((self.func)(request))
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Request as HttpRequest, StatusCode};
    use http_body_util::Full;
    use keystone_core::{KeystoneError, ResponseExt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn request() -> Request {
        HttpRequest::builder()
            .uri("/test")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    struct HeaderMiddleware {
        name: &'static str,
    }

    impl Middleware for HeaderMiddleware {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process<'a>(
            &'a self,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, KeystoneResult<Response>> {
            Box::pin(async move {
                let mut response = next.run(request).await?;
                response
                    .headers_mut()
                    .append("x-visited", http::HeaderValue::from_static(self.name));
                Ok(response)
            })
        }
    }

    #[tokio::test]
    async fn test_next_handler() {
        let handler = handler_fn(|_req| async { Ok(Response::empty(StatusCode::OK)) });
        let response = Next::handler(&handler).run(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_manual_chain_unwinds_inner_first() {
        let outer = HeaderMiddleware { name: "outer" };
        let inner = HeaderMiddleware { name: "inner" };
        let handler = handler_fn(|_req| async { Ok(Response::empty(StatusCode::OK)) });

        let next = Next::new(&outer, Next::new(&inner, Next::handler(&handler)));
        let response = next.run(request()).await.unwrap();

        let visited: Vec<_> = response
            .headers()
            .get_all("x-visited")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(visited, vec!["inner", "outer"]);
    }

    #[tokio::test]
    async fn test_fn_middleware_short_circuit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler = handler_fn(move |_req| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(Response::empty(StatusCode::OK)) }
        });

        let deny = FnMiddleware::new("deny", |_request, _next| {
            Box::pin(async { Ok(Response::empty(StatusCode::FORBIDDEN)) })
        });

        let response = Next::new(&deny, Next::handler(&handler))
            .run(request())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        let handler = handler_fn(|_req| async { Err(KeystoneError::internal("boom")) });
        let outer = HeaderMiddleware { name: "outer" };

        let err = Next::new(&outer, Next::handler(&handler))
            .run(request())
            .await
            .unwrap_err();
        assert!(matches!(err, KeystoneError::Internal { .. }));
    }

    #[test]
    fn test_debug_names_middleware() {
        let outer = HeaderMiddleware { name: "outer" };
        let handler = handler_fn(|_req| async { Ok(Response::empty(StatusCode::OK)) });
        let next = Next::new(&outer, Next::handler(&handler));
        assert!(format!("{next:?}").contains("outer"));
    }
}
