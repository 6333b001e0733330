//! Route callbacks and their resolution.
//!
//! A route declares *what* should handle it as a [`Callback`]: a closure, a
//! `"Class"` / `"Class:method"` string, an already-built [`Controller`], or a
//! controller/method pair. The [`CallbackResolver`] turns that declaration
//! into a [`ResolvedCallback`] at dispatch time, looking controllers up in the
//! [`Container`] first and in its own constructor registry second, and
//! injecting the container into controllers that ask for it through
//! [`ContainerAware`].
//!
//! Whatever a callback returns is normalized through [`HandlerOutput`]:
//!
//! | Output | Response |
//! |---|---|
//! | `HandlerOutput::Response(r)` | `r`, untouched |
//! | `HandlerOutput::Text(s)` | `200 OK`, `text/html; charset=utf-8`, body `s` |
//! | `HandlerOutput::Empty` | `200 OK`, empty body |

use crate::container::Container;
use crate::error::{KeystoneError, KeystoneResult};
use crate::params::Params;
use crate::types::{Request, Response, ResponseExt};
use http::StatusCode;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Future returned by closure callbacks.
pub type HandlerFuture = BoxFuture<'static, KeystoneResult<HandlerOutput>>;

/// A closure callback: receives the request and the extracted route params.
pub type ClosureHandler = Arc<dyn Fn(Request, Params) -> HandlerFuture + Send + Sync>;

type ControllerConstructor = Arc<dyn Fn() -> Arc<dyn Controller> + Send + Sync>;

/// What a callback produced, before normalization into a [`Response`].
#[derive(Debug)]
pub enum HandlerOutput {
    /// A complete response, passed through unchanged.
    Response(Response),
    /// A body string, wrapped into a `200 text/html` response.
    Text(String),
    /// Nothing, wrapped into an empty `200` response.
    Empty,
}

impl HandlerOutput {
    /// Normalizes the output into a response.
    #[must_use]
    pub fn into_response(self) -> Response {
        match self {
            Self::Response(response) => response,
            Self::Text(body) => Response::html(StatusCode::OK, body),
            Self::Empty => Response::empty(StatusCode::OK),
        }
    }
}

impl From<Response> for HandlerOutput {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<String> for HandlerOutput {
    fn from(body: String) -> Self {
        Self::Text(body)
    }
}

impl From<&str> for HandlerOutput {
    fn from(body: &str) -> Self {
        Self::Text(body.to_string())
    }
}

impl From<()> for HandlerOutput {
    fn from((): ()) -> Self {
        Self::Empty
    }
}

impl<T: Into<HandlerOutput>> From<Option<T>> for HandlerOutput {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

/// Capability for controllers that want the dependency container.
///
/// The resolver calls [`ContainerAware::set_container`] right before
/// invoking a controller that exposes this capability through
/// [`Controller::as_container_aware`].
pub trait ContainerAware: Send + Sync {
    /// Receives the process-wide container.
    fn set_container(&self, container: Arc<Container>);
}

/// An object that can handle requests routed to it.
///
/// `action` is the method part of a `"Class:method"` callback, or `None` when
/// the controller itself is the callback (an invokable object).
///
/// # Example
///
/// ```rust
/// use keystone_core::{
///     BoxFuture, Controller, HandlerOutput, KeystoneError, KeystoneResult, Params, Request,
/// };
///
/// struct Blog;
///
/// impl Controller for Blog {
///     fn call<'a>(
///         &'a self,
///         action: Option<&'a str>,
///         _request: Request,
///         params: Params,
///     ) -> BoxFuture<'a, KeystoneResult<HandlerOutput>> {
///         Box::pin(async move {
///             match action {
///                 Some("show") => Ok(format!("post {}", params.get("id").unwrap_or("?")).into()),
///                 other => Err(KeystoneError::not_found_resource(
///                     "action",
///                     other.unwrap_or("__invoke"),
///                 )),
///             }
///         })
///     }
/// }
/// ```
pub trait Controller: Send + Sync + 'static {
    /// Handles a request.
    fn call<'a>(
        &'a self,
        action: Option<&'a str>,
        request: Request,
        params: Params,
    ) -> BoxFuture<'a, KeystoneResult<HandlerOutput>>;

    /// Returns the container-aware capability, if this controller has one.
    fn as_container_aware(&self) -> Option<&dyn ContainerAware> {
        None
    }
}

/// A declared route handler, opaque until resolved.
#[derive(Clone)]
pub enum Callback {
    /// A closure invoked directly with `(request, params)`.
    Closure(ClosureHandler),
    /// A `"Class"` or `"Class:method"` reference.
    Named(String),
    /// An already-built controller, with an optional method.
    Instance {
        /// The controller.
        controller: Arc<dyn Controller>,
        /// The method to call, `None` for an invokable object.
        action: Option<String>,
    },
    /// A `(class, method)` pair.
    ClassAction {
        /// Controller name.
        class: String,
        /// Method name.
        action: String,
    },
}

impl Callback {
    /// Creates a closure callback.
    ///
    /// # Example
    ///
    /// ```rust
    /// use keystone_core::Callback;
    ///
    /// let callback = Callback::closure(|_req, params| async move {
    ///     Ok(format!("hello {}", params.get("name").unwrap_or("world")))
    /// });
    /// assert!(callback.validate().is_ok());
    /// ```
    pub fn closure<F, Fut, O>(f: F) -> Self
    where
        F: Fn(Request, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = KeystoneResult<O>> + Send + 'static,
        O: Into<HandlerOutput>,
    {
        let handler: ClosureHandler = Arc::new(move |request: Request, params: Params| {
            let fut = f(request, params);
            Box::pin(async move { fut.await.map(Into::into) }) as HandlerFuture
        });
        Self::Closure(handler)
    }

    /// Creates a `"Class"` or `"Class:method"` callback.
    pub fn named(reference: impl Into<String>) -> Self {
        Self::Named(reference.into())
    }

    /// Uses an invokable controller instance as the callback.
    pub fn instance(controller: Arc<dyn Controller>) -> Self {
        Self::Instance {
            controller,
            action: None,
        }
    }

    /// Uses a method of a controller instance as the callback.
    pub fn method(controller: Arc<dyn Controller>, action: impl Into<String>) -> Self {
        Self::Instance {
            controller,
            action: Some(action.into()),
        }
    }

    /// Uses a method of a named controller as the callback.
    pub fn class_method(class: impl Into<String>, action: impl Into<String>) -> Self {
        Self::ClassAction {
            class: class.into(),
            action: action.into(),
        }
    }

    /// Checks that the callback is well formed.
    ///
    /// Route tables call this at registration so malformed strings fail
    /// during bootstrap rather than per request.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoneError::MalformedCallback`] for strings with more than
    /// one `:` or with an empty class or method part.
    pub fn validate(&self) -> KeystoneResult<()> {
        match self {
            Self::Named(reference) => parse_reference(reference).map(|_| ()),
            Self::ClassAction { class, action } if class.is_empty() || action.is_empty() => Err(
                KeystoneError::malformed_callback(format!("{class}:{action}"), "empty segment"),
            ),
            _ => Ok(()),
        }
    }
}

impl From<&str> for Callback {
    fn from(reference: &str) -> Self {
        Self::named(reference)
    }
}

impl From<String> for Callback {
    fn from(reference: String) -> Self {
        Self::Named(reference)
    }
}

impl From<Arc<dyn Controller>> for Callback {
    fn from(controller: Arc<dyn Controller>) -> Self {
        Self::instance(controller)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closure(_) => f.write_str("Callback::Closure"),
            Self::Named(reference) => f.debug_tuple("Callback::Named").field(reference).finish(),
            Self::Instance { action, .. } => f
                .debug_struct("Callback::Instance")
                .field("action", action)
                .finish_non_exhaustive(),
            Self::ClassAction { class, action } => f
                .debug_struct("Callback::ClassAction")
                .field("class", class)
                .field("action", action)
                .finish(),
        }
    }
}

/// Splits `"Class"` / `"Class:method"` into its parts.
fn parse_reference(reference: &str) -> KeystoneResult<(&str, Option<&str>)> {
    let mut parts = reference.split(':');
    let class = parts.next().unwrap_or_default();
    let action = parts.next();

    if parts.next().is_some() {
        return Err(KeystoneError::malformed_callback(
            reference,
            "expected 'Class' or 'Class:method'",
        ));
    }
    if class.is_empty() || action.is_some_and(str::is_empty) {
        return Err(KeystoneError::malformed_callback(reference, "empty segment"));
    }

    Ok((class, action))
}

/// A callback ready to be invoked.
pub enum ResolvedCallback {
    /// A closure.
    Closure(ClosureHandler),
    /// A controller and the method to call on it.
    Controller {
        /// The controller instance.
        controller: Arc<dyn Controller>,
        /// The method, `None` for an invokable object.
        action: Option<String>,
    },
}

impl ResolvedCallback {
    /// Invokes the callback and normalizes its output into a response.
    pub fn invoke(
        self,
        request: Request,
        params: Params,
    ) -> BoxFuture<'static, KeystoneResult<Response>> {
        match self {
            Self::Closure(handler) => Box::pin(async move {
                handler(request, params)
                    .await
                    .map(HandlerOutput::into_response)
            }),
            Self::Controller { controller, action } => Box::pin(async move {
                controller
                    .call(action.as_deref(), request, params)
                    .await
                    .map(HandlerOutput::into_response)
            }),
        }
    }
}

impl fmt::Debug for ResolvedCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closure(_) => f.write_str("ResolvedCallback::Closure"),
            Self::Controller { action, .. } => f
                .debug_struct("ResolvedCallback::Controller")
                .field("action", action)
                .finish_non_exhaustive(),
        }
    }
}

/// Turns declared [`Callback`]s into invocable units.
///
/// Named controllers are looked up in the container first; if the container
/// has no entry the resolver builds a fresh instance from a constructor
/// registered with [`CallbackResolver::register_controller`].
///
/// # Example
///
/// ```rust
/// use keystone_core::{Callback, CallbackResolver, Container};
/// use std::sync::Arc;
///
/// let resolver = CallbackResolver::new(Arc::new(Container::new()));
/// let err = resolver.resolve(&Callback::named("Missing:index")).unwrap_err();
/// assert!(err.to_string().contains("Missing"));
/// ```
pub struct CallbackResolver {
    container: Arc<Container>,
    constructors: HashMap<String, ControllerConstructor>,
}

impl CallbackResolver {
    /// Creates a resolver backed by `container`.
    #[must_use]
    pub fn new(container: Arc<Container>) -> Self {
        Self {
            container,
            constructors: HashMap::new(),
        }
    }

    /// Returns the container used for lookups and injection.
    #[must_use]
    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Registers a constructor used when `name` is not in the container.
    pub fn register_controller<C, F>(&mut self, name: impl Into<String>, constructor: F)
    where
        C: Controller,
        F: Fn() -> C + Send + Sync + 'static,
    {
        let constructor: ControllerConstructor =
            Arc::new(move || Arc::new(constructor()) as Arc<dyn Controller>);
        self.constructors.insert(name.into(), constructor);
    }

    /// Returns `true` if a constructor is registered for `name`.
    #[must_use]
    pub fn has_controller(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Resolves a callback into an invocable unit.
    ///
    /// # Errors
    ///
    /// - [`KeystoneError::MalformedCallback`] for malformed strings
    /// - [`KeystoneError::NotFound`] if a named controller is neither in the
    ///   container nor registered
    /// - [`KeystoneError::Container`] if the container entry is not a controller
    pub fn resolve(&self, callback: &Callback) -> KeystoneResult<ResolvedCallback> {
        let (controller, action) = match callback {
            Callback::Closure(handler) => return Ok(ResolvedCallback::Closure(Arc::clone(handler))),
            Callback::Named(reference) => {
                let (class, action) = parse_reference(reference)?;
                (self.lookup(class)?, action.map(ToString::to_string))
            }
            Callback::ClassAction { class, action } => {
                callback.validate()?;
                (self.lookup(class)?, Some(action.clone()))
            }
            Callback::Instance { controller, action } => (Arc::clone(controller), action.clone()),
        };

        if let Some(aware) = controller.as_container_aware() {
            aware.set_container(Arc::clone(&self.container));
        }

        Ok(ResolvedCallback::Controller { controller, action })
    }

    fn lookup(&self, class: &str) -> KeystoneResult<Arc<dyn Controller>> {
        if let Some(controller) = self.container.controller(class)? {
            tracing::trace!(controller = class, "Controller resolved from container");
            return Ok(controller);
        }

        let constructor = self
            .constructors
            .get(class)
            .ok_or_else(|| KeystoneError::not_found_resource("controller", class))?;
        tracing::trace!(controller = class, "Controller instantiated");
        Ok(constructor())
    }
}

impl fmt::Debug for CallbackResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackResolver")
            .field("container", &self.container)
            .field("controllers", &self.constructors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};
    use parking_lot::Mutex;

    fn request() -> Request {
        http::Request::builder()
            .uri("/test")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    async fn body_of(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    struct Greeter;

    impl Controller for Greeter {
        fn call<'a>(
            &'a self,
            action: Option<&'a str>,
            _request: Request,
            params: Params,
        ) -> BoxFuture<'a, KeystoneResult<HandlerOutput>> {
            Box::pin(async move {
                match action {
                    None => Ok("invoked".into()),
                    Some("hello") => {
                        Ok(format!("hello {}", params.get("name").unwrap_or("?")).into())
                    }
                    Some("nothing") => Ok(HandlerOutput::Empty),
                    Some(other) => Err(KeystoneError::not_found_resource("action", other)),
                }
            })
        }
    }

    #[derive(Default)]
    struct AwareController {
        container: Mutex<Option<Arc<Container>>>,
    }

    impl ContainerAware for AwareController {
        fn set_container(&self, container: Arc<Container>) {
            *self.container.lock() = Some(container);
        }
    }

    impl Controller for AwareController {
        fn call<'a>(
            &'a self,
            _action: Option<&'a str>,
            _request: Request,
            _params: Params,
        ) -> BoxFuture<'a, KeystoneResult<HandlerOutput>> {
            Box::pin(async move {
                let container = self
                    .container
                    .lock()
                    .clone()
                    .ok_or_else(|| KeystoneError::internal("container was not injected"))?;
                let greeting: Arc<String> = container.get_as("greeting")?;
                Ok(greeting.as_str().into())
            })
        }

        fn as_container_aware(&self) -> Option<&dyn ContainerAware> {
            Some(self)
        }
    }

    #[test]
    fn test_parse_reference() {
        assert_eq!(parse_reference("Blog").unwrap(), ("Blog", None));
        assert_eq!(parse_reference("Blog:show").unwrap(), ("Blog", Some("show")));
    }

    #[test]
    fn test_parse_reference_rejects_extra_colons() {
        let err = parse_reference("Blog:show:extra").unwrap_err();
        assert!(matches!(err, KeystoneError::MalformedCallback { .. }));
    }

    #[test]
    fn test_parse_reference_rejects_empty_segments() {
        assert!(parse_reference("").is_err());
        assert!(parse_reference(":show").is_err());
        assert!(parse_reference("Blog:").is_err());
    }

    #[test]
    fn test_handler_output_normalization() {
        let text = HandlerOutput::from("hi").into_response();
        assert_eq!(text.status(), StatusCode::OK);
        assert_eq!(
            text.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );

        let empty = HandlerOutput::from(()).into_response();
        assert_eq!(empty.status(), StatusCode::OK);

        let passthrough =
            HandlerOutput::from(Response::empty(StatusCode::ACCEPTED)).into_response();
        assert_eq!(passthrough.status(), StatusCode::ACCEPTED);

        let none: Option<String> = None;
        assert!(matches!(HandlerOutput::from(none), HandlerOutput::Empty));
    }

    #[tokio::test]
    async fn test_closure_callback() {
        let resolver = CallbackResolver::new(Arc::new(Container::new()));
        let callback = Callback::closure(|_req, params| async move {
            Ok(format!("id={}", params.get("id").unwrap_or("-")))
        });

        let mut params = Params::new();
        params.push("id", "7");

        let response = resolver
            .resolve(&callback)
            .unwrap()
            .invoke(request(), params)
            .await
            .unwrap();
        assert_eq!(body_of(response).await, "id=7");
    }

    #[tokio::test]
    async fn test_named_callback_uses_registered_constructor() {
        let mut resolver = CallbackResolver::new(Arc::new(Container::new()));
        resolver.register_controller("Greeter", || Greeter);

        let mut params = Params::new();
        params.push("name", "ada");

        let response = resolver
            .resolve(&Callback::named("Greeter:hello"))
            .unwrap()
            .invoke(request(), params)
            .await
            .unwrap();
        assert_eq!(body_of(response).await, "hello ada");

        let response = resolver
            .resolve(&Callback::named("Greeter"))
            .unwrap()
            .invoke(request(), Params::new())
            .await
            .unwrap();
        assert_eq!(body_of(response).await, "invoked");
    }

    #[tokio::test]
    async fn test_container_entry_wins_over_constructor() {
        let container = Arc::new(Container::new());
        container.set("greeting", Arc::new("from container".to_string()));
        container.set_controller("Home", Arc::new(AwareController::default()));

        let mut resolver = CallbackResolver::new(Arc::clone(&container));
        resolver.register_controller("Home", || Greeter);

        let response = resolver
            .resolve(&Callback::named("Home"))
            .unwrap()
            .invoke(request(), Params::new())
            .await
            .unwrap();
        assert_eq!(body_of(response).await, "from container");
    }

    #[tokio::test]
    async fn test_container_is_injected_into_aware_instance() {
        let container = Arc::new(Container::new());
        container.set("greeting", Arc::new("injected".to_string()));
        let resolver = CallbackResolver::new(container);

        let controller: Arc<dyn Controller> = Arc::new(AwareController::default());
        let response = resolver
            .resolve(&Callback::instance(controller))
            .unwrap()
            .invoke(request(), Params::new())
            .await
            .unwrap();
        assert_eq!(body_of(response).await, "injected");
    }

    #[tokio::test]
    async fn test_class_action_pair() {
        let mut resolver = CallbackResolver::new(Arc::new(Container::new()));
        resolver.register_controller("Greeter", || Greeter);

        let response = resolver
            .resolve(&Callback::class_method("Greeter", "nothing"))
            .unwrap()
            .invoke(request(), Params::new())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_of(response).await.is_empty());
    }

    #[test]
    fn test_unknown_controller_is_not_found() {
        let resolver = CallbackResolver::new(Arc::new(Container::new()));
        let err = resolver.resolve(&Callback::named("Nope:index")).unwrap_err();
        assert!(matches!(err, KeystoneError::NotFound { .. }));
    }

    #[test]
    fn test_container_entry_of_wrong_type() {
        let container = Arc::new(Container::new());
        container.set("Blog", Arc::new(42_u32));
        let resolver = CallbackResolver::new(container);

        let err = resolver.resolve(&Callback::named("Blog")).unwrap_err();
        assert!(matches!(err, KeystoneError::Container { .. }));
    }
}
