//! Request-to-route resolution.

use crate::route::Route;
use crate::table::RouteTable;
use http::Method;
use keystone_core::{KeystoneError, KeystoneResult, Params};
use std::sync::Arc;

/// Result of a successful match.
///
/// Params are returned alongside the route and never stored on it, so a
/// route shared by concurrent requests is never written to.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    /// The matched route.
    pub route: &'a Route,
    /// Values captured from the route's placeholders.
    pub params: Params,
}

impl<'a> RouteMatch<'a> {
    /// Returns the matched route's name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.route.name()
    }
}

/// Resolves `(path, method)` pairs against a [`RouteTable`].
///
/// Routes are tried in registration order and the first one whose method set
/// and pattern both accept the request wins.
///
/// # Example
///
/// ```rust
/// use http::Method;
/// use keystone_router::{Route, RouteMatcher, RouteTable};
/// use std::sync::Arc;
///
/// let mut table = RouteTable::new();
/// table
///     .add_route(
///         Route::builder("/users/{id}", "Users:show")
///             .name("user")
///             .constraint("id", r"\d+"),
///     )
///     .unwrap();
///
/// let matcher = RouteMatcher::new(Arc::new(table));
/// let found = matcher.match_route("/users/42", &Method::GET).unwrap();
/// assert_eq!(found.name(), "user");
/// assert_eq!(found.params.get("id"), Some("42"));
///
/// assert!(matcher.match_route("/users/abc", &Method::GET).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    table: Arc<RouteTable>,
}

impl RouteMatcher {
    /// Creates a matcher over a shared table.
    #[must_use]
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self { table }
    }

    /// Returns the underlying table.
    #[must_use]
    pub fn table(&self) -> &Arc<RouteTable> {
        &self.table
    }

    /// Finds the first route accepting `path` and `method`.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoneError::NotFound`] if no route accepts the request.
    pub fn match_route(&self, path: &str, method: &Method) -> KeystoneResult<RouteMatch<'_>> {
        tracing::debug!(http.method = %method, http.path = path, "Matching route");

        for route in self.table.iter() {
            if !route.allows(method) {
                continue;
            }
            if let Some(params) = route.match_path(path) {
                tracing::debug!(
                    http.method = %method,
                    http.path = path,
                    route = route.name(),
                    params = %params,
                    "Route matched"
                );
                return Ok(RouteMatch { route, params });
            }
        }

        tracing::debug!(
            http.method = %method,
            http.path = path,
            allowed = ?self.allowed_methods(path),
            "No route matched"
        );
        Err(KeystoneError::route_not_found(method.as_str(), path))
    }

    /// Alias of [`RouteMatcher::match_route`].
    pub fn find(&self, path: &str, method: &Method) -> KeystoneResult<RouteMatch<'_>> {
        self.match_route(path, method)
    }

    /// Lists the methods of routes whose pattern accepts `path`.
    ///
    /// An empty list means either that no pattern accepts the path or that
    /// the only accepting routes are method wildcards.
    #[must_use]
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let mut methods: Vec<Method> = Vec::new();
        for route in self.table.iter().filter(|r| r.match_path(path).is_some()) {
            for method in route.methods() {
                if !methods.contains(method) {
                    methods.push(method.clone());
                }
            }
        }
        methods
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(build: impl FnOnce(&mut RouteTable)) -> RouteMatcher {
        let mut table = RouteTable::new();
        build(&mut table);
        RouteMatcher::new(Arc::new(table))
    }

    #[test]
    fn test_first_registered_wins() {
        let matcher = matcher(|t| {
            t.add_route(Route::builder("/users/{id}", "A").name("digits").constraint("id", r"\d+"))
                .unwrap();
            t.add_route(Route::builder("/users/{id}", "B").name("word").constraint("id", r"\w+"))
                .unwrap();
        });

        assert_eq!(matcher.match_route("/users/42", &Method::GET).unwrap().name(), "digits");
        assert_eq!(matcher.match_route("/users/bob", &Method::GET).unwrap().name(), "word");
    }

    #[test]
    fn test_method_filter_skips_to_next_route() {
        let matcher = matcher(|t| {
            t.add_route(Route::builder("/form", "Show").name("show").method("GET")).unwrap();
            t.add_route(Route::builder("/form", "Submit").name("submit").method("POST")).unwrap();
        });

        assert_eq!(matcher.match_route("/form", &Method::GET).unwrap().name(), "show");
        assert_eq!(matcher.match_route("/form", &Method::POST).unwrap().name(), "submit");

        let err = matcher.match_route("/form", &Method::DELETE).unwrap_err();
        assert!(matches!(err, KeystoneError::NotFound { .. }));
    }

    #[test]
    fn test_empty_method_set_matches_every_verb() {
        let matcher = matcher(|t| {
            t.add_any("/ping", "Ping").unwrap();
        });

        for method in [Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::HEAD] {
            assert!(matcher.match_route("/ping", &method).is_ok(), "{method} should match");
        }
    }

    #[test]
    fn test_unmatched_path_is_not_found() {
        let matcher = matcher(|t| {
            t.add_get("/", "Home").unwrap();
        });

        let err = matcher.find("/missing", &Method::GET).unwrap_err();
        assert!(matches!(err, KeystoneError::NotFound { .. }));
        assert!(err.to_string().contains("/missing"));
    }

    #[test]
    fn test_params_are_per_match() {
        let matcher = matcher(|t| {
            t.add_get("/items/{id}", "Items").unwrap();
        });

        let a = matcher.match_route("/items/1", &Method::GET).unwrap();
        let b = matcher.match_route("/items/2", &Method::GET).unwrap();
        assert_eq!(a.params.get("id"), Some("1"));
        assert_eq!(b.params.get("id"), Some("2"));
        assert!(std::ptr::eq(a.route, b.route));
    }

    #[test]
    fn test_allowed_methods() {
        let matcher = matcher(|t| {
            t.add_get("/things/{id}", "Show").unwrap();
            t.add(["PUT", "GET"], "/things/{id}", "Update").unwrap();
            t.add_post("/other", "Other").unwrap();
        });

        assert_eq!(matcher.allowed_methods("/things/3"), vec![Method::GET, Method::PUT]);
        assert!(matcher.allowed_methods("/nowhere").is_empty());
    }
}
