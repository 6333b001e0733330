//! Ordered route registration.

use crate::route::{Route, RouteBuilder};
use indexmap::IndexMap;
use keystone_core::{Callback, KeystoneError, KeystoneResult};
use serde::{Deserialize, Serialize};

/// What to do when a route is added under a name that already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateRoutePolicy {
    /// Replace the existing route, keeping its position in match order.
    #[default]
    Overwrite,
    /// Fail registration with [`KeystoneError::InvalidRoute`].
    Reject,
}

/// Routes in registration order.
///
/// Registration order is match precedence: the matcher returns the first
/// route whose method set and pattern accept the request, so specific
/// routes must be added before general ones. The table is built during
/// bootstrap and then shared read-only.
///
/// # Example
///
/// ```rust
/// use keystone_router::RouteTable;
///
/// let mut table = RouteTable::new();
/// table.add_get("/", "Home").unwrap();
/// table.add(["GET", "POST"], "/contact", "Contact:form").unwrap();
///
/// let names: Vec<_> = table.iter().map(|r| r.name()).collect();
/// assert_eq!(names, vec!["route_0", "route_1"]);
/// ```
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: IndexMap<String, Route>,
    counter: usize,
    policy: DuplicateRoutePolicy,
}

impl RouteTable {
    /// Creates an empty table with the default [`DuplicateRoutePolicy`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty table with the given duplicate-name policy.
    #[must_use]
    pub fn with_policy(policy: DuplicateRoutePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Returns the duplicate-name policy.
    #[must_use]
    pub fn policy(&self) -> DuplicateRoutePolicy {
        self.policy
    }

    /// Changes the duplicate-name policy for routes added from now on.
    pub fn set_policy(&mut self, policy: DuplicateRoutePolicy) -> &mut Self {
        self.policy = policy;
        self
    }

    /// Adds an unnamed route. An empty method list accepts any method.
    pub fn add<I, S>(
        &mut self,
        methods: I,
        pattern: impl Into<String>,
        callback: impl Into<Callback>,
    ) -> KeystoneResult<&Route>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_route(Route::builder(pattern, callback).methods(methods))
    }

    /// Adds a route built with [`Route::builder`].
    ///
    /// # Errors
    ///
    /// - [`KeystoneError::InvalidRoute`] for bad patterns, constraints or
    ///   callbacks, and for duplicate names under [`DuplicateRoutePolicy::Reject`]
    /// - [`KeystoneError::InvalidMethod`] for invalid method tokens
    pub fn add_route(&mut self, builder: RouteBuilder) -> KeystoneResult<&Route> {
        let counter = self.counter;
        let route = builder.build(|| format!("route_{counter}"))?;

        let name = route.name().to_string();
        if self.policy == DuplicateRoutePolicy::Reject && self.routes.contains_key(&name) {
            return Err(KeystoneError::invalid_route(name, "duplicate route name"));
        }
        self.counter += 1;

        tracing::debug!(
            route = %name,
            pattern = route.pattern(),
            methods = ?route.methods(),
            "Route registered"
        );

        let (index, replaced) = self.routes.insert_full(name, route);
        if replaced.is_some() {
            tracing::warn!(
                route = %self.routes[index].name(),
                "Route name reused, previous route replaced"
            );
        }
        Ok(&self.routes[index])
    }

    /// Adds an unnamed `GET` route.
    pub fn add_get(
        &mut self,
        pattern: impl Into<String>,
        callback: impl Into<Callback>,
    ) -> KeystoneResult<&Route> {
        self.add(["GET"], pattern, callback)
    }

    /// Adds an unnamed `POST` route.
    pub fn add_post(
        &mut self,
        pattern: impl Into<String>,
        callback: impl Into<Callback>,
    ) -> KeystoneResult<&Route> {
        self.add(["POST"], pattern, callback)
    }

    /// Adds an unnamed `PUT` route.
    pub fn add_put(
        &mut self,
        pattern: impl Into<String>,
        callback: impl Into<Callback>,
    ) -> KeystoneResult<&Route> {
        self.add(["PUT"], pattern, callback)
    }

    /// Adds an unnamed `PATCH` route.
    pub fn add_patch(
        &mut self,
        pattern: impl Into<String>,
        callback: impl Into<Callback>,
    ) -> KeystoneResult<&Route> {
        self.add(["PATCH"], pattern, callback)
    }

    /// Adds an unnamed `DELETE` route.
    pub fn add_delete(
        &mut self,
        pattern: impl Into<String>,
        callback: impl Into<Callback>,
    ) -> KeystoneResult<&Route> {
        self.add(["DELETE"], pattern, callback)
    }

    /// Adds an unnamed route that accepts any method.
    pub fn add_any(
        &mut self,
        pattern: impl Into<String>,
        callback: impl Into<Callback>,
    ) -> KeystoneResult<&Route> {
        self.add(std::iter::empty::<&str>(), pattern, callback)
    }

    /// Returns the route registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Route> {
        self.routes.get(name)
    }

    /// Returns `true` if a route is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    /// Iterates over routes in match order.
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    /// Returns the number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<'a> IntoIterator for &'a RouteTable {
    type Item = &'a Route;
    type IntoIter = indexmap::map::Values<'a, String, Route>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.values()
    }
}
