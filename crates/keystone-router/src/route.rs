//! Route definitions and pattern compilation.
//!
//! A pattern is literal text with `{name}` placeholders:
//!
//! ```text
//! /blog/{year}/{slug}
//! ```
//!
//! At registration every placeholder becomes a named capture group wrapping
//! its constraint (`[^/]+` when none is given), literal text is escaped, and
//! the whole expression is anchored. `/blog/{year}/{slug}` with `year => \d{4}`
//! compiles to:
//!
//! ```text
//! ^/blog/(?P<year>(?:\d{4}))/(?P<slug>(?:[^/]+))$
//! ```

use http::Method;
use indexmap::IndexMap;
use keystone_core::{Callback, KeystoneError, KeystoneResult, Params};
use regex::Regex;
use std::fmt;

/// Constraint applied to placeholders that have none.
pub const DEFAULT_CONSTRAINT: &str = "[^/]+";

/// A registered route. Immutable once built.
#[derive(Clone)]
pub struct Route {
    name: String,
    pattern: String,
    methods: Vec<Method>,
    callback: Callback,
    constraints: IndexMap<String, String>,
    placeholders: Vec<String>,
    regex: Regex,
}

impl Route {
    /// Starts building a route for `pattern` handled by `callback`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use keystone_core::Callback;
    /// use keystone_router::{Route, RouteTable};
    ///
    /// let mut table = RouteTable::new();
    /// table
    ///     .add_route(
    ///         Route::builder("/items/{id}", Callback::named("Items:show"))
    ///             .name("item_show")
    ///             .method("get")
    ///             .constraint("id", r"\d+"),
    ///     )
    ///     .unwrap();
    ///
    /// let route = table.get("item_show").unwrap();
    /// assert_eq!(route.methods(), &[http::Method::GET]);
    /// ```
    pub fn builder(pattern: impl Into<String>, callback: impl Into<Callback>) -> RouteBuilder {
        RouteBuilder {
            pattern: pattern.into(),
            callback: callback.into(),
            name: None,
            methods: Vec::new(),
            constraints: IndexMap::new(),
        }
    }

    /// Returns the route name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the path pattern as registered.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the allowed methods. Empty means any method.
    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Returns the handler reference.
    #[must_use]
    pub fn callback(&self) -> &Callback {
        &self.callback
    }

    /// Returns the constraint declared for a placeholder, if any.
    #[must_use]
    pub fn constraint(&self, placeholder: &str) -> Option<&str> {
        self.constraints.get(placeholder).map(String::as_str)
    }

    /// Returns the placeholder names in pattern order.
    #[must_use]
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Returns the compiled, anchored expression.
    #[must_use]
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Returns `true` if this route accepts `method`.
    #[must_use]
    pub fn allows(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }

    /// Matches `path` against this route, ignoring the method.
    ///
    /// A path equal to the raw pattern matches with no params; otherwise the
    /// compiled expression must match and each placeholder is captured.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<Params> {
        if path == self.pattern {
            return Some(Params::new());
        }

        let captures = self.regex.captures(path)?;
        Some(
            self.placeholders
                .iter()
                .filter_map(|name| captures.name(name).map(|m| (name.as_str(), m.as_str())))
                .collect(),
        )
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .field("methods", &self.methods)
            .field("constraints", &self.constraints)
            .field("callback", &self.callback)
            .finish()
    }
}

/// Builder for [`Route`]. Validation happens when the route table adds it.
#[derive(Debug)]
#[must_use]
pub struct RouteBuilder {
    pattern: String,
    callback: Callback,
    name: Option<String>,
    methods: Vec<String>,
    constraints: IndexMap<String, String>,
}

impl RouteBuilder {
    /// Sets the route name. Unnamed routes get `route_<n>`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds an allowed method. Case-insensitive.
    pub fn method(mut self, method: impl AsRef<str>) -> Self {
        self.methods.push(method.as_ref().to_string());
        self
    }

    /// Adds several allowed methods.
    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.methods
            .extend(methods.into_iter().map(|m| m.as_ref().to_string()));
        self
    }

    /// Restricts a placeholder to a regex fragment, e.g. `\d+`.
    pub fn constraint(mut self, placeholder: impl Into<String>, regex: impl Into<String>) -> Self {
        self.constraints.insert(placeholder.into(), regex.into());
        self
    }

    /// Validates and compiles the route under `fallback_name` if it has no
    /// name of its own.
    pub(crate) fn build(self, fallback_name: impl FnOnce() -> String) -> KeystoneResult<Route> {
        let name = self.name.unwrap_or_else(fallback_name);

        self.callback
            .validate()
            .map_err(|e| KeystoneError::invalid_route(&name, e.to_string()))?;

        let methods = normalize_methods(&self.methods)?;
        let (regex, placeholders) = compile_pattern(&name, &self.pattern, &self.constraints)?;

        Ok(Route {
            name,
            pattern: self.pattern,
            methods,
            callback: self.callback,
            constraints: self.constraints,
            placeholders,
            regex,
        })
    }
}

/// Uppercases method tokens, rejects invalid ones and drops duplicates.
fn normalize_methods(methods: &[String]) -> KeystoneResult<Vec<Method>> {
    let mut normalized: Vec<Method> = Vec::with_capacity(methods.len());
    for raw in methods {
        let upper = raw.trim().to_ascii_uppercase();
        if upper.is_empty() {
            return Err(KeystoneError::invalid_method(raw.as_str()));
        }
        let method = Method::from_bytes(upper.as_bytes())
            .map_err(|_| KeystoneError::invalid_method(raw.as_str()))?;
        if !normalized.contains(&method) {
            normalized.push(method);
        }
    }
    Ok(normalized)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Compiles `pattern` into an anchored regex plus its placeholder names.
pub(crate) fn compile_pattern(
    route: &str,
    pattern: &str,
    constraints: &IndexMap<String, String>,
) -> KeystoneResult<(Regex, Vec<String>)> {
    let mut expr = String::with_capacity(pattern.len() * 2 + 2);
    let mut placeholders: Vec<String> = Vec::new();
    expr.push('^');

    let mut rest = pattern;
    while let Some(open) = rest.find('{') {
        let (literal, tail) = rest.split_at(open);
        expr.push_str(&regex::escape(literal));

        let close = tail.find('}').ok_or_else(|| {
            KeystoneError::invalid_route(route, format!("unclosed '{{' in '{pattern}'"))
        })?;
        let name = &tail[1..close];

        if !is_identifier(name) {
            return Err(KeystoneError::invalid_route(
                route,
                format!("invalid placeholder name '{name}'"),
            ));
        }
        if placeholders.iter().any(|p| p == name) {
            return Err(KeystoneError::invalid_route(
                route,
                format!("placeholder '{name}' appears twice"),
            ));
        }

        let constraint = constraints.get(name).map_or(DEFAULT_CONSTRAINT, String::as_str);
        expr.push_str(&format!("(?P<{name}>(?:{constraint}))"));
        placeholders.push(name.to_string());
        rest = &tail[close + 1..];
    }
    if rest.contains('}') {
        return Err(KeystoneError::invalid_route(
            route,
            format!("unmatched '}}' in '{pattern}'"),
        ));
    }
    expr.push_str(&regex::escape(rest));
    expr.push('$');

    if let Some(unknown) = constraints.keys().find(|k| !placeholders.contains(k)) {
        return Err(KeystoneError::invalid_route(
            route,
            format!("constraint for unknown placeholder '{unknown}'"),
        ));
    }

    let regex = Regex::new(&expr)
        .map_err(|e| KeystoneError::invalid_route(route, format!("invalid constraint: {e}")))?;
    Ok((regex, placeholders))
}
