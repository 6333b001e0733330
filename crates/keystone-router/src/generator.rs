//! Reverse routing: route name + params to path or absolute URL.

use crate::table::RouteTable;
use http::Uri;
use keystone_core::{KeystoneError, KeystoneResult, Params};
use std::sync::Arc;

/// Builds paths and URLs for named routes.
///
/// Each `{key}` in the route pattern is replaced by the string value of the
/// matching param. Placeholders without a param stay as literal text, and
/// params without a placeholder are ignored. Values are not checked against
/// the route's constraints.
///
/// # Example
///
/// ```rust
/// use keystone_core::Params;
/// use keystone_router::{Route, RouteTable, UriGenerator};
/// use std::sync::Arc;
///
/// let mut table = RouteTable::new();
/// table
///     .add_route(Route::builder("/items/{id}", "Items:show").name("item"))
///     .unwrap();
///
/// let generator = UriGenerator::new(Arc::new(table))
///     .with_base_url("https://shop.example.com:8443")
///     .unwrap();
/// let params = Params::new().with("id", 7);
///
/// assert_eq!(generator.generate("item", &params).unwrap(), "/items/7");
/// assert_eq!(
///     generator.generate_url("item", &params).unwrap(),
///     "https://shop.example.com:8443/items/7"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct UriGenerator {
    table: Arc<RouteTable>,
    base_url: Option<String>,
}

impl UriGenerator {
    /// Creates a generator producing relative paths.
    #[must_use]
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self {
            table,
            base_url: None,
        }
    }

    /// Sets the scheme and host used by [`UriGenerator::generate_url`].
    ///
    /// # Errors
    ///
    /// Returns [`KeystoneError::InvalidRoute`] if `base_url` lacks a scheme or
    /// host, or carries a path other than `/`.
    pub fn with_base_url(mut self, base_url: &str) -> KeystoneResult<Self> {
        let invalid = |reason: &str| KeystoneError::invalid_route(base_url, reason);

        let uri: Uri = base_url.parse().map_err(|_| invalid("unparseable base URL"))?;
        let scheme = uri.scheme_str().ok_or_else(|| invalid("base URL needs a scheme"))?;
        let authority = uri
            .authority()
            .ok_or_else(|| invalid("base URL needs a host"))?;
        if !matches!(uri.path(), "" | "/") || uri.query().is_some() {
            return Err(invalid("base URL must not carry a path or query"));
        }

        self.base_url = Some(format!("{scheme}://{authority}"));
        Ok(self)
    }

    /// Returns the configured `scheme://host[:port]`, if any.
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Builds the path for the named route.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoneError::NotFound`] if no route has this name.
    pub fn generate(&self, name: &str, params: &Params) -> KeystoneResult<String> {
        let route = self
            .table
            .get(name)
            .ok_or_else(|| KeystoneError::not_found_resource("route", name))?;
        Ok(substitute(route.pattern(), params))
    }

    /// Builds the absolute URL for the named route, or the path when no base
    /// URL is configured.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoneError::NotFound`] if no route has this name.
    pub fn generate_url(&self, name: &str, params: &Params) -> KeystoneResult<String> {
        let path = self.generate(name, params)?;
        Ok(match &self.base_url {
            Some(base) if path.starts_with('/') => format!("{base}{path}"),
            Some(base) => format!("{base}/{path}"),
            None => path,
        })
    }
}

/// Single left-to-right pass so substituted values are never rescanned.
fn substitute(pattern: &str, params: &Params) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let Some(close) = tail.find('}') else {
            out.push_str(tail);
            return out;
        };

        match params.get(&tail[1..close]) {
            Some(value) => out.push_str(value),
            None => out.push_str(&tail[..=close]),
        }
        rest = &tail[close + 1..];
    }

    out.push_str(rest);
    out
}
