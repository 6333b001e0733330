//! Ordered, regex-backed router for Keystone.
//!
//! Routes are kept in registration order and matched linearly: the first
//! route whose method set and pattern accept the request wins. Patterns use
//! `{name}` placeholders, each optionally constrained by a regex fragment.
//!
//! # Features
//!
//! - **Ordered precedence**: registration order decides between overlapping routes
//! - **Constraints**: `{id}` restricted to `\d+`, `{format}` to `json|xml`, ...
//! - **Method wildcard**: routes without methods accept every verb
//! - **Reverse routing**: [`UriGenerator`] builds paths and absolute URLs by name
//!
//! # Example
//!
//! ```rust
//! use http::Method;
//! use keystone_core::Params;
//! use keystone_router::{Route, RouteMatcher, RouteTable, UriGenerator};
//! use std::sync::Arc;
//!
//! let mut table = RouteTable::new();
//! table
//!     .add_route(
//!         Route::builder("/items/{id}", "Items:show")
//!             .name("item")
//!             .method("GET")
//!             .constraint("id", r"\d+"),
//!     )
//!     .unwrap();
//! let table = Arc::new(table);
//!
//! let path = UriGenerator::new(Arc::clone(&table))
//!     .generate("item", &Params::new().with("id", 7))
//!     .unwrap();
//! assert_eq!(path, "/items/7");
//!
//! let matcher = RouteMatcher::new(table);
//! let found = matcher.match_route(&path, &Method::GET).unwrap();
//! assert_eq!(found.name(), "item");
//! assert_eq!(found.params.get("id"), Some("7"));
//! ```

mod generator;
mod matcher;
mod route;
mod table;

pub use generator::UriGenerator;
pub use keystone_core::Params;
pub use matcher::{RouteMatch, RouteMatcher};
pub use route::{Route, RouteBuilder, DEFAULT_CONSTRAINT};
pub use table::{DuplicateRoutePolicy, RouteTable};
