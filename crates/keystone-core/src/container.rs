//! Dependency container.
//!
//! This module provides the service container used by the callback resolver.
//! Services are registered under a string id at application startup, either as
//! ready instances or as factories that are built on first access and then
//! shared.
//!
//! # Example
//!
//! ```rust
//! use keystone_core::Container;
//! use std::sync::Arc;
//!
//! struct Database {
//!     dsn: String,
//! }
//!
//! let container = Container::new();
//! container.set("db", Arc::new(Database { dsn: "postgres://localhost/db".into() }));
//!
//! assert!(container.has("db"));
//! let db: Arc<Database> = container.get_as("db").unwrap();
//! assert_eq!(db.dsn, "postgres://localhost/db");
//! ```

use crate::callback::Controller;
use crate::error::{KeystoneError, KeystoneResult};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A type-erased shared service.
pub type Service = Arc<dyn Any + Send + Sync>;

/// A factory that builds a service, possibly pulling its own dependencies
/// from the container.
pub type ServiceFactory = Arc<dyn Fn(&Container) -> KeystoneResult<Service> + Send + Sync>;

/// A service container keyed by string id.
///
/// # Thread Safety
///
/// The container is `Send + Sync` and is shared across requests behind an
/// `Arc`. Registration normally happens during bootstrap; lookups take a read
/// lock and factories run without any lock held, so a factory may resolve
/// its own dependencies.
#[derive(Default)]
pub struct Container {
    services: RwLock<HashMap<String, Service>>,
    factories: RwLock<HashMap<String, ServiceFactory>>,
}

impl Container {
    /// Creates a new empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a ready service instance under `id`, replacing any previous
    /// instance or factory with the same id.
    pub fn set<T: Send + Sync + 'static>(&self, id: impl Into<String>, service: Arc<T>) {
        let id = id.into();
        self.factories.write().remove(&id);
        self.services.write().insert(id, service);
    }

    /// Registers a factory under `id`. The factory runs on first access and its
    /// result is shared by every later lookup.
    pub fn set_factory<T, F>(&self, id: impl Into<String>, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> KeystoneResult<Arc<T>> + Send + Sync + 'static,
    {
        let id = id.into();
        self.services.write().remove(&id);
        let factory: ServiceFactory =
            Arc::new(move |c: &Container| factory(c).map(|s| s as Service));
        self.factories.write().insert(id, factory);
    }

    /// Registers a controller instance under `id` so the callback resolver can
    /// find it by name.
    pub fn set_controller(&self, id: impl Into<String>, controller: Arc<dyn Controller>) {
        self.set(id, Arc::new(controller));
    }

    /// Returns `true` if an instance or a factory is registered under `id`.
    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.services.read().contains_key(id) || self.factories.read().contains_key(id)
    }

    /// Returns the service registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoneError::NotFound`] if nothing is registered under `id`,
    /// or the factory's error if building the service fails.
    pub fn get(&self, id: &str) -> KeystoneResult<Service> {
        if let Some(service) = self.services.read().get(id) {
            return Ok(Arc::clone(service));
        }

        let factory = self
            .factories
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| KeystoneError::not_found_resource("service", id))?;

        tracing::debug!(service = id, "Building service from factory");
        let built = factory(self)?;

        // Another request may have built it concurrently; keep the first.
        let mut services = self.services.write();
        Ok(Arc::clone(services.entry(id.to_string()).or_insert(built)))
    }

    /// Returns the service registered under `id`, downcast to `T`.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoneError::NotFound`] if `id` is unknown and
    /// [`KeystoneError::Container`] if the service has a different type.
    pub fn get_as<T: Send + Sync + 'static>(&self, id: &str) -> KeystoneResult<Arc<T>> {
        self.get(id)?.downcast::<T>().map_err(|_| {
            KeystoneError::container(
                id,
                format!("service is not a {}", std::any::type_name::<T>()),
            )
        })
    }

    /// Returns the controller registered under `id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoneError::Container`] if `id` holds something other than
    /// a controller, or a factory error.
    pub fn controller(&self, id: &str) -> KeystoneResult<Option<Arc<dyn Controller>>> {
        if !self.has(id) {
            return Ok(None);
        }
        let controller = self.get_as::<Arc<dyn Controller>>(id)?;
        Ok(Some(Arc::clone(&*controller)))
    }

    /// Returns the number of registered ids.
    #[must_use]
    pub fn len(&self) -> usize {
        let services = self.services.read();
        let factories = self.factories.read();
        services.len() + factories.keys().filter(|k| !services.contains_key(*k)).count()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("service_count", &self.len())
            .finish()
    }
}
