//! Cookie-backed sessions.
//!
//! [`SessionMiddleware`] loads the session named by the request cookie (or
//! starts a new one), exposes it to downstream middleware as a [`Session`]
//! request extension, and persists it to a [`SessionStore`] on the way out.
//!
//! ```text
//! Cookie: KEYSTONE_SESSION=<id>
//!     → store.load(id) → Session (extension) → next
//!     ← store.save(id, data) ← Set-Cookie when the id is new or changed
//! ```

use crate::clock::{Clock, SystemClock};
use crate::error::SecurityResult;
use http::header::{HeaderValue, COOKIE, SET_COOKIE};
use keystone_core::{BoxFuture, KeystoneError, KeystoneResult, Request, Response};
use keystone_middleware::{Middleware, Next};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Default session cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "KEYSTONE_SESSION";

/// The key-value payload of one session.
pub type SessionData = serde_json::Map<String, Value>;

/// Persistent storage for sessions.
pub trait SessionStore: Send + Sync + fmt::Debug + 'static {
    /// Loads a session, `None` if the id is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SecurityError::Session`] if the backend fails.
    fn load(&self, id: &str) -> SecurityResult<Option<SessionData>>;

    /// Saves a session, replacing any previous data.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SecurityError::Session`] if the backend fails.
    fn save(&self, id: &str, data: SessionData) -> SecurityResult<()>;

    /// Saves a session that must be gone once `expires_at`, in epoch
    /// seconds, has passed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SecurityError::Session`] if the backend fails.
    fn save_until(&self, id: &str, data: SessionData, expires_at: u64) -> SecurityResult<()>;

    /// Deletes a session.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SecurityError::Session`] if the backend fails.
    fn destroy(&self, id: &str) -> SecurityResult<()>;

    /// Returns a fresh, unguessable session id.
    fn generate_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Default idle lifetime of entries in a [`MemorySessionStore`].
pub const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(1_800);

/// Minimum time between two sweeps of a [`MemorySessionStore`].
const SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Debug)]
struct StoredSession {
    data: SessionData,
    expires_at: u64,
    /// Set by [`SessionStore::save_until`]; reads do not extend the deadline.
    pinned: bool,
}

/// In-process session store.
///
/// Entries expire once they have been neither loaded nor saved for the
/// store's max lifetime, or at the fixed deadline given to
/// [`SessionStore::save_until`]. Expired entries are dropped when they are
/// looked up and by a sweep that runs on save at most once a minute.
#[derive(Debug)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, StoredSession>>,
    clock: Arc<dyn Clock>,
    max_lifetime: Duration,
    next_sweep: AtomicU64,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock: Arc::new(SystemClock),
            max_lifetime: DEFAULT_MAX_LIFETIME,
            next_sweep: AtomicU64::new(0),
        }
    }
}

impl MemorySessionStore {
    /// Creates an empty store with [`DEFAULT_MAX_LIFETIME`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the idle lifetime. Zero keeps entries until they are destroyed.
    #[must_use]
    pub fn with_max_lifetime(mut self, max_lifetime: Duration) -> Self {
        self.max_lifetime = max_lifetime;
        self
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the idle lifetime.
    #[must_use]
    pub const fn max_lifetime(&self) -> Duration {
        self.max_lifetime
    }

    /// Returns `true` if a live session with `id` is stored.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        let now = self.clock.now();
        self.sessions
            .read()
            .get(id)
            .is_some_and(|entry| entry.expires_at > now)
    }

    /// Returns the number of stored sessions, including expired ones not
    /// yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns `true` if no sessions are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.expires_at > now);
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = sessions.len(), "Expired sessions purged");
        }
        removed
    }

    fn idle_deadline(&self, now: u64) -> u64 {
        if self.max_lifetime.is_zero() {
            u64::MAX
        } else {
            now.saturating_add(self.max_lifetime.as_secs())
        }
    }

    fn insert(&self, id: &str, data: SessionData, expires_at: u64, pinned: bool) {
        let now = self.clock.now();
        if now >= self.next_sweep.load(Ordering::Relaxed) {
            self.next_sweep
                .store(now.saturating_add(SWEEP_INTERVAL_SECS), Ordering::Relaxed);
            self.purge_expired();
        }
        self.sessions.write().insert(
            id.to_string(),
            StoredSession {
                data,
                expires_at,
                pinned,
            },
        );
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, id: &str) -> SecurityResult<Option<SessionData>> {
        let now = self.clock.now();
        let mut sessions = self.sessions.write();
        let Some(entry) = sessions.get_mut(id) else {
            return Ok(None);
        };
        if entry.expires_at <= now {
            sessions.remove(id);
            return Ok(None);
        }
        if !entry.pinned {
            entry.expires_at = self.idle_deadline(now);
        }
        Ok(Some(entry.data.clone()))
    }

    fn save(&self, id: &str, data: SessionData) -> SecurityResult<()> {
        let expires_at = self.idle_deadline(self.clock.now());
        self.insert(id, data, expires_at, false);
        Ok(())
    }

    fn save_until(&self, id: &str, data: SessionData, expires_at: u64) -> SecurityResult<()> {
        let expires_at = expires_at.min(self.idle_deadline(self.clock.now()));
        self.insert(id, data, expires_at, true);
        Ok(())
    }

    fn destroy(&self, id: &str) -> SecurityResult<()> {
        self.sessions.write().remove(id);
        Ok(())
    }
}

/// A handle to the current request's session.
///
/// Clones share state, so writes made by a shield are visible to the
/// [`SessionMiddleware`] that persists them.
#[derive(Clone)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
}

struct SessionState {
    id: String,
    data: SessionData,
    is_new: bool,
    dirty: bool,
    destroyed: bool,
    regeneration: Option<Regeneration>,
}

struct Regeneration {
    keep_previous_until: Option<u64>,
    snapshot: SessionData,
}

/// What the session middleware must do with the cookie after a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CookieUpdate {
    Keep,
    Set(String),
    Expire,
}

impl Session {
    /// Starts a new, not yet persisted session.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_state(id.into(), SessionData::new(), true)
    }

    /// Wraps a session loaded from a store.
    pub fn existing(id: impl Into<String>, data: SessionData) -> Self {
        Self::with_state(id.into(), data, false)
    }

    fn with_state(id: String, data: SessionData, is_new: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                id,
                data,
                is_new,
                dirty: false,
                destroyed: false,
                regeneration: None,
            })),
        }
    }

    /// Returns the session of a request that went through [`SessionMiddleware`].
    #[must_use]
    pub fn from_request(request: &Request) -> Option<Self> {
        request.extensions().get::<Self>().cloned()
    }

    /// Returns the current id. After [`Session::regenerate`] the new id is
    /// only assigned when the session is committed.
    #[must_use]
    pub fn id(&self) -> String {
        self.state.lock().id.clone()
    }

    /// Returns `true` until the session has been persisted once.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.state.lock().is_new
    }

    /// Returns a copy of the value under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.lock().data.get(key).cloned()
    }

    /// Returns `true` if `key` is set.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().data.contains_key(key)
    }

    /// Sets `key`.
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        let mut state = self.state.lock();
        state.data.insert(key.into(), value);
        state.dirty = true;
    }

    /// Removes `key`, returning its value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut state = self.state.lock();
        let removed = state.data.remove(key);
        state.dirty |= removed.is_some();
        removed
    }

    /// Removes every key.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.data.clear();
        state.dirty = true;
    }

    /// Marks the session for deletion when it is committed.
    pub fn destroy(&self) {
        self.state.lock().destroyed = true;
    }

    /// Moves the session data to a fresh id on commit.
    ///
    /// With `keep_previous_until` the data as it is right now stays stored
    /// under the old id until that instant (epoch seconds), otherwise the old
    /// id is destroyed.
    pub fn regenerate(&self, keep_previous_until: Option<u64>) {
        let mut state = self.state.lock();
        let snapshot = state.data.clone();
        state.regeneration = Some(Regeneration {
            keep_previous_until,
            snapshot,
        });
        state.dirty = true;
    }

    /// Returns `true` if [`Session::regenerate`] is pending.
    #[must_use]
    pub fn is_regenerating(&self) -> bool {
        self.state.lock().regeneration.is_some()
    }

    /// Writes pending changes to `store`.
    pub(crate) fn commit(&self, store: &dyn SessionStore) -> SecurityResult<CookieUpdate> {
        let mut state = self.state.lock();

        if state.destroyed {
            if state.is_new {
                return Ok(CookieUpdate::Keep);
            }
            store.destroy(&state.id)?;
            return Ok(CookieUpdate::Expire);
        }

        if let Some(regeneration) = state.regeneration.take() {
            if !state.is_new {
                match regeneration.keep_previous_until {
                    Some(deadline) => {
                        store.save_until(&state.id, regeneration.snapshot, deadline)?;
                    }
                    None => store.destroy(&state.id)?,
                }
            }
            let new_id = store.generate_id();
            store.save(&new_id, state.data.clone())?;
            tracing::debug!(session.previous = %state.id, "Session id regenerated");
            state.id.clone_from(&new_id);
            state.is_new = false;
            state.dirty = false;
            return Ok(CookieUpdate::Set(new_id));
        }

        if !state.dirty {
            return Ok(CookieUpdate::Keep);
        }
        store.save(&state.id, state.data.clone())?;
        state.dirty = false;
        if state.is_new {
            state.is_new = false;
            return Ok(CookieUpdate::Set(state.id.clone()));
        }
        Ok(CookieUpdate::Keep)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Session")
            .field("id", &state.id)
            .field("keys", &state.data.len())
            .field("is_new", &state.is_new)
            .finish_non_exhaustive()
    }
}

/// Session cookie attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Cookie name.
    pub cookie_name: String,
    /// Cookie `Path` attribute.
    pub cookie_path: String,
    /// Adds the `Secure` attribute.
    pub secure: bool,
    /// Adds the `HttpOnly` attribute.
    pub http_only: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_path: "/".to_string(),
            secure: false,
            http_only: true,
        }
    }
}

impl SessionConfig {
    fn cookie(&self, value: &str, expire: bool) -> String {
        let mut cookie = format!("{}={value}; Path={}", self.cookie_name, self.cookie_path);
        if expire {
            cookie.push_str("; Max-Age=0");
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str("; SameSite=Lax");
        cookie
    }
}

/// Loads, exposes and persists the request's [`Session`].
#[derive(Debug, Clone)]
pub struct SessionMiddleware {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl SessionMiddleware {
    /// Creates the middleware with default cookie settings.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self::with_config(store, SessionConfig::default())
    }

    /// Creates the middleware with custom cookie settings.
    #[must_use]
    pub fn with_config(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    /// Returns the store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Returns the cookie settings.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn load(&self, request: &Request) -> SecurityResult<Session> {
        if let Some(id) = cookie_value(request, &self.config.cookie_name) {
            if let Some(data) = self.store.load(id)? {
                return Ok(Session::existing(id, data));
            }
        }
        Ok(Session::new(self.store.generate_id()))
    }

    fn apply(&self, response: &mut Response, update: CookieUpdate) -> KeystoneResult<()> {
        let cookie = match update {
            CookieUpdate::Keep => return Ok(()),
            CookieUpdate::Set(id) => self.config.cookie(&id, false),
            CookieUpdate::Expire => self.config.cookie("", true),
        };
        let value = HeaderValue::from_str(&cookie).map_err(|e| {
            KeystoneError::internal_with_source("invalid session cookie", e)
        })?;
        response.headers_mut().append(SET_COOKIE, value);
        Ok(())
    }
}

impl Middleware for SessionMiddleware {
    fn name(&self) -> &'static str {
        "session"
    }

    fn process<'a>(
        &'a self,
        mut request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, KeystoneResult<Response>> {
        Box::pin(async move {
            let session = self.load(&request)?;
            request.extensions_mut().insert(session.clone());

            let result = next.run(request).await;

            // An error response carries no cookie, so a session that needs
            // one would be stored unreachable.
            if result.is_err() && (session.is_new() || session.is_regenerating()) {
                return result;
            }
            let update = session.commit(self.store.as_ref())?;

            let mut response = result?;
            self.apply(&mut response, update)?;
            Ok(response)
        })
    }
}

/// Finds a cookie by name across all `Cookie` headers.
fn cookie_value<'r>(request: &'r Request, name: &str) -> Option<&'r str> {
    request
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;
    use keystone_core::ResponseExt;
    use keystone_middleware::{handler_fn, MiddlewareChain};
    use serde_json::json;

    fn request(cookie: Option<&str>) -> Request {
        let mut builder = http::Request::builder().uri("/");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Full::new(Bytes::new())).unwrap()
    }

    fn counting_chain(store: Arc<MemorySessionStore>) -> MiddlewareChain {
        let mut chain = MiddlewareChain::new();
        chain
            .add(SessionMiddleware::new(store))
            .set_terminal(handler_fn(|req: Request| async move {
                let session = Session::from_request(&req).unwrap();
                let visits = session.get("visits").and_then(|v| v.as_u64()).unwrap_or(0);
                session.insert("visits", json!(visits + 1));
                Ok(Response::html(StatusCode::OK, (visits + 1).to_string()))
            }));
        chain
    }

    fn set_cookie_id(response: &Response) -> Option<String> {
        let header = response.headers().get(SET_COOKIE)?.to_str().ok()?;
        let (pair, _) = header.split_once(';')?;
        pair.split_once('=').map(|(_, id)| id.to_string())
    }

    #[test]
    fn test_cookie_value() {
        let req = request(Some("theme=dark; KEYSTONE_SESSION=abc; other=1"));
        assert_eq!(cookie_value(&req, DEFAULT_COOKIE_NAME), Some("abc"));
        assert_eq!(cookie_value(&req, "missing"), None);

        let req = request(Some("KEYSTONE_SESSION="));
        assert_eq!(cookie_value(&req, DEFAULT_COOKIE_NAME), None);
    }

    #[test]
    fn test_commit_new_session_only_when_written() {
        let store = MemorySessionStore::new();
        let session = Session::new("fresh");
        assert_eq!(session.commit(&store).unwrap(), CookieUpdate::Keep);
        assert!(store.is_empty());

        session.insert("a", json!(1));
        assert_eq!(
            session.commit(&store).unwrap(),
            CookieUpdate::Set("fresh".to_string())
        );
        assert!(store.contains("fresh"));
        assert!(!session.is_new());
    }

    #[test]
    fn test_regenerate_keeps_snapshot_under_old_id() {
        let store = MemorySessionStore::new();
        let mut data = SessionData::new();
        data.insert("grace".to_string(), json!(true));
        store.save("old", data.clone()).unwrap();

        let session = Session::existing("old", data);
        session.regenerate(Some(u64::MAX));
        session.remove("grace");
        session.insert("user", json!("ada"));

        let CookieUpdate::Set(new_id) = session.commit(&store).unwrap() else {
            panic!("expected a new cookie");
        };
        assert_ne!(new_id, "old");
        assert_eq!(session.id(), new_id);

        let old = store.load("old").unwrap().unwrap();
        assert_eq!(old.get("grace"), Some(&json!(true)));
        assert!(old.get("user").is_none());

        let new = store.load(&new_id).unwrap().unwrap();
        assert_eq!(new.get("user"), Some(&json!("ada")));
        assert!(new.get("grace").is_none());
    }

    #[test]
    fn test_regenerate_without_grace_destroys_old_id() {
        let store = MemorySessionStore::new();
        store.save("old", SessionData::new()).unwrap();

        let session = Session::existing("old", SessionData::new());
        session.regenerate(None);
        session.commit(&store).unwrap();

        assert!(!store.contains("old"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_idle_entries_expire() {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = MemorySessionStore::new()
            .with_clock(Arc::clone(&clock) as Arc<dyn Clock>)
            .with_max_lifetime(Duration::from_secs(100));
        for id in ["a", "b", "c"] {
            store.save(id, SessionData::new()).unwrap();
        }

        clock.advance(Duration::from_secs(60));
        assert!(store.load("a").unwrap().is_some(), "reads extend the lifetime");

        clock.advance(Duration::from_secs(60));
        assert!(store.contains("a"));
        assert!(!store.contains("b"));
        assert!(store.load("b").unwrap().is_none());

        store.save("d", SessionData::new()).unwrap();
        assert_eq!(store.len(), 2, "saving swept the expired entry");
        assert!(!store.contains("c"));
    }

    #[test]
    fn test_pinned_entry_is_gone_after_deadline() {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = MemorySessionStore::new().with_clock(Arc::clone(&clock) as Arc<dyn Clock>);
        store.save_until("old", SessionData::new(), 1_030).unwrap();

        clock.advance(Duration::from_secs(29));
        assert!(store.load("old").unwrap().is_some());
        clock.advance(Duration::from_secs(1));
        assert!(!store.contains("old"));
        assert_eq!(store.purge_expired(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_zero_lifetime_never_expires() {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = MemorySessionStore::new()
            .with_clock(Arc::clone(&clock) as Arc<dyn Clock>)
            .with_max_lifetime(Duration::ZERO);
        store.save("forever", SessionData::new()).unwrap();
        clock.advance(Duration::from_secs(365 * 24 * 3_600));
        assert!(store.contains("forever"));
        assert_eq!(store.purge_expired(), 0);
    }

    #[test]
    fn test_regenerate_pins_old_id_to_deadline() {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = MemorySessionStore::new().with_clock(Arc::clone(&clock) as Arc<dyn Clock>);
        store.save("old", SessionData::new()).unwrap();

        let session = Session::existing("old", SessionData::new());
        session.regenerate(Some(1_010));
        let CookieUpdate::Set(new_id) = session.commit(&store).unwrap() else {
            panic!("expected a new cookie");
        };

        clock.advance(Duration::from_secs(10));
        assert!(store.load("old").unwrap().is_none());
        assert!(store.load(&new_id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_request_does_not_store_new_session() {
        let store = Arc::new(MemorySessionStore::new());
        let mut chain = MiddlewareChain::new();
        chain
            .add(SessionMiddleware::new(Arc::clone(&store) as Arc<dyn SessionStore>))
            .set_terminal(handler_fn(|req: Request| async move {
                Session::from_request(&req).unwrap().insert("user", json!("ada"));
                Err::<Response, _>(KeystoneError::internal("boom"))
            }));

        assert!(chain.handle(request(None)).await.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_failed_request_still_stores_existing_session() {
        let store = Arc::new(MemorySessionStore::new());
        store.save("known", SessionData::new()).unwrap();
        let mut chain = MiddlewareChain::new();
        chain
            .add(SessionMiddleware::new(Arc::clone(&store) as Arc<dyn SessionStore>))
            .set_terminal(handler_fn(|req: Request| async move {
                Session::from_request(&req).unwrap().insert("seen", json!(true));
                Err::<Response, _>(KeystoneError::internal("boom"))
            }));

        assert!(chain
            .handle(request(Some("KEYSTONE_SESSION=known")))
            .await
            .is_err());
        let data = store.load("known").unwrap().unwrap();
        assert_eq!(data.get("seen"), Some(&json!(true)));
    }

    #[test]
    fn test_destroy() {
        let store = MemorySessionStore::new();
        store.save("gone", SessionData::new()).unwrap();

        let session = Session::existing("gone", SessionData::new());
        session.destroy();
        assert_eq!(session.commit(&store).unwrap(), CookieUpdate::Expire);
        assert!(store.is_empty());
    }

    #[test]
    fn test_cookie_attributes() {
        let config = SessionConfig {
            secure: true,
            ..SessionConfig::default()
        };
        assert_eq!(
            config.cookie("id1", false),
            "KEYSTONE_SESSION=id1; Path=/; HttpOnly; Secure; SameSite=Lax"
        );
        assert!(config.cookie("", true).contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_middleware_round_trip() {
        let store = Arc::new(MemorySessionStore::new());
        let chain = counting_chain(Arc::clone(&store));

        let first = chain.handle(request(None)).await.unwrap();
        let id = set_cookie_id(&first).expect("new session sets a cookie");
        assert!(store.contains(&id));

        let cookie = format!("{DEFAULT_COOKIE_NAME}={id}");
        let second = chain.handle(request(Some(&cookie))).await.unwrap();
        assert!(second.headers().get(SET_COOKIE).is_none());

        let data = store.load(&id).unwrap().unwrap();
        assert_eq!(data.get("visits"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_unknown_cookie_starts_fresh_session() {
        let store = Arc::new(MemorySessionStore::new());
        let chain = counting_chain(Arc::clone(&store));

        let response = chain
            .handle(request(Some("KEYSTONE_SESSION=forged")))
            .await
            .unwrap();
        let id = set_cookie_id(&response).unwrap();
        assert_ne!(id, "forged");
        assert!(!store.contains("forged"));
    }
}
