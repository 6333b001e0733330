//! Security contexts: protected paths plus session-scoped auth state.
//!
//! Each context owns one bucket in the session, stored under
//! `_security.<name>`. Besides application values the bucket carries
//! bookkeeping stamps (seconds since the epoch):
//!
//! | Key            | Meaning                                         |
//! |----------------|-------------------------------------------------|
//! | `_created`     | first write into the bucket                     |
//! | `_last_access` | last read or write                              |
//! | `_destroy_at`  | grace deadline of a session id being replaced  |
//! | `_remember`    | remember-me login                               |
//!
//! The earliest active deadline wins. Once it has passed, the whole bucket is
//! dropped on the next read.

use crate::clock::{Clock, SystemClock};
use crate::error::{SecurityError, SecurityResult};
use crate::session::{Session, SessionData};
use crate::user::User;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Session key of the authenticated user inside a context bucket.
pub const USER_KEY: &str = "user";

const CREATED: &str = "_created";
const LAST_ACCESS: &str = "_last_access";
const DESTROY_AT: &str = "_destroy_at";
const REFERER: &str = "_referer";
const REMEMBER: &str = "_remember";
const AUTH_ERROR: &str = "_auth_error";

/// A protected path pattern and the roles it requires.
///
/// Patterns are regular expressions searched in the request path, so anchor
/// them (`^/admin`) to restrict them to a prefix.
#[derive(Debug, Clone)]
pub struct AccessRule {
    pattern: Regex,
    roles: Vec<String>,
}

impl AccessRule {
    /// Compiles a rule.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::InvalidRule`] if the pattern does not compile.
    pub fn new<I, S>(pattern: &str, roles: I) -> SecurityResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pattern =
            Regex::new(pattern).map_err(|e| SecurityError::invalid_rule(pattern, e.to_string()))?;
        Ok(Self {
            pattern,
            roles: roles.into_iter().map(Into::into).collect(),
        })
    }

    /// Returns the pattern source.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Returns the required roles. Empty means any authenticated user.
    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Returns `true` if the rule covers `path`.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }
}

/// A named security context.
#[derive(Debug)]
pub struct SecurityContext {
    name: String,
    is_default: bool,
    ttl: Duration,
    idle_timeout: Duration,
    regeneration_delay: Duration,
    remember_lifetime: Duration,
    rules: Vec<AccessRule>,
    clock: Arc<dyn Clock>,
}

impl SecurityContext {
    /// Creates a context with no rules and no expiry.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_default: false,
            ttl: Duration::ZERO,
            idle_timeout: Duration::ZERO,
            regeneration_delay: Duration::ZERO,
            remember_lifetime: Duration::ZERO,
            rules: Vec::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Flags this context as the default of its [`ContextMap`].
    #[must_use]
    pub const fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Sets the absolute lifetime of a login. Zero disables it.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the inactivity timeout. Zero disables it.
    #[must_use]
    pub const fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Sets how long a replaced session id stays usable after login.
    #[must_use]
    pub const fn with_regeneration_delay(mut self, delay: Duration) -> Self {
        self.regeneration_delay = delay;
        self
    }

    /// Sets the lifetime of remember-me logins. Zero disables remember-me.
    #[must_use]
    pub const fn with_remember_lifetime(mut self, lifetime: Duration) -> Self {
        self.remember_lifetime = lifetime;
        self
    }

    /// Appends an access rule.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::InvalidRule`] if the pattern does not compile.
    pub fn with_rule<I, S>(self, pattern: &str, roles: I) -> SecurityResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self.with_access_rule(AccessRule::new(pattern, roles)?))
    }

    /// Appends a compiled access rule.
    #[must_use]
    pub fn with_access_rule(mut self, rule: AccessRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if flagged default.
    #[must_use]
    pub const fn is_default(&self) -> bool {
        self.is_default
    }

    /// Returns the login lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the inactivity timeout.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Returns the session regeneration grace window.
    #[must_use]
    pub const fn regeneration_delay(&self) -> Duration {
        self.regeneration_delay
    }

    /// Returns the remember-me lifetime.
    #[must_use]
    pub const fn remember_lifetime(&self) -> Duration {
        self.remember_lifetime
    }

    /// Returns the access rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    /// Returns the first rule covering `path`.
    #[must_use]
    pub fn rule_for(&self, path: &str) -> Option<&AccessRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    /// Returns the session key of this context's bucket.
    #[must_use]
    pub fn bucket_key(&self) -> String {
        format!("_security.{}", self.name)
    }

    /// Reads `key`, returning `default` when unset or when the bucket has
    /// expired. An expired bucket is cleared; otherwise the read refreshes
    /// the idle timer.
    pub fn get(&self, session: &Session, key: &str, default: Value) -> Value {
        let mut bucket = self.bucket(session);
        if bucket.is_empty() {
            return default;
        }

        let now = self.clock.now();
        if self.is_expired(&bucket, now) {
            tracing::debug!(context = %self.name, "Security context expired");
            self.clear(session);
            return default;
        }

        bucket.insert(LAST_ACCESS.to_string(), now.into());
        let value = bucket.get(key).cloned().unwrap_or(default);
        self.store_bucket(session, bucket);
        value
    }

    /// Writes `key`. Writing into an empty or expired bucket starts a new one.
    pub fn set(&self, session: &Session, key: &str, value: Value) {
        let now = self.clock.now();
        let mut bucket = self.bucket(session);
        if self.is_expired(&bucket, now) {
            bucket.clear();
        }
        bucket.entry(CREATED).or_insert_with(|| now.into());
        bucket.insert(LAST_ACCESS.to_string(), now.into());
        bucket.insert(key.to_string(), value);
        self.store_bucket(session, bucket);
    }

    /// Removes `key`, returning its value.
    pub fn remove(&self, session: &Session, key: &str) -> Option<Value> {
        let mut bucket = self.bucket(session);
        let removed = bucket.remove(key);
        if removed.is_some() {
            self.store_bucket(session, bucket);
        }
        removed
    }

    /// Drops the whole bucket.
    pub fn clear(&self, session: &Session) {
        session.remove(&self.bucket_key());
    }

    /// Returns the authenticated user, if any and not expired.
    #[must_use]
    pub fn user(&self, session: &Session) -> Option<User> {
        serde_json::from_value(self.get(session, USER_KEY, Value::Null)).ok()
    }

    /// Stores `user` (without credentials) as the authenticated user.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::Serialization`] if the user cannot be encoded.
    pub fn set_user(&self, session: &Session, user: &User) -> SecurityResult<()> {
        let value = serde_json::to_value(user.sanitized())?;
        self.set(session, USER_KEY, value);
        Ok(())
    }

    /// Returns `true` if a user is logged into this context.
    #[must_use]
    pub fn is_authenticated(&self, session: &Session) -> bool {
        self.user(session).is_some()
    }

    /// Remembers where an unauthenticated visitor was heading.
    pub fn save_referer(&self, session: &Session, target: &str) {
        self.set(session, REFERER, Value::String(target.to_string()));
    }

    /// Takes the saved referrer.
    pub fn take_referer(&self, session: &Session) -> Option<String> {
        match self.get(session, REFERER, Value::Null) {
            Value::String(target) => {
                self.remove(session, REFERER);
                Some(target)
            }
            _ => None,
        }
    }

    /// Flags a failed login so the login page can show an error.
    pub fn flag_auth_error(&self, session: &Session) {
        self.set(session, AUTH_ERROR, Value::Bool(true));
    }

    /// Takes the failed-login flag.
    pub fn take_auth_error(&self, session: &Session) -> bool {
        let flagged = self.get(session, AUTH_ERROR, Value::Bool(false)) == Value::Bool(true);
        if flagged {
            self.remove(session, AUTH_ERROR);
        }
        flagged
    }

    /// Marks the login as remember-me.
    pub fn set_remember(&self, session: &Session) {
        self.set(session, REMEMBER, Value::Bool(true));
    }

    /// Stamps the grace deadline on the bucket before its session id is
    /// replaced and returns that deadline, `None` when no grace window is
    /// configured.
    pub(crate) fn mark_for_destruction(&self, session: &Session) -> Option<u64> {
        if self.regeneration_delay.is_zero() {
            return None;
        }
        let destroy_at = self.clock.now().saturating_add(self.regeneration_delay.as_secs());
        self.set(session, DESTROY_AT, destroy_at.into());
        Some(destroy_at)
    }

    /// Returns the instant the bucket expires, `None` if nothing is active.
    fn deadline(&self, bucket: &SessionData) -> Option<u64> {
        let stamp = |key: &str| bucket.get(key).and_then(Value::as_u64);
        let after = |start: Option<u64>, span: Duration| {
            (!span.is_zero())
                .then_some(start)
                .flatten()
                .map(|start| start.saturating_add(span.as_secs()))
        };

        let remembered = !self.remember_lifetime.is_zero()
            && bucket.get(REMEMBER) == Some(&Value::Bool(true));

        let lifetime = if remembered {
            [after(stamp(CREATED), self.remember_lifetime), None]
        } else {
            [
                after(stamp(CREATED), self.ttl),
                after(stamp(LAST_ACCESS), self.idle_timeout),
            ]
        };

        lifetime
            .into_iter()
            .chain([stamp(DESTROY_AT)])
            .flatten()
            .min()
    }

    fn is_expired(&self, bucket: &SessionData, now: u64) -> bool {
        self.deadline(bucket).is_some_and(|deadline| now >= deadline)
    }

    fn bucket(&self, session: &Session) -> SessionData {
        match session.get(&self.bucket_key()) {
            Some(Value::Object(bucket)) => bucket,
            _ => SessionData::new(),
        }
    }

    fn store_bucket(&self, session: &Session, bucket: SessionData) {
        session.insert(self.bucket_key(), Value::Object(bucket));
    }
}

/// Named security contexts.
#[derive(Debug, Default)]
pub struct ContextMap {
    contexts: IndexMap<String, Arc<SecurityContext>>,
}

impl ContextMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a context, replacing one with the same name.
    pub fn insert(&mut self, context: SecurityContext) -> Arc<SecurityContext> {
        let context = Arc::new(context);
        self.contexts
            .insert(context.name().to_string(), Arc::clone(&context));
        context
    }

    /// Returns the context named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<SecurityContext>> {
        self.contexts.get(name)
    }

    /// Returns the context named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::UnknownContext`] if there is none.
    pub fn require(&self, name: &str) -> SecurityResult<&Arc<SecurityContext>> {
        self.get(name)
            .ok_or_else(|| SecurityError::UnknownContext(name.to_string()))
    }

    /// Returns the first context flagged default, else the first added.
    #[must_use]
    pub fn default_context(&self) -> Option<&Arc<SecurityContext>> {
        self.contexts
            .values()
            .find(|context| context.is_default())
            .or_else(|| self.contexts.values().next())
    }

    /// Iterates contexts in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<SecurityContext>> {
        self.contexts.values()
    }

    /// Returns the number of contexts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Returns `true` if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;

    fn context(clock: &Arc<ManualClock>) -> SecurityContext {
        SecurityContext::new("main").with_clock(Arc::clone(clock) as Arc<dyn Clock>)
    }

    #[test]
    fn test_rule_for_first_match_wins() {
        let ctx = SecurityContext::new("main")
            .with_rule("^/admin/public", Vec::<String>::new())
            .unwrap()
            .with_rule("^/admin", ["admin"])
            .unwrap();

        assert!(ctx.rule_for("/admin/public/x").unwrap().roles().is_empty());
        assert_eq!(ctx.rule_for("/admin/users").unwrap().roles(), ["admin"]);
        assert!(ctx.rule_for("/blog").is_none());
    }

    #[test]
    fn test_invalid_rule() {
        let err = SecurityContext::new("main").with_rule("^/(", ["a"]).unwrap_err();
        assert!(matches!(err, SecurityError::InvalidRule { .. }));
    }

    #[test]
    fn test_get_set_remove() {
        let clock = Arc::new(ManualClock::new(1_000));
        let ctx = context(&clock);
        let session = Session::new("s");

        assert_eq!(ctx.get(&session, "k", json!("d")), json!("d"));
        ctx.set(&session, "k", json!(1));
        assert_eq!(ctx.get(&session, "k", Value::Null), json!(1));
        assert_eq!(ctx.remove(&session, "k"), Some(json!(1)));
        assert_eq!(ctx.get(&session, "k", Value::Null), Value::Null);
        assert!(session.contains("_security.main"));
    }

    #[test]
    fn test_idle_timeout_beats_ttl() {
        let clock = Arc::new(ManualClock::new(1_000));
        let ctx = context(&clock)
            .with_ttl(Duration::from_secs(100))
            .with_idle_timeout(Duration::from_secs(10));
        let session = Session::new("s");
        ctx.set_user(&session, &User::new("ada", ["admin"])).unwrap();

        clock.advance(Duration::from_secs(11));

        assert_eq!(ctx.get(&session, USER_KEY, json!("default")), json!("default"));
        assert!(!session.contains(&ctx.bucket_key()));
    }

    #[test]
    fn test_reads_refresh_idle_timer() {
        let clock = Arc::new(ManualClock::new(1_000));
        let ctx = context(&clock)
            .with_ttl(Duration::from_secs(100))
            .with_idle_timeout(Duration::from_secs(10));
        let session = Session::new("s");
        ctx.set_user(&session, &User::new("ada", ["admin"])).unwrap();

        for _ in 0..11 {
            clock.advance(Duration::from_secs(9));
            assert!(ctx.is_authenticated(&session));
        }

        // Last read at 1099; the absolute lifetime ends at 1100.
        clock.advance(Duration::from_secs(1));
        assert!(!ctx.is_authenticated(&session));
    }

    #[test]
    fn test_destroy_deadline() {
        let clock = Arc::new(ManualClock::new(1_000));
        let ctx = context(&clock).with_regeneration_delay(Duration::from_secs(5));
        let session = Session::new("s");
        ctx.set_user(&session, &User::new("ada", ["admin"])).unwrap();

        assert_eq!(ctx.mark_for_destruction(&session), Some(1_005));
        clock.advance(Duration::from_secs(4));
        assert!(ctx.is_authenticated(&session));
        clock.advance(Duration::from_secs(1));
        assert!(!ctx.is_authenticated(&session));
    }

    #[test]
    fn test_no_grace_window_is_not_marked() {
        let clock = Arc::new(ManualClock::new(1_000));
        let ctx = context(&clock);
        assert_eq!(ctx.mark_for_destruction(&Session::new("s")), None);
    }

    #[test]
    fn test_remember_me_outlives_idle_timeout() {
        let clock = Arc::new(ManualClock::new(1_000));
        let ctx = context(&clock)
            .with_idle_timeout(Duration::from_secs(10))
            .with_remember_lifetime(Duration::from_secs(3_600));
        let session = Session::new("s");
        ctx.set_user(&session, &User::new("ada", ["admin"])).unwrap();
        ctx.set_remember(&session);

        clock.advance(Duration::from_secs(600));
        assert!(ctx.is_authenticated(&session));

        clock.advance(Duration::from_secs(3_000));
        assert!(!ctx.is_authenticated(&session));
    }

    #[test]
    fn test_zero_durations_never_expire() {
        let clock = Arc::new(ManualClock::new(1_000));
        let ctx = context(&clock);
        let session = Session::new("s");
        ctx.set_user(&session, &User::new("ada", ["admin"])).unwrap();

        clock.advance(Duration::from_secs(10_000_000));
        assert!(ctx.is_authenticated(&session));
    }

    #[test]
    fn test_user_is_stored_without_credentials() {
        let ctx = SecurityContext::new("main");
        let session = Session::new("s");
        let user = User::new("ada", ["admin"]).with_password("hash");
        ctx.set_user(&session, &user).unwrap();

        let stored = ctx.user(&session).unwrap();
        assert_eq!(stored.username(), "ada");
        assert_eq!(stored.password(), "");
    }

    #[test]
    fn test_referer_and_auth_error_are_taken_once() {
        let ctx = SecurityContext::new("main");
        let session = Session::new("s");

        ctx.save_referer(&session, "/admin?tab=1");
        assert_eq!(ctx.take_referer(&session).as_deref(), Some("/admin?tab=1"));
        assert_eq!(ctx.take_referer(&session), None);

        ctx.flag_auth_error(&session);
        assert!(ctx.take_auth_error(&session));
        assert!(!ctx.take_auth_error(&session));
    }

    #[test]
    fn test_contexts_are_isolated() {
        let admin = SecurityContext::new("admin");
        let shop = SecurityContext::new("shop");
        let session = Session::new("s");

        admin.set_user(&session, &User::new("ada", ["admin"])).unwrap();
        assert!(admin.is_authenticated(&session));
        assert!(!shop.is_authenticated(&session));

        admin.clear(&session);
        assert!(!admin.is_authenticated(&session));
    }

    #[test]
    fn test_context_map_default() {
        let mut map = ContextMap::new();
        assert!(map.default_context().is_none());

        map.insert(SecurityContext::new("first"));
        assert_eq!(map.default_context().unwrap().name(), "first");

        map.insert(SecurityContext::new("second").as_default());
        assert_eq!(map.default_context().unwrap().name(), "second");
        assert_eq!(map.len(), 2);

        assert!(map.require("second").is_ok());
        assert!(matches!(
            map.require("missing"),
            Err(SecurityError::UnknownContext(_))
        ));
    }
}
