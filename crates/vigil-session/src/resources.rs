//! Keyed cache for the client's other remote resources (game details,
//! scoreboards, team lists) and the scopes used to drop them together.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

/// Selects cache keys to drop together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationScope {
    /// Keys containing the token anywhere, e.g. `"game/"`.
    Containing(String),
    /// Keys starting with the token.
    Prefix(String),
    /// Exactly one key.
    Exact(String),
    /// Keys matched by any of the inner scopes.
    AnyOf(Vec<InvalidationScope>),
}

impl InvalidationScope {
    pub fn containing(token: impl Into<String>) -> Self {
        Self::Containing(token.into())
    }

    pub fn prefix(token: impl Into<String>) -> Self {
        Self::Prefix(token.into())
    }

    /// Returns `true` if `key` falls within this scope.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::Containing(token) => key.contains(token.as_str()),
            Self::Prefix(token) => key.starts_with(token.as_str()),
            Self::Exact(token) => key == token,
            Self::AnyOf(scopes) => scopes.iter().any(|s| s.matches(key)),
        }
    }
}

/// Shared in-memory cache of decoded API responses keyed by request path.
///
/// Cloning is cheap and every clone sees the same entries.
#[derive(Debug, Clone, Default)]
pub struct ResourceCache {
    entries: Arc<RwLock<HashMap<String, Arc<Value>>>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<Value>> {
        self.entries.read().get(key).cloned()
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.entries.write().insert(key.into(), Arc::new(value));
    }

    pub fn remove(&self, key: &str) -> Option<Arc<Value>> {
        self.entries.write().remove(key)
    }

    /// Drops every entry within `scope` in one step and returns how many
    /// were dropped. Nothing is re-fetched: the next reader finds the
    /// key missing and decides for itself.
    pub fn invalidate(&self, scope: &InvalidationScope) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| !scope.matches(key));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
