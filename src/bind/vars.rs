//! The bind store: named variables shared by a connection and its capabilities.
//!
//! Mutations take the write lock, lookups take the read lock. Nothing is atomic
//! across two calls, so `has` followed by `set` can race with another writer.

use crate::bind::BindValue;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe map of bind keys to values.
#[derive(Debug, Default)]
pub struct Vars {
    entries: RwLock<HashMap<String, BindValue>>,
}

impl Vars {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with the given pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<BindValue>,
    {
        let vars = Self::new();
        for (key, value) in pairs {
            vars.set(key, value);
        }
        vars
    }

    // A panic while holding the lock cannot leave the map half-written, so a
    // poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, BindValue>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, BindValue>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `value` under `key` and return the `@key` parameter token.
    ///
    /// An empty key stores nothing and returns an empty token.
    pub fn set(&self, key: impl Into<String>, value: impl Into<BindValue>) -> String {
        let key = key.into();
        if key.is_empty() {
            return String::new();
        }
        let token = format!("@{key}");
        self.write().insert(key, value.into());
        token
    }

    pub fn get(&self, key: &str) -> Option<BindValue> {
        self.read().get(key).cloned()
    }

    pub fn has(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn del(&self, key: &str) {
        self.write().remove(key);
    }

    /// Render the value at `key`; list elements are joined with `sep`.
    pub fn join(&self, key: &str, sep: &str) -> String {
        match self.read().get(key) {
            None => String::new(),
            Some(BindValue::List(items)) => items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(sep),
            Some(value) => value.to_string(),
        }
    }

    /// Append to the list at `key`, creating it when absent.
    ///
    /// Returns false, leaving the store unchanged, when `key` holds a non-list.
    pub fn append(&self, key: impl Into<String>, value: impl Into<BindValue>) -> bool {
        let key = key.into();
        if key.is_empty() {
            return false;
        }
        let mut entries = self.write();
        match entries
            .entry(key)
            .or_insert_with(|| BindValue::List(Vec::new()))
        {
            BindValue::List(items) => {
                items.push(value.into());
                true
            }
            _ => false,
        }
    }

    /// Copy every entry into a new, independent store and overlay `pairs`.
    pub fn fork<K, V>(&self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<BindValue>,
    {
        let mut entries = self.read().clone();
        for (key, value) in pairs {
            let key = key.into();
            if !key.is_empty() {
                entries.insert(key, value.into());
            }
        }
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Sorted list of keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Clone for Vars {
    fn clone(&self) -> Self {
        self.fork(std::iter::empty::<(String, BindValue)>())
    }
}
