use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::clock::{Clock, SystemClock};
use crate::error::CacheError;

/// Key-value store with per-item expiry.
///
/// Expired items behave exactly like missing ones. Implementations handle
/// their own synchronization; concurrent writers to one key are
/// last-writer-wins.
pub trait CacheStore {
    fn has_item(&self, key: &str) -> Result<bool, CacheError>;

    fn get_item(&self, key: &str) -> Result<Option<Value>, CacheError>;

    fn set_item(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError>;

    /// Drop expired items. Returns how many were removed.
    fn purge_expired(&self) -> Result<u64, CacheError> {
        Ok(0)
    }
}

impl<T: CacheStore + ?Sized> CacheStore for Arc<T> {
    fn has_item(&self, key: &str) -> Result<bool, CacheError> {
        (**self).has_item(key)
    }

    fn get_item(&self, key: &str) -> Result<Option<Value>, CacheError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        (**self).set_item(key, value, ttl)
    }

    fn purge_expired(&self) -> Result<u64, CacheError> {
        (**self).purge_expired()
    }
}

/// Converts a TTL to an absolute expiry, saturating on overflow.
pub fn expires_at(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

struct MemoryItem {
    value: Value,
    expires_at: DateTime<Utc>,
}

/// Process-local cache store.
pub struct MemoryCache {
    items: Mutex<HashMap<String, MemoryItem>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryCache {
    fn has_item(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get_item(key)?.is_some())
    }

    fn get_item(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let now = self.clock.now();
        let items = self.items.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(items
            .get(key)
            .filter(|item| item.expires_at > now)
            .map(|item| item.value.clone()))
    }

    fn set_item(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        let item = MemoryItem {
            value: value.clone(),
            expires_at: expires_at(self.clock.now(), ttl),
        };
        self.items
            .lock()
            .map_err(|_| CacheError::Poisoned)?
            .insert(key.to_string(), item);
        Ok(())
    }

    fn purge_expired(&self) -> Result<u64, CacheError> {
        let now = self.clock.now();
        let mut items = self.items.lock().map_err(|_| CacheError::Poisoned)?;
        let before = items.len();
        items.retain(|_, item| item.expires_at > now);
        Ok((before - items.len()) as u64)
    }
}
