use std::time::Duration;

use serde_json::Value;
use shared::protocol::DEFAULT_STATUS_TTL_SECS;
use shared::types::ServiceDescriptor;

use crate::cache::CacheStore;
use crate::probe::{ProbeTarget, Prober};

const CACHE_NAMESPACE: &str = "service_registry";

/// Answers liveness queries from the cache, probing on a miss or when asked
/// to refresh. Each service has one cache entry shared by "running" and
/// "down" queries.
pub struct StatusMonitor<C, P> {
    cache: C,
    prober: P,
    ttl: Duration,
}

impl<C: CacheStore, P: Prober> StatusMonitor<C, P> {
    pub fn new(cache: C, prober: P) -> Self {
        Self::with_ttl(cache, prober, Duration::from_secs(DEFAULT_STATUS_TTL_SECS))
    }

    pub fn with_ttl(cache: C, prober: P, ttl: Duration) -> Self {
        Self { cache, prober, ttl }
    }

    pub fn is_running(&self, descriptor: &ServiceDescriptor, refresh: bool) -> bool {
        let key = cache_key(&descriptor.key);

        if !refresh {
            if let Some(running) = self.cached(&key) {
                return running;
            }
        }

        let running = self.prober.probe(&ProbeTarget::from_descriptor(descriptor));
        if let Err(e) = self.cache.set_item(&key, &Value::Bool(running), self.ttl) {
            tracing::warn!("Failed to cache status of {}: {}", descriptor.key, e);
        }
        running
    }

    pub fn is_down(&self, descriptor: &ServiceDescriptor, refresh: bool) -> bool {
        !self.is_running(descriptor, refresh)
    }

    /// Cached status, or `None` when absent, expired or unreadable.
    fn cached(&self, key: &str) -> Option<bool> {
        let lookup = self.cache.has_item(key).and_then(|found| {
            if found {
                self.cache.get_item(key)
            } else {
                Ok(None)
            }
        });

        match lookup {
            Ok(value) => value.map(|v| as_flag(&v)),
            Err(e) => {
                tracing::warn!("Cache read for {} failed, probing instead: {}", key, e);
                None
            }
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn prober(&self) -> &P {
        &self.prober
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Cache key for a service; characters outside `[A-Za-z0-9_]` become `_`.
pub fn cache_key(service_key: &str) -> String {
    let sanitized: String = service_key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("{CACHE_NAMESPACE}_status_{sanitized}")
}

fn as_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().map(|n| n != 0).unwrap_or(false),
        Value::String(s) => !matches!(s.as_str(), "" | "0"),
        _ => false,
    }
}
