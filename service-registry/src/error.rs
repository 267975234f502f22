use thiserror::Error;

/// Errors returned by [`ServiceCatalog`](crate::ServiceCatalog) and
/// [`ServiceRegistry`](crate::ServiceRegistry) operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A `PORT_*` entry could not be parsed.
    #[error("Invalid service entry {key}: {reason}")]
    Configuration { key: String, reason: String },

    /// No descriptor exists for the requested name.
    #[error("Unknown service: {0}")]
    NotFound(String),

    /// A property or status was queried before any service was selected.
    #[error("Name of service to query is not set")]
    NoSelection,
}

/// Failures of a [`CacheStore`](crate::CacheStore) backend.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache lock poisoned")]
    Poisoned,

    #[error("cache value serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("cache backend error: {0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
