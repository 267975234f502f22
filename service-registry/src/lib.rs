//! Registry of configured network services and their cached liveness.
//!
//! Services are declared as `PORT_*` settings whose values hold
//! `port;protocol;name;visible;bind_address`. The [`ServiceCatalog`] keeps
//! them in scan order, the [`ServiceRegistry`] adds a selection cursor on top,
//! and the [`StatusMonitor`] answers "is it running" with a socket probe whose
//! result is cached for a fixed TTL.

pub mod cache;
pub mod catalog;
pub mod clock;
pub mod error;
pub mod probe;
pub mod registry;
pub mod settings;
pub mod status;

pub use cache::{CacheStore, MemoryCache};
pub use catalog::ServiceCatalog;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CacheError, RegistryError};
pub use probe::{ProbeTarget, Prober, SocketProber};
pub use registry::ServiceRegistry;
pub use settings::SettingsSource;
pub use status::StatusMonitor;
