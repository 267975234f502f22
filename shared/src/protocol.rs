/// Prefix of configuration keys that describe a monitored service
pub const PORT_PREFIX: &str = "PORT_";

/// Separator between the fields of a service entry
pub const FIELD_SEPARATOR: char = ';';

/// How long a probe result stays cached, in seconds
pub const DEFAULT_STATUS_TTL_SECS: u64 = 1200;

/// Upper bound on a single connect attempt, in milliseconds
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 500;

/// API path prefix
pub const API_PREFIX: &str = "/v1";
