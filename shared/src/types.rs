use serde::{Deserialize, Serialize};

use crate::protocol::PORT_PREFIX;

/// A monitored network service, as declared in configuration.
/// This is the canonical data model shared by the registry, the daemon and its API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Normalized configuration key, e.g. "PORT_DNS"
    pub key: String,

    /// Listening port
    pub port: u16,

    /// Connection scheme used when probing, e.g. "tcp" or "udp"
    pub protocol: String,

    /// Human-readable label, e.g. "DNS Server"
    pub name: String,

    /// Whether the service is surfaced to dashboard callers
    pub visible: bool,

    /// Address the service listens on; empty when not configured
    pub bind_address: String,
}

impl ServiceDescriptor {
    /// Key without the `PORT_` prefix, e.g. "DNS"
    pub fn short_name(&self) -> &str {
        self.key.strip_prefix(PORT_PREFIX).unwrap_or(&self.key)
    }
}

/// A descriptor together with its last known liveness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub key: String,
    pub name: String,
    pub protocol: String,
    pub port: u16,
    pub bind_address: String,
    pub visible: bool,
    pub running: bool,
}

impl ServiceStatus {
    pub fn new(descriptor: &ServiceDescriptor, running: bool) -> Self {
        Self {
            key: descriptor.key.clone(),
            name: descriptor.name.clone(),
            protocol: descriptor.protocol.clone(),
            port: descriptor.port,
            bind_address: descriptor.bind_address.clone(),
            visible: descriptor.visible,
            running,
        }
    }
}
