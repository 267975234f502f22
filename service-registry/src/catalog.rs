use std::collections::HashMap;
use std::sync::Arc;

use shared::protocol::{FIELD_SEPARATOR, PORT_PREFIX};
use shared::types::ServiceDescriptor;

use crate::error::{RegistryError, RegistryResult};
use crate::settings::SettingsSource;

/// Immutable, ordered set of service descriptors keyed by normalized name.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    services: Vec<Arc<ServiceDescriptor>>,
    index: HashMap<String, usize>,
}

impl ServiceCatalog {
    /// Build the catalog from every `PORT_*` entry of a settings snapshot.
    pub fn from_settings<S: SettingsSource + ?Sized>(source: &S) -> RegistryResult<Self> {
        let mut catalog = Self::default();

        for (name, value) in source.entries() {
            if !is_service_setting(&name) {
                continue;
            }
            let descriptor = parse_entry(&name, &value)?;
            catalog.insert(descriptor);
        }

        tracing::debug!("Loaded {} service descriptors", catalog.len());
        Ok(catalog)
    }

    /// Last write wins; a replaced entry keeps its original position.
    fn insert(&mut self, descriptor: ServiceDescriptor) {
        let descriptor = Arc::new(descriptor);
        match self.index.get(&descriptor.key) {
            Some(&pos) => {
                tracing::debug!("Service {} redefined, replacing earlier entry", descriptor.key);
                self.services[pos] = descriptor;
            }
            None => {
                self.index.insert(descriptor.key.clone(), self.services.len());
                self.services.push(descriptor);
            }
        }
    }

    /// Exact lookup by key, e.g. "PORT_DNS".
    pub fn get(&self, key: &str) -> Option<&Arc<ServiceDescriptor>> {
        self.position(key).map(|pos| &self.services[pos])
    }

    /// Lookup by short name, e.g. "dns".
    pub fn lookup(&self, name: &str) -> Option<&Arc<ServiceDescriptor>> {
        self.get(&normalize_name(name))
    }

    pub(crate) fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub(crate) fn at(&self, pos: usize) -> Option<&Arc<ServiceDescriptor>> {
        self.services.get(pos)
    }

    /// Descriptors in configuration scan order.
    pub fn iter(&self) -> std::slice::Iter<'_, Arc<ServiceDescriptor>> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl<'a> IntoIterator for &'a ServiceCatalog {
    type Item = &'a Arc<ServiceDescriptor>;
    type IntoIter = std::slice::Iter<'a, Arc<ServiceDescriptor>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Map a short service name to its key ("dns" -> "PORT_DNS").
pub fn normalize_name(name: &str) -> String {
    format!("{}{}", PORT_PREFIX, name.to_uppercase())
}

fn is_service_setting(name: &str) -> bool {
    name.len() > PORT_PREFIX.len() && name.starts_with(PORT_PREFIX)
}

/// Parse one `port;protocol;name;visible[;bind_address]` value.
pub fn parse_entry(name: &str, value: &str) -> RegistryResult<ServiceDescriptor> {
    let key = normalize_name(name.strip_prefix(PORT_PREFIX).unwrap_or(name));
    let invalid = |reason: String| RegistryError::Configuration {
        key: key.clone(),
        reason,
    };

    let fields: Vec<&str> = value.split(FIELD_SEPARATOR).collect();
    if fields.len() < 4 {
        return Err(invalid(format!(
            "expected at least 4 fields, found {}",
            fields.len()
        )));
    }

    let port = fields[0]
        .trim()
        .parse::<u16>()
        .map_err(|e| invalid(format!("invalid port {:?}: {}", fields[0], e)))?;

    Ok(ServiceDescriptor {
        port,
        protocol: fields[1].trim().to_lowercase(),
        name: fields[2].to_string(),
        visible: parse_flag(fields[3]),
        bind_address: fields.get(4).map(|s| s.trim().to_string()).unwrap_or_default(),
        key,
    })
}

fn parse_flag(value: &str) -> bool {
    !matches!(value.trim(), "" | "0")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dns_entry() {
        let entry = parse_entry("PORT_DNS", "53;udp;DNS Server;1;0.0.0.0").unwrap();

        assert_eq!(entry.key, "PORT_DNS");
        assert_eq!(entry.short_name(), "DNS");
        assert_eq!(entry.port, 53);
        assert_eq!(entry.protocol, "udp");
        assert_eq!(entry.name, "DNS Server");
        assert!(entry.visible);
        assert_eq!(entry.bind_address, "0.0.0.0");
    }

    #[test]
    fn test_missing_bind_address_is_empty() {
        let entry = parse_entry("PORT_FTP", "21;tcp;FTP;1").unwrap();
        assert_eq!(entry.bind_address, "");
    }

    #[test]
    fn test_too_few_fields_is_configuration_error() {
        let err = parse_entry("PORT_HTTP", "80;tcp;HTTP").unwrap_err();
        match err {
            RegistryError::Configuration { key, .. } => assert_eq!(key, "PORT_HTTP"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_bad_port_is_configuration_error() {
        assert!(matches!(
            parse_entry("PORT_HTTP", "http;tcp;HTTP;1;127.0.0.1"),
            Err(RegistryError::Configuration { .. })
        ));
        assert!(matches!(
            parse_entry("PORT_HTTP", "70000;tcp;HTTP;1;127.0.0.1"),
            Err(RegistryError::Configuration { .. })
        ));
    }

    #[test]
    fn test_visible_flag() {
        assert!(!parse_entry("PORT_A", "1;tcp;A;0").unwrap().visible);
        assert!(!parse_entry("PORT_A", "1;tcp;A;").unwrap().visible);
        assert!(parse_entry("PORT_A", "1;tcp;A;1").unwrap().visible);
        assert!(parse_entry("PORT_A", "1;tcp;A;yes").unwrap().visible);
    }

    #[test]
    fn test_catalog_filters_non_service_settings() {
        let catalog = ServiceCatalog::from_settings(&[
            ("BASE_SERVER_IP", "10.0.0.1"),
            ("PORT_", "1;tcp;Nothing;1"),
            ("PORT_SSH", "22;tcp;SSH;1;127.0.0.1"),
            ("port_http", "80;tcp;HTTP;1"),
        ])
        .unwrap();

        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("PORT_SSH").is_some());
    }

    #[test]
    fn test_catalog_keeps_scan_order() {
        let catalog = ServiceCatalog::from_settings(&[
            ("PORT_SSH", "22;tcp;SSH;1;127.0.0.1"),
            ("PORT_DNS", "53;udp;DNS Server;1;0.0.0.0"),
            ("PORT_HTTP", "80;tcp;HTTP;1;127.0.0.1"),
        ])
        .unwrap();

        let keys: Vec<&str> = catalog.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, ["PORT_SSH", "PORT_DNS", "PORT_HTTP"]);
    }

    #[test]
    fn test_duplicate_keys_last_write_wins() {
        let catalog = ServiceCatalog::from_settings(&[
            ("PORT_dns", "5353;udp;Old DNS;1;127.0.0.1"),
            ("PORT_SSH", "22;tcp;SSH;1;127.0.0.1"),
            ("PORT_DNS", "53;udp;DNS Server;1;0.0.0.0"),
        ])
        .unwrap();

        assert_eq!(catalog.len(), 2);
        let dns = catalog.lookup("dns").unwrap();
        assert_eq!(dns.port, 53);
        assert_eq!(dns.name, "DNS Server");
        assert_eq!(catalog.iter().next().unwrap().key, "PORT_DNS");
    }

    #[test]
    fn test_invalid_entry_fails_whole_catalog() {
        let result = ServiceCatalog::from_settings(&[
            ("PORT_SSH", "22;tcp;SSH;1;127.0.0.1"),
            ("PORT_BROKEN", "22;tcp"),
        ]);
        assert!(matches!(result, Err(RegistryError::Configuration { .. })));
    }

    #[test]
    fn test_lookup_unknown() {
        let catalog = ServiceCatalog::from_settings(&[("PORT_SSH", "22;tcp;SSH;1")]).unwrap();
        assert!(catalog.lookup("ftp").is_none());
        assert!(catalog.get("ssh").is_none());
    }
}
