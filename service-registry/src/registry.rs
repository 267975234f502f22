use std::sync::Arc;

use shared::types::ServiceDescriptor;

use crate::cache::CacheStore;
use crate::catalog::{normalize_name, ServiceCatalog};
use crate::error::{RegistryError, RegistryResult};
use crate::probe::Prober;
use crate::settings::SettingsSource;
use crate::status::StatusMonitor;

/// Service catalog with a selection cursor and cached liveness queries.
///
/// One service is "selected" at a time. Property and status queries act on
/// the selection, and stepping through the services with
/// [`Iterator::next`] moves the selection along, so queries
/// made during a traversal describe the service just visited. Use
/// [`catalog`](Self::catalog) and [`monitor`](Self::monitor) directly for
/// cursor-free access.
pub struct ServiceRegistry<C, P> {
    catalog: ServiceCatalog,
    monitor: StatusMonitor<C, P>,
    selected: Option<usize>,
    position: usize,
}

impl<C: CacheStore, P: Prober> ServiceRegistry<C, P> {
    /// Load services from a settings snapshot.
    pub fn new<S: SettingsSource + ?Sized>(source: &S, cache: C, prober: P) -> RegistryResult<Self> {
        let catalog = ServiceCatalog::from_settings(source)?;
        Ok(Self::with_monitor(catalog, StatusMonitor::new(cache, prober)))
    }

    pub fn with_monitor(catalog: ServiceCatalog, monitor: StatusMonitor<C, P>) -> Self {
        Self {
            catalog,
            monitor,
            selected: None,
            position: 0,
        }
    }

    /// Select a service by short name ("dns" selects "PORT_DNS").
    pub fn select(&mut self, name: &str) -> RegistryResult<Arc<ServiceDescriptor>> {
        self.select_key(&normalize_name(name))
    }

    /// Select a service by its exact key.
    pub fn select_key(&mut self, key: &str) -> RegistryResult<Arc<ServiceDescriptor>> {
        let pos = self
            .catalog
            .position(key)
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))?;
        self.selected = Some(pos);
        self.selected()
    }

    /// The currently selected descriptor.
    pub fn selected(&self) -> RegistryResult<Arc<ServiceDescriptor>> {
        self.current().cloned()
    }

    fn current(&self) -> RegistryResult<&Arc<ServiceDescriptor>> {
        self.selected
            .and_then(|pos| self.catalog.at(pos))
            .ok_or(RegistryError::NoSelection)
    }

    pub fn port(&self) -> RegistryResult<u16> {
        Ok(self.current()?.port)
    }

    pub fn protocol(&self) -> RegistryResult<&str> {
        Ok(self.current()?.protocol.as_str())
    }

    pub fn name(&self) -> RegistryResult<&str> {
        Ok(self.current()?.name.as_str())
    }

    pub fn bind_address(&self) -> RegistryResult<&str> {
        Ok(self.current()?.bind_address.as_str())
    }

    pub fn is_visible(&self) -> RegistryResult<bool> {
        Ok(self.current()?.visible)
    }

    /// Whether the selected service answers, using the cached result unless
    /// `refresh` is set.
    pub fn is_running(&self, refresh: bool) -> RegistryResult<bool> {
        let descriptor = self.current()?;
        Ok(self.monitor.is_running(descriptor, refresh))
    }

    pub fn is_down(&self, refresh: bool) -> RegistryResult<bool> {
        Ok(!self.is_running(refresh)?)
    }

    /// Restart the traversal at the first service.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    pub fn monitor(&self) -> &StatusMonitor<C, P> {
        &self.monitor
    }
}

/// Steps through the services in scan order, selecting each one as it is
/// yielded. The traversal ends after the last service until
/// [`rewind`](ServiceRegistry::rewind) is called.
impl<C, P> Iterator for ServiceRegistry<C, P> {
    type Item = Arc<ServiceDescriptor>;

    fn next(&mut self) -> Option<Self::Item> {
        let descriptor = self.catalog.at(self.position)?.clone();
        self.selected = Some(self.position);
        self.position += 1;
        Some(descriptor)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.catalog.len().saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::probe::ProbeTarget;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports a service as running when its port is even.
    #[derive(Default)]
    struct EvenPortProber {
        calls: AtomicUsize,
    }

    impl Prober for EvenPortProber {
        fn probe(&self, target: &ProbeTarget) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            target.port % 2 == 0
        }
    }

    const SETTINGS: [(&str, &str); 5] = [
        ("PORT_SSH", "22;tcp;SSH;1;127.0.0.1"),
        ("PORT_DNS", "53;udp;DNS Server;1;0.0.0.0"),
        ("DATABASE_NAME", "panel"),
        ("PORT_HTTP", "80;tcp;HTTP;0;::1"),
        ("PORT_IMAP", "143;tcp;IMAP;1"),
    ];

    fn registry() -> ServiceRegistry<MemoryCache, Arc<EvenPortProber>> {
        ServiceRegistry::new(&SETTINGS, MemoryCache::new(), Arc::new(EvenPortProber::default())).unwrap()
    }

    #[test]
    fn test_count_matches_distinct_keys() {
        let registry = registry();
        assert_eq!(registry.len(), 4);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_select_short_name() {
        let mut registry = registry();

        let dns = registry.select("dns").unwrap();
        assert_eq!(dns.key, "PORT_DNS");
        assert_eq!(registry.port().unwrap(), 53);
        assert_eq!(registry.protocol().unwrap(), "udp");
        assert_eq!(registry.name().unwrap(), "DNS Server");
        assert_eq!(registry.bind_address().unwrap(), "0.0.0.0");
        assert!(registry.is_visible().unwrap());
    }

    #[test]
    fn test_select_key_is_exact() {
        let mut registry = registry();

        assert_eq!(registry.select_key("PORT_HTTP").unwrap().port, 80);
        assert!(matches!(
            registry.select_key("http"),
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            registry.select_key("PORT_http"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_unknown_name_keeps_previous_selection() {
        let mut registry = registry();
        registry.select("ssh").unwrap();

        let err = registry.select("ftp").unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(ref key) if key == "PORT_FTP"));
        assert_eq!(registry.port().unwrap(), 22);
    }

    #[test]
    fn test_queries_without_selection_fail() {
        let registry = registry();

        assert!(matches!(registry.port(), Err(RegistryError::NoSelection)));
        assert!(matches!(registry.protocol(), Err(RegistryError::NoSelection)));
        assert!(matches!(registry.name(), Err(RegistryError::NoSelection)));
        assert!(matches!(registry.bind_address(), Err(RegistryError::NoSelection)));
        assert!(matches!(registry.is_visible(), Err(RegistryError::NoSelection)));
        assert!(matches!(registry.is_running(false), Err(RegistryError::NoSelection)));
        assert!(matches!(registry.is_down(true), Err(RegistryError::NoSelection)));
        assert_eq!(registry.monitor().prober().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_traversal_selects_each_service() {
        let mut registry = registry();
        let mut visited = Vec::new();

        registry.rewind();
        while let Some(descriptor) = registry.next() {
            let port = registry.port().unwrap();
            let protocol = registry.protocol().unwrap().to_string();
            assert_eq!(port, descriptor.port);
            visited.push((descriptor.key.clone(), port, protocol));
        }

        assert_eq!(visited.len(), registry.len());
        for (key, port, protocol) in visited {
            registry.select_key(&key).unwrap();
            assert_eq!(registry.port().unwrap(), port);
            assert_eq!(registry.protocol().unwrap(), protocol);
        }
    }

    #[test]
    fn test_traversal_is_restartable() {
        let mut registry = registry();

        let first: Vec<String> = registry.by_ref().map(|d| d.key.clone()).collect();
        assert!(registry.next().is_none());
        assert_eq!(registry.size_hint(), (0, Some(0)));

        registry.rewind();
        assert_eq!(registry.size_hint(), (4, Some(4)));
        let second: Vec<String> = registry.by_ref().map(|d| d.key.clone()).collect();

        assert_eq!(first, ["PORT_SSH", "PORT_DNS", "PORT_HTTP", "PORT_IMAP"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_status_of_selected_service() {
        let mut registry = registry();

        registry.select("ssh").unwrap();
        assert!(registry.is_running(false).unwrap());
        assert!(!registry.is_down(false).unwrap());

        registry.select("dns").unwrap();
        assert!(!registry.is_running(false).unwrap());
        assert!(registry.is_down(false).unwrap());

        assert_eq!(registry.monitor().prober().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_status_during_traversal() {
        let mut registry = registry();
        let mut running = Vec::new();

        while let Some(descriptor) = registry.next() {
            if registry.is_running(false).unwrap() {
                running.push(descriptor.key.clone());
            }
        }

        assert_eq!(running, ["PORT_SSH", "PORT_HTTP"]);
    }

    #[test]
    fn test_empty_registry() {
        let settings: Vec<(String, String)> = Vec::new();
        let mut registry =
            ServiceRegistry::new(&settings, MemoryCache::new(), Arc::new(EvenPortProber::default())).unwrap();

        assert!(registry.is_empty());
        assert!(registry.next().is_none());
        assert!(matches!(registry.select("dns"), Err(RegistryError::NotFound(_))));
    }
}
