use serde::Serialize;
use sha2::{Sha256, Digest};
use shared::types::ServiceStatus;

/// Fields that identify what a dashboard shows for one service.
#[derive(Serialize)]
struct HashView<'a> {
    key: &'a str,
    name: &'a str,
    protocol: &'a str,
    port: u16,
    bind_address: &'a str,
    running: bool,
}

/// Computes a SHA-256 hash of a status list.
/// Statuses are sorted by key for deterministic output.
pub fn compute_hash(statuses: &[ServiceStatus]) -> String {
    let mut views: Vec<HashView<'_>> = statuses
        .iter()
        .map(|s| HashView {
            key: &s.key,
            name: &s.name,
            protocol: &s.protocol,
            port: s.port,
            bind_address: &s.bind_address,
            running: s.running,
        })
        .collect();
    views.sort_by(|a, b| a.key.cmp(b.key));

    let mut hasher = Sha256::new();
    for view in &views {
        // HashView holds only strings, integers and booleans
        if let Ok(line) = serde_json::to_vec(view) {
            hasher.update(&line);
        }
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
