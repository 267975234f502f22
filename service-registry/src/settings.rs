/// A snapshot of configuration key/value pairs.
///
/// Entries are returned in the order the source scans them; later entries win
/// when the same service key appears twice.
pub trait SettingsSource {
    fn entries(&self) -> Vec<(String, String)>;
}

impl SettingsSource for [(String, String)] {
    fn entries(&self) -> Vec<(String, String)> {
        self.to_vec()
    }
}

impl SettingsSource for Vec<(String, String)> {
    fn entries(&self) -> Vec<(String, String)> {
        self.clone()
    }
}

impl SettingsSource for [(&str, &str)] {
    fn entries(&self) -> Vec<(String, String)> {
        self.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

impl<const N: usize> SettingsSource for [(&str, &str); N] {
    fn entries(&self) -> Vec<(String, String)> {
        self.as_slice().entries()
    }
}
