//! # DogRS Configuration
//!
//! A minimal string key/value store, mirroring Feathers' `app.set()` /
//! `app.get()`. Typed option structs elsewhere in the workspace
//! (`GateOptions`, `DemuxConfig`) read their overrides from a
//! [`DogConfigSnapshot`].
//!
//! ```rust
//! use std::time::Duration;
//! use dog_core::DogConfig;
//!
//! let mut config = DogConfig::new();
//! config.set("demux.timeout", "2s");
//! config.set("gate.headers.tenant_id", "x-tenant");
//!
//! let snapshot = config.snapshot();
//! assert_eq!(snapshot.get_duration("demux.timeout"), Some(Duration::from_secs(2)));
//! ```
//!
//! ## Environment overrides
//! `load_env("DOG__")` maps `DOG__DEMUX__TIMEOUT=5s` to `demux.timeout`.

use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct DogConfig {
    values: HashMap<String, String>,
}

impl DogConfig {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Import every environment variable starting with `prefix`.
    pub fn load_env(&mut self, prefix: &str) {
        self.load_vars(prefix, std::env::vars());
    }

    fn load_vars<I>(&mut self, prefix: &str, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                self.set(normalized, value);
            }
        }
    }

    pub fn snapshot(&self) -> DogConfigSnapshot {
        DogConfigSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DogConfigSnapshot {
    map: HashMap<String, String>,
}

impl DogConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.parse::<usize>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.parse::<bool>().ok())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.parse::<f64>().ok())
    }

    /// Human-readable durations (`250ms`, `2s`, `1m 30s`).
    pub fn get_duration(&self, key: &str) -> Option<Duration> {
        self.get(key)
            .and_then(|v| humantime::parse_duration(v.trim()).ok())
    }

    /// Comma separated list, blanks dropped.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_are_normalized() {
        let mut config = DogConfig::new();
        config.load_vars(
            "DOG__",
            vec![
                ("DOG__DEMUX__TIMEOUT".to_string(), "5s".to_string()),
                ("OTHER__KEY".to_string(), "x".to_string()),
            ],
        );
        assert_eq!(config.get("demux.timeout"), Some("5s"));
        assert!(!config.has("other.key"));
    }

    #[test]
    fn snapshot_typed_getters() {
        let mut config = DogConfig::new();
        config.set("demux.poll.initial", "250ms");
        config.set("demux.poll.multiplier", "1.5");
        config.set("gate.jwt.audience", "web-rest, , admin");
        config.set("gate.enabled", "true");
        config.set("bad", "soon");

        let snap = config.snapshot();
        assert_eq!(snap.get_duration("demux.poll.initial"), Some(Duration::from_millis(250)));
        assert_eq!(snap.get_f64("demux.poll.multiplier"), Some(1.5));
        assert_eq!(
            snap.get_list("gate.jwt.audience"),
            Some(vec!["web-rest".to_string(), "admin".to_string()])
        );
        assert_eq!(snap.get_bool("gate.enabled"), Some(true));
        assert_eq!(snap.get_duration("bad"), None);
    }
}
