//! # Configuration
//!
//! A minimal string key/value store. Components read their settings from a
//! [`NudgeConfigSnapshot`] and fall back to their own defaults, so a process
//! can layer configuration however it likes.
//!
//! ```rust
//! use nudge_core::NudgeConfig;
//! let mut config = NudgeConfig::new();
//!
//! config.set("queue.concurrency", "4");
//! assert_eq!(config.snapshot().get_usize("queue.concurrency"), Some(4));
//! ```
//!
//! ## Environment overrides
//! [`NudgeConfig::load_env`] maps `PREFIX__QUEUE__CONCURRENCY=4` to
//! `queue.concurrency = 4`.

use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct NudgeConfig {
    values: HashMap<String, String>,
}

impl NudgeConfig {
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

    /// Import every environment variable named `{prefix}__...`.
    pub fn load_env(&mut self, prefix: &str) {
        self.load_vars(std::env::vars(), prefix);
    }

    /// Same as [`load_env`](Self::load_env) over an explicit variable list.
    pub fn load_vars<I>(&mut self, vars: I, prefix: &str)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let prefix = format!("{}__", prefix);
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(&prefix) {
                let normalized = stripped
                    .to_lowercase()
                    .replace("__", "."); // NUDGE__QUEUE__CONCURRENCY -> queue.concurrency

                if !normalized.is_empty() {
                    self.set(normalized, value);
                }
            }
        }
    }

    pub fn snapshot(&self) -> NudgeConfigSnapshot {
        NudgeConfigSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct NudgeConfigSnapshot {
    map: HashMap<String, String>,
}

impl NudgeConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(|v| v.trim().parse::<u32>().ok())
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse::<usize>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.trim().parse::<bool>().ok())
    }
}
