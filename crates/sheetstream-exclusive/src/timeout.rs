//! Feature-aware timeout table.

use std::collections::HashMap;
use std::time::Duration;

use sheetstream_config::ExclusiveConfig;

/// Normalise a feature name: lowercase, alphanumerics only.
///
/// `"Deep Research"`, `"deep-research"` and `"DeepResearch"` all map to
/// `"deepresearch"`.
pub fn normalize_feature(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Timeout lookup keyed by normalised feature name.
#[derive(Debug, Clone)]
pub struct TimeoutTable {
    default: Duration,
    entries: HashMap<String, Duration>,
}

impl TimeoutTable {
    pub fn new(default: Duration) -> Self {
        Self {
            default,
            entries: HashMap::new(),
        }
    }

    pub fn from_config(config: &ExclusiveConfig) -> Self {
        let mut table = Self::new(Duration::from_secs(config.default_timeout_secs));
        for (feature, secs) in &config.timeouts {
            table.insert(feature, Duration::from_secs(*secs));
        }
        table
    }

    pub fn insert(&mut self, feature: &str, timeout: Duration) {
        let key = normalize_feature(feature);
        if !key.is_empty() {
            self.entries.insert(key, timeout);
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default
    }

    /// Timeout for a feature.
    ///
    /// Exact normalised match first; otherwise the longest table key the
    /// feature contains (so `"Deep Research (o3)"` still resolves); otherwise
    /// the default.
    pub fn lookup(&self, feature: Option<&str>) -> Duration {
        let Some(feature) = feature else {
            return self.default;
        };
        let key = normalize_feature(feature);
        if key.is_empty() {
            return self.default;
        }
        if let Some(timeout) = self.entries.get(&key) {
            return *timeout;
        }
        self.entries
            .iter()
            .filter(|(k, _)| key.contains(k.as_str()))
            .max_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| b.0.cmp(a.0)))
            .map(|(_, timeout)| *timeout)
            .unwrap_or(self.default)
    }
}

impl Default for TimeoutTable {
    fn default() -> Self {
        Self::from_config(&ExclusiveConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_feature() {
        assert_eq!(normalize_feature("Deep Research"), "deepresearch");
        assert_eq!(normalize_feature("deep-research"), "deepresearch");
        assert_eq!(normalize_feature("  Web_Search "), "websearch");
    }

    #[test]
    fn test_default_table() {
        let table = TimeoutTable::default();
        assert_eq!(table.lookup(None), Duration::from_secs(300));
        assert_eq!(table.lookup(Some("")), Duration::from_secs(300));
        assert_eq!(table.lookup(Some("Deep Research")), Duration::from_secs(2400));
        assert_eq!(table.lookup(Some("Agent")), Duration::from_secs(2400));
        assert_eq!(table.lookup(Some("Canvas")), Duration::from_secs(600));
        assert_eq!(table.lookup(Some("Web Search")), Duration::from_secs(480));
    }

    #[test]
    fn test_unknown_feature_falls_back() {
        let table = TimeoutTable::default();
        assert_eq!(table.lookup(Some("Image generation")), Duration::from_secs(300));
    }

    #[test]
    fn test_contains_match_prefers_longest_key() {
        let mut table = TimeoutTable::new(Duration::from_secs(60));
        table.insert("research", Duration::from_secs(100));
        table.insert("deep research", Duration::from_secs(200));
        assert_eq!(table.lookup(Some("Deep Research (o3)")), Duration::from_secs(200));
    }
}
