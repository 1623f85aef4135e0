// core/src/settings.rs
use crate::debounce::DEFAULT_DEBOUNCE;
use crate::lookup::{DEFAULT_LOOKUP_TIMEOUT, DEFAULT_LOOKUP_URL};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const LOOKUP_URL_VAR: &str = "DISCUSS_EMBED_LOOKUP_URL";
pub const DEBOUNCE_MS_VAR: &str = "DISCUSS_EMBED_DEBOUNCE_MS";
pub const LOOKUP_TIMEOUT_VAR: &str = "DISCUSS_EMBED_LOOKUP_TIMEOUT_SECS";

/// Runtime knobs shared by the CLI and the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub lookup_url: String,
    pub debounce: Duration,
    pub lookup_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lookup_url: DEFAULT_LOOKUP_URL.to_string(),
            debounce: DEFAULT_DEBOUNCE,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }
}

impl Settings {
    /// Reads overrides from the environment; unset or unparsable values keep
    /// their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let lookup_url = get(LOOKUP_URL_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.lookup_url);

        let debounce = get(DEBOUNCE_MS_VAR)
            .and_then(|v| v.trim().parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.debounce);

        let lookup_timeout = get(LOOKUP_TIMEOUT_VAR)
            .and_then(|v| v.trim().parse().ok())
            .filter(|secs: &u64| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.lookup_timeout);

        Self {
            lookup_url,
            debounce,
            lookup_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(vars: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(settings_from(&[]), Settings::default());
        assert_eq!(Settings::default().debounce, Duration::from_millis(500));
    }

    #[test]
    fn test_overrides() {
        let settings = settings_from(&[
            (LOOKUP_URL_VAR, "http://localhost:3000/api/discussions/categories"),
            (DEBOUNCE_MS_VAR, "250"),
            (LOOKUP_TIMEOUT_VAR, "3"),
        ]);
        assert_eq!(settings.lookup_url, "http://localhost:3000/api/discussions/categories");
        assert_eq!(settings.debounce, Duration::from_millis(250));
        assert_eq!(settings.lookup_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_garbage_falls_back() {
        let settings = settings_from(&[(DEBOUNCE_MS_VAR, "soon"), (LOOKUP_TIMEOUT_VAR, "0")]);
        assert_eq!(settings.debounce, DEFAULT_DEBOUNCE);
        assert_eq!(settings.lookup_timeout, DEFAULT_LOOKUP_TIMEOUT);
    }
}
