//! Runtime configuration
//!
//! Defaults can be overridden from the environment:
//! - `SLANG_STRICT_WORDS=1`: unresolved words fail instead of pushing `nil`
//! - `SLANG_MAX_TURNS=N`: abort an evaluation after N scheduler turns
//!
//! Hosts layer their own sources (config files, flags) on top of
//! [`RuntimeConfig::from_env`]. The active configuration is thread-local,
//! like the scheduler it governs.

use serde::Deserialize;
use std::cell::RefCell;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Fail fast on unresolved words instead of pushing the `nil` sentinel
    pub strict_words: bool,

    /// Upper bound on scheduler turns per evaluation (`None` = unbounded)
    pub max_turns: Option<u64>,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict_words(mut self, strict: bool) -> Self {
        self.strict_words = strict;
        self
    }

    pub fn with_max_turns(mut self, max_turns: Option<u64>) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Defaults overridden by `SLANG_*` environment variables
    pub fn from_env() -> Self {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an environment lookup. Invalid values are warned
    /// about and ignored.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = lookup("SLANG_STRICT_WORDS") {
            match parse_flag(&val) {
                Some(flag) => self.strict_words = flag,
                None => tracing::warn!(
                    "SLANG_STRICT_WORDS='{}' is not a boolean, keeping {}",
                    val,
                    self.strict_words
                ),
            }
        }

        if let Some(val) = lookup("SLANG_MAX_TURNS") {
            match val.parse::<u64>() {
                Ok(0) => tracing::warn!("SLANG_MAX_TURNS=0 is invalid, leaving turns unbounded"),
                Ok(n) => self.max_turns = Some(n),
                Err(_) => tracing::warn!("SLANG_MAX_TURNS='{}' is not a valid number, ignoring", val),
            }
        }

        self
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

thread_local! {
    static ACTIVE: RefCell<RuntimeConfig> = RefCell::new(RuntimeConfig::default());
}

/// Make `config` the active configuration for this thread
pub fn install(config: RuntimeConfig) {
    ACTIVE.with(|c| *c.borrow_mut() = config);
}

pub fn strict_words() -> bool {
    ACTIVE.with(|c| c.borrow().strict_words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let config = RuntimeConfig::default()
            .apply_env(env_of(&[("SLANG_STRICT_WORDS", "yes"), ("SLANG_MAX_TURNS", "500")]));
        assert!(config.strict_words);
        assert_eq!(config.max_turns, Some(500));
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let base = RuntimeConfig::new().with_max_turns(Some(10));
        let config = base
            .clone()
            .apply_env(env_of(&[("SLANG_STRICT_WORDS", "maybe"), ("SLANG_MAX_TURNS", "0")]));
        assert_eq!(config, base);

        let config = RuntimeConfig::default().apply_env(env_of(&[("SLANG_MAX_TURNS", "lots")]));
        assert_eq!(config.max_turns, None);
    }

    #[test]
    fn test_install_is_thread_local() {
        install(RuntimeConfig::new().with_strict_words(true));
        assert!(strict_words());

        let other = std::thread::spawn(strict_words).join().unwrap();
        assert!(!other);

        install(RuntimeConfig::default());
        assert!(!strict_words());
    }
}
