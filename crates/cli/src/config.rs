//! Configuration layering for the `slang` host
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. `SLANG_*` environment variables
//! 3. a TOML file passed with `--config`
//! 4. command-line flags
//!
//! ```toml
//! strict_words = true
//! max_turns = 1_000_000
//! ```

use serde::Deserialize;
use slang_runtime::RuntimeConfig;
use std::fs;
use std::path::Path;

/// The file layer. Every key is optional so an absent key leaves the lower
/// layers alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub strict_words: Option<bool>,
    pub max_turns: Option<u64>,
}

impl ConfigFile {
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("invalid config: {}", e))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("could not read {}: {}", path.display(), e))?;
        Self::from_toml(&content).map_err(|e| format!("{}: {}", path.display(), e))
    }

    /// Overlay this file onto `base`
    pub fn apply(&self, mut base: RuntimeConfig) -> RuntimeConfig {
        if let Some(strict) = self.strict_words {
            base.strict_words = strict;
        }
        if let Some(max_turns) = self.max_turns {
            base.max_turns = (max_turns > 0).then_some(max_turns);
        }
        base
    }
}

/// Command-line overrides
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub strict: bool,
    pub max_turns: Option<u64>,
}

/// Resolve the effective configuration from every layer
pub fn resolve(config_path: Option<&Path>, overrides: Overrides) -> Result<RuntimeConfig, String> {
    let mut config = RuntimeConfig::from_env();
    if let Some(path) = config_path {
        config = ConfigFile::load(path)?.apply(config);
    }
    if overrides.strict {
        config.strict_words = true;
    }
    if let Some(max_turns) = overrides.max_turns {
        config.max_turns = Some(max_turns);
    }
    tracing::debug!(?config, "resolved runtime configuration");
    Ok(config)
}
