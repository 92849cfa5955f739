use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding `cleanup.workers`
pub const CLEANUP_WORKERS_ENV: &str = "SCRIPTKIT_CLEANUP_WORKERS";

/// Complete scriptkit configuration (loaded from TOML file)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ScriptkitConfig {
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// Output cleanup configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CleanupConfig {
    /// Worker threads deleting entries within one depth level
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Depth levels with fewer entries than this are deleted on the calling
    /// thread
    #[serde(default = "default_inline_threshold")]
    pub inline_threshold: usize,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            inline_threshold: default_inline_threshold(),
        }
    }
}

fn default_workers() -> usize {
    num_cpus::get().max(1)
}

fn default_inline_threshold() -> usize {
    32
}

impl ScriptkitConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ScriptkitConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config file at the default location, falling back to defaults
    pub fn load_default() -> Result<Self> {
        let mut config = match default_config_path() {
            Some(path) if path.exists() => {
                tracing::debug!("Using config: {}", path.display());
                Self::from_file(&path)?
            }
            _ => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `SCRIPTKIT_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var(CLEANUP_WORKERS_ENV) {
            self.cleanup.workers = value
                .trim()
                .parse()
                .with_context(|| format!("{CLEANUP_WORKERS_ENV} must be a number: {value}"))?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.cleanup.workers == 0 {
            anyhow::bail!("cleanup.workers must be at least 1");
        }
        Ok(())
    }
}

/// `$XDG_CONFIG_HOME/scriptkit/config.toml`, or the platform config dir
pub fn default_config_path() -> Option<PathBuf> {
    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg_config) if !xdg_config.is_empty() => Some(PathBuf::from(xdg_config)),
        _ => dirs::config_dir(),
    };
    base.map(|dir| dir.join("scriptkit").join("config.toml"))
}
