use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::{Error, Result};

fn default_max_concurrent() -> usize {
    3
}

fn default_max_rounds() -> u32 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Maximum tasks in progress at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Hard ceiling on run-loop rounds.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    /// Where the knowledge snapshot lives. Defaults to
    /// `~/.foreman/knowledge.json`.
    pub knowledge_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_rounds: default_max_rounds(),
            knowledge_path: None,
        }
    }
}

impl Config {
    pub fn foreman_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".foreman"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::foreman_dir()?.join("foreman.toml"))
    }

    /// Resolved knowledge snapshot path.
    pub fn knowledge_path(&self) -> Result<PathBuf> {
        match &self.knowledge_path {
            Some(path) => Ok(expand_tilde(path)),
            None => Ok(Self::foreman_dir()?.join("knowledge.json")),
        }
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(&path)?)?;
        debug!(
            max_concurrent = config.max_concurrent,
            max_rounds = config.max_rounds,
            "config loaded"
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let dir = Self::foreman_dir()?;
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        let path = Self::config_path()?;
        fs::write(&path, toml::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "config saved");
        Ok(())
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
