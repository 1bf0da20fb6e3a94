//! `plonk.yaml` configuration
//!
//! Every key is optional; a missing file means all defaults.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::paths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Manager used when `install` gets no `manager:` prefix
    pub default_manager: String,
    /// Seconds allowed for a whole command
    pub operation_timeout: u64,
    /// Seconds allowed for the package domain
    pub package_timeout: u64,
    /// Seconds allowed for the dotfile domain
    pub dotfile_timeout: u64,
    /// Home-relative directories whose first-level entries are tracked individually
    pub expand_directories: Vec<String>,
    /// Names and globs never treated as dotfiles
    pub ignore_patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_manager: "brew".to_string(),
            operation_timeout: 300,
            package_timeout: 180,
            dotfile_timeout: 60,
            expand_directories: vec![".config".to_string()],
            ignore_patterns: [
                ".DS_Store",
                ".git",
                "*.swp",
                "*.swo",
                "*~",
                "*.tmp",
                ".cache",
                ".ssh",
                ".gnupg",
                "*.log",
                ".Trash",
                "node_modules",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        }
    }
}

impl Config {
    /// Load `plonk.yaml` from the plonk directory, defaults if absent
    pub fn load(plonk_dir: &Path) -> Result<Self> {
        let path = paths::config_file(plonk_dir);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Could not read {}", path.display()));
            }
        };
        Self::parse(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Reject settings that would make every operation fail
    pub fn validate(&self, known_managers: &[&str]) -> Result<()> {
        for (key, value) in [
            ("operation_timeout", self.operation_timeout),
            ("package_timeout", self.package_timeout),
            ("dotfile_timeout", self.dotfile_timeout),
        ] {
            if value == 0 {
                bail!("{key} must be greater than zero");
            }
        }
        if !known_managers.contains(&self.default_manager.as_str()) {
            bail!(
                "default_manager '{}' is not supported (available: {})",
                self.default_manager,
                known_managers.join(", ")
            );
        }
        Ok(())
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout)
    }

    pub fn package_timeout(&self) -> Duration {
        Duration::from_secs(self.package_timeout)
    }

    pub fn dotfile_timeout(&self) -> Duration {
        Duration::from_secs(self.dotfile_timeout)
    }
}
