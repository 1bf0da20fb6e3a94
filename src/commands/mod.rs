//! Command implementations

pub mod apply;
pub mod dotfiles;
pub mod packages;
pub mod status;

use anyhow::Result;
use declarative::Deadline;
use pkgkit::Registry;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::dotfiles::FsDotfiles;
use crate::paths;

/// Everything a command needs: directories, config and managers
pub struct Env {
    pub plonk_dir: PathBuf,
    pub home_dir: PathBuf,
    pub config: Config,
    pub registry: Registry,
}

impl Env {
    pub fn load() -> Result<Self> {
        let plonk_dir = paths::plonk_dir()?;
        let home_dir = paths::home_dir()?;
        let config = Config::load(&plonk_dir)?;
        let registry = Registry::with_defaults();
        config.validate(&registry.names())?;
        log::debug!("plonk dir: {}", plonk_dir.display());
        Ok(Self {
            plonk_dir,
            home_dir,
            config,
            registry,
        })
    }

    pub fn lock_path(&self) -> PathBuf {
        self.plonk_dir.join(lockfile::LOCK_FILE_NAME)
    }

    pub fn dotfiles(&self) -> Result<FsDotfiles> {
        FsDotfiles::new(&self.plonk_dir, &self.home_dir, &self.config)
    }

    /// Deadline for one whole command
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.config.operation_timeout())
    }

    pub fn display(&self, path: &Path) -> String {
        paths::contract_home(path, &self.home_dir)
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
