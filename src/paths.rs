//! Centralized path resolution for plonk
//!
//! # Environment Variables
//!
//! - `PLONK_DIR` - Override the plonk directory (config, lock, dotfile sources)
//!
//! # Path Resolution Priority
//!
//! For plonk_dir():
//! 1. `PLONK_DIR` environment variable (tilde expanded)
//! 2. `XDG_CONFIG_HOME/plonk` (if set)
//! 3. `~/.config/plonk`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for plonk directory override
pub const ENV_PLONK_DIR: &str = "PLONK_DIR";

/// Config file name inside the plonk directory
pub const CONFIG_FILE_NAME: &str = "plonk.yaml";

/// Get the plonk directory path
pub fn plonk_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_PLONK_DIR)
        && !dir.is_empty()
    {
        let path = expand_path(&dir);
        log::debug!("Using plonk dir from {}: {}", ENV_PLONK_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        let path = PathBuf::from(xdg_config).join("plonk");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    Ok(home_dir()?.join(".config").join("plonk"))
}

/// Get the user's home directory
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("Could not determine home directory")
}

/// Get the config file path
pub fn config_file(plonk_dir: &Path) -> PathBuf {
    plonk_dir.join(CONFIG_FILE_NAME)
}

/// Expand `~` and environment variables in a path
pub fn expand_path(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).map_or_else(
        |_| shellexpand::tilde(path).into_owned(),
        std::borrow::Cow::into_owned,
    );
    PathBuf::from(expanded)
}

/// Replace the home directory prefix with `~` for display
pub fn contract_home(path: &Path, home: &Path) -> String {
    match path.strip_prefix(home) {
        Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Ok(rest) => format!("~/{}", rest.display()),
        Err(_) => path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_path_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_path("~/dotfiles"), home.join("dotfiles"));
        assert_eq!(expand_path("/abs/path"), PathBuf::from("/abs/path"));
    }

    #[test]
    fn test_contract_home() {
        let home = Path::new("/home/u");
        assert_eq!(contract_home(Path::new("/home/u/.zshrc"), home), "~/.zshrc");
        assert_eq!(contract_home(Path::new("/home/u"), home), "~");
        assert_eq!(contract_home(Path::new("/etc/hosts"), home), "/etc/hosts");
    }

    #[test]
    fn test_config_file() {
        assert_eq!(
            config_file(Path::new("/p")),
            PathBuf::from("/p/plonk.yaml")
        );
    }
}
