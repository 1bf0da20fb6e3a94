//! `cargo install` backend.

use crate::error::{Error, Result};
use crate::manager::{PackageInfo, PackageManager};
use crate::runner;
use declarative::Deadline;
use std::path::{Path, PathBuf};

/// Backend for crates installed with `cargo install`.
pub struct CargoManager {
    cargo_path: Option<PathBuf>,
}

impl Default for CargoManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CargoManager {
    /// Create a backend, locating `cargo` on `PATH` or in `~/.cargo/bin`.
    pub fn new() -> Self {
        let cargo_path = runner::which("cargo").or_else(|| {
            dirs::home_dir()
                .map(|home| home.join(".cargo").join("bin").join("cargo"))
                .filter(|p| runner::is_executable(p))
        });
        Self { cargo_path }
    }

    fn cargo(&self) -> Result<&Path> {
        self.cargo_path
            .as_deref()
            .ok_or_else(|| Error::CommandNotFound {
                program: "cargo".into(),
            })
    }

    fn installed(&self, deadline: &Deadline) -> Result<Vec<(String, String)>> {
        let stdout =
            runner::run_checked("cargo", self.cargo()?, &["install", "--list"], None, deadline)?;
        Ok(parse_install_list(&stdout))
    }
}

impl PackageManager for CargoManager {
    fn name(&self) -> &'static str {
        "cargo"
    }

    fn is_available(&self, _deadline: &Deadline) -> Result<bool> {
        Ok(self.cargo_path.is_some())
    }

    fn list_installed(&self, deadline: &Deadline) -> Result<Vec<String>> {
        Ok(self
            .installed(deadline)?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    fn install(&self, reference: &str, deadline: &Deadline) -> Result<()> {
        let args = ["install", reference];
        runner::run_checked("cargo", self.cargo()?, &args, Some(reference), deadline).map(drop)
    }

    fn uninstall(&self, name: &str, deadline: &Deadline) -> Result<()> {
        runner::run_checked("cargo", self.cargo()?, &["uninstall", name], Some(name), deadline)
            .map(drop)
    }

    fn installed_version(&self, name: &str, deadline: &Deadline) -> Result<Option<String>> {
        Ok(self
            .installed(deadline)?
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, version)| version))
    }

    fn search(&self, query: &str, deadline: &Deadline) -> Result<Vec<String>> {
        let stdout = runner::run_checked(
            "cargo",
            self.cargo()?,
            &["search", query, "--limit", "20"],
            None,
            deadline,
        )?;
        Ok(parse_search(&stdout).into_iter().map(|info| info.name).collect())
    }

    fn info(&self, name: &str, deadline: &Deadline) -> Result<PackageInfo> {
        let stdout = runner::run_checked(
            "cargo",
            self.cargo()?,
            &["search", name, "--limit", "1"],
            Some(name),
            deadline,
        )?;
        let mut info = parse_search(&stdout)
            .into_iter()
            .find(|info| info.name == name)
            .ok_or_else(|| Error::NotFound {
                name: name.to_string(),
            })?;
        info.installed = self.is_installed(name, deadline).unwrap_or(false);
        Ok(info)
    }

    fn supports_upgrade(&self) -> bool {
        true
    }

    /// `cargo install` replaces an installed crate when a newer version exists
    fn upgrade(&self, references: &[&str], deadline: &Deadline) -> Result<()> {
        let mut args = vec!["install"];
        args.extend_from_slice(references);
        runner::run_checked("cargo", self.cargo()?, &args, references.first().copied(), deadline)
            .map(drop)
    }
}

/// Parse `cargo install --list`:
///
/// ```text
/// ripgrep v14.1.0:
///     rg
/// cargo-edit v0.12.2 (https://github.com/killercup/cargo-edit#abc):
///     cargo-add
/// ```
fn parse_install_list(stdout: &str) -> Vec<(String, String)> {
    stdout
        .lines()
        .filter(|line| !line.starts_with(char::is_whitespace) && line.ends_with(':'))
        .filter_map(|line| {
            let mut parts = line.trim_end_matches(':').split_whitespace();
            let name = parts.next()?;
            let version = parts.next().unwrap_or_default().trim_start_matches('v');
            Some((name.to_string(), version.to_string()))
        })
        .collect()
}

/// Parse `cargo search`: `name = "1.2.3"    # description`
fn parse_search(stdout: &str) -> Vec<PackageInfo> {
    stdout
        .lines()
        .filter_map(|line| {
            let (name, rest) = line.split_once(" = ")?;
            let (version, description) = match rest.split_once('#') {
                Some((v, d)) => (v, Some(d.trim().to_string())),
                None => (rest, None),
            };
            Some(PackageInfo {
                name: name.trim().to_string(),
                version: Some(version.trim().trim_matches('"').to_string()),
                description,
                homepage: None,
                installed: false,
            })
        })
        .collect()
}
