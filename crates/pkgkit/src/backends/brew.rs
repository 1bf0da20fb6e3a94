//! Homebrew backend.

use crate::error::{Error, Result};
use crate::manager::{PackageInfo, PackageManager};
use crate::runner;
use declarative::Deadline;
use std::path::{Path, PathBuf};

/// Backend that executes `brew` commands.
pub struct BrewManager {
    /// Path to the brew executable, if found
    brew_path: Option<PathBuf>,
}

impl Default for BrewManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BrewManager {
    /// Create a backend, locating `brew` if it is installed.
    pub fn new() -> Self {
        Self {
            brew_path: find_brew(),
        }
    }

    fn brew(&self) -> Result<&Path> {
        self.brew_path
            .as_deref()
            .ok_or_else(|| Error::CommandNotFound {
                program: "brew".into(),
            })
    }

    fn run_checked(
        &self,
        args: &[&str],
        package: Option<&str>,
        deadline: &Deadline,
    ) -> Result<String> {
        runner::run_checked("brew", self.brew()?, args, package, deadline)
    }
}

impl PackageManager for BrewManager {
    fn name(&self) -> &'static str {
        "brew"
    }

    fn is_available(&self, _deadline: &Deadline) -> Result<bool> {
        Ok(self.brew_path.is_some())
    }

    fn list_installed(&self, deadline: &Deadline) -> Result<Vec<String>> {
        let stdout = self.run_checked(&["list", "-1"], None, deadline)?;
        Ok(parse_list(&stdout))
    }

    fn install(&self, reference: &str, deadline: &Deadline) -> Result<()> {
        match self.run_checked(&["install", reference], Some(reference), deadline) {
            Err(e) if e.is_ignorable() => {
                log::debug!("brew: {reference} already installed");
                Ok(())
            }
            other => other.map(drop),
        }
    }

    fn uninstall(&self, name: &str, deadline: &Deadline) -> Result<()> {
        self.run_checked(&["uninstall", name], Some(name), deadline)
            .map(drop)
    }

    fn installed_version(&self, name: &str, deadline: &Deadline) -> Result<Option<String>> {
        let output = runner::run(self.brew()?, &["list", "--versions", name], deadline)?;
        if !output.success {
            return Ok(None);
        }
        Ok(parse_versions_line(&output.stdout))
    }

    fn search(&self, query: &str, deadline: &Deadline) -> Result<Vec<String>> {
        let stdout = self.run_checked(&["search", query], None, deadline)?;
        Ok(parse_list(&stdout))
    }

    fn info(&self, name: &str, deadline: &Deadline) -> Result<PackageInfo> {
        let stdout = self.run_checked(&["info", "--json=v2", name], Some(name), deadline)?;
        parse_info(name, &stdout)
    }

    fn supports_upgrade(&self) -> bool {
        true
    }

    fn upgrade(&self, references: &[&str], deadline: &Deadline) -> Result<()> {
        let mut args = vec!["upgrade"];
        args.extend_from_slice(references);
        self.run_checked(&args, references.first().copied(), deadline)
            .map(drop)
    }
}

fn find_brew() -> Option<PathBuf> {
    // Check common locations
    let paths = [
        "/opt/homebrew/bin/brew",              // Apple Silicon
        "/usr/local/bin/brew",                 // Intel
        "/home/linuxbrew/.linuxbrew/bin/brew", // Linux
    ];

    paths
        .iter()
        .map(PathBuf::from)
        .find(|p| runner::is_executable(p))
        .or_else(|| runner::which("brew"))
}

/// One name per line; section headers (`==> Formulae`) are skipped.
fn parse_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("==>"))
        .map(String::from)
        .collect()
}

/// `jq 1.6 1.7.1` -> newest (last) version
fn parse_versions_line(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().skip(1).last())
        .map(String::from)
}

/// Parse `brew info --json=v2` for a formula or cask.
fn parse_info(name: &str, stdout: &str) -> Result<PackageInfo> {
    let json: serde_json::Value = serde_json::from_str(stdout)?;

    if let Some(formula) = json["formulae"].as_array().and_then(|a| a.first()) {
        return Ok(PackageInfo {
            name: formula["name"].as_str().unwrap_or(name).to_string(),
            version: formula["versions"]["stable"].as_str().map(String::from),
            description: formula["desc"].as_str().map(String::from),
            homepage: formula["homepage"].as_str().map(String::from),
            installed: formula["installed"]
                .as_array()
                .is_some_and(|a| !a.is_empty()),
        });
    }

    if let Some(cask) = json["casks"].as_array().and_then(|a| a.first()) {
        return Ok(PackageInfo {
            name: cask["token"].as_str().unwrap_or(name).to_string(),
            version: cask["version"].as_str().map(String::from),
            description: cask["desc"].as_str().map(String::from),
            homepage: cask["homepage"].as_str().map(String::from),
            installed: cask["installed"].as_str().is_some(),
        });
    }

    Err(Error::NotFound {
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_skips_headers() {
        let out = "==> Formulae\njq\nripgrep\n\n==> Casks\nfirefox\n";
        assert_eq!(parse_list(out), vec!["jq", "ripgrep", "firefox"]);
    }

    #[test]
    fn test_parse_versions_line() {
        assert_eq!(parse_versions_line("jq 1.6 1.7.1\n"), Some("1.7.1".into()));
        assert_eq!(parse_versions_line(""), None);
        assert_eq!(parse_versions_line("jq\n"), None);
    }

    #[test]
    fn test_parse_info_formula() {
        let json = r#"{"formulae":[{"name":"jq","desc":"Lightweight JSON processor",
            "homepage":"https://jqlang.github.io/jq/","versions":{"stable":"1.7.1"},
            "installed":[{"version":"1.7.1"}]}],"casks":[]}"#;
        let info = parse_info("jq", json).unwrap();
        assert_eq!(info.version.as_deref(), Some("1.7.1"));
        assert_eq!(info.description.as_deref(), Some("Lightweight JSON processor"));
        assert!(info.installed);
    }

    #[test]
    fn test_parse_info_cask() {
        let json = r#"{"formulae":[],"casks":[{"token":"firefox","version":"128.0",
            "desc":"Web browser","homepage":"https://www.mozilla.org/firefox/",
            "installed":null}]}"#;
        let info = parse_info("firefox", json).unwrap();
        assert_eq!(info.name, "firefox");
        assert!(!info.installed);
    }

    #[test]
    fn test_parse_info_empty_is_not_found() {
        let err = parse_info("nope", r#"{"formulae":[],"casks":[]}"#).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_missing_brew_reports_unavailable() {
        let manager = BrewManager { brew_path: None };
        assert!(!manager.is_available(&Deadline::none()).unwrap());
        assert!(matches!(
            manager.install("jq", &Deadline::none()),
            Err(Error::CommandNotFound { .. })
        ));
    }
}
