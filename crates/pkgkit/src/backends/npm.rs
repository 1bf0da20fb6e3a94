//! npm (global packages) backend.

use crate::error::{Error, Result};
use crate::manager::{PackageIdentity, PackageInfo, PackageManager};
use crate::runner;
use declarative::Deadline;
use std::path::{Path, PathBuf};

/// Backend for `npm -g`.
pub struct NpmManager {
    npm_path: Option<PathBuf>,
}

impl Default for NpmManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NpmManager {
    /// Create a backend, locating `npm` on `PATH`.
    pub fn new() -> Self {
        Self {
            npm_path: runner::which("npm"),
        }
    }

    fn npm(&self) -> Result<&Path> {
        self.npm_path
            .as_deref()
            .ok_or_else(|| Error::CommandNotFound {
                program: "npm".into(),
            })
    }

    /// `npm list` exits non-zero on peer dependency problems while still
    /// printing a usable tree, so stdout is parsed whenever present.
    fn global_tree(&self, deadline: &Deadline) -> Result<serde_json::Value> {
        let output = runner::run(
            self.npm()?,
            &["list", "-g", "--depth=0", "--json"],
            deadline,
        )?;
        if output.stdout.trim().is_empty() {
            return Err(Error::from_output("npm", &output.stderr, None));
        }
        Ok(serde_json::from_str(&output.stdout)?)
    }
}

impl PackageManager for NpmManager {
    fn name(&self) -> &'static str {
        "npm"
    }

    fn is_available(&self, _deadline: &Deadline) -> Result<bool> {
        Ok(self.npm_path.is_some())
    }

    fn list_installed(&self, deadline: &Deadline) -> Result<Vec<String>> {
        Ok(dependency_names(&self.global_tree(deadline)?))
    }

    fn install(&self, reference: &str, deadline: &Deadline) -> Result<()> {
        match runner::run_checked(
            "npm",
            self.npm()?,
            &["install", "-g", reference],
            Some(reference),
            deadline,
        ) {
            Err(e) if e.is_ignorable() => Ok(()),
            other => other.map(drop),
        }
    }

    fn uninstall(&self, name: &str, deadline: &Deadline) -> Result<()> {
        runner::run_checked("npm", self.npm()?, &["uninstall", "-g", name], Some(name), deadline)
            .map(drop)
    }

    fn installed_version(&self, name: &str, deadline: &Deadline) -> Result<Option<String>> {
        Ok(dependency_version(&self.global_tree(deadline)?, name))
    }

    fn search(&self, query: &str, deadline: &Deadline) -> Result<Vec<String>> {
        let stdout = runner::run_checked(
            "npm",
            self.npm()?,
            &["search", query, "--json"],
            None,
            deadline,
        )?;
        let json: serde_json::Value = serde_json::from_str(&stdout)?;
        Ok(json
            .as_array()
            .map(|hits| {
                hits.iter()
                    .filter_map(|h| h["name"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn info(&self, name: &str, deadline: &Deadline) -> Result<PackageInfo> {
        let stdout = runner::run_checked(
            "npm",
            self.npm()?,
            &["view", name, "--json"],
            Some(name),
            deadline,
        )?;
        let json: serde_json::Value = serde_json::from_str(&stdout)?;
        let installed = self.is_installed(name, deadline).unwrap_or(false);
        Ok(PackageInfo {
            name: json["name"].as_str().unwrap_or(name).to_string(),
            version: json["version"].as_str().map(String::from),
            description: json["description"].as_str().map(String::from),
            homepage: json["homepage"].as_str().map(String::from),
            installed,
        })
    }

    fn supports_upgrade(&self) -> bool {
        true
    }

    fn upgrade(&self, references: &[&str], deadline: &Deadline) -> Result<()> {
        let mut args = vec!["update", "-g"];
        args.extend_from_slice(references);
        runner::run_checked("npm", self.npm()?, &args, references.first().copied(), deadline)
            .map(drop)
    }

    fn identify(&self, reference: &str) -> PackageIdentity {
        identify_npm(reference)
    }
}

/// Strip a trailing `@version` without touching the leading scope `@`.
fn strip_version(reference: &str) -> &str {
    match reference.rfind('@') {
        Some(0) | None => reference,
        Some(i) => &reference[..i],
    }
}

/// Scoped packages (`@types/node`) keep their full name as the listed
/// name and record `full_name` and `scope`.
fn identify_npm(reference: &str) -> PackageIdentity {
    let name = strip_version(reference);
    let mut identity = PackageIdentity::plain(name);
    if let Some((scope, _)) = name.split_once('/').filter(|(s, _)| s.starts_with('@')) {
        identity.metadata.insert("full_name".into(), name.to_string());
        identity.metadata.insert("scope".into(), scope.to_string());
    }
    identity
}

fn dependency_names(tree: &serde_json::Value) -> Vec<String> {
    tree["dependencies"]
        .as_object()
        .map(|deps| deps.keys().cloned().collect())
        .unwrap_or_default()
}

fn dependency_version(tree: &serde_json::Value, name: &str) -> Option<String> {
    tree["dependencies"][name]["version"]
        .as_str()
        .map(String::from)
}
