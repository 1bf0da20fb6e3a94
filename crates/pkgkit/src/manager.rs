//! The capability contract every package manager backend implements.

use crate::error::{Error, Result};
use declarative::{Deadline, Metadata};
use serde::Serialize;

/// Details about a package, as reported by its manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageInfo {
    /// Package name
    pub name: String,
    /// Latest available version, if known
    pub version: Option<String>,
    /// One-line description
    pub description: Option<String>,
    /// Project homepage
    pub homepage: Option<String>,
    /// Whether the package is currently installed
    pub installed: bool,
}

/// How a package installed from some reference shows up afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIdentity {
    /// Name the package is listed under by `list_installed`
    pub name: String,
    /// Extra identity metadata (`source_path`, `full_name`, `scope`)
    pub metadata: Metadata,
}

impl PackageIdentity {
    /// Identity whose listed name is the reference itself.
    pub fn plain(reference: &str) -> Self {
        Self {
            name: reference.to_string(),
            metadata: Metadata::new(),
        }
    }
}

/// Uniform interface over a package manager.
///
/// Every call takes the caller's [`Deadline`]; implementations pass it to
/// the command runner so a timeout kills the running process.
///
/// A manager that is simply not installed reports `Ok(false)` from
/// [`is_available`](Self::is_available); errors from the other methods
/// mean the manager is present but the operation failed.
pub trait PackageManager: Send + Sync {
    /// Registry key ("brew", "npm", ...)
    fn name(&self) -> &'static str;

    /// Whether the manager's executable is present.
    fn is_available(&self, deadline: &Deadline) -> Result<bool>;

    /// Names of globally installed packages.
    fn list_installed(&self, deadline: &Deadline) -> Result<Vec<String>>;

    /// Install from a reference (name, module path, scoped name).
    fn install(&self, reference: &str, deadline: &Deadline) -> Result<()>;

    /// Remove a package by its listed name.
    fn uninstall(&self, name: &str, deadline: &Deadline) -> Result<()>;

    /// Check one package.
    fn is_installed(&self, name: &str, deadline: &Deadline) -> Result<bool> {
        Ok(self.list_installed(deadline)?.iter().any(|n| n == name))
    }

    /// Installed version of a package, `None` if not installed.
    fn installed_version(&self, name: &str, deadline: &Deadline) -> Result<Option<String>>;

    /// Search the manager's registry.
    fn search(&self, _query: &str, _deadline: &Deadline) -> Result<Vec<String>> {
        Err(Error::Unsupported {
            manager: self.name(),
            operation: "search",
        })
    }

    /// Describe a package.
    fn info(&self, _name: &str, _deadline: &Deadline) -> Result<PackageInfo> {
        Err(Error::Unsupported {
            manager: self.name(),
            operation: "info",
        })
    }

    /// Whether [`upgrade`](Self::upgrade) is implemented.
    fn supports_upgrade(&self) -> bool {
        false
    }

    /// Upgrade packages, given their install references.
    fn upgrade(&self, _references: &[&str], _deadline: &Deadline) -> Result<()> {
        Err(Error::Unsupported {
            manager: self.name(),
            operation: "upgrade",
        })
    }

    /// How a package installed from `reference` is identified.
    fn identify(&self, reference: &str) -> PackageIdentity {
        PackageIdentity::plain(reference)
    }
}
