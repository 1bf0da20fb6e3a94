//! `plonk search` and `plonk info`: read-only questions for the managers

use anyhow::{Result, bail};
use declarative::Deadline;
use lockfile::LockStore;
use pkgkit::{ErrorCategory, PackageInfo, PackageManager, Registry};
use serde::Serialize;

use super::operations::manager_failure;

/// Packages one manager matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub manager: String,
    pub packages: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct SearchReport {
    pub query: String,
    pub results: Vec<SearchHit>,
    /// Managers that could not be searched
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl SearchReport {
    fn push(&mut self, manager: &str, mut packages: Vec<String>) {
        packages.sort();
        packages.dedup();
        if !packages.is_empty() {
            self.results.push(SearchHit {
                manager: manager.to_string(),
                packages,
            });
        }
    }
}

/// Split `manager:rest` when the prefix names a registered manager
fn split_manager<'a>(registry: &Registry, input: &'a str) -> (Option<&'a str>, &'a str) {
    match input.split_once(':') {
        Some((manager, rest)) if registry.contains(manager) && !rest.is_empty() => {
            (Some(manager), rest)
        }
        _ => (None, input),
    }
}

fn available<'r>(
    registry: &'r Registry,
    name: &str,
    deadline: &Deadline,
) -> Result<&'r dyn PackageManager> {
    let manager = registry.require(name)?;
    if !manager.is_available(deadline)? {
        bail!("manager '{name}' is not available");
    }
    Ok(manager)
}

/// Search one manager (`--manager`, or a `manager:` prefix) or every
/// available one.
///
/// A named manager that fails is an error. Across all managers a failure
/// is recorded in `errors` and the others are still searched; managers
/// without search support are skipped.
pub fn search_packages(
    registry: &Registry,
    input: &str,
    manager: Option<&str>,
    deadline: &Deadline,
) -> Result<SearchReport> {
    let (prefix, query) = split_manager(registry, input.trim());
    if query.is_empty() {
        bail!("nothing to search for");
    }
    let mut report = SearchReport {
        query: query.to_string(),
        ..SearchReport::default()
    };

    if let Some(name) = manager.or(prefix) {
        let found = available(registry, name, deadline)?
            .search(query, deadline)
            .map_err(|e| manager_failure(&format!("search {name}"), e))?;
        report.push(name, found);
        return Ok(report);
    }

    for name in registry.names() {
        deadline.check()?;
        let manager = match available(registry, name, deadline) {
            Ok(manager) => manager,
            Err(e) => {
                log::debug!("{e:#}");
                continue;
            }
        };
        match manager.search(query, deadline) {
            Ok(found) => report.push(name, found),
            Err(e) if e.category() == ErrorCategory::Unavailable => log::debug!("{e}"),
            Err(e) => report.errors.push(format!("{name}: {e}")),
        }
    }
    Ok(report)
}

// ============================================================================
// Info
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InfoStatus {
    /// In the lock file
    Managed,
    /// Installed on the system but not managed
    Installed,
    /// Offered by a manager
    Available,
    NotFound,
}

#[derive(Debug, Serialize)]
pub struct InfoReport {
    pub package: String,
    pub status: InfoStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<PackageInfo>,
}

/// Describe a package.
///
/// Managers are tried in order: the `manager:` prefix alone when given,
/// otherwise the default manager and then the rest. A locked package is
/// reported as managed even when its manager cannot describe it.
pub fn package_info(
    store: &LockStore,
    registry: &Registry,
    default_manager: &str,
    input: &str,
    deadline: &Deadline,
) -> Result<InfoReport> {
    let (prefix, name) = split_manager(registry, input.trim());
    if name.is_empty() {
        bail!("no package given");
    }
    let candidates: Vec<&str> = match prefix {
        Some(manager) => vec![manager],
        None => std::iter::once(default_manager)
            .filter(|m| registry.contains(m))
            .chain(registry.names().into_iter().filter(|m| *m != default_manager))
            .collect(),
    };

    let report = |status, manager: &str, info| InfoReport {
        package: name.to_string(),
        status,
        manager: Some(manager.to_string()),
        info,
    };

    for &manager in &candidates {
        if let Some(entry) = store.find_package(manager, name) {
            let described = available(registry, manager, deadline)
                .and_then(|m| m.info(name, deadline).map_err(anyhow::Error::from));
            let info = match described {
                Ok(info) => info,
                Err(e) => {
                    log::debug!("{name}@{manager}: {e:#}");
                    PackageInfo {
                        name: name.to_string(),
                        version: entry.version().map(str::to_string),
                        ..PackageInfo::default()
                    }
                }
            };
            return Ok(report(InfoStatus::Managed, manager, Some(info)));
        }
    }

    for &manager_name in &candidates {
        deadline.check()?;
        let manager = match available(registry, manager_name, deadline) {
            Ok(manager) => manager,
            Err(e) if prefix.is_some() => return Err(e),
            Err(e) => {
                log::debug!("{e:#}");
                continue;
            }
        };
        match manager.info(name, deadline) {
            Ok(info) => {
                let status = if info.installed {
                    InfoStatus::Installed
                } else {
                    InfoStatus::Available
                };
                return Ok(report(status, manager_name, Some(info)));
            }
            Err(e) => match e.category() {
                ErrorCategory::NotFound | ErrorCategory::Unavailable => {
                    log::debug!("{name}@{manager_name}: {e}");
                }
                _ => log::warn!("{name}@{manager_name}: {e}"),
            },
        }
    }

    Ok(InfoReport {
        package: name.to_string(),
        status: InfoStatus::NotFound,
        manager: None,
        info: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::FakeManager;
    use declarative::Metadata;
    use tempfile::TempDir;

    fn registry(managers: Vec<FakeManager>) -> Registry {
        let mut registry = Registry::new();
        for manager in managers {
            registry.register(Box::new(manager));
        }
        registry
    }

    #[test]
    fn test_search_every_available_manager() {
        let registry = registry(vec![
            FakeManager::new("brew")
                .with_catalog("ripgrep", "14.1")
                .with_catalog("ripgrep-all", "0.10"),
            FakeManager::new("cargo").with_catalog("ripgrep", "14.1"),
            FakeManager::new("npm").with_catalog("typescript", "5.4"),
            FakeManager::new("go").with_catalog("ripgrep", "1").unavailable(),
        ]);

        let report = search_packages(&registry, "ripgrep", None, &Deadline::none()).unwrap();

        assert_eq!(report.query, "ripgrep");
        let managers: Vec<&str> = report.results.iter().map(|h| h.manager.as_str()).collect();
        assert_eq!(managers, vec!["brew", "cargo"]);
        assert_eq!(report.results[0].packages, vec!["ripgrep", "ripgrep-all"]);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_search_one_manager() {
        let brew = FakeManager::new("brew").with_catalog("jq", "1.7");
        let npm = FakeManager::new("npm").with_catalog("jq", "1.0");
        let registry = registry(vec![brew.clone(), npm.clone()]);

        let report = search_packages(&registry, "npm:jq", None, &Deadline::none()).unwrap();
        assert_eq!(report.query, "jq");
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].manager, "npm");
        assert!(brew.calls().is_empty());

        let report = search_packages(&registry, "jq", Some("brew"), &Deadline::none()).unwrap();
        assert_eq!(report.results[0].manager, "brew");

        let err = search_packages(&registry, "jq", Some("pipx"), &Deadline::none()).unwrap_err();
        assert!(err.to_string().contains("pipx"));
        assert!(search_packages(&registry, "  ", None, &Deadline::none()).is_err());
    }

    #[test]
    fn test_search_failure_is_recorded_per_manager() {
        let registry = registry(vec![
            FakeManager::new("brew").failing("jq"),
            FakeManager::new("npm").with_catalog("jq", "1.0"),
        ]);

        let report = search_packages(&registry, "jq", None, &Deadline::none()).unwrap();

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.errors, vec!["brew: brew search failed for jq: boom"]);

        let err = search_packages(&registry, "brew:jq", None, &Deadline::none()).unwrap_err();
        assert!(format!("{err:#}").starts_with("search brew"));
    }

    #[test]
    fn test_info_prefers_lock_then_default_manager() {
        let tmp = TempDir::new().unwrap();
        let mut store = LockStore::in_dir(tmp.path()).unwrap();
        store.add_package("npm", "prettier", "3.2", Metadata::new());
        let registry = registry(vec![
            FakeManager::new("brew").with_catalog("jq", "1.7"),
            FakeManager::new("npm")
                .with_catalog("jq", "1.0")
                .with_installed("eslint", "9.0"),
        ]);
        let info = |input: &str| {
            package_info(&store, &registry, "brew", input, &Deadline::none()).unwrap()
        };

        let managed = info("prettier");
        assert_eq!(managed.status, InfoStatus::Managed);
        assert_eq!(managed.manager.as_deref(), Some("npm"));
        assert_eq!(managed.info.unwrap().version.as_deref(), Some("3.2"));

        let jq = info("jq");
        assert_eq!(jq.status, InfoStatus::Available);
        assert_eq!(jq.manager.as_deref(), Some("brew"));

        assert_eq!(info("npm:jq").manager.as_deref(), Some("npm"));

        let eslint = info("eslint");
        assert_eq!(eslint.status, InfoStatus::Installed);
        assert_eq!(eslint.manager.as_deref(), Some("npm"));

        let missing = info("nonexistent");
        assert_eq!(missing.status, InfoStatus::NotFound);
        assert!(missing.info.is_none());
    }

    #[test]
    fn test_info_named_manager_must_be_available() {
        let tmp = TempDir::new().unwrap();
        let store = LockStore::in_dir(tmp.path()).unwrap();
        let registry = registry(vec![FakeManager::new("brew").unavailable()]);

        let deadline = Deadline::none();
        let err = package_info(&store, &registry, "brew", "brew:jq", &deadline).unwrap_err();
        assert_eq!(err.to_string(), "manager 'brew' is not available");

        let report = package_info(&store, &registry, "brew", "jq", &deadline).unwrap();
        assert_eq!(report.status, InfoStatus::NotFound);
    }
}
