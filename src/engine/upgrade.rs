//! `plonk upgrade`: bring managed packages to their latest versions

use anyhow::{Context, Result};
use declarative::{
    Applied, ApplySummary, Change, Deadline, Item, Metadata, OperationResult, PlannedChange,
    ProgressCallback, apply_changes,
};
use lockfile::{LockStore, Target, group_by_manager};
use pkgkit::Registry;
use serde::Serialize;
use std::collections::BTreeMap;

use super::operations::{AvailabilityCache, manager_failure};

/// One package's upgrade
#[derive(Debug, Clone, Serialize)]
pub struct UpgradeResult {
    #[serde(flatten)]
    pub operation: OperationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_version: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct UpgradeReport {
    pub results: Vec<UpgradeResult>,
    pub summary: ApplySummary,
}

impl UpgradeReport {
    fn push(&mut self, operation: OperationResult, versions: Option<&Versions>) {
        self.summary.add_outcome(&operation.outcome);
        let (from_version, to_version) = versions.cloned().unwrap_or_default();
        self.results.push(UpgradeResult {
            operation,
            from_version,
            to_version,
        });
    }

    pub fn failed(&self) -> usize {
        self.summary.failed
    }
}

type Versions = (Option<String>, Option<String>);

fn item_for(target: &Target) -> Item {
    Item::package(&target.manager, &target.name).with_metadata("target", &target.target)
}

/// Upgrade what `tokens` select (every managed package if empty).
///
/// Work is grouped by manager. A manager that is unknown, unavailable or
/// cannot upgrade fails each of its packages. A package whose version
/// did not move is reported as skipped.
pub fn upgrade_packages<S: AsRef<str>>(
    store: &mut LockStore,
    registry: &Registry,
    tokens: &[S],
    dry_run: bool,
    deadline: &Deadline,
    progress: &mut dyn ProgressCallback,
) -> Result<UpgradeReport> {
    let targets = lockfile::resolve(store.lock(), tokens)?.into_targets(store.lock());
    let mut report = UpgradeReport::default();
    let mut availability = AvailabilityCache::default();

    for (manager_name, targets) in group_by_manager(targets) {
        let items: Vec<Item> = targets.iter().map(item_for).collect();

        let manager = match registry.get(&manager_name) {
            Some(manager) => match availability.ensure(manager, deadline) {
                Ok(()) if manager.supports_upgrade() => manager,
                Ok(()) => {
                    let error = format!("upgrade not supported by {manager_name}");
                    fail_all(&mut report, &items, &error);
                    continue;
                }
                Err(e) => {
                    fail_all(&mut report, &items, &format!("{e:#}"));
                    continue;
                }
            },
            None => {
                let error = format!("manager '{manager_name}' is not supported");
                fail_all(&mut report, &items, &error);
                continue;
            }
        };

        let mut versions: BTreeMap<String, Versions> = items
            .iter()
            .map(|item| {
                let locked = store
                    .find_package(&manager_name, &item.name)
                    .and_then(|e| e.version())
                    .map(str::to_string);
                (item.name.clone(), (locked, None))
            })
            .collect();

        let changes: Vec<PlannedChange> = items
            .into_iter()
            .map(|item| PlannedChange::new(item, Change::Upgrade))
            .collect();
        let results = apply_changes(
            &manager_name,
            &changes,
            deadline,
            dry_run,
            progress,
            |planned, deadline| {
                let item = &planned.item;
                let before = manager
                    .installed_version(&item.name, deadline)
                    .with_context(|| format!("read version of {item}"))?;
                let target = item.meta("target").unwrap_or(&item.name);
                manager
                    .upgrade(&[target], deadline)
                    .map_err(|e| manager_failure(&format!("upgrade {item}"), e))?;
                let after = manager
                    .installed_version(&item.name, deadline)
                    .with_context(|| format!("read version of {item}"))?;
                versions.insert(item.name.clone(), (before.clone(), after.clone()));

                if after == before {
                    return Ok(Applied::Unchanged {
                        reason: "already up-to-date".into(),
                    });
                }
                let version = after.unwrap_or_default();
                store.add_package(&manager_name, &item.name, &version, Metadata::new());
                Ok(Applied::Changed)
            },
        );

        for result in results {
            let recorded = versions.get(&result.name);
            report.push(result, recorded);
        }
    }

    if !dry_run && report.summary.upgraded > 0 {
        store.save()?;
    }
    Ok(report)
}

fn fail_all(report: &mut UpgradeReport, items: &[Item], error: &str) {
    for item in items {
        report.push(OperationResult::failed(item, error), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::FakeManager;
    use declarative::NoProgress;
    use tempfile::TempDir;

    fn store_with(tmp: &TempDir, entries: &[(&str, &str, &str)]) -> LockStore {
        let mut store = LockStore::in_dir(tmp.path()).unwrap();
        for (manager, name, version) in entries {
            store.add_package(manager, name, version, Metadata::new());
        }
        store.save().unwrap();
        store
    }

    fn run(
        store: &mut LockStore,
        registry: &Registry,
        tokens: &[&str],
        dry_run: bool,
    ) -> UpgradeReport {
        let deadline = Deadline::none();
        upgrade_packages(store, registry, tokens, dry_run, &deadline, &mut NoProgress).unwrap()
    }

    #[test]
    fn test_upgrade_records_versions() {
        let tmp = TempDir::new().unwrap();
        let mut store = store_with(&tmp, &[("brew", "jq", "1.6"), ("brew", "fd", "9.0")]);
        let brew = FakeManager::new("brew")
            .with_installed("jq", "1.6")
            .with_installed("fd", "9.0")
            .with_upgrade("jq", "1.7");
        let mut registry = Registry::new();
        registry.register(Box::new(brew.clone()));

        let report = run(&mut store, &registry, &[], false);

        assert_eq!(report.summary.upgraded, 1);
        assert_eq!(report.summary.skipped, 1);
        let jq = report.results.iter().find(|r| r.operation.name == "jq").unwrap();
        assert_eq!(jq.operation.outcome.label(), "upgraded");
        assert_eq!(jq.from_version.as_deref(), Some("1.6"));
        assert_eq!(jq.to_version.as_deref(), Some("1.7"));
        let fd = report.results.iter().find(|r| r.operation.name == "fd").unwrap();
        assert_eq!(fd.operation.outcome.label(), "skipped");

        let reopened = LockStore::in_dir(tmp.path()).unwrap();
        assert_eq!(reopened.find_package("brew", "jq").unwrap().version(), Some("1.7"));
        assert_eq!(reopened.find_package("brew", "fd").unwrap().version(), Some("9.0"));
    }

    #[test]
    fn test_upgrade_uses_install_target() {
        let tmp = TempDir::new().unwrap();
        let mut store = LockStore::in_dir(tmp.path()).unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("source_path".into(), "github.com/rakyll/hey".into());
        store.add_package("go", "hey", "v0.1.3", metadata);
        let go = FakeManager::new("go")
            .with_installed("hey", "v0.1.3")
            .with_upgrade("hey", "v0.1.4");
        let mut registry = Registry::new();
        registry.register(Box::new(go.clone()));

        let report = run(&mut store, &registry, &["hey"], false);

        assert_eq!(report.summary.upgraded, 1);
        assert_eq!(go.calls(), vec!["upgrade github.com/rakyll/hey"]);
    }

    #[test]
    fn test_upgrade_failures_per_manager() {
        let tmp = TempDir::new().unwrap();
        let mut store = store_with(
            &tmp,
            &[
                ("brew", "jq", "1.7"),
                ("npm", "typescript", "5.4"),
                ("pipx", "black", "24.1"),
                ("cargo", "ripgrep", "14.1"),
            ],
        );
        let mut registry = Registry::new();
        registry.register(Box::new(FakeManager::new("brew").with_installed("jq", "1.7")));
        registry.register(Box::new(FakeManager::new("npm").without_upgrade()));
        registry.register(Box::new(FakeManager::new("cargo").unavailable()));

        let report = run(&mut store, &registry, &[], false);

        assert_eq!(report.failed(), 3);
        assert_eq!(report.summary.skipped, 1);
        let error = |name: &str| {
            report
                .results
                .iter()
                .find(|r| r.operation.name == name)
                .and_then(|r| r.operation.outcome.error())
                .map(str::to_string)
        };
        assert_eq!(error("typescript").as_deref(), Some("upgrade not supported by npm"));
        assert_eq!(error("black").as_deref(), Some("manager 'pipx' is not supported"));
        assert_eq!(error("ripgrep").as_deref(), Some("manager 'cargo' is not available"));
    }

    #[test]
    fn test_upgrade_dry_run() {
        let tmp = TempDir::new().unwrap();
        let mut store = store_with(&tmp, &[("brew", "jq", "1.6")]);
        let before = std::fs::read_to_string(store.path()).unwrap();
        let brew = FakeManager::new("brew")
            .with_installed("jq", "1.6")
            .with_upgrade("jq", "1.7");
        let mut registry = Registry::new();
        registry.register(Box::new(brew.clone()));

        let report = run(&mut store, &registry, &["brew:jq"], true);

        assert_eq!(report.results[0].operation.outcome.label(), "would-upgrade");
        assert_eq!(report.results[0].from_version.as_deref(), Some("1.6"));
        assert!(brew.calls().is_empty());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn test_upgrade_failing_package() {
        let tmp = TempDir::new().unwrap();
        let mut store = store_with(&tmp, &[("brew", "jq", "1.6"), ("brew", "wget", "1.24")]);
        let brew = FakeManager::new("brew")
            .with_installed("jq", "1.6")
            .with_installed("wget", "1.24")
            .with_upgrade("wget", "1.25")
            .failing("jq");
        let mut registry = Registry::new();
        registry.register(Box::new(brew));

        let report = run(&mut store, &registry, &[], false);

        assert_eq!(report.failed(), 1);
        assert_eq!(report.summary.upgraded, 1);
        let error = report.results[0].operation.outcome.error().unwrap();
        assert!(error.starts_with("upgrade jq@brew"), "{error}");
    }
}
