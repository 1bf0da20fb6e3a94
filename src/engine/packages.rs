//! Package domain: lock file vs. what the managers report

use declarative::{
    Applied, Change, Deadline, Domain, Item, Metadata, PlannedChange, ProgressCallback,
    ReconciliationResult, apply_changes, reconcile, reconcile_failed,
};
use lockfile::{Lock, LockStore};
use pkgkit::Registry;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::operations::{AvailabilityCache, manager_failure, version_after_install};
use super::{DomainReport, DomainStep};

/// Compare every locked package with its manager's installed list.
///
/// Managers are queried one at a time. A manager that is not installed
/// reports nothing, so its packages come out missing. An unknown manager
/// or a failed listing puts that manager's packages in `errors`; the
/// other managers are unaffected.
pub fn reconcile_packages(
    lock: &Lock,
    registry: &Registry,
    deadline: &Deadline,
) -> ReconciliationResult {
    let mut by_manager: BTreeMap<String, Vec<Item>> = BTreeMap::new();
    for item in lock.desired_items() {
        by_manager
            .entry(item.manager_name().to_string())
            .or_default()
            .push(item);
    }

    let mut result = ReconciliationResult::empty(Domain::Package);
    for (name, desired) in by_manager {
        if let Err(interrupted) = deadline.check() {
            result.merge(reconcile_failed(Domain::Package, desired, &interrupted.to_string()));
            continue;
        }
        let Some(manager) = registry.get(&name) else {
            let message = format!("manager '{name}' is not supported");
            result.merge(reconcile_failed(Domain::Package, desired, &message));
            continue;
        };

        let installed = match manager.is_available(deadline) {
            Ok(false) => {
                log::debug!("{name} is not available; its packages are missing");
                Ok(Vec::new())
            }
            Ok(true) => manager.list_installed(deadline),
            Err(e) => Err(e),
        };

        match installed {
            Ok(names) => {
                let actual = names
                    .into_iter()
                    .map(|n| Item::package(&name, n))
                    .collect();
                result.merge(reconcile(Domain::Package, desired, actual));
            }
            Err(e) => {
                log::warn!("could not list {name} packages: {e}");
                let message = format!("could not list {name} packages: {e}");
                result.merge(reconcile_failed(Domain::Package, desired, &message));
            }
        }
    }
    result
}

/// Installs locked packages that are missing
pub struct PackageStep<'a> {
    lock_path: PathBuf,
    registry: &'a Registry,
}

impl<'a> PackageStep<'a> {
    pub fn new(lock_path: impl Into<PathBuf>, registry: &'a Registry) -> Self {
        Self {
            lock_path: lock_path.into(),
            registry,
        }
    }
}

impl DomainStep for PackageStep<'_> {
    fn domain(&self) -> Domain {
        Domain::Package
    }

    fn apply(
        &mut self,
        deadline: &Deadline,
        dry_run: bool,
        progress: &mut dyn ProgressCallback,
    ) -> DomainReport {
        let mut store = match LockStore::open(&self.lock_path) {
            Ok(store) => store,
            Err(e) => return DomainReport::failed(Domain::Package, e.to_string()),
        };

        let reconciliation = reconcile_packages(store.lock(), self.registry, deadline);
        let mut changes: Vec<PlannedChange> = reconciliation
            .missing
            .iter()
            .map(|item| PlannedChange::new(item.clone(), Change::Add))
            .collect();
        changes.sort_by(|a, b| {
            (a.item.manager_name(), &a.item.name).cmp(&(b.item.manager_name(), &b.item.name))
        });
        let mut report = DomainReport::new(reconciliation);

        let registry = self.registry;
        let mut availability = AvailabilityCache::default();
        let results = apply_changes(
            "packages",
            &changes,
            deadline,
            dry_run,
            progress,
            |planned, deadline| {
                let item = &planned.item;
                let manager_name = item.manager_name();
                let manager = registry.require(manager_name)?;
                availability.ensure(manager, deadline)?;

                let target = store
                    .find_package(manager_name, &item.name)
                    .map_or_else(|| item.name.clone(), |e| e.install_target().to_string());
                if let Err(e) = manager.install(&target, deadline) {
                    if !e.is_ignorable() {
                        return Err(manager_failure(&format!("install {item}"), e));
                    }
                    log::debug!("{item}: {e}");
                }

                let version = version_after_install(manager, item, deadline);
                store.add_package(manager_name, &item.name, &version, Metadata::new());
                Ok(Applied::Changed)
            },
        );
        report.record(results);

        if !dry_run
            && report.summary.added > 0
            && let Err(e) = store.save()
        {
            report.errors.push(e.to_string());
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::FakeManager;
    use declarative::{ItemState, NoProgress};
    use tempfile::TempDir;

    fn lock_with(entries: &[(&str, &str)]) -> Lock {
        let tmp = TempDir::new().unwrap();
        let mut store = LockStore::in_dir(tmp.path()).unwrap();
        for (manager, name) in entries {
            store.add_package(manager, name, "", Metadata::new());
        }
        store.lock().clone()
    }

    #[test]
    fn test_reconcile_across_managers() {
        let lock = lock_with(&[("brew", "jq"), ("npm", "typescript")]);
        let mut registry = Registry::new();
        registry.register(Box::new(
            FakeManager::new("brew")
                .with_installed("jq", "1.7")
                .with_installed("wget", "1.24"),
        ));
        registry.register(Box::new(FakeManager::new("npm")));

        let result = reconcile_packages(&lock, &registry, &Deadline::none());

        assert_eq!(result.managed.len(), 1);
        assert_eq!(result.managed[0].name, "jq");
        assert_eq!(result.managed[0].state, ItemState::Managed);
        assert_eq!(result.missing.len(), 1);
        assert_eq!(result.missing[0].name, "typescript");
        assert_eq!(result.untracked.len(), 1);
        assert_eq!(result.untracked[0].name, "wget");
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_unknown_manager_and_list_failure() {
        let lock = lock_with(&[("pipx", "black"), ("npm", "prettier"), ("brew", "jq")]);
        let mut registry = Registry::new();
        registry.register(Box::new(FakeManager::new("npm").with_list_error("EACCES")));
        registry.register(Box::new(FakeManager::new("brew")));

        let result = reconcile_packages(&lock, &registry, &Deadline::none());

        assert_eq!(result.errors.len(), 2);
        let pipx = result.errors.iter().find(|i| i.name == "black").unwrap();
        assert_eq!(pipx.error.as_deref(), Some("manager 'pipx' is not supported"));
        let npm = result.errors.iter().find(|i| i.name == "prettier").unwrap();
        assert!(npm.error.as_deref().unwrap().contains("EACCES"));
        assert_eq!(result.missing.len(), 1);
    }

    #[test]
    fn test_unavailable_manager_reports_missing() {
        let lock = lock_with(&[("brew", "jq")]);
        let mut registry = Registry::new();
        registry.register(Box::new(FakeManager::new("brew").unavailable()));

        let result = reconcile_packages(&lock, &registry, &Deadline::none());
        assert_eq!(result.missing.len(), 1);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_step_installs_from_source_path() {
        let tmp = TempDir::new().unwrap();
        let mut store = LockStore::in_dir(tmp.path()).unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("source_path".into(), "github.com/rakyll/hey".into());
        store.add_package("go", "hey", "", metadata);
        store.save().unwrap();

        let go = FakeManager::new("go");
        let mut registry = Registry::new();
        registry.register(Box::new(go.clone()));

        let mut step = PackageStep::new(store.path(), &registry);
        let report = step.apply(&Deadline::none(), false, &mut NoProgress);

        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert_eq!(go.calls(), vec!["install github.com/rakyll/hey"]);
        let reopened = LockStore::in_dir(tmp.path()).unwrap();
        let entry = reopened.find_package("go", "hey").unwrap();
        assert_eq!(entry.version(), Some("1.0.0"));
        assert_eq!(entry.source_path(), Some("github.com/rakyll/hey"));
    }

    #[test]
    fn test_step_records_package_when_version_is_unreadable() {
        let tmp = TempDir::new().unwrap();
        let mut store = LockStore::in_dir(tmp.path()).unwrap();
        store.add_package("brew", "jq", "", Metadata::new());
        store.save().unwrap();

        let brew = FakeManager::new("brew").with_version_error();
        let mut registry = Registry::new();
        registry.register(Box::new(brew.clone()));

        let mut step = PackageStep::new(store.path(), &registry);
        let report = step.apply(&Deadline::none(), false, &mut NoProgress);

        assert_eq!(report.summary.added, 1);
        assert_eq!(report.summary.failed, 0);
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert!(brew.is_installed_now("jq"));
        let reopened = LockStore::in_dir(tmp.path()).unwrap();
        assert_eq!(reopened.find_package("brew", "jq").unwrap().version(), None);
    }

    #[test]
    fn test_step_orders_changes_by_manager_then_name() {
        let tmp = TempDir::new().unwrap();
        let mut store = LockStore::in_dir(tmp.path()).unwrap();
        let entries = [("npm", "zx"), ("brew", "wget"), ("npm", "eslint"), ("brew", "fd")];
        for (manager, name) in entries {
            store.add_package(manager, name, "", Metadata::new());
        }
        store.save().unwrap();

        let mut registry = Registry::new();
        registry.register(Box::new(FakeManager::new("brew")));
        registry.register(Box::new(FakeManager::new("npm")));

        let mut step = PackageStep::new(store.path(), &registry);
        let report = step.apply(&Deadline::none(), true, &mut NoProgress);

        let order: Vec<String> = report.operations.iter().map(|o| o.display_name()).collect();
        assert_eq!(order, vec!["fd@brew", "wget@brew", "eslint@npm", "zx@npm"]);
    }

    #[test]
    fn test_step_without_changes_leaves_lock_alone() {
        let tmp = TempDir::new().unwrap();
        let mut store = LockStore::in_dir(tmp.path()).unwrap();
        store.add_package("brew", "jq", "1.7", Metadata::new());
        store.save().unwrap();
        let before = std::fs::read_to_string(store.path()).unwrap();

        let mut registry = Registry::new();
        registry.register(Box::new(FakeManager::new("brew").with_installed("jq", "1.7")));

        let mut step = PackageStep::new(store.path(), &registry);
        let report = step.apply(&Deadline::none(), false, &mut NoProgress);

        assert!(report.operations.is_empty());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    }
}
