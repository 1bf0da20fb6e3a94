//! Imperative package commands: install and uninstall

use anyhow::{Result, anyhow, bail};
use declarative::{
    Applied, ApplySummary, Change, Deadline, Item, OperationResult, Outcome, PlannedChange,
    ProgressCallback, apply_changes,
};
use lockfile::LockStore;
use pkgkit::{ErrorCategory, PackageManager, Registry};
use serde::Serialize;
use std::collections::BTreeMap;

/// `manager:reference` as typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub manager: String,
    pub reference: String,
}

/// Split an optional `manager:` prefix off `input`
pub fn parse_package_spec(input: &str, default_manager: &str) -> Result<PackageSpec> {
    let input = input.trim();
    let (manager, reference) = match input.split_once(':') {
        Some((manager, reference)) => (manager, reference),
        None => (default_manager, input),
    };
    if manager.is_empty() || reference.is_empty() {
        bail!("invalid package '{input}': expected 'name' or 'manager:name'");
    }
    Ok(PackageSpec {
        manager: manager.to_string(),
        reference: reference.to_string(),
    })
}

/// Results of an install or uninstall run
#[derive(Debug, Default, Serialize)]
pub struct OperationReport {
    pub results: Vec<OperationResult>,
    pub summary: ApplySummary,
    /// Non-fatal problems, e.g. a system uninstall that failed
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl OperationReport {
    fn extend(&mut self, results: Vec<OperationResult>) {
        for result in &results {
            self.summary.add_outcome(&result.outcome);
        }
        self.results.extend(results);
    }

    pub fn failed(&self) -> usize {
        self.summary.failed
    }
}

/// Checks availability once per manager
#[derive(Default)]
pub(crate) struct AvailabilityCache {
    known: BTreeMap<String, bool>,
}

impl AvailabilityCache {
    pub(crate) fn ensure(
        &mut self,
        manager: &dyn PackageManager,
        deadline: &Deadline,
    ) -> Result<()> {
        let name = manager.name();
        let available = match self.known.get(name) {
            Some(known) => *known,
            None => {
                let known = manager.is_available(deadline)?;
                self.known.insert(name.to_string(), known);
                known
            }
        };
        if available {
            Ok(())
        } else {
            Err(anyhow!("manager '{name}' is not available"))
        }
    }
}

/// A failed manager call, followed by what the user can do about it
pub(crate) fn manager_failure(action: &str, e: pkgkit::Error) -> anyhow::Error {
    match e.category() {
        ErrorCategory::Other => anyhow::Error::new(e).context(action.to_string()),
        category => anyhow!("{action}: {e}. {}", category.advice()),
    }
}

/// Version of a package that was just installed.
///
/// The install already happened, so a failed lookup only costs the
/// recorded version.
pub(crate) fn version_after_install(
    manager: &dyn PackageManager,
    item: &Item,
    deadline: &Deadline,
) -> String {
    match manager.installed_version(&item.name, deadline) {
        Ok(version) => version.unwrap_or_default(),
        Err(e) => {
            log::warn!("{item} installed, but its version could not be read: {e}");
            String::new()
        }
    }
}

/// Install packages and record them in the lock.
///
/// Packages already in the lock are skipped without touching the
/// manager. The lock is saved once at the end if anything was added.
pub fn install_packages(
    store: &mut LockStore,
    registry: &Registry,
    specs: &[PackageSpec],
    dry_run: bool,
    deadline: &Deadline,
    progress: &mut dyn ProgressCallback,
) -> Result<OperationReport> {
    let mut report = OperationReport::default();
    let mut changes = Vec::new();

    for spec in specs {
        let Some(manager) = registry.get(&spec.manager) else {
            let item = Item::package(&spec.manager, &spec.reference);
            let error = format!("manager '{}' is not supported", spec.manager);
            report.extend(vec![OperationResult::failed(&item, error)]);
            continue;
        };
        let identity = manager.identify(&spec.reference);
        let mut item = Item::package(&spec.manager, &identity.name)
            .with_metadata("reference", &spec.reference);
        item.metadata.extend(identity.metadata);

        if store.has_package(&spec.manager, &item.name) {
            let skipped = Outcome::Skipped {
                reason: "already managed".into(),
            };
            report.extend(vec![OperationResult::new(&item, skipped)]);
        } else {
            changes.push(PlannedChange::new(item, Change::Add));
        }
    }

    let mut availability = AvailabilityCache::default();
    let results = apply_changes(
        "install",
        &changes,
        deadline,
        dry_run,
        progress,
        |planned, deadline| {
            let item = &planned.item;
            let manager = registry.require(item.manager_name())?;
            availability.ensure(manager, deadline)?;

            let reference = item.meta("reference").unwrap_or(&item.name);
            if let Err(e) = manager.install(reference, deadline) {
                if !e.is_ignorable() {
                    return Err(manager_failure(&format!("install {item}"), e));
                }
                log::debug!("{item}: {e}");
            }
            let version = version_after_install(manager, item, deadline);

            let mut metadata = item.metadata.clone();
            metadata.remove("reference");
            store.add_package(item.manager_name(), &item.name, &version, metadata);
            Ok(Applied::Changed)
        },
    );
    report.extend(results);

    if !dry_run && report.summary.added > 0 {
        store.save()?;
    }
    Ok(report)
}

/// Stop managing packages.
///
/// The lock entry goes even when the manager fails to uninstall; that
/// failure is kept as a warning.
pub fn uninstall_packages<S: AsRef<str>>(
    store: &mut LockStore,
    registry: &Registry,
    tokens: &[S],
    dry_run: bool,
    deadline: &Deadline,
    progress: &mut dyn ProgressCallback,
) -> Result<OperationReport> {
    if tokens.is_empty() {
        bail!("no packages specified");
    }
    let targets = lockfile::resolve(store.lock(), tokens)?.into_targets(store.lock());
    let changes: Vec<PlannedChange> = targets
        .iter()
        .map(|t| PlannedChange::new(Item::package(&t.manager, &t.name), Change::Remove))
        .collect();

    let mut warnings = Vec::new();
    let mut availability = AvailabilityCache::default();
    let results = apply_changes(
        "uninstall",
        &changes,
        deadline,
        dry_run,
        progress,
        |planned, deadline| {
            let item = &planned.item;
            let uninstalled = registry
                .require(item.manager_name())
                .map_err(anyhow::Error::from)
                .and_then(|manager| {
                    availability.ensure(manager, deadline)?;
                    manager.uninstall(&item.name, deadline)?;
                    Ok(())
                });
            if let Err(e) = uninstalled {
                log::warn!("{item}: {e:#}");
                warnings.push(format!("{item}: {e:#}; removed from the lock anyway"));
            }
            store.remove_package(item.manager_name(), &item.name);
            Ok(Applied::Changed)
        },
    );

    let mut report = OperationReport {
        warnings,
        ..OperationReport::default()
    };
    report.extend(results);

    if !dry_run && report.summary.removed > 0 {
        store.save()?;
    }
    Ok(report)
}
