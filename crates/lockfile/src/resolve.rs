//! Map user-typed package references onto lock entries.
//!
//! A token is `name`, `manager:name` or a bare manager. A package can
//! be known by several names: the listed `name`, the `source_path` it
//! was built from (go) or its `full_name` (npm scopes). Whatever alias
//! matched, the target handed to the manager is
//! [`ResourceEntry::install_target`].

use crate::error::ResolveError;
use crate::store::{Lock, ResourceEntry};
use serde::Serialize;
use std::collections::BTreeMap;

/// One package to operate on
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Target {
    pub manager: String,
    /// Name as recorded in the lock
    pub name: String,
    /// Reference passed to the manager
    pub target: String,
}

impl Target {
    pub fn from_entry(entry: &ResourceEntry) -> Self {
        Self {
            manager: entry.manager().to_string(),
            name: entry.name().to_string(),
            target: entry.install_target().to_string(),
        }
    }
}

/// What a command line selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// No arguments: every package in the lock
    All,
    Targets(Vec<Target>),
}

impl Selection {
    /// Concrete targets, expanding `All` against `lock`
    pub fn into_targets(self, lock: &Lock) -> Vec<Target> {
        match self {
            Selection::All => all_targets(lock),
            Selection::Targets(targets) => targets,
        }
    }
}

/// Every package in the lock, sorted by manager then name
pub fn all_targets(lock: &Lock) -> Vec<Target> {
    let mut targets: Vec<Target> = lock.packages().map(Target::from_entry).collect();
    targets.sort();
    targets.dedup();
    targets
}

/// Resolve command-line tokens. The first bad token fails the whole
/// selection.
pub fn resolve<S: AsRef<str>>(lock: &Lock, tokens: &[S]) -> Result<Selection, ResolveError> {
    if tokens.is_empty() {
        return Ok(Selection::All);
    }

    let mut targets = Vec::new();
    for token in tokens {
        targets.extend(resolve_token(lock, token.as_ref())?);
    }
    targets.sort();
    targets.dedup();
    Ok(Selection::Targets(targets))
}

/// Resolve a single token
pub fn resolve_token(lock: &Lock, token: &str) -> Result<Vec<Target>, ResolveError> {
    if let Some((manager, name)) = token.split_once(':') {
        if name.is_empty() {
            return Err(ResolveError::TrailingColon {
                token: token.to_string(),
                manager: manager.to_string(),
            });
        }
        let found: Vec<Target> = lock
            .packages()
            .filter(|e| e.manager() == manager && matches_alias(e, name))
            .map(Target::from_entry)
            .collect();
        if found.is_empty() {
            return Err(ResolveError::NotManagedVia {
                name: name.to_string(),
                manager: manager.to_string(),
            });
        }
        return Ok(found);
    }

    if lock.managers().contains(token) {
        log::debug!("'{token}' names a manager, selecting all of its packages");
        return Ok(lock
            .packages()
            .filter(|e| e.manager() == token)
            .map(Target::from_entry)
            .collect());
    }

    let found: Vec<Target> = lock
        .packages()
        .filter(|e| matches_alias(e, token))
        .map(Target::from_entry)
        .collect();
    if found.is_empty() {
        return Err(ResolveError::NotManaged {
            name: token.to_string(),
        });
    }
    Ok(found)
}

fn matches_alias(entry: &ResourceEntry, name: &str) -> bool {
    entry.name() == name || entry.source_path() == Some(name) || entry.full_name() == Some(name)
}

/// Group targets per manager, managers and names sorted
pub fn group_by_manager(targets: Vec<Target>) -> BTreeMap<String, Vec<Target>> {
    let mut groups: BTreeMap<String, Vec<Target>> = BTreeMap::new();
    for target in targets {
        groups.entry(target.manager.clone()).or_default().push(target);
    }
    for group in groups.values_mut() {
        group.sort_by(|a, b| a.name.cmp(&b.name));
    }
    groups
}
