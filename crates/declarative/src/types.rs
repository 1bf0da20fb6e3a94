//! Core types shared by every resource domain

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Open, string-keyed metadata attached to an item.
///
/// Packages carry `manager`, `name` and `version`, plus `source_path`
/// (go) or `full_name`/`scope` (npm scoped packages) when the
/// installable reference differs from the listed name. Dotfiles carry
/// `source` and `destination`.
pub type Metadata = BTreeMap<String, String>;

/// Resource domain an item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Package,
    Dotfile,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Package => write!(f, "packages"),
            Domain::Dotfile => write!(f, "dotfiles"),
        }
    }
}

/// Reconciliation state of an item.
///
/// Only the reconciler assigns anything other than `Untracked`, which
/// is the placeholder collaborators use when building items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    Managed,
    Missing,
    #[default]
    Untracked,
    Error,
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemState::Managed => write!(f, "managed"),
            ItemState::Missing => write!(f, "missing"),
            ItemState::Untracked => write!(f, "untracked"),
            ItemState::Error => write!(f, "error"),
        }
    }
}

/// A single declared or observed resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub domain: Domain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
    #[serde(default)]
    pub state: ItemState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    /// Why the state could not be determined (only for `ItemState::Error`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Item {
    /// A package known to `manager` under `name`
    pub fn package(manager: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: Domain::Package,
            manager: Some(manager.into()),
            state: ItemState::default(),
            path: None,
            metadata: Metadata::new(),
            error: None,
        }
    }

    /// A dotfile identified by its home-relative name (leading dot stripped)
    pub fn dotfile(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            domain: Domain::Dotfile,
            manager: None,
            state: ItemState::default(),
            path: Some(path.into()),
            metadata: Metadata::new(),
            error: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Identity used when diffing desired against actual
    pub fn key(&self) -> String {
        match (self.domain, &self.manager) {
            (Domain::Package, Some(manager)) => format!("{manager}:{}", self.name),
            _ => self.name.clone(),
        }
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn manager_name(&self) -> &str {
        self.manager.as_deref().unwrap_or_default()
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.manager {
            Some(manager) => write!(f, "{}@{manager}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Snapshot of one desired-vs-actual comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub domain: Domain,
    pub managed: Vec<Item>,
    pub missing: Vec<Item>,
    pub untracked: Vec<Item>,
    pub errors: Vec<Item>,
}

impl ReconciliationResult {
    pub fn empty(domain: Domain) -> Self {
        Self {
            domain,
            managed: Vec::new(),
            missing: Vec::new(),
            untracked: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Fold another result of the same domain into this one
    pub fn merge(&mut self, other: ReconciliationResult) {
        debug_assert_eq!(self.domain, other.domain);
        self.managed.extend(other.managed);
        self.missing.extend(other.missing);
        self.untracked.extend(other.untracked);
        self.errors.extend(other.errors);
    }

    /// Nothing missing and every desired item could be checked
    pub fn is_converged(&self) -> bool {
        self.missing.is_empty() && self.errors.is_empty()
    }

    pub fn total(&self) -> usize {
        self.managed.len() + self.missing.len() + self.untracked.len() + self.errors.len()
    }
}
