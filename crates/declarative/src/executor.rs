//! Sequential, partial-failure tolerant apply loop

use crate::context::{Deadline, ProgressCallback};
use crate::types::Item;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of corrective action planned for an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Change {
    Add,
    Update,
    Remove,
    Upgrade,
}

impl Change {
    /// Imperative verb, used in messages
    pub fn verb(self) -> &'static str {
        match self {
            Change::Add => "add",
            Change::Update => "update",
            Change::Remove => "remove",
            Change::Upgrade => "upgrade",
        }
    }

    fn done(self) -> &'static str {
        match self {
            Change::Add => "added",
            Change::Update => "updated",
            Change::Remove => "removed",
            Change::Upgrade => "upgraded",
        }
    }

    fn would(self) -> &'static str {
        match self {
            Change::Add => "would-add",
            Change::Update => "would-update",
            Change::Remove => "would-remove",
            Change::Upgrade => "would-upgrade",
        }
    }
}

/// Outcome recorded for a single item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Outcome {
    /// The change was carried out
    Applied { change: Change },
    /// Dry run: the change would have been carried out
    Planned { change: Change },
    /// Nothing to do
    Skipped { reason: String },
    Failed { error: String },
}

impl Outcome {
    /// Status label as shown to users ("added", "would-add", "failed", ...)
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Applied { change } => change.done(),
            Outcome::Planned { change } => change.would(),
            Outcome::Skipped { .. } => "skipped",
            Outcome::Failed { .. } => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::Failed { error } => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What an action reports after running
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The system changed
    Changed,
    /// The action ran but found nothing to change
    Unchanged { reason: String },
}

/// A change the caller wants carried out for one item
#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub item: Item,
    pub change: Change,
}

impl PlannedChange {
    pub fn new(item: Item, change: Change) -> Self {
        Self { item, change }
    }
}

/// Result of one item's change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl OperationResult {
    pub fn new(item: &Item, outcome: Outcome) -> Self {
        Self {
            name: item.name.clone(),
            manager: item.manager.clone(),
            outcome,
        }
    }

    pub fn failed(item: &Item, error: impl Into<String>) -> Self {
        Self::new(item, Outcome::Failed { error: error.into() })
    }

    /// `name` or `name@manager`, used in error lists
    pub fn display_name(&self) -> String {
        match &self.manager {
            Some(manager) => format!("{}@{manager}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Tally of outcomes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySummary {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub upgraded: usize,
    pub planned: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ApplySummary {
    pub fn from_results(results: &[OperationResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.add_outcome(&result.outcome);
        }
        summary
    }

    pub fn add_outcome(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Applied { change } => match change {
                Change::Add => self.added += 1,
                Change::Update => self.updated += 1,
                Change::Remove => self.removed += 1,
                Change::Upgrade => self.upgraded += 1,
            },
            Outcome::Planned { .. } => self.planned += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Changes actually carried out
    pub fn total_changes(&self) -> usize {
        self.added + self.updated + self.removed + self.upgraded
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn total(&self) -> usize {
        self.total_changes() + self.planned + self.skipped + self.failed
    }

    pub fn merge(&mut self, other: &ApplySummary) {
        self.added += other.added;
        self.updated += other.updated;
        self.removed += other.removed;
        self.upgraded += other.upgraded;
        self.planned += other.planned;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Work through `changes` in order, one at a time.
///
/// A failing item never stops the loop. An action reporting
/// [`Applied::Unchanged`] is recorded as skipped. Once `deadline` has passed (or
/// was cancelled) every remaining item is recorded as failed without
/// running `action`. In dry-run mode `action` is never called and each
/// item is recorded as planned.
pub fn apply_changes<F>(
    domain: &str,
    changes: &[PlannedChange],
    deadline: &Deadline,
    dry_run: bool,
    progress: &mut dyn ProgressCallback,
    mut action: F,
) -> Vec<OperationResult>
where
    F: FnMut(&PlannedChange, &Deadline) -> anyhow::Result<Applied>,
{
    progress.on_domain_start(domain, changes.len());
    let mut results = Vec::with_capacity(changes.len());

    for planned in changes {
        progress.on_item_start(&planned.item.to_string());

        let outcome = if let Err(interrupted) = deadline.check() {
            log::debug!("{domain}: {} not attempted: {interrupted}", planned.item);
            Outcome::Failed {
                error: format!("{} {}: {interrupted}", planned.change.verb(), planned.item),
            }
        } else if dry_run {
            Outcome::Planned {
                change: planned.change,
            }
        } else {
            match action(planned, deadline) {
                Ok(Applied::Changed) => Outcome::Applied {
                    change: planned.change,
                },
                Ok(Applied::Unchanged { reason }) => Outcome::Skipped { reason },
                Err(e) => {
                    log::debug!("{domain}: {} failed: {e:#}", planned.item);
                    Outcome::Failed {
                        error: format!("{e:#}"),
                    }
                }
            }
        };

        let result = OperationResult::new(&planned.item, outcome);
        progress.on_item_complete(&result);
        results.push(result);
    }

    progress.on_domain_complete();
    results
}
