//! Dotfile domain: plonk directory vs. home directory

use anyhow::Result;
use declarative::{
    Applied, Change, Deadline, Domain, PlannedChange, ProgressCallback, ReconciliationResult,
    apply_changes, reconcile, reconcile_failed,
};

use super::{DomainReport, DomainStep};
use crate::dotfiles::DotfileProvider;

/// Compare configured dotfiles with what the home directory holds.
///
/// Fails only when the configured set cannot be read. A failed home scan
/// puts every configured dotfile in `errors`.
pub fn reconcile_dotfiles(
    provider: &dyn DotfileProvider,
    deadline: &Deadline,
) -> Result<ReconciliationResult> {
    let desired = provider.configured_items()?;
    Ok(match provider.actual_items(deadline) {
        Ok(actual) => reconcile(Domain::Dotfile, desired, actual),
        Err(e) => reconcile_failed(Domain::Dotfile, desired, &format!("{e:#}")),
    })
}

/// Deploys missing dotfiles and restores drifted ones
pub struct DotfileStep<'a> {
    provider: &'a dyn DotfileProvider,
}

impl<'a> DotfileStep<'a> {
    pub fn new(provider: &'a dyn DotfileProvider) -> Self {
        Self { provider }
    }
}

impl DomainStep for DotfileStep<'_> {
    fn domain(&self) -> Domain {
        Domain::Dotfile
    }

    fn apply(
        &mut self,
        deadline: &Deadline,
        dry_run: bool,
        progress: &mut dyn ProgressCallback,
    ) -> DomainReport {
        let reconciliation = match reconcile_dotfiles(self.provider, deadline) {
            Ok(result) => result,
            Err(e) => return DomainReport::failed(Domain::Dotfile, format!("{e:#}")),
        };

        let mut changes: Vec<PlannedChange> = reconciliation
            .missing
            .iter()
            .map(|item| PlannedChange::new(item.clone(), Change::Add))
            .collect();
        let mut drift_errors = Vec::new();
        for item in &reconciliation.managed {
            match self.provider.is_drifted(item) {
                Ok(true) => changes.push(PlannedChange::new(item.clone(), Change::Update)),
                Ok(false) => {}
                Err(e) => drift_errors.push(format!("{item}: {e:#}")),
            }
        }
        changes.sort_by(|a, b| a.item.name.cmp(&b.item.name));

        let mut report = DomainReport::new(reconciliation);
        report.errors.extend(drift_errors);

        let provider = self.provider;
        let results = apply_changes(
            "dotfiles",
            &changes,
            deadline,
            dry_run,
            progress,
            |planned, _| {
                provider.deploy(&planned.item)?;
                Ok(Applied::Changed)
            },
        );
        report.record(results);
        report
    }
}
