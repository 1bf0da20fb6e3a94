//! Apply engine for plonk
//!
//! The orchestrator runs each resource domain as an independent
//! reconcile-then-apply pipeline:
//! 1. Packages - desired state from the lock, actual state from managers
//! 2. Dotfiles - desired state from the plonk directory, actual from `$HOME`
//!
//! Each domain gets its own deadline carved out of the operation
//! timeout. A domain that times out keeps the results it already has.

pub mod dotfiles;
pub mod operations;
pub mod packages;
pub mod query;
pub mod upgrade;

#[cfg(test)]
pub(crate) mod fake;

use anyhow::{Result, bail};
use declarative::{
    ApplySummary, Deadline, Domain, OperationResult, ProgressCallback, ReconciliationResult,
};
use serde::Serialize;
use std::time::Duration;

use crate::config::Config;

pub use dotfiles::{DotfileStep, reconcile_dotfiles};
pub use packages::{PackageStep, reconcile_packages};

/// Which domains an apply touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    #[default]
    All,
    PackagesOnly,
    DotfilesOnly,
}

impl Scope {
    pub fn includes(self, domain: Domain) -> bool {
        match self {
            Scope::All => true,
            Scope::PackagesOnly => domain == Domain::Package,
            Scope::DotfilesOnly => domain == Domain::Dotfile,
        }
    }
}

/// Options for one apply
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Plan and report, but change nothing
    pub dry_run: bool,
    pub scope: Scope,
    pub package_timeout: Duration,
    pub dotfile_timeout: Duration,
    /// Upper bound for the whole apply
    pub operation_timeout: Duration,
}

impl ApplyOptions {
    pub fn from_config(config: &Config, dry_run: bool, scope: Scope) -> Self {
        Self {
            dry_run,
            scope,
            package_timeout: config.package_timeout(),
            dotfile_timeout: config.dotfile_timeout(),
            operation_timeout: config.operation_timeout(),
        }
    }
}

/// What one domain did
#[derive(Debug, Clone, Serialize)]
pub struct DomainReport {
    pub domain: Domain,
    pub reconciliation: ReconciliationResult,
    pub operations: Vec<OperationResult>,
    pub summary: ApplySummary,
    pub errors: Vec<String>,
}

impl DomainReport {
    pub fn new(reconciliation: ReconciliationResult) -> Self {
        let errors = reconciliation
            .errors
            .iter()
            .map(|item| {
                format!(
                    "{item}: {}",
                    item.error.as_deref().unwrap_or("state could not be determined")
                )
            })
            .collect();
        Self {
            domain: reconciliation.domain,
            reconciliation,
            operations: Vec::new(),
            summary: ApplySummary::default(),
            errors,
        }
    }

    /// The domain could not even be reconciled
    pub fn failed(domain: Domain, message: impl Into<String>) -> Self {
        let mut report = Self::new(ReconciliationResult::empty(domain));
        report.errors.push(message.into());
        report
    }

    /// Fold operation results into the summary and error list
    pub fn record(&mut self, results: Vec<OperationResult>) {
        for result in &results {
            self.summary.add_outcome(&result.outcome);
            if let Some(error) = result.outcome.error() {
                self.errors.push(format!("{}: {error}", result.display_name()));
            }
        }
        self.operations.extend(results);
    }
}

/// A reconcile-then-apply pipeline for one domain
pub trait DomainStep {
    fn domain(&self) -> Domain;

    /// Always returns a full report; failures go into its error list
    fn apply(
        &mut self,
        deadline: &Deadline,
        dry_run: bool,
        progress: &mut dyn ProgressCallback,
    ) -> DomainReport;
}

/// Outcome of an apply across domains
#[derive(Debug, Clone, Serialize)]
pub struct ApplyResult {
    pub dry_run: bool,
    pub scope: Scope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packages: Option<DomainReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dotfiles: Option<DomainReport>,
    pub package_errors: Vec<String>,
    pub dotfile_errors: Vec<String>,
    pub success: bool,
    pub changed: bool,
}

impl ApplyResult {
    fn new(dry_run: bool, scope: Scope) -> Self {
        Self {
            dry_run,
            scope,
            packages: None,
            dotfiles: None,
            package_errors: Vec::new(),
            dotfile_errors: Vec::new(),
            success: true,
            changed: false,
        }
    }

    fn add(&mut self, report: DomainReport) {
        match report.domain {
            Domain::Package => {
                self.package_errors.extend(report.errors.iter().cloned());
                self.packages = Some(report);
            }
            Domain::Dotfile => {
                self.dotfile_errors.extend(report.errors.iter().cloned());
                self.dotfiles = Some(report);
            }
        }
    }

    fn finish(&mut self) {
        self.success = self.package_errors.is_empty() && self.dotfile_errors.is_empty();
        let dry_run = self.dry_run;
        self.changed = [&self.packages, &self.dotfiles]
            .into_iter()
            .flatten()
            .any(|r| {
                if dry_run {
                    r.summary.planned > 0
                } else {
                    r.summary.total_changes() > 0
                }
            });
    }

    /// Combined error, if any domain failed. Render the result first.
    pub fn check(&self) -> Result<()> {
        if self.success {
            return Ok(());
        }
        let mut parts = Vec::new();
        if !self.package_errors.is_empty() {
            parts.push(format!("{} package error(s)", self.package_errors.len()));
        }
        if !self.dotfile_errors.is_empty() {
            parts.push(format!("{} dotfile error(s)", self.dotfile_errors.len()));
        }
        let details: Vec<&str> = self
            .package_errors
            .iter()
            .chain(&self.dotfile_errors)
            .map(String::as_str)
            .collect();
        bail!("apply failed with {}: {}", parts.join(" and "), details.join("; "))
    }
}

/// Sequences the domain pipelines under one set of options
pub struct Orchestrator {
    options: ApplyOptions,
}

impl Orchestrator {
    pub fn new(options: ApplyOptions) -> Self {
        Self { options }
    }

    /// Packages first, then dotfiles, each skipped when out of scope
    pub fn apply<'a>(
        &self,
        packages: &'a mut dyn DomainStep,
        dotfiles: &'a mut dyn DomainStep,
        progress: &mut dyn ProgressCallback,
    ) -> ApplyResult {
        let opts = &self.options;
        let mut result = ApplyResult::new(opts.dry_run, opts.scope);
        let operation = Deadline::after(opts.operation_timeout);

        for (step, timeout) in [
            (packages, opts.package_timeout),
            (dotfiles, opts.dotfile_timeout),
        ] {
            let domain = step.domain();
            if !opts.scope.includes(domain) {
                log::debug!("skipping {domain}: out of scope");
                continue;
            }
            let deadline = operation.child(timeout);
            log::info!("applying {domain} (timeout {}s)", timeout.as_secs());
            let report = step.apply(&deadline, opts.dry_run, progress);
            log::debug!(
                "{domain}: {} changed, {} planned, {} failed",
                report.summary.total_changes(),
                report.summary.planned,
                report.summary.failed
            );
            result.add(report);
        }

        result.finish();
        result
    }
}
