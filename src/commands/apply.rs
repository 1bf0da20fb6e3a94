//! `plonk apply`

use anyhow::Result;

use super::{Env, print_json};
use crate::Context;
use crate::cli::{ApplyArgs, OutputFormat};
use crate::engine::{
    ApplyOptions, ApplyResult, DomainReport, DotfileStep, Orchestrator, PackageStep,
};
use crate::progress::BarProgress;
use crate::ui;

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let env = Env::load()?;
    let json = args.output.output == OutputFormat::Json;
    let options = ApplyOptions::from_config(&env.config, args.dry_run, args.scope());
    let provider = env.dotfiles()?;

    let mut packages = PackageStep::new(env.lock_path(), &env.registry);
    let mut dotfiles = DotfileStep::new(&provider);
    let mut progress = BarProgress::new(ctx.quiet || json);
    let result = Orchestrator::new(options).apply(&mut packages, &mut dotfiles, &mut progress);

    if json {
        print_json(&result)?;
    } else {
        render(ctx, &result);
    }
    result.check()
}

fn render(ctx: &Context, result: &ApplyResult) {
    if result.dry_run {
        ui::header("Apply (dry run)");
    } else {
        ui::header("Apply");
    }

    for report in [&result.packages, &result.dotfiles].into_iter().flatten() {
        render_domain(ctx, report);
    }

    println!();
    if !result.success {
        let failed: usize = [&result.packages, &result.dotfiles]
            .into_iter()
            .flatten()
            .map(|r| r.errors.len())
            .sum();
        ui::error(&format!("Apply finished with {failed} error(s)"));
    } else if !result.changed {
        ui::success("Everything is up to date");
    } else if result.dry_run {
        ui::info("Dry run - no changes were made");
    } else {
        ui::success("Apply complete");
    }
}

fn render_domain(ctx: &Context, report: &DomainReport) {
    let title = match report.domain {
        declarative::Domain::Package => "Packages",
        declarative::Domain::Dotfile => "Dotfiles",
    };
    ui::section(title);

    let reconciliation = &report.reconciliation;
    if !ctx.quiet {
        ui::kv(
            "state",
            &format!(
                "{} managed, {} missing, {} untracked",
                reconciliation.managed.len(),
                reconciliation.missing.len(),
                reconciliation.untracked.len()
            ),
        );
    }

    // failure details are listed once, below
    for result in &report.operations {
        if result.outcome.is_failure() {
            println!("  {} {}", ui::status_label("failed"), result.display_name());
        } else {
            ui::operation(result);
        }
    }
    if report.operations.is_empty() && report.errors.is_empty() {
        ui::dim("nothing to do");
    }
    for error in &report.errors {
        ui::error(error);
    }
}
