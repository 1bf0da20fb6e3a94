//! `plonk status`: reconciliation of both domains, without applying

use anyhow::Result;
use colored::Colorize;
use declarative::ReconciliationResult;
use lockfile::LockStore;
use serde::Serialize;

use super::{Env, print_json};
use crate::Context;
use crate::cli::OutputFormat;
use crate::engine::{reconcile_dotfiles, reconcile_packages};
use crate::ui;

#[derive(Debug, Serialize)]
struct StatusReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    packages: Option<ReconciliationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dotfiles: Option<ReconciliationResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

pub fn run(ctx: &Context, output: OutputFormat) -> Result<()> {
    let env = Env::load()?;
    let deadline = env.deadline();
    let mut report = StatusReport {
        packages: None,
        dotfiles: None,
        errors: Vec::new(),
    };

    match LockStore::open(env.lock_path()) {
        Ok(store) => {
            let packages_deadline = deadline.child(env.config.package_timeout());
            report.packages = Some(reconcile_packages(
                store.lock(),
                &env.registry,
                &packages_deadline,
            ));
        }
        Err(e) => report.errors.push(e.to_string()),
    }

    let provider = env.dotfiles()?;
    let dotfiles_deadline = deadline.child(env.config.dotfile_timeout());
    match reconcile_dotfiles(&provider, &dotfiles_deadline) {
        Ok(result) => report.dotfiles = Some(result),
        Err(e) => report.errors.push(format!("{e:#}")),
    }

    match output {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => render(ctx, &env, &report),
    }
    Ok(())
}

fn render(ctx: &Context, env: &Env, report: &StatusReport) {
    ui::header("Plonk Status");
    ui::kv("plonk dir", &env.display(&env.plonk_dir));

    for (title, result) in [("Packages", &report.packages), ("Dotfiles", &report.dotfiles)] {
        let Some(result) = result else {
            continue;
        };
        ui::section(title);
        ui::kv("managed", &result.managed.len().to_string());
        ui::kv("missing", &result.missing.len().to_string());
        ui::kv("untracked", &result.untracked.len().to_string());
        if !result.errors.is_empty() {
            ui::kv("errors", &result.errors.len().to_string().red().to_string());
        }

        for item in &result.missing {
            println!("  {} {}", "✗ missing".yellow(), item);
        }
        for item in &result.errors {
            let reason = item.error.as_deref().unwrap_or_default();
            println!("  {} {} {}", "✗ error".red(), item, format!("({reason})").dimmed());
        }
        if ctx.verbose > 0 {
            for item in &result.untracked {
                println!("  {} {}", "? untracked".dimmed(), item);
            }
        }
    }

    for error in &report.errors {
        ui::error(error);
    }

    let converged = report.errors.is_empty()
        && [&report.packages, &report.dotfiles]
            .into_iter()
            .flatten()
            .all(ReconciliationResult::is_converged);
    println!();
    if converged {
        ui::success("Everything is in sync");
    } else {
        ui::info("Run 'plonk apply' to converge");
    }
}
