//! Package commands: install, uninstall, upgrade, search and info

use anyhow::{Result, bail};
use colored::Colorize;
use lockfile::LockStore;

use super::{Env, print_json};
use crate::Context;
use crate::cli::{InfoArgs, InstallArgs, OutputFormat, SearchArgs, UninstallArgs, UpgradeArgs};
use crate::engine::operations::{
    OperationReport, install_packages, parse_package_spec, uninstall_packages,
};
use crate::engine::query::{InfoReport, InfoStatus, SearchReport, package_info, search_packages};
use crate::engine::upgrade::{UpgradeReport, upgrade_packages};
use crate::progress::BarProgress;
use crate::ui;

pub fn install(ctx: &Context, args: &InstallArgs) -> Result<()> {
    let env = Env::load()?;
    let default_manager = args
        .manager
        .as_deref()
        .unwrap_or(&env.config.default_manager);
    if !env.registry.contains(default_manager) {
        bail!("unknown package manager '{default_manager}'");
    }
    let specs = args
        .packages
        .iter()
        .map(|p| parse_package_spec(p, default_manager))
        .collect::<Result<Vec<_>>>()?;

    let json = args.output.output == OutputFormat::Json;
    let mut store = LockStore::open(env.lock_path())?;
    let mut progress = BarProgress::new(ctx.quiet || json);
    let report = install_packages(
        &mut store,
        &env.registry,
        &specs,
        args.dry_run,
        &env.deadline(),
        &mut progress,
    )?;

    finish(&report, json, args.dry_run, "install")
}

pub fn uninstall(ctx: &Context, args: &UninstallArgs) -> Result<()> {
    let env = Env::load()?;
    let json = args.output.output == OutputFormat::Json;
    let mut store = LockStore::open(env.lock_path())?;
    let mut progress = BarProgress::new(ctx.quiet || json);
    let report = uninstall_packages(
        &mut store,
        &env.registry,
        &args.packages,
        args.dry_run,
        &env.deadline(),
        &mut progress,
    )?;

    finish(&report, json, args.dry_run, "uninstall")
}

fn finish(report: &OperationReport, json: bool, dry_run: bool, verb: &str) -> Result<()> {
    if json {
        print_json(report)?;
    } else {
        for result in &report.results {
            ui::operation(result);
        }
        for warning in &report.warnings {
            ui::warn(warning);
        }
        if dry_run {
            ui::info("Dry run - no changes were made");
        }
    }

    let failed = report.failed();
    if failed > 0 {
        bail!("{failed} package(s) failed to {verb}");
    }
    Ok(())
}

pub fn upgrade(ctx: &Context, args: &UpgradeArgs) -> Result<()> {
    let env = Env::load()?;
    let json = args.output.output == OutputFormat::Json;
    let mut store = LockStore::open(env.lock_path())?;
    let mut progress = BarProgress::new(ctx.quiet || json);
    let report = upgrade_packages(
        &mut store,
        &env.registry,
        &args.targets,
        args.dry_run,
        &env.deadline(),
        &mut progress,
    )?;

    if json {
        print_json(&report)?;
    } else {
        render_upgrade(&report, args.dry_run);
    }

    let failed = report.failed();
    if failed > 0 {
        bail!("{failed} package(s) failed to upgrade");
    }
    Ok(())
}

fn render_upgrade(report: &UpgradeReport, dry_run: bool) {
    if report.results.is_empty() {
        ui::info("No managed packages to upgrade");
        return;
    }
    for result in &report.results {
        ui::operation(&result.operation);
        if let (Some(from), Some(to)) = (&result.from_version, &result.to_version)
            && from != to
        {
            ui::dim(&format!("{from} {} {to}", "→".cyan()));
        }
    }
    let summary = &report.summary;
    println!();
    if dry_run {
        ui::info(&format!("{} package(s) would be upgraded", summary.planned));
    } else {
        ui::kv("upgraded", &summary.upgraded.to_string());
        ui::kv("up-to-date", &summary.skipped.to_string());
        ui::kv("failed", &summary.failed.to_string());
    }
}

pub fn search(_ctx: &Context, args: &SearchArgs) -> Result<()> {
    let env = Env::load()?;
    let report = search_packages(
        &env.registry,
        &args.query,
        args.manager.as_deref(),
        &env.deadline(),
    )?;

    match args.output.output {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => render_search(&report),
    }
    Ok(())
}

fn render_search(report: &SearchReport) {
    if report.results.is_empty() {
        ui::info(&format!("No packages found for '{}'", report.query));
    }
    for hit in &report.results {
        ui::section(&format!("{} ({})", hit.manager, hit.packages.len()));
        for package in &hit.packages {
            println!("  {package}");
        }
    }
    for error in &report.errors {
        ui::warn(error);
    }
}

pub fn info(_ctx: &Context, args: &InfoArgs) -> Result<()> {
    let env = Env::load()?;
    let store = LockStore::open(env.lock_path())?;
    let report = package_info(
        &store,
        &env.registry,
        &env.config.default_manager,
        &args.package,
        &env.deadline(),
    )?;

    match args.output.output {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => render_info(&report),
    }
    Ok(())
}

fn render_info(report: &InfoReport) {
    let manager = report.manager.as_deref().unwrap_or_default();
    let package = &report.package;
    match report.status {
        InfoStatus::Managed => ui::success(&format!("{package} is managed via {manager}")),
        InfoStatus::Installed => {
            ui::info(&format!("{package} is installed via {manager} but not managed"));
        }
        InfoStatus::Available => ui::info(&format!("{package} is available from {manager}")),
        InfoStatus::NotFound => {
            ui::warn(&format!("{package} was not found in any available package manager"));
            return;
        }
    }

    let Some(info) = &report.info else {
        return;
    };
    println!();
    ui::kv("name", &info.name);
    for (key, value) in [
        ("version", &info.version),
        ("description", &info.description),
        ("homepage", &info.homepage),
    ] {
        if let Some(value) = value {
            ui::kv(key, value);
        }
    }
    ui::kv("installed", if info.installed { "yes" } else { "no" });
}
