//! `plonk add`, `plonk rm` and `plonk diff`

use anyhow::{Result, bail};
use colored::Colorize;
use declarative::Item;
use similar::{ChangeTag, TextDiff};

use super::Env;
use crate::Context;
use crate::dotfiles::DotfileProvider;
use crate::engine::reconcile_dotfiles;
use crate::ui;

pub fn add(_ctx: &Context, paths: &[String]) -> Result<()> {
    let env = Env::load()?;
    let provider = env.dotfiles()?;

    for path in paths {
        let items = provider.adopt(path)?;
        for item in &items {
            let destination = item.path.as_deref().map(|p| env.display(p)).unwrap_or_default();
            ui::success(&format!("Now managing {} ({destination})", item.name));
        }
    }
    Ok(())
}

pub fn rm(_ctx: &Context, names: &[String]) -> Result<()> {
    let env = Env::load()?;
    let provider = env.dotfiles()?;

    for name in names {
        let removed = provider.forget(name)?;
        ui::success(&format!("No longer managing {name}"));
        ui::dim(&format!("removed {}", env.display(&removed)));
    }
    Ok(())
}

pub fn diff(_ctx: &Context, name: Option<&str>) -> Result<()> {
    let env = Env::load()?;
    let provider = env.dotfiles()?;
    let result = reconcile_dotfiles(&provider, &env.deadline())?;

    let wanted = name.map(|n| provider.resolve_name(n)).transpose()?;
    let managed: Vec<&Item> = result
        .managed
        .iter()
        .filter(|item| wanted.as_ref().is_none_or(|w| &item.name == w))
        .collect();
    if let Some(wanted) = &wanted
        && managed.is_empty()
    {
        bail!("'{wanted}' is not a deployed dotfile");
    }

    let mut drifted = 0;
    for item in managed {
        if !provider.is_drifted(item)? {
            continue;
        }
        drifted += 1;
        let (source, live) = provider.contents(item)?;
        let path = item.path.as_deref().map(|p| env.display(p)).unwrap_or_default();
        ui::section(&path);
        print_diff(&source, &live);
    }

    if drifted == 0 {
        ui::success("No drift");
    }
    Ok(())
}

/// Changes needed to turn the source into what is deployed
fn print_diff(source: &str, live: &str) {
    let diff = TextDiff::from_lines(source, live);
    for group in diff.grouped_ops(3) {
        for op in group {
            for change in diff.iter_changes(&op) {
                match change.tag() {
                    ChangeTag::Delete => print!("{}", format!("- {change}").red()),
                    ChangeTag::Insert => print!("{}", format!("+ {change}").green()),
                    ChangeTag::Equal => print!("{}", format!("  {change}").dimmed()),
                }
                if change.missing_newline() {
                    println!();
                }
            }
        }
        println!("{}", "  ...".dimmed());
    }
}
