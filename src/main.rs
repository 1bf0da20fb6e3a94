mod cli;
mod commands;
mod config;
mod dotfiles;
mod engine;
mod paths;
mod progress;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match cli.command {
        Command::Apply(args) => commands::apply::run(&ctx, &args),
        Command::Status(args) => commands::status::run(&ctx, args.output),
        Command::Install(args) => commands::packages::install(&ctx, &args),
        Command::Uninstall(args) => commands::packages::uninstall(&ctx, &args),
        Command::Upgrade(args) => commands::packages::upgrade(&ctx, &args),
        Command::Search(args) => commands::packages::search(&ctx, &args),
        Command::Info(args) => commands::packages::info(&ctx, &args),
        Command::Add { paths } => commands::dotfiles::add(&ctx, &paths),
        Command::Rm { names } => commands::dotfiles::rm(&ctx, &names),
        Command::Diff { name } => commands::dotfiles::diff(&ctx, name.as_deref()),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "plonk", &mut io::stdout());
            Ok(())
        }
    }
}
