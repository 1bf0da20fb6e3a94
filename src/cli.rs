use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::engine::Scope;

#[derive(Parser)]
#[command(name = "plonk")]
#[command(version)]
#[command(about = "Declarative packages and dotfiles, reconciled", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Install missing packages and deploy dotfiles
    Apply(ApplyArgs),

    /// Show managed, missing and untracked items
    Status(OutputArgs),

    /// Install packages and add them to the lock file
    Install(InstallArgs),

    /// Uninstall packages and remove them from the lock file
    Uninstall(UninstallArgs),

    /// Upgrade managed packages
    Upgrade(UpgradeArgs),

    /// Search for packages across managers
    Search(SearchArgs),

    /// Show details about a package
    Info(InfoArgs),

    /// Start managing dotfiles (copies them into the plonk directory)
    Add {
        /// Files or directories in $HOME, e.g. ~/.zshrc
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Stop managing dotfiles (the copy in $HOME stays)
    Rm {
        /// Dotfile names or paths
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Show how deployed dotfiles differ from their source
    Diff {
        /// Only this dotfile
        name: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Args)]
pub struct OutputArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

// ============================================================================
// Apply
// ============================================================================

#[derive(Args)]
pub struct ApplyArgs {
    /// Show what would change without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Only apply packages
    #[arg(long, conflicts_with = "dotfiles")]
    pub packages: bool,

    /// Only apply dotfiles
    #[arg(long)]
    pub dotfiles: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

impl ApplyArgs {
    pub fn scope(&self) -> Scope {
        if self.packages {
            Scope::PackagesOnly
        } else if self.dotfiles {
            Scope::DotfilesOnly
        } else {
            Scope::All
        }
    }
}

// ============================================================================
// Packages
// ============================================================================

#[derive(Args)]
pub struct InstallArgs {
    /// Packages as `name` or `manager:name`
    #[arg(required = true)]
    pub packages: Vec<String>,

    /// Manager for packages without a `manager:` prefix
    #[arg(short, long)]
    pub manager: Option<String>,

    /// Show what would be installed
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args)]
pub struct UninstallArgs {
    /// Packages as `name`, `manager:name` or a manager
    #[arg(required = true)]
    pub packages: Vec<String>,

    /// Show what would be removed
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args)]
pub struct UpgradeArgs {
    /// Packages or managers to upgrade (all when empty)
    pub targets: Vec<String>,

    /// Show what would be upgraded
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Search term, optionally `manager:term`
    pub query: String,

    /// Only search this manager
    #[arg(short, long)]
    pub manager: Option<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args)]
pub struct InfoArgs {
    /// Package as `name` or `manager:name`
    pub package: String,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_scope() {
        let cli = Cli::parse_from(["plonk", "apply", "--packages", "--dry-run"]);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert!(args.dry_run);
        assert_eq!(args.scope(), Scope::PackagesOnly);
        assert_eq!(args.output.output, OutputFormat::Table);
    }

    #[test]
    fn test_apply_scopes_conflict() {
        assert!(Cli::try_parse_from(["plonk", "apply", "--packages", "--dotfiles"]).is_err());
    }

    #[test]
    fn test_install_requires_packages() {
        assert!(Cli::try_parse_from(["plonk", "install"]).is_err());
        let cli = Cli::parse_from(["plonk", "-v", "install", "jq", "npm:prettier", "-o", "json"]);
        assert_eq!(cli.verbose, 1);
        let Command::Install(args) = cli.command else {
            panic!("expected install");
        };
        assert_eq!(args.packages, vec!["jq", "npm:prettier"]);
        assert_eq!(args.output.output, OutputFormat::Json);
    }

    #[test]
    fn test_upgrade_without_targets() {
        let cli = Cli::parse_from(["plonk", "upgrade"]);
        let Command::Upgrade(args) = cli.command else {
            panic!("expected upgrade");
        };
        assert!(args.targets.is_empty());
    }

    #[test]
    fn test_search_and_info() {
        assert!(Cli::try_parse_from(["plonk", "search"]).is_err());
        let cli = Cli::parse_from(["plonk", "search", "ripgrep", "-m", "cargo"]);
        let Command::Search(args) = cli.command else {
            panic!("expected search");
        };
        assert_eq!(args.query, "ripgrep");
        assert_eq!(args.manager.as_deref(), Some("cargo"));

        let cli = Cli::parse_from(["plonk", "info", "npm:prettier", "-o", "json"]);
        let Command::Info(args) = cli.command else {
            panic!("expected info");
        };
        assert_eq!(args.package, "npm:prettier");
        assert_eq!(args.output.output, OutputFormat::Json);
    }
}
