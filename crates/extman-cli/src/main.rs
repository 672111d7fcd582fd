//! Extension Manager CLI
//!
//! The command-line interface for planning, installing and uninstalling
//! extensions.

mod cli;
mod commands;
mod context;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands, ConstraintAction, VersionAction};
use error::{CliError, Result};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| CliError::user(format!("failed to set tracing subscriber: {e}")))?;
        tracing::debug!("Verbose mode enabled");
    }

    match cli.command {
        Some(cmd) => execute_command(cmd, cli.config.as_deref()),
        None => {
            println!("{} Extension Manager CLI", "extman".green().bold());
            println!();
            println!("Run {} for available commands.", "extman --help".cyan());
            Ok(())
        }
    }
}

fn execute_command(cmd: Commands, config: Option<&std::path::Path>) -> Result<()> {
    match cmd {
        Commands::Version { action } => match action {
            VersionAction::Compare { left, right } => commands::run_version_compare(&left, &right),
            VersionAction::Type { version } => commands::run_version_type(&version),
        },
        Commands::Constraint { action } => match action {
            ConstraintAction::Merge { constraints } => commands::run_constraint_merge(&constraints),
            ConstraintAction::Check {
                constraint,
                version,
            } => commands::run_constraint_check(&constraint, &version),
        },
        Commands::Plan {
            extensions,
            namespaces,
            uninstall,
        } => {
            let manager = context::load_manager(config)?;
            commands::run_plan(&manager, extensions, namespaces, uninstall)
        }
        Commands::Install {
            extensions,
            namespaces,
        } => {
            let manager = context::load_manager(config)?;
            commands::run_install(&manager, extensions, namespaces)
        }
        Commands::Uninstall {
            extensions,
            namespaces,
        } => {
            let manager = context::load_manager(config)?;
            commands::run_uninstall(&manager, extensions, namespaces)
        }
        Commands::List { namespace, json } => {
            let manager = context::load_manager(config)?;
            commands::run_list(&manager, namespace.as_deref(), json)
        }
    }
}
