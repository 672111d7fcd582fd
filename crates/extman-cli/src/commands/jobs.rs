//! `extman plan`, `extman install` and `extman uninstall`.

use colored::Colorize;
use extman_core::{
    ExtensionManager, InstallRequest, InstalledSet, Job, PlanAction, UninstallRequest,
};
use extman_extension::{ExtensionId, namespace_label};

use crate::error::{CliError, Result};

fn install_request(extensions: Vec<ExtensionId>, namespaces: Vec<String>) -> InstallRequest {
    InstallRequest {
        extensions,
        namespaces,
    }
}

fn uninstall_request(extensions: Vec<ExtensionId>, namespaces: Vec<String>) -> UninstallRequest {
    UninstallRequest {
        extensions,
        namespaces,
    }
}

/// Print every error and turn them into a single failure.
fn report<E: std::fmt::Display>(what: &str, errors: &[E]) -> CliError {
    for error in errors {
        eprintln!("  {} {error}", "x".red().bold());
    }
    CliError::user(format!("{what} failed with {} error(s)", errors.len()))
}

/// Handle `extman plan <id/version>... [-n ns]... [--uninstall]`
pub fn run_plan(
    manager: &ExtensionManager,
    extensions: Vec<ExtensionId>,
    namespaces: Vec<String>,
    uninstall: bool,
) -> Result<()> {
    let plan = if uninstall {
        manager.plan_uninstall(&uninstall_request(extensions, namespaces))
    } else {
        manager.plan_install(&install_request(extensions, namespaces))
    };
    let plan = plan.map_err(|errors| report("planning", &errors))?;

    if plan.is_empty() {
        println!("{}", "Nothing to do.".dimmed());
        return Ok(());
    }
    print!("{plan}");
    let changes = plan
        .actions()
        .iter()
        .filter(|n| n.action != PlanAction::None)
        .count();
    println!();
    println!("{} {changes} change(s) planned", "=>".blue().bold());
    Ok(())
}

/// Handle `extman install <id/version>... [-n ns]...`
pub fn run_install(manager: &ExtensionManager, extensions: Vec<ExtensionId>, namespaces: Vec<String>) -> Result<()> {
    let job = manager.install(install_request(extensions, namespaces))?;
    finish(&job, "install")
}

/// Handle `extman uninstall <id/version>... [-n ns]...`
pub fn run_uninstall(manager: &ExtensionManager, extensions: Vec<ExtensionId>, namespaces: Vec<String>) -> Result<()> {
    let job = manager.uninstall(uninstall_request(extensions, namespaces))?;
    finish(&job, "uninstall")
}

fn finish(job: &Job, what: &str) -> Result<()> {
    println!("{} {} ({})", "=>".blue().bold(), job.request(), job.id().to_string().dimmed());
    let applied = job.join().map_err(|errors| report(what, &errors))?;
    print_applied(&applied);
    Ok(())
}

fn print_applied(applied: &InstalledSet) {
    if applied.is_empty() {
        println!("{}", "Nothing changed.".dimmed());
        return;
    }
    for action in applied.actions() {
        let verb = match action.action {
            PlanAction::Install => "installed".green(),
            PlanAction::Upgrade => "upgraded".cyan(),
            PlanAction::Uninstall => "uninstalled".yellow(),
            PlanAction::None => continue,
        };
        let from = action
            .previous
            .as_ref()
            .map(|p| format!(" (from {})", p.version()))
            .unwrap_or_default();
        println!(
            "  {verb} {}{from} in {}",
            action.extension,
            namespace_label(action.namespace.as_deref())
        );
    }
    println!("{} {} action(s) applied", "OK".green().bold(), applied.len());
}
