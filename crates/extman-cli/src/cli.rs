//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use extman_extension::ExtensionId;

/// Extension Manager - Install, upgrade and uninstall extensions per namespace
#[derive(Parser, Debug)]
#[command(name = "extman")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (default: <config dir>/extman/config.toml)
    #[arg(long, global = true, env = "EXTMAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Compare and classify versions
    Version {
        #[command(subcommand)]
        action: VersionAction,
    },

    /// Merge and check version constraints
    Constraint {
        #[command(subcommand)]
        action: ConstraintAction,
    },

    /// Show what an install or uninstall would do
    ///
    /// Examples:
    ///   extman plan org.example:macros/2.1 -n wiki1
    ///   extman plan org.example:macros/2.1 --uninstall
    Plan {
        /// Extensions as id/version
        #[arg(required = true)]
        extensions: Vec<ExtensionId>,

        /// Target namespace, repeatable (default: root namespace)
        #[arg(short = 'n', long = "namespace")]
        namespaces: Vec<String>,

        /// Plan an uninstall instead of an install
        #[arg(long)]
        uninstall: bool,
    },

    /// Install extensions and their dependencies
    Install {
        /// Extensions as id/version
        #[arg(required = true)]
        extensions: Vec<ExtensionId>,

        /// Target namespace, repeatable (default: root namespace)
        #[arg(short = 'n', long = "namespace")]
        namespaces: Vec<String>,
    },

    /// Uninstall extensions and everything depending on them
    Uninstall {
        /// Extensions as id/version
        #[arg(required = true)]
        extensions: Vec<ExtensionId>,

        /// Namespace to uninstall from, repeatable (default: root namespace)
        #[arg(short = 'n', long = "namespace")]
        namespaces: Vec<String>,
    },

    /// List installed extensions
    List {
        /// Only extensions usable in this namespace
        #[arg(short, long)]
        namespace: Option<String>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}

/// Version subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum VersionAction {
    /// Print how two versions order
    Compare { left: String, right: String },

    /// Print the stability of a version (stable, beta or snapshot)
    Type { version: String },
}

/// Constraint subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConstraintAction {
    /// Merge constraints left to right
    Merge {
        #[arg(required = true)]
        constraints: Vec<String>,
    },

    /// Check whether a version satisfies a constraint
    Check { constraint: String, version: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_no_command() {
        let cli = Cli::parse_from(["extman"]);
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn parse_version_compare() {
        let cli = Cli::parse_from(["extman", "version", "compare", "1.0", "1.1-rc-1"]);
        assert_eq!(
            cli.command,
            Some(Commands::Version {
                action: VersionAction::Compare {
                    left: "1.0".into(),
                    right: "1.1-rc-1".into()
                }
            })
        );
    }

    #[test]
    fn parse_constraint_merge_requires_input() {
        assert!(Cli::try_parse_from(["extman", "constraint", "merge"]).is_err());
        let cli = Cli::parse_from(["extman", "constraint", "merge", "[1.0,2.0]", "[1.5,)"]);
        match cli.command {
            Some(Commands::Constraint {
                action: ConstraintAction::Merge { constraints },
            }) => assert_eq!(constraints, vec!["[1.0,2.0]", "[1.5,)"]),
            _ => panic!("Expected Constraint Merge command"),
        }
    }

    #[test]
    fn parse_install_with_namespaces() {
        let cli = Cli::parse_from([
            "extman", "install", "org.example:macros/2.1", "lib/1.0", "-n", "wiki1",
            "--namespace", "wiki2",
        ]);
        match cli.command {
            Some(Commands::Install {
                extensions,
                namespaces,
            }) => {
                assert_eq!(extensions.len(), 2);
                assert_eq!(extensions[0].id(), "org.example:macros");
                assert_eq!(namespaces, vec!["wiki1", "wiki2"]);
            }
            _ => panic!("Expected Install command"),
        }
    }

    #[test]
    fn parse_install_rejects_bad_id() {
        assert!(Cli::try_parse_from(["extman", "install", "no-version"]).is_err());
    }

    #[test]
    fn parse_plan_uninstall() {
        let cli = Cli::parse_from(["extman", "plan", "lib/1.0", "--uninstall"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Plan {
                uninstall: true,
                ..
            })
        ));
    }

    #[test]
    fn parse_list_with_global_flags() {
        let cli = Cli::parse_from(["extman", "list", "--json", "-v", "--config", "extman.toml"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("extman.toml")));
        assert_eq!(
            cli.command,
            Some(Commands::List {
                namespace: None,
                json: true
            })
        );
    }
}
