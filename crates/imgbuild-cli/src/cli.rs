//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// imgbuild - Resolve and validate image builder templates
#[derive(Parser, Debug)]
#[command(name = "imgbuild")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Resolve every builder in a template and report problems
    ///
    /// Templates may be JSON, YAML or TOML. Exits non-zero when any
    /// builder fails to resolve.
    ///
    /// Examples:
    ///   imgbuild validate build.json
    ///   imgbuild validate build.yaml --var version=1.2 --json
    Validate {
        /// Template file
        template: PathBuf,

        /// Set a user variable (KEY=VALUE), overriding the template default
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,

        /// Only resolve the builder with this name
        #[arg(long)]
        only: Option<String>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// List the configuration keys a builder entry accepts
    Fields {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}
