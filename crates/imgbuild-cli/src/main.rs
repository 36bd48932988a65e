//! imgbuild CLI
//!
//! Resolves image builder templates and reports every configuration
//! problem at once.

mod cli;
mod commands;
mod error;
mod template;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands};
use commands::ValidateOptions;
use error::Result;

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
            .expect("Failed to set tracing subscriber");
        tracing::debug!("Verbose mode enabled");
    }

    match cli.command {
        Some(cmd) => execute_command(cmd),
        None => {
            println!("{} image builder configuration tool", "imgbuild".green().bold());
            println!();
            println!("Run {} for available commands.", "imgbuild --help".cyan());
            Ok(())
        }
    }
}

fn execute_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Validate {
            template,
            vars,
            only,
            json,
        } => commands::run_validate(&template, &ValidateOptions { vars, only, json }),
        Commands::Fields { json } => commands::run_fields(json),
    }
}
