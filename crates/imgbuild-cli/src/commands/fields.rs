//! Fields command: list accepted configuration keys

use colored::Colorize;
use imgbuild_config::normalize::KNOWN_KEYS;

use crate::error::Result;

/// Run the fields command
pub fn run_fields(json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(KNOWN_KEYS)?);
        return Ok(());
    }

    println!("{} Accepted builder keys:", "=>".blue().bold());
    for key in KNOWN_KEYS {
        println!("   {} {}", "-".dimmed(), key.cyan());
    }
    Ok(())
}
