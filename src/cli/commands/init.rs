//! Init and Check commands.

use std::path::Path;

use crate::config::{ConfigError, Secret, Settings};

/// Default file written by `init` when no `--config` is given.
pub const DEFAULT_INIT_PATH: &str = "fileguard.toml";

/// Run init command - write an example configuration file.
pub fn run_init(path: Option<&Path>, force: bool) -> Result<(), ConfigError> {
    let path = path.unwrap_or(Path::new(DEFAULT_INIT_PATH));
    let existed = path.exists();

    let path = Settings::init_config_file(path, force)?;
    if existed {
        println!("Overwrote configuration at: {}", path.display());
    } else {
        println!("Created configuration file at: {}", path.display());
    }
    println!("Edit monitor_folders and the SMTP settings before running `fileguard watch`.");
    Ok(())
}

/// Run check command - print the effective configuration and target status.
pub fn run_check(settings: &Settings) {
    let mut shown = settings.clone();
    if !shown.email_password.is_empty() {
        shown.email_password = Secret::new("****");
    }

    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    match toml::to_string_pretty(&shown) {
        Ok(toml_str) => println!("{toml_str}"),
        Err(e) => eprintln!("Error displaying config: {e}"),
    }

    println!("Monitor targets:");
    for target in settings.targets() {
        let status = if target.path.is_dir() {
            "ok"
        } else if target.path.exists() {
            "not a directory"
        } else {
            "missing"
        };
        println!("  {} [{status}]", target.path.display());
    }
}
