//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// File-integrity monitor
#[derive(Parser, Debug)]
#[command(
    name = "fileguard",
    version = env!("CARGO_PKG_VERSION"),
    about = "Watch folders and alert on file activity",
    long_about = "Watch folders for create/modify/delete/move activity and raise alerts \
                  through the activity log, desktop notifications and email.",
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to the configuration file (.toml or .json)
    #[arg(short, long, global = true, env = "FILEGUARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Defaults to `watch`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Monitor the configured folders until interrupted
    Watch,

    /// Write an example configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the configuration and show what would be monitored
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_watch() {
        let cli = Cli::try_parse_from(["fileguard"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["fileguard", "init", "--force", "-c", "/tmp/f.toml"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Init { force: true }));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/f.toml")));
    }
}
