use std::process::ExitCode;

use clap::Parser;
use fileguard::cli::commands::{init, watch};
use fileguard::cli::{Cli, Commands};
use fileguard::config::Settings;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command.clone().unwrap_or(Commands::Watch) {
        Commands::Init { force } => match init::run_init(cli.config.as_deref(), force) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        },

        Commands::Check => {
            let settings = load_settings(&cli);
            init::run_check(&settings);
            ExitCode::SUCCESS
        }

        Commands::Watch => {
            let settings = load_settings(&cli);
            fileguard::logging::init_with_config(&settings.logging);

            match watch::run(settings).await {
                Ok(code) => ExitCode::from(code),
                Err(e) => {
                    eprintln!("Error: {e:#}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

/// Load and validate configuration; any failure is fatal.
fn load_settings(cli: &Cli) -> Settings {
    match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Run 'fileguard init' to create an example configuration.");
            std::process::exit(1);
        }
    }
}
