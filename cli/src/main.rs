//! Main entry point for envsync CLI

use clap::Parser;

mod cli;
mod commands;
mod output;
mod progress;

use cli::Cli;
use commands::execute_command;

fn main() {
    // Load environment variables from .env file if present
    if std::path::Path::new(".env").exists() {
        if let Err(e) = dotenv::dotenv() {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging, at Debug when verbose output is requested
    env_logger::Builder::from_default_env()
        .filter_level(log_level(cli.verbose))
        .init();

    // Execute the command
    if let Err(e) = execute_command(cli.command, cli.config.as_deref()) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn log_level(verbose: bool) -> log::LevelFilter {
    if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_enables_debug_records() {
        let logger = env_logger::Builder::new()
            .filter_level(log_level(true))
            .build();
        let debug = log::Metadata::builder()
            .level(log::Level::Debug)
            .target("envsync_core::session")
            .build();
        assert!(log::Log::enabled(&logger, &debug));
    }

    #[test]
    fn test_default_level_is_info() {
        assert_eq!(log_level(false), log::LevelFilter::Info);

        let logger = env_logger::Builder::new()
            .filter_level(log_level(false))
            .build();
        let debug = log::Metadata::builder()
            .level(log::Level::Debug)
            .target("envsync_core::session")
            .build();
        assert!(!log::Log::enabled(&logger, &debug));
    }
}
