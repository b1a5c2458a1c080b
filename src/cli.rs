//! Command-line interface definitions using clap

use clap::{Parser, Subcommand};

/// pixelrelay - server-side pixel event ingestion
#[derive(Parser)]
#[command(name = "pixelrelay")]
#[command(version)]
#[command(about = "Server-side pixel event ingestion and Conversions API relay", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short = 'c', global = true, default_value = "config.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Print a sample configuration file to stdout
    GenerateConfig,

    /// Apply database migrations and exit
    Migrate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_none() {
        let cli = Cli::try_parse_from(["pixelrelay"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, "config.toml");
    }

    #[test]
    fn test_subcommands_and_config_flag() {
        let cli = Cli::try_parse_from(["pixelrelay", "migrate", "-c", "/etc/pr.toml"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Migrate));
        assert_eq!(cli.config, "/etc/pr.toml");

        let cli = Cli::try_parse_from(["pixelrelay", "generate-config"]).unwrap();
        assert_eq!(cli.command, Some(Commands::GenerateConfig));
    }
}
