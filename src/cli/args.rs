use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "recwatch")]
#[command(about = "Watches a recording directory, remuxes finished sessions and uploads them", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: ~/.config/recwatch/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Run the watcher service (default)
    Run,
    /// Authorize Google Drive access and store the refresh token
    Auth,
    /// Show the status of a running service
    Status(StatusCliArgs),
    /// List recordings already handed to the pipeline
    Ledger(LedgerCliArgs),
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct StatusCliArgs {
    /// Base URL of the service (default: http://127.0.0.1:<server.port>)
    #[arg(long)]
    pub url: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct LedgerCliArgs {
    /// Maximum number of entries to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_command_runs_service() {
        let cli = Cli::parse_from(["recwatch"]);
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["recwatch", "ledger", "--limit", "5", "-v", "--config", "/tmp/c.toml"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        match cli.command {
            Some(CliCommand::Ledger(args)) => assert_eq!(args.limit, 5),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
