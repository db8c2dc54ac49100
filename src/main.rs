use anyhow::Result;
use clap::Parser;
use recwatch::{
    app,
    cli::{handle_auth_command, handle_ledger_command, handle_status_command, Cli, CliCommand},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Some(CliCommand::Version) => {
            println!("recwatch {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some(CliCommand::Auth) => {
            handle_auth_command(config_path).await?;
            return Ok(());
        }
        Some(CliCommand::Status(args)) => {
            handle_status_command(args, config_path).await?;
            return Ok(());
        }
        Some(CliCommand::Ledger(args)) => {
            handle_ledger_command(args)?;
            return Ok(());
        }
        Some(CliCommand::Run) | None => {}
    }

    app::run_service(config_path).await
}
