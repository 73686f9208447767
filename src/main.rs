use std::io;
use std::process::ExitCode;

use clap::Parser;

mod cli;
mod commands;
mod logging;

use cli::Cli;
use logging::LogSetup;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; the environment may already be set.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let _guard = match LogSetup::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
        .json_from_env()
        .init()
    {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let mut stdout = io::stdout().lock();
    match commands::execute(&cli.command, cli.client_builder(), &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "Command failed");
            eprintln!("{}", commands::report(&err));
            ExitCode::FAILURE
        }
    }
}
