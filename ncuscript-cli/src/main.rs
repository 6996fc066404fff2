//! NcuScript CLI entry point.

use ncuscript_cli::args::{Command, UsageError, USAGE};
use ncuscript_cli::error::CliError;
use ncuscript_cli::telemetry::{self, LogFormat};
use ncuscript_cli::{execute, load_config};
use ncuscript_llm::ScriptOrchestrator;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = telemetry::init_tracing(LogFormat::from_env()) {
        eprintln!("{}", err);
    }

    match run().await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(CliError::Usage(UsageError::HelpRequested)) => {
            println!("{}", USAGE);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            if let Some(hint) = err.hint() {
                eprintln!("{}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<String, CliError> {
    let command = Command::parse(std::env::args().skip(1))?;
    let config = load_config(&command)?;
    let orchestrator = ScriptOrchestrator::from_config(config)?;
    let result = execute(&orchestrator, &command).await?;
    serde_json::to_string_pretty(&result).map_err(CliError::Output)
}
