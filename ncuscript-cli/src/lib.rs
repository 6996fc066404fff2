//! NcuScript command-line caller.
//!
//! Reads one request file, runs the matching orchestrator operation and
//! renders the result as JSON.

pub mod args;
pub mod error;
pub mod telemetry;

use args::{Action, Command};
use error::CliError;
use ncuscript_core::{AutomatorConfig, NcuResult};
use ncuscript_llm::{ChatTransport, ScriptOrchestrator};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

/// Configuration from `--config` when given, else the default search.
pub fn load_config(command: &Command) -> NcuResult<AutomatorConfig> {
    match &command.config_path {
        Some(path) => {
            let config = AutomatorConfig::from_path(path)?.with_env_overrides()?;
            config.validate()?;
            Ok(config)
        }
        None => AutomatorConfig::load(),
    }
}

pub fn read_request<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let contents = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| CliError::Request {
        path: path.display().to_string(),
        source,
    })
}

fn to_json<R: Serialize>(result: &R) -> Result<Value, CliError> {
    serde_json::to_value(result).map_err(CliError::Output)
}

/// Run the command's operation and return the result as JSON.
pub async fn execute<T: ChatTransport>(
    orchestrator: &ScriptOrchestrator<T>,
    command: &Command,
) -> Result<Value, CliError> {
    tracing::info!(
        action = command.action.as_str(),
        request = %command.request_path.display(),
        "Running request"
    );

    match command.action {
        Action::Improve => {
            let request = read_request(&command.request_path)?;
            to_json(&orchestrator.improve_script(&request).await?)
        }
        Action::Test => {
            let request = read_request(&command.request_path)?;
            to_json(&orchestrator.generate_test_script(&request).await?)
        }
        Action::PostTest => {
            let request = read_request(&command.request_path)?;
            to_json(&orchestrator.generate_improvements(&request).await?)
        }
        Action::Refine => {
            let request = read_request(&command.request_path)?;
            to_json(&orchestrator.refine_prompt(&request).await?)
        }
    }
}
