//! Command-line argument parsing.

use std::path::PathBuf;

pub const USAGE: &str =
    "Usage: ncuscript <improve|test|post-test|refine> <request.json> [--config <path>]";

/// Which orchestrator operation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Improve,
    Test,
    PostTest,
    Refine,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Improve => "improve",
            Self::Test => "test",
            Self::PostTest => "post-test",
            Self::Refine => "refine",
        }
    }
}

impl std::str::FromStr for Action {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "improve" => Ok(Self::Improve),
            "test" => Ok(Self::Test),
            "post-test" => Ok(Self::PostTest),
            "refine" => Ok(Self::Refine),
            other => Err(UsageError::UnknownAction(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("Missing command")]
    MissingAction,
    #[error("Unknown command: {0}")]
    UnknownAction(String),
    #[error("Missing request file")]
    MissingRequestPath,
    #[error("--config requires a path")]
    MissingConfigValue,
    #[error("Unexpected argument: {0}")]
    UnexpectedArgument(String),
    #[error("Help requested")]
    HelpRequested,
}

/// A parsed invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub action: Action,
    pub request_path: PathBuf,
    pub config_path: Option<PathBuf>,
}

impl Command {
    /// Parse arguments, excluding the program name.
    ///
    /// `--config` may appear anywhere after the program name.
    pub fn parse<I, S>(args: I) -> Result<Self, UsageError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut positional = Vec::new();
        let mut config_path = None;

        let mut args = args.into_iter().map(Into::into);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => return Err(UsageError::HelpRequested),
                "--config" => {
                    let value = args.next().ok_or(UsageError::MissingConfigValue)?;
                    config_path = Some(PathBuf::from(value));
                }
                flag if flag.starts_with("--") => {
                    return Err(UsageError::UnexpectedArgument(arg));
                }
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let action = positional
            .next()
            .ok_or(UsageError::MissingAction)?
            .parse::<Action>()?;
        let request_path = positional
            .next()
            .map(PathBuf::from)
            .ok_or(UsageError::MissingRequestPath)?;
        if let Some(extra) = positional.next() {
            return Err(UsageError::UnexpectedArgument(extra));
        }

        Ok(Self {
            action,
            request_path,
            config_path,
        })
    }
}
