use ncuscript_cli::args::{Action, Command, UsageError, USAGE};
use ncuscript_cli::error::CliError;
use ncuscript_cli::telemetry::LogFormat;
use ncuscript_cli::{execute, load_config, read_request};
use ncuscript_core::*;
use ncuscript_llm::ScriptOrchestrator;
use ncuscript_test_utils::{fixtures, MockChatTransport};
use proptest::prelude::*;
use std::io::Write;
use std::path::PathBuf;

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn command(action: Action, path: &std::path::Path) -> Command {
    Command {
        action,
        request_path: path.to_path_buf(),
        config_path: None,
    }
}

#[test]
fn parses_action_and_request_path() {
    let command = Command::parse(["post-test", "req.json"]).unwrap();
    assert_eq!(command.action, Action::PostTest);
    assert_eq!(command.request_path, PathBuf::from("req.json"));
    assert_eq!(command.config_path, None);
}

#[test]
fn parses_config_flag_in_any_position() {
    let before = Command::parse(["--config", "a.toml", "refine", "req.json"]).unwrap();
    let after = Command::parse(["refine", "req.json", "--config", "a.toml"]).unwrap();
    assert_eq!(before, after);
    assert_eq!(before.config_path, Some(PathBuf::from("a.toml")));
}

#[test]
fn rejects_bad_invocations() {
    let empty: [&str; 0] = [];
    assert_eq!(Command::parse(empty), Err(UsageError::MissingAction));
    assert_eq!(
        Command::parse(["deploy", "req.json"]),
        Err(UsageError::UnknownAction("deploy".to_string()))
    );
    assert_eq!(Command::parse(["improve"]), Err(UsageError::MissingRequestPath));
    assert_eq!(
        Command::parse(["improve", "req.json", "--config"]),
        Err(UsageError::MissingConfigValue)
    );
    assert_eq!(
        Command::parse(["improve", "req.json", "extra"]),
        Err(UsageError::UnexpectedArgument("extra".to_string()))
    );
    assert_eq!(
        Command::parse(["improve", "req.json", "--verbose"]),
        Err(UsageError::UnexpectedArgument("--verbose".to_string()))
    );
    assert_eq!(Command::parse(["--help"]), Err(UsageError::HelpRequested));
}

#[test]
fn usage_errors_hint_usage_line() {
    let err = CliError::from(UsageError::MissingAction);
    assert_eq!(err.hint(), Some(USAGE));
}

#[test]
fn orchestrator_errors_hint_by_kind() {
    let err = CliError::from(NcuError::from(ConfigError::MissingApiKey));
    assert!(err.hint().unwrap().contains("API key"));

    let err = CliError::from(NcuError::from(LlmError::RemoteService {
        status: 429,
        message: "slow down".to_string(),
        retry_after_ms: None,
    }));
    assert!(err.hint().unwrap().contains("Rate limited"));
}

#[test]
fn log_format_from_env_value() {
    assert_eq!(LogFormat::from_env_value(Some("json")), LogFormat::Json);
    assert_eq!(LogFormat::from_env_value(Some(" JSON ")), LogFormat::Json);
    assert_eq!(LogFormat::from_env_value(Some("pretty")), LogFormat::Text);
    assert_eq!(LogFormat::from_env_value(None), LogFormat::Text);
}

#[test]
fn read_request_accepts_camel_case_json() {
    let file = write_temp(
        r#"{"originalPrompt": "Check SSH", "conversation": [{"role": "user", "content": "root login only"}]}"#,
    );
    let request: PromptRefinementRequest = read_request(file.path()).unwrap();
    assert_eq!(request.original_prompt, "Check SSH");
    assert_eq!(request.conversation[0].role, ConversationRole::User);
}

#[test]
fn read_request_reports_bad_json() {
    let file = write_temp("{not json");
    let result: Result<ImprovementRequest, _> = read_request(file.path());
    assert!(matches!(result, Err(CliError::Request { .. })));
}

#[test]
fn read_request_reports_missing_file() {
    let result: Result<ImprovementRequest, _> =
        read_request(std::path::Path::new("/nonexistent/ncuscript/request.json"));
    assert!(matches!(result, Err(CliError::Io { .. })));
}

#[test]
fn load_config_reads_explicit_file() {
    let file = write_temp(
        "model = \"anthropic/claude-3.5-sonnet\"\napi_key = \"sk-file\"\nmax_tokens = 2000\n",
    );
    let command = Command {
        action: Action::Improve,
        request_path: PathBuf::from("req.json"),
        config_path: Some(file.path().to_path_buf()),
    };

    let config = load_config(&command).unwrap();

    assert_eq!(config.max_tokens, 2000);
    assert!(config.require_api_key().is_ok());
}

#[test]
fn load_config_rejects_invalid_file() {
    let file = write_temp("temperature = 9.5\n");
    let command = Command {
        action: Action::Improve,
        request_path: PathBuf::from("req.json"),
        config_path: Some(file.path().to_path_buf()),
    };

    let result = load_config(&command);

    assert!(matches!(
        result,
        Err(NcuError::Config(ConfigError::InvalidValue { .. }))
    ));
}

#[tokio::test]
async fn execute_improve_renders_result_json() {
    let file = write_temp(&serde_json::to_string(&fixtures::improvement_request()).unwrap());
    let orchestrator = ScriptOrchestrator::with_transport(
        fixtures::test_config(),
        MockChatTransport::with_replies([fixtures::improvement_reply()]),
    );

    let output = execute(&orchestrator, &command(Action::Improve, file.path()))
        .await
        .unwrap();

    assert!(output["improvedScript"].as_str().unwrap().contains("set -u"));
    assert_eq!(output["changes"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn execute_post_test_uses_fallback_on_prose() {
    let file = write_temp(&serde_json::to_string(&fixtures::post_test_request()).unwrap());
    let orchestrator = ScriptOrchestrator::with_transport(
        fixtures::test_config(),
        MockChatTransport::with_replies(["The script looks fine to me."]),
    );

    let output = execute(&orchestrator, &command(Action::PostTest, file.path()))
        .await
        .unwrap();

    assert_eq!(output["improvedScript"], fixtures::sshd_script());
    assert_eq!(output["securityEnhancements"], serde_json::json!([]));
    assert!(output["explanation"]
        .as_str()
        .unwrap()
        .contains("The script looks fine to me."));
}

#[tokio::test]
async fn execute_surfaces_missing_key() {
    let file = write_temp(&serde_json::to_string(&fixtures::refinement_request()).unwrap());
    let orchestrator = ScriptOrchestrator::with_transport(
        fixtures::config_without_key(),
        MockChatTransport::new(),
    );

    let result = execute(&orchestrator, &command(Action::Refine, file.path())).await;

    match result {
        Err(err @ CliError::Ncu(_)) => {
            assert!(err.hint().unwrap().contains("API key"));
        }
        other => panic!("Expected orchestrator error, got {:?}", other),
    }
    assert_eq!(orchestrator.transport().calls(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any known action and path parse back to themselves, with or without --config.
    #[test]
    fn prop_command_parse_roundtrip(
        action in prop_oneof![
            Just(Action::Improve),
            Just(Action::Test),
            Just(Action::PostTest),
            Just(Action::Refine),
        ],
        path in "[a-z][a-z0-9_]{0,12}\\.json",
        config in proptest::option::of("[a-z][a-z0-9_]{0,12}\\.toml"),
    ) {
        let mut args = vec![action.as_str().to_string(), path.clone()];
        if let Some(config) = &config {
            args.push("--config".to_string());
            args.push(config.clone());
        }

        let command = Command::parse(args).unwrap();

        prop_assert_eq!(command.action, action);
        prop_assert_eq!(command.request_path, PathBuf::from(&path));
        prop_assert_eq!(command.config_path, config.map(PathBuf::from));
    }
}
