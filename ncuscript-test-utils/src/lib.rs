//! NcuScript Test Utilities
//!
//! Shared test infrastructure for the NcuScript workspace:
//! - A scripted chat transport that records what it was sent
//! - Test fixtures for the four automation requests
//! - Proptest generators for requests and model replies
//! - Assertions for error categories and fallback results

pub use ncuscript_core::{
    AutomatorConfig, ConfigError, ConversationRole, ConversationTurn, ErrorKind,
    ImprovementRequest, ImprovementResult, LlmError, NcuError, NcuResult,
    PostTestImprovementRequest, PostTestImprovementResult, PromptRefinementRequest,
    PromptRefinementResult, TestGenerationRequest, TestGenerationResult, TestOutcome, TestStatus,
};
pub use ncuscript_llm::{ChatTransport, CompletionRequest};

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

// ============================================================================
// MOCK TRANSPORT
// ============================================================================

/// Chat transport that replays scripted replies in order.
///
/// Every request is recorded, including those that receive an error. Once the
/// script is exhausted further calls fail with a transport error.
#[derive(Debug, Default)]
pub struct MockChatTransport {
    replies: Mutex<VecDeque<NcuResult<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockChatTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that answers every call in `replies` in order.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let transport = Self::new();
        for reply in replies {
            transport.push_reply(reply);
        }
        transport
    }

    /// A transport whose first call fails with `error`.
    pub fn failing(error: impl Into<NcuError>) -> Self {
        let transport = Self::new();
        transport.push_error(error);
        transport
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.lock_replies().push_back(Ok(reply.into()));
    }

    pub fn push_error(&self, error: impl Into<NcuError>) {
        self.lock_replies().push_back(Err(error.into()));
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> usize {
        self.lock_requests().len()
    }

    /// Copies of every request received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.lock_requests().clone()
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.lock_requests().last().cloned()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<NcuResult<String>>> {
        self.replies.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_requests(&self) -> std::sync::MutexGuard<'_, Vec<CompletionRequest>> {
        self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ChatTransport for MockChatTransport {
    async fn complete(&self, request: &CompletionRequest) -> NcuResult<String> {
        self.lock_requests().push(request.clone());
        self.lock_replies().pop_front().unwrap_or_else(|| {
            Err(NcuError::Llm(LlmError::Transport {
                endpoint: "mock://chat".to_string(),
                reason: "no scripted reply left".to_string(),
            }))
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made requests and configurations.

    use super::*;
    use serde_json::{json, Map, Value};

    pub const TEST_API_KEY: &str = "sk-test-0000";

    /// Default configuration with a test API key.
    pub fn test_config() -> AutomatorConfig {
        AutomatorConfig {
            api_key: Some(TEST_API_KEY.to_string()),
            ..Default::default()
        }
    }

    /// Test configuration pointed at `endpoint` (a mock server).
    pub fn config_for_endpoint(endpoint: impl Into<String>) -> AutomatorConfig {
        AutomatorConfig {
            endpoint: endpoint.into(),
            request_timeout_ms: 5_000,
            ..test_config()
        }
    }

    pub fn config_without_key() -> AutomatorConfig {
        AutomatorConfig {
            api_key: None,
            ..Default::default()
        }
    }

    pub fn sshd_script() -> String {
        "#!/bin/bash\ngrep -E '^PermitRootLogin' /etc/ssh/sshd_config\n".to_string()
    }

    pub fn inspection_config() -> Map<String, Value> {
        let mut config = Map::new();
        config.insert("permitRootLogin".to_string(), json!("no"));
        config.insert("maxAuthTries".to_string(), json!(4));
        config
    }

    pub fn improvement_request() -> ImprovementRequest {
        ImprovementRequest {
            current_script: sshd_script(),
            requirement: "Report the result and exit non-zero when root login is allowed"
                .to_string(),
            template_id: "tpl-ssh-01".to_string(),
            os: "Ubuntu 22.04".to_string(),
            application: "OpenSSH".to_string(),
            inspection_config: inspection_config(),
        }
    }

    pub fn test_generation_request() -> TestGenerationRequest {
        TestGenerationRequest {
            script_content: sshd_script(),
            requirement: "Cover a missing sshd_config".to_string(),
            template_id: "tpl-ssh-01".to_string(),
            os: "Ubuntu 22.04".to_string(),
            application: "OpenSSH".to_string(),
            inspection_config: inspection_config(),
        }
    }

    pub fn post_test_request() -> PostTestImprovementRequest {
        PostTestImprovementRequest {
            original_script: sshd_script(),
            test_results: vec![
                TestOutcome {
                    test_case: "config present".to_string(),
                    expected_result: "prints PermitRootLogin no".to_string(),
                    actual_result: "prints PermitRootLogin no".to_string(),
                    status: TestStatus::Passed,
                },
                TestOutcome {
                    test_case: "config missing".to_string(),
                    expected_result: "error message and exit 1".to_string(),
                    actual_result: "grep error and exit 2".to_string(),
                    status: TestStatus::Failed,
                },
            ],
            template_id: "tpl-ssh-01".to_string(),
            os: "Ubuntu 22.04".to_string(),
            application: "OpenSSH".to_string(),
        }
    }

    pub fn refinement_request() -> PromptRefinementRequest {
        PromptRefinementRequest {
            original_prompt: "Write a script that checks SSH".to_string(),
            conversation: vec![
                ConversationTurn {
                    role: ConversationRole::User,
                    content: "Only root login and password auth".to_string(),
                },
                ConversationTurn {
                    role: ConversationRole::Assistant,
                    content: "Should the script fail when either is enabled?".to_string(),
                },
                ConversationTurn {
                    role: ConversationRole::User,
                    content: "Yes, exit 1".to_string(),
                },
            ],
        }
    }

    /// A well-formed improvement reply body.
    pub fn improvement_reply() -> String {
        json!({
            "improvedScript": "#!/bin/bash\nset -u\ngrep -E '^PermitRootLogin no' /etc/ssh/sshd_config || exit 1\n",
            "changes": ["Exit non-zero when root login is allowed", "Enable nounset"],
            "explanation": "The script now reports failure through its exit code."
        })
        .to_string()
    }

    /// An OpenAI-style envelope wrapping `content`.
    pub fn completion_envelope(content: &str) -> Value {
        json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for requests and model replies.

    use super::*;
    use proptest::prelude::*;

    /// A short single-line value without braces or backticks.
    pub fn arb_plain_text() -> impl Strategy<Value = String> {
        "[A-Za-z0-9 .,:;_/-]{1,40}"
    }

    /// A small Bash script.
    pub fn arb_script() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-z]{2,8}( -[a-z])?( /[a-z]{1,8})?", 1..6)
            .prop_map(|lines| format!("#!/bin/bash\n{}\n", lines.join("\n")))
    }

    pub fn arb_test_status() -> impl Strategy<Value = TestStatus> {
        prop_oneof![Just(TestStatus::Passed), Just(TestStatus::Failed)]
    }

    pub fn arb_role() -> impl Strategy<Value = ConversationRole> {
        prop_oneof![Just(ConversationRole::User), Just(ConversationRole::Assistant)]
    }

    pub fn arb_test_outcome() -> impl Strategy<Value = TestOutcome> {
        (arb_plain_text(), arb_plain_text(), arb_plain_text(), arb_test_status()).prop_map(
            |(test_case, expected_result, actual_result, status)| TestOutcome {
                test_case,
                expected_result,
                actual_result,
                status,
            },
        )
    }

    pub fn arb_improvement_request() -> impl Strategy<Value = ImprovementRequest> {
        (arb_script(), arb_plain_text(), arb_plain_text()).prop_map(
            |(current_script, requirement, os)| ImprovementRequest {
                current_script,
                requirement,
                os,
                ..Default::default()
            },
        )
    }

    pub fn arb_post_test_request() -> impl Strategy<Value = PostTestImprovementRequest> {
        (arb_script(), prop::collection::vec(arb_test_outcome(), 0..6)).prop_map(
            |(original_script, test_results)| PostTestImprovementRequest {
                original_script,
                test_results,
                ..Default::default()
            },
        )
    }

    /// Prompts, including empty and whitespace-only ones.
    pub fn arb_prompt() -> impl Strategy<Value = String> {
        prop_oneof![
            4 => arb_plain_text(),
            1 => Just(String::new()),
            1 => "[ \t\n]{1,4}",
        ]
    }

    pub fn arb_refinement_request() -> impl Strategy<Value = PromptRefinementRequest> {
        (
            arb_prompt(),
            prop::collection::vec((arb_role(), arb_plain_text()), 0..5),
        )
            .prop_map(|(original_prompt, turns)| PromptRefinementRequest {
                original_prompt,
                conversation: turns
                    .into_iter()
                    .map(|(role, content)| ConversationTurn { role, content })
                    .collect(),
            })
    }

    /// Model replies that contain no `{` at all.
    pub fn arb_reply_without_json() -> impl Strategy<Value = String> {
        "[A-Za-z0-9 .,:;!?'\n-]{0,200}"
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over NcuScript results.

    use super::*;

    pub fn assert_error_kind<T: std::fmt::Debug>(result: &NcuResult<T>, expected: ErrorKind) {
        match result {
            Err(e) => assert_eq!(e.kind(), expected, "unexpected error: {}", e),
            Ok(value) => panic!("Expected {:?} error, got Ok({:?})", expected, value),
        }
    }

    pub fn assert_missing_api_key<T: std::fmt::Debug>(result: &NcuResult<T>) {
        assert!(
            matches!(result, Err(NcuError::Config(ConfigError::MissingApiKey))),
            "Expected MissingApiKey, got {:?}",
            result
        );
    }

    /// A fallback explanation names the parse failure.
    pub fn assert_fallback_explanation(explanation: &str) {
        assert!(
            explanation.contains("could not be parsed"),
            "Expected a fallback explanation, got: {}",
            explanation
        );
    }
}
