//! Script automation request and result types.
//!
//! Pure data types exchanged with the orchestrator. Field names serialize in
//! camelCase so the records match the JSON the console and the model use.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// SCRIPT IMPROVEMENT
// ============================================================================

/// Request to improve an existing compliance script.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImprovementRequest {
    pub current_script: String,
    pub requirement: String,
    #[serde(default)]
    pub template_id: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub application: String,
    /// Opaque inspection settings, passed through to the prompt verbatim.
    #[serde(default)]
    pub inspection_config: Map<String, Value>,
}

/// Improved script plus the list of changes the model made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImprovementResult {
    pub improved_script: String,
    pub changes: Vec<String>,
    pub explanation: String,
}

// ============================================================================
// TEST GENERATION
// ============================================================================

/// Request to generate a test harness for a script.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestGenerationRequest {
    pub script_content: String,
    #[serde(default)]
    pub requirement: String,
    #[serde(default)]
    pub template_id: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub application: String,
    #[serde(default)]
    pub inspection_config: Map<String, Value>,
}

/// Generated test harness.
///
/// `expected_results` is meant to line up with `test_cases` index by index,
/// but the model is free to return a different count and nothing here
/// enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestGenerationResult {
    pub test_script: String,
    pub test_cases: Vec<String>,
    #[serde(default)]
    pub expected_results: Vec<String>,
    pub explanation: String,
}

impl TestGenerationResult {
    /// Pair each test case with its expected result, if the model supplied one.
    pub fn paired_cases(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.test_cases
            .iter()
            .enumerate()
            .map(|(i, case)| (case.as_str(), self.expected_results.get(i).map(String::as_str)))
    }
}

// ============================================================================
// POST-TEST IMPROVEMENT
// ============================================================================

/// Outcome of a single executed test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for TestStatus {
    type Err = TestStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "passed" => Ok(Self::Passed),
            "failed" => Ok(Self::Failed),
            _ => Err(TestStatusParseError(s.to_string())),
        }
    }
}

/// Error parsing TestStatus from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestStatusParseError(pub String);

impl std::fmt::Display for TestStatusParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid test status: {}", self.0)
    }
}

impl std::error::Error for TestStatusParseError {}

/// One row of a test run, as reported back by the console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    pub test_case: String,
    pub expected_result: String,
    pub actual_result: String,
    pub status: TestStatus,
}

/// Request to improve a script after its tests were run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostTestImprovementRequest {
    pub original_script: String,
    pub test_results: Vec<TestOutcome>,
    #[serde(default)]
    pub template_id: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub application: String,
}

impl PostTestImprovementRequest {
    pub fn passed_count(&self) -> usize {
        self.count_with(TestStatus::Passed)
    }

    pub fn failed_count(&self) -> usize {
        self.count_with(TestStatus::Failed)
    }

    fn count_with(&self, status: TestStatus) -> usize {
        self.test_results.iter().filter(|t| t.status == status).count()
    }
}

/// Improvement suggestions derived from test results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostTestImprovementResult {
    pub improved_script: String,
    pub improvements: Vec<String>,
    pub explanation: String,
    #[serde(default)]
    pub security_enhancements: Vec<String>,
    #[serde(default)]
    pub performance_optimizations: Vec<String>,
}

// ============================================================================
// PROMPT REFINEMENT
// ============================================================================

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationRole {
    User,
    Assistant,
}

impl ConversationRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for ConversationRole {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(RoleParseError(s.to_string())),
        }
    }
}

/// Error parsing ConversationRole from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleParseError(pub String);

impl std::fmt::Display for RoleParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid conversation role: {}", self.0)
    }
}

impl std::error::Error for RoleParseError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: ConversationRole,
    pub content: String,
}

/// Request to rewrite a prompt given the discussion around it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRefinementRequest {
    pub original_prompt: String,
    #[serde(default)]
    pub conversation: Vec<ConversationTurn>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRefinementResult {
    pub refined_prompt: String,
    pub explanation: String,
}

// ============================================================================
// TESTS
// ============================================================================
