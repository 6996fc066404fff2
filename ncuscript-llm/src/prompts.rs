//! Prompt construction for the four automation operations.
//!
//! Every system prompt ends with the same output contract: a single JSON
//! object, no prose, no code fences. The user prompt restates the exact JSON
//! shape as a literal example.

use ncuscript_core::{
    ImprovementRequest, PostTestImprovementRequest, PromptRefinementRequest, TestGenerationRequest,
};
use serde_json::{Map, Value};

const JSON_ONLY_RULE: &str = "Respond with ONLY a single valid JSON object. \
     Do not add any text before or after it, do not wrap it in Markdown code fences, \
     and escape newlines inside string values as \\n.";

/// System and user message for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Deployment context shared by the script-oriented prompts.
struct TargetContext<'a> {
    template_id: &'a str,
    os: &'a str,
    application: &'a str,
    inspection_config: Option<&'a Map<String, Value>>,
}

impl TargetContext<'_> {
    fn render(&self) -> String {
        let mut out = format!(
            "Target context:\n- Template ID: {}\n- Operating system: {}\n- Application: {}",
            or_unspecified(self.template_id),
            or_unspecified(self.os),
            or_unspecified(self.application),
        );
        if let Some(config) = self.inspection_config {
            let rendered = serde_json::to_string_pretty(config).unwrap_or_else(|_| "{}".to_string());
            out.push_str("\n- Inspection configuration:\n");
            out.push_str(&rendered);
        }
        out
    }
}

fn or_unspecified(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        "unspecified"
    } else {
        trimmed
    }
}

// ============================================================================
// SCRIPT IMPROVEMENT
// ============================================================================

pub fn improvement_prompt(request: &ImprovementRequest) -> PromptPair {
    let context = TargetContext {
        template_id: &request.template_id,
        os: &request.os,
        application: &request.application,
        inspection_config: Some(&request.inspection_config),
    };

    let system = format!(
        "You are a senior Bash engineer who writes security-compliance inspection scripts.\n\
         Rules:\n\
         1. Keep the script POSIX-friendly Bash with a #!/bin/bash shebang.\n\
         2. Preserve the existing inspection logic unless the requirement asks to change it.\n\
         3. Never add destructive commands; inspection scripts only read system state.\n\
         4. Quote variables, check command exit codes, and report results clearly.\n\
         5. List every change you make.\n\n\
         {}\n\n{}",
        context.render(),
        JSON_ONLY_RULE
    );

    let user = format!(
        "Improve the following script.\n\n\
         Current script:\n```bash\n{}\n```\n\n\
         Requirement:\n{}\n\n\
         Respond with a JSON object of exactly this shape:\n\
         {{\"improvedScript\": \"<the complete improved script>\", \
         \"changes\": [\"<change 1>\", \"<change 2>\"], \
         \"explanation\": \"<why these changes were made>\"}}",
        request.current_script,
        or_unspecified(&request.requirement)
    );

    PromptPair { system, user }
}

// ============================================================================
// TEST GENERATION
// ============================================================================

pub fn test_generation_prompt(request: &TestGenerationRequest) -> PromptPair {
    let context = TargetContext {
        template_id: &request.template_id,
        os: &request.os,
        application: &request.application,
        inspection_config: Some(&request.inspection_config),
    };

    let system = format!(
        "You are a QA engineer who writes test harnesses for Bash security-compliance scripts.\n\
         Rules:\n\
         1. The test script must be a self-contained Bash script with a #!/bin/bash shebang.\n\
         2. Print a clear banner when the tests start and when they end.\n\
         3. Cover normal operation, missing files or services, and permission errors.\n\
         4. Give one expected result per test case, in the same order.\n\
         5. Tests must not modify the system under inspection.\n\n\
         {}\n\n{}",
        context.render(),
        JSON_ONLY_RULE
    );

    let user = format!(
        "Write a test script for the following script.\n\n\
         Script under test:\n```bash\n{}\n```\n\n\
         Requirement:\n{}\n\n\
         Respond with a JSON object of exactly this shape:\n\
         {{\"testScript\": \"<the complete test script>\", \
         \"testCases\": [\"<test case 1>\", \"<test case 2>\"], \
         \"expectedResults\": [\"<expected result 1>\", \"<expected result 2>\"], \
         \"explanation\": \"<what the tests cover>\"}}",
        request.script_content,
        or_unspecified(&request.requirement)
    );

    PromptPair { system, user }
}

// ============================================================================
// POST-TEST IMPROVEMENT
// ============================================================================

pub fn post_test_prompt(request: &PostTestImprovementRequest) -> PromptPair {
    let context = TargetContext {
        template_id: &request.template_id,
        os: &request.os,
        application: &request.application,
        inspection_config: None,
    };

    let system = format!(
        "You are a senior Bash engineer reviewing a security-compliance script after a test run.\n\
         Rules:\n\
         1. Fix every failed test first, then harden the script.\n\
         2. Keep passing behaviour intact.\n\
         3. Separate security enhancements and performance optimizations from general improvements.\n\
         4. Return the complete improved script, not a diff.\n\n\
         {}\n\n{}",
        context.render(),
        JSON_ONLY_RULE
    );

    let mut results = String::new();
    for (i, outcome) in request.test_results.iter().enumerate() {
        results.push_str(&format!(
            "{}. [{}] {}\n   Expected: {}\n   Actual: {}\n",
            i + 1,
            outcome.status.as_str().to_uppercase(),
            outcome.test_case,
            outcome.expected_result,
            outcome.actual_result
        ));
    }
    if results.is_empty() {
        results.push_str("(no test results supplied)\n");
    }

    let user = format!(
        "Original script:\n```bash\n{}\n```\n\n\
         Test results ({} passed, {} failed):\n{}\n\
         Respond with a JSON object of exactly this shape:\n\
         {{\"improvedScript\": \"<the complete improved script>\", \
         \"improvements\": [\"<improvement 1>\"], \
         \"explanation\": \"<summary of the changes>\", \
         \"securityEnhancements\": [\"<security enhancement 1>\"], \
         \"performanceOptimizations\": [\"<performance optimization 1>\"]}}",
        request.original_script,
        request.passed_count(),
        request.failed_count(),
        results
    );

    PromptPair { system, user }
}

// ============================================================================
// PROMPT REFINEMENT
// ============================================================================

pub fn refinement_prompt(request: &PromptRefinementRequest) -> PromptPair {
    let system = format!(
        "You are a prompt engineer. You rewrite prompts that instruct an AI to generate \
         Bash security-compliance scripts.\n\
         Rules:\n\
         1. Incorporate every clarification the user gave in the conversation.\n\
         2. Keep the prompt specific: target system, checks to perform, expected output.\n\
         3. Do not invent requirements the user did not state.\n\n\
         {}",
        JSON_ONLY_RULE
    );

    let mut conversation = String::new();
    for turn in &request.conversation {
        conversation.push_str(&format!(
            "{}: {}\n",
            turn.role.as_str().to_uppercase(),
            turn.content
        ));
    }
    if conversation.is_empty() {
        conversation.push_str("(no conversation)\n");
    }

    let user = format!(
        "Original prompt:\n{}\n\n\
         Conversation:\n{}\n\
         Respond with a JSON object of exactly this shape:\n\
         {{\"refinedPrompt\": \"<the rewritten prompt>\", \
         \"explanation\": \"<what changed and why>\"}}",
        request.original_prompt, conversation
    );

    PromptPair { system, user }
}
