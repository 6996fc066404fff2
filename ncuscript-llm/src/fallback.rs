//! Degraded results returned when a model reply cannot be parsed.
//!
//! Each builder returns a structurally valid result whose required fields are
//! non-empty, and quotes a bounded excerpt of the raw reply so the user can see
//! what the model actually said.

use crate::extract::ParseFailure;
use ncuscript_core::{
    ImprovementRequest, ImprovementResult, PostTestImprovementRequest, PostTestImprovementResult,
    PromptRefinementRequest, PromptRefinementResult, TestGenerationRequest, TestGenerationResult,
};

const EMPTY_SCRIPT: &str = "#!/bin/bash\n";
const EMPTY_PROMPT: &str =
    "Generate a Bash inspection script. Describe the target system, the checks to perform and the expected output.";
const HEREDOC_MARKER: &str = "NCUSCRIPT_ORIGINAL_SCRIPT";

/// The first `limit` characters of `raw`, cut on a character boundary.
pub fn excerpt(raw: &str, limit: usize) -> String {
    match raw.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}... [truncated, {} bytes total]", &raw[..cut], raw.len()),
        None => raw.to_string(),
    }
}

fn diagnosis(failure: &ParseFailure, raw: &str, limit: usize) -> String {
    if raw.trim().is_empty() {
        return format!(
            "The AI response could not be parsed ({}). The model returned an empty response.",
            failure
        );
    }
    format!(
        "The AI response could not be parsed ({}). Raw response:\n{}",
        failure,
        excerpt(raw, limit)
    )
}

fn script_or_shebang(script: &str) -> String {
    if script.trim().is_empty() {
        EMPTY_SCRIPT.to_string()
    } else {
        script.to_string()
    }
}

fn prompt_or_placeholder(prompt: &str) -> String {
    if prompt.trim().is_empty() {
        EMPTY_PROMPT.to_string()
    } else {
        prompt.to_string()
    }
}

pub fn improvement_fallback(
    request: &ImprovementRequest,
    raw: &str,
    failure: &ParseFailure,
    limit: usize,
) -> ImprovementResult {
    ImprovementResult {
        improved_script: script_or_shebang(&request.current_script),
        changes: vec![
            "AI response could not be parsed; the original script is returned unchanged."
                .to_string(),
        ],
        explanation: diagnosis(failure, raw, limit),
    }
}

/// Harness that runs the original script between a start and an end banner.
pub fn fallback_test_script(script: &str) -> String {
    let body = script_or_shebang(script);
    let body = body.trim_end_matches('\n');
    format!(
        "#!/bin/bash\n\
         # Fallback test harness: the AI response could not be parsed.\n\
         echo \"=== Test start: $(date) ===\"\n\
         bash <<'{marker}'\n\
         {body}\n\
         {marker}\n\
         status=$?\n\
         echo \"=== Test end: exit code $status ===\"\n\
         exit $status\n",
        marker = HEREDOC_MARKER,
        body = body
    )
}

pub fn test_generation_fallback(
    request: &TestGenerationRequest,
    raw: &str,
    failure: &ParseFailure,
    limit: usize,
) -> TestGenerationResult {
    TestGenerationResult {
        test_script: fallback_test_script(&request.script_content),
        test_cases: vec![
            "Run the original script end to end (AI response could not be parsed, no generated test cases)."
                .to_string(),
        ],
        expected_results: vec!["The script completes with exit code 0.".to_string()],
        explanation: diagnosis(failure, raw, limit),
    }
}

pub fn post_test_fallback(
    request: &PostTestImprovementRequest,
    raw: &str,
    failure: &ParseFailure,
    limit: usize,
) -> PostTestImprovementResult {
    PostTestImprovementResult {
        improved_script: script_or_shebang(&request.original_script),
        improvements: vec![
            "AI response could not be parsed; the original script is returned unchanged."
                .to_string(),
        ],
        explanation: diagnosis(failure, raw, limit),
        security_enhancements: Vec::new(),
        performance_optimizations: Vec::new(),
    }
}

pub fn refinement_fallback(
    request: &PromptRefinementRequest,
    raw: &str,
    failure: &ParseFailure,
    limit: usize,
) -> PromptRefinementResult {
    PromptRefinementResult {
        refined_prompt: prompt_or_placeholder(&request.original_prompt),
        explanation: format!(
            "{} The original prompt is returned unchanged.",
            diagnosis(failure, raw, limit)
        ),
    }
}
