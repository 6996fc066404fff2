//! JSON recovery from free-form model output.
//!
//! Models asked for "only a JSON object" still wrap it in Markdown fences,
//! surround it with prose, or put literal newlines inside string values.
//! Recovery runs in two phases:
//!
//! 1. Textual pre-clean: fenced blocks and inline code spans are replaced by
//!    their contents.
//! 2. A string-aware brace scan ([`BraceScanner`]) locates a balanced
//!    top-level object, which is sanitized and parsed.
//!
//! Inline-span stripping would also eat backticks inside JSON string values
//! (Bash command substitution such as `` now=`date +%s` ``), so the scan is
//! first run on the fence-stripped text and inline spans are only removed
//! when that finds nothing. At most [`MAX_CANDIDATE_STARTS`] opening braces
//! are tried per pass, which keeps the work linear in the reply length.
//!
//! The result is a [`ParseFailure`]-tagged `Result`; callers decide what a
//! failure degrades to.

use ncuscript_core::{
    ImprovementResult, PostTestImprovementResult, PromptRefinementResult, TestGenerationResult,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+.\-]*[ \t]*\r?\n?(.*?)```").expect("Invalid fence regex")
});

static INLINE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([^`]*)`").expect("Invalid inline code regex"));

/// Opening braces tried as object starts before giving up.
pub const MAX_CANDIDATE_STARTS: usize = 32;

/// Why a model reply could not be turned into a typed result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("no JSON object found in the response")]
    NoJsonObject,

    #[error("invalid JSON: {reason}")]
    InvalidJson { reason: String },

    #[error("response does not match the expected shape: {reason}")]
    Schema { reason: String },

    #[error("required field '{field}' is empty")]
    EmptyField { field: &'static str },
}

// ============================================================================
// PHASE 1: MARKDOWN PRE-CLEAN
// ============================================================================

/// Replace fenced code blocks with their contents.
pub fn strip_fences(text: &str) -> String {
    FENCED_BLOCK.replace_all(text, "${1}").into_owned()
}

/// Replace fenced code blocks, then inline code spans, with their contents.
pub fn strip_markdown(text: &str) -> String {
    let without_fences = strip_fences(text);
    INLINE_CODE.replace_all(&without_fences, "${1}").into_owned()
}

// ============================================================================
// PHASE 2: BRACE SCAN
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Outside any string literal; braces change depth.
    Normal,
    /// Inside a string literal; braces are ignored.
    InString,
    /// The previous character was a backslash inside a string literal.
    Escaped,
}

/// Character-at-a-time scanner tracking brace depth outside string literals.
#[derive(Debug, Clone)]
pub struct BraceScanner {
    state: ScanState,
    depth: usize,
    opened: bool,
}

impl BraceScanner {
    pub fn new() -> Self {
        Self {
            state: ScanState::Normal,
            depth: 0,
            opened: false,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Feed one character. Returns true when it closes the outermost object.
    pub fn step(&mut self, c: char) -> bool {
        match (self.state, c) {
            (ScanState::Normal, '{') => {
                self.depth += 1;
                self.opened = true;
                false
            }
            (ScanState::Normal, '}') => {
                if self.depth == 0 {
                    return false;
                }
                self.depth -= 1;
                self.opened && self.depth == 0
            }
            (ScanState::Normal, '"') => {
                self.state = ScanState::InString;
                false
            }
            (ScanState::Normal, _) => false,
            (ScanState::InString, '\\') => {
                self.state = ScanState::Escaped;
                false
            }
            (ScanState::InString, '"') => {
                self.state = ScanState::Normal;
                false
            }
            (ScanState::InString, _) => false,
            (ScanState::Escaped, _) => {
                self.state = ScanState::InString;
                false
            }
        }
    }
}

impl Default for BraceScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Scan from `start` (which must hold a `{`) to its matching `}`.
fn balanced_from(text: &str, start: usize) -> Option<&str> {
    let mut scanner = BraceScanner::new();
    for (i, c) in text[start..].char_indices() {
        if scanner.step(c) {
            return Some(&text[start..start + i + c.len_utf8()]);
        }
    }
    None
}

/// Balanced objects, in order of their opening brace.
///
/// The first [`MAX_CANDIDATE_STARTS`] occurrences of `{` are tried as start
/// positions, so nested objects are yielded after the object that contains
/// them. Braces beyond that limit are never scanned from.
pub fn balanced_candidates(text: &str) -> impl Iterator<Item = &str> + '_ {
    text.match_indices('{')
        .take(MAX_CANDIDATE_STARTS)
        .filter_map(move |(start, _)| balanced_from(text, start))
}

/// The object opened by the first `{` that has a matching `}`.
///
/// Normally this is the object starting at the first `{`. A stray `{` that is
/// never closed is skipped.
pub fn find_balanced_object(text: &str) -> Option<&str> {
    balanced_candidates(text).next()
}

// ============================================================================
// SANITIZE + PARSE
// ============================================================================

/// Make model-emitted JSON acceptable to a strict parser.
///
/// Inside string literals, raw newline, carriage return and tab characters are
/// re-escaped and other control characters are dropped. Outside strings,
/// structural whitespace is kept and other control characters are dropped.
pub fn sanitize_json_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut state = ScanState::Normal;

    for c in text.chars() {
        match state {
            ScanState::Normal => {
                if c == '"' {
                    state = ScanState::InString;
                }
                if c.is_control() && !matches!(c, '\n' | '\r' | '\t') {
                    continue;
                }
                out.push(c);
            }
            ScanState::InString => match c {
                '\\' => {
                    state = ScanState::Escaped;
                    out.push(c);
                }
                '"' => {
                    state = ScanState::Normal;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c.is_control() => {}
                c => out.push(c),
            },
            ScanState::Escaped => {
                state = ScanState::InString;
                match c {
                    '\n' => out.push('n'),
                    '\r' => out.push('r'),
                    '\t' => out.push('t'),
                    c if c.is_control() => {
                        // A backslash followed by a stray control char escapes nothing.
                        out.pop();
                    }
                    c => out.push(c),
                }
            }
        }
    }

    out
}

/// Recover the first parseable top-level JSON object from model output.
///
/// Inline code spans are only stripped when the fence-stripped text holds no
/// parseable object.
pub fn extract_json_value(raw: &str) -> Result<Value, ParseFailure> {
    let without_fences = strip_fences(raw);
    let first_pass = first_object(&without_fences);
    if first_pass.is_ok() {
        return first_pass;
    }

    let without_spans = INLINE_CODE.replace_all(&without_fences, "${1}");
    if without_spans == without_fences {
        return first_pass;
    }
    match (first_object(&without_spans), first_pass) {
        (Ok(value), _) => Ok(value),
        (Err(ParseFailure::NoJsonObject), Err(earlier)) => Err(earlier),
        (Err(failure), _) => Err(failure),
    }
}

fn first_object(text: &str) -> Result<Value, ParseFailure> {
    let mut first_error = None;

    for candidate in balanced_candidates(text) {
        match serde_json::from_str::<Value>(&sanitize_json_text(candidate)) {
            Ok(value @ Value::Object(_)) => return Ok(value),
            Ok(_) => {}
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e.to_string());
                }
            }
        }
    }

    Err(match first_error {
        Some(reason) => ParseFailure::InvalidJson { reason },
        None => ParseFailure::NoJsonObject,
    })
}

// ============================================================================
// TYPED PAYLOADS
// ============================================================================

/// A result type the model is asked to produce as JSON.
pub trait ModelPayload: DeserializeOwned {
    /// Reject payloads whose required fields are present but empty.
    fn validate(&self) -> Result<(), ParseFailure>;
}

/// Extract, deserialize and validate a payload in one step.
pub fn decode_payload<T: ModelPayload>(raw: &str) -> Result<T, ParseFailure> {
    let value = extract_json_value(raw)?;
    let payload: T = serde_json::from_value(value).map_err(|e| ParseFailure::Schema {
        reason: e.to_string(),
    })?;
    payload.validate()?;
    Ok(payload)
}

fn require_text(field: &'static str, value: &str) -> Result<(), ParseFailure> {
    if value.trim().is_empty() {
        return Err(ParseFailure::EmptyField { field });
    }
    Ok(())
}

fn require_items(field: &'static str, items: &[String]) -> Result<(), ParseFailure> {
    if items.iter().all(|item| item.trim().is_empty()) {
        return Err(ParseFailure::EmptyField { field });
    }
    Ok(())
}

impl ModelPayload for ImprovementResult {
    fn validate(&self) -> Result<(), ParseFailure> {
        require_text("improvedScript", &self.improved_script)?;
        require_items("changes", &self.changes)?;
        require_text("explanation", &self.explanation)
    }
}

impl ModelPayload for TestGenerationResult {
    fn validate(&self) -> Result<(), ParseFailure> {
        require_text("testScript", &self.test_script)?;
        require_items("testCases", &self.test_cases)?;
        require_text("explanation", &self.explanation)
    }
}

impl ModelPayload for PostTestImprovementResult {
    fn validate(&self) -> Result<(), ParseFailure> {
        require_text("improvedScript", &self.improved_script)?;
        require_items("improvements", &self.improvements)?;
        require_text("explanation", &self.explanation)
    }
}

impl ModelPayload for PromptRefinementResult {
    fn validate(&self) -> Result<(), ParseFailure> {
        require_text("refinedPrompt", &self.refined_prompt)?;
        require_text("explanation", &self.explanation)
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Map};

    /// String values that stress the scanner: braces, quotes, backslashes.
    fn arb_tricky_string() -> impl Strategy<Value = String> {
        "[a-z0-9 {}\"\\\\:,\\[\\]]{0,16}"
    }

    fn arb_json_object() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            arb_tricky_string().prop_map(Value::String),
            any::<i64>().prop_map(|n| json!(n)),
            any::<bool>().prop_map(Value::Bool),
            Just(Value::Null),
        ];
        let value = leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>())),
            ]
        });
        prop::collection::btree_map("[a-z]{1,6}", value, 0..5)
            .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>()))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// The substring from the first `{` to its matching `}` is returned,
        /// whatever surrounds it.
        #[test]
        fn prop_extraction_returns_exact_object(
            prefix in "[A-Za-z0-9 .,:!}\n]{0,40}",
            object in arb_json_object(),
            suffix in "[A-Za-z0-9 .,:!{}\n]{0,40}",
        ) {
            let json_text = serde_json::to_string(&object).unwrap();
            let text = format!("{}{}{}", prefix, json_text, suffix);
            prop_assert_eq!(find_balanced_object(&text), Some(json_text.as_str()));
            prop_assert_eq!(extract_json_value(&text).unwrap(), object);
        }

        /// A stray unbalanced `{` in leading prose does not hide the object.
        #[test]
        fn prop_stray_open_brace_in_prefix(
            before in "[A-Za-z ]{0,20}",
            after in "[A-Za-z ]{1,20}",
            object in arb_json_object(),
        ) {
            let json_text = serde_json::to_string(&object).unwrap();
            let text = format!("{}{{{}{}", before, after, json_text);
            prop_assert_eq!(extract_json_value(&text).unwrap(), object);
        }

        /// Fencing with or without a language tag extracts the same object.
        #[test]
        fn prop_fence_stripping_is_transparent(
            object in arb_json_object(),
            tag in prop_oneof![Just(""), Just("json"), Just("JSON"), Just("javascript")],
            prose in "[A-Za-z .]{0,30}",
        ) {
            let json_text = serde_json::to_string_pretty(&object).unwrap();
            let plain = format!("{}\n{}", prose, json_text);
            let fenced = format!("{}\n```{}\n{}\n```\n", prose, tag, json_text);
            prop_assert_eq!(extract_json_value(&fenced), extract_json_value(&plain));
        }

        /// Literal newlines and tabs in a string value survive sanitization.
        #[test]
        fn prop_sanitize_preserves_multiline_content(
            lines in prop::collection::vec("[A-Za-z0-9 $#=()|&;\t]{0,20}", 1..6),
        ) {
            let content = lines.join("\n");
            let raw = format!("{{\"script\": \"{}\"}}", content);
            let value: Value = serde_json::from_str(&sanitize_json_text(&raw)).unwrap();
            prop_assert_eq!(value["script"].as_str(), Some(content.as_str()));
        }

        /// Valid JSON is left untouched by sanitization.
        #[test]
        fn prop_sanitize_is_identity_on_serialized_json(object in arb_json_object()) {
            let json_text = serde_json::to_string(&object).unwrap();
            prop_assert_eq!(sanitize_json_text(&json_text), json_text);
        }

        /// Text without any `{` never yields an object.
        #[test]
        fn prop_no_brace_no_object(text in "[^{]{0,200}") {
            prop_assert_eq!(extract_json_value(&text), Err(ParseFailure::NoJsonObject));
        }
    }
}
