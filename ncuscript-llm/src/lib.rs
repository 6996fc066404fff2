//! NcuScript LLM - Prompt Orchestration
//!
//! Builds prompts for script improvement, test generation, post-test
//! improvement and prompt refinement, sends them to a chat-completion
//! endpoint, and recovers typed results from free-form model output.

pub mod client;
pub mod extract;
pub mod fallback;
pub mod orchestrator;
pub mod prompts;
pub mod types;

pub use client::ChatCompletionClient;
pub use extract::{decode_payload, extract_json_value, ModelPayload, ParseFailure};
pub use orchestrator::{Operation, ScriptOrchestrator};
pub use prompts::PromptPair;
pub use types::{CompletionRequest, Message};

use async_trait::async_trait;
use ncuscript_core::NcuResult;

/// Something that can answer a chat-completion request.
///
/// Implementations must be thread-safe (Send + Sync). The production
/// implementation is [`ChatCompletionClient`]; tests substitute scripted
/// transports.
///
/// # Returns
/// * `Ok(String)` - The assistant message content (or the raw body when the
///   provider's envelope is unrecognised)
/// * `Err(NcuError::Llm)` - Transport failure or non-2xx status
/// * `Err(NcuError::Config)` - No API key available
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> NcuResult<String>;
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for std::sync::Arc<T> {
    async fn complete(&self, request: &CompletionRequest) -> NcuResult<String> {
        (**self).complete(request).await
    }
}
