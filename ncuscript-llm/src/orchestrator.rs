//! The script orchestrator.
//!
//! Each operation is one request/response transaction:
//! build prompt → one POST → extract → validate → typed result, or the
//! operation's fallback when extraction or validation fails. Configuration
//! and transport errors propagate; malformed replies never do.

use crate::client::ChatCompletionClient;
use crate::extract::{decode_payload, ModelPayload, ParseFailure};
use crate::fallback;
use crate::prompts::{self, PromptPair};
use crate::types::{CompletionRequest, Message};
use crate::ChatTransport;
use ncuscript_core::{
    AutomatorConfig, ImprovementRequest, ImprovementResult, NcuResult, PostTestImprovementRequest,
    PostTestImprovementResult, PromptRefinementRequest, PromptRefinementResult,
    TestGenerationRequest, TestGenerationResult,
};
use uuid::Uuid;

/// Which orchestrator operation a call belongs to (used for logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ImproveScript,
    GenerateTestScript,
    GenerateImprovements,
    RefinePrompt,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImproveScript => "improve_script",
            Self::GenerateTestScript => "generate_test_script",
            Self::GenerateImprovements => "generate_improvements",
            Self::RefinePrompt => "refine_prompt",
        }
    }
}

/// Stateless orchestrator over a [`ChatTransport`].
///
/// Holds only read-only configuration, so it can be shared across tasks.
pub struct ScriptOrchestrator<T: ChatTransport = ChatCompletionClient> {
    config: AutomatorConfig,
    transport: T,
}

impl ScriptOrchestrator<ChatCompletionClient> {
    /// Build an orchestrator talking to the configured HTTP endpoint.
    pub fn from_config(config: AutomatorConfig) -> NcuResult<Self> {
        config.validate()?;
        let transport = ChatCompletionClient::new(&config)?;
        Ok(Self { config, transport })
    }
}

impl<T: ChatTransport> ScriptOrchestrator<T> {
    pub fn with_transport(config: AutomatorConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &AutomatorConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn improve_script(&self, request: &ImprovementRequest) -> NcuResult<ImprovementResult> {
        let prompt = prompts::improvement_prompt(request);
        self.run(Operation::ImproveScript, prompt, |raw, failure, limit| {
            fallback::improvement_fallback(request, raw, failure, limit)
        })
        .await
    }

    pub async fn generate_test_script(
        &self,
        request: &TestGenerationRequest,
    ) -> NcuResult<TestGenerationResult> {
        let prompt = prompts::test_generation_prompt(request);
        self.run(Operation::GenerateTestScript, prompt, |raw, failure, limit| {
            fallback::test_generation_fallback(request, raw, failure, limit)
        })
        .await
    }

    pub async fn generate_improvements(
        &self,
        request: &PostTestImprovementRequest,
    ) -> NcuResult<PostTestImprovementResult> {
        let prompt = prompts::post_test_prompt(request);
        self.run(Operation::GenerateImprovements, prompt, |raw, failure, limit| {
            fallback::post_test_fallback(request, raw, failure, limit)
        })
        .await
    }

    pub async fn refine_prompt(
        &self,
        request: &PromptRefinementRequest,
    ) -> NcuResult<PromptRefinementResult> {
        let prompt = prompts::refinement_prompt(request);
        self.run(Operation::RefinePrompt, prompt, |raw, failure, limit| {
            fallback::refinement_fallback(request, raw, failure, limit)
        })
        .await
    }

    async fn run<R, F>(&self, operation: Operation, prompt: PromptPair, fallback: F) -> NcuResult<R>
    where
        R: ModelPayload,
        F: FnOnce(&str, &ParseFailure, usize) -> R,
    {
        // Checked before anything goes on the wire.
        self.config.require_api_key()?;

        let call_id = Uuid::now_v7();
        let request = CompletionRequest {
            model: self.config.model.clone(),
            messages: vec![Message::system(prompt.system), Message::user(prompt.user)],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        tracing::debug!(
            %call_id,
            operation = operation.as_str(),
            model = %self.config.model,
            "Sending chat completion request"
        );

        let raw = self.transport.complete(&request).await.map_err(|e| {
            tracing::warn!(%call_id, operation = operation.as_str(), error = %e, "Chat completion failed");
            e
        })?;

        match decode_payload::<R>(&raw) {
            Ok(result) => {
                tracing::debug!(%call_id, operation = operation.as_str(), "Parsed model response");
                Ok(result)
            }
            Err(failure) => {
                tracing::warn!(
                    %call_id,
                    operation = operation.as_str(),
                    error = %failure,
                    raw_len = raw.len(),
                    "Model response could not be parsed, returning fallback result"
                );
                Ok(fallback(&raw, &failure, self.config.raw_excerpt_chars))
            }
        }
    }
}

impl<T: ChatTransport + std::fmt::Debug> std::fmt::Debug for ScriptOrchestrator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptOrchestrator")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::ImproveScript.as_str(), "improve_script");
        assert_eq!(Operation::GenerateTestScript.as_str(), "generate_test_script");
        assert_eq!(Operation::GenerateImprovements.as_str(), "generate_improvements");
        assert_eq!(Operation::RefinePrompt.as_str(), "refine_prompt");
    }

    #[test]
    fn test_from_config_rejects_invalid_config() {
        let config = AutomatorConfig {
            endpoint: "not a url".to_string(),
            ..Default::default()
        };
        assert!(ScriptOrchestrator::from_config(config).is_err());
    }

    #[test]
    fn test_from_config_without_key_still_builds() {
        let orchestrator = ScriptOrchestrator::from_config(AutomatorConfig::default()).unwrap();
        assert_eq!(
            orchestrator.transport().endpoint(),
            ncuscript_core::config::DEFAULT_ENDPOINT
        );
    }
}
