//! Chat-completion HTTP client

use super::types::{ApiError, CompletionRequest, CompletionResponse};
use crate::ChatTransport;
use async_trait::async_trait;
use ncuscript_core::{AutomatorConfig, ConfigError, LlmError, NcuResult};
use reqwest::Client;

/// OpenAI-compatible chat-completion client (OpenRouter by default).
///
/// One POST per call, no retries. The request timeout comes from the config.
#[derive(Clone)]
pub struct ChatCompletionClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    referer: Option<String>,
    title: Option<String>,
}

impl ChatCompletionClient {
    pub fn new(config: &AutomatorConfig) -> NcuResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| LlmError::Transport {
                endpoint: config.endpoint.clone(),
                reason: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim().to_string(),
            api_key: config.require_api_key().ok().map(str::to_string),
            referer: config.attribution.referer.clone(),
            title: config.attribution.title.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport_error(&self, reason: String) -> LlmError {
        LlmError::Transport {
            endpoint: self.endpoint.clone(),
            reason,
        }
    }
}

#[async_trait]
impl ChatTransport for ChatCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> NcuResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ConfigError::MissingApiKey)?;

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(request);
        if let Some(referer) = &self.referer {
            builder = builder.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.title {
            builder = builder.header("X-Title", title);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.transport_error(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let retry_after_ms = parse_retry_after_ms(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ApiError>(&body) {
                Ok(api_error) => api_error.error.message,
                Err(_) if !body.trim().is_empty() => body,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string(),
            };
            tracing::warn!(
                status = status.as_u16(),
                retry_after_ms = ?retry_after_ms,
                "Chat completion request rejected"
            );
            return Err(LlmError::RemoteService {
                status: status.as_u16(),
                message,
                retry_after_ms,
            }
            .into());
        }

        match serde_json::from_str::<CompletionResponse>(&body)
            .ok()
            .and_then(CompletionResponse::first_content)
        {
            Some(content) => Ok(content),
            None => {
                // Let extraction see the raw body; the fallback explanation will quote it.
                tracing::warn!(
                    body_len = body.len(),
                    "Response has no choices[0].message.content"
                );
                Ok(body)
            }
        }
    }
}

fn parse_retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<i64> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
        .map(|seconds| (seconds * 1000.0) as i64)
}

impl std::fmt::Debug for ChatCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn test_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("2"));
        assert_eq!(parse_retry_after_ms(&headers), Some(2000));

        headers.insert("retry-after", HeaderValue::from_static("0.5"));
        assert_eq!(parse_retry_after_ms(&headers), Some(500));
    }

    #[test]
    fn test_retry_after_rejects_negative_and_non_finite() {
        for value in ["-5", "inf", "-inf", "NaN", "infinity"] {
            let mut headers = HeaderMap::new();
            headers.insert("retry-after", HeaderValue::from_static(value));
            assert_eq!(parse_retry_after_ms(&headers), None, "value {:?}", value);
        }

        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("0"));
        assert_eq!(parse_retry_after_ms(&headers), Some(0));
    }

    #[test]
    fn test_retry_after_http_date_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "retry-after",
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after_ms(&headers), None);
        assert_eq!(parse_retry_after_ms(&HeaderMap::new()), None);
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = AutomatorConfig {
            api_key: Some("sk-very-secret".to_string()),
            ..Default::default()
        };
        let client = ChatCompletionClient::new(&config).unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("openrouter.ai"));
    }
}
