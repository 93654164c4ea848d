//! OpenAI-compatible chat-completions backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{
    transport_error, CompletionBackend, CompletionRequest, CompletionResponse, TokenUsage,
};
use crate::error::{BackendError, BackendResult};

/// Chat-completions client. `endpoint` is the full request URL, e.g.
/// `https://host/openai/deployments/gpt-4/chat/completions?api-version=2024-06-01`
/// or `http://10.0.0.31:8000/v1/chat/completions`.
pub struct OpenAiCompletionBackend {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompletionBackend {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> BackendResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client,
        })
    }

    fn request_body(request: &CompletionRequest) -> serde_json::Value {
        serde_json::json!({
            "messages": [
                { "role": "system", "content": request.system_instruction },
                { "role": "user", "content": request.user_prompt }
            ],
            "max_completion_tokens": request.max_tokens,
            "temperature": request.temperature,
            "top_p": 1.0,
            "frequency_penalty": 0.0,
            "presence_penalty": 0.0,
            "model": request.model_id
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Pull the first choice's text out of a chat-completions body.
fn parse_chat_response(body: &str) -> BackendResult<CompletionResponse> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| BackendError::MalformedResponse(format!("invalid completion body: {e}")))?;

    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| {
            BackendError::MalformedResponse("completion has no message content".into())
        })?;

    Ok(CompletionResponse {
        text,
        usage: parsed.usage,
    })
}

#[async_trait]
impl CompletionBackend for OpenAiCompletionBackend {
    fn name(&self) -> &str {
        "openai-completion"
    }

    async fn complete(&self, request: &CompletionRequest) -> BackendResult<CompletionResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(&Self::request_body(request))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_chat_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response_extracts_content_and_usage() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "{\"agent\": \"Knowledge\"}"}}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 30, "total_tokens": 150}
        }"#;
        let parsed = parse_chat_response(body).unwrap();
        assert_eq!(parsed.text, "{\"agent\": \"Knowledge\"}");
        assert_eq!(parsed.usage.unwrap().total_tokens, 150);
    }

    #[test]
    fn test_parse_chat_response_without_choices_is_malformed() {
        let err = parse_chat_response(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, BackendError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_chat_response_rejects_non_json() {
        let err = parse_chat_response("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, BackendError::MalformedResponse(_)));
    }

    #[test]
    fn test_request_body_shape() {
        let request = CompletionRequest {
            system_instruction: "sys".into(),
            user_prompt: "user".into(),
            max_tokens: 500,
            temperature: 0.3,
            model_id: "gpt-4.1-mini".into(),
        };
        let body = OpenAiCompletionBackend::request_body(&request);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "user");
        assert_eq!(body["max_completion_tokens"], 500);
        assert_eq!(body["model"], "gpt-4.1-mini");
    }
}
