//! OpenAI-compatible chat completions client.

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde_json::{json, Value};
use std::time::Duration;

use sandforge_core::{
    config::ModelConfig,
    traits::{ChatMessage, LlmClient, LlmResponse, LlmUsage},
    Error, Result,
};

/// Talks to any endpoint that speaks `POST {base}/chat/completions`.
///
/// Replies are requested in JSON mode so they parse as reasoning turns.
#[derive(Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<Secret<String>>,
    temperature: f32,
}

impl OpenAiCompatClient {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn payload(&self, messages: &[ChatMessage]) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "response_format": { "type": "json_object" },
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut request = self.client.post(url).json(&self.payload(messages));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::reasoning(format!("llm request failed: {}", e)))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "unknown".to_string());
            return Err(Error::reasoning(format!(
                "llm request failed ({}): {}",
                status, body
            )));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| Error::reasoning(format!("llm response parse failed: {}", e)))?;
        parse_completion(&value)
    }
}

fn parse_completion(value: &Value) -> Result<LlmResponse> {
    let choice = value
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| Error::reasoning("llm response has no choices"))?;

    let content = choice
        .pointer("/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let finish_reason = choice
        .get("finish_reason")
        .and_then(Value::as_str)
        .unwrap_or("stop")
        .to_string();

    let usage = value.get("usage");
    let count = |key: &str| {
        usage
            .and_then(|u| u.get(key))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    };

    Ok(LlmResponse {
        content,
        finish_reason,
        usage: LlmUsage {
            prompt_tokens: count("prompt_tokens"),
            completion_tokens: count("completion_tokens"),
            total_tokens: count("total_tokens"),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion() {
        let value = json!({
            "choices": [{
                "message": { "role": "assistant", "content": "{\"output\":{\"kind\":\"text\",\"text\":\"hi\"}}" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17 }
        });

        let response = parse_completion(&value).unwrap();
        assert!(response.content.contains("\"kind\":\"text\""));
        assert_eq!(response.finish_reason, "stop");
        assert_eq!(response.usage.total_tokens, 17);
    }

    #[test]
    fn test_parse_completion_without_choices() {
        let err = parse_completion(&json!({ "choices": [] })).unwrap_err();
        assert!(matches!(err, Error::Reasoning(_)));
    }

    #[test]
    fn test_payload_requests_json_mode() {
        let client = OpenAiCompatClient::new(&ModelConfig::default()).unwrap();
        let payload = client.payload(&[ChatMessage::user("hello")]);
        assert_eq!(payload["response_format"]["type"], "json_object");
        assert_eq!(payload["messages"][0]["role"], "user");
        assert_eq!(payload["model"], client.model());
    }
}
