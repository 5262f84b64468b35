//! LLM chat adapter (spec §4.2 item 7), used by the four-stage viral AI
//! sub-pipeline (C8). Returns the raw completion text; callers that expect
//! JSON must run it through `categoriser::json_recovery` themselves, since
//! the model is free to wrap its answer in prose or code fences.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::retry::{classify_reqwest_error, classify_status, with_retry};
use super::FetchError;

#[async_trait]
pub trait LlmChatFetcher: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, FetchError>;
}

pub struct LiveLlmChatFetcher {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl LiveLlmChatFetcher {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build reqwest client");
        Self { client, api_key: api_key.into(), model: "gpt-4o-mini".to_string() }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[async_trait]
impl LlmChatFetcher for LiveLlmChatFetcher {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, FetchError> {
        with_retry(|| async {
            let request = ChatRequest {
                model: &self.model,
                messages: vec![
                    ChatMessage { role: "system", content: system_prompt },
                    ChatMessage { role: "user", content: user_prompt },
                ],
                temperature: 0.7,
            };

            let response = self
                .client
                .post("https://api.openai.com/v1/chat/completions")
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
                .map_err(classify_reqwest_error)?;

            let status = response.status();
            let body = response.text().await.map_err(classify_reqwest_error)?;
            if let Some(err) = classify_status(status, &body) {
                return Err(err);
            }

            let parsed: ChatResponse = serde_json::from_str(&body)
                .map_err(|e| FetchError::Transient(format!("json parse error: {e}")))?;

            parsed
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content)
                .ok_or_else(|| FetchError::Malformed("no choices in completion response".to_string()))
        })
        .await
    }
}

/// Returns a canned completion per call count, in order, so tests can walk
/// a multi-stage conversation (profile analysis -> hooks -> scripts).
pub struct FakeLlmChatFetcher {
    responses: std::sync::Mutex<std::collections::VecDeque<String>>,
}

impl FakeLlmChatFetcher {
    pub fn new(responses: Vec<String>) -> Self {
        Self { responses: std::sync::Mutex::new(responses.into()) }
    }
}

#[async_trait]
impl LlmChatFetcher for FakeLlmChatFetcher {
    async fn complete(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String, FetchError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| FetchError::Transient("fake llm chat exhausted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_returns_responses_in_order() {
        let fetcher = FakeLlmChatFetcher::new(vec!["first".to_string(), "second".to_string()]);
        assert_eq!(fetcher.complete("sys", "a").await.unwrap(), "first");
        assert_eq!(fetcher.complete("sys", "b").await.unwrap(), "second");
    }

    #[tokio::test]
    async fn fake_errors_when_exhausted() {
        let fetcher = FakeLlmChatFetcher::new(vec!["only".to_string()]);
        fetcher.complete("sys", "a").await.unwrap();
        let result = fetcher.complete("sys", "b").await;
        assert!(result.is_err());
    }
}
