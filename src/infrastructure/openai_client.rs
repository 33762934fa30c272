use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const CHAT_COMPLETIONS_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const CHAT_MODEL: &str = "gpt-3.5-turbo";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[async_trait]
pub trait ChatCompletionClient: Send + Sync {
    /// Returns the assistant message content for a single-turn completion.
    async fn complete(&self, api_key: &str, request: &CompletionRequest)
        -> Result<String, InfraError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestChatCompletionClient {
    client: Client,
}

impl ReqwestChatCompletionClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::Remote(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn chat_http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("chat completion api error: http {}", status.as_u16())
        } else {
            format!(
                "chat completion api error: http {}; body={body}",
                status.as_u16()
            )
        };
        InfraError::Remote(message)
    }
}

#[derive(Debug, serde::Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, serde::Serialize)]
struct ChatCompletionPayload<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, serde::Deserialize)]
struct ChatCompletionResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, serde::Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, serde::Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

fn extract_content(body: &str) -> Result<String, InfraError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body).map_err(|error| {
        InfraError::Remote(format!("invalid chat completion payload: {error}; body={body}"))
    })?;

    parsed
        .choices
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| {
            InfraError::Remote(format!(
                "chat completion response did not include message content; body={body}"
            ))
        })
}

#[async_trait]
impl ChatCompletionClient for ReqwestChatCompletionClient {
    async fn complete(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> Result<String, InfraError> {
        Self::ensure_non_empty(api_key, "api key")?;

        let payload = ChatCompletionPayload {
            model: CHAT_MODEL,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(CHAT_COMPLETIONS_ENDPOINT)
            .bearer_auth(api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                InfraError::Remote(format!("network error while requesting completion: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::Remote(format!("failed reading completion response: {error}"))
        })?;

        if !status.is_success() {
            return Err(Self::chat_http_error(status, &body));
        }

        extract_content(&body)
    }
}
