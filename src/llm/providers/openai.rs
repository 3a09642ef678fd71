//! OpenAI chat-completions provider. Template other HTTP-JSON providers
//! follow: retry/backoff around the request, and one `reqwest::Client`
//! built per provider instance and reused across calls.

use crate::error::LlmError;
use crate::llm::client::{LlmClient, LlmResponse, RetryPolicy, TokenUsage};
use crate::message::{Message, Role};
use crate::sanitize;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    retry: RetryPolicy,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(api_key, model, "https://api.openai.com/v1".to_string())
    }

    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client builds with static TLS config");
        Self {
            http,
            api_key,
            model,
            base_url,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct ChatErrorBody {
    error: ChatErrorDetail,
}

#[derive(Deserialize)]
struct ChatErrorDetail {
    message: String,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn send_prompt(
        &self,
        system_prompt: &str,
        history: &[Message],
        prompt: &str,
        max_tokens: u32,
    ) -> Result<LlmResponse, LlmError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: system_prompt.to_string(),
        });
        for msg in history {
            messages.push(ChatMessage {
                role: role_str(msg.role).to_string(),
                content: msg.content.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .retry
            .run(|| async {
                let result = self
                    .http
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&body)
                    .send()
                    .await;

                match result {
                    Ok(resp) => {
                        let status = resp.status();
                        if status.is_success() {
                            match resp.json::<ChatResponse>().await {
                                Ok(parsed) => Ok(parsed),
                                Err(err) => Err((
                                    false,
                                    LlmError::ProviderError(sanitize::redact(&err.to_string())),
                                )),
                            }
                        } else if status.as_u16() == 429 {
                            Err((true, LlmError::RateLimited))
                        } else if status.is_server_error() {
                            let text = resp.text().await.unwrap_or_default();
                            Err((true, LlmError::Network(sanitize::redact(&text))))
                        } else {
                            let text = resp.text().await.unwrap_or_default();
                            let message = serde_json::from_str::<ChatErrorBody>(&text)
                                .map(|b| b.error.message)
                                .unwrap_or(text);
                            Err((false, LlmError::ProviderError(sanitize::redact(&message))))
                        }
                    }
                    Err(err) => Err((true, LlmError::Network(sanitize::redact(&err.to_string())))),
                }
            })
            .await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        let usage = response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_else(|| TokenUsage::estimate(prompt, &text));

        Ok(LlmResponse { text, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_str_maps_every_variant() {
        assert_eq!(role_str(Role::System), "system");
        assert_eq!(role_str(Role::User), "user");
        assert_eq!(role_str(Role::Assistant), "assistant");
        assert_eq!(role_str(Role::Tool), "tool");
    }
}
