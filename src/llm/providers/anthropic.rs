//! Anthropic Claude provider (`messages` API): system prompt is a
//! top-level field rather than a message, tool-role history is folded
//! into user turns since Claude has no bare `tool` role in this wire
//! format.

use crate::error::LlmError;
use crate::llm::client::{LlmClient, LlmResponse, RetryPolicy, TokenUsage};
use crate::message::{Message, Role};
use crate::sanitize;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct ClaudeClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    retry: RetryPolicy,
}

impl ClaudeClient {
    pub fn new(api_key: String, model: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client builds with static TLS config");
        Self {
            http,
            api_key,
            model,
            base_url: "https://api.anthropic.com/v1".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    max_tokens: u32,
    messages: Vec<ClaudeMessage>,
}

#[derive(Serialize)]
struct ClaudeMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<ClaudeUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

#[derive(Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct ClaudeErrorBody {
    error: ClaudeErrorDetail,
}

#[derive(Deserialize)]
struct ClaudeErrorDetail {
    message: String,
}

fn claude_role(role: Role) -> &'static str {
    match role {
        Role::User | Role::Tool | Role::System => "user",
        Role::Assistant => "assistant",
    }
}

#[async_trait]
impl LlmClient for ClaudeClient {
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
        let mut messages: Vec<ClaudeMessage> = history
            .iter()
            .map(|m| ClaudeMessage {
                role: claude_role(m.role),
                content: m.content.clone(),
            })
            .collect();
        messages.push(ClaudeMessage {
            role: "user",
            content: prompt.to_string(),
        });

        let body = MessagesRequest {
            model: &self.model,
            system: system_prompt,
            max_tokens,
            messages,
        };

        let url = format!("{}/messages", self.base_url);

        let response = self
            .retry
            .run(|| async {
                let result = self
                    .http
                    .post(&url)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", "2023-06-01")
                    .json(&body)
                    .send()
                    .await;

                match result {
                    Ok(resp) => {
                        let status = resp.status();
                        if status.is_success() {
                            resp.json::<MessagesResponse>()
                                .await
                                .map_err(|err| (false, LlmError::ProviderError(sanitize::redact(&err.to_string()))))
                        } else if status.as_u16() == 429 {
                            Err((true, LlmError::RateLimited))
                        } else if status.is_server_error() {
                            let text = resp.text().await.unwrap_or_default();
                            Err((true, LlmError::Network(sanitize::redact(&text))))
                        } else {
                            let text = resp.text().await.unwrap_or_default();
                            let message = serde_json::from_str::<ClaudeErrorBody>(&text)
                                .map(|b| b.error.message)
                                .unwrap_or(text);
                            Err((false, LlmError::ProviderError(sanitize::redact(&message))))
                        }
                    }
                    Err(err) => Err((true, LlmError::Network(sanitize::redact(&err.to_string())))),
                }
            })
            .await?;

        let text = response.content.into_iter().map(|b| b.text).collect::<Vec<_>>().join("");
        let usage = response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
            })
            .unwrap_or_else(|| TokenUsage::estimate(prompt, &text));

        Ok(LlmResponse { text, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_role_folds_into_user_for_claude() {
        assert_eq!(claude_role(Role::Tool), "user");
        assert_eq!(claude_role(Role::Assistant), "assistant");
    }
}
