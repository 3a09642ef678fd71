//! OpenAI Responses API provider: the `/responses` endpoint's `input`
//! array plus structured `output` items, rather than chat-completions'
//! flat `messages`/`choices` shape. Same retry/backoff and one shared
//! `reqwest::Client` as [`super::openai`].

use crate::error::LlmError;
use crate::llm::client::{LlmClient, LlmResponse, RetryPolicy, TokenUsage};
use crate::message::{Message, Role};
use crate::sanitize;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct OpenAiResponsesClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    retry: RetryPolicy,
}

impl OpenAiResponsesClient {
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
struct ResponsesRequest<'a> {
    model: &'a str,
    input: Vec<InputItem>,
    max_output_tokens: u32,
}

#[derive(Serialize)]
struct InputItem {
    role: String,
    content: Vec<InputContent>,
}

#[derive(Serialize)]
struct InputContent {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn input_item(role: &str, text: String) -> InputItem {
    InputItem {
        role: role.to_string(),
        content: vec![InputContent { kind: "input_text", text }],
    }
}

#[derive(Deserialize)]
struct ResponsesBody {
    output: Vec<OutputItem>,
    usage: Option<ResponsesUsage>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    content: Option<Vec<OutputContent>>,
}

#[derive(Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct ResponsesUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct ResponsesErrorBody {
    error: ResponsesErrorDetail,
}

#[derive(Deserialize)]
struct ResponsesErrorDetail {
    message: String,
}

/// Joins every `output_text` fragment across `message`-typed output items,
/// in order, the way a Responses API client renders a final answer.
fn extract_output_text(output: &[OutputItem]) -> String {
    output
        .iter()
        .filter(|item| item.kind == "message")
        .filter_map(|item| item.content.as_ref())
        .flatten()
        .filter(|content| content.kind == "output_text")
        .filter_map(|content| content.text.as_deref())
        .collect::<Vec<_>>()
        .join("")
}

#[async_trait]
impl LlmClient for OpenAiResponsesClient {
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
        let mut input = Vec::with_capacity(history.len() + 2);
        input.push(input_item("system", system_prompt.to_string()));
        for msg in history {
            input.push(input_item(role_str(msg.role), msg.content.clone()));
        }
        input.push(input_item("user", prompt.to_string()));

        let body = ResponsesRequest {
            model: &self.model,
            input,
            max_output_tokens: max_tokens,
        };

        let url = format!("{}/responses", self.base_url);

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
                            match resp.json::<ResponsesBody>().await {
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
                            let message = serde_json::from_str::<ResponsesErrorBody>(&text)
                                .map(|b| b.error.message)
                                .unwrap_or(text);
                            Err((false, LlmError::ProviderError(sanitize::redact(&message))))
                        }
                    }
                    Err(err) => Err((true, LlmError::Network(sanitize::redact(&err.to_string())))),
                }
            })
            .await?;

        let text = extract_output_text(&response.output);

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
    fn extract_output_text_joins_message_fragments_in_order() {
        let output = vec![
            OutputItem {
                kind: "reasoning".to_string(),
                content: None,
            },
            OutputItem {
                kind: "message".to_string(),
                content: Some(vec![
                    OutputContent { kind: "output_text".to_string(), text: Some("Hello".to_string()) },
                    OutputContent { kind: "output_text".to_string(), text: Some(", world".to_string()) },
                ]),
            },
        ];
        assert_eq!(extract_output_text(&output), "Hello, world");
    }

    #[test]
    fn extract_output_text_ignores_non_message_items() {
        let output = vec![OutputItem { kind: "reasoning".to_string(), content: None }];
        assert_eq!(extract_output_text(&output), "");
    }
}
