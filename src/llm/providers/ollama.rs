//! Local Ollama provider: no API key, talks to a localhost daemon, and
//! network failures are far more likely to be "daemon not running" than
//! a transient blip — still retried the same as any other backend, since
//! the loop treats every backend uniformly.

use crate::error::LlmError;
use crate::llm::client::{LlmClient, LlmResponse, RetryPolicy, TokenUsage};
use crate::message::{Message, Role};
use crate::sanitize;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct OllamaClient {
    http: reqwest::Client,
    model: String,
    base_url: String,
    retry: RetryPolicy,
}

impl OllamaClient {
    pub fn new(model: String) -> Self {
        Self::with_base_url(model, "http://localhost:11434".to_string())
    }

    pub fn with_base_url(model: String, base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .expect("reqwest client builds with static TLS config");
        Self {
            http,
            model,
            base_url,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    num_predict: u32,
}

#[derive(Serialize, Deserialize, Clone)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: OllamaMessage,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

fn ollama_role(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
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
        messages.push(OllamaMessage {
            role: "system".to_string(),
            content: system_prompt.to_string(),
        });
        for msg in history {
            messages.push(OllamaMessage {
                role: ollama_role(msg.role).to_string(),
                content: msg.content.clone(),
            });
        }
        messages.push(OllamaMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let body = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: ChatOptions { num_predict: max_tokens },
        };

        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .retry
            .run(|| async {
                let result = self.http.post(&url).json(&body).send().await;
                match result {
                    Ok(resp) => {
                        let status = resp.status();
                        if status.is_success() {
                            resp.json::<ChatResponse>()
                                .await
                                .map_err(|err| (false, LlmError::ProviderError(sanitize::redact(&err.to_string()))))
                        } else if status.is_server_error() {
                            let text = resp.text().await.unwrap_or_default();
                            Err((true, LlmError::Network(sanitize::redact(&text))))
                        } else {
                            let text = resp.text().await.unwrap_or_default();
                            Err((false, LlmError::ProviderError(sanitize::redact(&text))))
                        }
                    }
                    Err(err) => Err((true, LlmError::Network(sanitize::redact(&err.to_string())))),
                }
            })
            .await?;

        let text = response.message.content;
        let usage = match (response.prompt_eval_count, response.eval_count) {
            (Some(p), Some(c)) => TokenUsage { prompt_tokens: p, completion_tokens: c },
            _ => TokenUsage::estimate(prompt, &text),
        };

        Ok(LlmResponse { text, usage })
    }
}
