//! Google Gemini provider (`generateContent`): API key travels as a query
//! parameter rather than a header, and history uses `contents` with
//! `parts` rather than a flat message list.

use crate::error::LlmError;
use crate::llm::client::{LlmClient, LlmResponse, RetryPolicy, TokenUsage};
use crate::message::{Message, Role};
use crate::sanitize;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client builds with static TLS config");
        Self {
            http,
            api_key,
            model,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    system_instruction: SystemInstruction,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content2,
}

#[derive(Deserialize)]
struct Content2 {
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: u32,
}

fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::User | Role::Tool | Role::System => "user",
        Role::Assistant => "model",
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
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
        let mut contents: Vec<Content> = history
            .iter()
            .map(|m| Content {
                role: gemini_role(m.role),
                parts: vec![Part { text: m.content.clone() }],
            })
            .collect();
        contents.push(Content {
            role: "user",
            parts: vec![Part { text: prompt.to_string() }],
        });

        let body = GenerateRequest {
            system_instruction: SystemInstruction {
                parts: vec![Part { text: system_prompt.to_string() }],
            },
            contents,
            generation_config: GenerationConfig { max_output_tokens: max_tokens },
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self
            .retry
            .run(|| async {
                let result = self.http.post(&url).json(&body).send().await;
                match result {
                    Ok(resp) => {
                        let status = resp.status();
                        if status.is_success() {
                            resp.json::<GenerateResponse>()
                                .await
                                .map_err(|err| (false, LlmError::ProviderError(sanitize::redact(&err.to_string()))))
                        } else if status.as_u16() == 429 {
                            Err((true, LlmError::RateLimited))
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

        let text = response
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
            .unwrap_or_default();

        let usage = response
            .usage_metadata
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
            })
            .unwrap_or_else(|| TokenUsage::estimate(prompt, &text));

        Ok(LlmResponse { text, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_role_maps_to_model_for_gemini() {
        assert_eq!(gemini_role(Role::Assistant), "model");
        assert_eq!(gemini_role(Role::User), "user");
    }
}
