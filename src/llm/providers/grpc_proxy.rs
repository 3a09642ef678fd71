//! Remote gRPC proxy variant. Routes through a
//! JSON-over-HTTP bridge in front of the actual gRPC service rather than
//! a generated tonic client, keeping the dependency stack aligned with
//! the rest of the provider set; see `DESIGN.md` for the tradeoff.

use crate::error::LlmError;
use crate::llm::client::{LlmClient, LlmResponse, RetryPolicy, TokenUsage};
use crate::message::{Message, Role};
use crate::sanitize;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct GrpcProxyClient {
    http: reqwest::Client,
    model: String,
    endpoint: String,
    auth_token: Option<String>,
    retry: RetryPolicy,
}

impl GrpcProxyClient {
    pub fn new(endpoint: String, model: String, auth_token: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client builds with static TLS config");
        Self {
            http,
            model,
            endpoint,
            auth_token,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Serialize)]
struct ProxyRequest<'a> {
    model: &'a str,
    system_prompt: &'a str,
    history: Vec<ProxyMessage>,
    prompt: &'a str,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ProxyMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ProxyResponse {
    text: String,
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

fn proxy_role(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

#[async_trait]
impl LlmClient for GrpcProxyClient {
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
        let body = ProxyRequest {
            model: &self.model,
            system_prompt,
            history: history
                .iter()
                .map(|m| ProxyMessage { role: proxy_role(m.role), content: m.content.clone() })
                .collect(),
            prompt,
            max_tokens,
        };

        let response: ProxyResponse = self
            .retry
            .run(|| async {
                let mut request = self.http.post(&self.endpoint).json(&body);
                if let Some(token) = &self.auth_token {
                    request = request.bearer_auth(token);
                }
                match request.send().await {
                    Ok(resp) if resp.status().is_success() => resp
                        .json::<ProxyResponse>()
                        .await
                        .map_err(|err| (false, LlmError::ProviderError(sanitize::redact(&err.to_string())))),
                    Ok(resp) if resp.status().as_u16() == 429 => Err((true, LlmError::RateLimited)),
                    Ok(resp) if resp.status().is_server_error() => {
                        let text = resp.text().await.unwrap_or_default();
                        Err((true, LlmError::Network(sanitize::redact(&text))))
                    }
                    Ok(resp) => {
                        let text = resp.text().await.unwrap_or_default();
                        Err((false, LlmError::ProviderError(sanitize::redact(&text))))
                    }
                    Err(err) => Err((true, LlmError::Network(sanitize::redact(&err.to_string())))),
                }
            })
            .await?;

        let usage = match (response.prompt_tokens, response.completion_tokens) {
            (Some(p), Some(c)) => TokenUsage { prompt_tokens: p, completion_tokens: c },
            _ => TokenUsage::estimate(prompt, &response.text),
        };

        Ok(LlmResponse { text: response.text, usage })
    }
}
