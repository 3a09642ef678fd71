//! StackSpot AI provider: OAuth2 client-credentials token exchange
//! cached for its lifetime, then a chat call authorized with the bearer
//! token. HTTP/retry shape follows [`super::openai`].

use crate::error::LlmError;
use crate::llm::client::{LlmClient, LlmResponse, RetryPolicy, TokenUsage};
use crate::message::Message;
use crate::sanitize;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub struct StackSpotClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    realm: String,
    model: String,
    base_url: String,
    token: Mutex<Option<CachedToken>>,
    retry: RetryPolicy,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl StackSpotClient {
    pub fn new(client_id: String, client_secret: String, realm: String, model: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client builds with static TLS config");
        Self {
            http,
            client_id,
            client_secret,
            realm,
            model,
            base_url: "https://genai-code-buddy-api.stackspot.com/v1".to_string(),
            token: Mutex::new(None),
            retry: RetryPolicy::default(),
        }
    }

    async fn access_token(&self) -> Result<String, LlmError> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.value.clone());
            }
        }

        let url = format!("https://idm.stackspot.com/{}/oidc/oauth/token", self.realm);
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ];
        let resp = self
            .http
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|err| LlmError::Network(sanitize::redact(&err.to_string())))?;
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::ProviderError(sanitize::redact(&text)));
        }
        let parsed: TokenResponse = resp
            .json()
            .await
            .map_err(|err| LlmError::ProviderError(sanitize::redact(&err.to_string())))?;
        let expires_at = Instant::now() + Duration::from_secs(parsed.expires_in.saturating_sub(30));
        *guard = Some(CachedToken { value: parsed.access_token.clone(), expires_at });
        Ok(parsed.access_token)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    system_prompt: &'a str,
    user_prompt: &'a str,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: String,
}

#[async_trait]
impl LlmClient for StackSpotClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn send_prompt(
        &self,
        system_prompt: &str,
        _history: &[Message],
        prompt: &str,
        max_tokens: u32,
    ) -> Result<LlmResponse, LlmError> {
        let token = self.access_token().await?;
        let url = format!("{}/chat", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            system_prompt,
            user_prompt: prompt,
            max_tokens,
        };

        let response = self
            .retry
            .run(|| async {
                let result = self.http.post(&url).bearer_auth(&token).json(&body).send().await;
                match result {
                    Ok(resp) if resp.status().is_success() => resp
                        .json::<ChatResponse>()
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

        let usage = TokenUsage::estimate(prompt, &response.message);
        Ok(LlmResponse { text: response.message, usage })
    }
}
