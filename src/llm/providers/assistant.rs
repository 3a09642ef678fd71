//! OpenAI Assistants (threaded) provider. Reuses one thread across turns
//! instead of resending the full history, and exposes `close()` so the
//! agent loop can delete the thread on shutdown. Built following the
//! HTTP-JSON conventions of [`super::openai`].

use crate::error::LlmError;
use crate::llm::client::{LlmClient, LlmResponse, RetryPolicy, TokenUsage};
use crate::message::Message;
use crate::sanitize;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;

pub struct AssistantClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    assistant_id: String,
    base_url: String,
    thread_id: Mutex<Option<String>>,
    retry: RetryPolicy,
}

impl AssistantClient {
    pub fn new(api_key: String, model: String, assistant_id: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client builds with static TLS config");
        Self {
            http,
            api_key,
            model,
            assistant_id,
            base_url: "https://api.openai.com/v1".to_string(),
            thread_id: Mutex::new(None),
            retry: RetryPolicy::default(),
        }
    }

    fn beta_request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(&self.api_key).header("OpenAI-Beta", "assistants=v2")
    }

    async fn ensure_thread(&self) -> Result<String, LlmError> {
        let mut guard = self.thread_id.lock().await;
        if let Some(id) = guard.as_ref() {
            return Ok(id.clone());
        }
        let url = format!("{}/threads", self.base_url);
        let resp = self
            .beta_request(self.http.post(&url))
            .send()
            .await
            .map_err(|err| LlmError::Network(sanitize::redact(&err.to_string())))?;
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::ProviderError(sanitize::redact(&text)));
        }
        let parsed: ThreadResponse = resp
            .json()
            .await
            .map_err(|err| LlmError::ProviderError(sanitize::redact(&err.to_string())))?;
        *guard = Some(parsed.id.clone());
        Ok(parsed.id)
    }

    /// Deletes the backing thread. Best-effort: a failure here is not
    /// surfaced, since shutdown must not block on network cleanup.
    pub async fn close(&self) {
        let mut guard = self.thread_id.lock().await;
        if let Some(id) = guard.take() {
            let url = format!("{}/threads/{id}", self.base_url);
            let _ = self.beta_request(self.http.delete(&url)).send().await;
        }
    }
}

#[derive(Deserialize)]
struct ThreadResponse {
    id: String,
}

#[derive(Serialize)]
struct AddMessageRequest<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct RunRequest<'a> {
    assistant_id: &'a str,
    model: &'a str,
    instructions: &'a str,
    max_completion_tokens: u32,
}

#[derive(Deserialize)]
struct RunResponse {
    id: String,
    status: String,
}

#[derive(Deserialize)]
struct MessagesListResponse {
    data: Vec<ThreadMessage>,
}

#[derive(Deserialize)]
struct ThreadMessage {
    role: String,
    content: Vec<ThreadContentBlock>,
}

#[derive(Deserialize)]
struct ThreadContentBlock {
    text: Option<ThreadText>,
}

#[derive(Deserialize)]
struct ThreadText {
    value: String,
}

#[async_trait]
impl LlmClient for AssistantClient {
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
        // History lives on the server-side thread; only the new prompt is
        // appended each turn.
        let thread_id = self.ensure_thread().await?;

        let add_message_url = format!("{}/threads/{thread_id}/messages", self.base_url);
        self.retry
            .run(|| async {
                let result = self
                    .beta_request(self.http.post(&add_message_url))
                    .json(&AddMessageRequest { role: "user", content: prompt })
                    .send()
                    .await;
                match result {
                    Ok(resp) if resp.status().is_success() => Ok(()),
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

        let run_url = format!("{}/threads/{thread_id}/runs", self.base_url);
        let run: RunResponse = self
            .retry
            .run(|| async {
                let result = self
                    .beta_request(self.http.post(&run_url))
                    .json(&RunRequest {
                        assistant_id: &self.assistant_id,
                        model: &self.model,
                        instructions: system_prompt,
                        max_completion_tokens: max_tokens,
                    })
                    .send()
                    .await;
                match result {
                    Ok(resp) if resp.status().is_success() => resp
                        .json::<RunResponse>()
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

        self.poll_run(&thread_id, &run.id, run.status).await?;

        let messages_url = format!("{}/threads/{thread_id}/messages?limit=1", self.base_url);
        let listing: MessagesListResponse = self
            .beta_request(self.http.get(&messages_url))
            .send()
            .await
            .map_err(|err| LlmError::Network(sanitize::redact(&err.to_string())))?
            .json()
            .await
            .map_err(|err| LlmError::ProviderError(sanitize::redact(&err.to_string())))?;

        let text = listing
            .data
            .into_iter()
            .find(|m| m.role == "assistant")
            .map(|m| {
                m.content
                    .into_iter()
                    .filter_map(|b| b.text.map(|t| t.value))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let usage = TokenUsage::estimate(prompt, &text);
        Ok(LlmResponse { text, usage })
    }
}

impl AssistantClient {
    async fn poll_run(&self, thread_id: &str, run_id: &str, mut status: String) -> Result<(), LlmError> {
        let url = format!("{}/threads/{thread_id}/runs/{run_id}", self.base_url);
        while status == "queued" || status == "in_progress" {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let resp = self
                .beta_request(self.http.get(&url))
                .send()
                .await
                .map_err(|err| LlmError::Network(sanitize::redact(&err.to_string())))?;
            let run: RunResponse = resp
                .json()
                .await
                .map_err(|err| LlmError::ProviderError(sanitize::redact(&err.to_string())))?;
            status = run.status;
        }
        if status != "completed" {
            return Err(LlmError::ProviderError(format!("assistant run ended with status {status}")));
        }
        Ok(())
    }
}
