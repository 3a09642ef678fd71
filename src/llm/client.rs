//! LLM Client Contract (C9): the uniform interface the agent loop calls
//! through, regardless of backend. Narrowed to the single capability this
//! crate actually needs: send a prompt, get a response back.

use crate::error::LlmError;
use crate::message::Message;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }

    /// Rough estimate (~4 bytes/token) used by providers that don't
    /// report usage.
    pub fn estimate(prompt: &str, completion: &str) -> Self {
        Self {
            prompt_tokens: (prompt.len() as u32) / 4,
            completion_tokens: (completion.len() as u32) / 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub usage: TokenUsage,
}

/// Black-box completion client. Every variant owns its own HTTP client,
/// retries, timeout propagation, and error-text sanitization internally;
/// the agent loop never branches on provider identity.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn model_name(&self) -> &str;

    /// Sends `prompt` with the given `history` as context, capped at
    /// `max_tokens` of completion, returning either the model's text or a
    /// sanitized error.
    async fn send_prompt(
        &self,
        system_prompt: &str,
        history: &[Message],
        prompt: &str,
        max_tokens: u32,
    ) -> Result<LlmResponse, LlmError>;
}

/// Shared retry policy every provider wraps its HTTP call with: retry on
/// transient network errors, 429, and 5xx, exponential backoff capped at
/// `max_delay`, bail immediately on anything else.
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Runs `call` under this policy. `call` returns `Err((should_retry,
    /// error))` so the caller can classify auth/invalid-request failures
    /// (never retried) separately from network/429/5xx (retried).
    pub async fn run<F, Fut, T>(&self, mut call: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, (bool, LlmError)>>,
    {
        let mut delay = self.initial_delay;
        for attempt in 0..=self.max_retries {
            match call().await {
                Ok(value) => return Ok(value),
                Err((retryable, err)) => {
                    if !retryable || attempt == self.max_retries {
                        return Err(err);
                    }
                    tracing::warn!(attempt = attempt + 1, error = %err, "llm call failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(
                        Duration::from_secs_f64(delay.as_secs_f64() * self.multiplier),
                        self.max_delay,
                    );
                }
            }
        }
        unreachable!("loop always returns by the final attempt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_up_to_max_then_succeeds() {
        let policy = RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            multiplier: 2.0,
        };
        let attempts = AtomicU32::new(0);
        let result = policy
            .run(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err((true, LlmError::RateLimited))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_bails_immediately() {
        let policy = RetryPolicy::default();
        let attempts = AtomicU32::new(0);
        let result: Result<(), LlmError> = policy
            .run(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err((false, LlmError::ProviderError("bad request".to_string()))) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn token_estimate_is_roughly_four_bytes_per_token() {
        let usage = TokenUsage::estimate("abcdefgh", "abcd");
        assert_eq!(usage.prompt_tokens, 2);
        assert_eq!(usage.completion_tokens, 1);
    }
}
