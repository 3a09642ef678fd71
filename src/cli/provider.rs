//! Resolves a `config::Provider` plus model/credentials from flags and
//! environment into a concrete `LlmClient`.

use crate::config::Provider;
use crate::llm::providers::{
    AssistantClient, ClaudeClient, GeminiClient, OllamaClient, OpenAiClient,
    OpenAiResponsesClient, StackSpotClient,
};
use crate::llm::LlmClient;
use crate::ChatCliError;
use std::env;
use std::sync::Arc;

/// Picks the provider from `--provider`, falling back to `LLM_PROVIDER`,
/// defaulting to OpenAI.
pub fn resolve_provider(flag: Option<&str>) -> Result<Provider, ChatCliError> {
    if let Some(raw) = flag {
        return Provider::parse(raw)
            .ok_or_else(|| ChatCliError::InvalidProviderConfig(format!("unknown provider: {raw}")));
    }
    if let Ok(raw) = env::var("LLM_PROVIDER") {
        return Provider::parse(&raw)
            .ok_or_else(|| ChatCliError::InvalidProviderConfig(format!("unknown provider: {raw}")));
    }
    Ok(Provider::OpenAi)
}

fn resolve_model(provider: Provider, flag: Option<&str>) -> Option<String> {
    flag.map(str::to_string).or_else(|| env::var(provider.model_env_var()).ok())
}

/// Builds the concrete client for `provider`. `OPENAI_ASSISTANT` reuses
/// the OpenAI API key but additionally requires `OPENAI_ASSISTANT_ID`.
pub fn build_client(provider: Provider, model_flag: Option<&str>) -> Result<Arc<dyn LlmClient>, ChatCliError> {
    let model = resolve_model(provider, model_flag);

    match provider {
        Provider::OpenAi => {
            let api_key = require_env(provider.api_key_env_var())?;
            let model = model.unwrap_or_else(|| "gpt-4o-mini".to_string());
            Ok(Arc::new(OpenAiClient::new(api_key, model)))
        }
        Provider::OpenAiResponses => {
            let api_key = require_env(provider.api_key_env_var())?;
            let model = model.unwrap_or_else(|| "gpt-5".to_string());
            Ok(Arc::new(OpenAiResponsesClient::new(api_key, model)))
        }
        Provider::ClaudeAi => {
            let api_key = require_env(provider.api_key_env_var())?;
            let model = model.unwrap_or_else(|| "claude-3-5-sonnet-latest".to_string());
            Ok(Arc::new(ClaudeClient::new(api_key, model)))
        }
        Provider::GoogleAi => {
            let api_key = require_env(provider.api_key_env_var())?;
            let model = model.unwrap_or_else(|| "gemini-1.5-pro".to_string());
            Ok(Arc::new(GeminiClient::new(api_key, model)))
        }
        Provider::OpenAiAssistant => {
            let api_key = require_env(provider.api_key_env_var())?;
            let assistant_id = require_env("OPENAI_ASSISTANT_ID")?;
            let model = model.unwrap_or_else(|| "gpt-4o-mini".to_string());
            Ok(Arc::new(AssistantClient::new(api_key, model, assistant_id)))
        }
        Provider::StackSpot => {
            let client_id = require_env("CLIENT_ID")?;
            let client_secret = require_env("CLIENT_SECRET")?;
            let realm = env::var("TENANT_NAME").unwrap_or_else(|_| "stackspot-freemium".to_string());
            let model = model.unwrap_or_else(|| env::var("SLUG_NAME").unwrap_or_default());
            Ok(Arc::new(StackSpotClient::new(client_id, client_secret, realm, model)))
        }
        Provider::Ollama => {
            let model = model.unwrap_or_else(|| "llama3".to_string());
            Ok(Arc::new(OllamaClient::new(model)))
        }
    }
}

fn require_env(name: &str) -> Result<String, ChatCliError> {
    env::var(name).map_err(|_| ChatCliError::InvalidProviderConfig(format!("missing required env var {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_openai_without_flag_or_env() {
        assert_eq!(resolve_provider(None).unwrap(), Provider::OpenAi);
    }

    #[test]
    fn explicit_flag_wins() {
        assert_eq!(resolve_provider(Some("CLAUDEAI")).unwrap(), Provider::ClaudeAi);
    }

    #[test]
    fn unknown_provider_is_an_error() {
        assert!(resolve_provider(Some("bogus")).is_err());
    }
}
