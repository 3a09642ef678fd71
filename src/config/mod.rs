//! Environment variables, persisted-state paths, and provider/model
//! selection. `dotenvy` loads a `CHATCLI_DOTENV`-pointed file before
//! falling back to the process environment.

pub mod paths;

use std::env;
use std::time::Duration;

/// Loads `.env` (or the path in `CHATCLI_DOTENV`) into the process
/// environment. Missing files are not fatal.
pub fn load_dotenv() {
    if let Ok(custom) = env::var("CHATCLI_DOTENV") {
        let _ = dotenvy::from_path(custom);
    } else {
        let _ = dotenvy::dotenv();
    }
}

/// Supported LLM provider backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    OpenAiResponses,
    ClaudeAi,
    GoogleAi,
    OpenAiAssistant,
    StackSpot,
    Ollama,
}

impl Provider {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "OPENAI" => Some(Self::OpenAi),
            "OPENAI_RESPONSES" => Some(Self::OpenAiResponses),
            "CLAUDEAI" => Some(Self::ClaudeAi),
            "GOOGLEAI" => Some(Self::GoogleAi),
            "OPENAI_ASSISTANT" => Some(Self::OpenAiAssistant),
            "STACKSPOT" => Some(Self::StackSpot),
            "OLLAMA" => Some(Self::Ollama),
            _ => None,
        }
    }

    /// The environment variable carrying this provider's default model id.
    pub fn model_env_var(self) -> &'static str {
        match self {
            Self::OpenAi | Self::OpenAiResponses | Self::OpenAiAssistant => "OPENAI_MODEL",
            Self::ClaudeAi => "CLAUDEAI_MODEL",
            Self::GoogleAi => "GOOGLEAI_MODEL",
            Self::StackSpot => "STACKSPOT_MODEL",
            Self::Ollama => "OLLAMA_MODEL",
        }
    }

    pub fn api_key_env_var(self) -> &'static str {
        match self {
            Self::OpenAi | Self::OpenAiResponses | Self::OpenAiAssistant => "OPENAI_API_KEY",
            Self::ClaudeAi => "CLAUDEAI_API_KEY",
            Self::GoogleAi => "GOOGLEAI_API_KEY",
            Self::StackSpot => "CLIENT_SECRET",
            Self::Ollama => "",
        }
    }

    /// Context-window budget in tokens, overridable via `<PROVIDER>_MAX_TOKENS`.
    pub fn context_window(self) -> usize {
        let env_var = match self {
            Self::OpenAi | Self::OpenAiResponses | Self::OpenAiAssistant => "OPENAI_MAX_TOKENS",
            Self::ClaudeAi => "CLAUDEAI_MAX_TOKENS",
            Self::GoogleAi => "GOOGLEAI_MAX_TOKENS",
            Self::StackSpot => "STACKSPOT_MAX_TOKENS",
            Self::Ollama => "OLLAMA_MAX_TOKENS",
        };
        if let Ok(raw) = env::var(env_var) {
            if let Ok(value) = raw.parse::<usize>() {
                return value;
            }
        }
        match self {
            Self::OpenAi | Self::OpenAiResponses | Self::OpenAiAssistant => 128_000,
            Self::ClaudeAi => 200_000,
            Self::GoogleAi => 1_000_000,
            Self::StackSpot => 32_000,
            Self::Ollama => 8_000,
        }
    }
}

/// Whether `sudo` is allowed to run without being flagged dangerous.
pub fn allow_sudo() -> bool {
    env::var("CHATCLI_AGENT_ALLOW_SUDO")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Extra denylist regex patterns from `CHATCLI_AGENT_DENYLIST` (semicolon
/// separated). Invalid patterns are dropped by the caller with a warning.
pub fn denylist_patterns() -> Vec<String> {
    env::var("CHATCLI_AGENT_DENYLIST")
        .map(|raw| {
            raw.split(';')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Default per-command timeout, overridable via `CHATCLI_AGENT_CMD_TIMEOUT`
/// (a duration string such as `30s`, `2m`).
pub fn command_timeout() -> Duration {
    env::var("CHATCLI_AGENT_CMD_TIMEOUT")
        .ok()
        .and_then(|raw| parse_duration(&raw))
        .unwrap_or(Duration::from_secs(30))
}

/// Per-turn deadline: 30 minutes interactive, 5 minutes one-shot.
pub fn turn_deadline(one_shot: bool) -> Duration {
    if one_shot {
        Duration::from_secs(5 * 60)
    } else {
        Duration::from_secs(30 * 60)
    }
}

fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (number_part, unit) = raw.split_at(raw.find(|c: char| c.is_alphabetic())?);
    let value: u64 = number_part.parse().ok()?;
    match unit {
        "s" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value * 60)),
        "h" => Some(Duration::from_secs(value * 3600)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_providers() {
        assert_eq!(Provider::parse("OPENAI"), Some(Provider::OpenAi));
        assert_eq!(Provider::parse("claudeai"), Some(Provider::ClaudeAi));
        assert_eq!(Provider::parse("bogus"), None);
    }

    #[test]
    fn parses_duration_strings() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("nonsense"), None);
    }
}
