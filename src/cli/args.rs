//! Command-line surface: positional-free, provider/model
//! selection plus one-shot prompting.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "chatcli", version, about = "Terminal-native LLM agent")]
pub struct Cli {
    /// Run a single prompt non-interactively and exit. If given with no
    /// value and stdin is piped, the piped content is the prompt.
    #[arg(short = 'p', long = "prompt", num_args = 0..=1, default_missing_value = "")]
    pub prompt: Option<String>,

    #[arg(long = "provider")]
    pub provider: Option<String>,

    #[arg(long = "model")]
    pub model: Option<String>,

    #[arg(long = "timeout")]
    pub timeout: Option<String>,

    #[arg(long = "no-anim")]
    pub no_anim: bool,
}

impl Cli {
    /// Resolves the one-shot prompt text: the flag's value if non-empty,
    /// otherwise stdin when it was piped in (`-p` given bare).
    pub fn resolve_prompt(&self) -> Option<String> {
        let flag = self.prompt.as_ref()?;
        if !flag.is_empty() {
            return Some(flag.clone());
        }
        use std::io::Read;
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).ok()?;
        let trimmed = buf.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_with_value_is_used_directly() {
        let cli = Cli {
            prompt: Some("do the thing".to_string()),
            provider: None,
            model: None,
            timeout: None,
            no_anim: false,
        };
        assert_eq!(cli.resolve_prompt(), Some("do the thing".to_string()));
    }
}
