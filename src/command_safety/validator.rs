//! Command validator contract (C1): `is_dangerous`, `validate`,
//! `is_likely_interactive`.

use crate::error::ValidationError;
use regex::Regex;
use tracing::warn;

use super::{dangerous_commands, interactive_commands};

/// Stateless validator holding compiled extra-denylist patterns and the
/// sudo policy, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct CommandValidator {
    allow_sudo: bool,
    extra_denylist: Vec<Regex>,
}

impl CommandValidator {
    pub fn new(allow_sudo: bool, extra_patterns: &[String]) -> Self {
        let extra_denylist = extra_patterns
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(error) => {
                    warn!(%pattern, %error, "ignoring invalid denylist pattern");
                    None
                }
            })
            .collect();
        Self {
            allow_sudo,
            extra_denylist,
        }
    }

    /// Builds a validator from the process environment
    /// (`CHATCLI_AGENT_ALLOW_SUDO`, `CHATCLI_AGENT_DENYLIST`).
    pub fn from_env() -> Self {
        Self::new(crate::config::allow_sudo(), &crate::config::denylist_patterns())
    }

    pub fn is_dangerous(&self, cmd: &str) -> bool {
        dangerous_commands::is_dangerous(cmd, self.allow_sudo, &self.extra_denylist)
    }

    pub fn is_likely_interactive(&self, cmd: &str) -> bool {
        interactive_commands::is_likely_interactive(cmd)
    }

    /// Validates a command string. Dangerous classification never blocks
    /// by itself — it is reported so the caller can raise a confirmation
    /// requirement.
    pub fn validate(&self, cmd: &str) -> Result<(), ValidationError> {
        if cmd.trim().is_empty() {
            return Err(ValidationError::EmptyCommand);
        }
        if self.is_dangerous(cmd) {
            return Err(ValidationError::DangerousCommand {
                offending_command: cmd.to_string(),
            });
        }
        Ok(())
    }
}
