//! Policy Manager (C7): maps `(tool, args)` to allow/deny/ask, persists
//! rules, and serializes the interactive prompt across concurrent workers.
//! Evaluation is a prefix/regex match against persisted rules, generalized
//! to the three-state allow/deny/ask model this system needs.

use crate::error::PolicyDeniedError;
use crate::policy::rules::{self, PolicyRule, RuleAction};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Deny,
    Ask,
}

/// The four choices offered at an `ask` prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
    RunOnce,
    AllowAlways,
    DenyOnce,
    DenyForever,
}

/// Abstraction over the interactive prompt so the manager stays testable
/// without a terminal.
#[async_trait]
pub trait PolicyPrompt: Send + Sync {
    async fn ask(&self, tool: &str, args: &str, suggested_pattern: &str) -> PromptChoice;
}

/// Canonical string a rule pattern is matched against: `"<tool> <args>"`.
pub fn canonical_call(tool: &str, args: &str) -> String {
    if args.is_empty() {
        tool.to_string()
    } else {
        format!("{tool} {args}")
    }
}

pub struct PolicyManager {
    rules_path: PathBuf,
    /// Serializes interactive prompts; also gates rule mutation so a
    /// waiting worker re-reads rules set by the one that just prompted.
    prompt_lock: Mutex<()>,
}

impl PolicyManager {
    pub fn new(rules_path: PathBuf) -> Self {
        Self {
            rules_path,
            prompt_lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Vec<PolicyRule> {
        rules::load_rules(&self.rules_path).unwrap_or_default()
    }

    /// Pure lookup against the rules on disk; does not prompt.
    pub fn check(&self, tool: &str, args: &str) -> PolicyDecision {
        let rules = self.load();
        let call = canonical_call(tool, args);
        match rules::evaluate(&rules, &call) {
            Some(RuleAction::Allow) => PolicyDecision::Allow,
            Some(RuleAction::Deny) => PolicyDecision::Deny,
            None => PolicyDecision::Ask,
        }
    }

    pub fn add_rule(&self, pattern: &str, action: RuleAction) -> Result<(), PolicyDeniedError> {
        let rule = PolicyRule::new(pattern.to_string(), action)
            .map_err(|err| PolicyDeniedError { reason: err.to_string() })?;
        rules::append_rule(&self.rules_path, &rule)
            .map_err(|err| PolicyDeniedError { reason: err.to_string() })
    }

    /// Resolves a call to a final allow/deny, prompting interactively when
    /// no rule matches. Acquires the prompt mutex before prompting and
    /// re-checks rules after acquiring it, since another worker may have
    /// persisted a covering rule while this one waited.
    pub async fn resolve(
        &self,
        tool: &str,
        args: &str,
        prompt: &dyn PolicyPrompt,
    ) -> Result<(), PolicyDeniedError> {
        match self.check(tool, args) {
            PolicyDecision::Allow => return Ok(()),
            PolicyDecision::Deny => {
                return Err(PolicyDeniedError {
                    reason: format!("rule denies: {}", canonical_call(tool, args)),
                })
            }
            PolicyDecision::Ask => {}
        }

        let _guard = self.prompt_lock.lock().await;

        // Re-check: a parallel worker may have resolved this while we
        // waited for the lock.
        match self.check(tool, args) {
            PolicyDecision::Allow => return Ok(()),
            PolicyDecision::Deny => {
                return Err(PolicyDeniedError {
                    reason: format!("rule denies: {}", canonical_call(tool, args)),
                })
            }
            PolicyDecision::Ask => {}
        }

        let suggested = rules::suggest_pattern(tool, args);
        match prompt.ask(tool, args, &suggested).await {
            PromptChoice::RunOnce => Ok(()),
            PromptChoice::DenyOnce => Err(PolicyDeniedError {
                reason: "denied once by user".to_string(),
            }),
            PromptChoice::AllowAlways => {
                self.add_rule(&suggested, RuleAction::Allow)?;
                Ok(())
            }
            PromptChoice::DenyForever => {
                self.add_rule(&suggested, RuleAction::Deny)?;
                Err(PolicyDeniedError {
                    reason: "denied forever by user".to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct FixedPrompt(PromptChoice);

    #[async_trait]
    impl PolicyPrompt for FixedPrompt {
        async fn ask(&self, _tool: &str, _args: &str, _suggested_pattern: &str) -> PromptChoice {
            self.0
        }
    }

    #[tokio::test]
    async fn no_rules_means_ask_and_run_once_does_not_persist() {
        let dir = tempdir().unwrap();
        let manager = PolicyManager::new(dir.path().join("rules"));
        let prompt = FixedPrompt(PromptChoice::RunOnce);
        manager.resolve("exec", r#"--cmd "git status""#, &prompt).await.unwrap();
        assert_eq!(manager.check("exec", r#"--cmd "git status""#), PolicyDecision::Ask);
    }

    #[tokio::test]
    async fn allow_always_persists_and_covers_next_call() {
        let dir = tempdir().unwrap();
        let manager = PolicyManager::new(dir.path().join("rules"));
        let prompt = FixedPrompt(PromptChoice::AllowAlways);
        manager.resolve("exec", r#"--cmd "git status""#, &prompt).await.unwrap();
        assert_eq!(manager.check("exec", r#"--cmd "git status""#), PolicyDecision::Allow);
    }

    #[tokio::test]
    async fn deny_forever_persists_and_returns_error_immediately() {
        let dir = tempdir().unwrap();
        let manager = PolicyManager::new(dir.path().join("rules"));
        let prompt = FixedPrompt(PromptChoice::DenyForever);
        let result = manager.resolve("exec", r#"--cmd "git push""#, &prompt).await;
        assert!(result.is_err());
        assert_eq!(manager.check("exec", r#"--cmd "git push""#), PolicyDecision::Deny);
    }

    #[tokio::test]
    async fn deny_once_does_not_persist() {
        let dir = tempdir().unwrap();
        let manager = PolicyManager::new(dir.path().join("rules"));
        let prompt = FixedPrompt(PromptChoice::DenyOnce);
        let result = manager.resolve("exec", r#"--cmd "rm -rf /tmp/x""#, &prompt).await;
        assert!(result.is_err());
        assert_eq!(manager.check("exec", r#"--cmd "rm -rf /tmp/x""#), PolicyDecision::Ask);
    }

    #[tokio::test]
    async fn existing_deny_rule_short_circuits_without_prompting() {
        let dir = tempdir().unwrap();
        let rules_path = dir.path().join("rules");
        let manager = PolicyManager::new(rules_path.clone());
        manager.add_rule("^exec\\s+--cmd\\s+\"rm\\b", RuleAction::Deny).unwrap();
        assert_eq!(manager.check("exec", r#"--cmd "rm -rf /""#), PolicyDecision::Deny);
    }
}
