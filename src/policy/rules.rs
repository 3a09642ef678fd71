//! Persisted policy rules: `<action>\t<pattern>` lines, first match wins.

use crate::error::PipelineError;
use fs2::FileExt;
use regex::Regex;
use std::fs;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Allow,
    Deny,
}

impl RuleAction {
    fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Allow => "allow",
            RuleAction::Deny => "deny",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PolicyRule {
    pub pattern: String,
    pub action: RuleAction,
    regex: Regex,
}

impl PolicyRule {
    pub fn new(pattern: String, action: RuleAction) -> Result<Self, PipelineError> {
        let regex = Regex::new(&pattern).map_err(|err| PipelineError::ScanFailed(err.to_string()))?;
        Ok(Self { pattern, action, regex })
    }

    pub fn matches(&self, canonical_call: &str) -> bool {
        self.regex.is_match(canonical_call)
    }
}

/// Loads rules from `path` in file order. Missing file yields an empty
/// rule set rather than an error (no rules means `ask` for everything).
/// Takes a shared lock for the duration of the read so a concurrent
/// `append_rule` from another process can't be observed mid-write.
pub fn load_rules(path: &Path) -> Result<Vec<PolicyRule>, PipelineError> {
    let Ok(mut file) = fs::File::open(path) else {
        return Ok(Vec::new());
    };
    file.lock_shared().map_err(|err| PipelineError::ScanFailed(err.to_string()))?;
    let mut text = String::new();
    let read_result = file.read_to_string(&mut text);
    let _ = file.unlock();
    read_result.map_err(|err| PipelineError::ScanFailed(err.to_string()))?;

    let mut rules = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((action, pattern)) = line.split_once('\t') else {
            continue;
        };
        let action = match action {
            "allow" => RuleAction::Allow,
            "deny" => RuleAction::Deny,
            _ => continue,
        };
        rules.push(PolicyRule::new(pattern.to_string(), action)?);
    }
    Ok(rules)
}

/// Appends one rule to the file, creating parent directories as needed.
/// Holds an exclusive lock across the open-append-write so two processes
/// persisting a rule at once can't interleave their writes.
pub fn append_rule(path: &Path, rule: &PolicyRule) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| PipelineError::ScanFailed(err.to_string()))?;
    }
    let line = format!("{}\t{}\n", rule.action.as_str(), rule.pattern);
    use std::io::Write;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| PipelineError::ScanFailed(err.to_string()))?;
    file.lock_exclusive().map_err(|err| PipelineError::ScanFailed(err.to_string()))?;
    let write_result = file.write_all(line.as_bytes());
    let _ = file.unlock();
    write_result.map_err(|err| PipelineError::ScanFailed(err.to_string()))
}

/// First-match-wins lookup over the given rule set.
pub fn evaluate(rules: &[PolicyRule], canonical_call: &str) -> Option<RuleAction> {
    rules.iter().find(|r| r.matches(canonical_call)).map(|r| r.action)
}

/// Suggests a rule pattern anchored on the tool name and the leading verb
/// of its args, e.g. `exec --cmd "git status"` ->
/// `^exec\s+--cmd\s+"git\b`.
pub fn suggest_pattern(tool: &str, args: &str) -> String {
    let mut pattern = format!("^{}", regex::escape(tool));

    match args.find(|c| c == '"' || c == '\'') {
        Some(quote_idx) => {
            let before_quote = args[..quote_idx].trim();
            let quote_char = &args[quote_idx..quote_idx + 1];
            let leading_word = args[quote_idx + 1..].split_whitespace().next().unwrap_or("");
            pattern.push_str(r"\s+");
            if !before_quote.is_empty() {
                pattern.push_str(&escape_with_whitespace(before_quote));
                pattern.push_str(r"\s+");
            }
            pattern.push_str(&regex::escape(quote_char));
            pattern.push_str(&regex::escape(leading_word));
            pattern.push_str(r"\b");
        }
        None => {
            if let Some(leading_word) = args.split_whitespace().next() {
                pattern.push_str(r"\s+");
                pattern.push_str(&regex::escape(leading_word));
                pattern.push_str(r"\b");
            }
        }
    }
    pattern
}

fn escape_with_whitespace(s: &str) -> String {
    s.split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_rules_in_file_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules");
        fs::write(&path, "allow\t^git status\ndeny\t^git push\n").unwrap();
        let rules = load_rules(&path).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].action, RuleAction::Allow);
        assert_eq!(rules[1].action, RuleAction::Deny);
    }

    #[test]
    fn missing_file_yields_empty_rules() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing");
        let rules = load_rules(&path).unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn first_match_wins() {
        let rules = vec![
            PolicyRule::new("^git".to_string(), RuleAction::Allow).unwrap(),
            PolicyRule::new("^git push".to_string(), RuleAction::Deny).unwrap(),
        ];
        assert_eq!(evaluate(&rules, "git push origin"), Some(RuleAction::Allow));
    }

    #[test]
    fn append_rule_persists_and_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("rules");
        let rule = PolicyRule::new("^git status".to_string(), RuleAction::Allow).unwrap();
        append_rule(&path, &rule).unwrap();
        let reloaded = load_rules(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].pattern, "^git status");
    }

    #[test]
    fn suggest_pattern_anchors_tool_and_leading_verb() {
        let pattern = suggest_pattern("exec", r#"--cmd "git status""#);
        assert_eq!(pattern, r#"^exec\s+\-\-cmd\s+"git\b"#);
    }
}
