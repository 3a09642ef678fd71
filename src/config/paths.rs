//! Persisted state layout under `~/.chatcli/`.

use std::path::PathBuf;

fn root_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".chatcli")
}

pub fn sessions_dir() -> PathBuf {
    root_dir().join("sessions")
}

pub fn session_file(name: &str) -> PathBuf {
    sessions_dir().join(format!("{name}.json"))
}

pub fn policy_rules_file() -> PathBuf {
    root_dir().join("policy").join("rules")
}

pub fn history_file() -> PathBuf {
    root_dir().join(".chatcli_history")
}

pub fn agents_dir() -> PathBuf {
    root_dir().join("agents")
}

pub fn skills_dir() -> PathBuf {
    root_dir().join("skills")
}
