//! Terminal implementations of the agent loop's confirmation traits.
//! The phrase-matching and menu rendering live here, outside the core.

use crate::agent::{ConfirmPrompt, DANGEROUS_CONFIRMATION_PHRASE};
use crate::context::ProgressCallback;
use crate::policy::{PolicyPrompt, PromptChoice};
use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

fn read_line(label: &str) -> String {
    print!("{label}");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return String::new();
    }
    line.trim_end_matches(['\n', '\r']).to_string()
}

/// Reads from stdin and requires the exact confirmation phrase before a
/// dangerous command runs, or a simple yes/no for interactive passthrough.
pub struct TerminalConfirm;

#[async_trait]
impl ConfirmPrompt for TerminalConfirm {
    async fn confirm_dangerous(&self, commands: &[String]) -> bool {
        println!("\x1b[33mwarning: potentially dangerous command(s):\x1b[0m");
        for command in commands {
            println!("  {command}");
        }
        println!(
            "Type exactly \"{DANGEROUS_CONFIRMATION_PHRASE}\" to proceed, anything else aborts."
        );
        let answer = read_line("> ");
        answer == DANGEROUS_CONFIRMATION_PHRASE
    }

    async fn confirm_interactive(&self, command: &str) -> bool {
        println!("`{command}` looks interactive and needs a TTY. Run it? [y/N]");
        let answer = read_line("> ");
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

/// Presents the four-choice policy prompt, pausing whatever spinner the
/// caller is driving around this call.
pub struct TerminalPolicyPrompt;

#[async_trait]
impl PolicyPrompt for TerminalPolicyPrompt {
    async fn ask(&self, tool: &str, args: &str, suggested_pattern: &str) -> PromptChoice {
        println!("policy: `{tool} {args}` has no matching rule.");
        println!("  [1] run once  [2] allow always  [3] deny once  [4] deny forever");
        println!("  (rule to persist on 2/4: {suggested_pattern})");
        match read_line("> ").trim() {
            "2" => PromptChoice::AllowAlways,
            "3" => PromptChoice::DenyOnce,
            "4" => PromptChoice::DenyForever,
            _ => PromptChoice::RunOnce,
        }
    }
}

/// Redraws a one-line file counter as `@file` walks the tree. A terminal
/// carriage return is enough fidelity for the single-threaded CLI driving
/// it here.
pub struct TerminalProgress {
    count: AtomicU64,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self { count: AtomicU64::new(0) }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_file_visited(&self, path: &Path) {
        let seen = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        eprint!("\rscanning... {seen} files ({})          ", path.display());
        let _ = std::io::stderr().flush();
    }
}
