//! Directive/Context Pipeline (C4): strips `@history`/`@git`/`@env`/
//! `@file`/`@command` directives and the trailing `>` marker out of the
//! user's message, resolves each one, and hands the agent loop back a
//! clean prompt plus the resolved context blocks to attach.

pub mod directives;
pub mod file_ingest;

use crate::chunk_queue::ChunkQueue;
use crate::error::PipelineError;
use crate::executor::CommandExecutor;
use directives::{parse_directives, Directive};
use file_ingest::{ingest_file_directive, FileIngestOutcome};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Notified once per file visited during an `@file` scan, so the caller
/// can drive an animation or spinner without the ingestion code knowing
/// anything about rendering.
pub trait ProgressCallback: Send + Sync {
    fn on_file_visited(&self, path: &Path);
}

/// No-op implementation for callers (tests, one-shot mode) that don't
/// render progress.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn on_file_visited(&self, _path: &Path) {}
}

/// Context gathered from directives, ready to attach to the outgoing
/// prompt. `system_blocks` precede the user's cleaned text (environment,
/// git, shell history); `user_blocks` follow it (file ingests, command
/// output, the trailing `>` marker's appended text).
#[derive(Debug, Default)]
pub struct ResolvedContext {
    pub system_blocks: Vec<String>,
    pub user_blocks: Vec<String>,
    /// Set when a `chunked` `@file` directive produced more than one
    /// chunk; the caller is responsible for driving it via `/nextchunk`.
    pub queued_chunks: Option<ChunkQueue>,
}

impl ResolvedContext {
    pub fn is_empty(&self) -> bool {
        self.system_blocks.is_empty() && self.user_blocks.is_empty() && self.queued_chunks.is_none()
    }
}

/// Runs the full pipeline over one user message: extracts directives,
/// resolves each against the live environment/shell/filesystem, and
/// returns the directive-free text alongside the resolved context.
pub async fn process_special_commands(
    user_text: &str,
    workdir: &Path,
    context_window: usize,
    executor: &mut CommandExecutor,
    progress: &dyn ProgressCallback,
    chunk_read_pause: Duration,
    cancel: &CancellationToken,
) -> Result<(String, ResolvedContext), PipelineError> {
    let (cleaned, directives, trailing_context) = parse_directives(user_text);
    let budget_tokens = (context_window as f64 * 0.75) as usize;
    let mut resolved = ResolvedContext::default();

    for directive in &directives {
        match directive {
            Directive::History { limit } => {
                resolved.system_blocks.push(resolve_history(*limit));
            }
            Directive::Git => {
                resolved.system_blocks.push(resolve_git(executor, cancel.clone()).await);
            }
            Directive::Env => {
                resolved.system_blocks.push(resolve_env());
            }
            Directive::File { path, mode } => {
                let outcome = ingest_file_directive(
                    workdir,
                    path,
                    *mode,
                    budget_tokens,
                    &cleaned,
                    progress,
                    chunk_read_pause,
                )
                .await?;
                match outcome {
                    FileIngestOutcome::Inline(text) => resolved.user_blocks.push(text),
                    FileIngestOutcome::Chunked { first, queue } => {
                        resolved.user_blocks.push(first);
                        resolved.queued_chunks = Some(queue);
                    }
                }
            }
            Directive::Command { cmd, ai, question } => {
                let block = resolve_command(executor, cmd, *ai, question.as_deref(), cancel.clone()).await;
                resolved.user_blocks.push(block);
            }
        }
    }

    if let Some(context) = trailing_context {
        resolved.user_blocks.push(format!("--- additional context ---\n{context}"));
    }

    Ok((cleaned, resolved))
}

fn resolve_history(limit: usize) -> String {
    let history_path = shell_history_path();
    let Some(path) = history_path else {
        return "--- shell history ---\n(unavailable: unrecognized shell)".to_string();
    };
    let Ok(content) = std::fs::read_to_string(&path) else {
        return format!("--- shell history ---\n(unavailable: could not read {})", path.display());
    };
    let lines: Vec<&str> = content.lines().rev().take(limit).collect();
    let numbered: Vec<String> = lines
        .into_iter()
        .rev()
        .enumerate()
        .map(|(i, line)| format!("{}: {}", i + 1, line))
        .collect();
    format!("--- last {} shell history entries ---\n{}", limit, numbered.join("\n"))
}

fn shell_history_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    let shell = std::env::var("SHELL").unwrap_or_default();
    let candidate = if shell.contains("zsh") {
        home.join(".zsh_history")
    } else if shell.contains("fish") {
        home.join(".local/share/fish/fish_history")
    } else {
        home.join(".bash_history")
    };
    candidate.exists().then_some(candidate)
}

async fn resolve_git(executor: &mut CommandExecutor, cancel: CancellationToken) -> String {
    let status = executor.execute("git status --short --branch", false, cancel.clone()).await;
    let log = executor.execute("git log --oneline -n 10", false, cancel.clone()).await;
    let remotes = executor.execute("git remote -v", false, cancel).await;
    format!(
        "--- git status ---\n{}\n--- recent commits ---\n{}\n--- remotes ---\n{}",
        status.output, log.output, remotes.output
    )
}

/// Environment variables, redacted the same way command output is.
fn resolve_env() -> String {
    let mut lines: Vec<String> = std::env::vars()
        .map(|(key, value)| crate::sanitize::redact(&format!("{key}={value}")))
        .collect();
    lines.sort();
    format!("--- environment ---\n{}", lines.join("\n"))
}

async fn resolve_command(
    executor: &mut CommandExecutor,
    cmd: &str,
    ai: bool,
    question: Option<&str>,
    cancel: CancellationToken,
) -> String {
    let result = executor.execute(cmd, false, cancel).await;
    let body = crate::sanitize::redact(&result.output);
    if ai {
        let question = question.unwrap_or("explain this output");
        format!("--- output of `{cmd}` (question: {question}) ---\n{body}")
    } else {
        format!("--- output of `{cmd}` ---\n{body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProgress {
        count: AtomicUsize,
    }

    impl ProgressCallback for CountingProgress {
        fn on_file_visited(&self, _path: &Path) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn plain_text_with_no_directives_passes_through_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = CommandExecutor::new(dir.path().to_path_buf());
        let cancel = CancellationToken::new();
        let (cleaned, resolved) = process_special_commands(
            "what does this function do?",
            dir.path(),
            8_000,
            &mut executor,
            &NullProgress,
            Duration::ZERO,
            &cancel,
        )
        .await
        .unwrap();
        assert_eq!(cleaned, "what does this function do?");
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn env_directive_resolves_into_a_system_block() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = CommandExecutor::new(dir.path().to_path_buf());
        let cancel = CancellationToken::new();
        let (cleaned, resolved) = process_special_commands(
            "@env\nwhat is PATH set to?",
            dir.path(),
            8_000,
            &mut executor,
            &NullProgress,
            Duration::ZERO,
            &cancel,
        )
        .await
        .unwrap();
        assert_eq!(cleaned, "what is PATH set to?");
        assert_eq!(resolved.system_blocks.len(), 1);
        assert!(resolved.system_blocks[0].starts_with("--- environment ---"));
    }

    #[tokio::test]
    async fn file_directive_triggers_progress_callback_per_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("b.txt"), "world").unwrap();
        let mut executor = CommandExecutor::new(dir.path().to_path_buf());
        let cancel = CancellationToken::new();
        let progress = CountingProgress { count: AtomicUsize::new(0) };
        let (_, resolved) = process_special_commands(
            "@file .\nsummarize these",
            dir.path(),
            8_000,
            &mut executor,
            &progress,
            Duration::ZERO,
            &cancel,
        )
        .await
        .unwrap();
        assert_eq!(resolved.user_blocks.len(), 1);
        assert_eq!(progress.count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn trailing_marker_becomes_a_user_block() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = CommandExecutor::new(dir.path().to_path_buf());
        let cancel = CancellationToken::new();
        let (cleaned, resolved) = process_special_commands(
            "explain this > focus on error handling",
            dir.path(),
            8_000,
            &mut executor,
            &NullProgress,
            Duration::ZERO,
            &cancel,
        )
        .await
        .unwrap();
        assert_eq!(cleaned, "explain this");
        assert_eq!(resolved.user_blocks.len(), 1);
        assert!(resolved.user_blocks[0].contains("focus on error handling"));
    }
}
