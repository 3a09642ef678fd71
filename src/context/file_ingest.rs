//! `@file` ingestion: `full`/`summary`/`chunked`/`smart` modes over a file
//! or directory.

use crate::chunk_queue::{ChunkQueue, FileChunk};
use crate::context::directives::FileMode;
use crate::context::ProgressCallback;
use crate::error::PipelineError;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CODE_EXTENSIONS: &[&str] = &[
    "rs", "go", "py", "js", "ts", "tsx", "jsx", "java", "c", "cpp", "h", "hpp", "rb", "sh", "yaml",
    "yml", "toml", "json",
];
const LARGE_FILE_BYTES: u64 = 50_000;
const STOP_WORDS: &[&str] = &["the", "a", "an", "of", "in", "to", "is", "and", "for", "on", "this"];

pub enum FileIngestOutcome {
    /// `full`/`summary`/`smart`: one piece of ready-to-send text.
    Inline(String),
    /// `chunked`: the first chunk's banner-wrapped text, plus the queue
    /// (still holding that same first chunk, per `ChunkQueue`'s own
    /// pop-on-success contract) for `/nextchunk` onward.
    Chunked { first: String, queue: ChunkQueue },
}

struct VisitedFile {
    path: PathBuf,
    relative: String,
    content: Option<String>,
    size: u64,
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest.strip_prefix('/').unwrap_or(rest));
        }
    }
    PathBuf::from(path)
}

fn is_ignored(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.starts_with('.') || matches!(name, "node_modules" | "target" | "dist" | "build")
}

fn detect_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if CODE_EXTENSIONS.contains(&ext) => "code",
        Some("md") | Some("txt") => "text",
        None => "unknown",
        Some(_) => "data",
    }
}

fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

/// Walks `root` (a file or directory), reading UTF-8 file contents and
/// notifying `progress` per visit. Binary/unreadable files are kept as
/// metadata-only entries (`content: None`).
fn walk(root: &Path, progress: &dyn ProgressCallback) -> Result<Vec<VisitedFile>, PipelineError> {
    if !root.exists() {
        return Err(PipelineError::FileNotFound(root.display().to_string()));
    }

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_ignored(e.path()))
    {
        let entry = entry.map_err(|err| PipelineError::ScanFailed(err.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let metadata = entry.metadata().map_err(|err| PipelineError::ScanFailed(err.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .display()
            .to_string();
        let content = std::fs::read_to_string(entry.path()).ok();
        progress.on_file_visited(entry.path());
        files.push(VisitedFile {
            path: entry.path().to_path_buf(),
            relative: if relative.is_empty() { entry.file_name().to_string_lossy().to_string() } else { relative },
            content,
            size: metadata.len(),
        });
    }
    Ok(files)
}

/// Entry point for an `@file` directive. `budget_tokens` is the caller's
/// already-computed ≤75%-of-context-window allowance; `question` is the
/// rest of the user's message, used to rank files in `smart` mode.
pub async fn ingest_file_directive(
    root: &Path,
    path_arg: &str,
    mode: FileMode,
    budget_tokens: usize,
    question: &str,
    progress: &dyn ProgressCallback,
    chunk_read_pause: Duration,
) -> Result<FileIngestOutcome, PipelineError> {
    let target = {
        let expanded = expand_tilde(path_arg);
        if expanded.is_absolute() { expanded } else { root.join(expanded) }
    };

    match mode {
        FileMode::Full => Ok(FileIngestOutcome::Inline(ingest_full(&target, budget_tokens, progress)?)),
        FileMode::Summary => Ok(FileIngestOutcome::Inline(ingest_summary(&target, progress)?)),
        FileMode::Smart => Ok(FileIngestOutcome::Inline(ingest_smart(&target, budget_tokens, question, progress)?)),
        FileMode::Chunked => {
            let queue = ingest_chunked(&target, budget_tokens, progress)?;
            let first = queue.next().ok_or_else(|| PipelineError::ScanFailed("empty ingest".to_string()))?;
            if !chunk_read_pause.is_zero() {
                tokio::time::sleep(chunk_read_pause).await;
            }
            Ok(FileIngestOutcome::Chunked { first, queue })
        }
    }
}

fn format_file_block(file: &VisitedFile) -> Option<String> {
    let content = file.content.as_ref()?;
    Some(format!("--- {} ({}) ---\n{}", file.relative, detect_type(&file.path), content))
}

fn ingest_full(target: &Path, budget_tokens: usize, progress: &dyn ProgressCallback) -> Result<String, PipelineError> {
    let files = walk(target, progress)?;
    let mut out = String::new();
    let mut used = 0usize;
    for file in &files {
        let Some(block) = format_file_block(file) else { continue };
        let tokens = estimate_tokens(&block);
        if used + tokens > budget_tokens {
            out.push_str(&format!("\n[... truncated: context budget of {budget_tokens} tokens reached ...]\n"));
            break;
        }
        out.push_str(&block);
        out.push('\n');
        used += tokens;
    }
    Ok(out)
}

fn ingest_summary(target: &Path, progress: &dyn ProgressCallback) -> Result<String, PipelineError> {
    let mut lines = Vec::new();
    let mut total_size = 0u64;
    let mut total_files = 0usize;

    for entry in walkdir::WalkDir::new(target)
        .max_depth(3)
        .into_iter()
        .filter_entry(|e| !is_ignored(e.path()))
    {
        let entry = entry.map_err(|err| PipelineError::ScanFailed(err.to_string()))?;
        progress.on_file_visited(entry.path());
        if entry.file_type().is_file() {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            total_size += size;
            total_files += 1;
            let ext = entry.path().extension().and_then(|e| e.to_str()).unwrap_or("");
            lines.push(format!(
                "{}{} ({}, {} bytes, .{})",
                "  ".repeat(entry.depth()),
                entry.file_name().to_string_lossy(),
                detect_type(entry.path()),
                size,
                ext
            ));
        } else {
            lines.push(format!("{}{}/", "  ".repeat(entry.depth()), entry.file_name().to_string_lossy()));
        }
    }

    lines.push(format!("\n{total_files} files, {total_size} bytes total"));
    Ok(lines.join("\n"))
}

fn ingest_chunked(target: &Path, budget_tokens: usize, progress: &dyn ProgressCallback) -> Result<ChunkQueue, PipelineError> {
    let files = walk(target, progress)?;
    let half_budget = budget_tokens / 2;

    let mut chunk_texts: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0usize;

    for file in &files {
        let Some(block) = format_file_block(file) else { continue };
        let tokens = estimate_tokens(&block);

        if tokens > half_budget {
            if !current.is_empty() {
                chunk_texts.push(std::mem::take(&mut current));
                current_tokens = 0;
            }
            chunk_texts.push(block);
            continue;
        }

        if current_tokens + tokens > budget_tokens && !current.is_empty() {
            chunk_texts.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
        current.push_str(&block);
        current.push('\n');
        current_tokens += tokens;
    }
    if !current.is_empty() {
        chunk_texts.push(current);
    }
    if chunk_texts.is_empty() {
        chunk_texts.push(String::new());
    }

    let total = chunk_texts.len();
    let chunks = chunk_texts
        .into_iter()
        .enumerate()
        .map(|(idx, content)| FileChunk::new(idx, total, content))
        .collect();
    Ok(ChunkQueue::new(chunks))
}

fn ingest_smart(
    target: &Path,
    budget_tokens: usize,
    question: &str,
    progress: &dyn ProgressCallback,
) -> Result<String, PipelineError> {
    let keywords: Vec<String> = question
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(&w.as_str()))
        .collect();

    let files = walk(target, progress)?;
    if keywords.is_empty() {
        return ingest_summary(target, progress);
    }

    let mut scored: Vec<(f64, &VisitedFile)> = files
        .iter()
        .filter(|f| f.content.is_some())
        .map(|f| (score_file(f, &keywords), f))
        .filter(|(score, _)| *score > 0.0)
        .collect();

    if scored.is_empty() {
        return ingest_summary(target, progress);
    }

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut out = String::new();
    let mut used = 0usize;
    for (_, file) in scored {
        let Some(block) = format_file_block(file) else { continue };
        let tokens = estimate_tokens(&block);
        if used + tokens > budget_tokens {
            break;
        }
        out.push_str(&block);
        out.push('\n');
        used += tokens;
    }
    Ok(out)
}

fn score_file(file: &VisitedFile, keywords: &[String]) -> f64 {
    let name_lower = file.relative.to_lowercase();
    let content_lower = file.content.as_deref().unwrap_or("").to_lowercase();

    let name_hits = keywords.iter().filter(|k| name_lower.contains(k.as_str())).count() as f64;
    let content_hits = keywords
        .iter()
        .map(|k| content_lower.matches(k.as_str()).count())
        .sum::<usize>() as f64;

    let mut score = name_hits * 5.0 + content_hits * 0.5;

    if matches!(file.path.extension().and_then(|e| e.to_str()), Some(ext) if CODE_EXTENSIONS.contains(&ext)) {
        score *= 1.2;
    }
    if file.size > LARGE_FILE_BYTES {
        score *= 0.9;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NullProgress;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn full_mode_concatenates_file_contents_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "hello");
        let outcome = ingest_file_directive(
            dir.path(),
            ".",
            FileMode::Full,
            10_000,
            "",
            &NullProgress,
            Duration::ZERO,
        )
        .await
        .unwrap();
        let FileIngestOutcome::Inline(text) = outcome else { panic!("expected inline") };
        assert!(text.contains("a.txt"));
        assert!(text.contains("hello"));
    }

    #[tokio::test]
    async fn full_mode_truncates_past_budget() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "big.txt", &"x".repeat(1000));
        let outcome = ingest_file_directive(dir.path(), ".", FileMode::Full, 5, "", &NullProgress, Duration::ZERO)
            .await
            .unwrap();
        let FileIngestOutcome::Inline(text) = outcome else { panic!("expected inline") };
        assert!(text.contains("truncated"));
    }

    #[tokio::test]
    async fn summary_mode_lists_metadata_without_file_bodies() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.rs", "fn main() {}");
        let outcome = ingest_file_directive(dir.path(), ".", FileMode::Summary, 10_000, "", &NullProgress, Duration::ZERO)
            .await
            .unwrap();
        let FileIngestOutcome::Inline(text) = outcome else { panic!("expected inline") };
        assert!(text.contains("a.rs"));
        assert!(!text.contains("fn main"));
        assert!(text.contains("files"));
    }

    #[tokio::test]
    async fn chunked_mode_splits_large_tree_and_queues_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            write(dir.path(), &format!("f{i}.txt"), &"y".repeat(200));
        }
        let outcome = ingest_file_directive(dir.path(), ".", FileMode::Chunked, 50, "", &NullProgress, Duration::ZERO)
            .await
            .unwrap();
        let FileIngestOutcome::Chunked { first, queue } = outcome else { panic!("expected chunked") };
        assert!(first.contains("chunk 1/"));
        assert!(queue.status().pending >= 1);
    }

    #[tokio::test]
    async fn smart_mode_ranks_name_matches_above_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "auth.rs", "fn login() {}");
        write(dir.path(), "unrelated.rs", "fn noop() {}");
        let outcome = ingest_file_directive(
            dir.path(),
            ".",
            FileMode::Smart,
            10_000,
            "why does auth fail",
            &NullProgress,
            Duration::ZERO,
        )
        .await
        .unwrap();
        let FileIngestOutcome::Inline(text) = outcome else { panic!("expected inline") };
        let auth_pos = text.find("auth.rs");
        let unrelated_pos = text.find("unrelated.rs");
        assert!(auth_pos.is_some());
        if let Some(unrelated) = unrelated_pos {
            assert!(auth_pos.unwrap() < unrelated);
        }
    }

    #[tokio::test]
    async fn smart_mode_falls_back_to_summary_when_nothing_scores() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "nothing related here");
        let outcome = ingest_file_directive(
            dir.path(),
            ".",
            FileMode::Smart,
            10_000,
            "xyzxyzxyz",
            &NullProgress,
            Duration::ZERO,
        )
        .await
        .unwrap();
        let FileIngestOutcome::Inline(text) = outcome else { panic!("expected inline") };
        assert!(text.contains("files"));
    }

    #[tokio::test]
    async fn missing_path_reports_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = ingest_file_directive(
            dir.path(),
            "does-not-exist",
            FileMode::Full,
            10_000,
            "",
            &NullProgress,
            Duration::ZERO,
        )
        .await;
        assert!(matches!(result, Err(PipelineError::FileNotFound(_))));
    }
}
