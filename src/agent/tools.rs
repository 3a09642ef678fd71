//! Internal tool registry: `tree`, `search`, `read`, `write`, `patch`,
//! `exec`, `rollback`, `clean`.
//! Every built-in shares the same capability set as an external plugin
//! process would: `{name, execute}`.

use crate::executor::CommandExecutor;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Shared handle so the `exec`/`rollback`/`clean` tools and the legacy
/// fenced-block dispatch path see the same `cd`-tracked working directory.
pub type SharedExecutor = Arc<Mutex<CommandExecutor>>;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
}

/// Shared capability set for built-in and external-plugin tools alike.
#[async_trait]
pub trait InternalTool: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, args: &str, cancel: &CancellationToken) -> Result<String, ToolError>;
}

/// `tree`: directory listing with the validator's default ignore rules,
/// depth-limited so large repos don't blow the context budget.
pub struct TreeTool {
    pub root: PathBuf,
    pub max_depth: usize,
}

#[async_trait]
impl InternalTool for TreeTool {
    fn name(&self) -> &'static str {
        "tree"
    }

    async fn execute(&self, args: &str, _cancel: &CancellationToken) -> Result<String, ToolError> {
        let target = if args.trim().is_empty() {
            self.root.clone()
        } else {
            self.root.join(args.trim())
        };
        let mut lines = Vec::new();
        for entry in walkdir::WalkDir::new(&target)
            .max_depth(self.max_depth)
            .into_iter()
            .filter_entry(|e| !is_ignored(e.path()))
        {
            let entry = entry.map_err(|err| ToolError::Io(err.to_string()))?;
            let depth = entry.depth();
            let name = entry.file_name().to_string_lossy();
            lines.push(format!("{}{}", "  ".repeat(depth), name));
        }
        Ok(lines.join("\n"))
    }
}

fn is_ignored(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.starts_with('.') || matches!(name, "node_modules" | "target" | "dist" | "build")
}

/// `search`: greps file contents under `root` for a regex pattern.
pub struct SearchTool {
    pub root: PathBuf,
}

#[async_trait]
impl InternalTool for SearchTool {
    fn name(&self) -> &'static str {
        "search"
    }

    async fn execute(&self, args: &str, _cancel: &CancellationToken) -> Result<String, ToolError> {
        let pattern = args.trim();
        if pattern.is_empty() {
            return Err(ToolError::InvalidArgs("search requires a pattern".to_string()));
        }
        let regex = regex::Regex::new(pattern).map_err(|err| ToolError::InvalidArgs(err.to_string()))?;
        let mut matches = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| !is_ignored(e.path()))
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            for (line_no, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    matches.push(format!("{}:{}: {}", entry.path().display(), line_no + 1, line.trim()));
                }
            }
        }
        Ok(matches.join("\n"))
    }
}

/// `read`: returns a file's contents verbatim.
pub struct ReadTool {
    pub root: PathBuf,
}

#[async_trait]
impl InternalTool for ReadTool {
    fn name(&self) -> &'static str {
        "read"
    }

    async fn execute(&self, args: &str, _cancel: &CancellationToken) -> Result<String, ToolError> {
        let path = resolve_path(&self.root, args.trim())?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| ToolError::Io(err.to_string()))
    }
}

/// `write`: overwrites (or creates) a file with the given content.
/// `args` is `<path>\n<content>` (path on the first line).
pub struct WriteTool {
    pub root: PathBuf,
}

#[async_trait]
impl InternalTool for WriteTool {
    fn name(&self) -> &'static str {
        "write"
    }

    async fn execute(&self, args: &str, _cancel: &CancellationToken) -> Result<String, ToolError> {
        let (path_str, content) = args
            .split_once('\n')
            .ok_or_else(|| ToolError::InvalidArgs("write requires '<path>\\n<content>'".to_string()))?;
        let path = resolve_path(&self.root, path_str.trim())?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|err| ToolError::Io(err.to_string()))?;
        }
        tokio::fs::write(&path, content).await.map_err(|err| ToolError::Io(err.to_string()))?;
        Ok(format!("wrote {} bytes to {}", content.len(), path.display()))
    }
}

/// `patch`: replaces the first occurrence of a search block with a
/// replacement block. `args` is `<path>\n<<<SEARCH\n...\n===\n...\n>>>REPLACE`.
pub struct PatchTool {
    pub root: PathBuf,
}

#[async_trait]
impl InternalTool for PatchTool {
    fn name(&self) -> &'static str {
        "patch"
    }

    async fn execute(&self, args: &str, _cancel: &CancellationToken) -> Result<String, ToolError> {
        let (path_str, rest) = args
            .split_once('\n')
            .ok_or_else(|| ToolError::InvalidArgs("patch requires a path on the first line".to_string()))?;
        let (search_block, replace_block) = rest
            .split_once("\n===\n")
            .ok_or_else(|| ToolError::InvalidArgs("patch requires a '===' divider".to_string()))?;
        let search_block = search_block.trim_start_matches("<<<SEARCH\n");
        let replace_block = replace_block.trim_end_matches("\n>>>REPLACE").trim_end_matches(">>>REPLACE");

        let path = resolve_path(&self.root, path_str.trim())?;
        let original = tokio::fs::read_to_string(&path).await.map_err(|err| ToolError::Io(err.to_string()))?;
        if !original.contains(search_block) {
            return Err(ToolError::InvalidArgs("search block not found in file".to_string()));
        }
        let patched = original.replacen(search_block, replace_block, 1);
        tokio::fs::write(&path, &patched).await.map_err(|err| ToolError::Io(err.to_string()))?;
        Ok(format!("patched {}", path.display()))
    }
}

/// `exec`: runs a shell command through the shared command executor, so
/// a `cd` issued via this tool is visible to later blocks in the same
/// turn.
pub struct ExecTool {
    pub executor: SharedExecutor,
}

#[async_trait]
impl InternalTool for ExecTool {
    fn name(&self) -> &'static str {
        "exec"
    }

    async fn execute(&self, args: &str, cancel: &CancellationToken) -> Result<String, ToolError> {
        let mut executor = self.executor.lock().await;
        let result = executor.execute(args, false, cancel.clone()).await;
        Ok(format_execution_result(&result))
    }
}

pub(crate) fn format_execution_result(result: &crate::executor::ExecutionResult) -> String {
    if result.exit_code == 0 {
        result.output.clone()
    } else {
        format!("{}\n[exit {}] {}", result.output, result.exit_code, result.error)
    }
}

/// `rollback`: discards uncommitted changes via `git checkout --`.
pub struct RollbackTool {
    pub executor: SharedExecutor,
}

#[async_trait]
impl InternalTool for RollbackTool {
    fn name(&self) -> &'static str {
        "rollback"
    }

    async fn execute(&self, args: &str, cancel: &CancellationToken) -> Result<String, ToolError> {
        let target = if args.trim().is_empty() { "." } else { args.trim() };
        let mut executor = self.executor.lock().await;
        let result = executor
            .execute(&format!("git checkout -- {target}"), false, cancel.clone())
            .await;
        Ok(format_execution_result(&result))
    }
}

/// `clean`: removes untracked files via `git clean -fd`.
pub struct CleanTool {
    pub executor: SharedExecutor,
}

#[async_trait]
impl InternalTool for CleanTool {
    fn name(&self) -> &'static str {
        "clean"
    }

    async fn execute(&self, _args: &str, cancel: &CancellationToken) -> Result<String, ToolError> {
        let mut executor = self.executor.lock().await;
        let result = executor.execute("git clean -fd", false, cancel.clone()).await;
        Ok(format_execution_result(&result))
    }
}

fn resolve_path(root: &Path, relative: &str) -> Result<PathBuf, ToolError> {
    if relative.is_empty() {
        return Err(ToolError::InvalidArgs("path must not be empty".to_string()));
    }
    Ok(root.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let write = WriteTool { root: dir.path().to_path_buf() };
        let cancel = CancellationToken::new();
        write.execute("notes.txt\nhello world", &cancel).await.unwrap();

        let read = ReadTool { root: dir.path().to_path_buf() };
        let content = read.execute("notes.txt", &cancel).await.unwrap();
        assert_eq!(content, "hello world");
    }

    #[tokio::test]
    async fn patch_replaces_first_occurrence() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {\n    old();\n}\n").unwrap();
        let patch = PatchTool { root: dir.path().to_path_buf() };
        let cancel = CancellationToken::new();
        let args = "main.rs\n<<<SEARCH\n    old();\n===\n    new();\n>>>REPLACE";
        patch.execute(args, &cancel).await.unwrap();
        let updated = std::fs::read_to_string(dir.path().join("main.rs")).unwrap();
        assert!(updated.contains("new();"));
        assert!(!updated.contains("old();"));
    }

    #[tokio::test]
    async fn patch_errors_when_search_block_missing() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}\n").unwrap();
        let patch = PatchTool { root: dir.path().to_path_buf() };
        let cancel = CancellationToken::new();
        let args = "main.rs\n<<<SEARCH\nnonexistent\n===\nnew\n>>>REPLACE";
        assert!(patch.execute(args, &cancel).await.is_err());
    }

    #[tokio::test]
    async fn search_finds_matching_lines() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha\nbeta\ngamma\n").unwrap();
        let search = SearchTool { root: dir.path().to_path_buf() };
        let cancel = CancellationToken::new();
        let result = search.execute("^beta$", &cancel).await.unwrap();
        assert!(result.contains("beta"));
        assert!(!result.contains("alpha"));
    }
}
