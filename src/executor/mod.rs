//! Command Executor (C2): runs one command/script under a shell, captures
//! stdout/stderr, exit code, duration; supports interactive passthrough.
//! `capture_output` is the narrower sibling: no shell-string parsing, no
//! redaction, just raw stdout bytes from a direct `(shell, args)` spawn.

mod shell;

use crate::sanitize::redact;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Result of one command execution.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub command: String,
    pub output: String,
    pub error: String,
    pub exit_code: i32,
    pub duration: Duration,
    pub was_killed: bool,
}

/// Executes one command under the agent's current working directory.
///
/// `cd` is intercepted and applied to `cwd` directly rather than spawned,
/// since a child process cannot change its parent's working directory.
pub struct CommandExecutor {
    cwd: PathBuf,
}

impl CommandExecutor {
    pub fn new(cwd: PathBuf) -> Self {
        Self { cwd }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Executes `cmd_or_script_path` non-interactively (captures
    /// stdout/stderr separately, sanitizes both) or with the terminal
    /// wired through for passthrough when `interactive` is set.
    pub async fn execute(
        &mut self,
        cmd: &str,
        interactive: bool,
        cancellation: CancellationToken,
    ) -> ExecutionResult {
        if let Some(target) = parse_cd(cmd) {
            return self.apply_cd(&target);
        }

        if interactive {
            self.execute_interactive(cmd, cancellation).await
        } else {
            self.execute_captured(cmd, cancellation).await
        }
    }

    fn apply_cd(&mut self, target: &str) -> ExecutionResult {
        let expanded = expand_tilde(target);
        let new_dir = if expanded.is_absolute() {
            expanded
        } else {
            self.cwd.join(expanded)
        };
        let start = Instant::now();
        match new_dir.canonicalize() {
            Ok(resolved) if resolved.is_dir() => {
                self.cwd = resolved.clone();
                ExecutionResult {
                    command: format!("cd {target}"),
                    output: resolved.display().to_string(),
                    error: String::new(),
                    exit_code: 0,
                    duration: start.elapsed(),
                    was_killed: false,
                }
            }
            _ => ExecutionResult {
                command: format!("cd {target}"),
                output: String::new(),
                error: redact(&format!("no such directory: {target}")),
                exit_code: 1,
                duration: start.elapsed(),
                was_killed: false,
            },
        }
    }

    pub(crate) async fn execute_captured(&self, cmd: &str, cancellation: CancellationToken) -> ExecutionResult {
        let (shell, flag) = shell::resolve_shell();
        let start = Instant::now();

        let mut child = match Command::new(&shell)
            .arg(flag)
            .arg(cmd)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                return ExecutionResult {
                    command: cmd.to_string(),
                    output: String::new(),
                    error: redact(&format!("failed to spawn command: {err}")),
                    exit_code: -1,
                    duration: start.elapsed(),
                    was_killed: false,
                };
            }
        };

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();

        tokio::select! {
            status = child.wait() => {
                let mut out = String::new();
                let mut err = String::new();
                if let Some(mut s) = stdout { let _ = s.read_to_string(&mut out).await; }
                if let Some(mut s) = stderr { let _ = s.read_to_string(&mut err).await; }
                let exit_code = status.map(|s| s.code().unwrap_or(-1)).unwrap_or(-1);
                ExecutionResult {
                    command: cmd.to_string(),
                    output: redact(&out),
                    error: redact(&err),
                    exit_code,
                    duration: start.elapsed(),
                    was_killed: false,
                }
            }
            _ = cancellation.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                ExecutionResult {
                    command: cmd.to_string(),
                    output: String::new(),
                    error: "command cancelled".to_string(),
                    exit_code: -1,
                    duration: start.elapsed(),
                    was_killed: true,
                }
            }
        }
    }

    /// Runs `shell` with `args` directly (no shell-string interpretation)
    /// and returns raw stdout bytes, for callers that need binary-safe
    /// output rather than the redacted `String` fields on `ExecutionResult`.
    pub async fn capture_output(
        &self,
        shell: &str,
        args: &[&str],
        cancellation: CancellationToken,
    ) -> std::io::Result<Vec<u8>> {
        let mut child = Command::new(shell)
            .args(args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let mut stdout = child.stdout.take();

        tokio::select! {
            status = child.wait() => {
                status?;
                let mut out = Vec::new();
                if let Some(mut s) = stdout {
                    s.read_to_end(&mut out).await?;
                }
                Ok(out)
            }
            _ = cancellation.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                Err(std::io::Error::new(std::io::ErrorKind::Interrupted, "capture_output cancelled"))
            }
        }
    }

    /// Interactive execution wires the child to the controlling terminal.
    /// On POSIX this first restores the line discipline with `stty sane`
    /// and optionally sources the user's shell rc file so aliases resolve;
    /// on Windows the rc-sourcing step is skipped.
    async fn execute_interactive(&self, cmd: &str, cancellation: CancellationToken) -> ExecutionResult {
        let (shell, flag) = shell::resolve_shell();
        let start = Instant::now();

        #[cfg(unix)]
        {
            let _ = Command::new("stty").arg("sane").status().await;
        }

        let full_command = match shell::rc_file_for(&shell) {
            Some(rc) => format!("[ -f {rc} ] && . {rc}; {cmd}"),
            None => cmd.to_string(),
        };

        let mut child = match Command::new(&shell)
            .arg(flag)
            .arg(&full_command)
            .current_dir(&self.cwd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                return ExecutionResult {
                    command: cmd.to_string(),
                    output: String::new(),
                    error: redact(&format!("failed to spawn command: {err}")),
                    exit_code: -1,
                    duration: start.elapsed(),
                    was_killed: false,
                };
            }
        };

        tokio::select! {
            status = child.wait() => ExecutionResult {
                command: cmd.to_string(),
                output: String::new(),
                error: String::new(),
                exit_code: status.map(|s| s.code().unwrap_or(-1)).unwrap_or(-1),
                duration: start.elapsed(),
                was_killed: false,
            },
            _ = cancellation.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                ExecutionResult {
                    command: cmd.to_string(),
                    output: String::new(),
                    error: "command cancelled".to_string(),
                    exit_code: -1,
                    duration: start.elapsed(),
                    was_killed: true,
                }
            }
        }
    }

    /// Writes `script` to a temp file with `0755` permissions, executes it
    /// via `shell <file>`, and deletes the file on exit regardless of
    /// outcome.
    pub async fn execute_script(
        &self,
        script: &str,
        interpreter_hint: Option<&str>,
        cancellation: CancellationToken,
    ) -> ExecutionResult {
        let start = Instant::now();
        let mut file = match tempfile::NamedTempFile::new() {
            Ok(f) => f,
            Err(err) => {
                return ExecutionResult {
                    command: "<script>".to_string(),
                    output: String::new(),
                    error: redact(&format!("failed to create temp script: {err}")),
                    exit_code: -1,
                    duration: start.elapsed(),
                    was_killed: false,
                };
            }
        };
        use std::io::Write;
        if let Err(err) = file.write_all(script.as_bytes()) {
            return ExecutionResult {
                command: "<script>".to_string(),
                output: String::new(),
                error: redact(&format!("failed to write temp script: {err}")),
                exit_code: -1,
                duration: start.elapsed(),
                was_killed: false,
            };
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o755));
        }

        let (shell, _) = shell::resolve_shell();
        let interpreter = interpreter_hint.unwrap_or(&shell);
        let path = file.path().to_path_buf();
        let invocation = format!("{interpreter} {}", path.display());
        let result = self.execute_captured(&invocation, cancellation).await;
        drop(file); // guaranteed temp-file removal on every exit path
        ExecutionResult {
            command: "<script>".to_string(),
            ..result
        }
    }
}

fn parse_cd(cmd: &str) -> Option<String> {
    let trimmed = cmd.trim();
    let rest = trimmed.strip_prefix("cd")?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None; // e.g. "cdiff", not "cd"
    }
    let target = rest.trim();
    Some(if target.is_empty() {
        "~".to_string()
    } else {
        target.to_string()
    })
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            let rest = rest.strip_prefix('/').unwrap_or(rest);
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn executes_safe_command_successfully() {
        let mut executor = CommandExecutor::new(std::env::temp_dir());
        let result = executor
            .execute("echo hello", false, CancellationToken::new())
            .await;
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("hello"));
        assert!(!result.was_killed);
    }

    #[tokio::test]
    async fn captures_non_zero_exit_code() {
        let mut executor = CommandExecutor::new(std::env::temp_dir());
        let result = executor
            .execute("exit 7", false, CancellationToken::new())
            .await;
        assert_eq!(result.exit_code, 7);
    }

    #[tokio::test]
    async fn cd_changes_cwd_without_spawning() {
        let tmp = tempfile::tempdir().unwrap();
        let mut executor = CommandExecutor::new(tmp.path().to_path_buf());
        let result = executor
            .execute("cd ..", false, CancellationToken::new())
            .await;
        assert_eq!(result.exit_code, 0);
        assert_ne!(executor.cwd(), tmp.path());
    }

    #[tokio::test]
    async fn cancellation_kills_process_and_sets_was_killed() {
        let mut executor = CommandExecutor::new(std::env::temp_dir());
        let token = CancellationToken::new();
        let token_clone = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token_clone.cancel();
        });
        let result = executor.execute("sleep 30", false, token).await;
        assert!(result.was_killed);
        assert!(!result.error.is_empty());
    }

    #[tokio::test]
    async fn capture_output_returns_raw_stdout_bytes() {
        let executor = CommandExecutor::new(std::env::temp_dir());
        let (shell, flag) = shell::resolve_shell();
        let bytes = executor
            .capture_output(&shell, &[&flag, "printf hello"], CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn parse_cd_recognizes_bare_and_argumented_forms() {
        assert_eq!(parse_cd("cd"), Some("~".to_string()));
        assert_eq!(parse_cd("cd /tmp"), Some("/tmp".to_string()));
        assert_eq!(parse_cd("cdiff something"), None);
        assert_eq!(parse_cd("echo cd"), None);
    }
}
