//! Error kinds for every component, aggregated into one top-level error for
//! the binary entry point. Validation and policy errors are first-class
//! outcomes surfaced back to the model, not exceptions.

use thiserror::Error;

/// Errors raised by the command validator (C1).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("command is empty")]
    EmptyCommand,
    #[error("command is potentially dangerous: {offending_command}")]
    DangerousCommand { offending_command: String },
}

/// Errors raised by the command executor (C2).
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("failed to spawn command: {0}")]
    SpawnFailed(String),
    #[error("command exited with non-zero status {code}")]
    NonZeroExit { code: i32 },
    #[error("command execution was cancelled")]
    Cancelled,
    #[error("command timed out after {secs}s")]
    TimedOut { secs: u64 },
}

/// Errors raised by the tool-call parser (C3).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("tool call is missing a name attribute")]
    MissingName,
    #[error("malformed tool call arguments: {0}")]
    MalformedArgs(String),
}

/// Errors raised by the directive/context pipeline (C4).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("failed to scan path: {0}")]
    ScanFailed(String),
    #[error("ingest too large for the active context budget: {0}")]
    TooLarge(String),
}

/// Error raised by the chunk queue (C5). Does not pop the chunk.
#[derive(Debug, Error)]
#[error("failed to send chunk: {0}")]
pub struct ChunkSendError(pub String);

/// Error raised by the policy manager (C7). Carries a fixed message sent
/// back to the model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("denied by policy: {reason}")]
pub struct PolicyDeniedError {
    pub reason: String,
}

/// Errors raised by the LLM client contract (C9).
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(String),
    #[error("rate limited")]
    RateLimited,
    #[error("provider error: {0}")]
    ProviderError(String),
    #[error("llm call cancelled")]
    Cancelled,
}

/// Top-level error surfaced by the binary's `main`.
#[derive(Debug, Error)]
pub enum ChatCliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Execute(#[from] ExecuteError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    PolicyDenied(#[from] PolicyDeniedError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("prompt was empty")]
    EmptyPrompt,
    /// One-shot mode has no terminal to confirm against, so a dangerous
    /// command aborts the run outright rather than asking.
    #[error("comando potencialmente perigoso, execução abortada: {0}")]
    DangerousCommandAborted(String),
    #[error("invalid provider configuration: {0}")]
    InvalidProviderConfig(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChatCliError {
    /// Exit code to return from `main`: 0 normal, 1 fatal configuration
    /// error, 2 LLM error surfaced to the caller.
    pub fn exit_code(&self) -> i32 {
        match self {
            ChatCliError::Llm(_) => 2,
            _ => 1,
        }
    }
}
