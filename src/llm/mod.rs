//! LLM Client Contract (C9): a uniform interface over OpenAI, Claude,
//! Gemini, Ollama, OpenAI Assistants, StackSpot, and a remote gRPC proxy
//! backend.

mod client;
pub mod providers;

pub use client::{LlmClient, LlmResponse, RetryPolicy, TokenUsage};
