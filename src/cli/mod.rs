//! Binary-only concerns: flag parsing, the terminal confirmation/policy
//! prompts, slash commands, session persistence, and provider wiring.
//! Everything here is an external collaborator around the core agent
//! loop.

pub mod app;
pub mod args;
pub mod provider;
pub mod prompts;
pub mod registry;
pub mod session;
pub mod slash;

pub use args::Cli;
pub use prompts::{TerminalConfirm, TerminalPolicyPrompt, TerminalProgress};
pub use slash::{parse_slash_command, SlashCommand};
