//! Policy Manager (C7): see `manager` for the public contract.

mod manager;
mod rules;

pub use manager::{canonical_call, PolicyDecision, PolicyManager, PolicyPrompt, PromptChoice};
pub use rules::{PolicyRule, RuleAction};
