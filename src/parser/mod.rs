//! Tool-Call Parser (C3): extracts `<tool_call …/>` invocations and their
//! JSON/CLI-style arguments from model output, plus the legacy fenced-block
//! fallback. The parser never executes anything; it only materializes
//! structured intent.

mod args;
mod legacy_blocks;
mod tool_call;

pub use args::{
    collapse_whitespace, decode_html_entities, fold_continuations, parse_tool_args_with_json,
    sanitize_args, split_tool_args_multiline,
};
pub use legacy_blocks::{block_is_dangerous, extract_command_blocks, CommandBlock, ContextSourceKind};
pub use tool_call::{parse_tool_calls, ToolCall};
