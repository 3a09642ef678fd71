//! Legacy fenced code block extractor: ```` ```execute:<lang>\n<cmds>\n``` ````
//! and the bare ```` ```sh ````/```` ```bash ````/```` ```shell ```` forms.
//! Structured `<tool_call>` extraction is tried first by the agent loop;
//! this extractor is the fallback when none are found.

use crate::command_safety::CommandValidator;

/// A group of executable lines the model produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBlock {
    pub description: String,
    pub language: String,
    pub commands: Vec<String>,
    pub source_kind: ContextSourceKind,
    /// True when `language` names an interpreted language rather than a
    /// shell dialect, so the commands are one script body to write to a
    /// file and run, not a sequence of discrete shell invocations.
    pub is_script: bool,
    /// Interpreter to invoke the script with when `is_script` is set
    /// (e.g. `python3`, `node`); `None` otherwise.
    pub script_type: Option<String>,
    /// Extension a temp file for this block's body would carry, purely
    /// descriptive context info.
    pub file_extension: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSourceKind {
    UserInput,
    File,
    CommandOutput,
}

impl CommandBlock {
    /// Reconstructs the original fenced-block text this block was parsed
    /// from.
    pub fn to_fenced_text(&self) -> String {
        format!(
            "```execute:{}\n{}\n```",
            self.language,
            self.commands.join("\n")
        )
    }
}

const STRUCTURED_PREFIX: &str = "execute:";
const BARE_LANGS: &[&str] = &["sh", "bash", "shell"];

/// Shell dialects and ops tags whose commands run directly, not as an
/// interpreted script body.
const DIRECT_SHELL_LANGS: &[&str] = &["shell", "bash", "sh", "git", "kubernetes", "kubectl"];

/// Maps an `execute:<lang>` tag to (interpreter binary, file extension)
/// for languages that need a script file rather than direct shell
/// invocation.
fn interpreter_for(language: &str) -> Option<(&'static str, &'static str)> {
    match language {
        "python" | "python3" => Some(("python3", "py")),
        "node" | "javascript" | "js" => Some(("node", "js")),
        "ruby" => Some(("ruby", "rb")),
        "perl" => Some(("perl", "pl")),
        "php" => Some(("php", "php")),
        _ => None,
    }
}

/// Extracts fenced blocks from `text`. Tries the structured
/// `execute:<lang>` form first; only falls back to bare `sh`/`bash`/`shell`
/// fences when no structured block is present anywhere in the text.
pub fn extract_command_blocks(text: &str) -> Vec<CommandBlock> {
    let structured = extract_with_prefix_matcher(text, |lang| {
        lang.strip_prefix(STRUCTURED_PREFIX).map(|rest| rest.to_string())
    });
    if !structured.is_empty() {
        return structured;
    }
    extract_with_prefix_matcher(text, |lang| {
        BARE_LANGS
            .iter()
            .find(|&&candidate| candidate == lang)
            .map(|candidate| candidate.to_string())
    })
}

fn extract_with_prefix_matcher(
    text: &str,
    matcher: impl Fn(&str) -> Option<String>,
) -> Vec<CommandBlock> {
    let mut blocks = Vec::new();
    let mut cursor = 0usize;

    while let Some(rel) = text[cursor..].find("```") {
        let fence_start = cursor + rel;
        let after_fence = fence_start + 3;
        let line_end = text[after_fence..]
            .find('\n')
            .map(|i| after_fence + i)
            .unwrap_or(text.len());
        let lang_tag = text[after_fence..line_end].trim();

        let Some(language) = matcher(lang_tag) else {
            cursor = line_end.max(after_fence);
            continue;
        };

        let body_start = (line_end + 1).min(text.len());
        let Some(rel_close) = text[body_start..].find("```") else {
            break;
        };
        let body_end = body_start + rel_close;
        let body = text[body_start..body_end].trim_end_matches('\n');
        let commands: Vec<String> = body
            .lines()
            .map(str::to_string)
            .filter(|l| !l.trim().is_empty())
            .collect();

        let interpreter = interpreter_for(&language);
        let is_script = interpreter.is_some() && !DIRECT_SHELL_LANGS.contains(&language.as_str());

        blocks.push(CommandBlock {
            description: String::new(),
            language,
            commands,
            source_kind: ContextSourceKind::CommandOutput,
            is_script,
            script_type: interpreter.map(|(bin, _)| bin.to_string()),
            file_extension: interpreter.map(|(_, ext)| ext.to_string()).or(Some("sh".to_string())),
        });

        cursor = body_end + 3;
    }
    blocks
}

/// Whether any command in `block` is classified dangerous by the validator.
pub fn block_is_dangerous(block: &CommandBlock, validator: &CommandValidator) -> bool {
    block.commands.iter().any(|c| validator.is_dangerous(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_structured_execute_block() {
        let text = "Sure, here:\n```execute:shell\nls -la\npwd\n```\nDone.";
        let blocks = extract_command_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language, "shell");
        assert_eq!(blocks[0].commands, vec!["ls -la", "pwd"]);
    }

    #[test]
    fn falls_back_to_bare_shell_fence_when_no_structured_block() {
        let text = "```bash\necho hi\n```";
        let blocks = extract_command_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language, "bash");
        assert_eq!(blocks[0].commands, vec!["echo hi"]);
    }

    #[test]
    fn structured_block_takes_precedence_over_bare_fence_in_same_response() {
        let text = "```execute:shell\nls\n```\n```bash\necho ignored\n```";
        let blocks = extract_command_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].commands, vec!["ls"]);
    }

    #[test]
    fn single_block_round_trips() {
        let original = "```execute:shell\nls -la\npwd\n```";
        let blocks = extract_command_blocks(original);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].to_fenced_text(), original);
    }

    #[test]
    fn unrecognized_fence_language_is_ignored() {
        let text = "```python\nprint('hi')\n```";
        let blocks = extract_command_blocks(text);
        assert!(blocks.is_empty());
    }

    #[test]
    fn structured_python_block_is_flagged_as_a_script() {
        let text = "```execute:python\nprint('hi')\n```";
        let blocks = extract_command_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].is_script);
        assert_eq!(blocks[0].script_type.as_deref(), Some("python3"));
        assert_eq!(blocks[0].file_extension.as_deref(), Some("py"));
    }

    #[test]
    fn structured_shell_block_is_not_a_script() {
        let text = "```execute:shell\nls -la\n```";
        let blocks = extract_command_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert!(!blocks[0].is_script);
        assert_eq!(blocks[0].script_type, None);
    }
}
