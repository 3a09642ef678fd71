//! Turn-1 of the loop: assembling the system prompt and the final user
//! message sent to the LLM client.

/// Default system prompt used when no persona is active and the loop is
/// running in agent/coder mode.
pub const DEFAULT_AGENT_PROMPT: &str = "You are ChatCLI, an autonomous terminal agent. \
Use <tool_call name=\"...\" args=\"...\" /> to invoke tools, and a numbered \
<reasoning> plan to track multi-step work.";

pub const DEFAULT_CODER_PROMPT: &str = "You are ChatCLI in coder mode: focus on reading, \
editing and patching the repository in the current working directory. \
Use <tool_call name=\"...\" args=\"...\" /> to invoke tools.";

/// A persona overrides the default prompt text but still needs the
/// format-instructions block appended so the model keeps emitting
/// parseable tool calls and reasoning blocks.
pub struct Persona {
    pub name: String,
    pub prompt_text: String,
}

const FORMAT_INSTRUCTIONS: &str = "\n\nFormat rules: wrap multi-step plans in \
<reasoning>1. ...\\n2. ...</reasoning>; invoke tools with \
<tool_call name=\"...\" args=\"...\" />; never mix prose and tool syntax on \
the same line.";

/// Builds the system prompt for one turn: persona text (if active) or the
/// default agent/coder prompt, with format instructions appended.
pub fn build_system_prompt(persona: Option<&Persona>, coder_mode: bool) -> String {
    let base = match persona {
        Some(p) => p.prompt_text.clone(),
        None if coder_mode => DEFAULT_CODER_PROMPT.to_string(),
        None => DEFAULT_AGENT_PROMPT.to_string(),
    };
    format!("{base}{FORMAT_INSTRUCTIONS}")
}

/// Prepends a Kubernetes watcher snapshot to the user message when a
/// watcher is active.
pub fn build_user_message(user_input: &str, watcher_snapshot: Option<&str>) -> String {
    match watcher_snapshot {
        Some(snapshot) if !snapshot.is_empty() => {
            format!("[k8s watcher]\n{snapshot}\n\n{user_input}")
        }
        _ => user_input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_agent_prompt_used_without_persona() {
        let prompt = build_system_prompt(None, false);
        assert!(prompt.starts_with(DEFAULT_AGENT_PROMPT));
        assert!(prompt.contains("Format rules"));
    }

    #[test]
    fn coder_mode_selects_coder_prompt() {
        let prompt = build_system_prompt(None, true);
        assert!(prompt.starts_with(DEFAULT_CODER_PROMPT));
    }

    #[test]
    fn persona_overrides_default_but_keeps_format_instructions() {
        let persona = Persona {
            name: "reviewer".to_string(),
            prompt_text: "You are a meticulous code reviewer.".to_string(),
        };
        let prompt = build_system_prompt(Some(&persona), false);
        assert!(prompt.starts_with("You are a meticulous code reviewer."));
        assert!(prompt.contains("Format rules"));
    }

    #[test]
    fn watcher_snapshot_is_prepended_when_present() {
        let msg = build_user_message("do the thing", Some("3 pods running"));
        assert!(msg.starts_with("[k8s watcher]"));
        assert!(msg.ends_with("do the thing"));
    }

    #[test]
    fn no_watcher_leaves_user_message_untouched() {
        let msg = build_user_message("do the thing", None);
        assert_eq!(msg, "do the thing");
    }
}
