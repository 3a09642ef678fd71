//! Interactive slash commands consumed by the core. All
//! other `/` commands are external collaborators and never reach here.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Agent(Option<String>),
    Run(Option<String>),
    Coder(Option<String>),
    NewSession,
    NextChunk,
    Retry,
    RetryAll,
    SkipChunk,
    Reload,
    Switch { model: Option<String>, provider: Option<String> },
}

/// Parses one interactive line into a core slash command, or `None` if it
/// isn't one of ours (either plain text or an external-collaborator
/// command the caller should route elsewhere).
pub fn parse_slash_command(line: &str) -> Option<SlashCommand> {
    let line = line.trim();
    let rest = line.strip_prefix('/')?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("");
    let arg = parts.next().map(str::trim).filter(|s| !s.is_empty());

    match name {
        "agent" => Some(SlashCommand::Agent(arg.map(str::to_string))),
        "run" => Some(SlashCommand::Run(arg.map(str::to_string))),
        "coder" => Some(SlashCommand::Coder(arg.map(str::to_string))),
        "newsession" => Some(SlashCommand::NewSession),
        "nextchunk" => Some(SlashCommand::NextChunk),
        "retry" => Some(SlashCommand::Retry),
        "retryall" => Some(SlashCommand::RetryAll),
        "skipchunk" => Some(SlashCommand::SkipChunk),
        "reload" => Some(SlashCommand::Reload),
        "switch" => Some(parse_switch(arg.unwrap_or(""))),
        _ => None,
    }
}

fn parse_switch(rest: &str) -> SlashCommand {
    let tokens = shell_words::split(rest).unwrap_or_else(|_| rest.split_whitespace().map(str::to_string).collect());
    let mut model = None;
    let mut provider = None;
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        match token.as_str() {
            "--model" => model = iter.next(),
            "--provider" => provider = iter.next(),
            _ => {}
        }
    }
    SlashCommand::Switch { model, provider }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_with_task_argument() {
        assert_eq!(
            parse_slash_command("/agent fix the build"),
            Some(SlashCommand::Agent(Some("fix the build".to_string())))
        );
    }

    #[test]
    fn bare_commands_with_no_argument() {
        assert_eq!(parse_slash_command("/newsession"), Some(SlashCommand::NewSession));
        assert_eq!(parse_slash_command("/nextchunk"), Some(SlashCommand::NextChunk));
        assert_eq!(parse_slash_command("/retry"), Some(SlashCommand::Retry));
        assert_eq!(parse_slash_command("/retryall"), Some(SlashCommand::RetryAll));
        assert_eq!(parse_slash_command("/skipchunk"), Some(SlashCommand::SkipChunk));
        assert_eq!(parse_slash_command("/reload"), Some(SlashCommand::Reload));
    }

    #[test]
    fn switch_parses_both_flags() {
        assert_eq!(
            parse_slash_command("/switch --model gpt-4o --provider OPENAI"),
            Some(SlashCommand::Switch {
                model: Some("gpt-4o".to_string()),
                provider: Some("OPENAI".to_string()),
            })
        );
    }

    #[test]
    fn non_slash_text_is_not_a_command() {
        assert_eq!(parse_slash_command("what does this do?"), None);
    }

    #[test]
    fn unknown_slash_command_is_none() {
        assert_eq!(parse_slash_command("/plugins"), None);
    }
}
