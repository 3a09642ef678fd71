//! Directive extraction: scans user input line-by-line for `@history`,
//! `@git`, `@env`, `@file`, `@command`, and the bare trailing `>` context
//! marker, and returns the directive-free text alongside what was found.

/// `@file` ingestion strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Full,
    Chunked,
    Summary,
    Smart,
}

impl FileMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "full" => Some(Self::Full),
            "chunked" => Some(Self::Chunked),
            "summary" => Some(Self::Summary),
            "smart" => Some(Self::Smart),
            _ => None,
        }
    }
}

/// One recognized directive, already stripped of its `@` prefix syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    History { limit: usize },
    Git,
    Env,
    File { path: String, mode: FileMode },
    Command { cmd: String, ai: bool, question: Option<String> },
}

const DEFAULT_HISTORY_LIMIT: usize = 30;

/// Extracts every directive from `text`, returning the text with directive
/// lines removed (other lines untouched, in order) plus the directives
/// found, in order. A bare `>` found outside an `@command` line marks the
/// start of a trailing appended-context block, returned separately.
pub fn parse_directives(text: &str) -> (String, Vec<Directive>, Option<String>) {
    let mut directives = Vec::new();
    let mut kept_lines = Vec::new();
    let mut trailing_context = None;

    for line in text.lines() {
        let trimmed = line.trim_start();

        if let Some(directive) = parse_directive_line(trimmed) {
            directives.push(directive);
            continue;
        }

        if trailing_context.is_none() {
            if let Some(idx) = find_top_level_marker(trimmed) {
                let (before, after) = trimmed.split_at(idx);
                let after = after[1..].trim_start();
                if !before.trim().is_empty() {
                    kept_lines.push(before.trim_end().to_string());
                }
                if !after.is_empty() {
                    trailing_context = Some(after.to_string());
                }
                continue;
            }
        }

        kept_lines.push(line.to_string());
    }

    (kept_lines.join("\n"), directives, trailing_context)
}

fn parse_directive_line(line: &str) -> Option<Directive> {
    if line == "@history" {
        return Some(Directive::History { limit: DEFAULT_HISTORY_LIMIT });
    }
    if let Some(rest) = line.strip_prefix("@history") {
        let rest = rest.trim();
        if let Ok(limit) = rest.parse::<usize>() {
            return Some(Directive::History { limit });
        }
        return Some(Directive::History { limit: DEFAULT_HISTORY_LIMIT });
    }
    if line == "@git" {
        return Some(Directive::Git);
    }
    if line == "@env" {
        return Some(Directive::Env);
    }
    if let Some(rest) = line.strip_prefix("@file ") {
        return Some(parse_file_directive(rest.trim()));
    }
    if let Some(rest) = line.strip_prefix("@command ") {
        return Some(parse_command_directive(rest.trim()));
    }
    None
}

fn parse_file_directive(rest: &str) -> Directive {
    let tokens = shell_words::split(rest).unwrap_or_else(|_| rest.split_whitespace().map(str::to_string).collect());
    let mut path = String::new();
    let mut mode = FileMode::Full;

    for token in tokens {
        if let Some(value) = token.strip_prefix("--mode=") {
            if let Some(parsed) = FileMode::parse(value) {
                mode = parsed;
            }
        } else if !token.starts_with("--") && path.is_empty() {
            path = token;
        }
    }

    Directive::File { path, mode }
}

fn parse_command_directive(rest: &str) -> Directive {
    let (before_question, question) = match rest.find(" > ") {
        Some(idx) => (&rest[..idx], Some(rest[idx + 3..].trim().to_string())),
        None => (rest, None),
    };

    let ai = before_question.trim_end().ends_with("--ai");
    let cmd = if ai {
        before_question.trim_end().trim_end_matches("--ai").trim().to_string()
    } else {
        before_question.trim().to_string()
    };

    Directive::Command { cmd, ai, question }
}

/// Finds the first `>` in a non-directive line: everything after it is
/// the trailing appended-context block.
fn find_top_level_marker(line: &str) -> Option<usize> {
    line.find('>')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_history_directive_defaults_to_thirty() {
        let (cleaned, directives, _) = parse_directives("@history\nwhat changed?");
        assert_eq!(directives, vec![Directive::History { limit: 30 }]);
        assert_eq!(cleaned, "what changed?");
    }

    #[test]
    fn git_and_env_directives_recognized() {
        let (_, directives, _) = parse_directives("@git\n@env\n");
        assert_eq!(directives, vec![Directive::Git, Directive::Env]);
    }

    #[test]
    fn file_directive_with_mode_flag() {
        let (_, directives, _) = parse_directives("@file src/ --mode=smart\nfind the bug");
        assert_eq!(
            directives,
            vec![Directive::File { path: "src/".to_string(), mode: FileMode::Smart }]
        );
    }

    #[test]
    fn file_directive_defaults_to_full_mode() {
        let (_, directives, _) = parse_directives("@file notes.md");
        assert_eq!(directives, vec![Directive::File { path: "notes.md".to_string(), mode: FileMode::Full }]);
    }

    #[test]
    fn command_directive_with_ai_and_question() {
        let (_, directives, _) = parse_directives("@command git log --oneline --ai > why did this break");
        assert_eq!(
            directives,
            vec![Directive::Command {
                cmd: "git log --oneline".to_string(),
                ai: true,
                question: Some("why did this break".to_string()),
            }]
        );
    }

    #[test]
    fn command_directive_without_ai_or_question() {
        let (_, directives, _) = parse_directives("@command ls -la");
        assert_eq!(
            directives,
            vec![Directive::Command { cmd: "ls -la".to_string(), ai: false, question: None }]
        );
    }

    #[test]
    fn trailing_marker_captures_remainder_as_context() {
        let (cleaned, _, trailing) = parse_directives("explain this > focus on the error handling");
        assert_eq!(cleaned, "explain this");
        assert_eq!(trailing, Some("focus on the error handling".to_string()));
    }

    #[test]
    fn first_marker_in_a_plain_line_splits_it_into_kept_text_and_context() {
        let (cleaned, _, trailing) = parse_directives("look at this > the timeout value");
        assert_eq!(cleaned, "look at this");
        assert_eq!(trailing, Some("the timeout value".to_string()));
    }
}
