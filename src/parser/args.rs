//! Argument normalization and JSON-to-CLI conversion.

use crate::error::ParseError;

/// Step 1: folds `\` + whitespace + newline to a single space outside
/// quoted regions, or to an empty string inside quotes (preserving
/// base64 streams split across continuation lines).
pub fn fold_continuations(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_quote: Option<char> = None;
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match in_quote {
            Some(q) => {
                if c == '\\' && is_continuation_at(&chars, i) {
                    i = skip_continuation(&chars, i);
                    continue;
                }
                if c == q {
                    in_quote = None;
                }
                out.push(c);
            }
            None => {
                if c == '\\' && is_continuation_at(&chars, i) {
                    out.push(' ');
                    i = skip_continuation(&chars, i);
                    continue;
                }
                if c == '"' || c == '\'' {
                    in_quote = Some(c);
                }
                out.push(c);
            }
        }
        i += 1;
    }
    out
}

fn is_continuation_at(chars: &[char], i: usize) -> bool {
    let mut j = i + 1;
    while j < chars.len() && (chars[j] == ' ' || chars[j] == '\t') {
        j += 1;
    }
    j < chars.len() && chars[j] == '\n'
}

fn skip_continuation(chars: &[char], i: usize) -> usize {
    let mut j = i + 1;
    while j < chars.len() && chars[j] != '\n' {
        j += 1;
    }
    j + 1 // skip the newline itself
}

/// Step 3: collapses runs of whitespace to single spaces outside quotes.
pub fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_quote: Option<char> = None;
    let mut prev_was_space = false;

    for c in input.chars() {
        match in_quote {
            Some(q) => {
                out.push(c);
                if c == q {
                    in_quote = None;
                }
            }
            None => {
                if c == '"' || c == '\'' {
                    in_quote = Some(c);
                    out.push(c);
                    prev_was_space = false;
                } else if c.is_whitespace() {
                    if !prev_was_space {
                        out.push(' ');
                    }
                    prev_was_space = true;
                } else {
                    out.push(c);
                    prev_was_space = false;
                }
            }
        }
    }
    out.trim().to_string()
}

/// Step 2: decodes HTML entities for display/clean paths. The executed
/// command form always uses the raw form after step 1, never this.
pub fn decode_html_entities(input: &str) -> String {
    input
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#10;", "\n")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Normalizes raw tool-call `args` into the form used to build an
/// executable command: continuation-folded (if enabled) and
/// whitespace-collapsed. `tool_name` is reserved for per-tool
/// normalization quirks; none are currently needed.
pub fn sanitize_args(raw: &str, _tool_name: &str, allow_newline_folding: bool) -> String {
    let folded = if allow_newline_folding {
        fold_continuations(raw)
    } else {
        raw.to_string()
    };
    collapse_whitespace(&folded)
}

/// Splits a (possibly multiline, continuation-folded) args string into an
/// ordered list of CLI-style tokens, honoring shell quoting.
pub fn split_tool_args_multiline(s: &str) -> Result<Vec<String>, ParseError> {
    let folded = fold_continuations(s);
    shell_words::split(&folded).map_err(|err| ParseError::MalformedArgs(err.to_string()))
}

/// Step 4: if `s` looks like a JSON object or array (after unescaping any
/// `\"` produced by an attribute-quoted payload), converts it into an
/// ordered CLI token list: for an object, the first recognized key is the
/// subcommand (`cmd`); remaining keys become `--flag value` pairs sorted
/// lexicographically by key. Falls back to `split_tool_args_multiline`
/// when the payload is not JSON.
pub fn parse_tool_args_with_json(s: &str) -> Result<Vec<String>, ParseError> {
    let trimmed = s.trim();
    let looks_like_json =
        (trimmed.starts_with('{') && trimmed.ends_with('}')) || (trimmed.starts_with('[') && trimmed.ends_with(']'));

    if !looks_like_json {
        return split_tool_args_multiline(s);
    }

    let unescaped = trimmed.replace("\\\"", "\"");
    let value: serde_json::Value = serde_json::from_str(&unescaped)
        .map_err(|err| ParseError::MalformedArgs(err.to_string()))?;

    match value {
        serde_json::Value::Object(map) => {
            let mut tokens = Vec::new();
            let mut entries: Vec<(String, serde_json::Value)> = map.into_iter().collect();
            let cmd_idx = entries
                .iter()
                .position(|(k, _)| k == "cmd" || k == "command" || k == "subcommand");
            if let Some(idx) = cmd_idx {
                let (_, cmd_value) = entries.remove(idx);
                tokens.push(value_to_string(&cmd_value));
            }
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (key, value) in entries {
                tokens.push(format!("--{key}"));
                tokens.push(value_to_string(&value));
            }
            Ok(tokens)
        }
        serde_json::Value::Array(items) => Ok(items.iter().map(value_to_string).collect()),
        other => Ok(vec![value_to_string(&other)]),
    }
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_continuation_outside_quotes_to_space() {
        let input = "echo hello \\\nworld";
        assert_eq!(fold_continuations(input), "echo hello world");
    }

    #[test]
    fn folds_continuation_inside_quotes_to_empty() {
        let input = "\"abcd\\\nefgh\"";
        assert_eq!(fold_continuations(input), "\"abcdefgh\"");
    }

    #[test]
    fn collapses_whitespace_outside_quotes() {
        let input = "echo    hello   world";
        assert_eq!(collapse_whitespace(input), "echo hello world");
    }

    #[test]
    fn preserves_whitespace_inside_quotes() {
        let input = "echo \"hello   world\"";
        assert_eq!(collapse_whitespace(input), "echo \"hello   world\"");
    }

    #[test]
    fn decodes_html_entities() {
        assert_eq!(decode_html_entities("a &quot;b&quot;"), "a \"b\"");
        assert_eq!(decode_html_entities("line1&#10;line2"), "line1\nline2");
    }

    #[test]
    fn json_object_becomes_ordered_cli_tokens() {
        let json = r#"{"cmd":"exec","zeta":"z","alpha":"a"}"#;
        let tokens = parse_tool_args_with_json(json).unwrap();
        assert_eq!(tokens, vec!["exec", "--alpha", "a", "--zeta", "z"]);
    }

    #[test]
    fn json_without_cmd_key_still_orders_flags() {
        let json = r#"{"b":"2","a":"1"}"#;
        let tokens = parse_tool_args_with_json(json).unwrap();
        assert_eq!(tokens, vec!["--a", "1", "--b", "2"]);
    }

    #[test]
    fn escaped_json_quotes_are_unescaped_before_parsing() {
        let json = r#"{\"cmd\":\"exec\"}"#;
        let tokens = parse_tool_args_with_json(json).unwrap();
        assert_eq!(tokens, vec!["exec"]);
    }

    #[test]
    fn non_json_falls_back_to_shell_split() {
        let tokens = parse_tool_args_with_json("git status --short").unwrap();
        assert_eq!(tokens, vec!["git", "status", "--short"]);
    }

    #[test]
    fn split_respects_shell_quoting() {
        let tokens = split_tool_args_multiline(r#"exec --cmd "git status""#).unwrap();
        assert_eq!(tokens, vec!["exec", "--cmd", "git status"]);
    }
}
