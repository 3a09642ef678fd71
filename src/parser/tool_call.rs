//! Extraction of `<tool_call name="@X" args="…" />` invocations (and the
//! paired-tag form `<tool_call ...></tool_call>`) from model output.
//! Statics are compiled once (`once_cell::sync::Lazy`) and parsing stays
//! pure and allocation-light.

use crate::error::ParseError;

/// One parsed tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub name: String,
    pub args: String,
    pub raw: String,
}

impl ToolCall {
    /// Canonical self-closing form, used for the idempotency property
    ///: re-parsing this string yields one
    /// `ToolCall` with the same `name`/`args`.
    pub fn to_source(&self) -> String {
        format!(
            r#"<tool_call name="{}" args="{}" />"#,
            escape_double_quotes(&self.name),
            escape_double_quotes(&self.args)
        )
    }
}

fn escape_double_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Extracts every `<tool_call …/>` invocation from `text`, in order.
/// Invocations missing a `name` attribute are reported as errors but do
/// not prevent other invocations in the same text from being returned.
pub fn parse_tool_calls(text: &str) -> Vec<Result<ToolCall, ParseError>> {
    let mut results = Vec::new();
    let mut cursor = 0usize;

    while let Some(rel_start) = text[cursor..].find("<tool_call") {
        let tag_start = cursor + rel_start;
        let Some((raw, next)) = extract_tag(text, tag_start) else {
            break;
        };
        cursor = next;

        let name = extract_attribute(&raw, "name");
        let args = extract_attribute(&raw, "args").unwrap_or_default();

        match name {
            Some(name) => results.push(Ok(ToolCall { name, args, raw })),
            None => results.push(Err(ParseError::MissingName)),
        }
    }

    results
}

/// Finds the end of one `<tool_call ...>` tag starting at `start`,
/// respecting quoted attribute values so a `>` inside `args="..."` does
/// not terminate the tag early. Returns the raw tag text and the index to
/// resume scanning from.
fn extract_tag(text: &str, start: usize) -> Option<(String, usize)> {
    let rest = &text[start..];
    let mut in_quote: Option<char> = None;
    let mut indices = rest.char_indices().peekable();

    while let Some((byte_idx, c)) = indices.next() {
        match in_quote {
            Some(q) => {
                if c == '\\' {
                    indices.next();
                    continue;
                }
                if c == q {
                    in_quote = None;
                }
            }
            None => {
                if c == '"' || c == '\'' {
                    in_quote = Some(c);
                } else if c == '>' {
                    let end = start + byte_idx + c.len_utf8();
                    let raw = text[start..end].to_string();
                    // Swallow a following </tool_call> closing tag if present.
                    let closing = "</tool_call>";
                    let trimmed = text[end..].trim_start();
                    let next = if trimmed.starts_with(closing) {
                        let ws = text[end..].len() - trimmed.len();
                        end + ws + closing.len()
                    } else {
                        end
                    };
                    return Some((raw, next));
                }
            }
        }
    }
    None
}

/// Extracts the value of `attr="..."` or `attr='...'` from a raw tag,
/// unescaping `\"`/`\'` but leaving backslash-newline continuations intact
/// for the normalization pipeline to fold.
fn extract_attribute(tag: &str, attr: &str) -> Option<String> {
    let needle_dq = format!("{attr}=\"");
    let needle_sq = format!("{attr}='");

    let (rest, quote) = if let Some(idx) = tag.find(&needle_dq) {
        (&tag[idx + needle_dq.len()..], '"')
    } else if let Some(idx) = tag.find(&needle_sq) {
        (&tag[idx + needle_sq.len()..], '\'')
    } else {
        return None;
    };

    let mut value = String::new();
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next == quote || next == '\\' {
                    value.push(next);
                    chars.next();
                    continue;
                }
            }
            value.push(c);
            continue;
        }
        if c == quote {
            return Some(value);
        }
        value.push(c);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_self_closing_double_quoted() {
        let text = r#"<tool_call name="@exec" args="ls -la" />"#;
        let calls = parse_tool_calls(text);
        assert_eq!(calls.len(), 1);
        let call = calls[0].as_ref().unwrap();
        assert_eq!(call.name, "@exec");
        assert_eq!(call.args, "ls -la");
    }

    #[test]
    fn parses_paired_tag_form() {
        let text = r#"<tool_call name="@read" args="file.txt"></tool_call>"#;
        let calls = parse_tool_calls(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].as_ref().unwrap().name, "@read");
    }

    #[test]
    fn parses_single_quoted_attributes() {
        let text = r#"<tool_call name='@exec' args='echo hi' />"#;
        let calls = parse_tool_calls(text);
        assert_eq!(calls[0].as_ref().unwrap().args, "echo hi");
    }

    #[test]
    fn parses_escaped_quotes_in_args() {
        let text = r#"<tool_call name="@exec" args="echo \"hi\"" />"#;
        let calls = parse_tool_calls(text);
        assert_eq!(calls[0].as_ref().unwrap().args, r#"echo "hi""#);
    }

    #[test]
    fn missing_name_is_reported_but_others_still_returned() {
        let text = concat!(
            r#"<tool_call args="no name" />"#,
            "\n",
            r#"<tool_call name="@exec" args="ls" />"#,
        );
        let calls = parse_tool_calls(text);
        assert_eq!(calls.len(), 2);
        assert!(calls[0].is_err());
        assert!(calls[1].is_ok());
    }

    #[test]
    fn missing_args_is_allowed_empty() {
        let text = r#"<tool_call name="@read" />"#;
        let calls = parse_tool_calls(text);
        let call = calls[0].as_ref().unwrap();
        assert_eq!(call.args, "");
    }

    #[test]
    fn multiple_invocations_returned_in_order() {
        let text = concat!(
            r#"<tool_call name="@a" args="1" />"#,
            r#"<tool_call name="@b" args="2" />"#,
            r#"<tool_call name="@c" args="3" />"#,
        );
        let calls = parse_tool_calls(text);
        let names: Vec<_> = calls.iter().map(|c| c.as_ref().unwrap().name.clone()).collect();
        assert_eq!(names, vec!["@a", "@b", "@c"]);
    }

    #[test]
    fn idempotent_on_canonical_source() {
        let text = r#"<tool_call name="@exec" args="git status" />"#;
        let first = parse_tool_calls(text)[0].as_ref().unwrap().clone();
        let regenerated = first.to_source();
        let second = parse_tool_calls(&regenerated)[0].as_ref().unwrap().clone();
        assert_eq!(first.name, second.name);
        assert_eq!(first.args, second.args);
    }

    #[test]
    fn gt_inside_quoted_args_does_not_end_tag_early() {
        let text = r#"<tool_call name="@exec" args="echo 1 > out.txt" />"#;
        let calls = parse_tool_calls(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].as_ref().unwrap().args, "echo 1 > out.txt");
    }
}
