//! Span finders for structured literals embedded in free text.

/// A fenced block (three backticks) and its info tag, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FencedBlock<'a> {
    pub tag: Option<&'a str>,
    pub body: &'a str,
}

const FENCE: &str = "```";

/// All fenced blocks in order of appearance. An unterminated final fence is
/// ignored.
pub fn fenced_blocks(text: &str) -> Vec<FencedBlock<'_>> {
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find(FENCE) {
        let after_open = &rest[open + FENCE.len()..];
        let (info, body_start) = match after_open.find('\n') {
            Some(newline) => (after_open[..newline].trim(), newline + 1),
            None => break,
        };

        let Some(close) = after_open[body_start..].find(FENCE) else {
            break;
        };
        let body = &after_open[body_start..body_start + close];

        let tag = info.split_whitespace().next().filter(|t| !t.is_empty());
        blocks.push(FencedBlock { tag, body: body.trim() });

        rest = &after_open[body_start + close + FENCE.len()..];
    }

    blocks
}

/// Every balanced `{...}` span in `text`, nested ones included, in order of
/// their opening brace.
///
/// Each opening brace is scanned on its own with fresh string state, so a
/// stray quote after an unclosed brace in prose cannot hide later spans.
/// Braces inside double-quoted strings are ignored, so `{"a": "}"}` is a
/// single span.
pub fn balanced_spans(text: &str) -> Vec<&str> {
    text.char_indices()
        .filter(|&(_, c)| c == '{')
        .filter_map(|(start, _)| span_len(&text[start..]).map(|len| &text[start..start + len]))
        .collect()
}

/// Byte length of the balanced span opening at the start of `text`, or None
/// when it never closes.
fn span_len(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}

/// Substring from the first `{` to the last `}`.
pub fn bounding_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_blocks_with_and_without_tag() {
        let text = "intro\n```json\n{\"a\": 1}\n```\nmiddle\n```\n{\"b\": 2}\n```\n";
        let blocks = fenced_blocks(text);

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], FencedBlock { tag: Some("json"), body: "{\"a\": 1}" });
        assert_eq!(blocks[1], FencedBlock { tag: None, body: "{\"b\": 2}" });
    }

    #[test]
    fn test_fenced_blocks_unterminated() {
        assert!(fenced_blocks("```json\n{\"a\": 1}").is_empty());
        assert!(fenced_blocks("no fences at all").is_empty());
    }

    #[test]
    fn test_balanced_spans_nested() {
        let spans = balanced_spans(r#"x {"a": {"b": 1}} y {"c": 2}"#);
        assert_eq!(spans, vec![r#"{"a": {"b": 1}}"#, r#"{"b": 1}"#, r#"{"c": 2}"#]);
    }

    #[test]
    fn test_balanced_spans_deep_nesting() {
        let text = r#"{"a": {"b": {"c": {"d": 1}}}}"#;
        let spans = balanced_spans(text);
        assert_eq!(spans.first(), Some(&text));
        assert_eq!(spans.last(), Some(&r#"{"d": 1}"#));
    }

    #[test]
    fn test_balanced_spans_ignores_braces_in_strings() {
        let text = r#"{"a": "} not a close {"}"#;
        assert_eq!(balanced_spans(text), vec![text]);
    }

    #[test]
    fn test_balanced_spans_unmatched() {
        assert_eq!(balanced_spans("} {\"a\": 1"), Vec::<&str>::new());
    }

    #[test]
    fn test_balanced_spans_stray_quote_in_prose() {
        let text = "Note: {unclosed \"quote\nResult: {\"cases\": [1]}";
        assert_eq!(balanced_spans(text), vec![r#"{"cases": [1]}"#]);
    }

    #[test]
    fn test_bounding_span() {
        assert_eq!(bounding_span("pre {a} mid {b} post"), Some("{a} mid {b}"));
        assert_eq!(bounding_span("} backwards {"), None);
        assert_eq!(bounding_span("nothing"), None);
    }
}
