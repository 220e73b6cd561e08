// SPDX-FileCopyrightText: 2026 Picrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MarkdownV2 escaping for the Telegram Bot API.
//!
//! Text is split into ordered, non-overlapping regions before escaping:
//! fenced code blocks first, then inline code, then `[label](url)` links.
//! Whatever is left is plain text. Each region has its own escaping rule,
//! so code stays readable and links stay clickable while every other
//! reserved character is neutralized.

/// Characters that must be escaped in plain MarkdownV2 text.
const RESERVED: &[u8] = b"_*[]()~`>#+-=|{}.!\\";

const FENCE: &str = "```";

fn is_reserved(b: u8) -> bool {
    RESERVED.contains(&b)
}

/// A region of the input with its escaping rule.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Span<'a> {
    Plain(&'a str),
    /// `header` is the opening fence with its language tag and newline,
    /// `close` the closing fence (with its leading newline when the body is
    /// not empty).
    Fenced {
        header: &'a str,
        body: &'a str,
        close: &'a str,
    },
    InlineCode(&'a str),
    Link {
        label: &'a str,
        dest: &'a str,
    },
}

/// Escapes `text` for Telegram's MarkdownV2 parse mode.
///
/// Plain text is idempotent under this function: an existing backslash
/// escape pair is kept as-is instead of being escaped again. The cost is
/// that a literal backslash before a reserved character (`C:\.cache`,
/// `\(`) renders without the backslash.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    for span in parse(text) {
        match span {
            Span::Plain(s) => escape_plain_into(s, &mut out),
            Span::Fenced {
                header,
                body,
                close,
            } => {
                out.push_str(header);
                escape_code_into(body, &mut out);
                out.push_str(close);
            }
            Span::InlineCode(code) => {
                out.push('`');
                escape_code_into(code, &mut out);
                out.push('`');
            }
            Span::Link { label, dest } => {
                out.push('[');
                escape_plain_into(label, &mut out);
                out.push_str("](");
                for c in dest.chars() {
                    if c == '\\' || c == ')' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push(')');
            }
        }
    }
    out
}

/// Wraps `text` into a fenced block. The result is meant to be passed
/// through [`escape_markdown_v2`] as part of a larger message.
pub fn fenced(text: &str) -> String {
    format!("{FENCE}\n{text}\n{FENCE}")
}

fn parse(text: &str) -> Vec<Span<'_>> {
    let mut spans = Vec::new();
    for outer in split_fenced(text) {
        let Span::Plain(rest) = outer else {
            spans.push(outer);
            continue;
        };
        for middle in split_inline_code(rest) {
            match middle {
                Span::Plain(rest) => spans.extend(split_links(rest)),
                other => spans.push(other),
            }
        }
    }
    spans
}

fn escape_plain_into(s: &str, out: &mut String) {
    let bytes = s.as_bytes();
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\\' && bytes.get(i + 1).is_some_and(|&b| is_reserved(b)) {
            out.push('\\');
            if let Some((_, escaped)) = chars.next() {
                out.push(escaped);
            }
            continue;
        }
        if c.is_ascii() && is_reserved(c as u8) {
            out.push('\\');
        }
        out.push(c);
    }
}

fn escape_code_into(s: &str, out: &mut String) {
    for c in s.chars() {
        if c == '\\' || c == '`' {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Finds `needle` at or after `from`, stepping over backslash escape pairs.
fn find_unescaped(hay: &str, from: usize, needle: &str) -> Option<usize> {
    let bytes = hay.as_bytes();
    let pat = needle.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'\\' && bytes.get(i + 1).is_some_and(|&b| is_reserved(b)) {
            i += 2;
            continue;
        }
        if bytes[i..].starts_with(pat) {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Pushes `text[start..end]` as plain text, skipping empty slices.
fn push_plain<'a>(spans: &mut Vec<Span<'a>>, text: &'a str, start: usize, end: usize) {
    if start < end {
        spans.push(Span::Plain(&text[start..end]));
    }
}

fn split_fenced(text: &str) -> Vec<Span<'_>> {
    let mut spans = Vec::new();
    let mut emitted = 0;
    let mut search = 0;

    while let Some(open) = find_unescaped(text, search, FENCE) {
        search = open + 1;
        if open > 0 && text.as_bytes()[open - 1] != b'\n' {
            continue;
        }
        let Some(block) = match_fence(text, open) else {
            continue;
        };
        push_plain(&mut spans, text, emitted, open);
        emitted = block.end;
        search = block.end;
        spans.push(block.span);
    }
    push_plain(&mut spans, text, emitted, text.len());
    spans
}

struct Matched<'a> {
    span: Span<'a>,
    end: usize,
}

/// Matches a fenced block whose opening fence starts at `open`.
fn match_fence(text: &str, open: usize) -> Option<Matched<'_>> {
    let after_fence = open + FENCE.len();
    let rest = &text[after_fence..];
    let tag_len = rest.find(char::is_whitespace)?;
    let newline = after_fence + tag_len;
    if text.as_bytes()[newline] != b'\n' {
        return None;
    }

    let closing = newline + text[newline..].find("\n```")?;
    let (body, close_start) = if closing == newline {
        ("", newline + 1)
    } else {
        (&text[newline + 1..closing], closing)
    };
    let end = closing + "\n```".len();
    Some(Matched {
        span: Span::Fenced {
            header: &text[open..=newline],
            body,
            close: &text[close_start..end],
        },
        end,
    })
}

fn split_inline_code(text: &str) -> Vec<Span<'_>> {
    let mut spans = Vec::new();
    let mut emitted = 0;
    let mut search = 0;

    while let Some(open) = find_unescaped(text, search, "`") {
        search = open + 1;
        let line_end = text[open + 1..]
            .find('\n')
            .map_or(text.len(), |n| open + 1 + n);
        let Some(close) = text[open + 1..line_end].find('`').map(|n| open + 1 + n) else {
            continue;
        };
        if close == open + 1 {
            continue;
        }
        push_plain(&mut spans, text, emitted, open);
        spans.push(Span::InlineCode(&text[open + 1..close]));
        emitted = close + 1;
        search = close + 1;
    }
    push_plain(&mut spans, text, emitted, text.len());
    spans
}

fn split_links(text: &str) -> Vec<Span<'_>> {
    let mut spans = Vec::new();
    let mut emitted = 0;
    let mut search = 0;

    while let Some(open) = find_unescaped(text, search, "[") {
        search = open + 1;
        let line_end = text[open..].find('\n').map_or(text.len(), |n| open + n);
        let Some((label, dest, end)) = match_link(text, open, line_end) else {
            continue;
        };
        push_plain(&mut spans, text, emitted, open);
        spans.push(Span::Link { label, dest });
        emitted = end;
        search = end;
    }
    push_plain(&mut spans, text, emitted, text.len());
    spans
}

/// Matches `[label](dest)` starting at `open`, staying before `line_end`.
/// If the first `](` has no usable destination, later ones are tried.
fn match_link(text: &str, open: usize, line_end: usize) -> Option<(&str, &str, usize)> {
    let line = &text[..line_end];
    let mut from = open + 1;
    while let Some(mid) = find_unescaped(line, from, "](") {
        from = mid + 1;
        if mid == open + 1 {
            continue;
        }
        let dest_start = mid + 2;
        let dest_len = line[dest_start..].find(')')?;
        if dest_len == 0 {
            continue;
        }
        let dest_end = dest_start + dest_len;
        return Some((&text[open + 1..mid], &text[dest_start..dest_end], dest_end + 1));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_string() {
        assert_eq!(escape_markdown_v2(""), "");
    }

    #[test]
    fn plain_text_no_special_chars() {
        assert_eq!(escape_markdown_v2("Hello world"), "Hello world");
    }

    #[test]
    fn escapes_reserved_characters() {
        assert_eq!(
            escape_markdown_v2(r"abcd1 _*~ []()^>#+-=\"),
            r"abcd1 \_\*\~ \[\]\(\)^\>\#\+\-\=\\"
        );
        assert_eq!(escape_markdown_v2("a = b | c {d}!"), r"a \= b \| c \{d\}\!");
    }

    #[test]
    fn escapes_markdown_formatting_chars() {
        let input = "This is *bold* and _italic_.";
        let expected = r"This is \*bold\* and \_italic\_\.";
        assert_eq!(escape_markdown_v2(input), expected);
    }

    #[test]
    fn keeps_existing_escape_pairs() {
        assert_eq!(escape_markdown_v2(r"already \. escaped"), r"already \. escaped");
        assert_eq!(escape_markdown_v2(r"trailing \"), r"trailing \\");
        assert_eq!(escape_markdown_v2(r"not a pair \q"), r"not a pair \\q");
    }

    #[test]
    fn literal_backslash_before_reserved_char_survives_only_in_code() {
        // Read as an escape pair, so the backslash disappears when rendered.
        assert_eq!(
            escape_markdown_v2(r"cannot open C:\.cache"),
            r"cannot open C:\.cache"
        );
        // Error text goes through a fenced block, where it is kept.
        assert_eq!(
            escape_markdown_v2(&fenced(r"cannot open C:\.cache")),
            "```\ncannot open C:\\\\.cache\n```"
        );
    }

    #[test]
    fn preserves_inline_code() {
        let input = "Use `println!()` to print.";
        assert_eq!(escape_markdown_v2(input), r"Use `println!()` to print\.");
    }

    #[test]
    fn inline_code_escapes_backslashes() {
        let input = r"line with `back\ticks and [special]=(symbols)`";
        assert_eq!(
            escape_markdown_v2(input),
            r"line with `back\\ticks and [special]=(symbols)`"
        );
    }

    #[test]
    fn empty_or_unclosed_inline_code_is_plain() {
        assert_eq!(escape_markdown_v2("a `` b"), r"a \`\` b");
        assert_eq!(escape_markdown_v2("Use `foo."), r"Use \`foo\.");
        assert_eq!(escape_markdown_v2("`a\nb`"), "\\`a\nb\\`");
    }

    #[test]
    fn preserves_fenced_code_block() {
        let input = "Example:\n```rust\nfn main() {\n    println!(\"Hello!\");\n}\n```\nDone.";
        let expected =
            "Example:\n```rust\nfn main() {\n    println!(\"Hello!\");\n}\n```\nDone\\.";
        assert_eq!(escape_markdown_v2(input), expected);
    }

    #[test]
    fn fenced_block_escapes_backticks_and_backslashes() {
        let input = "```\n\tcode `line` 1\n\tcode\\line\\2\n```";
        let expected = "```\n\tcode \\`line\\` 1\n\tcode\\\\line\\\\2\n```";
        assert_eq!(escape_markdown_v2(input), expected);
    }

    #[test]
    fn fence_must_start_a_line() {
        let input = "x ```\ncode\n```";
        let result = escape_markdown_v2(input);
        assert!(result.starts_with(r"x \`\`\`"), "got {result}");
    }

    #[test]
    fn empty_fenced_block() {
        assert_eq!(escape_markdown_v2("```\n```"), "```\n```");
    }

    #[test]
    fn unclosed_fence_is_plain() {
        let result = escape_markdown_v2("```\nsome code without closing.");
        assert!(result.ends_with(r"without closing\."));
        assert!(!result.contains("```"));
    }

    #[test]
    fn preserves_links() {
        let input = "See [the docs](https://example.com/a_b?x=1) now.";
        assert_eq!(
            escape_markdown_v2(input),
            r"See [the docs](https://example.com/a_b?x=1) now\."
        );
    }

    #[test]
    fn link_label_is_escaped_and_destination_keeps_dots() {
        let input = r"strange [link with.dots](https://lin\k.ru)";
        assert_eq!(
            escape_markdown_v2(input),
            r"strange [link with\.dots](https://lin\\k.ru)"
        );
    }

    #[test]
    fn bare_brackets_are_escaped() {
        let input = r"[special]=(symbols) without \ backticks";
        assert_eq!(
            escape_markdown_v2(input),
            r"\[special\]\=\(symbols\) without \\ backticks"
        );
    }

    #[test]
    fn link_with_empty_parts_is_plain() {
        assert_eq!(escape_markdown_v2("[](x)"), r"\[\]\(x\)");
        assert_eq!(escape_markdown_v2("[a]()"), r"\[a\]\(\)");
    }

    #[test]
    fn bare_url_is_plain_text() {
        let input = "link as text: https://some.link/here?param1=1&param2=2";
        let expected = r"link as text: https://some\.link/here?param1\=1&param2\=2";
        assert_eq!(escape_markdown_v2(input), expected);
    }

    #[test]
    fn mixed_document() {
        let input = "line with [link](https://some.link/here?param1=1)\n\
                     another line.\n\
                     ```\n\tcode `x`\n```\n\
                     tail #1";
        let expected = "line with [link](https://some.link/here?param1=1)\n\
                        another line\\.\n\
                        ```\n\tcode \\`x\\`\n```\n\
                        tail \\#1";
        assert_eq!(escape_markdown_v2(input), expected);
    }

    #[test]
    fn fenced_helper_produces_a_code_region() {
        let message = format!("Error:\n{}", fenced("boom (x.y)"));
        assert_eq!(
            escape_markdown_v2(&message),
            "Error:\n```\nboom (x.y)\n```"
        );
    }

    #[test]
    fn non_ascii_text_is_untouched() {
        assert_eq!(escape_markdown_v2("привет, мир!"), r"привет, мир\!");
    }

    proptest! {
        #[test]
        fn never_panics(s in "\\PC*") {
            let _ = escape_markdown_v2(&s);
        }

        #[test]
        fn plain_escaping_is_idempotent(s in "[a-z _*~.!#+=|{}\\\\-]*") {
            let once = escape_markdown_v2(&s);
            prop_assert_eq!(escape_markdown_v2(&once), once);
        }
    }
}
