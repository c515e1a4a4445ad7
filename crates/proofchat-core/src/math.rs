//! Math delimiter normalization.
//!
//! The backend writes LaTeX with `\[ .. \]` for display math and `\( .. \)`
//! for inline math. Renderers downstream expect `$$ .. $$` and `$ .. $`.
//! Each delimiter style is paired like brackets, innermost first, so nested
//! pairs are rewritten in a single pass. Escaping is not understood and
//! unpaired delimiters are left as they are.

use std::sync::LazyLock;

use regex::Regex;

static DELIMITER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[\[\]()]").expect("math delimiter pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    OpenBlock,
    CloseBlock,
    OpenInline,
    CloseInline,
}

#[derive(Debug)]
struct Token {
    start: usize,
    end: usize,
    delimiter: Delimiter,
    paired: bool,
}

/// Find every delimiter in `text` and mark the ones that close a pair.
///
/// Unpaired tokens of one style always end up as closers followed by
/// openers, so a second scan of the rewritten text pairs nothing.
fn scan(text: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = DELIMITER
        .find_iter(text)
        .map(|m| {
            let delimiter = match &text[m.start() + 1..m.end()] {
                "[" => Delimiter::OpenBlock,
                "]" => Delimiter::CloseBlock,
                "(" => Delimiter::OpenInline,
                _ => Delimiter::CloseInline,
            };
            Token {
                start: m.start(),
                end: m.end(),
                delimiter,
                paired: false,
            }
        })
        .collect();

    let mut open_blocks = Vec::new();
    let mut open_inline = Vec::new();
    for i in 0..tokens.len() {
        let (stack, closing) = match tokens[i].delimiter {
            Delimiter::OpenBlock => (&mut open_blocks, false),
            Delimiter::CloseBlock => (&mut open_blocks, true),
            Delimiter::OpenInline => (&mut open_inline, false),
            Delimiter::CloseInline => (&mut open_inline, true),
        };
        if !closing {
            stack.push(i);
        } else if let Some(open) = stack.pop() {
            tokens[open].paired = true;
            tokens[i].paired = true;
        }
    }
    tokens
}

/// Rewrite `\[..\]` to a `$$` block and `\(..\)` to inline `$..$`.
///
/// Total, linear in the input, and idempotent: paired delimiters are
/// replaced by `$` and newlines, and what is left pairs nothing.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut cursor = 0;
    // Block content is trimmed on both sides.
    let mut trim_next = false;

    for token in scan(text).into_iter().filter(|token| token.paired) {
        push_segment(&mut out, &text[cursor..token.start], trim_next);
        trim_next = false;
        match token.delimiter {
            Delimiter::OpenBlock => {
                out.push_str("\n$$");
                trim_next = true;
            }
            Delimiter::CloseBlock => {
                out.truncate(out.trim_end().len());
                out.push_str("$$\n");
            }
            Delimiter::OpenInline | Delimiter::CloseInline => out.push('$'),
        }
        cursor = token.end;
    }
    push_segment(&mut out, &text[cursor..], trim_next);
    out
}

fn push_segment(out: &mut String, segment: &str, trim_start: bool) {
    if trim_start {
        out.push_str(segment.trim_start());
    } else {
        out.push_str(segment);
    }
}
