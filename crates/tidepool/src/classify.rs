//! Statement-completeness classification for interactive input.
//!
//! Decides whether a snippet is ready to execute, needs more lines, or can
//! never become valid. Cheap structural checks run first (bracket balance,
//! open literals, trailing operators); only structurally-complete snippets
//! reach the probe parse, which evaluates a function *expression* wrapping
//! the snippet in a scratch engine context so the body is parsed but never
//! run.

use std::cell::RefCell;
use std::mem::ManuallyDrop;

use boa_engine::{Context, Source};

use crate::scan::{blank_noncode, final_state};

/// Number of spaces per suggested indent step.
const INDENT_UNIT: usize = 2;

/// Keywords that cannot end a complete statement.
const CONTINUATION_KEYWORDS: &[&str] = &[
    "return", "throw", "else", "do", "typeof", "instanceof", "in", "of", "new", "delete", "void", "case", "yield",
    "await", "const", "let", "var", "function", "class", "extends", "async",
];

/// Needs-more-input markers in engine parse errors. A syntax error whose text
/// carries none of these is a hard error the user cannot fix by typing more.
const INCOMPLETE_MARKERS: &[&str] = &["end of input", "abrupt end", "unterminated", "eof", "unexpected end"];

thread_local! {
    /// Scratch engine context reused across probe parses on this thread.
    ///
    /// Wrapped in `ManuallyDrop` because boa's GC keeps its own thread-local
    /// state; TLS destructor order is unspecified, and dropping a `Context`
    /// after the GC state is gone corrupts the heap at thread exit.
    static PROBE: RefCell<Option<ManuallyDrop<Context>>> = const { RefCell::new(None) };
}

/// Completeness verdict for one snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The snippet can be executed as-is.
    Complete,
    /// More input is needed before the snippet can parse.
    Incomplete,
    /// No amount of further input can make the snippet parse.
    Invalid,
    /// The probe could not decide (scratch engine unavailable).
    Unknown,
}

/// Result of classifying a snippet, with an indent hint for the next line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// The completeness verdict.
    pub status: Status,
    /// Suggested leading whitespace for the continuation line.
    pub indent: String,
}

/// Classifies a snippet as complete, incomplete, or invalid.
///
/// Structural checks run in order: empty input is complete; a positive
/// bracket residual or open string/template/comment/regex is incomplete; a
/// negative residual is invalid; a trailing operator, separator, or
/// continuation keyword is incomplete. Anything structurally complete is
/// probe-parsed.
#[must_use]
pub fn classify(code: &str) -> Classification {
    let status = classify_status(code);
    Classification {
        status,
        indent: suggested_indent(code),
    }
}

fn classify_status(code: &str) -> Status {
    if code.trim().is_empty() {
        return Status::Complete;
    }

    let state = final_state(code);
    if state.has_mismatch() {
        return Status::Invalid;
    }
    if state.bracket_depth() > 0
        || state.template_expr_depth() > 0
        || state.open_string()
        || state.open_template()
        || state.open_block_comment()
        || state.open_regex()
    {
        return Status::Incomplete;
    }
    if ends_mid_expression(code) {
        return Status::Incomplete;
    }

    probe_parse(code)
}

/// True when the last significant token forces a continuation line.
fn ends_mid_expression(code: &str) -> bool {
    let blanked = blank_noncode(code);
    let trimmed = blanked.trim_end();
    if trimmed.is_empty() {
        return false;
    }

    // Postfix increments end a complete expression; checked before the
    // single-character test would see the trailing `+`/`-`.
    if trimmed.ends_with("++") || trimmed.ends_with("--") {
        return false;
    }
    // Two-char operator endings first, so `=>` and `&&` are caught before
    // their final character is checked alone.
    for op in ["=>", "&&", "||", "??", "**", "=="] {
        if trimmed.ends_with(op) {
            return true;
        }
    }
    if let Some(last) = trimmed.chars().next_back() {
        if matches!(last, '+' | '-' | '*' | '/' | '%' | '=' | '<' | '>' | '&' | '|' | '^' | ',' | '.' | '?' | ':' | '~')
        {
            return true;
        }
    }

    let last_word = trimmed
        .rsplit(|c: char| !crate::scan::is_ident_part(c))
        .find(|w| !w.is_empty());
    last_word.is_some_and(|w| CONTINUATION_KEYWORDS.contains(&w) && trimmed.ends_with(w))
}

/// Parses the snippet as an async function body in a scratch context.
///
/// The wrapper is a parenthesized function expression, so evaluating it
/// creates a function object without running the body or binding a name.
fn probe_parse(code: &str) -> Status {
    let wrapped = format!("(async function () {{\n{code}\n}})");
    PROBE.with(|cell| {
        let mut slot = cell.borrow_mut();
        let context = slot.get_or_insert_with(|| ManuallyDrop::new(Context::default()));
        match context.eval(Source::from_bytes(wrapped.as_bytes())) {
            Ok(_) => Status::Complete,
            Err(error) => {
                let text = error.to_string().to_lowercase();
                if INCOMPLETE_MARKERS.iter().any(|marker| text.contains(marker)) {
                    Status::Incomplete
                } else {
                    Status::Invalid
                }
            }
        }
    })
}

/// Suggests leading whitespace for the line after `code`.
///
/// One extra indent unit after a trailing opener, `=>`, `:` or operator;
/// otherwise the current last line's own indent.
#[must_use]
pub fn suggested_indent(code: &str) -> String {
    let last_line = code.lines().rev().find(|line| !line.trim().is_empty()).unwrap_or("");
    let current: String = last_line.chars().take_while(|c| c.is_whitespace()).collect();

    let blanked = blank_noncode(code);
    let trimmed = blanked.trim_end();
    let deepen = trimmed.ends_with(['(', '[', '{', ':'])
        || trimmed.ends_with("=>")
        || trimmed
            .chars()
            .next_back()
            .is_some_and(|c| matches!(c, '+' | '-' | '*' | '/' | '=' | '&' | '|' | '?' | '.'));

    if deepen {
        format!("{current}{}", " ".repeat(INDENT_UNIT))
    } else {
        current
    }
}
