//! Source rewriting that makes notebook snippets persist across calls.
//!
//! Three passes, all built on the shared scanner in [`crate::scan`]:
//!
//! - [`make_persistent`] rewrites top-level `let`/`const` to `var`, so the
//!   binding attaches to the session's global surface instead of dying with
//!   the script's block scope (and so re-running a cell does not trip the
//!   redeclaration error `let` carries).
//! - [`extract_declared_names`] collects the names a snippet will introduce,
//!   including destructuring patterns, so they can be registered as tracked
//!   variables before the snippet runs.
//! - [`wrap_unit`] decides whether the snippet needs a deferred wrapper
//!   (top-level `await`) and produces the evaluation unit(s) for the engine.
//!
//! None of this is a parser. It is a deliberate, single-pass, token-aware
//! rewrite with a bounded set of known misclassifications.

use indexmap::IndexSet;

use crate::scan::{ScanState, blank_noncode, is_ident_part, is_ident_start};

/// Statement keywords that cannot begin an expression statement. Used to
/// decide whether a trailing statement can be captured as the unit's value.
const STATEMENT_KEYWORDS: &[&str] = &[
    "var", "let", "const", "function", "class", "if", "for", "while", "do", "switch", "try", "return", "throw",
    "break", "continue", "debugger", "import", "export", "async",
];

/// A snippet prepared for evaluation.
///
/// `primary` is tried first; when it fails to parse and `fallback` is
/// present, the fallback (statement-mode wrapper) is evaluated instead.
/// `deferred` marks units wrapped in an async IIFE whose result is a promise
/// the caller must drive to settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedUnit {
    /// Source text to evaluate first.
    pub primary: String,
    /// Statement-mode wrapper, used when `primary` fails to parse.
    pub fallback: Option<String>,
    /// True when the unit evaluates to a promise that must be awaited.
    pub deferred: bool,
}

/// Rewrites top-level `let`/`const` declarations to `var`.
///
/// Only keyword tokens in plain code at brace depth zero are touched;
/// occurrences inside strings, comments, templates, regex literals, or any
/// nested `{}` block are left exactly as written. Idempotent: the output
/// contains no top-level block-scoped keyword, so a second pass is a no-op.
#[must_use]
pub fn make_persistent(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut state = ScanState::new();
    let mut chars = code.char_indices().peekable();
    let mut word_start: Option<usize> = None;
    let mut prev_significant: Option<char> = None;

    while let Some((idx, ch)) = chars.next() {
        let in_code = state.in_code();
        let at_top = state.brace_depth() == 0;

        if in_code && is_ident_part(ch) {
            if word_start.is_none() && is_ident_start(ch) {
                word_start = Some(idx);
            }
        } else {
            if let Some(start) = word_start.take() {
                let word = &code[start..idx];
                // A `.`/`?.` before the token makes it a property name
                // (`obj.let`), not a declaration keyword.
                if at_top && in_code && prev_significant != Some('.') && matches!(word, "let" | "const") {
                    // The keyword already sits in `out`; replace it.
                    out.truncate(out.len() - word.len());
                    out.push_str("var");
                }
            }
            // `word_start` only tracks tokens that begin with a start char;
            // a token like `1abc` never matches a keyword anyway.
        }

        if in_code && !ch.is_whitespace() && !is_ident_part(ch) {
            prev_significant = Some(ch);
        }
        out.push(ch);
        let next = chars.peek().map(|&(_, c)| c);
        state.feed(ch, next);
    }

    // Snippet ending exactly on the keyword.
    if let Some(start) = word_start {
        let word = &code[start..];
        if state.in_code()
            && state.brace_depth() == 0
            && prev_significant != Some('.')
            && matches!(word, "let" | "const")
        {
            out.truncate(out.len() - word.len());
            out.push_str("var");
        }
    }

    out
}

/// Extracts the set of names a snippet declares at the top level.
///
/// Handles `var`/`let`/`const` declarator lists (splitting on commas outside
/// nested brackets), `function`/`class` declarations (including `async` and
/// generator forms), and full destructuring patterns: object patterns with
/// renames, defaults, and rest; array patterns with holes, defaults, and
/// rest. Returns bound leaf names only, in declaration order.
#[must_use]
pub fn extract_declared_names(code: &str) -> IndexSet<String> {
    let blanked = blank_noncode(code);
    let mut names = IndexSet::new();
    let mut state = ScanState::new();
    let mut chars = blanked.char_indices().peekable();
    let mut word_start: Option<usize> = None;
    let mut prev_significant: Option<char> = None;

    while let Some((idx, ch)) = chars.next() {
        let in_code = state.in_code();
        let at_top = state.brace_depth() == 0;

        if in_code && is_ident_part(ch) {
            if word_start.is_none() && is_ident_start(ch) {
                word_start = Some(idx);
            }
        } else if let Some(start) = word_start.take() {
            let word = &blanked[start..idx];
            if at_top && in_code {
                collect_declaration(word, &blanked[idx..], prev_significant, &mut names);
            }
        }

        // Identifier characters never update this: the expression-position
        // check needs the significant character *before* the token, not the
        // token's own letters.
        if in_code && !ch.is_whitespace() && !is_ident_part(ch) {
            prev_significant = Some(ch);
        }
        let next = chars.peek().map(|&(_, c)| c);
        state.feed(ch, next);
    }

    if let Some(start) = word_start {
        let word = &blanked[start..];
        if state.in_code() && state.brace_depth() == 0 {
            collect_declaration(word, "", prev_significant, &mut names);
        }
    }

    names
}

/// Dispatches on a top-level keyword token and collects the names it binds.
/// `rest` is the blanked text immediately after the keyword.
fn collect_declaration(word: &str, rest: &str, prev_significant: Option<char>, names: &mut IndexSet<String>) {
    match word {
        "var" | "let" | "const" => {
            let list = declarator_list(rest);
            for declarator in split_top_level(list, ',') {
                let target = strip_initializer(declarator);
                collect_pattern(target, names);
            }
        }
        "function" | "class" => {
            // Skip expression positions: `x = function f() {}` must not
            // track `f`.
            if matches!(
                prev_significant,
                Some('=' | '(' | '[' | '{' | ',' | ':' | '?' | '&' | '|' | '!' | '+' | '-' | '*' | '/' | '%' | '<'
                    | '>' | '^' | '~' | '.')
            ) {
                return;
            }
            let after = rest.trim_start_matches(['*', ' ', '\t']);
            if let Some(name) = leading_identifier(after) {
                names.insert(name.to_owned());
            }
        }
        _ => {}
    }
}

/// Slices the declarator list after a `var`/`let`/`const` keyword: up to the
/// first `;` at bracket depth zero, or a newline that plainly ends the
/// statement (no trailing operator or separator before it).
fn declarator_list(rest: &str) -> &str {
    let mut depth = 0i32;
    let mut last_significant: Option<char> = None;
    for (idx, ch) in rest.char_indices() {
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                if depth == 0 {
                    return &rest[..idx];
                }
                depth -= 1;
            }
            ';' if depth == 0 => return &rest[..idx],
            '\n' if depth == 0 => {
                let continues = matches!(
                    last_significant,
                    None | Some(',' | '=' | '+' | '-' | '*' | '/' | '%' | '&' | '|' | '^' | '<' | '>' | '?' | ':'
                        | '.')
                );
                if !continues {
                    return &rest[..idx];
                }
            }
            c if c.is_whitespace() => {}
            c => last_significant = Some(c),
        }
    }
    rest
}

/// Splits on `separator` at bracket depth zero.
fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (idx, ch) in text.char_indices() {
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            c if c == separator && depth == 0 => {
                parts.push(&text[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Removes a `= initializer` suffix at depth zero, leaving the binding
/// target. `=>`, `==`, and compound operators are not initializers.
fn strip_initializer(declarator: &str) -> &str {
    let bytes = declarator.as_bytes();
    let mut depth = 0i32;
    for (idx, ch) in declarator.char_indices() {
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '=' if depth == 0 => {
                let next = bytes.get(idx + 1).copied();
                let prev = idx.checked_sub(1).and_then(|i| bytes.get(i)).copied();
                let compound = matches!(prev, Some(b'=' | b'!' | b'<' | b'>' | b'+' | b'-' | b'*' | b'/' | b'%'));
                if next != Some(b'=') && next != Some(b'>') && !compound {
                    return &declarator[..idx];
                }
            }
            _ => {}
        }
    }
    declarator
}

/// Recursively collects bound names from a binding target: a plain
/// identifier, an object pattern, or an array pattern.
fn collect_pattern(target: &str, names: &mut IndexSet<String>) {
    let target = target.trim();
    if target.is_empty() {
        return;
    }
    if let Some(inner) = enclosed(target, '{', '}') {
        for entry in split_top_level(inner, ',') {
            collect_object_entry(entry, names);
        }
    } else if let Some(inner) = enclosed(target, '[', ']') {
        for element in split_top_level(inner, ',') {
            let element = element.trim();
            if element.is_empty() {
                continue; // hole
            }
            let element = element.strip_prefix("...").unwrap_or(element);
            collect_pattern(strip_initializer(element), names);
        }
    } else if let Some(name) = leading_identifier(target) {
        if name.len() == target.len() {
            names.insert(name.to_owned());
        }
    }
}

/// Collects names from one object-pattern entry: shorthand (`a`), shorthand
/// with default (`a = 1`), rename (`a: b`), computed-key rename, or rest
/// (`...r`).
fn collect_object_entry(entry: &str, names: &mut IndexSet<String>) {
    let entry = entry.trim();
    if entry.is_empty() {
        return;
    }
    if let Some(rest) = entry.strip_prefix("...") {
        collect_pattern(strip_initializer(rest), names);
        return;
    }
    // A `:` at depth zero renames: the binding is on the right.
    let mut depth = 0i32;
    for (idx, ch) in entry.char_indices() {
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ':' if depth == 0 => {
                collect_pattern(strip_initializer(&entry[idx + 1..]), names);
                return;
            }
            _ => {}
        }
    }
    collect_pattern(strip_initializer(entry), names);
}

/// Returns the delimited interior when `text` is exactly `{...}`/`[...]`.
fn enclosed(text: &str, open: char, close: char) -> Option<&str> {
    let text = text.trim();
    if text.starts_with(open) && text.ends_with(close) && text.len() >= 2 {
        Some(&text[open.len_utf8()..text.len() - close.len_utf8()])
    } else {
        None
    }
}

/// Returns the identifier at the start of `text`, if any.
fn leading_identifier(text: &str) -> Option<&str> {
    let text = text.trim_start();
    let mut chars = text.char_indices();
    let (_, first) = chars.next()?;
    if !is_ident_start(first) {
        return None;
    }
    let end = chars.find(|&(_, c)| !is_ident_part(c)).map_or(text.len(), |(i, _)| i);
    Some(&text[..end])
}

/// Detects a top-level `await` and wraps the unit when one is present.
///
/// The depth counter increments when entering a `function`-keyword body or a
/// braced arrow body and decrements at its closing brace. The heuristic is
/// deliberately biased toward wrapping: an `await` inside a top-level `if`
/// or `try` block, or inside a class method, still marks the unit deferred —
/// wrapping a unit that never suspends is harmless, while failing to wrap a
/// genuinely suspending one would be a syntax error.
#[must_use]
pub fn wrap_unit(code: &str, declared: &IndexSet<String>) -> TransformedUnit {
    if !has_top_level_await(code) {
        return TransformedUnit {
            primary: code.to_owned(),
            fallback: None,
            deferred: false,
        };
    }

    let exports = if declared.is_empty() {
        String::new()
    } else {
        let list = declared.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
        format!("\nObject.assign(globalThis, {{ {list} }});")
    };

    let statement_mode = format!("(async () => {{\n{code}{exports}\n}})()");

    match trailing_expression_split(code) {
        Some((head, tail)) => {
            let primary = format!(
                "(async () => {{\n{head}\nconst __tidepool_completion__ = (\n{tail}\n);{exports}\nreturn \
                 __tidepool_completion__;\n}})()"
            );
            TransformedUnit {
                primary,
                fallback: Some(statement_mode),
                deferred: true,
            }
        }
        None => TransformedUnit {
            primary: statement_mode,
            fallback: None,
            deferred: true,
        },
    }
}

/// True when an `await` keyword appears outside every function body.
fn has_top_level_await(code: &str) -> bool {
    let blanked = blank_noncode(code);
    let mut state = ScanState::new();
    let mut chars = blanked.char_indices().peekable();
    let mut word_start: Option<usize> = None;
    let mut prev_significant: Option<char> = None;
    // One entry per open `{`; true when that brace opened a function body.
    let mut scopes: Vec<bool> = Vec::new();
    let mut fn_depth = 0usize;
    let mut pending_function = false;
    let mut pending_arrow = false;

    while let Some((idx, ch)) = chars.next() {
        let in_code = state.in_code();

        if in_code && is_ident_part(ch) {
            if word_start.is_none() && is_ident_start(ch) {
                word_start = Some(idx);
            }
        } else if let Some(start) = word_start.take() {
            let word = &blanked[start..idx];
            if in_code {
                match word {
                    "function" => pending_function = true,
                    "await" if fn_depth == 0 && prev_significant != Some('.') => return true,
                    _ => {}
                }
                prev_significant = word.chars().next_back();
            }
        }

        if in_code {
            match ch {
                '{' => {
                    let is_fn = pending_function || pending_arrow;
                    pending_function = false;
                    pending_arrow = false;
                    scopes.push(is_fn);
                    if is_fn {
                        fn_depth += 1;
                    }
                }
                '}' => {
                    if let Some(true) = scopes.pop() {
                        fn_depth = fn_depth.saturating_sub(1);
                    }
                }
                '>' if prev_significant == Some('=') => {
                    // `=>`: a braced body opens a deferred scope; an
                    // expression body does not (bounded misclassification).
                    pending_arrow = true;
                }
                c if c.is_whitespace() => {}
                _ => {
                    // Any other significant token between `=>` and a brace
                    // means the arrow body was an expression.
                    if pending_arrow && ch != '{' {
                        pending_arrow = false;
                    }
                    if pending_function && !matches!(ch, '(' | ')' | '*') {
                        // Parameter lists sit between `function` and `{`.
                        // Any other shape cancels the pending marker.
                        if !is_ident_part(ch) {
                            pending_function = false;
                        }
                    }
                }
            }
            if !ch.is_whitespace() && !is_ident_part(ch) {
                prev_significant = Some(ch);
            }
        }

        let next = chars.peek().map(|&(_, c)| c);
        state.feed(ch, next);
    }

    if let Some(start) = word_start {
        if state.in_code() && fn_depth == 0 && &blanked[start..] == "await" {
            return true;
        }
    }
    false
}

/// Splits the snippet before its final top-level statement when that
/// statement can be treated as a bare expression. Returns byte-aligned
/// slices of the original text.
fn trailing_expression_split(code: &str) -> Option<(&str, &str)> {
    let blanked = blank_noncode(code);
    let mut state = ScanState::new();
    let mut chars = blanked.char_indices().peekable();
    let mut last_boundary = 0usize;

    while let Some((idx, ch)) = chars.next() {
        let in_code = state.in_code();
        let depth = state.bracket_depth();
        let next = chars.peek().map(|&(_, c)| c);
        state.feed(ch, next);
        if !in_code {
            continue;
        }
        match ch {
            ';' if depth == 0 => last_boundary = idx + 1,
            // A `}` closing a top-level statement block also ends a statement.
            '}' if state.bracket_depth() == 0 && state.template_expr_depth() == 0 => last_boundary = idx + 1,
            _ => {}
        }
    }

    let tail = code[last_boundary..].trim();
    if tail.is_empty() {
        return None;
    }
    if let Some(first) = leading_identifier(tail) {
        if STATEMENT_KEYWORDS.contains(&first) {
            return None;
        }
    }
    Some((&code[..last_boundary], &code[last_boundary..]))
}

#[cfg(test)]
mod tests {
    use indexmap::IndexSet;
    use pretty_assertions::assert_eq;

    use super::*;

    fn names(code: &str) -> Vec<String> {
        extract_declared_names(code).into_iter().collect()
    }

    #[test]
    fn rewrites_top_level_let_and_const() {
        assert_eq!(make_persistent("let a = 1;"), "var a = 1;");
        assert_eq!(make_persistent("const b = 2;"), "var b = 2;");
        assert_eq!(make_persistent("let {x, y} = p;"), "var {x, y} = p;");
    }

    #[test]
    fn leaves_nested_declarations_alone() {
        let code = "if (x) { let a = 1; }";
        assert_eq!(make_persistent(code), code);
        let code = "function f() { const b = 2; }";
        assert_eq!(make_persistent(code), code);
    }

    #[test]
    fn keywords_in_literals_are_untouched() {
        let code = "let s = 'let x'; // const y\nvar t = `const ${1} let`;";
        let out = make_persistent(code);
        assert_eq!(out, "var s = 'let x'; // const y\nvar t = `const ${1} let`;");
    }

    #[test]
    fn idempotent() {
        let code = "let a = 1;\nconst b = { c: () => { let d = 2; } };";
        let once = make_persistent(code);
        assert_eq!(make_persistent(&once), once);
    }

    #[test]
    fn identifier_containing_keyword_is_untouched() {
        let code = "letter = 1; constant = 2; my_let = 3;";
        assert_eq!(make_persistent(code), code);
    }

    #[test]
    fn property_access_named_like_a_keyword_is_untouched() {
        assert_eq!(make_persistent("obj.let = 1;"), "obj.let = 1;");
        assert_eq!(make_persistent("obj?.const"), "obj?.const");
        // A real declaration on the next statement still rewrites.
        assert_eq!(make_persistent("obj.let = 1; let a = 2;"), "obj.let = 1; var a = 2;");
    }

    #[test]
    fn extracts_simple_declarations() {
        assert_eq!(names("let a = 1, b = 2;"), ["a", "b"]);
        assert_eq!(names("const c = f(1, 2);"), ["c"]);
        assert_eq!(names("function go() {}"), ["go"]);
        assert_eq!(names("class Point {}"), ["Point"]);
        assert_eq!(names("async function fetchIt() {}"), ["fetchIt"]);
        assert_eq!(names("function* gen() {}"), ["gen"]);
    }

    #[test]
    fn function_expressions_are_not_tracked() {
        assert_eq!(names("x = function helper() {};"), Vec::<String>::new());
        assert_eq!(names("run(function inner() {});"), Vec::<String>::new());
        // The declarator binds; the expression's name does not.
        assert_eq!(names("let cb = function named() {};"), ["cb"]);
    }

    #[test]
    fn extracts_object_destructuring() {
        assert_eq!(names("let {a, b: renamed, c = 3} = obj;"), ["a", "renamed", "c"]);
        assert_eq!(names("const {x: {y}, ...rest} = obj;"), ["y", "rest"]);
    }

    #[test]
    fn extracts_array_destructuring() {
        assert_eq!(names("let [first, , third = 9, ...tail] = arr;"), ["first", "third", "tail"]);
        assert_eq!(names("const [[a], [b, c]] = grid;"), ["a", "b", "c"]);
    }

    #[test]
    fn nested_pattern_with_rest_and_default_yields_leaf_names_only() {
        let got = names("let {a: [x = 1, ...ys], ...others} = data;");
        assert_eq!(got, ["x", "ys", "others"]);
    }

    #[test]
    fn declarations_in_literals_are_not_extracted() {
        assert_eq!(names("let a = 'let b = 1';"), ["a"]);
        assert_eq!(names("// let c\n/* const d */"), Vec::<String>::new());
    }

    #[test]
    fn nested_declarations_are_not_extracted() {
        assert_eq!(names("function f() { let inner = 1; }"), ["f"]);
    }

    #[test]
    fn sync_unit_passes_through() {
        let unit = wrap_unit("1 + 2", &IndexSet::new());
        assert_eq!(unit.primary, "1 + 2");
        assert_eq!(unit.fallback, None);
        assert!(!unit.deferred);
    }

    #[test]
    fn await_in_function_body_stays_sync() {
        let unit = wrap_unit("async function f() { await g(); }", &IndexSet::new());
        assert!(!unit.deferred);
        let unit = wrap_unit("const h = async () => { await g(); };", &IndexSet::new());
        assert!(!unit.deferred);
    }

    #[test]
    fn top_level_await_defers() {
        let unit = wrap_unit("await Promise.resolve(1)", &IndexSet::new());
        assert!(unit.deferred);
        assert!(unit.primary.starts_with("(async () => {"));
    }

    #[test]
    fn await_in_top_level_block_still_defers() {
        // The detector is biased toward wrapping.
        let unit = wrap_unit("try { await g(); } catch {}", &IndexSet::new());
        assert!(unit.deferred);
    }

    #[test]
    fn property_named_await_does_not_defer() {
        let unit = wrap_unit("promise.await;", &IndexSet::new());
        assert!(!unit.deferred);
    }

    #[test]
    fn deferred_unit_exports_declared_names() {
        let mut declared = IndexSet::new();
        declared.insert("a".to_owned());
        declared.insert("b".to_owned());
        let unit = wrap_unit("var a = await f();\nvar b = 2;", &IndexSet::from_iter(declared));
        assert!(unit.primary.contains("Object.assign(globalThis, { a, b });"));
    }

    #[test]
    fn deferred_trailing_expression_is_returned() {
        let unit = wrap_unit("var a = await f();\na + 1", &IndexSet::new());
        assert!(unit.deferred);
        assert!(unit.primary.contains("return __tidepool_completion__"));
        assert!(unit.fallback.is_some());
    }
}
