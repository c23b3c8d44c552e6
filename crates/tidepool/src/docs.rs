//! Best-effort descriptions for hover detail level 1.
//!
//! Two sources, tried in order: a doc comment archived alongside the snippet
//! that declared the name, then a static table of well-known builtin
//! members. Both are lookups only; nothing here touches live values.

use std::sync::OnceLock;

use regex::Regex;

/// Static descriptions for well-known builtin members, sorted by key.
const BUILTIN_DOCS: &[(&str, &str)] = &[
    ("Array.from", "Creates a new array from an iterable or array-like value."),
    ("Array.isArray", "Returns true when the argument is an array."),
    ("Date.now", "Returns the current time in milliseconds since the epoch."),
    ("JSON.parse", "Parses a JSON string into a value."),
    ("JSON.stringify", "Serializes a value to a JSON string."),
    ("Math.abs", "Returns the absolute value of a number."),
    ("Math.ceil", "Rounds a number up to the nearest integer."),
    ("Math.floor", "Rounds a number down to the nearest integer."),
    ("Math.max", "Returns the largest of the given numbers."),
    ("Math.min", "Returns the smallest of the given numbers."),
    ("Math.random", "Returns a pseudo-random number in [0, 1)."),
    ("Math.round", "Rounds a number to the nearest integer."),
    ("Number.isFinite", "Returns true for finite numbers, with no coercion."),
    ("Number.isInteger", "Returns true when the argument is an integer."),
    ("Object.assign", "Copies enumerable own properties onto a target object."),
    ("Object.entries", "Returns an array of a value's own [key, value] pairs."),
    ("Object.freeze", "Makes an object immutable and returns it."),
    ("Object.keys", "Returns an array of a value's own enumerable keys."),
    ("Object.values", "Returns an array of a value's own enumerable values."),
    ("Promise.all", "Resolves when every given promise resolves, or rejects on the first rejection."),
    ("Promise.race", "Settles as soon as any given promise settles."),
    ("Promise.reject", "Returns a promise rejected with the given reason."),
    ("Promise.resolve", "Returns a promise resolved with the given value."),
    ("console.error", "Writes a message to the error output group."),
    ("console.info", "Writes an informational message to the output."),
    ("console.log", "Writes a message to the output."),
    ("console.warn", "Writes a warning to the error output group."),
    ("display", "Queues a rich-output payload (optional MIME type) onto the current execution result."),
    ("parseFloat", "Parses a string into a floating-point number."),
    ("parseInt", "Parses a string into an integer, with an optional radix."),
];

/// Looks up a static description for a builtin member path.
#[must_use]
pub fn builtin_doc(path: &str) -> Option<&'static str> {
    BUILTIN_DOCS
        .binary_search_by(|(key, _)| (*key).cmp(path))
        .ok()
        .map(|idx| BUILTIN_DOCS[idx].1)
}

/// Finds a `/** ... */` doc comment adjacent to a declaration of `name` in
/// previously executed snippets. Later snippets win, matching rebinding
/// semantics.
#[must_use]
pub fn doc_from_archive(archive: &[String], name: &str) -> Option<String> {
    let pattern = declaration_pattern(name)?;
    for snippet in archive.iter().rev() {
        if let Some(caps) = pattern.captures(snippet) {
            if let Some(body) = caps.get(1) {
                let cleaned = clean_doc_comment(body.as_str());
                if !cleaned.is_empty() {
                    return Some(cleaned);
                }
            }
        }
    }
    None
}

/// Recovers the source text of a declaration of `name` from previously
/// executed snippets. Later snippets win. The engine does not retain script
/// source (`Function.prototype.toString` reports `[native code]`), so hover
/// detail level 2 reads definitions back from here.
#[must_use]
pub fn source_from_archive(archive: &[String], name: &str) -> Option<String> {
    let pattern = source_pattern(name)?;
    for snippet in archive.iter().rev() {
        if let Some(m) = pattern.find(snippet) {
            if let Some(text) = definition_text(&snippet[m.start()..]) {
                return Some(text);
            }
        }
    }
    None
}

/// Builds the declaration-start pattern for one name: function and class
/// declarations, or a `var`/`let`/`const` binding to a function expression
/// or arrow.
fn source_pattern(name: &str) -> Option<Regex> {
    if name.is_empty() || !name.chars().all(|c| crate::scan::is_ident_part(c)) {
        return None;
    }
    let escaped = regex::escape(name);
    Regex::new(&format!(
        r"(?:async\s+)?function\s*\*?\s*{escaped}\s*\(|class\s+{escaped}\b|(?:var|let|const)\s+{escaped}\s*="
    ))
    .ok()
}

/// Slices one definition out of `text`: through the matching `}` of the body
/// brace, or up to the statement-ending `;` for brace-less arrows. Falls back
/// to the rest of the snippet when neither boundary appears.
fn definition_text(text: &str) -> Option<String> {
    let mut state = crate::scan::ScanState::new();
    let mut chars = text.char_indices().peekable();
    let mut opened = false;
    while let Some((idx, ch)) = chars.next() {
        let in_code = state.in_code();
        let next = chars.peek().map(|&(_, c)| c);
        state.feed(ch, next);
        if !in_code {
            continue;
        }
        match ch {
            '{' => opened = true,
            '}' if opened && state.brace_depth() == 0 && state.bracket_depth() == 0 => {
                return Some(text[..=idx].to_owned());
            }
            ';' if state.brace_depth() == 0 && state.bracket_depth() == 0 => {
                return Some(text[..idx].trim_end().to_owned());
            }
            _ => {}
        }
    }
    let tail = text.trim_end();
    if tail.is_empty() { None } else { Some(tail.to_owned()) }
}

/// Builds the doc-comment-plus-declaration pattern for one name.
fn declaration_pattern(name: &str) -> Option<Regex> {
    if name.is_empty() || !name.chars().all(|c| crate::scan::is_ident_part(c)) {
        return None;
    }
    let escaped = regex::escape(name);
    Regex::new(&format!(
        r"(?s)/\*\*(.*?)\*/\s*(?:export\s+)?(?:async\s+)?(?:var|let|const|function\s*\*?|class)\s+{escaped}\b"
    ))
    .ok()
}

/// Strips comment framing: leading `*` gutters and surrounding whitespace.
fn clean_doc_comment(body: &str) -> String {
    static GUTTER: OnceLock<Regex> = OnceLock::new();
    let gutter = GUTTER.get_or_init(|| Regex::new(r"(?m)^\s*\*\s?").expect("static pattern compiles"));
    gutter.replace_all(body, "").trim().to_owned()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn builtin_table_is_sorted() {
        let keys: Vec<&str> = BUILTIN_DOCS.iter().map(|(k, _)| *k).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted, "binary search requires a sorted table");
    }

    #[test]
    fn builtin_lookup_hits_and_misses() {
        assert!(builtin_doc("JSON.parse").is_some());
        assert!(builtin_doc("JSON.explode").is_none());
    }

    #[test]
    fn archive_doc_comment_is_found_and_cleaned() {
        let archive = vec!["/**\n * Adds two numbers.\n * Returns their sum.\n */\nfunction add(a, b) { return a + b; }".to_owned()];
        let doc = doc_from_archive(&archive, "add");
        assert_eq!(doc.as_deref(), Some("Adds two numbers.\nReturns their sum."));
    }

    #[test]
    fn later_snippets_shadow_earlier_docs() {
        let archive = vec![
            "/** Old meaning. */\nconst v = 1;".to_owned(),
            "/** New meaning. */\nconst v = 2;".to_owned(),
        ];
        assert_eq!(doc_from_archive(&archive, "v").as_deref(), Some("New meaning."));
    }

    #[test]
    fn source_is_recovered_from_the_archive() {
        let archive = vec!["function twice(v) { return v * 2; }".to_owned()];
        let src = source_from_archive(&archive, "twice");
        assert_eq!(src.as_deref(), Some("function twice(v) { return v * 2; }"));
    }

    #[test]
    fn arrow_bindings_slice_to_the_statement_end() {
        let archive = vec!["const inc = (n) => n + 1;\nconsole.log(inc(1));".to_owned()];
        assert_eq!(source_from_archive(&archive, "inc").as_deref(), Some("const inc = (n) => n + 1"));
    }

    #[test]
    fn later_definitions_shadow_earlier_source() {
        let archive = vec![
            "function f() { return 1; }".to_owned(),
            "function f() { return 2; }".to_owned(),
        ];
        assert_eq!(source_from_archive(&archive, "f").as_deref(), Some("function f() { return 2; }"));
    }

    #[test]
    fn undeclared_names_have_no_source() {
        let archive = vec!["let a = 1;".to_owned()];
        assert_eq!(source_from_archive(&archive, "parseInt"), None);
    }

    #[test]
    fn unrelated_names_do_not_match() {
        let archive = vec!["/** Doc. */\nconst value = 1;".to_owned()];
        assert_eq!(doc_from_archive(&archive, "val"), None);
    }
}
