//! Cursor-context completion over live session values.
//!
//! The cursor position arrives in UTF-16 units (editor convention) and is
//! converted at this boundary. Context classification is a small backwards
//! grammar over the scanner's region map: completion is suppressed inside
//! strings and comments, member completion fires after `.` or an open `[`,
//! everything else is global completion.

use boa_engine::{Context, JsValue};

use crate::{
    context::TrackedVariableSet,
    inspect::helper_json,
    path::{self, Resolved},
    scan::{self, RegionKind},
};

/// Maximum completion items returned per request.
pub const MAX_COMPLETIONS: usize = 50;
/// Prototype-chain walk cap for member completion.
const MAX_PROTOTYPE_DEPTH: u32 = 5;

/// Rank tier for tracked session variables.
const PRIORITY_TRACKED: u8 = 10;
/// Rank tier for curated common globals.
const PRIORITY_GLOBAL: u8 = 40;
/// Rank tier for language keywords.
const PRIORITY_KEYWORD: u8 = 60;

/// Curated globals offered in global completion.
const COMMON_GLOBALS: &[&str] = &[
    "Array", "BigInt", "Boolean", "Date", "Error", "Infinity", "JSON", "Map", "Math", "NaN", "Number", "Object",
    "Promise", "Proxy", "Reflect", "RegExp", "Set", "String", "Symbol", "WeakMap", "WeakSet", "console",
    "decodeURIComponent", "display", "encodeURIComponent", "globalThis", "isFinite", "isNaN", "parseFloat",
    "parseInt", "undefined",
];

/// Keywords offered in global completion.
const KEYWORDS: &[&str] = &[
    "async", "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "extends", "false", "finally", "for", "function", "if", "import", "in", "instanceof", "let", "new",
    "null", "of", "return", "static", "switch", "this", "throw", "true", "try", "typeof", "var", "void", "while",
    "yield",
];

/// What kind of entity a completion item names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CompletionKind {
    /// A tracked session variable.
    Variable,
    /// A data property on the completed object.
    Property,
    /// A callable property on the completed object.
    Method,
    /// A curated global binding.
    Global,
    /// A language keyword.
    Keyword,
}

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CompletionItem {
    /// Insertion text.
    pub label: String,
    /// Entity kind.
    pub kind: CompletionKind,
    /// Rank tier; lower sorts first.
    pub priority: u8,
}

/// Classified cursor position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorContext {
    /// Completing a top-level identifier; `prefix` is the partial word.
    Global { prefix: String },
    /// Completing a member after `.` or `[` on the object at `path`.
    Member { path: String, prefix: String },
    /// Inside a string or comment; no completion.
    Suppressed,
}

/// Classifies the cursor position within a snippet.
///
/// `cursor` is a UTF-16 offset. A cursor inside a string, template text, or
/// comment suppresses completion (template expressions stay live).
#[must_use]
pub fn cursor_context(source: &str, cursor: usize) -> CursorContext {
    let offset = scan::utf16_to_byte_offset(source, cursor);
    let before = &source[..offset];

    match scan::region_at(source, offset.saturating_sub(1).min(source.len().saturating_sub(1))) {
        RegionKind::Code => {}
        RegionKind::String | RegionKind::Template | RegionKind::LineComment | RegionKind::BlockComment
        | RegionKind::Regex => {
            if offset > 0 {
                return CursorContext::Suppressed;
            }
        }
    }

    let prefix_start = before
        .char_indices()
        .rev()
        .take_while(|&(_, c)| scan::is_ident_part(c))
        .last()
        .map_or(before.len(), |(i, _)| i);
    let prefix = before[prefix_start..].to_owned();
    let head = before[..prefix_start].trim_end();

    if let Some(rest) = head.strip_suffix('.') {
        if let Some(path) = trailing_path(rest) {
            return CursorContext::Member { path, prefix };
        }
        return CursorContext::Suppressed;
    }
    if let Some(rest) = head.strip_suffix('[') {
        // Bracket member completion only when the prefix is not a literal.
        if !prefix.is_empty() && prefix.chars().next().is_some_and(char::is_numeric) {
            return CursorContext::Global { prefix };
        }
        if let Some(path) = trailing_path(rest) {
            return CursorContext::Member { path, prefix };
        }
    }

    CursorContext::Global { prefix }
}

/// Extracts the object path ending at the end of `text`, if any.
fn trailing_path(text: &str) -> Option<String> {
    let trimmed = text.trim_end();
    let start = trimmed
        .char_indices()
        .rev()
        .take_while(|&(_, c)| scan::is_ident_part(c) || matches!(c, '.' | '[' | ']' | '\'' | '"'))
        .last()
        .map(|(i, _)| i)?;
    let candidate = &trimmed[start..];
    path::split_path(candidate).map(|_| candidate.to_owned())
}

/// Produces ranked completion items for a cursor position.
///
/// Member completion lists own properties of the resolved object plus a
/// prototype-chain walk capped at five levels, de-duplicated and tagged by
/// runtime type. Global completion merges tracked variables, curated common
/// globals, and keywords. Filtering is a case-sensitive prefix match; results
/// sort by `(priority, label)` and cap at [`MAX_COMPLETIONS`].
#[must_use]
pub fn complete(
    source: &str,
    cursor: usize,
    tracked: &TrackedVariableSet,
    context: &mut Context,
) -> Vec<CompletionItem> {
    let mut items = match cursor_context(source, cursor) {
        CursorContext::Suppressed => return Vec::new(),
        CursorContext::Member { path, prefix } => member_items(&path, &prefix, tracked, context),
        CursorContext::Global { prefix } => global_items(&prefix, tracked),
    };

    items.sort_by(|a, b| (a.priority, a.label.as_str()).cmp(&(b.priority, b.label.as_str())));
    items.truncate(MAX_COMPLETIONS);
    items
}

/// Member completion against a resolved live object.
fn member_items(
    path: &str,
    prefix: &str,
    tracked: &TrackedVariableSet,
    context: &mut Context,
) -> Vec<CompletionItem> {
    let Resolved::Value(value) = path::resolve(path, tracked, context) else {
        return Vec::new();
    };
    let Some(members) = helper_json(
        "memberNamesJson",
        &[value, JsValue::from(MAX_PROTOTYPE_DEPTH)],
        context,
    ) else {
        return Vec::new();
    };
    let Some(entries) = members.as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let name = entry.get("name")?.as_str()?;
            if !name.starts_with(prefix) || !name.chars().next().is_some_and(scan::is_ident_start) {
                return None;
            }
            let kind = if entry.get("kind")?.as_str()? == "method" {
                CompletionKind::Method
            } else {
                CompletionKind::Property
            };
            Some(CompletionItem {
                label: name.to_owned(),
                kind,
                priority: PRIORITY_TRACKED,
            })
        })
        .collect()
}

/// Global completion from tracked variables, curated globals, and keywords.
fn global_items(prefix: &str, tracked: &TrackedVariableSet) -> Vec<CompletionItem> {
    let mut items = Vec::new();
    for name in tracked.names() {
        if name.starts_with(prefix) {
            items.push(CompletionItem {
                label: name.to_owned(),
                kind: CompletionKind::Variable,
                priority: PRIORITY_TRACKED,
            });
        }
    }
    for &name in COMMON_GLOBALS {
        if name.starts_with(prefix) && !tracked.contains(name) {
            items.push(CompletionItem {
                label: name.to_owned(),
                kind: CompletionKind::Global,
                priority: PRIORITY_GLOBAL,
            });
        }
    }
    for &name in KEYWORDS {
        if name.starts_with(prefix) {
            items.push(CompletionItem {
                label: name.to_owned(),
                kind: CompletionKind::Keyword,
                priority: PRIORITY_KEYWORD,
            });
        }
    }
    items
}

/// Returns the identifier chain under the cursor, for hover requests.
///
/// Unlike completion this extends through the whole word the cursor sits on,
/// not just the text before it.
#[must_use]
pub fn path_at_cursor(source: &str, cursor: usize) -> Option<String> {
    let offset = scan::utf16_to_byte_offset(source, cursor);
    if !matches!(
        scan::region_at(source, offset.min(source.len().saturating_sub(1))),
        RegionKind::Code
    ) {
        return None;
    }

    let end = source[offset..]
        .char_indices()
        .find(|&(_, c)| !scan::is_ident_part(c))
        .map_or(source.len(), |(i, _)| offset + i);
    trailing_path(&source[..end])
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn global_context_with_prefix() {
        let ctx = cursor_context("myV", 3);
        assert_eq!(
            ctx,
            CursorContext::Global {
                prefix: "myV".to_owned()
            }
        );
    }

    #[test]
    fn member_context_after_dot() {
        let ctx = cursor_context("user.na", 7);
        assert_eq!(
            ctx,
            CursorContext::Member {
                path: "user".to_owned(),
                prefix: "na".to_owned()
            }
        );
    }

    #[test]
    fn member_context_through_chain() {
        let ctx = cursor_context("data.items[0].", 14);
        assert_eq!(
            ctx,
            CursorContext::Member {
                path: "data.items[0]".to_owned(),
                prefix: String::new()
            }
        );
    }

    #[test]
    fn suppressed_inside_string() {
        assert_eq!(cursor_context("'hello wo", 9), CursorContext::Suppressed);
        assert_eq!(cursor_context("// comment te", 13), CursorContext::Suppressed);
    }

    #[test]
    fn template_expression_stays_live() {
        let src = "`value: ${na";
        assert_eq!(
            cursor_context(src, src.len()),
            CursorContext::Global {
                prefix: "na".to_owned()
            }
        );
    }

    #[test]
    fn tracked_variables_outrank_globals_and_keywords() {
        let mut tracked = TrackedVariableSet::default();
        tracked.insert("myVar");
        let items = global_items("my", &tracked);
        assert_eq!(items[0].label, "myVar");
        assert_eq!(items[0].priority, PRIORITY_TRACKED);
    }

    #[test]
    fn keyword_and_global_tiers() {
        let tracked = TrackedVariableSet::default();
        let mut items = global_items("c", &tracked);
        items.sort_by(|a, b| (a.priority, a.label.as_str()).cmp(&(b.priority, b.label.as_str())));
        let console = items.iter().find(|i| i.label == "console");
        let keyword = items.iter().find(|i| i.label == "const");
        assert_eq!(console.map(|i| i.priority), Some(PRIORITY_GLOBAL));
        assert_eq!(keyword.map(|i| i.priority), Some(PRIORITY_KEYWORD));
    }

    #[test]
    fn prefix_filter_is_case_sensitive() {
        let tracked = TrackedVariableSet::default();
        let items = global_items("json", &tracked);
        assert!(!items.iter().any(|i| i.label == "JSON"));
    }

    #[test]
    fn path_under_cursor_extends_right() {
        assert_eq!(path_at_cursor("user.name + 1", 6), Some("user.name".to_owned()));
    }

    #[test]
    fn path_under_cursor_suppressed_in_string() {
        assert_eq!(path_at_cursor("'user.name'", 3), None);
    }
}
