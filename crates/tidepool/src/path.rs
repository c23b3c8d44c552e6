//! Dotted/indexed object-path splitting and live-value resolution.
//!
//! Paths follow editor conventions: `a.b[0]['key']`. Resolution walks live
//! values by property access only; it never evaluates user expressions, and
//! any throwing accessor or missing intermediate degrades to `NotFound`.

use boa_engine::{Context, JsString, JsValue, property::PropertyKey};
use smallvec::SmallVec;

use crate::{context::TrackedVariableSet, inspect};

/// Segment list for one object path. Paths are short in practice.
pub type PathSegments = SmallVec<[String; 4]>;

/// Outcome of resolving a path against a live surface.
#[derive(Debug, Clone)]
pub enum Resolved {
    /// The path resolved to this value.
    Value(JsValue),
    /// Some segment was missing, inaccessible, or the path was malformed.
    NotFound,
}

/// Splits `a.b[0]['k']` into `["a", "b", "0", "k"]`.
///
/// Bracket segments may be single- or double-quoted (the quotes are
/// stripped) or bare index/key text. Returns `None` for malformed paths:
/// unbalanced brackets, unterminated quotes, or empty segments.
#[must_use]
pub fn split_path(path: &str) -> Option<PathSegments> {
    let mut segments = PathSegments::new();
    let mut chars = path.chars().peekable();
    let mut current = String::new();
    let mut pending_dot = false;

    while let Some(ch) = chars.next() {
        if ch != '.' {
            pending_dot = false;
        }
        match ch {
            '.' => {
                if current.is_empty() {
                    return None;
                }
                segments.push(std::mem::take(&mut current));
                pending_dot = true;
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                } else if segments.is_empty() {
                    // A path cannot start with an index.
                    return None;
                }
                segments.push(bracket_segment(&mut chars)?);
                // After `]` only `.`, `[`, or end may follow.
                match chars.peek() {
                    None | Some('[') => {}
                    Some('.') => {
                        chars.next();
                        if chars.peek().is_none() {
                            return None;
                        }
                    }
                    Some(_) => return None,
                }
            }
            c if crate::scan::is_ident_part(c) => current.push(c),
            _ => return None,
        }
    }

    if !current.is_empty() {
        segments.push(current);
    }
    if pending_dot || segments.is_empty() || segments.iter().any(String::is_empty) {
        None
    } else {
        Some(segments)
    }
}

/// Consumes one `[...]` segment, the opening bracket already eaten.
fn bracket_segment(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<String> {
    let mut segment = String::new();
    let quote = match chars.peek() {
        Some(&q @ ('\'' | '"')) => {
            chars.next();
            Some(q)
        }
        _ => None,
    };

    if let Some(quote) = quote {
        let mut escaped = false;
        loop {
            let ch = chars.next()?;
            if escaped {
                segment.push(ch);
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                break;
            } else {
                segment.push(ch);
            }
        }
        // Only the closing bracket may follow a quoted key.
        if chars.next()? != ']' {
            return None;
        }
        Some(segment)
    } else {
        // Bare segment: nested brackets are carried as text.
        let mut depth = 0usize;
        loop {
            let ch = chars.next()?;
            match ch {
                '[' => {
                    depth += 1;
                    segment.push(ch);
                }
                ']' if depth == 0 => break,
                ']' => {
                    depth -= 1;
                    segment.push(ch);
                }
                _ => segment.push(ch),
            }
        }
        if segment.is_empty() { None } else { Some(segment) }
    }
}

/// Resolves a path against the tracked set and the global surface.
///
/// The first segment must be a tracked variable or an existing global.
/// Subsequent segments use property access, with `Map` values looked up by
/// string key. Null or undefined intermediates, non-object primitives, and
/// throwing accessors all short-circuit to `NotFound`.
#[must_use]
pub fn resolve(path: &str, tracked: &TrackedVariableSet, context: &mut Context) -> Resolved {
    let Some(segments) = split_path(path) else {
        return Resolved::NotFound;
    };
    let mut segments = segments.into_iter();
    let Some(root) = segments.next() else {
        return Resolved::NotFound;
    };

    let global = context.global_object();
    let root_key = PropertyKey::from(JsString::from(root.as_str()));
    if !tracked.contains(&root) {
        match global.has_property(root_key.clone(), context) {
            Ok(true) => {}
            _ => return Resolved::NotFound,
        }
    }
    let Ok(mut current) = global.get(root_key, context) else {
        return Resolved::NotFound;
    };

    for segment in segments {
        if current.is_null_or_undefined() {
            return Resolved::NotFound;
        }
        current = match step(&current, &segment, context) {
            Some(next) => next,
            None => return Resolved::NotFound,
        };
    }
    Resolved::Value(current)
}

/// Resolves one segment against the current value.
fn step(current: &JsValue, segment: &str, context: &mut Context) -> Option<JsValue> {
    // Map entries are reached by key, not by property.
    if inspect::classify(current, context) == crate::inspect::ValueKind::Map {
        let key = JsValue::from(JsString::from(segment));
        let has = inspect::call_helper("mapHas", &[current.clone(), key.clone()], context)?;
        if has.as_boolean() == Some(true) {
            return inspect::call_helper("mapGet", &[current.clone(), key], context);
        }
        // Fall through to property access for Map methods and `size`.
    }

    let object = current.as_object()?.clone();
    let key = PropertyKey::from(JsString::from(segment));
    match object.has_property(key.clone(), context) {
        Ok(true) => object.get(key, context).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parts(path: &str) -> Option<Vec<String>> {
        split_path(path).map(|segments| segments.into_iter().collect())
    }

    #[test]
    fn splits_dotted_paths() {
        assert_eq!(parts("a"), Some(vec!["a".to_owned()]));
        assert_eq!(parts("a.b.c"), Some(vec!["a".to_owned(), "b".to_owned(), "c".to_owned()]));
    }

    #[test]
    fn splits_indexed_and_quoted_segments() {
        assert_eq!(
            parts("a.b[0]['k']"),
            Some(vec!["a".to_owned(), "b".to_owned(), "0".to_owned(), "k".to_owned()])
        );
        assert_eq!(
            parts(r#"data["dotted.key"]"#),
            Some(vec!["data".to_owned(), "dotted.key".to_owned()])
        );
    }

    #[test]
    fn nested_bare_brackets_stay_one_segment() {
        assert_eq!(parts("a[b[0]]"), Some(vec!["a".to_owned(), "b[0]".to_owned()]));
    }

    #[test]
    fn malformed_paths_are_rejected() {
        assert_eq!(parts(""), None);
        assert_eq!(parts(".a"), None);
        assert_eq!(parts("a..b"), None);
        assert_eq!(parts("a["), None);
        assert_eq!(parts("a['k"), None);
        assert_eq!(parts("[0]"), None);
        assert_eq!(parts("a.b."), None);
        assert_eq!(parts("a[0]x"), None);
    }
}
