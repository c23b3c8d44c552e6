//! Variable-explorer listings over the tracked set.
//!
//! Listing reads only through the tracked set, never by enumerating the
//! global surface, so engine internals and prelude helpers stay invisible.
//! Expansion walks one container level with a bounded entry count and a
//! synthetic tail marker when entries were elided.

use boa_engine::{Context, JsValue};

use crate::{
    context::TrackedVariableSet,
    inspect::{self, ValueKind, helper_json},
    path::{self, Resolved},
};

/// Default entry cap for one expansion level.
pub const DEFAULT_EXPANSION_LIMIT: usize = 100;

/// One row in a variable listing or expansion.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct VariableInfo {
    /// Variable name, or entry key/index inside an expansion.
    pub name: String,
    /// Runtime kind tag.
    pub kind: ValueKind,
    /// Bounded preview text.
    pub preview: String,
    /// Element/entry count for containers.
    pub size: Option<usize>,
    /// True when the row can be expanded another level.
    pub expandable: bool,
}

/// Lists tracked variables with live type tags and previews, sorted by name.
///
/// Tracked names whose binding has since been deleted from the surface are
/// skipped rather than reported as errors.
#[must_use]
pub fn list(tracked: &TrackedVariableSet, context: &mut Context) -> Vec<VariableInfo> {
    let mut rows: Vec<VariableInfo> = tracked
        .names()
        .filter_map(|name| describe_path(name, tracked, context))
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    rows
}

/// Describes one tracked variable, when it still resolves.
#[must_use]
pub fn describe_path(path: &str, tracked: &TrackedVariableSet, context: &mut Context) -> Option<VariableInfo> {
    let Resolved::Value(value) = path::resolve(path, tracked, context) else {
        return None;
    };
    Some(describe_value(path.to_owned(), &value, context))
}

fn describe_value(name: String, value: &JsValue, context: &mut Context) -> VariableInfo {
    let kind = inspect::classify(value, context);
    VariableInfo {
        name,
        kind,
        preview: inspect::preview(value, context),
        size: inspect::size_of(value, context),
        expandable: kind.is_expandable(),
    }
}

/// Expands one container level of the value at `path`.
///
/// Returns at most `limit` real entries; when the container holds more, a
/// synthetic final row reading "N more items" is appended, so a 150-element
/// array expanded with the default cap yields 101 rows. Returns `None` when
/// the path does not resolve or the value is not expandable.
#[must_use]
pub fn expand(
    path: &str,
    limit: usize,
    tracked: &TrackedVariableSet,
    context: &mut Context,
) -> Option<Vec<VariableInfo>> {
    let Resolved::Value(value) = path::resolve(path, tracked, context) else {
        return None;
    };
    if !inspect::classify(&value, context).is_expandable() {
        return None;
    }

    let payload = helper_json("entriesJson", &[value, JsValue::from(limit as u32)], context)?;
    let total = payload.get("total")?.as_u64()? as usize;
    let entries = payload.get("entries")?.as_array()?;

    let mut rows: Vec<VariableInfo> = entries
        .iter()
        .filter_map(|entry| {
            Some(VariableInfo {
                name: entry.get("key")?.as_str()?.to_owned(),
                kind: entry.get("kind")?.as_str()?.parse().ok().unwrap_or(ValueKind::Object),
                preview: entry.get("preview")?.as_str()?.to_owned(),
                size: entry.get("size")?.as_i64().filter(|&s| s >= 0).map(|s| s as usize),
                expandable: entry.get("expandable")?.as_bool().unwrap_or(false),
            })
        })
        .collect();

    if total > rows.len() {
        let remaining = total - rows.len();
        rows.push(VariableInfo {
            name: format!("{remaining} more items"),
            kind: ValueKind::String,
            preview: String::new(),
            size: None,
            expandable: false,
        });
    }
    Some(rows)
}
