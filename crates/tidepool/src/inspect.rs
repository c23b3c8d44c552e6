//! Runtime value inspection: kind classification, bounded previews, hover.
//!
//! Rendering walks live values through a helper object the runtime prelude
//! installs on every surface (`__tidepool__`). The helpers are total: they
//! catch throwing accessors and serialization failures internally and fall
//! back to primitive stringification, so inspection never propagates a
//! script error.

use boa_engine::{Context, JsString, JsValue, js_string, property::PropertyKey};

use crate::{context::TrackedVariableSet, docs, path};

/// Preview string cap for hover output.
pub const HOVER_STRING_CAP: usize = 500;
/// Preview string cap for full inspect output.
pub const INSPECT_STRING_CAP: usize = 1_000;

/// Runtime kind of an inspected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Undefined,
    Null,
    Boolean,
    Number,
    Bigint,
    String,
    Symbol,
    Function,
    /// Arrow function (no own `this`).
    Arrow,
    Class,
    Generator,
    Array,
    Map,
    Set,
    Date,
    Regexp,
    Error,
    Promise,
    Object,
}

impl ValueKind {
    /// True for kinds whose contents can be listed entry by entry.
    #[must_use]
    pub fn is_expandable(self) -> bool {
        matches!(self, Self::Array | Self::Map | Self::Set | Self::Object | Self::Error)
    }
}

/// A value captured from the engine with its rendered preview.
#[derive(Debug, Clone)]
pub struct ValueSnapshot {
    /// Live engine handle. Valid for the lifetime of the surface.
    pub handle: JsValue,
    /// Runtime kind.
    pub kind: ValueKind,
    /// Bounded, cycle-safe preview text.
    pub preview: String,
}

/// Hover/inspect payload for the value under a cursor.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HoverInfo {
    /// The resolved expression path.
    pub path: String,
    /// Runtime kind.
    pub kind: ValueKind,
    /// Type line, e.g. `number` or `Array(3)`.
    pub type_line: String,
    /// Bounded preview of the value.
    pub preview: String,
    /// Description text, present at detail level 1 and above.
    pub description: Option<String>,
    /// Raw source text, present at detail level 2 for script functions.
    pub source: Option<String>,
}

/// Detail level for hover responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DetailLevel {
    /// Type/signature only.
    Type,
    /// Type plus description.
    Description,
    /// Type, description, and raw source when available.
    Source,
}

// =============================================================================
// Prelude helper access
// =============================================================================

/// Calls a function on the `__tidepool__` helper object.
///
/// Returns `None` when the helper is missing (surface not initialized by this
/// kernel) or the call throws; callers degrade to not-found markers.
pub(crate) fn call_helper(name: &str, args: &[JsValue], context: &mut Context) -> Option<JsValue> {
    let global = context.global_object();
    let helper = global.get(js_string!("__tidepool__"), context).ok()?;
    let helper = helper.as_object()?.clone();
    let func = helper.get(PropertyKey::from(JsString::from(name)), context).ok()?;
    let func = func.as_callable()?.clone();
    func.call(&JsValue::undefined(), args, context).ok()
}

/// Calls a helper returning a string.
pub(crate) fn helper_string(name: &str, args: &[JsValue], context: &mut Context) -> Option<String> {
    let value = call_helper(name, args, context)?;
    let text = value.as_string()?;
    Some(text.to_std_string_escaped())
}

/// Calls a helper returning a JSON-encoded payload.
pub(crate) fn helper_json(name: &str, args: &[JsValue], context: &mut Context) -> Option<serde_json::Value> {
    let text = helper_string(name, args, context)?;
    serde_json::from_str(&text).ok()
}

// =============================================================================
// Kind / preview / snapshot
// =============================================================================

/// Classifies the runtime kind of a live value.
#[must_use]
pub fn classify(value: &JsValue, context: &mut Context) -> ValueKind {
    // Cheap structural cases without a helper round-trip.
    if value.is_undefined() {
        return ValueKind::Undefined;
    }
    if value.is_null() {
        return ValueKind::Null;
    }
    helper_string("kindOf", &[value.clone()], context)
        .and_then(|kind| kind.parse().ok())
        .unwrap_or(ValueKind::Object)
}

/// Renders the default bounded preview (depth 2, 10 items per container,
/// strings capped at 100 characters).
#[must_use]
pub fn preview(value: &JsValue, context: &mut Context) -> String {
    helper_string("preview", &[value.clone()], context).unwrap_or_else(|| fallback_preview(value))
}

/// Captures kind and preview for a value in one snapshot.
#[must_use]
pub fn snapshot(value: &JsValue, context: &mut Context) -> ValueSnapshot {
    ValueSnapshot {
        handle: value.clone(),
        kind: classify(value, context),
        preview: preview(value, context),
    }
}

/// Last-resort preview when the helper is unavailable.
fn fallback_preview(value: &JsValue) -> String {
    if value.is_undefined() {
        "undefined".to_owned()
    } else if value.is_null() {
        "null".to_owned()
    } else if let Some(b) = value.as_boolean() {
        b.to_string()
    } else if let Some(n) = value.as_number() {
        n.to_string()
    } else if let Some(s) = value.as_string() {
        format!("{:?}", s.to_std_string_escaped())
    } else {
        "<unprintable>".to_owned()
    }
}

/// Reports the element/entry/key count of a container, when it has one.
#[must_use]
pub fn size_of(value: &JsValue, context: &mut Context) -> Option<usize> {
    let size = call_helper("sizeOf", &[value.clone()], context)?;
    let size = size.as_number()?;
    if size < 0.0 { None } else { Some(size as usize) }
}

// =============================================================================
// Hover
// =============================================================================

/// Resolves the expression path and builds a hover payload.
///
/// Returns `None` when the path does not resolve. Detail levels add to the
/// base type line: `Description` consults doc comments archived with
/// executed snippets and the builtin documentation table; `Source` adds the
/// function's own text when the engine can produce it.
#[must_use]
pub fn hover(
    expr_path: &str,
    detail: DetailLevel,
    tracked: &TrackedVariableSet,
    archive: &[String],
    context: &mut Context,
) -> Option<HoverInfo> {
    let path::Resolved::Value(value) = path::resolve(expr_path, tracked, context) else {
        return None;
    };

    let kind = classify(&value, context);
    let preview_cap = if detail >= DetailLevel::Source {
        INSPECT_STRING_CAP
    } else {
        HOVER_STRING_CAP
    };
    let preview = helper_string(
        "previewCapped",
        &[value.clone(), JsValue::from(preview_cap as u32)],
        context,
    )
    .unwrap_or_else(|| fallback_preview(&value));

    let name = expr_path.rsplit('.').next().unwrap_or(expr_path);
    let type_line = type_line(kind, &value, name, archive, context);

    let description = (detail >= DetailLevel::Description)
        .then(|| {
            docs::doc_from_archive(archive, name).or_else(|| docs::builtin_doc(expr_path).map(str::to_owned))
        })
        .flatten();

    let source = (detail >= DetailLevel::Source && matches!(kind, ValueKind::Function | ValueKind::Arrow | ValueKind::Class | ValueKind::Generator))
        .then(|| script_source(&value, name, archive, context))
        .flatten();

    Some(HoverInfo {
        path: expr_path.to_owned(),
        kind,
        type_line,
        preview,
        description,
        source,
    })
}

/// The source text of a script-defined function, when it can be recovered.
///
/// The engine's `toString` reports `[native code]` for every function,
/// script-defined ones included, so the archived snippets are the real
/// source of truth; the helper call stays first for engines that do retain
/// text.
fn script_source(value: &JsValue, name: &str, archive: &[String], context: &mut Context) -> Option<String> {
    helper_string("sourceOf", &[value.clone()], context)
        .filter(|src| !src.contains("[native code]"))
        .or_else(|| docs::source_from_archive(archive, name))
}

/// Builds the one-line type summary shown at every detail level.
fn type_line(kind: ValueKind, value: &JsValue, name: &str, archive: &[String], context: &mut Context) -> String {
    match kind {
        ValueKind::Array => match size_of(value, context) {
            Some(len) => format!("Array({len})"),
            None => "Array".to_owned(),
        },
        ValueKind::Map => match size_of(value, context) {
            Some(len) => format!("Map({len})"),
            None => "Map".to_owned(),
        },
        ValueKind::Set => match size_of(value, context) {
            Some(len) => format!("Set({len})"),
            None => "Set".to_owned(),
        },
        ValueKind::Function | ValueKind::Arrow | ValueKind::Generator | ValueKind::Class => {
            signature_line(kind, value, name, archive, context)
        }
        other => other.to_string(),
    }
}

/// Extracts a signature line from a function's recovered source text.
fn signature_line(kind: ValueKind, value: &JsValue, name: &str, archive: &[String], context: &mut Context) -> String {
    let Some(source) = script_source(value, name, archive, context) else {
        return kind.to_string();
    };
    // First line up to the body brace reads as the signature.
    let head = source.split('{').next().unwrap_or(&source).trim();
    if head.is_empty() {
        kind.to_string()
    } else {
        head.lines().next().unwrap_or(head).trim().to_owned()
    }
}
