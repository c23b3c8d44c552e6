//! Execution contexts: the per-session global surface and its pipeline.
//!
//! An `ExecutionContext` owns (Isolated) or borrows (Shared) an engine
//! surface, rewrites each submitted snippet for persistence, evaluates it,
//! and packages the completion value, captured console output, rich output,
//! and any thrown error into an `ExecutionResult`. Introspection queries
//! (completion, hover, variable listing) resolve against the same surface
//! between executions.

use std::{
    cell::RefCell,
    rc::Rc,
    time::{Duration, Instant},
};

use boa_engine::{
    Context, JsError, JsValue, Source, builtins::promise::PromiseState, js_string, object::builtins::JsPromise,
    property::Attribute,
};
use boa_runtime::Console;
use indexmap::IndexSet;
use uuid::Uuid;

use crate::{
    complete::{self, CompletionItem},
    error::{ExecutionError, KernelError, is_parse_failure},
    inspect::{self, DetailLevel, HoverInfo, ValueSnapshot},
    io::{BufferLogger, LogBuffer, LogEntry},
    resource::{ResourceError, ResourceLimits},
    transform::{extract_declared_names, make_persistent, wrap_unit},
    variables::{self, VariableInfo},
};

/// Script installed on every surface before user code runs.
///
/// Defines the non-enumerable `__tidepool__` helper object (kind tags,
/// bounded previews, member enumeration, Map key access, the rich-output
/// queue) and the `display()` global. Every helper is total: throwing
/// accessors and serialization failures are caught inside and degrade to
/// primitive stringification.
const RUNTIME_PRELUDE: &str = r#"
(() => {
    const richQueue = [];
    const tag = (value) => Object.prototype.toString.call(value);
    const safeString = (value) => {
        try { return String(value); } catch (err) { return "<unprintable>"; }
    };
    const safeStringify = (value) => {
        if (typeof value === "string") return value;
        try {
            const text = JSON.stringify(value);
            return text === undefined ? safeString(value) : text;
        } catch (err) { return safeString(value); }
    };
    const safeSource = (fn) => {
        try { return Function.prototype.toString.call(fn); } catch (err) { return null; }
    };
    const kindOf = (value) => {
        if (value === null) return "null";
        const t = typeof value;
        if (t !== "object" && t !== "function") return t;
        if (t === "function") {
            const src = safeSource(value);
            if (src !== null) {
                if (/^class[\s{]/.test(src)) return "class";
                if (/^(async\s+)?function\s*\*/.test(src)) return "generator";
                if (!/^(async\s+)?function/.test(src)) return "arrow";
            }
            return "function";
        }
        const t2 = tag(value);
        if (t2 === "[object Array]") return "array";
        if (t2 === "[object Map]") return "map";
        if (t2 === "[object Set]") return "set";
        if (t2 === "[object Date]") return "date";
        if (t2 === "[object RegExp]") return "regexp";
        if (t2 === "[object Promise]") return "promise";
        if (t2 === "[object Error]" || value instanceof Error) return "error";
        return "object";
    };
    const sizeOf = (value) => {
        try {
            const kind = kindOf(value);
            if (kind === "array" || kind === "string") return value.length;
            if (kind === "map" || kind === "set") return value.size;
            if (kind === "object") return Object.keys(value).length;
        } catch (err) {}
        return -1;
    };
    const isExpandable = (value) => {
        const kind = kindOf(value);
        return kind === "array" || kind === "map" || kind === "set" || kind === "object" || kind === "error";
    };
    const clip = (text, cap) => (text.length > cap ? text.slice(0, cap) + "…" : text);
    const previewValue = (value, depth, maxItems, stringCap, seen) => {
        if (value === null) return "null";
        const t = typeof value;
        if (t === "undefined") return "undefined";
        if (t === "string") return clip(JSON.stringify(value), stringCap);
        if (t === "boolean" || t === "number") return String(value);
        if (t === "bigint") return String(value) + "n";
        if (t === "symbol") return safeString(value);
        if (t === "function") {
            const kind = kindOf(value);
            const name = value.name ? value.name : "anonymous";
            if (kind === "class") return "class " + name;
            return "ƒ " + name + "()";
        }
        if (seen.indexOf(value) !== -1) return "[Circular]";
        const kind = kindOf(value);
        if (kind === "date") {
            try { return value.toISOString(); } catch (err) { return "Invalid Date"; }
        }
        if (kind === "regexp" || kind === "error") return safeString(value);
        if (kind === "promise") return "Promise";
        if (depth <= 0) {
            if (kind === "array") return "Array(" + sizeOf(value) + ")";
            if (kind === "map") return "Map(" + sizeOf(value) + ")";
            if (kind === "set") return "Set(" + sizeOf(value) + ")";
            return "{…}";
        }
        const nextSeen = seen.concat([value]);
        try {
            if (kind === "array") {
                const parts = [];
                const count = Math.min(value.length, maxItems);
                for (let i = 0; i < count; i += 1) {
                    parts.push(previewValue(value[i], depth - 1, maxItems, stringCap, nextSeen));
                }
                if (value.length > maxItems) parts.push("… " + (value.length - maxItems) + " more");
                return "[" + parts.join(", ") + "]";
            }
            if (kind === "map") {
                const parts = [];
                let count = 0;
                for (const entry of value) {
                    if (count >= maxItems) { parts.push("…"); break; }
                    parts.push(
                        previewValue(entry[0], 0, maxItems, stringCap, nextSeen)
                        + " => "
                        + previewValue(entry[1], depth - 1, maxItems, stringCap, nextSeen)
                    );
                    count += 1;
                }
                return "Map(" + value.size + ") {" + parts.join(", ") + "}";
            }
            if (kind === "set") {
                const parts = [];
                let count = 0;
                for (const item of value) {
                    if (count >= maxItems) { parts.push("…"); break; }
                    parts.push(previewValue(item, depth - 1, maxItems, stringCap, nextSeen));
                    count += 1;
                }
                return "Set(" + value.size + ") {" + parts.join(", ") + "}";
            }
            const keys = Object.keys(value);
            const parts = [];
            const count = Math.min(keys.length, maxItems);
            for (let i = 0; i < count; i += 1) {
                parts.push(keys[i] + ": " + previewValue(value[keys[i]], depth - 1, maxItems, stringCap, nextSeen));
            }
            if (keys.length > maxItems) parts.push("… " + (keys.length - maxItems) + " more");
            return "{" + parts.join(", ") + "}";
        } catch (err) {
            return safeString(value);
        }
    };
    const memberNamesJson = (value, maxDepth) => {
        const out = [];
        const seenNames = Object.create(null);
        let current = value;
        let depth = 0;
        while (current !== null && current !== undefined && depth <= maxDepth) {
            const target = Object(current);
            const names = Object.getOwnPropertyNames(target);
            for (let i = 0; i < names.length; i += 1) {
                const name = names[i];
                if (seenNames[name]) continue;
                seenNames[name] = true;
                let isMethod = false;
                try { isMethod = typeof target[name] === "function"; } catch (err) {}
                out.push({ name: name, kind: isMethod ? "method" : "property" });
            }
            current = Object.getPrototypeOf(target);
            depth += 1;
        }
        return JSON.stringify(out);
    };
    const describeEntry = (key, value) => ({
        key: key,
        kind: kindOf(value),
        preview: previewValue(value, 1, 5, 100, []),
        size: sizeOf(value),
        expandable: isExpandable(value),
    });
    const entriesJson = (value, limit) => {
        const entries = [];
        let total = 0;
        const kind = kindOf(value);
        if (kind === "array") {
            total = value.length;
            const count = Math.min(total, limit);
            for (let i = 0; i < count; i += 1) entries.push(describeEntry(String(i), value[i]));
        } else if (kind === "map") {
            total = value.size;
            let count = 0;
            for (const entry of value) {
                if (count >= limit) break;
                entries.push(describeEntry(safeStringify(entry[0]), entry[1]));
                count += 1;
            }
        } else if (kind === "set") {
            total = value.size;
            let count = 0;
            for (const item of value) {
                if (count >= limit) break;
                entries.push(describeEntry(String(count), item));
                count += 1;
            }
        } else {
            const target = Object(value);
            const keys = Object.keys(target);
            total = keys.length;
            const count = Math.min(total, limit);
            for (let i = 0; i < count; i += 1) {
                let item;
                try { item = target[keys[i]]; } catch (err) { item = undefined; }
                entries.push(describeEntry(keys[i], item));
            }
        }
        return JSON.stringify({ total: total, entries: entries });
    };
    const helper = {
        tag: tag,
        kindOf: kindOf,
        sizeOf: sizeOf,
        sourceOf: safeSource,
        preview: (value) => previewValue(value, 2, 10, 100, []),
        previewCapped: (value, cap) => previewValue(value, 2, 10, cap, []),
        memberNamesJson: memberNamesJson,
        entriesJson: entriesJson,
        mapGet: (map, key) => {
            try { return Map.prototype.get.call(map, key); } catch (err) { return undefined; }
        },
        mapHas: (map, key) => {
            try { return Map.prototype.has.call(map, key); } catch (err) { return false; }
        },
        pushRich: (mime, data) => { richQueue.push({ mime: mime, data: safeStringify(data) }); },
        takeRichJson: () => {
            const text = JSON.stringify(richQueue);
            richQueue.length = 0;
            return text;
        },
    };
    Object.defineProperty(globalThis, "__tidepool__", {
        value: helper, writable: false, enumerable: false, configurable: true,
    });
    Object.defineProperty(globalThis, "display", {
        value: (data, mime) => {
            helper.pushRich(mime === undefined ? "application/json" : String(mime), data);
        },
        writable: true, enumerable: false, configurable: true,
    });
})();
"#;

/// Whether a context owns its surface or borrows a caller's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ContextMode {
    /// Private engine context, created lazily, dropped on reset/destroy.
    Isolated,
    /// Caller-provided surface; the context installs its console capture on
    /// init and restores the prior `console` on destroy.
    Shared,
}

/// Context lifecycle. Initialization is lazy: the surface is built on the
/// first `execute` or introspection call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Active,
    Destroyed,
}

/// The engine surface behind a context.
enum SurfaceKind {
    /// Owned surface; `None` until lazy init (and again after reset).
    Isolated(Option<Box<Context>>),
    /// Borrowed shared surface.
    Shared(Rc<RefCell<Context>>),
}

/// Names this context has declared, in declaration order.
///
/// Append-only except on reset; listings never enumerate the global surface,
/// so engine builtins and prelude helpers stay invisible.
#[derive(Debug, Default, Clone)]
pub struct TrackedVariableSet(IndexSet<String>);

impl TrackedVariableSet {
    /// Registers a name. Returns false when it was already tracked.
    pub fn insert(&mut self, name: &str) -> bool {
        self.0.insert(name.to_owned())
    }

    /// True when `name` is tracked.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// Iterates names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of tracked names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Clears the set. Only reset paths call this.
    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }
}

/// One rich-output payload queued by `display()`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RichOutput {
    /// MIME type of the payload.
    pub mime: String,
    /// Payload text (stringified at queue time).
    pub data: String,
}

/// Structured outcome of one `execute` call.
#[derive(Debug)]
pub struct ExecutionResult {
    /// Identifier of this execution.
    pub exec_id: Uuid,
    /// False when the snippet threw.
    pub success: bool,
    /// The completion value, when there was one. Absent for statements, for
    /// still-pending deferred units, and on error.
    pub value: Option<ValueSnapshot>,
    /// Console entries from the normal group (`log`, `debug`, `info`), in
    /// capture order. Entries logged before a throw are preserved.
    pub output: Vec<LogEntry>,
    /// Console entries from the elevated group (`warn`, `error`).
    pub elevated: Vec<LogEntry>,
    /// Rich payloads queued via `display()` during this call.
    pub rich: Vec<RichOutput>,
    /// The structured error when the snippet threw.
    pub error: Option<ExecutionError>,
    /// Wall-clock evaluation time.
    pub duration: Duration,
}

/// A persistent execution context over one global surface.
pub struct ExecutionContext {
    mode: ContextMode,
    surface: SurfaceKind,
    lifecycle: Lifecycle,
    limits: ResourceLimits,
    /// Capture buffer shared with the installed console logger.
    logs: LogBuffer,
    tracked: TrackedVariableSet,
    /// Executed snippet sources, for doc-comment lookup on hover.
    archive: Vec<String>,
    /// Prior `console` binding on a shared surface, restored on destroy.
    saved_console: Option<JsValue>,
}

impl ExecutionContext {
    /// Creates an isolated context with its own private surface.
    ///
    /// The surface is not built until the first execution or introspection
    /// call, so constructing contexts is cheap.
    #[must_use]
    pub fn isolated(limits: ResourceLimits) -> Self {
        Self {
            mode: ContextMode::Isolated,
            surface: SurfaceKind::Isolated(None),
            lifecycle: Lifecycle::Uninitialized,
            limits,
            logs: LogBuffer::default(),
            tracked: TrackedVariableSet::default(),
            archive: Vec::new(),
            saved_console: None,
        }
    }

    /// Creates a context over a caller-provided shared surface.
    ///
    /// Globals already present on the surface stay visible to snippets; the
    /// context's console capture is installed on first use and the previous
    /// `console` binding is restored when the context is destroyed.
    #[must_use]
    pub fn shared(surface: Rc<RefCell<Context>>) -> Self {
        Self {
            mode: ContextMode::Shared,
            surface: SurfaceKind::Shared(surface),
            lifecycle: Lifecycle::Uninitialized,
            limits: ResourceLimits::default(),
            logs: LogBuffer::default(),
            tracked: TrackedVariableSet::default(),
            archive: Vec::new(),
            saved_console: None,
        }
    }

    /// The context's surface mode.
    #[must_use]
    pub fn mode(&self) -> ContextMode {
        self.mode
    }

    /// True once `destroy` has run.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.lifecycle == Lifecycle::Destroyed
    }

    /// The tracked-variable set.
    #[must_use]
    pub fn tracked(&self) -> &TrackedVariableSet {
        &self.tracked
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Executes one snippet and returns its structured result.
    ///
    /// A thrown script error is reported inside the `Ok` result, not as an
    /// `Err`; the only `Err` cases are a missing surface and a destroyed
    /// context.
    pub fn execute(&mut self, code: &str) -> Result<ExecutionResult, KernelError> {
        self.execute_with_id(code, Uuid::new_v4())
    }

    /// Executes one snippet under a caller-chosen execution id.
    pub fn execute_with_id(&mut self, code: &str, exec_id: Uuid) -> Result<ExecutionResult, KernelError> {
        self.ensure_active()?;
        self.logs.borrow_mut().clear();
        // Jobs the host drove between calls may have queued display payloads;
        // they belong to no execution and are discarded.
        let _ = self.drain_rich()?;

        let names = extract_declared_names(code);
        let rewritten = make_persistent(code);
        let unit = wrap_unit(&rewritten, &names);

        // Names are registered before evaluation so a snippet that throws
        // halfway still tracks what it declared.
        for name in &names {
            self.tracked.insert(name);
        }
        self.archive.push(code.to_owned());

        let started = Instant::now();
        let outcome = self.with_surface(|ctx| {
            let mut evaluated = ctx.eval(Source::from_bytes(unit.primary.as_bytes()));
            if let Err(error) = &evaluated {
                if is_parse_failure(error) {
                    if let Some(fallback) = &unit.fallback {
                        evaluated = ctx.eval(Source::from_bytes(fallback.as_bytes()));
                    }
                }
            }
            match evaluated {
                Ok(value) if unit.deferred => settle(value, ctx),
                Ok(value) => Ok(Some(value)),
                Err(error) => Err(ExecutionError::from_js(&error, ctx)),
            }
        })?;
        let duration = started.elapsed();

        let (value, error) = match outcome {
            Ok(Some(value)) if !value.is_undefined() => {
                let snapshot = self.with_surface(|ctx| inspect::snapshot(&value, ctx))?;
                (Some(snapshot), None)
            }
            Ok(_) => (None, None),
            Err(error) => (None, Some(error)),
        };

        // Script-level class declarations bind lexically, not as globalThis
        // properties; promote declared names so path resolution sees them.
        if error.is_none() && !unit.deferred && !names.is_empty() {
            let script: String = names
                .iter()
                .map(|name| format!("try {{ globalThis[\"{name}\"] = {name}; }} catch (err) {{}}\n"))
                .collect();
            self.with_surface(|ctx| {
                let _ = ctx.eval(Source::from_bytes(script.as_bytes()));
            })?;
        }

        let rich = self.drain_rich()?;
        let entries = std::mem::take(&mut *self.logs.borrow_mut());
        let (elevated, output) = entries.into_iter().partition(|entry| entry.kind.is_elevated());

        Ok(ExecutionResult {
            exec_id,
            success: error.is_none(),
            value,
            output,
            elevated,
            rich,
            error,
            duration,
        })
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Lists tracked variables with live previews, sorted by name.
    pub fn variables(&mut self) -> Result<Vec<VariableInfo>, KernelError> {
        let tracked = self.tracked.clone();
        self.with_surface(|ctx| variables::list(&tracked, ctx))
    }

    /// Describes one tracked variable, when it exists.
    pub fn variable(&mut self, name: &str) -> Result<Option<VariableInfo>, KernelError> {
        if !self.tracked.contains(name) {
            return Ok(None);
        }
        let tracked = self.tracked.clone();
        self.with_surface(|ctx| variables::describe_path(name, &tracked, ctx))
    }

    /// True when `name` is in the tracked set.
    #[must_use]
    pub fn has_variable(&self, name: &str) -> bool {
        self.tracked.contains(name)
    }

    /// Expands one container level at `path`, capped at `limit` entries plus
    /// a synthetic "N more items" tail.
    pub fn expand_variable(&mut self, path: &str, limit: usize) -> Result<Option<Vec<VariableInfo>>, KernelError> {
        let tracked = self.tracked.clone();
        self.with_surface(|ctx| variables::expand(path, limit, &tracked, ctx))
    }

    /// Completion candidates for a cursor position (UTF-16 offset).
    pub fn complete(&mut self, source: &str, cursor: usize) -> Result<Vec<CompletionItem>, KernelError> {
        let tracked = self.tracked.clone();
        self.with_surface(|ctx| complete::complete(source, cursor, &tracked, ctx))
    }

    /// Hover payload for the identifier chain under a cursor (UTF-16
    /// offset). `None` when nothing resolves there.
    pub fn hover(&mut self, source: &str, cursor: usize, detail: DetailLevel) -> Result<Option<HoverInfo>, KernelError> {
        let Some(expr_path) = complete::path_at_cursor(source, cursor) else {
            return Ok(None);
        };
        let tracked = self.tracked.clone();
        let archive = self.archive.clone();
        self.with_surface(|ctx| inspect::hover(&expr_path, detail, &tracked, &archive, ctx))
    }

    /// Runs a closure against the raw surface, initializing it on demand.
    pub fn with_global<R>(&mut self, f: impl FnOnce(&mut Context) -> R) -> Result<R, KernelError> {
        self.with_surface(f)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Re-initializes the context in place.
    ///
    /// Isolated: drops the private surface (it is rebuilt lazily) and clears
    /// the tracked set. Shared: best-effort deletes each tracked binding from
    /// the borrowed surface, tolerating non-configurable failures, then
    /// clears the set. Never throws for individual binding failures.
    pub fn reset(&mut self) -> Result<(), KernelError> {
        if self.lifecycle == Lifecycle::Destroyed {
            return Err(ResourceError::Destroyed.into());
        }
        if self.lifecycle == Lifecycle::Active {
            match &mut self.surface {
                SurfaceKind::Isolated(slot) => {
                    *slot = None;
                    self.lifecycle = Lifecycle::Uninitialized;
                }
                SurfaceKind::Shared(_) => {
                    let names: Vec<String> = self.tracked.names().map(str::to_owned).collect();
                    self.with_surface(|ctx| {
                        for name in &names {
                            if let Ok(key) = serde_json::to_string(name) {
                                let _ = ctx.eval(Source::from_bytes(format!("delete globalThis[{key}];").as_bytes()));
                            }
                        }
                    })?;
                }
            }
        }
        self.tracked.clear();
        self.archive.clear();
        self.logs.borrow_mut().clear();
        Ok(())
    }

    /// Releases the surface. Idempotent.
    ///
    /// Shared surfaces get their previous `console` binding restored; the
    /// borrowed surface itself is left intact for its owner.
    pub fn destroy(&mut self) {
        if self.lifecycle == Lifecycle::Destroyed {
            return;
        }
        if self.lifecycle == Lifecycle::Active {
            if let SurfaceKind::Shared(shared) = &self.surface {
                if let Some(prior) = self.saved_console.take() {
                    if let Ok(mut ctx) = shared.try_borrow_mut() {
                        let global = ctx.global_object();
                        let _ = global.set(js_string!("console"), prior, false, &mut ctx);
                    }
                }
            }
        }
        if let SurfaceKind::Isolated(slot) = &mut self.surface {
            *slot = None;
        }
        self.lifecycle = Lifecycle::Destroyed;
    }

    // =========================================================================
    // Surface plumbing
    // =========================================================================

    /// Initializes the surface if needed and rejects destroyed contexts.
    fn ensure_active(&mut self) -> Result<(), KernelError> {
        match self.lifecycle {
            Lifecycle::Active => Ok(()),
            Lifecycle::Destroyed => Err(ResourceError::Destroyed.into()),
            Lifecycle::Uninitialized => self.initialize(),
        }
    }

    /// Builds or adopts the surface and installs capture + prelude.
    fn initialize(&mut self) -> Result<(), KernelError> {
        match &mut self.surface {
            SurfaceKind::Isolated(slot) => {
                let mut ctx = Box::new(Context::default());
                self.limits.apply(&mut ctx);
                install_capture(&mut ctx, &self.logs)?;
                *slot = Some(ctx);
            }
            SurfaceKind::Shared(shared) => {
                let shared = shared.clone();
                let mut ctx = shared
                    .try_borrow_mut()
                    .map_err(|_| ResourceError::Surface("shared surface is already borrowed".to_owned()))?;
                let prior = ctx
                    .global_object()
                    .get(js_string!("console"), &mut ctx)
                    .map_err(|e| ResourceError::Surface(e.to_string()))?;
                self.saved_console = Some(prior);
                install_capture(&mut ctx, &self.logs)?;
            }
        }
        self.lifecycle = Lifecycle::Active;
        Ok(())
    }

    /// Runs a closure with exclusive access to the active surface.
    fn with_surface<R>(&mut self, f: impl FnOnce(&mut Context) -> R) -> Result<R, KernelError> {
        self.ensure_active()?;
        match &mut self.surface {
            SurfaceKind::Isolated(Some(ctx)) => Ok(f(ctx)),
            SurfaceKind::Isolated(None) => {
                Err(ResourceError::Surface("surface missing after initialization".to_owned()).into())
            }
            SurfaceKind::Shared(shared) => {
                let shared = shared.clone();
                let mut ctx = shared
                    .try_borrow_mut()
                    .map_err(|_| ResourceError::Surface("shared surface is already borrowed".to_owned()))?;
                Ok(f(&mut ctx))
            }
        }
    }

    /// Drains the engine-side rich-output queue into typed entries.
    fn drain_rich(&mut self) -> Result<Vec<RichOutput>, KernelError> {
        self.with_surface(|ctx| {
            inspect::helper_string("takeRichJson", &[], ctx)
                .and_then(|text| serde_json::from_str(&text).ok())
                .unwrap_or_default()
        })
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Installs the capturing console and the runtime prelude on a surface.
fn install_capture(ctx: &mut Context, logs: &LogBuffer) -> Result<(), KernelError> {
    let logger = BufferLogger::new(logs.clone());
    let console = Console::init_with_logger(ctx, logger);
    ctx.register_global_property(js_string!(Console::NAME), console, Attribute::all())
        .map_err(|e| ResourceError::Surface(e.to_string()))?;
    ctx.eval(Source::from_bytes(RUNTIME_PRELUDE))
        .map_err(|e| ResourceError::Surface(e.to_string()))?;
    Ok(())
}

/// Drives the job queue and unwraps a deferred unit's promise.
///
/// A fulfilled promise yields its value, a rejection becomes the execution
/// error, and a promise still pending after the queue drains yields no
/// value.
fn settle(value: JsValue, ctx: &mut Context) -> Result<Option<JsValue>, ExecutionError> {
    let Some(object) = value.as_object() else {
        return Ok(Some(value));
    };
    let object = object.clone();
    let Ok(promise) = JsPromise::from_object(object) else {
        return Ok(Some(value));
    };
    let _ = ctx.run_jobs();
    match promise.state() {
        PromiseState::Fulfilled(fulfilled) => Ok(Some(fulfilled)),
        PromiseState::Rejected(rejected) => Err(ExecutionError::from_js(&JsError::from_opaque(rejected), ctx)),
        PromiseState::Pending => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn tracked_set_preserves_declaration_order() {
        let mut tracked = TrackedVariableSet::default();
        assert!(tracked.insert("b"));
        assert!(tracked.insert("a"));
        assert!(!tracked.insert("b"), "re-insert must be a no-op");
        let names: Vec<&str> = tracked.names().collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn contexts_start_uninitialized() {
        let ctx = ExecutionContext::isolated(ResourceLimits::new());
        assert_eq!(ctx.mode(), ContextMode::Isolated);
        assert!(!ctx.is_destroyed());
        assert!(ctx.tracked().is_empty());
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut ctx = ExecutionContext::isolated(ResourceLimits::new());
        ctx.destroy();
        ctx.destroy();
        assert!(ctx.is_destroyed());
    }

    #[test]
    fn execute_after_destroy_is_a_resource_error() {
        let mut ctx = ExecutionContext::isolated(ResourceLimits::new());
        ctx.destroy();
        let err = ctx.execute("1 + 1").unwrap_err();
        assert!(matches!(err, KernelError::Resource(ResourceError::Destroyed)));
    }
}
