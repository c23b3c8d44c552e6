#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "numeric narrowing is checked")]
#![expect(clippy::cast_sign_loss, reason = "sign-changing casts are intentional")]
#![expect(clippy::must_use_candidate, reason = "introspection getters are self-evident")]

mod classify;
mod complete;
mod context;
mod docs;
mod error;
mod executor;
mod inspect;
mod io;
mod path;
mod resource;
mod scan;
pub mod session_manager;
mod transform;
mod variables;

pub use crate::{
    classify::{Classification, Status, classify, suggested_indent},
    complete::{CompletionItem, CompletionKind, CursorContext, MAX_COMPLETIONS, cursor_context, path_at_cursor},
    context::{ContextMode, ExecutionContext, ExecutionResult, RichOutput, TrackedVariableSet},
    error::{ExecutionError, KernelError},
    executor::{Executor, ExecutorRegistry, ScriptExecutor},
    inspect::{DetailLevel, HoverInfo, ValueKind, ValueSnapshot},
    io::{CollectLogSink, LogEntry, LogKind, LogSink, NoLogSink, StdLogSink},
    resource::{DEFAULT_MAX_LOOP_ITERATIONS, DEFAULT_MAX_RECURSION_DEPTH, ResourceError, ResourceLimits},
    scan::{Region, RegionKind, ScanState, final_state, region_at, scan_regions, utf16_to_byte_offset},
    session_manager::{SessionError, SessionInfo, SessionManager},
    transform::{TransformedUnit, extract_declared_names, make_persistent, wrap_unit},
    variables::{DEFAULT_EXPANSION_LIMIT, VariableInfo},
};
