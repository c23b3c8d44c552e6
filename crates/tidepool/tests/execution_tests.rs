//! Integration tests for the execution pipeline.
//!
//! Covers value capture, cross-snippet persistence, console capture, error
//! reporting, top-level await, rich output, and context lifecycle on both
//! isolated and shared surfaces.

use std::{cell::RefCell, rc::Rc};

use pretty_assertions::assert_eq;
use tidepool::{ExecutionContext, KernelError, LogKind, ResourceLimits, ValueKind};

fn fresh() -> ExecutionContext {
    ExecutionContext::isolated(ResourceLimits::new())
}

// ============================================================================
// Values
// ============================================================================

#[test]
fn bare_expression_yields_its_value() {
    let mut ctx = fresh();
    let result = ctx.execute("5").unwrap();
    assert!(result.success);
    let value = result.value.expect("a bare expression has a value");
    assert_eq!(value.kind, ValueKind::Number);
    assert_eq!(value.preview, "5");
}

#[test]
fn trailing_expression_after_statements_is_the_value() {
    let mut ctx = fresh();
    let result = ctx.execute("let a = 2;\nlet b = 3;\na * b").unwrap();
    assert_eq!(result.value.map(|v| v.preview), Some("6".to_owned()));
}

#[test]
fn pure_statements_yield_no_value() {
    let mut ctx = fresh();
    let result = ctx.execute("let quiet = 1;").unwrap();
    assert!(result.success);
    assert!(result.value.is_none());
}

#[test]
fn array_value_gets_a_container_preview() {
    let mut ctx = fresh();
    let result = ctx.execute("[1, 2, 3]").unwrap();
    let value = result.value.unwrap();
    assert_eq!(value.kind, ValueKind::Array);
    assert_eq!(value.preview, "[1, 2, 3]");
}

// ============================================================================
// Persistence across snippets
// ============================================================================

#[test]
fn let_bindings_persist_to_later_snippets() {
    let mut ctx = fresh();
    ctx.execute("let x = 41;").unwrap();
    let result = ctx.execute("x + 1").unwrap();
    assert_eq!(result.value.map(|v| v.preview), Some("42".to_owned()));
}

#[test]
fn redeclaring_with_let_does_not_error() {
    let mut ctx = fresh();
    ctx.execute("let n = 1;").unwrap();
    let result = ctx.execute("let n = 2; n").unwrap();
    assert!(result.success);
    assert_eq!(result.value.map(|v| v.preview), Some("2".to_owned()));
}

#[test]
fn functions_and_classes_persist() {
    let mut ctx = fresh();
    ctx.execute("function double(v) { return v * 2; }").unwrap();
    ctx.execute("class Point { constructor(x) { this.x = x; } }").unwrap();
    let result = ctx.execute("double(new Point(21).x)").unwrap();
    assert_eq!(result.value.map(|v| v.preview), Some("42".to_owned()));
    assert!(ctx.has_variable("double"));
    assert!(ctx.has_variable("Point"));
}

#[test]
fn destructured_names_are_tracked() {
    let mut ctx = fresh();
    ctx.execute("const { a, b: renamed } = { a: 1, b: 2 };").unwrap();
    assert!(ctx.has_variable("a"));
    assert!(ctx.has_variable("renamed"));
    assert!(!ctx.has_variable("b"));
}

#[test]
fn engine_internals_stay_untracked() {
    let mut ctx = fresh();
    ctx.execute("let mine = 1;").unwrap();
    assert!(!ctx.has_variable("JSON"));
    assert!(!ctx.has_variable("__tidepool__"));
    assert_eq!(ctx.tracked().len(), 1);
}

// ============================================================================
// Console capture
// ============================================================================

#[test]
fn console_output_is_captured_per_execution() {
    let mut ctx = fresh();
    let result = ctx.execute("console.log('hello', 42);").unwrap();
    assert_eq!(result.output.len(), 1);
    assert_eq!(result.output[0].kind, LogKind::Message);
    assert_eq!(result.output[0].text, "hello 42");

    // The next execution starts with an empty buffer.
    let result = ctx.execute("1").unwrap();
    assert!(result.output.is_empty());
}

#[test]
fn warn_and_error_land_in_the_elevated_group() {
    let mut ctx = fresh();
    let result = ctx.execute("console.info('fyi'); console.warn('careful'); console.error('bad');").unwrap();
    let output: Vec<&str> = result.output.iter().map(|e| e.text.as_str()).collect();
    let elevated: Vec<&str> = result.elevated.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(output, ["fyi"]);
    assert_eq!(elevated, ["careful", "bad"]);
}

#[test]
fn output_logged_before_a_throw_is_preserved() {
    let mut ctx = fresh();
    let result = ctx.execute("console.log('before'); throw new Error('boom');").unwrap();
    assert!(!result.success);
    assert_eq!(result.output.len(), 1);
    assert_eq!(result.output[0].text, "before");
    let error = result.error.unwrap();
    assert_eq!(error.kind, "Error");
    assert_eq!(error.message, "boom");
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn thrown_errors_are_structured_not_propagated() {
    let mut ctx = fresh();
    let result = ctx.execute("null.anything").unwrap();
    assert!(!result.success);
    assert!(result.value.is_none());
    assert_eq!(result.error.unwrap().kind, "TypeError");
}

#[test]
fn syntax_errors_report_as_execution_errors() {
    let mut ctx = fresh();
    let result = ctx.execute("let = = 1").unwrap();
    assert!(!result.success);
    assert_eq!(result.error.unwrap().kind, "SyntaxError");
}

#[test]
fn names_declared_before_a_throw_stay_tracked() {
    let mut ctx = fresh();
    let result = ctx.execute("let partial = 1; throw new Error('mid');").unwrap();
    assert!(!result.success);
    assert!(ctx.has_variable("partial"));
}

#[test]
fn failed_snippet_leaves_earlier_state_intact() {
    let mut ctx = fresh();
    ctx.execute("let keep = 'safe';").unwrap();
    ctx.execute("throw new Error('no');").unwrap();
    let result = ctx.execute("keep").unwrap();
    assert_eq!(result.value.map(|v| v.preview), Some("\"safe\"".to_owned()));
}

// ============================================================================
// Top-level await
// ============================================================================

#[test]
fn top_level_await_yields_the_settled_value() {
    let mut ctx = fresh();
    let result = ctx.execute("await Promise.resolve(42)").unwrap();
    assert!(result.success);
    assert_eq!(result.value.map(|v| v.preview), Some("42".to_owned()));
}

#[test]
fn declarations_in_awaited_snippets_persist() {
    let mut ctx = fresh();
    ctx.execute("let fetched = await Promise.resolve(40);").unwrap();
    let result = ctx.execute("fetched + 2").unwrap();
    assert_eq!(result.value.map(|v| v.preview), Some("42".to_owned()));
}

#[test]
fn rejected_await_becomes_the_execution_error() {
    let mut ctx = fresh();
    let result = ctx.execute("await Promise.reject(new Error('nope'))").unwrap();
    assert!(!result.success);
    let error = result.error.unwrap();
    assert_eq!(error.kind, "Error");
    assert_eq!(error.message, "nope");
}

#[test]
fn forever_pending_await_yields_no_value() {
    let mut ctx = fresh();
    let result = ctx.execute("await new Promise(() => {})").unwrap();
    assert!(result.success);
    assert!(result.value.is_none());
}

#[test]
fn await_inside_a_function_body_is_not_deferred() {
    let mut ctx = fresh();
    let result = ctx.execute("async function later() { return await Promise.resolve(1); }\n'sync'").unwrap();
    assert_eq!(result.value.map(|v| v.preview), Some("\"sync\"".to_owned()));
}

// ============================================================================
// Rich output
// ============================================================================

#[test]
fn display_queues_rich_payloads() {
    let mut ctx = fresh();
    let result = ctx.execute("display({ a: 1 });").unwrap();
    assert_eq!(result.rich.len(), 1);
    assert_eq!(result.rich[0].mime, "application/json");
    assert_eq!(result.rich[0].data, "{\"a\":1}");
}

#[test]
fn display_mime_is_honored_and_queue_drains() {
    let mut ctx = fresh();
    let result = ctx.execute("display('<b>hi</b>', 'text/html');").unwrap();
    assert_eq!(result.rich[0].mime, "text/html");
    assert_eq!(result.rich[0].data, "<b>hi</b>");

    let result = ctx.execute("1").unwrap();
    assert!(result.rich.is_empty());
}

#[test]
fn rich_output_queued_between_calls_is_discarded() {
    let surface = Rc::new(RefCell::new(boa_engine::Context::default()));
    let mut ctx = ExecutionContext::shared(surface.clone());
    ctx.execute("Promise.resolve().then(() => display('late', 'text/plain'));").unwrap();

    // The owner drives the pending microtask between executions.
    {
        let mut owner = surface.borrow_mut();
        let _ = owner.run_jobs();
    }

    let result = ctx.execute("1").unwrap();
    assert!(result.rich.is_empty(), "stale payloads must not attach to the next call");
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn reset_clears_tracked_state_and_surface() {
    let mut ctx = fresh();
    ctx.execute("let gone = 1;").unwrap();
    ctx.reset().unwrap();
    assert!(ctx.tracked().is_empty());
    let result = ctx.execute("typeof gone").unwrap();
    assert_eq!(result.value.map(|v| v.preview), Some("\"undefined\"".to_owned()));
}

#[test]
fn destroyed_context_rejects_everything() {
    let mut ctx = fresh();
    ctx.execute("1").unwrap();
    ctx.destroy();
    assert!(ctx.is_destroyed());
    assert!(matches!(ctx.execute("1"), Err(KernelError::Resource(_))));
    assert!(ctx.reset().is_err());
}

// ============================================================================
// Shared surfaces
// ============================================================================

#[test]
fn shared_surface_sees_preexisting_globals() {
    let surface = Rc::new(RefCell::new(boa_engine::Context::default()));
    surface
        .borrow_mut()
        .eval(boa_engine::Source::from_bytes("var host = 40;"))
        .unwrap();

    let mut ctx = ExecutionContext::shared(surface);
    let result = ctx.execute("host + 2").unwrap();
    assert_eq!(result.value.map(|v| v.preview), Some("42".to_owned()));
}

#[test]
fn destroying_a_shared_context_restores_the_prior_console() {
    let surface = Rc::new(RefCell::new(boa_engine::Context::default()));
    let mut ctx = ExecutionContext::shared(surface.clone());
    let result = ctx.execute("console.log('captured'); 1").unwrap();
    assert_eq!(result.output[0].text, "captured");
    ctx.destroy();

    // A plain engine context has no console; destroy puts that back.
    let mut owner = surface.borrow_mut();
    let check = owner
        .eval(boa_engine::Source::from_bytes("typeof console"))
        .unwrap();
    assert_eq!(
        check.as_string().map(boa_engine::JsString::to_std_string_escaped),
        Some("undefined".to_owned())
    );
}

#[test]
fn shared_reset_tolerates_non_deletable_bindings() {
    let surface = Rc::new(RefCell::new(boa_engine::Context::default()));
    let mut ctx = ExecutionContext::shared(surface.clone());
    // `var` globals are non-configurable; delete fails silently.
    ctx.execute("let stubborn = 1;").unwrap();
    ctx.reset().unwrap();
    assert!(ctx.tracked().is_empty());

    // The surface itself stays usable by its owner.
    let mut owner = surface.borrow_mut();
    assert!(owner.eval(boa_engine::Source::from_bytes("1 + 1")).is_ok());
}
