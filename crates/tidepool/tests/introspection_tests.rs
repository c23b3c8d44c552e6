//! Integration tests for live introspection: completion, hover, and the
//! variable explorer, all resolved against values produced by executed
//! snippets.

use pretty_assertions::assert_eq;
use tidepool::{CompletionKind, DetailLevel, ExecutionContext, ResourceLimits, ValueKind};

fn fresh() -> ExecutionContext {
    ExecutionContext::isolated(ResourceLimits::new())
}

// ============================================================================
// Completion
// ============================================================================

#[test]
fn member_completion_lists_properties_and_methods() {
    let mut ctx = fresh();
    ctx.execute("const user = { name: 'ada', greet() { return 'hi'; } };").unwrap();

    let items = ctx.complete("user.", 5).unwrap();
    let name = items.iter().find(|i| i.label == "name").expect("own property");
    let greet = items.iter().find(|i| i.label == "greet").expect("own method");
    assert_eq!(name.kind, CompletionKind::Property);
    assert_eq!(greet.kind, CompletionKind::Method);
}

#[test]
fn member_completion_walks_the_prototype_chain() {
    let mut ctx = fresh();
    ctx.execute("let arr = [1, 2];").unwrap();
    let items = ctx.complete("arr.ma", 6).unwrap();
    assert!(items.iter().any(|i| i.label == "map"));
}

#[test]
fn member_completion_resolves_chained_paths() {
    let mut ctx = fresh();
    ctx.execute("let data = { items: [{ label: 'x' }] };").unwrap();
    let source = "data.items[0].la";
    let items = ctx.complete(source, source.len()).unwrap();
    assert!(items.iter().any(|i| i.label == "label"));
}

#[test]
fn global_completion_ranks_tracked_variables_first() {
    let mut ctx = fresh();
    ctx.execute("let marker = 1;").unwrap();
    let items = ctx.complete("ma", 2).unwrap();
    assert_eq!(items[0].label, "marker");
    assert_eq!(items[0].kind, CompletionKind::Variable);
}

#[test]
fn completion_is_suppressed_inside_strings_and_comments() {
    let mut ctx = fresh();
    ctx.execute("let real = 1;").unwrap();
    assert!(ctx.complete("'rea", 4).unwrap().is_empty());
    assert!(ctx.complete("// rea", 6).unwrap().is_empty());
}

#[test]
fn unresolvable_member_completion_is_empty() {
    let mut ctx = fresh();
    ctx.execute("1").unwrap();
    assert!(ctx.complete("ghost.", 6).unwrap().is_empty());
}

// ============================================================================
// Hover
// ============================================================================

#[test]
fn hover_on_a_tracked_number_reports_type_and_preview() {
    let mut ctx = fresh();
    ctx.execute("let answer = 42;").unwrap();
    let hover = ctx.hover("answer", 3, DetailLevel::Type).unwrap().expect("resolves");
    assert_eq!(hover.kind, ValueKind::Number);
    assert_eq!(hover.type_line, "number");
    assert_eq!(hover.preview, "42");
}

#[test]
fn hover_on_containers_shows_sized_type_lines() {
    let mut ctx = fresh();
    ctx.execute("let tags = ['a', 'b'];\nlet index = new Map([['k', 1]]);").unwrap();
    let hover = ctx.hover("tags", 2, DetailLevel::Type).unwrap().unwrap();
    assert_eq!(hover.type_line, "Array(2)");
    let hover = ctx.hover("index", 2, DetailLevel::Type).unwrap().unwrap();
    assert_eq!(hover.type_line, "Map(1)");
}

#[test]
fn hover_on_an_unresolved_identifier_finds_nothing() {
    let mut ctx = fresh();
    ctx.execute("1").unwrap();
    assert!(ctx.hover("nowhere", 3, DetailLevel::Type).unwrap().is_none());
}

#[test]
fn hover_description_comes_from_archived_doc_comments() {
    let mut ctx = fresh();
    ctx.execute("/** Adds two numbers. */\nfunction add(a, b) { return a + b; }").unwrap();
    let hover = ctx.hover("add", 1, DetailLevel::Description).unwrap().unwrap();
    assert_eq!(hover.description.as_deref(), Some("Adds two numbers."));
    assert!(hover.type_line.contains("add"));
}

#[test]
fn hover_description_falls_back_to_builtin_docs() {
    let mut ctx = fresh();
    ctx.execute("1").unwrap();
    let hover = ctx.hover("JSON.parse", 6, DetailLevel::Description).unwrap().unwrap();
    assert!(hover.description.is_some());
}

#[test]
fn hover_source_is_returned_for_script_functions_only() {
    let mut ctx = fresh();
    ctx.execute("function twice(v) { return v * 2; }").unwrap();
    let hover = ctx.hover("twice", 2, DetailLevel::Source).unwrap().unwrap();
    assert!(hover.source.as_deref().is_some_and(|s| s.contains("v * 2")));

    let hover = ctx.hover("parseInt", 4, DetailLevel::Source).unwrap().unwrap();
    assert!(hover.source.is_none(), "native functions expose no source");
}

#[test]
fn hover_resolves_map_entries_by_key() {
    let mut ctx = fresh();
    ctx.execute("let lookup = new Map([['inner', { v: 7 }]]);").unwrap();
    let hover = ctx.hover("lookup.inner", 8, DetailLevel::Type).unwrap().unwrap();
    assert_eq!(hover.kind, ValueKind::Object);
}

// ============================================================================
// Variable explorer
// ============================================================================

#[test]
fn variables_lists_only_tracked_names_sorted() {
    let mut ctx = fresh();
    ctx.execute("let beta = 2;\nlet alpha = [1, 2, 3];").unwrap();
    let vars = ctx.variables().unwrap();
    let names: Vec<&str> = vars.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, ["alpha", "beta"]);

    let alpha = &vars[0];
    assert_eq!(alpha.kind, ValueKind::Array);
    assert_eq!(alpha.size, Some(3));
    assert!(alpha.expandable);
    let beta = &vars[1];
    assert_eq!(beta.kind, ValueKind::Number);
    assert!(!beta.expandable);
}

#[test]
fn expanding_a_large_array_caps_entries_with_a_tail_marker() {
    let mut ctx = fresh();
    ctx.execute("let big = Array.from({ length: 150 }, (_, i) => i);").unwrap();
    let rows = ctx.expand_variable("big", 100).unwrap().expect("expandable");
    assert_eq!(rows.len(), 101);
    assert_eq!(rows[0].name, "0");
    assert_eq!(rows[99].name, "99");
    assert_eq!(rows[100].name, "50 more items");
    assert!(!rows[100].expandable);
}

#[test]
fn expanding_objects_and_maps_yields_keyed_entries() {
    let mut ctx = fresh();
    ctx.execute("let conf = { retries: 3, tags: ['a'] };").unwrap();
    let rows = ctx.expand_variable("conf", 100).unwrap().unwrap();
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["retries", "tags"]);
    assert!(rows[1].expandable);

    ctx.execute("let m = new Map([['k', 1]]);").unwrap();
    let rows = ctx.expand_variable("m", 100).unwrap().unwrap();
    assert_eq!(rows[0].name, "k");
}

#[test]
fn expanding_a_primitive_or_unknown_path_is_none() {
    let mut ctx = fresh();
    ctx.execute("let plain = 5;").unwrap();
    assert!(ctx.expand_variable("plain", 100).unwrap().is_none());
    assert!(ctx.expand_variable("ghost", 100).unwrap().is_none());
}

#[test]
fn nested_expansion_follows_paths() {
    let mut ctx = fresh();
    ctx.execute("let tree = { branch: { leaf: 1 } };").unwrap();
    let rows = ctx.expand_variable("tree.branch", 100).unwrap().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "leaf");
    assert_eq!(rows[0].kind, ValueKind::Number);
}
