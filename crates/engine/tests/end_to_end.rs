// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end scenarios driven through the public `Engine` API, one test
//! per operation sequence an embedder would actually run.

use rpl_engine::{Engine, EngineConfig, FsPackageLoader, PackageLoader, TraceStyle};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

struct InMemoryLoader(HashMap<String, Vec<u8>>);

impl PackageLoader for InMemoryLoader {
    fn load(&self, importpath: &str, _lib_path: Option<&Path>) -> Result<Vec<u8>, String> {
        self.0.get(importpath).cloned().ok_or_else(|| format!("no such package `{importpath}`"))
    }
}

#[test]
fn find_number_locates_the_digits_in_a_longer_line() {
    let engine = Engine::new();
    let loaded = engine.load_source(b"alias number = [0-9]+").unwrap();
    assert!(loaded.ok, "{:?}", loaded.diagnostics);

    let compiled = engine.compile_expression(b"find(number)").unwrap();
    let id = compiled.matcher_id.expect("find(number) compiles");

    let result = engine.run_match(id, b"abc 42 xyz", "json").unwrap();
    assert!(!result.aborted);
    let json: serde_json::Value = serde_json::from_str(&result.data.as_text()).unwrap();
    assert_eq!(json[0]["type"], "number");
    assert_eq!(json[0]["s"], 4);
    assert_eq!(json[0]["e"], 6);
}

#[test]
fn mutually_recursive_grammar_matches_a_run_of_as() {
    let engine = Engine::new();
    let loaded = engine.load_source(br#"grammar s = {"a" s} / "" end"#).unwrap();
    assert!(loaded.ok, "{:?}", loaded.diagnostics);

    let compiled = engine.compile_expression(b"s").unwrap();
    let id = compiled.matcher_id.expect("the grammar compiles");

    let result = engine.run_match(id, b"aaab", "bool").unwrap();
    assert!(!result.aborted);
    assert_eq!(result.leftover, 1);
}

#[test]
fn case_insensitive_macro_matches_any_casing() {
    let engine = Engine::new();
    let compiled = engine.compile_expression(br#"ci("Hello")"#).unwrap();
    let id = compiled.matcher_id.expect(r#"ci("Hello") compiles"#);

    let result = engine.run_match(id, b"hELLo", "bool").unwrap();
    assert!(!result.aborted);
    assert_eq!(result.leftover, 0);
}

#[test]
fn negated_charset_plus_fails_cleanly_on_empty_input() {
    let engine = Engine::new();
    let compiled = engine.compile_expression(b"[^0-9]+").unwrap();
    assert!(compiled.diagnostics.is_empty(), "{:?}", compiled.diagnostics);
    let id = compiled.matcher_id.expect("[^0-9]+ compiles");

    let result = engine.run_match(id, b"", "bool").unwrap();
    use rpl_engine::EncodedData;
    assert_eq!(result.data, EncodedData::Bool(false));
    assert_eq!(result.leftover, 0);
}

#[test]
fn importing_a_package_exposes_its_rules_under_a_prefix() {
    let mut packages = HashMap::new();
    packages.insert(
        "net".to_string(),
        b"any = [0-9]+ \".\" [0-9]+ \".\" [0-9]+ \".\" [0-9]+".to_vec(),
    );
    let engine = Engine::with_config(EngineConfig { loader: Arc::new(InMemoryLoader(packages)), ..EngineConfig::default() });

    let imported = engine.import_package("net", None).unwrap();
    assert!(imported.ok, "{:?}", imported.diagnostics);

    let compiled = engine.compile_expression(b"net.any").unwrap();
    let id = compiled.matcher_id.expect("net.any compiles");

    let result = engine.run_match(id, b"192.9.201.1", "bool").unwrap();
    assert_eq!(result.leftover, 0);
    assert!(!result.aborted);
}

#[test]
fn illegal_regex_style_source_fails_to_parse_without_reaching_the_compiler() {
    let engine = Engine::new();
    let compiled = engine.compile_expression(b"/foo/").unwrap();
    assert!(compiled.matcher_id.is_none());
    assert_eq!(compiled.diagnostics.len(), 1);
    assert_eq!(compiled.diagnostics[0].code, rpl_core::DiagnosticCode::Syntax);
    assert_eq!(compiled.diagnostics[0].source_ref.position(), (1, 1));
}

#[test]
fn trace_records_rule_entries_for_a_grammar_match() {
    let engine = Engine::new();
    let loaded = engine.load_source(br#"grammar s = {"a" s} / "" end"#).unwrap();
    assert!(loaded.ok, "{:?}", loaded.diagnostics);
    let id = engine.compile_expression(b"s").unwrap().matcher_id.unwrap();

    let traced = engine.trace(id, b"aaab", TraceStyle::Json).unwrap();
    assert!(traced.matched);
    let events: serde_json::Value = serde_json::from_str(&traced.trace).unwrap();
    assert!(events.as_array().unwrap().iter().any(|e| e["kind"] == "rule_enter"));
}

#[test]
fn default_fs_loader_reports_a_loader_error_without_a_libpath() {
    let loader = FsPackageLoader;
    let err = loader.load("net", None).unwrap_err();
    assert!(err.contains("libpath"));
}
