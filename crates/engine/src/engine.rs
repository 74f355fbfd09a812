// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! One `Engine` per spec §6.1: a handle table for compiled matchers, the
//! package cache/loader wiring, and the exclusive lock guarding every
//! compile/match call (spec §5 — one engine is not meant to be driven
//! concurrently from more than one thread at a time).

use crate::loader::{FsPackageLoader, PackageLoader};
use anyhow::Context;
use rpl_core::{all_recoverable, Diagnostic, Origin, RplError, SourceText};
use rpl_encoder::{EncodeFormat, EncodedData};
use rpl_env::{Binding, Environment, PackageCache};
use rpl_runtime::{Matcher, RunLimits, TraceEvent};
use rpl_utils::FastMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, TryLockError};
use std::time::{Duration, Instant};

/// Handle returned by `compile_expression`, opaque to callers beyond
/// equality/lookup (spec §6.1).
pub type MatcherId = u64;

/// Below this, resource exhaustion would be indistinguishable from a normal
/// match failing on the first capture — not a useful ceiling to allow.
const MIN_ALLOC_CEILING: usize = 64;

/// The package cache is "internally synchronized" and shared across engines
/// in the process (spec §5, §9) — one process-wide instance, lazily built.
fn shared_package_cache() -> Arc<PackageCache> {
    static CACHE: OnceLock<Arc<PackageCache>> = OnceLock::new();
    CACHE.get_or_init(|| Arc::new(PackageCache::new())).clone()
}

pub struct EngineConfig {
    pub lib_path: Option<PathBuf>,
    pub alloc_ceiling: usize,
    pub collection_watermark: usize,
    pub loader: Arc<dyn PackageLoader>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let limits = RunLimits::default();
        Self {
            lib_path: None,
            alloc_ceiling: limits.alloc_ceiling,
            collection_watermark: limits.collection_watermark,
            loader: Arc::new(FsPackageLoader),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadResult {
    pub ok: bool,
    pub pkgname: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct ImportResult {
    pub ok: bool,
    pub actual_pkgname: String,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct CompileResult {
    pub matcher_id: Option<MatcherId>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct MatchResult {
    pub data: EncodedData,
    pub leftover: usize,
    pub aborted: bool,
    pub ttotal: Duration,
    pub tmatch: Duration,
}

/// Rendering requested of `trace` (spec §6.1): plain text, one line per
/// event, or the same events as a JSON array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceStyle {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct TraceResult {
    pub matched: bool,
    pub trace: String,
}

struct EngineInner {
    lib_path: Option<PathBuf>,
    prelude: Environment,
    env: Environment,
    package_name: Option<String>,
    matchers: FastMap<MatcherId, Matcher>,
    next_id: MatcherId,
    alloc_ceiling: usize,
    collection_watermark: usize,
    loader: Arc<dyn PackageLoader>,
    package_cache: Arc<PackageCache>,
}

impl EngineInner {
    fn run_limits(&self) -> RunLimits {
        RunLimits { alloc_ceiling: self.alloc_ceiling, collection_watermark: self.collection_watermark }
    }

    /// Resolves one `importpath` to its compiled `Environment`, recursively
    /// loading/compiling the package source the first time, via the shared
    /// cache thereafter (spec §3 "Package table", §9).
    fn resolve_import(&self, importpath: &str) -> rpl_core::Result<Environment> {
        if let Some(cached) = self.package_cache.get(importpath) {
            return Ok(cached);
        }
        let bytes = self
            .loader
            .load(importpath, self.lib_path.as_deref())
            .map_err(|reason| RplError::LoaderError { importpath: importpath.to_string(), reason })?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let source = Arc::new(SourceText::new(Origin::Package(importpath.to_string()), text));
        let parse_result = rpl_parser::parse(source);
        if !all_recoverable(&parse_result.diagnostics) {
            return Err(RplError::GrammarError(format!("package `{importpath}` failed to parse")));
        }

        // A package compiles against its own fresh scope over the prelude —
        // it does not inherit whatever the importer has bound locally
        // (`Environment::lookup`'s package-prefixed lookup never walks the
        // importer's chain either).
        let pkg_base = Environment::extend(&self.prelude);
        for statement in &parse_result.ast.statements {
            if let rpl_ast::Statement::Import { importpath: nested, alias, .. } = statement {
                let nested_env = self.resolve_import(nested)?;
                let bind_name = alias.clone().unwrap_or_else(|| last_path_segment(nested));
                pkg_base.bind(bind_name, Binding::Package(nested_env));
            }
        }
        let program = rpl_compiler::compile_program(&parse_result.ast, &pkg_base);
        if !program.ok() {
            return Err(RplError::GrammarError(format!("package `{importpath}` failed to compile")));
        }
        Ok(self.package_cache.get_or_insert(importpath, || program.env))
    }
}

fn last_path_segment(importpath: &str) -> String {
    importpath.rsplit(['/', '.']).next().unwrap_or(importpath).to_string()
}

/// One compile/match engine (spec §6.1). Cheap to construct; expensive state
/// (the prelude, the package cache) is process-wide and shared.
pub struct Engine {
    inner: Mutex<EngineInner>,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let prelude = rpl_prelude::prelude();
        let env = Environment::extend(&prelude);
        Self {
            inner: Mutex::new(EngineInner {
                lib_path: config.lib_path,
                prelude,
                env,
                package_name: None,
                matchers: FastMap::default(),
                next_id: 1,
                alloc_ceiling: config.alloc_ceiling,
                collection_watermark: config.collection_watermark,
                loader: config.loader,
                package_cache: shared_package_cache(),
            }),
        }
    }

    /// Per spec §5: one engine is driven by one caller at a time. A second
    /// thread calling in concurrently observes `LockFailed` rather than
    /// blocking — that's a programmer error, not a resource to queue on. A
    /// poisoned lock (a previous call panicked mid-compile/match) is treated
    /// as fatal: the engine's internal state can no longer be trusted.
    fn lock(&self) -> rpl_core::Result<MutexGuard<'_, EngineInner>> {
        match self.inner.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(RplError::LockFailed),
            Err(TryLockError::Poisoned(_)) => {
                panic!("rpl engine mutex poisoned: a previous call panicked while holding it")
            }
        }
    }

    pub fn set_lib_path(&self, path: impl Into<PathBuf>) -> anyhow::Result<()> {
        self.lock()?.lib_path = Some(path.into());
        Ok(())
    }

    pub fn get_lib_path(&self) -> anyhow::Result<Option<PathBuf>> {
        Ok(self.lock()?.lib_path.clone())
    }

    pub fn set_alloc_limit(&self, limit: usize) -> anyhow::Result<()> {
        if limit < MIN_ALLOC_CEILING {
            return Err(RplError::BelowMinimumAllocLimit { requested: limit, minimum: MIN_ALLOC_CEILING }.into());
        }
        let mut inner = self.lock()?;
        inner.alloc_ceiling = limit;
        inner.collection_watermark = inner.collection_watermark.min(limit.saturating_sub(1).max(1));
        Ok(())
    }

    pub fn get_alloc_limit(&self) -> anyhow::Result<usize> {
        Ok(self.lock()?.alloc_ceiling)
    }

    /// Parses and compiles `bytes` as a full RPL file, extending the
    /// engine's working environment with whatever it binds (spec §6.1
    /// `load_source`). Imports named in the file are resolved first so
    /// `compile_program` sees them already bound.
    #[tracing::instrument(skip(self, bytes))]
    pub fn load_source(&self, bytes: &[u8]) -> anyhow::Result<LoadResult> {
        let mut inner = self.lock()?;
        let text = String::from_utf8_lossy(bytes).into_owned();
        let source = Arc::new(SourceText::new(Origin::Literal, text));
        let parse_result = rpl_parser::parse(source);

        for statement in &parse_result.ast.statements {
            if let rpl_ast::Statement::Import { importpath, alias, .. } = statement {
                let pkg_env = inner.resolve_import(importpath).context("resolving import")?;
                let bind_name = alias.clone().unwrap_or_else(|| last_path_segment(importpath));
                inner.env.bind(bind_name, Binding::Package(pkg_env));
            }
        }

        let program = rpl_compiler::compile_program(&parse_result.ast, &inner.env);
        let mut diagnostics = parse_result.diagnostics;
        diagnostics.extend(program.diagnostics.clone());
        let ok = program.ok();
        if ok {
            if let Some(name) = program.package_name.clone() {
                inner.package_name = Some(name);
            }
            inner.env = program.env;
        }
        Ok(LoadResult { ok, pkgname: inner.package_name.clone(), diagnostics })
    }

    /// Imports a package by path directly, without a surrounding `load_source`
    /// file (spec §6.1 `import_package`) — binds it under `alias`, or the
    /// importpath's last segment.
    #[tracing::instrument(skip(self))]
    pub fn import_package(&self, importpath: &str, alias: Option<&str>) -> anyhow::Result<ImportResult> {
        let mut inner = self.lock()?;
        match inner.resolve_import(importpath) {
            Ok(pkg_env) => {
                let bind_name = alias.map(str::to_string).unwrap_or_else(|| last_path_segment(importpath));
                inner.env.bind(bind_name.clone(), Binding::Package(pkg_env));
                Ok(ImportResult { ok: true, actual_pkgname: bind_name, diagnostics: Vec::new() })
            }
            Err(RplError::GrammarError(msg)) => {
                let source_ref = rpl_core::SourceRef::synthetic(Origin::Package(importpath.to_string()));
                let diag = Diagnostic::new(rpl_core::DiagnosticCode::GrammarError, msg, source_ref);
                Ok(ImportResult { ok: false, actual_pkgname: String::new(), diagnostics: vec![diag] })
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Compiles one bare expression against the engine's current
    /// environment, allocating a fresh `MatcherId` on success (spec §6.1
    /// `compile_expression`). If the expression itself doesn't parse, the
    /// compile phase never runs — the first parser diagnostic is returned
    /// on its own.
    #[tracing::instrument(skip(self, bytes))]
    pub fn compile_expression(&self, bytes: &[u8]) -> anyhow::Result<CompileResult> {
        let mut inner = self.lock()?;
        let text = String::from_utf8_lossy(bytes).into_owned();
        let source = Arc::new(SourceText::new(Origin::Literal, text));
        let parse_result = rpl_parser::parse_expression_only(source);
        if let Some(first) = parse_result.diagnostics.into_iter().next() {
            return Ok(CompileResult { matcher_id: None, diagnostics: vec![first] });
        }
        let expr = parse_result
            .ast
            .trailing_expression
            .expect("parse_expression_only always sets trailing_expression");

        let (matcher, diagnostics) = rpl_compiler::compile_expression(&expr, &inner.env);
        let matcher_id = matcher.map(|m| {
            let id = inner.next_id;
            inner.next_id += 1;
            inner.matchers.insert(id, m);
            id
        });
        Ok(CompileResult { matcher_id, diagnostics })
    }

    pub fn free_matcher(&self, id: MatcherId) -> anyhow::Result<()> {
        let inner = self.lock()?;
        if inner.matchers.remove(&id).is_none() {
            return Err(RplError::NoSuchMatcher(id).into());
        }
        Ok(())
    }

    fn matcher(inner: &EngineInner, id: MatcherId) -> rpl_core::Result<Matcher> {
        inner.matchers.get(&id).map(|entry| entry.value().clone()).ok_or(RplError::NoSuchMatcher(id))
    }

    /// Runs a compiled matcher against `input`, encoding the result with
    /// `encoder` (spec §6.1 `match`). Cancellation is internal-only here — a
    /// fresh, never-set flag — since this call is synchronous; the
    /// cooperative-cancel plumbing in `rpl-runtime` exists for embedders
    /// that drive a match from another thread and need to cut it short.
    #[tracing::instrument(skip(self, input))]
    pub fn run_match(&self, id: MatcherId, input: &[u8], encoder: &str) -> anyhow::Result<MatchResult> {
        let ttotal_start = Instant::now();
        let format = EncodeFormat::from_str(encoder).map_err(|e| RplError::NoSuchEncoder(e.0))?;
        let inner = self.lock()?;
        let matcher = Self::matcher(&inner, id)?;
        let limits = inner.run_limits();
        drop(inner);

        let cancel = AtomicBool::new(false);
        let tmatch_start = Instant::now();
        let outcome = rpl_runtime::run(&matcher, input, 0, limits, &cancel);
        let tmatch = tmatch_start.elapsed();
        let data = rpl_encoder::encode(format, &outcome, input);
        Ok(MatchResult { data, leftover: outcome.leftover, aborted: outcome.aborted, ttotal: ttotal_start.elapsed(), tmatch })
    }

    /// Like `run_match`, but records per-rule trace events as it goes (spec
    /// §6.1 `trace`).
    #[tracing::instrument(skip(self, input))]
    pub fn trace(&self, id: MatcherId, input: &[u8], style: TraceStyle) -> anyhow::Result<TraceResult> {
        let inner = self.lock()?;
        let matcher = Self::matcher(&inner, id)?;
        let limits = inner.run_limits();
        drop(inner);

        let cancel = AtomicBool::new(false);
        let mut events = Vec::new();
        let outcome = rpl_runtime::run_traced(&matcher, input, 0, limits, &cancel, Some(&mut events));
        let trace = match style {
            TraceStyle::Text => render_trace_text(&events),
            TraceStyle::Json => render_trace_json(&events).to_string(),
        };
        Ok(TraceResult { matched: outcome.ok, trace })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn render_trace_text(events: &[TraceEvent]) -> String {
    events
        .iter()
        .map(|event| match event {
            TraceEvent::RuleEnter { rule, pos } => format!("enter rule #{rule} at {pos}"),
            TraceEvent::ChoiceCommit { alt, pos } => format!("try alternative #{alt} at {pos}"),
            TraceEvent::Halted { pos } => format!("halt at {pos}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_trace_json(events: &[TraceEvent]) -> serde_json::Value {
    serde_json::Value::Array(
        events
            .iter()
            .map(|event| match event {
                TraceEvent::RuleEnter { rule, pos } => serde_json::json!({"kind": "rule_enter", "rule": rule, "pos": pos}),
                TraceEvent::ChoiceCommit { alt, pos } => serde_json::json!({"kind": "choice_commit", "alt": alt, "pos": pos}),
                TraceEvent::Halted { pos } => serde_json::json!({"kind": "halted", "pos": pos}),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::InMemoryLoader;
    use std::collections::HashMap;

    fn engine_with_packages(packages: &[(&str, &str)]) -> Engine {
        let mut map = HashMap::new();
        for (path, src) in packages {
            map.insert((*path).to_string(), src.as_bytes().to_vec());
        }
        Engine::with_config(EngineConfig { loader: Arc::new(InMemoryLoader(map)), ..EngineConfig::default() })
    }

    #[test]
    fn compiles_and_matches_a_bare_expression() {
        let engine = Engine::new();
        let compiled = engine.compile_expression(br#"find("x")"#).unwrap();
        assert!(compiled.diagnostics.is_empty());
        let id = compiled.matcher_id.expect("find(x) compiles");
        let out = engine.run_match(id, b"abxcd", "bool").unwrap();
        assert_eq!(out.data, EncodedData::Bool(true));
    }

    #[test]
    fn bare_leading_slash_fails_before_compiling() {
        let engine = Engine::new();
        let compiled = engine.compile_expression(b"/foo/").unwrap();
        assert!(compiled.matcher_id.is_none());
        assert_eq!(compiled.diagnostics.len(), 1);
        assert_eq!(compiled.diagnostics[0].code, rpl_core::DiagnosticCode::Syntax);
    }

    #[test]
    fn load_source_binds_a_rule_usable_by_a_later_compile() {
        let engine = Engine::new();
        let loaded = engine.load_source(br#"digits = [0-9]+"#).unwrap();
        assert!(loaded.ok, "{:?}", loaded.diagnostics);
        let compiled = engine.compile_expression(b"digits").unwrap();
        assert!(compiled.matcher_id.is_some());
    }

    #[test]
    fn free_matcher_then_match_reports_no_such_matcher() {
        let engine = Engine::new();
        let id = engine.compile_expression(b"\"a\"").unwrap().matcher_id.unwrap();
        engine.free_matcher(id).unwrap();
        let err = engine.run_match(id, b"a", "bool").unwrap_err();
        assert!(err.downcast_ref::<RplError>().is_some());
    }

    #[test]
    fn set_alloc_limit_rejects_values_below_the_minimum() {
        let engine = Engine::new();
        let err = engine.set_alloc_limit(1).unwrap_err();
        assert!(matches!(err.downcast_ref::<RplError>(), Some(RplError::BelowMinimumAllocLimit { .. })));
    }

    #[test]
    fn import_package_binds_a_package_prefixed_rule() {
        let engine = engine_with_packages(&[("net", "any = [0-9]+ \".\" [0-9]+ \".\" [0-9]+ \".\" [0-9]+")]);
        let result = engine.import_package("net", None).unwrap();
        assert!(result.ok, "{:?}", result.diagnostics);
        let compiled = engine.compile_expression(b"net.any").unwrap();
        assert!(compiled.matcher_id.is_some(), "{:?}", compiled.diagnostics);
        let id = compiled.matcher_id.unwrap();
        let out = engine.run_match(id, b"10.0.0.1", "bool").unwrap();
        assert_eq!(out.data, EncodedData::Bool(true));
    }

    #[test]
    fn reimporting_the_same_package_reuses_the_cached_environment() {
        let engine = engine_with_packages(&[("net", "any = [0-9]+")]);
        assert!(engine.import_package("net", None).unwrap().ok);
        assert!(engine.import_package("net", Some("n")).unwrap().ok);
        assert!(engine.compile_expression(b"n.any").unwrap().matcher_id.is_some());
    }

    #[test]
    fn trace_reports_whether_the_match_succeeded() {
        let engine = Engine::new();
        let id = engine.compile_expression(b"\"a\"").unwrap().matcher_id.unwrap();
        let traced = engine.trace(id, b"a", TraceStyle::Text).unwrap();
        assert!(traced.matched);
    }
}
