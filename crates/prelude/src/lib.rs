// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! The built-in RPL prelude (spec §4.3): a sealed [`Environment`] binding
//! the fixed patterns, macros, and pfunctions every package sees by
//! default.

mod builtins;
mod macros;

use rpl_ast::{Expr, ExprKind};
use rpl_core::SourceRef;
use rpl_env::{Binding, Environment, MacroFn, PfunctionFn};
use rpl_runtime::Matcher;
use std::sync::Arc;

/// Bridges a `(&[Expr], SourceRef) -> Result<Expr, String>` expansion
/// function into the shape `Environment` stores macros as: the environment
/// hands a macro the whole `application{...}` call site, not pre-split args.
fn as_macro(expand: fn(&[Expr], SourceRef) -> Result<Expr, String>) -> MacroFn {
    Arc::new(move |call: &Expr| match &call.kind {
        ExprKind::Application { args, .. } => expand(args, call.source_ref.clone()),
        _ => Err("macro invoked on a non-application expression".to_string()),
    })
}

fn as_pfunction(primop: fn(&[Expr]) -> Result<Matcher, String>) -> PfunctionFn {
    Arc::new(move |args: &[Expr]| primop(args))
}

/// Builds the sealed prelude scope. Every compiled engine's global
/// environment is `Environment::extend(&prelude())`.
pub fn prelude() -> Environment {
    let env = Environment::root();

    env.bind(".", Binding::pattern(builtins::dot_matcher(), true));
    env.bind("~", Binding::pattern(builtins::boundary_matcher(), true));
    env.bind("^", Binding::pattern(Matcher::start_anchor(), true));
    env.bind("$", Binding::pattern(Matcher::end_anchor(), true));
    env.bind("halt", Binding::pattern(Matcher::halt(), true));

    env.bind("find", Binding::Macro { primop: as_macro(macros::expand_find), ast: None });
    env.bind("findall", Binding::Macro { primop: as_macro(macros::expand_findall), ast: None });
    env.bind("keepto", Binding::Macro { primop: as_macro(macros::expand_keepto), ast: None });
    env.bind("ci", Binding::Macro { primop: as_macro(macros::expand_ci), ast: None });

    env.bind("message", Binding::Pfunction { primop: as_pfunction(builtins::message_primop), ast: None });
    env.bind("error", Binding::Pfunction { primop: as_pfunction(builtins::error_primop), ast: None });

    env.sealed()
}
