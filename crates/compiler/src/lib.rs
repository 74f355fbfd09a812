// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! Lowers RPL source's AST into the matcher IR (spec §4.4):
//! `compile(ast, env) -> (Matcher, [Diagnostic])`. Collects diagnostics
//! rather than failing fast, so one pass surfaces as many problems as
//! possible.

mod grammar;
mod lower;
mod macro_expand;

use lower::lower_with_mode;
use macro_expand::expand_macros;
use rpl_ast::{Ast, Expr, Statement};
use rpl_core::{Diagnostic, DiagnosticCode, Severity};
use rpl_env::{Binding, Environment};
use rpl_runtime::Matcher;

/// The RPL major version this compiler implements (spec §6.2's `rpl M.m`
/// version declaration).
pub const SUPPORTED_MAJOR: u32 = 1;

pub struct CompiledProgram {
    pub env: Environment,
    pub package_name: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompiledProgram {
    pub fn ok(&self) -> bool {
        rpl_core::all_recoverable(&self.diagnostics)
    }
}

/// Compiles every top-level statement of `ast` into a child scope of
/// `base_env` (typically the prelude, possibly itself extended by imports).
/// `import` statements are not resolved here — loading package sources is
/// the external loader's job (spec §4.4); the caller is expected to have
/// already bound any imported package names into `base_env` before calling
/// this function.
pub fn compile_program(ast: &Ast, base_env: &Environment) -> CompiledProgram {
    let env = Environment::extend(base_env);
    let mut diagnostics = Vec::new();
    let mut package_name = None;

    if let Some((major, _minor)) = ast.version {
        if major > SUPPORTED_MAJOR {
            diagnostics.push(Diagnostic::new(
                DiagnosticCode::VersionTooNew,
                format!("this file requires rpl {major}.x, which this compiler does not support"),
                rpl_core::SourceRef::synthetic(rpl_core::Origin::Literal),
            ));
        } else if major < SUPPORTED_MAJOR {
            diagnostics.push(Diagnostic::new(
                DiagnosticCode::VersionTooOld,
                format!("this file declares rpl {major}.x; compiling under {SUPPORTED_MAJOR}.x semantics"),
                rpl_core::SourceRef::synthetic(rpl_core::Origin::Literal),
            ));
        }
    }

    for statement in &ast.statements {
        match statement {
            Statement::Package { name, .. } => package_name = Some(name.clone()),
            Statement::Import { .. } => {}
            Statement::SyntaxError { message, source_ref } => {
                diagnostics.push(Diagnostic::new(DiagnosticCode::Syntax, message.clone(), source_ref.clone()));
            }
            Statement::Binding(binding) => {
                let expanded = match expand_macros(&binding.exp, &env) {
                    Ok(expanded) => expanded,
                    Err(diagnostic) => {
                        diagnostics.push(diagnostic);
                        continue;
                    }
                };
                let raw = lower_with_mode(&expanded, &env, true, false, &mut diagnostics);
                let compiled = grammar::finalize_rule(&raw, binding.is_alias, &binding.name);
                env.bind(&binding.name, Binding::pattern(compiled, binding.is_alias));
            }
            Statement::Grammar { rules, .. } => {
                let expanded_rules: Result<Vec<_>, _> = rules
                    .iter()
                    .map(|rule| {
                        expand_macros(&rule.exp, &env)
                            .map(|exp| rpl_ast::Binding { exp, ..rule.clone() })
                    })
                    .collect();
                let expanded_rules = match expanded_rules {
                    Ok(rules) => rules,
                    Err(diagnostic) => {
                        diagnostics.push(diagnostic);
                        continue;
                    }
                };
                let result = grammar::compile_grammar(&expanded_rules, &env, &mut diagnostics);
                if result.ok {
                    for (i, rule) in expanded_rules.iter().enumerate() {
                        let m = Matcher::grammar(result.rules.clone(), i);
                        env.bind(&rule.name, Binding::pattern(m, rule.is_alias));
                    }
                }
            }
        }
    }

    CompiledProgram { env, package_name, diagnostics }
}

/// Compiles one bare expression (spec §6.1 `compile_expression`, used for
/// REPL-style ad hoc patterns), against an already-extended environment
/// (typically a program's compiled `env`, or the prelude directly).
pub fn compile_expression(expr: &Expr, env: &Environment) -> (Option<Matcher>, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    let expanded = match expand_macros(expr, env) {
        Ok(expanded) => expanded,
        Err(diagnostic) => {
            diagnostics.push(diagnostic);
            return (None, diagnostics);
        }
    };
    let matcher = lower_with_mode(&expanded, env, true, false, &mut diagnostics);
    let ok = diagnostics.iter().all(|d| d.severity() != Severity::Error);
    (if ok { Some(matcher) } else { None }, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpl_ast::{Binding as AstBinding, ExprKind};
    use rpl_core::{Origin, SourceRef};
    use rpl_prelude::prelude;

    fn r() -> SourceRef {
        SourceRef::synthetic(Origin::Literal)
    }

    fn literal(bytes: &[u8]) -> Expr {
        Expr::new(ExprKind::Literal(bytes.to_vec()), r())
    }

    #[test]
    fn compiles_a_simple_literal_binding() {
        let ast = Ast {
            version: None,
            statements: vec![Statement::Binding(AstBinding {
                name: "greeting".to_string(),
                exp: literal(b"hello"),
                is_alias: false,
                source_ref: r(),
            })],
            trailing_expression: None,
        };
        let program = compile_program(&ast, &prelude());
        assert!(program.ok());
        assert!(program.env.lookup("greeting", None).is_some());
    }

    #[test]
    fn undefined_ref_produces_a_diagnostic_and_keeps_compiling() {
        let bad_ref = Expr::new(ExprKind::Ref { localname: "nope".to_string(), packagename: None }, r());
        let (matcher, diags) = compile_expression(&bad_ref, &prelude());
        assert!(matcher.is_none());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, DiagnosticCode::UndefinedIdentifier);
    }

    #[test]
    fn quantified_empty_is_rejected() {
        let empty_star = Expr::new(
            ExprKind::Repetition {
                min: 0,
                max: None,
                exp: Box::new(Expr::new(ExprKind::Literal(Vec::new()), r())),
                cooked: false,
            },
            r(),
        );
        let (matcher, diags) = compile_expression(&empty_star, &prelude());
        assert!(matcher.is_none());
        assert_eq!(diags[0].code, DiagnosticCode::QuantifiedEmpty);
    }

    #[test]
    fn mutually_recursive_grammar_compiles() {
        let s_ref = Expr::new(ExprKind::Ref { localname: "s".to_string(), packagename: None }, r());
        let body = Expr::new(
            ExprKind::Choice(Box::new(smallvec::smallvec![
                Expr::new(ExprKind::Sequence(Box::new(smallvec::smallvec![literal(b"a"), s_ref])), r()),
                literal(b""),
            ])),
            r(),
        );
        let ast = Ast {
            version: None,
            statements: vec![Statement::Grammar {
                rules: vec![AstBinding { name: "s".to_string(), exp: body, is_alias: false, source_ref: r() }],
                source_ref: r(),
            }],
            trailing_expression: None,
        };
        let program = compile_program(&ast, &prelude());
        assert!(program.ok());
        let Some(Binding::Pattern { matcher, .. }) = program.env.lookup("s", None) else { panic!("missing s") };
        let out = rpl_runtime::run(&matcher, b"aaab", 0, Default::default(), &std::sync::atomic::AtomicBool::new(false));
        assert!(out.ok);
    }

    #[test]
    fn direct_left_recursion_is_a_grammar_error() {
        let self_ref = Expr::new(ExprKind::Ref { localname: "a".to_string(), packagename: None }, r());
        let ast = Ast {
            version: None,
            statements: vec![Statement::Grammar {
                rules: vec![AstBinding { name: "a".to_string(), exp: self_ref, is_alias: false, source_ref: r() }],
                source_ref: r(),
            }],
            trailing_expression: None,
        };
        let program = compile_program(&ast, &prelude());
        assert!(!program.ok());
        assert_eq!(program.diagnostics[0].code, DiagnosticCode::GrammarError);
    }

    #[test]
    fn find_macro_compiles_through_the_full_pipeline() {
        let target = literal(b"x");
        let call = Expr::new(ExprKind::Application { macro_name: "find".to_string(), args: vec![target] }, r());
        let (matcher, diags) = compile_expression(&call, &prelude());
        assert!(diags.is_empty());
        let matcher = matcher.expect("find compiles");
        let out = rpl_runtime::run(&matcher, b"abx", 0, Default::default(), &std::sync::atomic::AtomicBool::new(false));
        assert!(out.ok);
    }
}
