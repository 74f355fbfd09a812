// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! Macro expansion pass (spec §4.3/§4.4): runs before lowering, rewriting
//! every `application{...}` node bottom-up so nested macro calls (e.g.
//! `find(ci(x))`) resolve inner-out.

use rpl_ast::{Binding as AstBinding, Expr, ExprKind};
use rpl_core::{Diagnostic, DiagnosticCode};
use rpl_env::{Binding as EnvBinding, Environment};

pub fn expand_macros(expr: &Expr, env: &Environment) -> Result<Expr, Diagnostic> {
    let source_ref = expr.source_ref.clone();
    let kind = match &expr.kind {
        ExprKind::Application { macro_name, args } => {
            let expanded_args =
                args.iter().map(|a| expand_macros(a, env)).collect::<Result<Vec<_>, _>>()?;
            let call = Expr::new(
                ExprKind::Application { macro_name: macro_name.clone(), args: expanded_args },
                source_ref.clone(),
            );
            return match env.lookup(macro_name, None) {
                Some(EnvBinding::Macro { primop, .. }) => primop(&call).map_err(|msg| {
                    Diagnostic::new(DiagnosticCode::Syntax, format!("{macro_name}(): {msg}"), source_ref)
                }),
                Some(_) => Err(Diagnostic::new(
                    DiagnosticCode::UndefinedIdentifier,
                    format!("`{macro_name}` is not a macro"),
                    source_ref,
                )),
                None => Err(Diagnostic::new(
                    DiagnosticCode::UndefinedIdentifier,
                    format!("undefined macro `{macro_name}`"),
                    source_ref,
                )),
            };
        }
        ExprKind::Sequence(xs) => {
            ExprKind::Sequence(Box::new(xs.iter().map(|x| expand_macros(x, env)).collect::<Result<_, _>>()?))
        }
        ExprKind::Choice(xs) => {
            ExprKind::Choice(Box::new(xs.iter().map(|x| expand_macros(x, env)).collect::<Result<_, _>>()?))
        }
        ExprKind::Predicate { kind, exp } => {
            ExprKind::Predicate { kind: *kind, exp: Box::new(expand_macros(exp, env)?) }
        }
        ExprKind::Repetition { min, max, exp, cooked } => ExprKind::Repetition {
            min: *min,
            max: *max,
            exp: Box::new(expand_macros(exp, env)?),
            cooked: *cooked,
        },
        ExprKind::Cooked(inner) => ExprKind::Cooked(Box::new(expand_macros(inner, env)?)),
        ExprKind::Raw(inner) => ExprKind::Raw(Box::new(expand_macros(inner, env)?)),
        ExprKind::Capture { name, exp } => {
            ExprKind::Capture { name: name.clone(), exp: Box::new(expand_macros(exp, env)?) }
        }
        ExprKind::Grammar(rules) => ExprKind::Grammar(
            rules
                .iter()
                .map(|rule| -> Result<AstBinding, Diagnostic> {
                    Ok(AstBinding { exp: expand_macros(&rule.exp, env)?, ..rule.clone() })
                })
                .collect::<Result<_, _>>()?,
        ),
        ExprKind::Literal(_)
        | ExprKind::Ref { .. }
        | ExprKind::NamedCharset { .. }
        | ExprKind::Range { .. }
        | ExprKind::CharList { .. }
        | ExprKind::SyntaxError(_) => expr.kind.clone(),
    };
    Ok(Expr::new(kind, source_ref))
}
