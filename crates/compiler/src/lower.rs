// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! AST → Matcher IR lowering (spec §4.4). Errors are collected as
//! diagnostics rather than aborting: a failing subexpression lowers to
//! [`never_matches`], letting the rest of the binding (and the rest of the
//! file) keep compiling.

use crate::grammar::{compile_grammar, finalize_rule};
use rpl_ast::{Expr, ExprKind, PredicateKind};
use rpl_core::{Diagnostic, DiagnosticCode};
use rpl_env::{Binding as EnvBinding, Environment};
use rpl_runtime::{ByteSet, Matcher, MatcherNode};

/// A matcher that never succeeds, used to stand in for a subexpression that
/// failed to compile, so the surrounding structure still lowers to
/// *something* and compilation can continue looking for more problems.
pub fn never_matches() -> Matcher {
    Matcher::new(MatcherNode::Choice(Vec::new()))
}

pub fn lower_with_mode(expr: &Expr, env: &Environment, cooked: bool, grammar_mode: bool, diags: &mut Vec<Diagnostic>) -> Matcher {
    match &expr.kind {
        ExprKind::Literal(bytes) => Matcher::literal(bytes.clone()),

        ExprKind::Ref { localname, packagename } => match env.lookup(localname, packagename.as_deref()) {
            Some(EnvBinding::Pattern { matcher, .. }) => matcher,
            Some(_) => {
                diags.push(Diagnostic::new(
                    DiagnosticCode::UndefinedIdentifier,
                    format!("`{localname}` is not a pattern"),
                    expr.source_ref.clone(),
                ));
                never_matches()
            }
            None => {
                diags.push(Diagnostic::new(
                    DiagnosticCode::UndefinedIdentifier,
                    format!("undefined identifier `{localname}`"),
                    expr.source_ref.clone(),
                ));
                never_matches()
            }
        },

        ExprKind::Sequence(xs) => {
            let lowered: Vec<Matcher> = xs.iter().map(|x| lower_with_mode(x, env, cooked, grammar_mode, diags)).collect();
            splice_boundary(lowered, cooked, env)
        }

        ExprKind::Choice(xs) => {
            Matcher::choice(xs.iter().map(|x| lower_with_mode(x, env, cooked, grammar_mode, diags)).collect())
        }

        ExprKind::Predicate { kind, exp } => {
            let inner = lower_with_mode(exp, env, cooked, grammar_mode, diags);
            match kind {
                PredicateKind::Negation => Matcher::negative(inner),
                PredicateKind::Lookahead => Matcher::lookahead(inner),
            }
        }

        ExprKind::Repetition { min, max, exp, cooked: rep_cooked } => {
            let body = lower_with_mode(exp, env, *rep_cooked, grammar_mode, diags);
            if let Some(mx) = max {
                if min > mx {
                    diags.push(Diagnostic::new(
                        DiagnosticCode::RepetitionRange,
                        format!("repetition bound {{{min},{mx}}} has min > max"),
                        expr.source_ref.clone(),
                    ));
                    return never_matches();
                }
            }
            if !grammar_mode && max.is_none() && body.can_match_empty() {
                diags.push(Diagnostic::new(
                    DiagnosticCode::QuantifiedEmpty,
                    "repetition body can match the empty string, which would loop forever",
                    expr.source_ref.clone(),
                ));
                return never_matches();
            }
            build_repeat(*min, *max, body, *rep_cooked, env)
        }

        ExprKind::NamedCharset { name, complement } => match ByteSet::named(name) {
            Some(set) => Matcher::charset(if *complement { set.complement() } else { set }),
            None => {
                diags.push(Diagnostic::new(
                    DiagnosticCode::UndefinedCharset,
                    format!("undefined character class `[:{name}:]`"),
                    expr.source_ref.clone(),
                ));
                never_matches()
            }
        },

        ExprKind::Range { lo, hi, complement } => {
            let set = ByteSet::range(*lo, *hi);
            Matcher::charset(if *complement { set.complement() } else { set })
        }

        ExprKind::CharList { chars, complement } => {
            let set = ByteSet::from_bytes(chars);
            Matcher::charset(if *complement { set.complement() } else { set })
        }

        ExprKind::Cooked(inner) => lower_with_mode(inner, env, true, grammar_mode, diags),
        ExprKind::Raw(inner) => lower_with_mode(inner, env, false, grammar_mode, diags),

        ExprKind::Capture { name, exp } => {
            let raw = lower_with_mode(exp, env, cooked, grammar_mode, diags);
            finalize_rule(&raw, false, name)
        }

        ExprKind::Grammar(rules) => {
            let result = compile_grammar(rules, env, diags);
            if result.ok {
                Matcher::grammar(result.rules, 0)
            } else {
                never_matches()
            }
        }

        ExprKind::Application { macro_name, .. } => {
            diags.push(Diagnostic::new(
                DiagnosticCode::UndefinedIdentifier,
                format!("unexpanded macro application `{macro_name}`"),
                expr.source_ref.clone(),
            ));
            never_matches()
        }

        ExprKind::SyntaxError(message) => {
            diags.push(Diagnostic::new(DiagnosticCode::Syntax, message.clone(), expr.source_ref.clone()));
            never_matches()
        }
    }
}

fn splice_boundary(parts: Vec<Matcher>, cooked: bool, env: &Environment) -> Matcher {
    if !cooked || parts.len() < 2 {
        return Matcher::sequence(parts);
    }
    let Some(boundary) = boundary_matcher(env) else {
        return Matcher::sequence(parts);
    };
    let mut spliced = Vec::with_capacity(parts.len() * 2 - 1);
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 {
            spliced.push(boundary.clone());
        }
        spliced.push(part);
    }
    Matcher::sequence(spliced)
}

fn boundary_matcher(env: &Environment) -> Option<Matcher> {
    match env.lookup("~", None) {
        Some(EnvBinding::Pattern { matcher, .. }) => Some(matcher),
        _ => None,
    }
}

/// Builds a bounded/unbounded repetition, splicing `~` between copies in
/// cooked mode per spec §4.4/§4.6's four formulas: `e1 ~ e2`, `(e ~)+`,
/// `(e (~ e)*)?`, and `e{n,m} -> e ~ e ... ~ e`.
fn build_repeat(min: u32, max: Option<u32>, body: Matcher, cooked: bool, env: &Environment) -> Matcher {
    let boundary = if cooked { boundary_matcher(env) } else { None };
    let Some(b) = boundary else {
        return build_repeat_raw(min, max, body);
    };

    match (min, max) {
        (0, None) => Matcher::opt(Matcher::sequence(vec![
            body.clone(),
            Matcher::star(Matcher::sequence(vec![b, body])),
        ])),
        (1, None) => Matcher::plus(Matcher::sequence(vec![body, b])),
        (0, Some(1)) => Matcher::opt(body),
        (0, Some(0)) => Matcher::literal(Vec::new()),
        (min, max) => {
            let mut mandatory = Vec::with_capacity(min as usize * 2);
            for i in 0..min {
                if i > 0 {
                    mandatory.push(b.clone());
                }
                mandatory.push(body.clone());
            }
            match max {
                None => Matcher::sequence(vec![
                    Matcher::sequence(mandatory),
                    Matcher::star(Matcher::sequence(vec![b, body])),
                ]),
                Some(max) => {
                    let mut tail: Option<Matcher> = None;
                    for _ in 0..(max - min) {
                        let seq = match tail {
                            Some(t) => Matcher::sequence(vec![b.clone(), body.clone(), t]),
                            None => Matcher::sequence(vec![b.clone(), body.clone()]),
                        };
                        tail = Some(Matcher::opt(seq));
                    }
                    match tail {
                        Some(t) => Matcher::sequence(vec![Matcher::sequence(mandatory), t]),
                        None => Matcher::sequence(mandatory),
                    }
                }
            }
        }
    }
}

fn build_repeat_raw(min: u32, max: Option<u32>, body: Matcher) -> Matcher {
    match (min, max) {
        (0, None) => Matcher::star(body),
        (1, None) => Matcher::plus(body),
        (0, Some(1)) => Matcher::opt(body),
        (0, Some(0)) => Matcher::literal(Vec::new()),
        (min, max) => Matcher::repeat(min, max, body),
    }
}
