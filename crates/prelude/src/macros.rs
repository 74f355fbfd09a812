// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! Macro expansions (spec §4.3): pure AST→AST rewrites that run before
//! compilation. None of these inspect compiled matchers.

use rpl_ast::{Binding, Expr, ExprKind, PredicateKind};
use rpl_core::SourceRef;
use smallvec::smallvec;

fn single_arg<'a>(args: &'a [Expr], name: &str) -> Result<&'a Expr, String> {
    match args {
        [only] => Ok(only),
        _ => Err(format!("{name}() takes exactly one argument")),
    }
}

fn dot_ref(source_ref: SourceRef) -> Expr {
    Expr::new(ExprKind::Ref { localname: ".".to_string(), packagename: None }, source_ref)
}

fn rule_ref(name: &str, source_ref: SourceRef) -> Expr {
    Expr::new(ExprKind::Ref { localname: name.to_string(), packagename: None }, source_ref)
}

fn skip_until(target: &Expr, source_ref: SourceRef) -> Expr {
    let guarded_dot = Expr::new(
        ExprKind::Sequence(Box::new(smallvec![
            Expr::new(
                ExprKind::Predicate { kind: PredicateKind::Negation, exp: Box::new(target.clone()) },
                source_ref.clone(),
            ),
            dot_ref(source_ref.clone()),
        ])),
        source_ref.clone(),
    );
    Expr::new(ExprKind::Repetition { min: 0, max: None, exp: Box::new(guarded_dot), cooked: false }, source_ref)
}

/// `find(E)`: expands to the grammar `alias search = {!E .}*; alias find =
/// {search E}`. Both rules are aliases — `find` never wraps its own result
/// in a "find" node, which is what makes `find(find(E))` idempotent and
/// matches the property in spec §8. (This departs from the macro table's
/// literal, unaliased `find = {search E}` text, which would otherwise
/// introduce a spurious wrapper capture on every use.)
pub fn expand_find(args: &[Expr], source_ref: SourceRef) -> Result<Expr, String> {
    let target = single_arg(args, "find")?;
    Ok(build_find_grammar(target, source_ref))
}

fn build_find_grammar(target: &Expr, source_ref: SourceRef) -> Expr {
    let search = Binding {
        name: "search".to_string(),
        exp: skip_until(target, source_ref.clone()),
        is_alias: true,
        source_ref: source_ref.clone(),
    };
    // Raw: `{search E}` is a raw-mode sequence, no boundary spliced between parts.
    let find_body = Expr::new(
        ExprKind::Raw(Box::new(Expr::new(
            ExprKind::Sequence(Box::new(smallvec![rule_ref("search", source_ref.clone()), target.clone()])),
            source_ref.clone(),
        ))),
        source_ref.clone(),
    );
    let find = Binding { name: "find".to_string(), exp: find_body, is_alias: true, source_ref: source_ref.clone() };
    Expr::new(ExprKind::Grammar(vec![find, search]), source_ref)
}

/// `findall(E)`: `find(E)+`, raw-mode (no boundary spliced between
/// repetitions).
pub fn expand_findall(args: &[Expr], source_ref: SourceRef) -> Result<Expr, String> {
    let target = single_arg(args, "findall")?;
    let one_find = build_find_grammar(target, source_ref.clone());
    Ok(Expr::new(ExprKind::Repetition { min: 1, max: None, exp: Box::new(one_find), cooked: false }, source_ref))
}

/// `keepto(E)`: like `find` but also captures the skipped prefix, under the
/// name `skip`.
pub fn expand_keepto(args: &[Expr], source_ref: SourceRef) -> Result<Expr, String> {
    let target = single_arg(args, "keepto")?;
    let skip = Binding {
        name: "skip".to_string(),
        exp: skip_until(target, source_ref.clone()),
        is_alias: false,
        source_ref: source_ref.clone(),
    };
    // Raw for the same reason as find_body: no boundary between skip and E.
    let keepto_body = Expr::new(
        ExprKind::Raw(Box::new(Expr::new(
            ExprKind::Sequence(Box::new(smallvec![rule_ref("skip", source_ref.clone()), target.clone()])),
            source_ref.clone(),
        ))),
        source_ref.clone(),
    );
    let keepto =
        Binding { name: "keepto".to_string(), exp: keepto_body, is_alias: true, source_ref: source_ref.clone() };
    Ok(Expr::new(ExprKind::Grammar(vec![keepto, skip]), source_ref))
}

/// `ci(E)`: rewrites every literal byte inside `E` to a choice of its
/// lower/upper case. Leaves refs, charsets, and everything else untouched
/// (recursing into their children).
pub fn expand_ci(args: &[Expr], _source_ref: SourceRef) -> Result<Expr, String> {
    let target = single_arg(args, "ci")?;
    Ok(rewrite_case_insensitive(target))
}

fn rewrite_case_insensitive(expr: &Expr) -> Expr {
    let source_ref = expr.source_ref.clone();
    match &expr.kind {
        ExprKind::Literal(bytes) => case_insensitive_literal(bytes, source_ref),
        ExprKind::Sequence(xs) => {
            Expr::new(ExprKind::Sequence(Box::new(xs.iter().map(rewrite_case_insensitive).collect())), source_ref)
        }
        ExprKind::Choice(xs) => Expr::new(
            ExprKind::Choice(Box::new(xs.iter().map(rewrite_case_insensitive).collect())),
            source_ref,
        ),
        ExprKind::Predicate { kind, exp } => {
            Expr::new(ExprKind::Predicate { kind: *kind, exp: Box::new(rewrite_case_insensitive(exp)) }, source_ref)
        }
        ExprKind::Repetition { min, max, exp, cooked } => Expr::new(
            ExprKind::Repetition { min: *min, max: *max, exp: Box::new(rewrite_case_insensitive(exp)), cooked: *cooked },
            source_ref,
        ),
        ExprKind::Cooked(inner) => Expr::new(ExprKind::Cooked(Box::new(rewrite_case_insensitive(inner))), source_ref),
        ExprKind::Raw(inner) => Expr::new(ExprKind::Raw(Box::new(rewrite_case_insensitive(inner))), source_ref),
        ExprKind::Capture { name, exp } => Expr::new(
            ExprKind::Capture { name: name.clone(), exp: Box::new(rewrite_case_insensitive(exp)) },
            source_ref,
        ),
        _ => expr.clone(),
    }
}

fn case_insensitive_literal(bytes: &[u8], source_ref: SourceRef) -> Expr {
    if bytes.is_empty() {
        return Expr::new(ExprKind::Literal(Vec::new()), source_ref);
    }
    let parts: smallvec::SmallVec<[Expr; 4]> = bytes
        .iter()
        .map(|&b| {
            if b.is_ascii_alphabetic() {
                Expr::new(
                    ExprKind::CharList { chars: vec![b.to_ascii_lowercase(), b.to_ascii_uppercase()], complement: false },
                    source_ref.clone(),
                )
            } else {
                Expr::new(ExprKind::Literal(vec![b]), source_ref.clone())
            }
        })
        .collect();
    if parts.len() == 1 {
        parts.into_iter().next().unwrap()
    } else {
        Expr::new(ExprKind::Sequence(Box::new(parts)), source_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpl_core::{Origin, SourceRef};

    fn r() -> SourceRef {
        SourceRef::synthetic(Origin::Literal)
    }

    #[test]
    fn ci_rewrites_each_alphabetic_byte() {
        let lit = Expr::new(ExprKind::Literal(b"Hi!".to_vec()), r());
        let rewritten = expand_ci(&[lit], r()).unwrap();
        let ExprKind::Sequence(parts) = rewritten.kind else { panic!("expected sequence") };
        let parts = *parts;
        assert_eq!(parts.len(), 3);
        assert!(matches!(&parts[2].kind, ExprKind::Literal(b) if b == b"!"));
    }

    #[test]
    fn find_expands_to_aliased_grammar() {
        let lit = Expr::new(ExprKind::Literal(b"x".to_vec()), r());
        let expanded = expand_find(&[lit], r()).unwrap();
        let ExprKind::Grammar(rules) = expanded.kind else { panic!("expected grammar") };
        assert_eq!(rules.len(), 2);
        assert!(rules.iter().all(|b| b.is_alias));
    }

    #[test]
    fn keepto_makes_skip_non_alias() {
        let lit = Expr::new(ExprKind::Literal(b"x".to_vec()), r());
        let expanded = expand_keepto(&[lit], r()).unwrap();
        let ExprKind::Grammar(rules) = expanded.kind else { panic!("expected grammar") };
        let skip = rules.iter().find(|b| b.name == "skip").unwrap();
        assert!(!skip.is_alias);
    }
}
