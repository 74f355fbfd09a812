// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! Grammar compilation (spec §4.4 step 3): left-recursion detection, knot-
//! tying of mutually recursive rules into one fixed-point [`Matcher`].

use crate::lower::lower_with_mode;
use rpl_ast::{Binding as AstBinding, Expr, ExprKind, PredicateKind};
use rpl_core::{Diagnostic, DiagnosticCode};
use rpl_env::{Binding as EnvBinding, Environment};
use rpl_runtime::{Matcher, MatcherNode};

pub struct GrammarResult {
    pub rules: Vec<Matcher>,
    pub ok: bool,
}

/// Compiles a set of mutually recursive rule bodies into one knot-tied
/// `Matcher::Grammar`. Every rule name is forward-declared as a `RuleRef`
/// before any body is lowered, so mutual recursion resolves without a
/// fixed-point iteration in this crate — the runtime ties the actual knot.
pub fn compile_grammar(rules: &[AstBinding], env: &Environment, diags: &mut Vec<Diagnostic>) -> GrammarResult {
    if let Some(cycle_at) = find_left_recursion(rules) {
        diags.push(Diagnostic::new(
            DiagnosticCode::GrammarError,
            format!("left-recursive grammar rule `{}`", rules[cycle_at].name),
            rules[cycle_at].source_ref.clone(),
        ));
        return GrammarResult { rules: Vec::new(), ok: false };
    }

    let child = Environment::extend(env);
    for (i, rule) in rules.iter().enumerate() {
        child.bind(&rule.name, EnvBinding::pattern(Matcher::rule_ref(i), rule.is_alias));
    }

    let compiled = rules
        .iter()
        .map(|rule| {
            let raw = lower_with_mode(&rule.exp, &child, true, true, diags);
            finalize_rule(&raw, rule.is_alias, &rule.name)
        })
        .collect();

    GrammarResult { rules: compiled, ok: true }
}

/// `name = exp` implicitly captures under `name` unless the binding is an
/// `alias`. If `exp` already lowered to its own capture (a plain reference
/// to another named, non-alias rule), re-capture by swapping the label onto
/// the inner uncaptured form rather than nesting two capture nodes (spec
/// §4.4's "uncaptured inner" trick).
pub fn finalize_rule(raw: &Matcher, is_alias: bool, name: &str) -> Matcher {
    if is_alias {
        return raw.clone();
    }
    match raw.node() {
        MatcherNode::Capture { body, .. } => Matcher::capture(name, body.as_ref().clone()),
        _ => Matcher::capture(name, raw.clone()),
    }
}

fn find_left_recursion(rules: &[AstBinding]) -> Option<usize> {
    let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
    let adjacency: Vec<Vec<usize>> = rules
        .iter()
        .map(|r| leftmost_local_refs(&r.exp).into_iter().filter_map(|n| names.iter().position(|nm| *nm == n)).collect())
        .collect();

    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Unvisited,
        InStack,
        Done,
    }
    let mut state = vec![State::Unvisited; rules.len()];

    fn dfs(i: usize, adjacency: &[Vec<usize>], state: &mut [State]) -> Option<usize> {
        state[i] = State::InStack;
        for &j in &adjacency[i] {
            match state[j] {
                State::InStack => return Some(j),
                State::Unvisited => {
                    if let Some(cycle_at) = dfs(j, adjacency, state) {
                        return Some(cycle_at);
                    }
                }
                State::Done => {}
            }
        }
        state[i] = State::Done;
        None
    }

    for i in 0..rules.len() {
        if state[i] == State::Unvisited {
            if let Some(cycle_at) = dfs(i, &adjacency, &mut state) {
                return Some(cycle_at);
            }
        }
    }
    None
}

/// The set of rule names an expression could try to match *first*, without
/// having consumed any input yet — the candidates for a left-recursive
/// cycle. Zero-width predicates don't advance the input themselves, but
/// their body is still "first", so we recurse into them too.
fn leftmost_local_refs(expr: &Expr) -> Vec<String> {
    match &expr.kind {
        ExprKind::Ref { localname, packagename: None } => vec![localname.clone()],
        ExprKind::Sequence(xs) => xs.first().map(leftmost_local_refs).unwrap_or_default(),
        ExprKind::Choice(xs) => xs.iter().flat_map(leftmost_local_refs).collect(),
        ExprKind::Repetition { min, exp, .. } if *min > 0 => leftmost_local_refs(exp),
        ExprKind::Cooked(inner) | ExprKind::Raw(inner) => leftmost_local_refs(inner),
        ExprKind::Capture { exp, .. } => leftmost_local_refs(exp),
        ExprKind::Predicate { kind: PredicateKind::Lookahead, exp } => leftmost_local_refs(exp),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpl_core::{Origin, SourceRef};

    fn r() -> SourceRef {
        SourceRef::synthetic(Origin::Literal)
    }

    fn rule(name: &str, exp: Expr) -> AstBinding {
        AstBinding { name: name.to_string(), exp, is_alias: false, source_ref: r() }
    }

    fn reference(name: &str) -> Expr {
        Expr::new(ExprKind::Ref { localname: name.to_string(), packagename: None }, r())
    }

    #[test]
    fn detects_direct_left_recursion() {
        let rules = vec![rule("a", reference("a"))];
        assert_eq!(find_left_recursion(&rules), Some(0));
    }

    #[test]
    fn allows_mutual_non_left_recursive_rules() {
        let s_body = Expr::new(
            ExprKind::Choice(Box::new(smallvec::smallvec![
                Expr::new(
                    ExprKind::Sequence(Box::new(smallvec::smallvec![
                        Expr::new(ExprKind::Literal(b"a".to_vec()), r()),
                        reference("s"),
                    ])),
                    r(),
                ),
                Expr::new(ExprKind::Literal(Vec::new()), r()),
            ])),
            r(),
        );
        let rules = vec![rule("s", s_body)];
        assert_eq!(find_left_recursion(&rules), None);
    }
}
