// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pretty-printer: renders an [`Ast`] back to RPL source text.
//!
//! This is load-bearing, not cosmetic: spec §8's round-trip property
//! ("for any RPL source `S` that parses cleanly, re-parsing
//! `pretty_print(AST(S))` produces an AST structurally equal to the
//! original") depends on this module producing text the parser accepts and
//! that reconstructs an equivalent tree.

use crate::node::{Ast, Binding, Expr, ExprKind, PredicateKind, Statement};
use std::fmt::Write as _;

pub fn pretty_print(ast: &Ast) -> String {
    let mut out = String::new();
    if let Some((major, minor)) = ast.version {
        let _ = writeln!(out, "rpl {major}.{minor}");
    }
    for stmt in &ast.statements {
        print_statement(&mut out, stmt);
        out.push('\n');
    }
    if let Some(exp) = &ast.trailing_expression {
        print_expr(&mut out, exp);
        out.push('\n');
    }
    out
}

fn print_statement(out: &mut String, stmt: &Statement) {
    match stmt {
        Statement::Binding(b) => print_binding(out, b),
        Statement::Grammar { rules, .. } => {
            out.push_str("grammar\n");
            for rule in rules {
                out.push_str("  ");
                print_binding(out, rule);
                out.push('\n');
            }
            out.push_str("end");
        }
        Statement::Import { importpath, alias, .. } => {
            let _ = write!(out, "import \"{importpath}\"");
            if let Some(alias) = alias {
                let _ = write!(out, " as {alias}");
            }
        }
        Statement::Package { name, .. } => {
            let _ = write!(out, "package {name}");
        }
        Statement::SyntaxError { message, .. } => {
            let _ = write!(out, "-- syntax error: {message}");
        }
    }
}

fn print_binding(out: &mut String, binding: &Binding) {
    if binding.is_alias {
        out.push_str("alias ");
    }
    let _ = write!(out, "{} = ", binding.name);
    print_expr(out, &binding.exp);
}

fn print_expr(out: &mut String, expr: &Expr) {
    match &expr.kind {
        ExprKind::Literal(bytes) => {
            out.push('"');
            for &b in bytes {
                match b {
                    b'"' => out.push_str("\\\""),
                    b'\\' => out.push_str("\\\\"),
                    b'\n' => out.push_str("\\n"),
                    b'\t' => out.push_str("\\t"),
                    0x20..=0x7e => out.push(b as char),
                    _ => {
                        let _ = write!(out, "\\x{b:02x}");
                    }
                }
            }
            out.push('"');
        }
        ExprKind::Ref { localname, packagename } => {
            if let Some(pkg) = packagename {
                let _ = write!(out, "{pkg}.{localname}");
            } else {
                out.push_str(localname);
            }
        }
        ExprKind::Sequence(exps) => {
            for (i, e) in exps.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                print_atom(out, e);
            }
        }
        ExprKind::Choice(exps) => {
            for (i, e) in exps.iter().enumerate() {
                if i > 0 {
                    out.push_str(" / ");
                }
                print_atom(out, e);
            }
        }
        ExprKind::Predicate { kind, exp } => {
            out.push(match kind {
                PredicateKind::Negation => '!',
                PredicateKind::Lookahead => '&',
            });
            print_atom(out, exp);
        }
        ExprKind::Repetition { min, max, exp, .. } => {
            print_atom(out, exp);
            match (*min, *max) {
                (0, None) => out.push('*'),
                (1, None) => out.push('+'),
                (0, Some(1)) => out.push('?'),
                (min, Some(max)) if min == max => {
                    let _ = write!(out, "{{{min}}}");
                }
                (min, Some(max)) => {
                    let _ = write!(out, "{{{min},{max}}}");
                }
                (min, None) => {
                    let _ = write!(out, "{{{min},}}");
                }
            }
        }
        ExprKind::NamedCharset { name, complement } => {
            let comp = if *complement { "^" } else { "" };
            let _ = write!(out, "[{comp}[:{name}:]]");
        }
        ExprKind::Range { lo, hi, complement } => {
            let comp = if *complement { "^" } else { "" };
            let _ = write!(out, "[{comp}{}-{}]", escape_class_byte(*lo), escape_class_byte(*hi));
        }
        ExprKind::CharList { chars, complement } => {
            let comp = if *complement { "^" } else { "" };
            out.push('[');
            out.push_str(comp);
            for &c in chars {
                out.push_str(&escape_class_byte(c));
            }
            out.push(']');
        }
        ExprKind::Cooked(inner) => {
            out.push('(');
            print_expr(out, inner);
            out.push(')');
        }
        ExprKind::Raw(inner) => {
            out.push('{');
            print_expr(out, inner);
            out.push('}');
        }
        ExprKind::Capture { name, exp } => {
            let _ = write!(out, "{name}={{");
            print_expr(out, exp);
            out.push('}');
        }
        ExprKind::Grammar(rules) => {
            out.push_str("grammar ");
            for (i, rule) in rules.iter().enumerate() {
                if i > 0 {
                    out.push_str("; ");
                }
                print_binding(out, rule);
            }
            out.push_str(" end");
        }
        ExprKind::Application { macro_name, args } => {
            let _ = write!(out, "{macro_name}(");
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                print_expr(out, a);
            }
            out.push(')');
        }
        ExprKind::SyntaxError(message) => {
            let _ = write!(out, "--[[ error: {message} ]]");
        }
    }
}

/// Sequence/choice children need parens/braces around anything with lower
/// precedence than juxtaposition (sequence itself, and choice).
fn print_atom(out: &mut String, expr: &Expr) {
    match &expr.kind {
        ExprKind::Sequence(_) | ExprKind::Choice(_) => {
            out.push('(');
            print_expr(out, expr);
            out.push(')');
        }
        _ => print_expr(out, expr),
    }
}

fn escape_class_byte(b: u8) -> String {
    match b {
        b']' => "\\]".to_string(),
        b'^' => "\\^".to_string(),
        b'-' => "\\-".to_string(),
        b'\\' => "\\\\".to_string(),
        0x20..=0x7e => (b as char).to_string(),
        _ => format!("\\x{b:02x}"),
    }
}
