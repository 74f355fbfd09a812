// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tagged AST node types for RPL (spec §3). Parsing produces an [`Ast`];
//! compilation consumes it. Trees are acyclic and immutable after parse.

mod node;
mod pretty;

pub use node::{Ast, Binding, Expr, ExprKind, ExprList, PredicateKind, Statement};
pub use pretty::pretty_print;

#[cfg(test)]
mod tests {
    use super::*;
    use rpl_core::{Origin, SourceRef, SourceText};
    use std::sync::Arc;

    fn r() -> SourceRef {
        SourceRef::synthetic(Origin::Literal)
    }

    #[test]
    fn pretty_print_literal_roundtrips_textually() {
        let ast = Ast {
            version: None,
            statements: vec![Statement::Binding(Binding {
                name: "greeting".into(),
                exp: Expr::new(ExprKind::Literal(b"hi".to_vec()), r()),
                is_alias: false,
                source_ref: r(),
            })],
            trailing_expression: None,
        };
        let text = pretty_print(&ast);
        assert_eq!(text.trim(), "greeting = \"hi\"");
    }

    #[test]
    fn structurally_eq_ignores_source_ref() {
        let src1 = Arc::new(SourceText::new(Origin::Literal, "a"));
        let src2 = Arc::new(SourceText::new(Origin::Literal, "different text"));
        let a = Expr::new(ExprKind::Literal(b"x".to_vec()), SourceRef::new(src1, 0, 1));
        let b = Expr::new(ExprKind::Literal(b"x".to_vec()), SourceRef::new(src2, 0, 5));
        assert!(a.structurally_eq(&b));
    }
}
