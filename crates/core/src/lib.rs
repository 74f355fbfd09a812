// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! Source model, diagnostics, and the shared error taxonomy used across the
//! rpl workspace. Every other `rpl-*` crate depends on this one and nothing
//! else upstream of it.

mod diagnostic;
mod error;
mod source;

pub use diagnostic::{all_recoverable, Diagnostic, DiagnosticCode, Severity};
pub use error::{RplError, Result};
pub use source::{Origin, SourceRef, SourceText};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn line_column_tracks_newlines() {
        let src = Arc::new(SourceText::new(Origin::Literal, "ab\ncd\nef"));
        assert_eq!(src.line_column(0), (1, 1));
        assert_eq!(src.line_column(3), (2, 1));
        assert_eq!(src.line_column(7), (3, 2));
    }

    #[test]
    fn diagnostic_render_has_caret() {
        let src = Arc::new(SourceText::new(Origin::Literal, "abc"));
        let source_ref = SourceRef::new(src, 1, 2);
        let diag = Diagnostic::new(DiagnosticCode::Syntax, "unexpected token", source_ref);
        let rendered = diag.render();
        assert!(rendered.contains('^'));
        assert!(rendered.contains("syntax-error"));
    }

    #[test]
    fn all_recoverable_ignores_warnings() {
        let src = Arc::new(SourceText::new(Origin::Literal, "x"));
        let r = SourceRef::new(src, 0, 1);
        let warn = Diagnostic::new(DiagnosticCode::VersionTooOld, "old version", r);
        assert!(all_recoverable(&[warn]));
    }
}
