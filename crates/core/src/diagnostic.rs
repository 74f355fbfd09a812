// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! Diagnostics: the unit of error reporting for the parser and compiler.
//! Both collect a `Vec<Diagnostic>` rather than failing fast (§7: "parse and
//! compile collect diagnostics and return them in a list together with a
//! success/failure flag").

use crate::source::SourceRef;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    Warning,
    Error,
}

/// The error taxonomy from spec §7. Not every kind carries the same payload,
/// but all of them render through `Diagnostic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiagnosticCode {
    Syntax,
    UndefinedIdentifier,
    UndefinedCharset,
    QuantifiedEmpty,
    RepetitionRange,
    UnknownQuantifier,
    InvalidEscape,
    GrammarError,
    VersionTooNew,
    VersionTooOld,
}

impl DiagnosticCode {
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticCode::VersionTooOld => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCode::Syntax => "syntax-error",
            DiagnosticCode::UndefinedIdentifier => "undefined-identifier",
            DiagnosticCode::UndefinedCharset => "undefined-charset",
            DiagnosticCode::QuantifiedEmpty => "quantified-empty",
            DiagnosticCode::RepetitionRange => "repetition-range",
            DiagnosticCode::UnknownQuantifier => "unknown-quantifier",
            DiagnosticCode::InvalidEscape => "invalid-escape",
            DiagnosticCode::GrammarError => "grammar-error",
            DiagnosticCode::VersionTooNew => "version-too-new",
            DiagnosticCode::VersionTooOld => "version-too-old",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub message: String,
    pub source_ref: SourceRef,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>, source_ref: SourceRef) -> Self {
        Self { code, message: message.into(), source_ref }
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Pretty-print with a caret under the offending excerpt, per §7:
    /// "a pretty-printed excerpt with a caret".
    pub fn render(&self) -> String {
        let (line, col) = self.source_ref.position();
        let line_text = self.source_ref.source.line_text(self.source_ref.start);
        let caret_col = col.saturating_sub(1);
        let caret_line: String = std::iter::repeat(' ').take(caret_col).chain(std::iter::once('^')).collect();
        format!(
            "{severity}[{code}] {origin}:{line}:{col}: {message}\n  {line_text}\n  {caret_line}",
            severity = match self.severity() {
                Severity::Warning => "warning",
                Severity::Error => "error",
            },
            code = self.code.as_str(),
            origin = self.source_ref.origin(),
            line = line,
            col = col,
            message = self.message,
            line_text = line_text,
            caret_line = caret_line,
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// `true` iff none of the diagnostics are errors (warnings alone don't fail
/// a parse/compile per §7).
pub fn all_recoverable(diags: &[Diagnostic]) -> bool {
    diags.iter().all(|d| d.severity() != Severity::Error)
}
