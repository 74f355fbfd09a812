// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! Source text with byte offsets, and the back-reference every AST node and
//! diagnostic carries into it.

use std::fmt;
use std::sync::Arc;

/// Where a piece of source text came from: an import path, or one of the
/// engine's own synthetic sources (the prelude, a macro expansion).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Origin {
    /// A package loaded via `import "importpath"`.
    Package(String),
    /// Source passed directly to `load_source`/`compile_expression`.
    Literal,
    /// One of the built-in prelude definitions.
    BuiltIn,
    /// AST produced by macro expansion (`find`, `ci`, ...), not present in
    /// any user-written text.
    MacroExpansion(String),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Package(path) => write!(f, "{path}"),
            Origin::Literal => write!(f, "<literal>"),
            Origin::BuiltIn => write!(f, "<built-in>"),
            Origin::MacroExpansion(name) => write!(f, "<{name} expansion>"),
        }
    }
}

/// A loaded source text, shared (cheaply cloned) across every `SourceRef`
/// that points into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    pub origin: Origin,
    pub text: Arc<str>,
}

impl SourceText {
    pub fn new(origin: Origin, text: impl Into<Arc<str>>) -> Self {
        Self { origin, text: text.into() }
    }

    /// Resolve a byte offset to a 1-based `(line, column)` pair.
    pub fn line_column(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.text.len());
        let mut line = 1usize;
        let mut col = 1usize;
        for byte in self.text.as_bytes()[..offset].iter() {
            if *byte == b'\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        (line, col)
    }

    /// The full line of text containing `offset`, without its trailing
    /// newline.
    pub fn line_text(&self, offset: usize) -> &str {
        let offset = offset.min(self.text.len());
        let bytes = self.text.as_bytes();
        let start = bytes[..offset].iter().rposition(|b| *b == b'\n').map_or(0, |p| p + 1);
        let end = bytes[offset..].iter().position(|b| *b == b'\n').map_or(self.text.len(), |p| offset + p);
        &self.text[start..end]
    }
}

/// A `{origin, start, end, text}` back-reference into a loaded source.
///
/// `start`/`end` are byte offsets, `end` exclusive. `text` is a shared handle
/// to the full source so diagnostics can render an excerpt without
/// re-reading anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub source: Arc<SourceText>,
    pub start: usize,
    pub end: usize,
}

impl SourceRef {
    pub fn new(source: Arc<SourceText>, start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { source, start, end }
    }

    /// A `SourceRef` that doesn't point anywhere real, used for AST
    /// produced entirely by macro expansion before any position tracking.
    pub fn synthetic(origin: Origin) -> Self {
        let source = Arc::new(SourceText::new(origin, ""));
        Self { source, start: 0, end: 0 }
    }

    pub fn excerpt(&self) -> &str {
        &self.source.text[self.start.min(self.source.text.len())..self.end.min(self.source.text.len())]
    }

    pub fn origin(&self) -> &Origin {
        &self.source.origin
    }

    /// The 1-based `(line, column)` of `start`.
    pub fn position(&self) -> (usize, usize) {
        self.source.line_column(self.start)
    }
}
