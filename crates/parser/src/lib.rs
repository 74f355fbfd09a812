// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! Recursive-descent parser for RPL source text (spec §4.1, §6.2).
//!
//! `parse` never panics and never fails outright: a malformed statement or
//! expression lowers to an in-tree [`ExprKind::SyntaxError`] /
//! [`Statement::SyntaxError`] placeholder, a [`Diagnostic`] is recorded, and
//! the parser resynchronizes at the next likely statement boundary so the
//! rest of the file still gets a tree. Named-charset validation is
//! deliberately *not* done here — `[:digit:]` parses to an
//! [`ExprKind::NamedCharset`] node with no lookup, since resolving it is a
//! compiler concern (spec §4.4).

mod cursor;

use cursor::Cursor;
use rpl_ast::{Ast, Binding as AstBinding, Expr, ExprKind, ExprList, PredicateKind, Statement};
use rpl_core::{Diagnostic, DiagnosticCode, SourceRef, SourceText};
use smallvec::smallvec;
use std::sync::Arc;

/// The RPL major version this parser understands (spec §4.1's `rpl M.m`
/// declaration).
pub const SUPPORTED_MAJOR: u32 = 1;

pub struct ParseResult {
    pub ast: Ast,
    pub diagnostics: Vec<Diagnostic>,
    /// Byte count left unconsumed at the end of the source, 0 on a clean
    /// parse. Non-zero when the version was too new to attempt a parse at
    /// all, or when trailing bytes didn't form a statement or a bare
    /// expression.
    pub leftover: usize,
}

/// Parses `source` into an [`Ast`] plus diagnostics (spec §4.1:
/// `parse(source_bytes) -> (AST, [Diagnostic], leftover_bytes)`).
pub fn parse(source: Arc<SourceText>) -> ParseResult {
    let total_len = source.text.len();
    let text: Arc<str> = source.text.clone();
    let mut parser = Parser { cursor: Cursor::new(text.as_bytes()), source, diagnostics: Vec::new() };

    let version = parser.parse_version_preamble();
    let mut too_new = false;
    if let Some((major, _minor)) = version {
        if major > SUPPORTED_MAJOR {
            let r = parser.make_ref(0);
            parser.diagnostics.push(Diagnostic::new(
                DiagnosticCode::VersionTooNew,
                format!("file declares rpl {major}.x; this parser supports up to {SUPPORTED_MAJOR}.x"),
                r,
            ));
            too_new = true;
        } else if major < SUPPORTED_MAJOR {
            let r = parser.make_ref(0);
            parser.diagnostics.push(Diagnostic::new(
                DiagnosticCode::VersionTooOld,
                format!("file declares rpl {major}.x; parsing under {SUPPORTED_MAJOR}.x semantics"),
                r,
            ));
        }
    }

    let mut statements = Vec::new();
    let mut trailing_expression = None;

    if !too_new {
        loop {
            parser.cursor.skip_trivia();
            if parser.cursor.eof() {
                break;
            }
            let checkpoint = parser.cursor.pos();
            match parser.parse_statement() {
                Some(stmt) => statements.push(stmt),
                None => break,
            }
            if parser.cursor.pos() == checkpoint {
                // Safety valve: every recovery path is expected to make
                // progress, but never spin forever if one doesn't.
                parser.cursor.bump();
            }
        }

        parser.cursor.skip_trivia();
        if !parser.cursor.eof() {
            let checkpoint = parser.cursor.pos();
            let expr = parser.parse_expression();
            if parser.cursor.pos() > checkpoint {
                trailing_expression = Some(expr);
            } else {
                parser.cursor.set_pos(checkpoint);
            }
        }
    }

    parser.cursor.skip_trivia();
    let leftover = total_len - parser.cursor.pos();

    ParseResult { ast: Ast { version, statements, trailing_expression }, diagnostics: parser.diagnostics, leftover }
}

/// Parses `source` as a single bare expression, with no version preamble and
/// no statement list — the shape `compile_expression` (spec §6.1) needs for
/// ad hoc REPL-style patterns. The result's `trailing_expression` is always
/// `Some`.
pub fn parse_expression_only(source: Arc<SourceText>) -> ParseResult {
    let total_len = source.text.len();
    let text: Arc<str> = source.text.clone();
    let mut parser = Parser { cursor: Cursor::new(text.as_bytes()), source, diagnostics: Vec::new() };
    let expr = parser.parse_expression();
    parser.cursor.skip_trivia();
    let leftover = total_len - parser.cursor.pos();
    ParseResult {
        ast: Ast { version: None, statements: Vec::new(), trailing_expression: Some(expr) },
        diagnostics: parser.diagnostics,
        leftover,
    }
}

struct Parser<'s> {
    cursor: Cursor<'s>,
    source: Arc<SourceText>,
    diagnostics: Vec<Diagnostic>,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

impl<'s> Parser<'s> {
    fn make_ref(&self, start: usize) -> SourceRef {
        SourceRef::new(self.source.clone(), start, self.cursor.pos())
    }

    fn err(&mut self, code: DiagnosticCode, msg: impl Into<String>, start: usize) {
        let r = self.make_ref(start);
        self.diagnostics.push(Diagnostic::new(code, msg, r));
    }

    /// Consumes `kw` only if it's a whole identifier (not a prefix of a
    /// longer one), restoring the cursor otherwise.
    fn try_keyword(&mut self, kw: &str) -> bool {
        let checkpoint = self.cursor.pos();
        if self.cursor.eat_str(kw) {
            let boundary = !self.cursor.peek().map(is_ident_continue).unwrap_or(false);
            if boundary {
                return true;
            }
        }
        self.cursor.set_pos(checkpoint);
        false
    }

    fn parse_ident(&mut self) -> Option<String> {
        self.cursor.skip_trivia();
        let start = self.cursor.pos();
        let b = self.cursor.peek()?;
        if !is_ident_start(b) {
            return None;
        }
        self.cursor.bump();
        self.cursor.skip_while(is_ident_continue);
        Some(String::from_utf8_lossy(&self.cursor.bytes()[start..self.cursor.pos()]).into_owned())
    }

    fn parse_uint(&mut self) -> Option<u32> {
        let start = self.cursor.pos();
        self.cursor.skip_while(|b| b.is_ascii_digit());
        if self.cursor.pos() == start {
            return None;
        }
        std::str::from_utf8(&self.cursor.bytes()[start..self.cursor.pos()]).ok()?.parse().ok()
    }

    fn parse_version_preamble(&mut self) -> Option<(u32, u32)> {
        let checkpoint = self.cursor.pos();
        self.cursor.skip_trivia();
        if !self.try_keyword("rpl") {
            self.cursor.set_pos(checkpoint);
            return None;
        }
        self.cursor.skip_trivia();
        let Some(major) = self.parse_uint() else {
            self.cursor.set_pos(checkpoint);
            return None;
        };
        if !self.cursor.eat_byte(b'.') {
            self.cursor.set_pos(checkpoint);
            return None;
        }
        let Some(minor) = self.parse_uint() else {
            self.cursor.set_pos(checkpoint);
            return None;
        };
        Some((major, minor))
    }

    // ---- statements ----------------------------------------------------

    fn parse_statement(&mut self) -> Option<Statement> {
        self.cursor.skip_trivia();
        if self.cursor.eof() {
            return None;
        }
        let start = self.cursor.pos();

        if self.try_keyword("package") {
            self.cursor.skip_trivia();
            let name = self.parse_ident().unwrap_or_else(|| {
                self.err(DiagnosticCode::Syntax, "expected a name after `package`", start);
                String::new()
            });
            return Some(Statement::Package { name, source_ref: self.make_ref(start) });
        }

        if self.try_keyword("import") {
            self.cursor.skip_trivia();
            let importpath = self.parse_import_path();
            self.cursor.skip_trivia();
            let mut alias = None;
            if self.try_keyword("as") {
                self.cursor.skip_trivia();
                alias = self.parse_ident();
            }
            return Some(Statement::Import { importpath, alias, source_ref: self.make_ref(start) });
        }

        if self.try_keyword("grammar") {
            return Some(self.parse_grammar_statement(start));
        }

        match self.parse_rule_binding() {
            Some(binding) => Some(Statement::Binding(binding)),
            None => {
                let msg = "expected a binding, `package`, `import`, or `grammar` statement";
                self.err(DiagnosticCode::Syntax, msg, start);
                self.cursor.skip_while(|b| b != b'\n');
                if self.cursor.peek() == Some(b'\n') {
                    self.cursor.bump();
                }
                if self.cursor.pos() == start && !self.cursor.eof() {
                    self.cursor.bump();
                }
                Some(Statement::SyntaxError { message: msg.to_string(), source_ref: self.make_ref(start) })
            }
        }
    }

    /// `[alias] name = expr`, used both at top level and inside `grammar`
    /// blocks. Returns `None` only when there's no identifier to bind at
    /// all (i.e. this isn't the start of a binding).
    fn parse_rule_binding(&mut self) -> Option<AstBinding> {
        self.cursor.skip_trivia();
        let start = self.cursor.pos();
        let is_alias = self.try_keyword("alias");
        if is_alias {
            self.cursor.skip_trivia();
        }
        let Some(name) = self.parse_ident() else {
            if is_alias {
                self.err(DiagnosticCode::Syntax, "expected a name after `alias`", start);
                return Some(AstBinding {
                    name: String::new(),
                    exp: Expr::new(ExprKind::SyntaxError("missing alias target".to_string()), self.make_ref(start)),
                    is_alias: true,
                    source_ref: self.make_ref(start),
                });
            }
            return None;
        };
        self.cursor.skip_trivia();
        if !self.cursor.eat_byte(b'=') {
            self.err(DiagnosticCode::Syntax, format!("expected `=` after `{name}`"), start);
            return Some(AstBinding {
                exp: Expr::new(ExprKind::SyntaxError(format!("`{name}` is missing its `=`")), self.make_ref(start)),
                name,
                is_alias,
                source_ref: self.make_ref(start),
            });
        }
        self.cursor.skip_trivia();
        let exp = self.parse_expression();
        Some(AstBinding { name, exp, is_alias, source_ref: self.make_ref(start) })
    }

    fn parse_grammar_statement(&mut self, start: usize) -> Statement {
        let mut rules = Vec::new();
        loop {
            self.cursor.skip_trivia();
            if self.try_keyword("end") {
                break;
            }
            if self.try_keyword("in") {
                // `grammar priv+ in pub+ end`: both groups are bound into
                // the same knot-tied rule set; we don't currently track a
                // separate visibility flag on `Binding` (see DESIGN.md).
                continue;
            }
            if self.cursor.eof() {
                self.err(DiagnosticCode::Syntax, "unterminated `grammar` block, expected `end`", start);
                break;
            }
            match self.parse_rule_binding() {
                Some(binding) => rules.push(binding),
                None => {
                    let here = self.cursor.pos();
                    self.err(DiagnosticCode::Syntax, "expected a rule binding inside `grammar`", here);
                    if !self.cursor.eof() {
                        self.cursor.bump();
                    }
                }
            }
        }
        Statement::Grammar { rules, source_ref: self.make_ref(start) }
    }

    fn parse_import_path(&mut self) -> String {
        if self.cursor.peek() == Some(b'"') {
            String::from_utf8_lossy(&self.parse_quoted_bytes()).into_owned()
        } else {
            let start = self.cursor.pos();
            self.cursor.skip_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'/' | b'-'));
            String::from_utf8_lossy(&self.cursor.bytes()[start..self.cursor.pos()]).into_owned()
        }
    }

    // ---- expressions -----------------------------------------------------
    // Precedence, loosest to tightest: choice `/` > sequence (juxtaposition)
    // > predicate `! &` > postfix quantifier `* + ? {n,m}` > atom.

    fn parse_expression(&mut self) -> Expr {
        self.parse_choice()
    }

    fn parse_choice(&mut self) -> Expr {
        let start = self.cursor.pos();
        let mut alts: ExprList = smallvec![self.parse_sequence()];
        loop {
            self.cursor.skip_trivia();
            if self.cursor.eat_byte(b'/') {
                self.cursor.skip_trivia();
                alts.push(self.parse_sequence());
            } else {
                break;
            }
        }
        if alts.len() == 1 {
            alts.into_iter().next().unwrap()
        } else {
            Expr::new(ExprKind::Choice(Box::new(alts)), self.make_ref(start))
        }
    }

    fn parse_sequence(&mut self) -> Expr {
        let start = self.cursor.pos();
        let mut parts: ExprList = smallvec![];
        loop {
            if self.at_sequence_end(!parts.is_empty()) {
                break;
            }
            parts.push(self.parse_predicate());
        }
        if parts.is_empty() {
            Expr::new(ExprKind::Literal(Vec::new()), self.make_ref(start))
        } else if parts.len() == 1 {
            parts.into_iter().next().unwrap()
        } else {
            Expr::new(ExprKind::Sequence(Box::new(parts)), self.make_ref(start))
        }
    }

    /// Looks ahead (without net cursor movement) to decide whether the
    /// current position ends the enclosing sequence: end of input, a group
    /// closer, or the start of the *next* binding (`[alias] name =`) or a
    /// `grammar` block's `end`/`in`. A choice separator `/` only ends the
    /// sequence once it already has at least one part — a bare leading `/`
    /// (nothing parsed yet) isn't a legal elided empty alternative, so it
    /// falls through to `parse_atom`'s error path instead.
    fn at_sequence_end(&mut self, have_parts: bool) -> bool {
        self.cursor.skip_trivia();
        match self.cursor.peek() {
            None => true,
            Some(b'/') => have_parts,
            Some(b')') | Some(b'}') => true,
            Some(b) if is_ident_start(b) => {
                let checkpoint = self.cursor.pos();
                if self.try_keyword("end") || self.try_keyword("in") {
                    self.cursor.set_pos(checkpoint);
                    return true;
                }
                let is_alias = self.try_keyword("alias");
                if is_alias {
                    self.cursor.skip_trivia();
                }
                let had_ident = self.parse_ident().is_some();
                self.cursor.skip_trivia();
                let followed_by_eq = self.cursor.peek() == Some(b'=');
                self.cursor.set_pos(checkpoint);
                had_ident && followed_by_eq
            }
            _ => false,
        }
    }

    fn parse_predicate(&mut self) -> Expr {
        self.cursor.skip_trivia();
        let start = self.cursor.pos();
        if self.cursor.eat_byte(b'!') {
            let inner = self.parse_predicate();
            return Expr::new(
                ExprKind::Predicate { kind: PredicateKind::Negation, exp: Box::new(inner) },
                self.make_ref(start),
            );
        }
        if self.cursor.eat_byte(b'&') {
            let inner = self.parse_predicate();
            return Expr::new(
                ExprKind::Predicate { kind: PredicateKind::Lookahead, exp: Box::new(inner) },
                self.make_ref(start),
            );
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Expr {
        let start = self.cursor.pos();
        let atom = self.parse_atom();
        match self.cursor.peek() {
            Some(b'*') => {
                self.cursor.bump();
                Expr::new(
                    ExprKind::Repetition { min: 0, max: None, exp: Box::new(atom), cooked: false },
                    self.make_ref(start),
                )
            }
            Some(b'+') => {
                self.cursor.bump();
                Expr::new(
                    ExprKind::Repetition { min: 1, max: None, exp: Box::new(atom), cooked: false },
                    self.make_ref(start),
                )
            }
            Some(b'?') => {
                self.cursor.bump();
                Expr::new(
                    ExprKind::Repetition { min: 0, max: Some(1), exp: Box::new(atom), cooked: false },
                    self.make_ref(start),
                )
            }
            Some(b'{') => match self.try_parse_bounds() {
                Some((min, max)) => Expr::new(
                    ExprKind::Repetition { min, max, exp: Box::new(atom), cooked: false },
                    self.make_ref(start),
                ),
                None => atom,
            },
            _ => atom,
        }
    }

    /// Attempts `{n}` / `{n,}` / `{n,m}` / `{,m}`. Rewinds and returns `None`
    /// if the braces don't hold a digit/comma shape, so the caller can fall
    /// back to parsing `{...}` as a fresh raw-group atom instead.
    fn try_parse_bounds(&mut self) -> Option<(u32, Option<u32>)> {
        let checkpoint = self.cursor.pos();
        if !self.cursor.eat_byte(b'{') {
            return None;
        }
        self.cursor.skip_while(|b| b == b' ' || b == b'\t');
        let min_start = self.cursor.pos();
        self.cursor.skip_while(|b| b.is_ascii_digit());
        let has_min = self.cursor.pos() > min_start;
        let min: u32 = if has_min {
            std::str::from_utf8(&self.cursor.bytes()[min_start..self.cursor.pos()]).unwrap().parse().unwrap_or(0)
        } else {
            0
        };
        self.cursor.skip_while(|b| b == b' ' || b == b'\t');
        let (max, has_comma) = if self.cursor.eat_byte(b',') {
            self.cursor.skip_while(|b| b == b' ' || b == b'\t');
            let max_start = self.cursor.pos();
            self.cursor.skip_while(|b| b.is_ascii_digit());
            let has_max = self.cursor.pos() > max_start;
            let max = if has_max {
                Some(std::str::from_utf8(&self.cursor.bytes()[max_start..self.cursor.pos()]).unwrap().parse().unwrap_or(0))
            } else {
                None
            };
            (max, true)
        } else {
            (if has_min { Some(min) } else { None }, false)
        };
        self.cursor.skip_while(|b| b == b' ' || b == b'\t');
        if !self.cursor.eat_byte(b'}') || (!has_min && !has_comma) {
            self.cursor.set_pos(checkpoint);
            return None;
        }
        Some((min, max))
    }

    fn parse_atom(&mut self) -> Expr {
        self.cursor.skip_trivia();
        let start = self.cursor.pos();
        match self.cursor.peek() {
            Some(b'"') => Expr::new(ExprKind::Literal(self.parse_quoted_bytes()), self.make_ref(start)),
            Some(b'[') => self.parse_charset(start),
            Some(b'(') => {
                self.cursor.bump();
                let inner = self.parse_expression();
                self.cursor.skip_trivia();
                if !self.cursor.eat_byte(b')') {
                    self.err(DiagnosticCode::Syntax, "expected `)`", self.cursor.pos());
                }
                Expr::new(ExprKind::Cooked(Box::new(inner)), self.make_ref(start))
            }
            Some(b'{') => {
                self.cursor.bump();
                let inner = self.parse_expression();
                self.cursor.skip_trivia();
                if !self.cursor.eat_byte(b'}') {
                    self.err(DiagnosticCode::Syntax, "expected `}`", self.cursor.pos());
                }
                Expr::new(ExprKind::Raw(Box::new(inner)), self.make_ref(start))
            }
            Some(b) if is_ident_start(b) => self.parse_ref_or_application(start),
            _ => {
                self.err(DiagnosticCode::Syntax, "expected an expression", start);
                if !self.cursor.eof() {
                    self.cursor.bump();
                }
                Expr::new(ExprKind::SyntaxError("expected an expression".to_string()), self.make_ref(start))
            }
        }
    }

    fn parse_ref_or_application(&mut self, start: usize) -> Expr {
        let first = self.parse_ident().unwrap_or_default();
        let (localname, packagename) = if self.cursor.peek() == Some(b'.') {
            let checkpoint = self.cursor.pos();
            self.cursor.bump();
            match self.parse_ident() {
                Some(second) => (second, Some(first)),
                None => {
                    self.cursor.set_pos(checkpoint);
                    (first, None)
                }
            }
        } else {
            (first, None)
        };

        if self.cursor.peek() == Some(b'(') {
            self.cursor.bump();
            let mut args = Vec::new();
            loop {
                self.cursor.skip_trivia();
                if self.cursor.peek() == Some(b')') || self.cursor.eof() {
                    break;
                }
                args.push(self.parse_expression());
                self.cursor.skip_trivia();
                if self.cursor.eat_byte(b',') {
                    continue;
                }
                break;
            }
            self.cursor.skip_trivia();
            if !self.cursor.eat_byte(b')') {
                self.err(DiagnosticCode::Syntax, "expected `)` to close argument list", self.cursor.pos());
            }
            return Expr::new(ExprKind::Application { macro_name: localname, args }, self.make_ref(start));
        }

        Expr::new(ExprKind::Ref { localname, packagename }, self.make_ref(start))
    }

    // ---- strings and character classes ------------------------------------

    fn parse_quoted_bytes(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        if !self.cursor.eat_byte(b'"') {
            let here = self.cursor.pos();
            self.err(DiagnosticCode::Syntax, "expected a string literal", here);
            return out;
        }
        loop {
            match self.cursor.peek() {
                None => {
                    let here = self.cursor.pos();
                    self.err(DiagnosticCode::Syntax, "unterminated string literal", here);
                    break;
                }
                Some(b'"') => {
                    self.cursor.bump();
                    break;
                }
                Some(b'\\') => {
                    self.cursor.bump();
                    out.push(self.parse_escape_byte());
                }
                Some(b) => {
                    self.cursor.bump();
                    out.push(b);
                }
            }
        }
        out
    }

    fn parse_escape_byte(&mut self) -> u8 {
        match self.cursor.bump() {
            Some(b'n') => b'\n',
            Some(b't') => b'\t',
            Some(b'r') => b'\r',
            Some(b'\\') => b'\\',
            Some(b'"') => b'"',
            Some(b'\'') => b'\'',
            Some(b']') => b']',
            Some(b'-') => b'-',
            Some(b'^') => b'^',
            Some(b'0') => 0,
            Some(b'x') => {
                let hi = self.cursor.bump().and_then(hex_val);
                let lo = self.cursor.bump().and_then(hex_val);
                match (hi, lo) {
                    (Some(h), Some(l)) => (h << 4) | l,
                    _ => {
                        let here = self.cursor.pos();
                        self.err(DiagnosticCode::InvalidEscape, "invalid `\\x` escape, expected two hex digits", here);
                        b'x'
                    }
                }
            }
            Some(other) => {
                let here = self.cursor.pos();
                self.err(DiagnosticCode::InvalidEscape, format!("unknown escape `\\{}`", other as char), here);
                other
            }
            None => {
                let here = self.cursor.pos();
                self.err(DiagnosticCode::Syntax, "unterminated escape at end of input", here);
                b'\\'
            }
        }
    }

    fn parse_charset_byte(&mut self) -> u8 {
        if self.cursor.eat_byte(b'\\') {
            self.parse_escape_byte()
        } else {
            self.cursor.bump().unwrap_or(b'\0')
        }
    }

    /// Parses `[...]`, `[^...]`, `[:name:]`. Multi-item brackets become a
    /// `Choice` of their single-item equivalents; a complemented multi-item
    /// bracket De Morgan-rewrites to "not any of these, but some byte"
    /// (`Sequence([Predicate{Negation, Choice(items)}, Range{0,255}])`) so no
    /// new AST shape is needed for compound complement.
    fn parse_charset(&mut self, start: usize) -> Expr {
        self.cursor.bump(); // '['
        let mut complement = false;
        if self.cursor.peek() == Some(b'^') {
            self.cursor.bump();
            complement = true;
        }
        let mut items: Vec<CharsetItem> = Vec::new();
        loop {
            match self.cursor.peek() {
                None => {
                    self.err(DiagnosticCode::Syntax, "unterminated character class, expected `]`", start);
                    break;
                }
                Some(b']') => {
                    self.cursor.bump();
                    break;
                }
                Some(b'[') if self.cursor.starts_with("[:") => {
                    self.cursor.bump();
                    self.cursor.bump();
                    let name_start = self.cursor.pos();
                    self.cursor.skip_while(|b| b != b':' && b != b']');
                    let name = String::from_utf8_lossy(&self.cursor.bytes()[name_start..self.cursor.pos()]).into_owned();
                    if !self.cursor.eat_str(":]") {
                        self.err(DiagnosticCode::Syntax, "expected `:]` to close named class", self.cursor.pos());
                    }
                    items.push(CharsetItem::Named(name));
                }
                _ => {
                    let c = self.parse_charset_byte();
                    if self.cursor.peek() == Some(b'-')
                        && self.cursor.peek_at(1).is_some()
                        && self.cursor.peek_at(1) != Some(b']')
                    {
                        self.cursor.bump();
                        let c2 = self.parse_charset_byte();
                        items.push(CharsetItem::Range(c, c2));
                    } else {
                        items.push(CharsetItem::Char(c));
                    }
                }
            }
        }
        build_charset_expr(items, complement, self.make_ref(start))
    }
}

enum CharsetItem {
    Named(String),
    Range(u8, u8),
    Char(u8),
}

fn charset_item_expr(item: CharsetItem, complement: bool, source_ref: SourceRef) -> Expr {
    match item {
        CharsetItem::Named(name) => Expr::new(ExprKind::NamedCharset { name, complement }, source_ref),
        CharsetItem::Range(lo, hi) => Expr::new(ExprKind::Range { lo, hi, complement }, source_ref),
        CharsetItem::Char(c) => Expr::new(ExprKind::CharList { chars: vec![c], complement }, source_ref),
    }
}

fn build_charset_expr(items: Vec<CharsetItem>, complement: bool, source_ref: SourceRef) -> Expr {
    if items.len() == 1 {
        return charset_item_expr(items.into_iter().next().unwrap(), complement, source_ref);
    }
    if items.is_empty() {
        // `[]` / `[^]`: an empty union never matches; complemented, any byte.
        return if complement {
            Expr::new(ExprKind::Range { lo: 0, hi: 255, complement: false }, source_ref)
        } else {
            Expr::new(ExprKind::Choice(Box::new(ExprList::new())), source_ref)
        };
    }
    let subs: ExprList =
        items.into_iter().map(|item| charset_item_expr(item, false, source_ref.clone())).collect();
    let union = Expr::new(ExprKind::Choice(Box::new(subs)), source_ref.clone());
    if !complement {
        return union;
    }
    let negative =
        Expr::new(ExprKind::Predicate { kind: PredicateKind::Negation, exp: Box::new(union) }, source_ref.clone());
    let any_byte = Expr::new(ExprKind::Range { lo: 0, hi: 255, complement: false }, source_ref.clone());
    Expr::new(ExprKind::Sequence(Box::new(smallvec![negative, any_byte])), source_ref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpl_core::Origin;

    fn src(text: &str) -> Arc<SourceText> {
        Arc::new(SourceText::new(Origin::Literal, text.to_string()))
    }

    fn only_binding(result: &ParseResult) -> &AstBinding {
        match result.ast.statements.as_slice() {
            [Statement::Binding(b)] => b,
            other => panic!("expected exactly one binding, got {other:?}"),
        }
    }

    #[test]
    fn parses_a_literal_binding() {
        let result = parse(src(r#"greeting = "hello""#));
        assert!(result.diagnostics.is_empty());
        let b = only_binding(&result);
        assert_eq!(b.name, "greeting");
        assert!(matches!(&b.exp.kind, ExprKind::Literal(bytes) if bytes == b"hello"));
    }

    #[test]
    fn parses_alias_and_sequence() {
        let result = parse(src(r#"alias word = [a-z]+ [0-9]*"#));
        assert!(result.diagnostics.is_empty());
        let b = only_binding(&result);
        assert!(b.is_alias);
        assert!(matches!(&b.exp.kind, ExprKind::Sequence(parts) if parts.len() == 2));
    }

    #[test]
    fn parses_choice_and_predicate() {
        let result = parse(src(r#"p = !"a" / &"b""#));
        assert!(result.diagnostics.is_empty());
        let b = only_binding(&result);
        let ExprKind::Choice(alts) = &b.exp.kind else { panic!("expected a choice") };
        assert_eq!(alts.len(), 2);
        assert!(matches!(alts[0].kind, ExprKind::Predicate { kind: PredicateKind::Negation, .. }));
        assert!(matches!(alts[1].kind, ExprKind::Predicate { kind: PredicateKind::Lookahead, .. }));
    }

    #[test]
    fn parses_bounded_quantifier_not_a_raw_group() {
        let result = parse(src(r#"p = "a"{2,3}"#));
        assert!(result.diagnostics.is_empty());
        let b = only_binding(&result);
        assert!(matches!(b.exp.kind, ExprKind::Repetition { min: 2, max: Some(3), .. }));
    }

    #[test]
    fn brace_that_is_not_a_quantifier_starts_a_raw_group() {
        let result = parse(src(r#"p = "a" {"b"}"#));
        assert!(result.diagnostics.is_empty());
        let b = only_binding(&result);
        let ExprKind::Sequence(parts) = &b.exp.kind else { panic!("expected a sequence") };
        assert_eq!(parts.len(), 2);
        assert!(matches!(parts[1].kind, ExprKind::Raw(_)));
    }

    #[test]
    fn parses_compound_charset_as_choice() {
        let result = parse(src(r#"p = [a-zA-Z_]"#));
        assert!(result.diagnostics.is_empty());
        let b = only_binding(&result);
        assert!(matches!(&b.exp.kind, ExprKind::Choice(items) if items.len() == 3));
    }

    #[test]
    fn complemented_compound_charset_de_morgans() {
        let result = parse(src(r#"p = [^a-z0-9]"#));
        assert!(result.diagnostics.is_empty());
        let b = only_binding(&result);
        let ExprKind::Sequence(parts) = &b.exp.kind else { panic!("expected a sequence") };
        assert_eq!(parts.len(), 2);
        assert!(matches!(parts[0].kind, ExprKind::Predicate { kind: PredicateKind::Negation, .. }));
        assert!(matches!(parts[1].kind, ExprKind::Range { lo: 0, hi: 255, complement: false }));
    }

    #[test]
    fn parses_named_charset() {
        let result = parse(src(r#"p = [:digit:]"#));
        assert!(result.diagnostics.is_empty());
        let b = only_binding(&result);
        assert!(matches!(&b.exp.kind, ExprKind::NamedCharset { name, .. } if name == "digit"));
    }

    #[test]
    fn parses_macro_application() {
        let result = parse(src(r#"p = find("x")"#));
        assert!(result.diagnostics.is_empty());
        let b = only_binding(&result);
        assert!(matches!(&b.exp.kind, ExprKind::Application { macro_name, args } if macro_name == "find" && args.len() == 1));
    }

    #[test]
    fn parses_package_qualified_ref() {
        let result = parse(src(r#"p = net.ip"#));
        assert!(result.diagnostics.is_empty());
        let b = only_binding(&result);
        assert!(matches!(&b.exp.kind, ExprKind::Ref { localname, packagename: Some(pkg) } if localname == "ip" && pkg == "net"));
    }

    #[test]
    fn parses_grammar_block() {
        let result = parse(src(r#"grammar s = {"a" s} / "" end"#));
        assert!(result.diagnostics.is_empty());
        match result.ast.statements.as_slice() {
            [Statement::Grammar { rules, .. }] => assert_eq!(rules.len(), 1),
            other => panic!("expected a grammar statement, got {other:?}"),
        }
    }

    #[test]
    fn parses_grammar_with_in_separator() {
        let result = parse(src(r#"grammar helper = "h" in public = helper "!" end"#));
        assert!(result.diagnostics.is_empty());
        match result.ast.statements.as_slice() {
            [Statement::Grammar { rules, .. }] => assert_eq!(rules.len(), 2),
            other => panic!("expected a grammar statement, got {other:?}"),
        }
    }

    #[test]
    fn parses_version_declaration() {
        let result = parse(src("rpl 1.0\np = \"x\""));
        assert_eq!(result.ast.version, Some((1, 0)));
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn too_new_major_version_is_a_diagnostic_and_parses_nothing() {
        let result = parse(src("rpl 99.0\np = \"x\""));
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, DiagnosticCode::VersionTooNew);
        assert!(result.ast.statements.is_empty());
        assert!(result.leftover > 0);
    }

    #[test]
    fn illegal_syntax_recovers_with_one_diagnostic_per_line() {
        let result = parse(src("/foo/\np = \"ok\""));
        assert!(result.diagnostics.iter().any(|d| d.code == DiagnosticCode::Syntax));
        assert!(result.ast.statements.iter().any(|s| matches!(s, Statement::Binding(b) if b.name == "p")));
    }

    #[test]
    fn trailing_bare_expression_is_captured_for_compile_expression_mode() {
        let result = parse(src(r#"p = "a"
"a" "b""#));
        assert!(result.ast.trailing_expression.is_some());
    }

    #[test]
    fn import_with_alias() {
        let result = parse(src(r#"import "net" as n"#));
        match result.ast.statements.as_slice() {
            [Statement::Import { importpath, alias, .. }] => {
                assert_eq!(importpath, "net");
                assert_eq!(alias.as_deref(), Some("n"));
            }
            other => panic!("expected an import statement, got {other:?}"),
        }
    }

    #[test]
    fn string_escapes_decode() {
        let result = parse(src(r#"p = "a\nb\x41\"c""#));
        let b = only_binding(&result);
        assert!(matches!(&b.exp.kind, ExprKind::Literal(bytes) if bytes == b"a\nbA\"c"));
    }

    #[test]
    fn bare_leading_slash_is_a_single_syntax_error_at_column_one() {
        let result = parse_expression_only(src("/foo/"));
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, DiagnosticCode::Syntax);
        assert_eq!(result.diagnostics[0].source_ref.position(), (1, 1));
    }

    #[test]
    fn parse_expression_only_has_no_statements() {
        let result = parse_expression_only(src(r#"find("a")"#));
        assert!(result.ast.statements.is_empty());
        assert!(result.diagnostics.is_empty());
        assert!(matches!(&result.ast.trailing_expression.unwrap().kind, ExprKind::Application { .. }));
    }
}
