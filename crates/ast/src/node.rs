// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! The RPL abstract syntax tree (spec §3). AST trees are acyclic and
//! immutable after parse.

use rpl_core::SourceRef;
use smallvec::SmallVec;

/// Most sequences/choices in hand-written patterns have a handful of
/// children; inline up to 4 before spilling to the heap.
pub type ExprList = SmallVec<[Expr; 4]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateKind {
    Negation,
    Lookahead,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub source_ref: SourceRef,
}

impl Expr {
    pub fn new(kind: ExprKind, source_ref: SourceRef) -> Self {
        Self { kind, source_ref }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// `literal{value: bytes}` — exact byte string to match.
    Literal(Vec<u8>),
    /// `ref{localname, packagename?}` — name lookup.
    Ref { localname: String, packagename: Option<String> },
    /// `sequence{exps[]}` — ordered concatenation.
    Sequence(Box<ExprList>),
    /// `choice{exps[]}` — ordered choice.
    Choice(Box<ExprList>),
    /// `predicate{kind, exp}` — zero-width.
    Predicate { kind: PredicateKind, exp: Box<Expr> },
    /// `repetition{min, max?, exp, cooked?}`. `max = None` means unbounded.
    Repetition { min: u32, max: Option<u32>, exp: Box<Expr>, cooked: bool },
    /// `named_charset{name, complement?}`, e.g. `[:digit:]`.
    NamedCharset { name: String, complement: bool },
    /// `range{lo, hi, complement?}`, e.g. `[a-z]`.
    Range { lo: u8, hi: u8, complement: bool },
    /// `charlist{chars, complement?}`, e.g. `[abc]`.
    CharList { chars: Vec<u8>, complement: bool },
    /// `cooked{exp}` — tokenization mode wrapper: `(...)`.
    Cooked(Box<Expr>),
    /// `raw{exp}` — tokenization mode wrapper: `{...}`.
    Raw(Box<Expr>),
    /// `capture{ref, exp}` — names the captured subtree.
    Capture { name: String, exp: Box<Expr> },
    /// `grammar{rules[]}` — mutually recursive named productions; the first
    /// rule is the entry point.
    Grammar(Vec<Binding>),
    /// `application{macro_ref, args[]}` — macro call, expanded before
    /// compile.
    Application { macro_name: String, args: Vec<Expr> },
    /// In-tree placeholder for a parse error, so recovery can continue.
    SyntaxError(String),
}

/// `binding{ref, exp, is_alias}` — top-level (or grammar-rule) assignment.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub exp: Expr,
    pub is_alias: bool,
    pub source_ref: SourceRef,
}

#[derive(Debug, Clone)]
pub enum Statement {
    Binding(Binding),
    Grammar { rules: Vec<Binding>, source_ref: SourceRef },
    Import { importpath: String, alias: Option<String>, source_ref: SourceRef },
    Package { name: String, source_ref: SourceRef },
    SyntaxError { message: String, source_ref: SourceRef },
}

impl Statement {
    pub fn source_ref(&self) -> &SourceRef {
        match self {
            Statement::Binding(b) => &b.source_ref,
            Statement::Grammar { source_ref, .. }
            | Statement::Import { source_ref, .. }
            | Statement::Package { source_ref, .. }
            | Statement::SyntaxError { source_ref, .. } => source_ref,
        }
    }
}

/// A full parse: the optional `rpl M.m` version, the top-level statements in
/// source order, and an optional trailing bare expression (for
/// REPL/compile-expression mode, spec §4.1).
#[derive(Debug, Clone, Default)]
pub struct Ast {
    pub version: Option<(u32, u32)>,
    pub statements: Vec<Statement>,
    pub trailing_expression: Option<Expr>,
}

impl Expr {
    /// Structural equality ignoring source positions — used by the AST
    /// round-trip property (spec §8): `parse(pretty_print(ast)) == ast`
    /// compares with this, not `PartialEq` on `SourceRef`.
    pub fn structurally_eq(&self, other: &Expr) -> bool {
        use ExprKind::*;
        match (&self.kind, &other.kind) {
            (Literal(a), Literal(b)) => a == b,
            (Ref { localname: a, packagename: ap }, Ref { localname: b, packagename: bp }) => a == b && ap == bp,
            (Sequence(a), Sequence(b)) | (Choice(a), Choice(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.structurally_eq(y))
            }
            (Predicate { kind: ak, exp: ae }, Predicate { kind: bk, exp: be }) => ak == bk && ae.structurally_eq(be),
            (
                Repetition { min: am, max: ax, exp: ae, cooked: ac },
                Repetition { min: bm, max: bx, exp: be, cooked: bc },
            ) => am == bm && ax == bx && ac == bc && ae.structurally_eq(be),
            (
                NamedCharset { name: an, complement: ac },
                NamedCharset { name: bn, complement: bc },
            ) => an == bn && ac == bc,
            (Range { lo: al, hi: ah, complement: ac }, Range { lo: bl, hi: bh, complement: bc }) => {
                al == bl && ah == bh && ac == bc
            }
            (CharList { chars: a, complement: ac }, CharList { chars: b, complement: bc }) => a == b && ac == bc,
            (Cooked(a), Cooked(b)) | (Raw(a), Raw(b)) => a.structurally_eq(b),
            (Capture { name: an, exp: ae }, Capture { name: bn, exp: be }) => an == bn && ae.structurally_eq(be),
            (Grammar(a), Grammar(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| {
                        x.name == y.name && x.is_alias == y.is_alias && x.exp.structurally_eq(&y.exp)
                    })
            }
            (
                Application { macro_name: an, args: aa },
                Application { macro_name: bn, args: ba },
            ) => an == bn && aa.len() == ba.len() && aa.iter().zip(ba.iter()).all(|(x, y)| x.structurally_eq(y)),
            (SyntaxError(a), SyntaxError(b)) => a == b,
            _ => false,
        }
    }
}
