// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! The fixed built-in patterns (spec §4.3 table): `.`, `$`, `^`, `~`,
//! `halt`, and the `message`/`error` pfunctions.

use rpl_ast::{Expr, ExprKind};
use rpl_runtime::{ByteSet, Matcher};

/// `.`: one UTF-8 character (1–4 bytes), or fail. Built directly from the
/// matcher IR's `any-byte`/character-class primitives rather than added as
/// its own IR node, per spec §4.6's framing of built-ins as ordinary
/// compiled patterns.
pub fn dot_matcher() -> Matcher {
    let cont = || Matcher::charset(ByteSet::range(0x80, 0xBF));
    let ascii = Matcher::charset(ByteSet::range(0x00, 0x7F));
    let two = Matcher::sequence(vec![Matcher::charset(ByteSet::range(0xC2, 0xDF)), cont()]);
    let three = Matcher::sequence(vec![Matcher::charset(ByteSet::range(0xE0, 0xEF)), cont(), cont()]);
    let four = Matcher::sequence(vec![Matcher::charset(ByteSet::range(0xF0, 0xF4)), cont(), cont(), cont()]);
    Matcher::choice(vec![four, three, two, ascii])
}

/// `~`: the six-way boundary choice (spec §4.6), the prelude variant chosen
/// over the older environment variant per spec §9's open question.
pub fn boundary_matcher() -> Matcher {
    let space = ByteSet::named("space").expect("ascii space class always exists");
    let word = ByteSet::named("word").expect("ascii word class always exists");
    let punct = ByteSet::named("punct").expect("ascii punct class always exists");

    let space_run = Matcher::plus(Matcher::charset(space.clone()));

    let word_boundary = Matcher::sequence(vec![
        Matcher::lookahead(Matcher::charset(word.clone())),
        Matcher::negative(Matcher::behind(1, Matcher::charset(word))),
    ]);

    let punct_boundary =
        Matcher::choice(vec![Matcher::lookahead(Matcher::charset(punct.clone())), Matcher::behind(1, Matcher::charset(punct))]);

    let space_transition = Matcher::choice(vec![
        Matcher::sequence(vec![
            Matcher::negative(Matcher::behind(1, Matcher::charset(space.clone()))),
            Matcher::lookahead(Matcher::charset(space.clone())),
        ]),
        Matcher::sequence(vec![
            Matcher::behind(1, Matcher::charset(space.clone())),
            Matcher::negative(Matcher::lookahead(Matcher::charset(space))),
        ]),
    ]);

    Matcher::choice(vec![space_run, word_boundary, punct_boundary, space_transition, Matcher::end_anchor(), Matcher::start_anchor()])
}

fn literal_arg(expr: &Expr) -> Result<String, String> {
    match &expr.kind {
        ExprKind::Literal(bytes) => {
            String::from_utf8(bytes.clone()).map_err(|_| "message/error argument must be valid UTF-8".to_string())
        }
        _ => Err("message/error expects a string literal argument".to_string()),
    }
}

/// `message(s, tag?)`: zero-width, emits a labeled node carrying `s`.
pub fn message_primop(args: &[Expr]) -> Result<Matcher, String> {
    let s = args.first().ok_or("message() requires a string argument")?;
    let text = literal_arg(s)?;
    let tag = match args.get(1) {
        Some(tag_expr) => literal_arg(tag_expr)?,
        None => "message".to_string(),
    };
    Ok(Matcher::const_capture(tag, text))
}

/// `error(s, tag?)`: like `message` then sets *halt*.
pub fn error_primop(args: &[Expr]) -> Result<Matcher, String> {
    let s = args.first().ok_or("error() requires a string argument")?;
    let text = literal_arg(s)?;
    let tag = match args.get(1) {
        Some(tag_expr) => literal_arg(tag_expr)?,
        None => "error".to_string(),
    };
    Ok(Matcher::sequence(vec![Matcher::const_capture(tag, text), Matcher::halt()]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpl_core::{Origin, SourceRef};
    use std::sync::atomic::AtomicBool;

    fn no_cancel() -> AtomicBool {
        AtomicBool::new(false)
    }

    #[test]
    fn dot_matches_multi_byte_utf8() {
        let dot = dot_matcher();
        let out = rpl_runtime::run(&dot, "é".as_bytes(), 0, Default::default(), &no_cancel());
        assert!(out.ok);
        assert_eq!(out.leftover, 0);
    }

    #[test]
    fn boundary_matches_at_whitespace_run() {
        let boundary = boundary_matcher();
        let out = rpl_runtime::run(&boundary, b"a b", 1, Default::default(), &no_cancel());
        assert!(out.ok);
    }

    #[test]
    fn boundary_matches_at_start_and_end() {
        let boundary = boundary_matcher();
        assert!(rpl_runtime::run(&boundary, b"abc", 0, Default::default(), &no_cancel()).ok);
        assert!(rpl_runtime::run(&boundary, b"abc", 3, Default::default(), &no_cancel()).ok);
    }

    #[test]
    fn error_primop_sets_aborted() {
        let text_ref = SourceRef::synthetic(Origin::Literal);
        let arg = Expr::new(ExprKind::Literal(b"bad input".to_vec()), text_ref);
        let matcher = error_primop(std::slice::from_ref(&arg)).unwrap();
        let out = rpl_runtime::run(&matcher, b"x", 0, Default::default(), &no_cancel());
        assert!(out.aborted);
        assert_eq!(out.tree[0].data.as_deref(), Some("bad input"));
    }
}
