// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! The compiled matcher IR (spec §3 "Matcher IR"): a composable PEG value
//! the compiler lowers an AST into and the runtime executes directly.
//! Compiler output is acyclic but may share sub-matchers by value (`Arc`).

use crate::charset::ByteSet;
use std::sync::Arc;

/// A compiled pattern. Cheap to clone (an `Arc` handle), so the same matcher
/// can be shared between an engine's pattern table and a matcher handle
/// returned to a caller.
#[derive(Debug, Clone)]
pub struct Matcher(pub Arc<MatcherNode>);

impl Matcher {
    pub fn new(node: MatcherNode) -> Self {
        Self(Arc::new(node))
    }

    pub fn node(&self) -> &MatcherNode {
        &self.0
    }

    /// Rough size of this matcher's own node (not its children) for the
    /// heap-ceiling accounting described in SPEC_FULL §2.
    pub fn node_count(&self) -> usize {
        fn count(m: &MatcherNode) -> usize {
            use MatcherNode::*;
            1 + match m {
                Literal(_) | CharSet(_) | AnyByte | StartAnchor | EndAnchor | Halt | RuleRef(_) => 0,
                Sequence(xs) | Choice(xs) => xs.iter().map(|m| count(m.node())).sum(),
                Star(x) | Plus(x) | Opt(x) | Lookahead(x) | Negative(x) | Behind { body: x, .. } => count(x.node()),
                Repeat { body, .. } => count(body.node()),
                Grammar { rules, .. } => rules.iter().map(|m| count(m.node())).sum(),
                Capture { body, .. } => count(body.node()),
                ConstCapture { .. } => 0,
            }
        }
        count(&self.0)
    }
}

#[derive(Debug)]
pub enum MatcherNode {
    /// An exact byte string.
    Literal(Vec<u8>),
    /// A character-class set (subsumes the `range` and `charlist` AST
    /// forms, already folded into one bitmap at compile time).
    CharSet(ByteSet),
    /// Any single byte, or fail at end of input.
    AnyByte,
    /// Ordered concatenation.
    Sequence(Vec<Matcher>),
    /// Ordered choice: first alternative that matches wins, no
    /// backtracking once a later alternative has been tried and the whole
    /// choice has succeeded.
    Choice(Vec<Matcher>),
    /// Zero or more (greedy).
    Star(Box<Matcher>),
    /// One or more (greedy).
    Plus(Box<Matcher>),
    /// Zero or one.
    Opt(Box<Matcher>),
    /// Bounded repetition `{min,max}` (`max = None` is unbounded, `{n,}`).
    Repeat { min: u32, max: Option<u32>, body: Box<Matcher> },
    /// Positive lookahead `&e`: zero-width, succeeds iff `e` matches here.
    Lookahead(Box<Matcher>),
    /// Negative lookahead `!e`: zero-width, succeeds iff `e` does not match
    /// here.
    Negative(Box<Matcher>),
    /// `^`: zero-width, succeeds only at the start of the subject.
    StartAnchor,
    /// `$`: zero-width, succeeds only at the end of the subject.
    EndAnchor,
    /// Fixed-width back-look: succeeds (zero-width) iff `body` matches the
    /// `width` bytes immediately preceding the current position exactly.
    Behind { width: usize, body: Box<Matcher> },
    /// A mutually recursive grammar; `entry` indexes the start rule.
    Grammar { rules: Vec<Matcher>, entry: usize },
    /// A reference to sibling rule `index` within the nearest enclosing
    /// `Grammar`.
    RuleRef(usize),
    /// A named capture: wraps `body`; on success emits a labeled subtree
    /// spanning what `body` consumed.
    Capture { name: String, body: Box<Matcher> },
    /// A constant capture: zero-width, emits a fixed `(name, text)` node
    /// regardless of input (used by `message`/`error`).
    ConstCapture { name: String, text: String },
    /// Matches nothing; marks the run as aborted (unrecoverable stop
    /// mid-match).
    Halt,
}

impl Matcher {
    pub fn literal(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(MatcherNode::Literal(bytes.into()))
    }
    pub fn charset(set: ByteSet) -> Self {
        Self::new(MatcherNode::CharSet(set))
    }
    pub fn any_byte() -> Self {
        Self::new(MatcherNode::AnyByte)
    }
    pub fn sequence(parts: Vec<Matcher>) -> Self {
        if parts.len() == 1 {
            return parts.into_iter().next().unwrap();
        }
        Self::new(MatcherNode::Sequence(parts))
    }
    pub fn choice(alts: Vec<Matcher>) -> Self {
        if alts.len() == 1 {
            return alts.into_iter().next().unwrap();
        }
        Self::new(MatcherNode::Choice(alts))
    }
    pub fn star(body: Matcher) -> Self {
        Self::new(MatcherNode::Star(Box::new(body)))
    }
    pub fn plus(body: Matcher) -> Self {
        Self::new(MatcherNode::Plus(Box::new(body)))
    }
    pub fn opt(body: Matcher) -> Self {
        Self::new(MatcherNode::Opt(Box::new(body)))
    }
    pub fn repeat(min: u32, max: Option<u32>, body: Matcher) -> Self {
        Self::new(MatcherNode::Repeat { min, max, body: Box::new(body) })
    }
    pub fn lookahead(body: Matcher) -> Self {
        Self::new(MatcherNode::Lookahead(Box::new(body)))
    }
    pub fn negative(body: Matcher) -> Self {
        Self::new(MatcherNode::Negative(Box::new(body)))
    }
    pub fn start_anchor() -> Self {
        Self::new(MatcherNode::StartAnchor)
    }
    pub fn end_anchor() -> Self {
        Self::new(MatcherNode::EndAnchor)
    }
    pub fn behind(width: usize, body: Matcher) -> Self {
        Self::new(MatcherNode::Behind { width, body: Box::new(body) })
    }
    pub fn grammar(rules: Vec<Matcher>, entry: usize) -> Self {
        Self::new(MatcherNode::Grammar { rules, entry })
    }
    pub fn rule_ref(index: usize) -> Self {
        Self::new(MatcherNode::RuleRef(index))
    }
    pub fn capture(name: impl Into<String>, body: Matcher) -> Self {
        Self::new(MatcherNode::Capture { name: name.into(), body: Box::new(body) })
    }
    pub fn const_capture(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(MatcherNode::ConstCapture { name: name.into(), text: text.into() })
    }
    pub fn halt() -> Self {
        Self::new(MatcherNode::Halt)
    }

    /// Whether this matcher can succeed while consuming zero bytes, used by
    /// the compiler's loop-safety check (spec §3: "A `repetition` whose body
    /// can match the empty string is rejected at compile time").
    ///
    /// This is a conservative (sound but not complete) approximation: it can
    /// say "maybe accepts empty" for some patterns that never actually do in
    /// practice (e.g. a `Negative` guard that's always false), but it never
    /// misses a pattern that truly does, which is the direction that matters
    /// for loop safety.
    pub fn can_match_empty(&self) -> bool {
        use MatcherNode::*;
        match &*self.0 {
            Literal(bytes) => bytes.is_empty(),
            CharSet(_) | AnyByte => false,
            Sequence(parts) => parts.iter().all(Matcher::can_match_empty),
            Choice(alts) => alts.iter().any(Matcher::can_match_empty),
            Star(_) | Opt(_) => true,
            Plus(body) => body.can_match_empty(),
            Repeat { min, body, .. } => *min == 0 || body.can_match_empty(),
            Lookahead(_) | Negative(_) | StartAnchor | EndAnchor | Behind { .. } => true,
            Grammar { rules, entry } => rules[*entry].can_match_empty(),
            RuleRef(_) => true,
            Capture { body, .. } => body.can_match_empty(),
            ConstCapture { .. } => true,
            Halt => false,
        }
    }
}
