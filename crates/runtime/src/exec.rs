// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! The matcher runtime (spec §4.5): executes a compiled [`Matcher`] against
//! a byte slice. Single-threaded per call, zero-copy over the input,
//! ordered-choice PEG semantics with no backtracking across commit points.

use crate::matcher::{Matcher, MatcherNode};
use std::sync::atomic::{AtomicBool, Ordering};

/// One node of the match tree (spec §3): `{name, start, end, subs}`, plus a
/// `data` slot for the fixed text a constant capture (`message`/`error`)
/// carries, since that text doesn't come from the input slice.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchTree {
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub data: Option<String>,
    pub subs: Vec<MatchTree>,
}

/// Resource tunables for one run (spec §5): a hard abort threshold and a
/// soft cleanup watermark, both denominated in the accounting unit fixed by
/// SPEC_FULL §2 (capture-stack frames pushed during this run).
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    pub alloc_ceiling: usize,
    pub collection_watermark: usize,
}

impl Default for RunLimits {
    fn default() -> Self {
        // Generous defaults; an embedder with tighter memory budgets tunes
        // these via the engine's alloc-limit API (spec §6.1).
        Self { alloc_ceiling: 1_000_000, collection_watermark: 800_000 }
    }
}

#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub ok: bool,
    pub tree: Vec<MatchTree>,
    pub leftover: usize,
    pub aborted: bool,
}

/// Per-rule trace event recorded when tracing is requested (spec §6.1
/// `trace`), which SPEC_FULL §2 specifies as a distinct Engine API
/// operation layered on top of plain matching.
#[derive(Debug, Clone)]
pub enum TraceEvent {
    RuleEnter { rule: usize, pos: usize },
    ChoiceCommit { alt: usize, pos: usize },
    Halted { pos: usize },
}

enum Step {
    Matched(usize),
    Failed,
    Aborted,
}

struct Exec<'a> {
    input: &'a [u8],
    scopes: Vec<Vec<MatchTree>>,
    alloc_used: usize,
    limits: RunLimits,
    cancel: &'a AtomicBool,
    trace: Option<&'a mut Vec<TraceEvent>>,
    watermark_hit: bool,
}

impl<'a> Exec<'a> {
    fn cancelled_or_over_budget(&mut self) -> bool {
        if self.cancel.load(Ordering::Relaxed) {
            return true;
        }
        if self.alloc_used >= self.limits.collection_watermark && !self.watermark_hit {
            self.watermark_hit = true;
            tracing::warn!(used = self.alloc_used, "rpl runtime: collection watermark reached");
        }
        self.alloc_used >= self.limits.alloc_ceiling
    }

    fn scope_mark(&self) -> usize {
        self.scopes.last().map_or(0, Vec::len)
    }

    fn scope_truncate(&mut self, mark: usize) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.truncate(mark);
        }
    }

    fn scope_push_node(&mut self, node: MatchTree) {
        self.alloc_used += node.name.len() + 32;
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(node);
        }
    }

    fn exec(&mut self, m: &Matcher, rules: &[Matcher], pos: usize) -> Step {
        if self.cancelled_or_over_budget() {
            return Step::Aborted;
        }
        match m.node() {
            MatcherNode::Literal(bytes) => {
                if self.input[pos..].starts_with(bytes.as_slice()) {
                    Step::Matched(pos + bytes.len())
                } else {
                    Step::Failed
                }
            }
            MatcherNode::CharSet(set) => match self.input.get(pos) {
                Some(&b) if set.contains(b) => Step::Matched(pos + 1),
                _ => Step::Failed,
            },
            MatcherNode::AnyByte => {
                if pos < self.input.len() {
                    Step::Matched(pos + 1)
                } else {
                    Step::Failed
                }
            }
            MatcherNode::Sequence(parts) => {
                let mut cur = pos;
                for part in parts {
                    match self.exec(part, rules, cur) {
                        Step::Matched(next) => cur = next,
                        Step::Failed => return Step::Failed,
                        Step::Aborted => return Step::Aborted,
                    }
                }
                Step::Matched(cur)
            }
            MatcherNode::Choice(alts) => {
                let mark = self.scope_mark();
                for (i, alt) in alts.iter().enumerate() {
                    if let Some(trace) = self.trace.as_deref_mut() {
                        trace.push(TraceEvent::ChoiceCommit { alt: i, pos });
                    }
                    match self.exec(alt, rules, pos) {
                        Step::Matched(next) => return Step::Matched(next),
                        Step::Failed => self.scope_truncate(mark),
                        Step::Aborted => return Step::Aborted,
                    }
                }
                Step::Failed
            }
            MatcherNode::Star(body) => self.repeat(body, rules, pos, 0, None),
            MatcherNode::Plus(body) => self.repeat(body, rules, pos, 1, None),
            MatcherNode::Opt(body) => self.repeat(body, rules, pos, 0, Some(1)),
            MatcherNode::Repeat { min, max, body } => self.repeat(body, rules, pos, *min, *max),
            MatcherNode::Lookahead(body) => {
                let mark = self.scope_mark();
                let result = self.exec(body, rules, pos);
                self.scope_truncate(mark);
                match result {
                    Step::Matched(_) => Step::Matched(pos),
                    Step::Failed => Step::Failed,
                    Step::Aborted => Step::Aborted,
                }
            }
            MatcherNode::Negative(body) => {
                let mark = self.scope_mark();
                let result = self.exec(body, rules, pos);
                self.scope_truncate(mark);
                match result {
                    Step::Matched(_) => Step::Failed,
                    Step::Failed => Step::Matched(pos),
                    Step::Aborted => Step::Aborted,
                }
            }
            MatcherNode::StartAnchor => {
                if pos == 0 {
                    Step::Matched(pos)
                } else {
                    Step::Failed
                }
            }
            MatcherNode::EndAnchor => {
                if pos == self.input.len() {
                    Step::Matched(pos)
                } else {
                    Step::Failed
                }
            }
            MatcherNode::Behind { width, body } => {
                if pos < *width {
                    return Step::Failed;
                }
                let start = pos - width;
                let mark = self.scope_mark();
                let result = self.exec(body, rules, start);
                self.scope_truncate(mark);
                match result {
                    Step::Matched(end) if end == pos => Step::Matched(pos),
                    Step::Matched(_) | Step::Failed => Step::Failed,
                    Step::Aborted => Step::Aborted,
                }
            }
            MatcherNode::Grammar { rules: own_rules, entry } => self.exec(&own_rules[*entry], own_rules, pos),
            MatcherNode::RuleRef(idx) => {
                if let Some(trace) = self.trace.as_deref_mut() {
                    trace.push(TraceEvent::RuleEnter { rule: *idx, pos });
                }
                self.exec(&rules[*idx], rules, pos)
            }
            MatcherNode::Capture { name, body } => {
                self.scopes.push(Vec::new());
                match self.exec(body, rules, pos) {
                    Step::Matched(end) => {
                        let subs = self.scopes.pop().unwrap_or_default();
                        self.scope_push_node(MatchTree { name: name.clone(), start: pos, end, data: None, subs });
                        Step::Matched(end)
                    }
                    Step::Failed => {
                        self.scopes.pop();
                        Step::Failed
                    }
                    Step::Aborted => {
                        self.scopes.pop();
                        Step::Aborted
                    }
                }
            }
            MatcherNode::ConstCapture { name, text } => {
                self.scope_push_node(MatchTree {
                    name: name.clone(),
                    start: pos,
                    end: pos,
                    data: Some(text.clone()),
                    subs: Vec::new(),
                });
                Step::Matched(pos)
            }
            MatcherNode::Halt => {
                if let Some(trace) = self.trace.as_deref_mut() {
                    trace.push(TraceEvent::Halted { pos });
                }
                Step::Aborted
            }
        }
    }

    fn repeat(&mut self, body: &Matcher, rules: &[Matcher], pos: usize, min: u32, max: Option<u32>) -> Step {
        let mut cur = pos;
        let mut count = 0u32;
        loop {
            if let Some(max) = max {
                if count >= max {
                    break;
                }
            }
            if self.cancelled_or_over_budget() {
                return Step::Aborted;
            }
            let mark = self.scope_mark();
            match self.exec(body, rules, cur) {
                Step::Matched(next) if next == cur && count >= min => {
                    // Zero-width match past the minimum: stop, don't loop forever.
                    break;
                }
                Step::Matched(next) => {
                    cur = next;
                    count += 1;
                }
                Step::Failed => {
                    self.scope_truncate(mark);
                    break;
                }
                Step::Aborted => return Step::Aborted,
            }
        }
        if count >= min {
            Step::Matched(cur)
        } else {
            Step::Failed
        }
    }
}

/// Execute `matcher` against `input` starting at byte offset `start`.
///
/// Per spec §4.5: follows PEG semantics exactly (ordered choice first-match-
/// wins, predicates zero-width, greedy quantifiers), is zero-copy over
/// `input`, and treats `halt` and cancellation/resource exhaustion
/// identically as an abort that still returns whatever was captured so far.
pub fn run(matcher: &Matcher, input: &[u8], start: usize, limits: RunLimits, cancel: &AtomicBool) -> MatchOutcome {
    run_traced(matcher, input, start, limits, cancel, None)
}

pub fn run_traced(
    matcher: &Matcher,
    input: &[u8],
    start: usize,
    limits: RunLimits,
    cancel: &AtomicBool,
    trace: Option<&mut Vec<TraceEvent>>,
) -> MatchOutcome {
    let mut exec = Exec {
        input,
        scopes: vec![Vec::new()],
        alloc_used: 0,
        limits,
        cancel,
        trace,
        watermark_hit: false,
    };
    let empty_rules: [Matcher; 0] = [];
    match exec.exec(matcher, &empty_rules, start) {
        Step::Matched(end) => {
            let tree = exec.scopes.pop().unwrap_or_default();
            MatchOutcome { ok: true, tree, leftover: input.len() - end, aborted: false }
        }
        Step::Failed => MatchOutcome { ok: false, tree: Vec::new(), leftover: input.len() - start, aborted: false },
        Step::Aborted => {
            let tree = exec.scopes.pop().unwrap_or_default();
            MatchOutcome { ok: !tree.is_empty(), tree, leftover: input.len(), aborted: true }
        }
    }
}

/// Concatenated printable leaf text, left to right — what the `subs`
/// encoder emits (spec §4.7 / §8).
pub fn leaf_texts<'a>(tree: &[MatchTree], input: &'a [u8], out: &mut Vec<&'a str>) {
    for node in tree {
        if node.subs.is_empty() {
            if let Ok(s) = std::str::from_utf8(&input[node.start..node.end]) {
                out.push(s);
            }
        } else {
            leaf_texts(&node.subs, input, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::ByteSet;

    fn no_cancel() -> AtomicBool {
        AtomicBool::new(false)
    }

    #[test]
    fn literal_matches_exact_bytes() {
        let m = Matcher::literal("hi");
        let out = run(&m, b"hi there", 0, RunLimits::default(), &no_cancel());
        assert!(out.ok);
        assert_eq!(out.leftover, 6);
    }

    #[test]
    fn choice_tries_alternatives_in_order() {
        let m = Matcher::choice(vec![Matcher::literal("a"), Matcher::literal("b")]);
        let out = run(&m, b"b", 0, RunLimits::default(), &no_cancel());
        assert!(out.ok);
    }

    #[test]
    fn plus_requires_at_least_one() {
        let digits = Matcher::plus(Matcher::charset(ByteSet::range(b'0', b'9')));
        assert!(!run(&digits, b"", 0, RunLimits::default(), &no_cancel()).ok);
        assert!(run(&digits, b"42", 0, RunLimits::default(), &no_cancel()).ok);
    }

    #[test]
    fn capture_produces_named_node_with_span() {
        let digits = Matcher::capture("number", Matcher::plus(Matcher::charset(ByteSet::range(b'0', b'9'))));
        let out = run(&digits, b"42x", 0, RunLimits::default(), &no_cancel());
        assert!(out.ok);
        assert_eq!(out.tree.len(), 1);
        assert_eq!((out.tree[0].start, out.tree[0].end), (0, 2));
        assert_eq!(out.tree[0].name, "number");
    }

    #[test]
    fn failed_choice_branch_discards_its_captures() {
        let bad = Matcher::sequence(vec![Matcher::capture("x", Matcher::literal("a")), Matcher::literal("Z")]);
        let good = Matcher::capture("y", Matcher::literal("ab"));
        let m = Matcher::choice(vec![bad, good]);
        let out = run(&m, b"ab", 0, RunLimits::default(), &no_cancel());
        assert!(out.ok);
        assert_eq!(out.tree.len(), 1);
        assert_eq!(out.tree[0].name, "y");
    }

    #[test]
    fn negative_lookahead_is_zero_width() {
        let m = Matcher::sequence(vec![Matcher::negative(Matcher::literal("x")), Matcher::literal("y")]);
        let out = run(&m, b"y", 0, RunLimits::default(), &no_cancel());
        assert!(out.ok);
        assert_eq!(out.leftover, 0);
    }

    #[test]
    fn halt_aborts_and_keeps_prior_captures() {
        let m = Matcher::sequence(vec![Matcher::capture("a", Matcher::literal("x")), Matcher::halt()]);
        let out = run(&m, b"x", 0, RunLimits::default(), &no_cancel());
        assert!(out.aborted);
        assert_eq!(out.tree.len(), 1);
        assert_eq!(out.tree[0].name, "a");
    }

    #[test]
    fn cancellation_flag_aborts_mid_match() {
        let cancel = AtomicBool::new(true);
        let m = Matcher::literal("x");
        let out = run(&m, b"x", 0, RunLimits::default(), &cancel);
        assert!(out.aborted);
    }

    #[test]
    fn grammar_supports_mutual_recursion() {
        // S = "a" S / ""
        let s_rule = Matcher::choice(vec![
            Matcher::sequence(vec![Matcher::literal("a"), Matcher::rule_ref(0)]),
            Matcher::literal(""),
        ]);
        let g = Matcher::grammar(vec![s_rule], 0);
        let out = run(&g, b"aaab", 0, RunLimits::default(), &no_cancel());
        assert!(out.ok);
        assert_eq!(out.leftover, 1);
    }

    #[test]
    fn behind_checks_fixed_width_prefix() {
        let digit = ByteSet::range(b'0', b'9');
        let word_boundary = Matcher::sequence(vec![
            Matcher::lookahead(Matcher::charset(digit.clone())),
            Matcher::negative(Matcher::behind(1, Matcher::charset(digit))),
        ]);
        let out_start = run(&word_boundary, b"5", 0, RunLimits::default(), &no_cancel());
        assert!(out_start.ok);
        let out_mid = run(&word_boundary, b"55", 1, RunLimits::default(), &no_cancel());
        assert!(!out_mid.ok);
    }
}
