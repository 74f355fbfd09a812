// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! Output encoders (spec §4.7): stateless functions over a match tree plus
//! the original input bytes. None of these touch the compiler or the
//! runtime beyond reading `MatchOutcome`/`MatchTree`.

use rpl_runtime::{leaf_texts, MatchOutcome, MatchTree};
use std::fmt;
use std::str::FromStr;

/// One of the six output formats from spec §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeFormat {
    Tree,
    Json,
    Subs,
    Line,
    Bool,
    Count,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEncoder(pub String);

impl fmt::Display for UnknownEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown encoder `{}`", self.0)
    }
}

impl std::error::Error for UnknownEncoder {}

impl FromStr for EncodeFormat {
    type Err = UnknownEncoder;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tree" => Ok(Self::Tree),
            "json" => Ok(Self::Json),
            "subs" => Ok(Self::Subs),
            "line" => Ok(Self::Line),
            "bool" => Ok(Self::Bool),
            "count" => Ok(Self::Count),
            other => Err(UnknownEncoder(other.to_string())),
        }
    }
}

/// The engine API's `data` payload (spec §6.1 `match`): always a string
/// except for `bool`/`count`, which the caller renders however it likes.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedData {
    Text(String),
    Bool(bool),
    Count(usize),
}

impl EncodedData {
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
            Self::Count(n) => n.to_string(),
        }
    }
}

pub fn encode(format: EncodeFormat, outcome: &MatchOutcome, input: &[u8]) -> EncodedData {
    match format {
        EncodeFormat::Tree => EncodedData::Text(encode_tree(outcome, input)),
        EncodeFormat::Json => EncodedData::Text(encode_json(outcome).to_string()),
        EncodeFormat::Subs => EncodedData::Text(encode_subs(outcome, input)),
        EncodeFormat::Line => EncodedData::Text(encode_line(outcome, input)),
        EncodeFormat::Bool => EncodedData::Bool(outcome.ok),
        EncodeFormat::Count => EncodedData::Count(outcome.tree.len()),
    }
}

// ---- json --------------------------------------------------------------

fn node_to_json(node: &MatchTree) -> serde_json::Value {
    serde_json::json!({
        "type": node.name,
        "s": node.start,
        "e": node.end,
        "data": node.data,
        "subs": node.subs.iter().map(node_to_json).collect::<Vec<_>>(),
    })
}

pub fn encode_json(outcome: &MatchOutcome) -> serde_json::Value {
    serde_json::Value::Array(outcome.tree.iter().map(node_to_json).collect())
}

/// Inverse of [`encode_json`], for the round-trip property in spec §8
/// (`parse(json(tree)) = tree`).
pub fn decode_json(value: &serde_json::Value) -> Result<Vec<MatchTree>, String> {
    let Some(array) = value.as_array() else { return Err("expected a JSON array of match nodes".to_string()) };
    array.iter().map(node_from_json).collect()
}

fn node_from_json(value: &serde_json::Value) -> Result<MatchTree, String> {
    let obj = value.as_object().ok_or("expected a JSON object")?;
    let name = obj.get("type").and_then(|v| v.as_str()).ok_or("missing `type`")?.to_string();
    let start = obj.get("s").and_then(serde_json::Value::as_u64).ok_or("missing `s`")? as usize;
    let end = obj.get("e").and_then(serde_json::Value::as_u64).ok_or("missing `e`")? as usize;
    let data = match obj.get("data") {
        Some(serde_json::Value::Null) | None => None,
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(_) => return Err("`data` must be a string or null".to_string()),
    };
    let subs = match obj.get("subs") {
        Some(serde_json::Value::Array(items)) => items.iter().map(node_from_json).collect::<Result<Vec<_>, _>>()?,
        _ => return Err("missing `subs`".to_string()),
    };
    Ok(MatchTree { name, start, end, data, subs })
}

// ---- subs ----------------------------------------------------------------

fn encode_subs(outcome: &MatchOutcome, input: &[u8]) -> String {
    let mut out = Vec::new();
    leaf_texts(&outcome.tree, input, &mut out);
    out.join("\n")
}

// ---- line ------------------------------------------------------------------

fn line_span(input: &[u8], pos: usize) -> (usize, usize) {
    let pos = pos.min(input.len());
    let start = input[..pos].iter().rposition(|&b| b == b'\n').map_or(0, |p| p + 1);
    let end = input[pos..].iter().position(|&b| b == b'\n').map_or(input.len(), |p| pos + p);
    (start, end)
}

fn encode_line(outcome: &MatchOutcome, input: &[u8]) -> String {
    let Some(first) = outcome.tree.first() else { return String::new() };
    let (start, end) = line_span(input, first.start);
    String::from_utf8_lossy(&input[start..end]).into_owned()
}

// ---- tree (colorized text) -------------------------------------------------

const PALETTE: [u8; 6] = [31, 32, 33, 34, 35, 36];

fn color_for(name: &str) -> u8 {
    let hash = name.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
    PALETTE[(hash as usize) % PALETTE.len()]
}

/// Only leaves are colorized — the innermost capture under the cursor wins,
/// matching the `subs` encoder's notion of what's "interesting" about a
/// match tree.
fn collect_leaf_spans<'a>(nodes: &'a [MatchTree], out: &mut Vec<(&'a str, usize, usize)>) {
    for node in nodes {
        if node.subs.is_empty() {
            if node.end > node.start {
                out.push((node.name.as_str(), node.start, node.end));
            }
        } else {
            collect_leaf_spans(&node.subs, out);
        }
    }
}

fn encode_tree(outcome: &MatchOutcome, input: &[u8]) -> String {
    let Some(first) = outcome.tree.first() else { return String::new() };
    let (line_start, line_end) = line_span(input, first.start);

    let mut spans = Vec::new();
    collect_leaf_spans(&outcome.tree, &mut spans);
    spans.sort_by_key(|&(_, s, _)| s);

    let mut out = String::new();
    let mut cursor = line_start;
    for (name, start, end) in spans {
        if start < cursor || end > line_end {
            continue;
        }
        out.push_str(&String::from_utf8_lossy(&input[cursor..start]));
        out.push_str(&format!("\x1b[{}m", color_for(name)));
        out.push_str(&String::from_utf8_lossy(&input[start..end]));
        out.push_str("\x1b[0m");
        cursor = end;
    }
    out.push_str(&String::from_utf8_lossy(&input[cursor..line_end]));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str, start: usize, end: usize) -> MatchTree {
        MatchTree { name: name.to_string(), start, end, data: None, subs: Vec::new() }
    }

    fn outcome_of(tree: Vec<MatchTree>) -> MatchOutcome {
        MatchOutcome { ok: true, tree, leftover: 0, aborted: false }
    }

    #[test]
    fn format_names_round_trip() {
        assert_eq!("tree".parse::<EncodeFormat>().unwrap(), EncodeFormat::Tree);
        assert_eq!("count".parse::<EncodeFormat>().unwrap(), EncodeFormat::Count);
        assert!("nope".parse::<EncodeFormat>().is_err());
    }

    #[test]
    fn json_encodes_nested_captures() {
        let outer = MatchTree { name: "outer".to_string(), start: 0, end: 2, data: None, subs: vec![leaf("inner", 0, 2)] };
        let outcome = outcome_of(vec![outer]);
        let value = encode_json(&outcome);
        assert_eq!(value[0]["type"], "outer");
        assert_eq!(value[0]["subs"][0]["type"], "inner");
    }

    #[test]
    fn json_round_trips_through_decode() {
        let outer = MatchTree { name: "outer".to_string(), start: 0, end: 2, data: None, subs: vec![leaf("inner", 0, 2)] };
        let outcome = outcome_of(vec![outer]);
        let value = encode_json(&outcome);
        let decoded = decode_json(&value).unwrap();
        assert_eq!(decoded, outcome.tree);
    }

    #[test]
    fn subs_emits_leaf_texts_in_order() {
        let outcome = outcome_of(vec![leaf("a", 0, 1), leaf("b", 2, 3)]);
        assert_eq!(encode_subs(&outcome, b"x y"), "x\ny");
    }

    #[test]
    fn count_is_the_number_of_top_level_matches() {
        let outcome = outcome_of(vec![leaf("a", 0, 1), leaf("a", 2, 3), leaf("a", 4, 5)]);
        let EncodedData::Count(n) = encode(EncodeFormat::Count, &outcome, b"a a a") else { panic!("expected count") };
        assert_eq!(n, 3);
    }

    #[test]
    fn bool_reflects_whether_the_match_succeeded() {
        let failed = MatchOutcome { ok: false, tree: Vec::new(), leftover: 5, aborted: false };
        let EncodedData::Bool(b) = encode(EncodeFormat::Bool, &failed, b"hello") else { panic!("expected bool") };
        assert!(!b);
    }

    #[test]
    fn line_returns_the_whole_line_containing_the_match() {
        let outcome = outcome_of(vec![leaf("n", 6, 8)]);
        assert_eq!(encode_line(&outcome, b"abc\n42 xyz"), "42 xyz");
    }

    #[test]
    fn tree_colorizes_only_the_leaf_span() {
        let outcome = outcome_of(vec![leaf("number", 4, 6)]);
        let rendered = encode_tree(&outcome, b"abc 42 xyz");
        assert!(rendered.contains("42"));
        assert!(rendered.contains("\x1b["));
        assert!(rendered.starts_with("abc "));
    }
}
