// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! The PEG matcher IR and matcher runtime (spec §3 "Matcher IR", §4.5, §4.6).

mod charset;
mod exec;
mod matcher;

pub use charset::ByteSet;
pub use exec::{leaf_texts, run, run_traced, MatchOutcome, MatchTree, RunLimits, TraceEvent};
pub use matcher::{Matcher, MatcherNode};
