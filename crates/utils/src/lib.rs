// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! `FastMap`/`FastSet`: the concurrent map type used for the rpl package
//! cache and engine handle tables.
//!
//! With the `dashmap` feature (the default) these are [`dashmap::DashMap`]
//! and [`dashmap::DashSet`], internally sharded and safe to share across
//! threads without an external lock. Without it, they fall back to a plain
//! `std::collections::HashMap`/`HashSet`, which is sufficient for
//! single-threaded embedders that never share a cache across engines.

mod fastmap;

pub use fastmap::{FastMap, FastSet};
