// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! The public engine API (spec §6.1): `Engine::new`, `load_source`,
//! `import_package`, `compile_expression`, `match`/`trace`, alloc-limit
//! tunables, all guarded by one exclusive per-engine lock.

mod engine;
mod loader;

pub use engine::{
    CompileResult, Engine, EngineConfig, ImportResult, LoadResult, MatchResult, MatcherId, TraceResult, TraceStyle,
};
pub use loader::{FsPackageLoader, PackageLoader};
pub use rpl_encoder::{EncodeFormat, EncodedData};
