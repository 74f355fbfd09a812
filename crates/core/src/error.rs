// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! The subset of spec §7's error taxonomy that surfaces as a hard `Err`
//! rather than a collected `Diagnostic`: engine-level failures that abort
//! the whole call, not just one binding.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RplError {
    #[error("no matcher with handle {0}")]
    NoSuchMatcher(u64),

    #[error("no encoder named {0:?}")]
    NoSuchEncoder(String),

    #[error("loader failed to resolve import {importpath:?}: {reason}")]
    LoaderError { importpath: String, reason: String },

    #[error("engine call failed: {0}")]
    EngineCallFailed(String),

    #[error("failed to acquire the engine's exclusive lock (programmer error: concurrent use of one engine)")]
    LockFailed,

    #[error("allocation ceiling {requested} is below the minimum of {minimum}")]
    BelowMinimumAllocLimit { requested: usize, minimum: usize },

    #[error("compilation aborted: {0}")]
    GrammarError(String),
}

pub type Result<T> = std::result::Result<T, RplError>;
