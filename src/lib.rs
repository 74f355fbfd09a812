// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! RPL — a composable, named-pattern alternative to regular expressions.
//!
//! This is the main library crate; it re-exports the component crates under
//! short names, plus [`Engine`] at the root for the common case of just
//! wanting to compile and run a pattern.
//!
//! ```
//! use rpl::Engine;
//!
//! let engine = Engine::new();
//! engine.load_source(b"alias number = [0-9]+").unwrap();
//! let compiled = engine.compile_expression(b"find(number)").unwrap();
//! let id = compiled.matcher_id.expect("find(number) compiles");
//! let result = engine.run_match(id, b"abc 42 xyz", "bool").unwrap();
//! assert!(!result.aborted);
//! ```

// Re-export the component crates under short names.
pub use rpl_ast as ast;
pub use rpl_compiler as compiler;
pub use rpl_core as core;
pub use rpl_encoder as encoder;
pub use rpl_engine as engine;
pub use rpl_env as env;
pub use rpl_parser as parser;
pub use rpl_prelude as prelude;
pub use rpl_runtime as runtime;

// The common entry point, promoted to the crate root.
pub use rpl_engine::Engine;

/// The RPL major version this crate's parser/compiler pair implements (spec
/// §6.2's `rpl M.m` version declaration).
pub const SUPPORTED_RPL_MAJOR: u32 = rpl_compiler::SUPPORTED_MAJOR;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_to_end_through_the_umbrella_crate() {
        let engine = Engine::new();
        engine.load_source(b"alias number = [0-9]+").unwrap();
        let compiled = engine.compile_expression(b"find(number)").unwrap();
        let id = compiled.matcher_id.expect("find(number) compiles");
        let result = engine.run_match(id, b"abc 42 xyz", "subs").unwrap();
        assert_eq!(result.data.as_text(), "42");
    }
}
