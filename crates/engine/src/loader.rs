// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! The external package loader (spec §5: "Compilation may do file I/O
//! through the external loader; that is the loader's concern, not the
//! core's."). Default implementation reads `.rpl` text files from the
//! engine's `libpath` (spec §6.3).

use std::path::{Path, PathBuf};

pub trait PackageLoader: Send + Sync {
    /// Resolves `importpath` to RPL source bytes, given the engine's current
    /// `lib_path` (if any). Errors are reported back as `RplError::LoaderError`
    /// by the caller.
    fn load(&self, importpath: &str, lib_path: Option<&Path>) -> Result<Vec<u8>, String>;
}

/// Reads `{lib_path}/{importpath}.rpl`. The only loader spec §6.3 describes:
/// "Libraries live as `.rpl` text files under the `libpath`."
#[derive(Debug, Default, Clone, Copy)]
pub struct FsPackageLoader;

impl PackageLoader for FsPackageLoader {
    fn load(&self, importpath: &str, lib_path: Option<&Path>) -> Result<Vec<u8>, String> {
        let Some(lib_path) = lib_path else {
            return Err("no libpath is set; call set_lib_path before importing".to_string());
        };
        let path: PathBuf = lib_path.join(format!("{importpath}.rpl"));
        std::fs::read(&path).map_err(|e| format!("{}: {e}", path.display()))
    }
}

#[cfg(test)]
pub(crate) struct InMemoryLoader(pub std::collections::HashMap<String, Vec<u8>>);

#[cfg(test)]
impl PackageLoader for InMemoryLoader {
    fn load(&self, importpath: &str, _lib_path: Option<&Path>) -> Result<Vec<u8>, String> {
        self.0.get(importpath).cloned().ok_or_else(|| format!("no such package `{importpath}`"))
    }
}
