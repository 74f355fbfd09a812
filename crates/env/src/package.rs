// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! The process-wide package table (spec §3 "Package table", §9 "package
//! caches use an internally synchronized map"): `importpath -> environment`,
//! shared by every engine in the process. Re-importing the same path
//! returns the cached environment rather than recompiling it.

use crate::environment::Environment;
use rpl_utils::FastMap;

#[derive(Default)]
pub struct PackageCache {
    by_importpath: FastMap<String, Environment>,
}

impl PackageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, importpath: &str) -> Option<Environment> {
        self.by_importpath.get(importpath).map(|entry| entry.value().clone())
    }

    /// Insert the environment compiled for `importpath`, returning the
    /// winning environment. If another caller already inserted one
    /// concurrently, that one wins (avoids discarding work already observed
    /// by other engines).
    pub fn get_or_insert(&self, importpath: &str, build: impl FnOnce() -> Environment) -> Environment {
        if let Some(existing) = self.get(importpath) {
            return existing;
        }
        let built = build();
        self.by_importpath.entry(importpath.to_string()).or_insert(built).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reimport_returns_cached_environment() {
        let cache = PackageCache::new();
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let build = || {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Environment::root()
        };
        let _ = cache.get_or_insert("net", build);
        let _ = cache.get_or_insert("net", build);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
