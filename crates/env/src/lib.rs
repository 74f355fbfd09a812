// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! The binding environment and package cache (spec §4.2, §3 "Package
//! table"). The prelude itself (its concrete built-in bindings) lives in
//! `rpl-prelude`, one layer up, to avoid a dependency cycle.

mod environment;
mod package;

pub use environment::{Binding, Environment, MacroFn, PfunctionFn};
pub use package::PackageCache;

#[cfg(test)]
mod tests {
    use super::*;
    use rpl_runtime::Matcher;

    #[test]
    fn child_shadows_parent() {
        let root = Environment::root();
        root.bind("x", Binding::pattern(Matcher::literal("root"), false));
        let child = Environment::extend(&root);
        child.bind("x", Binding::pattern(Matcher::literal("child"), false));

        let Some(Binding::Pattern { matcher, .. }) = child.lookup("x", None) else { panic!("missing") };
        assert!(matches!(matcher.node(), rpl_runtime::MatcherNode::Literal(b) if b == b"child"));

        // The parent is untouched.
        let Some(Binding::Pattern { matcher, .. }) = root.lookup("x", None) else { panic!("missing") };
        assert!(matches!(matcher.node(), rpl_runtime::MatcherNode::Literal(b) if b == b"root"));
    }

    #[test]
    fn sealed_scope_rejects_binds() {
        let prelude = Environment::root();
        prelude.bind("dot", Binding::pattern(Matcher::any_byte(), false));
        let prelude = prelude.sealed();
        assert!(!prelude.bind("new", Binding::pattern(Matcher::any_byte(), false)));
        assert!(prelude.lookup("dot", None).is_some());
    }

    #[test]
    fn package_prefixed_lookup_only_sees_the_package_scope() {
        let pkg = Environment::root();
        pkg.bind("any", Binding::pattern(Matcher::any_byte(), false));

        let root = Environment::root();
        root.bind("net", Binding::Package(pkg));

        assert!(root.lookup("any", Some("net")).is_some());
        assert!(root.lookup("any", None).is_none());
    }
}
