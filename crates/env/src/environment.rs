// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! Lexically nested, copy-on-extend binding environment (spec §4.2).
//!
//! Parent scopes are shared (`Arc`) references, never mutated by a child's
//! `extend`. The prelude scope is the one place binds are always rejected.

use rpl_ast::Expr;
use rpl_runtime::Matcher;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub type MacroFn = Arc<dyn Fn(&Expr) -> Result<Expr, String> + Send + Sync>;
pub type PfunctionFn = Arc<dyn Fn(&[Expr]) -> Result<Matcher, String> + Send + Sync>;

#[derive(Clone)]
pub enum Binding {
    Pattern { matcher: Matcher, is_alias: bool, ast: Option<Expr> },
    Macro { primop: MacroFn, ast: Option<Expr> },
    Pfunction { primop: PfunctionFn, ast: Option<Expr> },
    Package(Environment),
}

impl Binding {
    pub fn pattern(matcher: Matcher, is_alias: bool) -> Self {
        Binding::Pattern { matcher, is_alias, ast: None }
    }
}

struct EnvNode {
    bindings: RwLock<HashMap<String, Binding>>,
    parent: Option<Environment>,
    read_only: bool,
}

/// A lexical scope, chained to its parent. Cheap to clone (an `Arc`
/// handle); clones share the same underlying scope.
#[derive(Clone)]
pub struct Environment(Arc<EnvNode>);

impl Environment {
    /// A brand-new root scope with no parent — used to build the prelude
    /// itself.
    pub fn root() -> Self {
        Self(Arc::new(EnvNode { bindings: RwLock::new(HashMap::new()), parent: None, read_only: false }))
    }

    /// `extend(parent) -> env`: a new, empty scope chained to `parent`.
    pub fn extend(parent: &Environment) -> Self {
        Self(Arc::new(EnvNode {
            bindings: RwLock::new(HashMap::new()),
            parent: Some(parent.clone()),
            read_only: false,
        }))
    }

    /// Marks this scope read-only going forward; used once to seal the
    /// built-in prelude so user code can never shadow it in place (user
    /// scopes still shadow it via `extend`, which is how overriding a
    /// prelude name actually works).
    pub fn sealed(self) -> Self {
        Self(Arc::new(EnvNode {
            bindings: RwLock::new(self.0.bindings.read().unwrap().clone()),
            parent: self.0.parent.clone(),
            read_only: true,
        }))
    }

    /// `bind(env, name, value)`: mutates the current scope. Fails (returns
    /// `false`) if this scope is read-only (the prelude).
    pub fn bind(&self, name: impl Into<String>, value: Binding) -> bool {
        if self.0.read_only {
            return false;
        }
        self.0.bindings.write().unwrap().insert(name.into(), value);
        true
    }

    /// `lookup(env, localname, package?)`. With `package`, first resolves
    /// the package prefix to a package environment via the normal chain,
    /// then looks only in that package's own bindings (no further chain
    /// walk — an imported package's names don't inherit the importer's
    /// lexical scope).
    pub fn lookup(&self, localname: &str, package: Option<&str>) -> Option<Binding> {
        match package {
            None => self.lookup_chain(localname),
            Some(pkg) => {
                let Binding::Package(pkg_env) = self.lookup_chain(pkg)? else {
                    return None;
                };
                pkg_env.0.bindings.read().unwrap().get(localname).cloned()
            }
        }
    }

    fn lookup_chain(&self, name: &str) -> Option<Binding> {
        let mut cur = self;
        loop {
            if let Some(found) = cur.0.bindings.read().unwrap().get(name) {
                return Some(found.clone());
            }
            match &cur.0.parent {
                Some(parent) => cur = parent,
                None => return None,
            }
        }
    }

    /// `flatten(env) -> mapping`, root-to-leaf so a child shadows its
    /// parent's entry of the same name.
    pub fn flatten(&self) -> HashMap<String, Binding> {
        let mut chain = vec![self];
        let mut cur = self;
        while let Some(parent) = &cur.0.parent {
            chain.push(parent);
            cur = parent;
        }
        let mut out = HashMap::new();
        for scope in chain.into_iter().rev() {
            for (k, v) in scope.0.bindings.read().unwrap().iter() {
                out.insert(k.clone(), v.clone());
            }
        }
        out
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Binding::Pattern { is_alias, .. } => f.debug_struct("Pattern").field("is_alias", is_alias).finish(),
            Binding::Macro { .. } => f.write_str("Macro"),
            Binding::Pfunction { .. } => f.write_str("Pfunction"),
            Binding::Package(_) => f.write_str("Package"),
        }
    }
}
