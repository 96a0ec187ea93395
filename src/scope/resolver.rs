//! Name Resolver - resolves names to their final target symbol
//!
//! Resolution algorithm:
//! 1. Walk outward through the scope chain (innermost wins)
//! 2. Follow `resolution_target` forwarding (forward declarations)
//! 3. Stop at a symbol that forwards nowhere, or at a cycle

use rustc_hash::FxHashSet;

use super::graph::{ScopeId, ScopeStore};
use crate::symbol::{Symbol, SymbolId};

/// Resolver over a borrowed scope store
pub struct NameResolver<'a> {
    store: &'a ScopeStore,
}

impl<'a> NameResolver<'a> {
    pub fn new(store: &'a ScopeStore) -> Self {
        Self { store }
    }

    /// Resolve a name and follow forwarding to the final symbol
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.store.resolve(scope, name).map(|id| self.target(id))
    }

    /// Follow `resolution_target` links from `id`.
    ///
    /// A forwarding cycle stops at the last symbol before it repeats.
    pub fn target(&self, id: SymbolId) -> SymbolId {
        let mut visited = FxHashSet::default();
        let mut current = id;
        visited.insert(current);
        while let Some(next) = self.store.symbol(current).and_then(|s| s.resolution_target) {
            if !visited.insert(next) || self.store.symbol(next).is_none() {
                break;
            }
            current = next;
        }
        current
    }

    pub fn resolve_symbol(&self, scope: ScopeId, name: &str) -> Option<&'a Symbol> {
        self.resolve(scope, name).and_then(|id| self.store.symbol(id))
    }
}
