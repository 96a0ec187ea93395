//! Scope/symbol store for name binding
//!
//! The store tracks:
//! - One global scope holding dialect built-ins
//! - One scope per grouping key (the directory of a file), child of the global scope
//! - An arena of symbols addressed by [`SymbolId`]
//!
//! Scopes are created lazily and live as long as the store. Each scope's
//! parent is fixed at creation, so scopes always form a tree.
//!
//! Symbol slots freed by a file purge are recycled, so the arena stays as
//! large as the live symbol set rather than the edit history. A handle to a
//! purged symbol is only valid until the next allocation.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::symbol::{Classification, DefinitionSite, Symbol, SymbolId};

/// Unique identifier for a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

impl ScopeId {
    /// The root scope every grouping scope hangs off
    pub fn global() -> Self {
        Self(0)
    }
}

/// Returned by [`ScopeStore::define`] when the name is already bound in that scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duplicate {
    pub existing: SymbolId,
}

#[derive(Debug, Default)]
struct Scope {
    parent: Option<ScopeId>,
    key: Option<PathBuf>,
    symbols: FxHashMap<String, SymbolId>,
}

/// Arena of scopes and symbols
#[derive(Debug)]
pub struct ScopeStore {
    scopes: Vec<Scope>,
    by_key: FxHashMap<PathBuf, ScopeId>,
    /// Removed symbols are tombstoned until their slot is reused
    symbols: Vec<Option<Symbol>>,
    free: Vec<SymbolId>,
    by_file: FxHashMap<PathBuf, Vec<SymbolId>>,
    /// Forwarding target -> the forward declaration pointing at it
    forwarders: FxHashMap<SymbolId, SymbolId>,
}

impl Default for ScopeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStore {
    /// Create a store holding only the global scope
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
            by_key: FxHashMap::default(),
            symbols: Vec::new(),
            free: Vec::new(),
            by_file: FxHashMap::default(),
            forwarders: FxHashMap::default(),
        }
    }

    /// Scope for a grouping key, created on first use (idempotent)
    pub fn get_or_create_scope(&mut self, key: &Path) -> ScopeId {
        if let Some(id) = self.by_key.get(key) {
            return *id;
        }
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent: Some(ScopeId::global()),
            key: Some(key.to_path_buf()),
            symbols: FxHashMap::default(),
        });
        self.by_key.insert(key.to_path_buf(), id);
        id
    }

    pub fn scope_for_key(&self, key: &Path) -> Option<ScopeId> {
        self.by_key.get(key).copied()
    }

    pub fn key(&self, scope: ScopeId) -> Option<&Path> {
        self.scopes.get(scope.0 as usize)?.key.as_deref()
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes.get(scope.0 as usize)?.parent
    }

    /// Bind `name` in `scope`; the first definition of a name wins
    pub fn define(
        &mut self,
        scope: ScopeId,
        name: &str,
        classification: Classification,
        definition: Option<DefinitionSite>,
    ) -> Result<SymbolId, Duplicate> {
        self.define_symbol(Symbol::new(name, classification, scope, definition))
    }

    /// Bind a fully built symbol in its own scope
    pub fn define_symbol(&mut self, symbol: Symbol) -> Result<SymbolId, Duplicate> {
        let scope = symbol.scope;
        if let Some(existing) = self.lookup_local(scope, &symbol.name) {
            return Err(Duplicate { existing });
        }
        let name = symbol.name.clone();
        let id = self.alloc(symbol);
        self.scopes[scope.0 as usize].symbols.insert(name, id);
        Ok(id)
    }

    /// Allocate a symbol that is not bound by name in any scope.
    ///
    /// Detached symbols are only reachable as a forwarding target.
    pub fn alloc_detached(&mut self, symbol: Symbol) -> SymbolId {
        self.alloc(symbol)
    }

    fn alloc(&mut self, symbol: Symbol) -> SymbolId {
        let file = symbol.file().cloned();
        let id = match self.free.pop() {
            Some(id) => {
                self.symbols[id.0 as usize] = Some(symbol);
                id
            }
            None => {
                self.symbols.push(Some(symbol));
                SymbolId(self.symbols.len() as u32 - 1)
            }
        };
        if let Some(file) = file {
            self.by_file.entry(file).or_default().push(id);
        }
        id
    }

    /// Point `from` at `to`; resolution of `from` then yields `to`
    pub fn forward(&mut self, from: SymbolId, to: SymbolId) {
        if let Some(Some(symbol)) = self.symbols.get_mut(from.0 as usize) {
            if let Some(previous) = symbol.resolution_target.replace(to) {
                self.forwarders.remove(&previous);
            }
            self.forwarders.insert(to, from);
        }
    }

    /// Number of slots in the symbol arena, live or free
    pub fn arena_len(&self) -> usize {
        self.symbols.len()
    }

    /// Number of live symbols
    pub fn live_count(&self) -> usize {
        self.symbols.len() - self.free.len()
    }

    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.0 as usize)?.as_ref()
    }

    /// Look up a definition in a scope (not walking parents)
    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.scopes.get(scope.0 as usize)?.symbols.get(name).copied()
    }

    /// Look up a definition walking up the scope chain; innermost wins
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(s) = current {
            if let Some(id) = self.lookup_local(s, name) {
                return Some(id);
            }
            current = self.parent(s);
        }
        None
    }

    /// Get scope chain from a scope up to the global scope
    pub fn scope_chain(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut chain = vec![scope];
        let mut current = scope;
        while let Some(parent) = self.parent(current) {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Every name visible from `scope`, with the symbol it resolves to
    pub fn visible_symbols(&self, scope: ScopeId) -> Vec<(&str, SymbolId)> {
        let mut seen = FxHashMap::default();
        for s in self.scope_chain(scope) {
            for (name, id) in &self.scopes[s.0 as usize].symbols {
                seen.entry(name.as_str()).or_insert(*id);
            }
        }
        let mut visible: Vec<_> = seen.into_iter().collect();
        visible.sort_by(|a, b| a.0.cmp(b.0));
        visible
    }

    /// Get all symbols bound directly in a scope
    pub fn symbols_in_scope(&self, scope: ScopeId) -> Vec<SymbolId> {
        self.scopes
            .get(scope.0 as usize)
            .map(|s| s.symbols.values().copied().collect())
            .unwrap_or_default()
    }

    /// Unbind and tombstone every symbol defined by `file`.
    ///
    /// Returns the names that are no longer bound in `scope`.
    pub fn remove_file_symbols(&mut self, scope: ScopeId, file: &Path) -> Vec<String> {
        let Some(owned) = self.by_file.remove(file) else {
            return Vec::new();
        };

        let mut freed = Vec::new();
        let mut kept = Vec::new();
        for id in owned {
            let slot = &mut self.symbols[id.0 as usize];
            if slot.as_ref().is_some_and(|s| s.scope != scope) {
                kept.push(id);
                continue;
            }
            let Some(symbol) = slot.take() else {
                continue;
            };
            self.free.push(id);

            if let Some(target) = symbol.resolution_target {
                self.forwarders.remove(&target);
            }
            // Forwarding into a removed symbol falls back to the declaration itself
            if let Some(from) = self.forwarders.remove(&id) {
                if let Some(Some(declaration)) = self.symbols.get_mut(from.0 as usize) {
                    if declaration.resolution_target == Some(id) {
                        declaration.resolution_target = None;
                    }
                }
            }

            let bound = &mut self.scopes[scope.0 as usize].symbols;
            if bound.get(&symbol.name) == Some(&id) {
                bound.remove(&symbol.name);
                freed.push(symbol.name);
            }
        }
        if !kept.is_empty() {
            self.by_file.insert(file.to_path_buf(), kept);
        }

        freed.sort();
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{NodeId, Span};

    fn site(file: &str, start: usize) -> Option<DefinitionSite> {
        Some(DefinitionSite {
            file: PathBuf::from(file),
            node: NodeId(start as u32),
            span: Span::new(start, start + 1),
        })
    }

    #[test]
    fn test_scope_per_key_is_idempotent() {
        let mut store = ScopeStore::new();
        let a = store.get_or_create_scope(Path::new("/g"));
        let b = store.get_or_create_scope(Path::new("/g"));
        let c = store.get_or_create_scope(Path::new("/h"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(store.parent(a), Some(ScopeId::global()));
        assert_eq!(store.parent(ScopeId::global()), None);
        assert_eq!(store.key(c), Some(Path::new("/h")));
    }

    #[test]
    fn test_first_definition_wins() {
        let mut store = ScopeStore::new();
        let scope = store.get_or_create_scope(Path::new("/g"));

        let first = store
            .define(scope, "y", Classification::Nonterminal, site("/g/a.g4", 0))
            .unwrap();
        let second = store.define(scope, "y", Classification::Nonterminal, site("/g/b.g4", 5));

        assert_eq!(second, Err(Duplicate { existing: first }));
        assert_eq!(store.resolve(scope, "y"), Some(first));
    }

    #[test]
    fn test_resolution_walks_to_global_and_shadows() {
        let mut store = ScopeStore::new();
        let scope = store.get_or_create_scope(Path::new("/g"));
        let other = store.get_or_create_scope(Path::new("/h"));

        let builtin = store
            .define(ScopeId::global(), "EOF", Classification::Terminal, None)
            .unwrap();
        assert_eq!(store.resolve(scope, "EOF"), Some(builtin));

        let local = store
            .define(scope, "EOF", Classification::Terminal, site("/g/a.g4", 0))
            .unwrap();
        assert_eq!(store.resolve(scope, "EOF"), Some(local));
        assert_eq!(store.resolve(other, "EOF"), Some(builtin));
    }

    #[test]
    fn test_remove_file_symbols_frees_names() {
        let mut store = ScopeStore::new();
        let scope = store.get_or_create_scope(Path::new("/g"));

        let a = store
            .define(scope, "x", Classification::Nonterminal, site("/g/a.g4", 0))
            .unwrap();
        store
            .define(scope, "z", Classification::Nonterminal, site("/g/b.g4", 0))
            .unwrap();

        let freed = store.remove_file_symbols(scope, Path::new("/g/a.g4"));
        assert_eq!(freed, vec!["x".to_string()]);
        assert!(store.symbol(a).is_none());
        assert!(store.resolve(scope, "x").is_none());
        assert!(store.resolve(scope, "z").is_some());
    }

    #[test]
    fn test_visible_symbols_prefer_inner_scope() {
        let mut store = ScopeStore::new();
        let scope = store.get_or_create_scope(Path::new("/g"));
        store.define(ScopeId::global(), "EOF", Classification::Terminal, None).unwrap();
        let local = store
            .define(scope, "EOF", Classification::Terminal, site("/g/a.g4", 0))
            .unwrap();
        store
            .define(scope, "expr", Classification::Nonterminal, site("/g/a.g4", 4))
            .unwrap();

        let visible = store.visible_symbols(scope);
        assert_eq!(visible.len(), 2);
        assert_eq!(visible[0], ("EOF", local));
        assert_eq!(visible[1].0, "expr");
    }

    #[test]
    fn test_purged_slots_are_reused() {
        let mut store = ScopeStore::new();
        let scope = store.get_or_create_scope(Path::new("/g"));
        store.define(scope, "keep", Classification::Nonterminal, site("/g/b.g4", 0)).unwrap();

        for round in 0..50 {
            store.remove_file_symbols(scope, Path::new("/g/a.g4"));
            store
                .define(scope, "x", Classification::Nonterminal, site("/g/a.g4", round))
                .unwrap();
            store
                .define(scope, "y", Classification::Terminal, site("/g/a.g4", round + 2))
                .unwrap();
        }

        assert_eq!(store.arena_len(), 3);
        assert_eq!(store.live_count(), 3);
        assert!(store.resolve(scope, "keep").is_some());
    }

    #[test]
    fn test_removing_forward_target_restores_declaration() {
        let mut store = ScopeStore::new();
        let scope = store.get_or_create_scope(Path::new("/g"));
        let decl = store
            .define_symbol(
                Symbol::new("ID", Classification::Terminal, scope, site("/g/a.g4", 0))
                    .with_forward_declaration(true),
            )
            .unwrap();
        let real = store.alloc_detached(Symbol::new(
            "ID",
            Classification::Terminal,
            scope,
            site("/g/b.g4", 3),
        ));
        store.forward(decl, real);

        let freed = store.remove_file_symbols(scope, Path::new("/g/b.g4"));
        assert!(freed.is_empty());
        assert_eq!(store.symbol(decl).and_then(|s| s.resolution_target), None);
        assert_eq!(store.live_count(), 1);
    }
}
