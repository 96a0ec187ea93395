//! Binder - the four per-file binding passes
//!
//! 1. Scope-init: attach the file to its directory scope, purge its old symbols, reset its record
//! 2. Definitions: bind every node the dialect classifies as a definition
//! 3. References: resolve every reference and rebuild the file's dependency edges
//! 4. Errors: retain the parse error nodes
//!
//! The coordinator runs each pass for every dirty file before starting the next,
//! so all definitions exist before any reference is resolved.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::debug;

use crate::adapter::Dialect;
use crate::graph::DependencyGraph;
use crate::scope::{Duplicate, NameResolver, ScopeId, ScopeStore};
use crate::symbol::{Classification, DefinitionSite, Symbol, SymbolId};
use crate::syntax::{NodeId, ParseOutput, Span};

/// Per-file binding results; rebuilt whenever the file is re-parsed
#[derive(Debug, Default, Clone)]
pub struct BindingRecord {
    /// Definition nodes that bound a symbol
    pub defs: BTreeMap<NodeId, Classification>,
    /// Reference nodes, resolved or not
    pub refs: BTreeMap<NodeId, Classification>,
    /// Highlight tags; superset of defs and refs
    pub tags: BTreeMap<NodeId, Classification>,
    pub errors: BTreeSet<NodeId>,
    /// Symbol bound by each definition node
    pub symbols: BTreeMap<NodeId, SymbolId>,
    /// Final target of each resolved reference node
    pub resolved: BTreeMap<NodeId, SymbolId>,
    /// Names referenced but not bound anywhere visible
    pub unresolved: BTreeSet<String>,
    /// Names whose definition here lost to an earlier one
    pub dropped: BTreeSet<String>,
    pub comments: Vec<(Span, Classification)>,
}

impl BindingRecord {
    /// The symbol a definition or reference node stands for
    pub fn symbol_at(&self, node: NodeId) -> Option<SymbolId> {
        self.symbols.get(&node).or_else(|| self.resolved.get(&node)).copied()
    }

    /// Classification of a node as definition or reference
    pub fn classification(&self, node: NodeId) -> Option<Classification> {
        self.defs.get(&node).or_else(|| self.refs.get(&node)).copied()
    }
}

/// Bind a dialect's built-in names in the global scope
pub fn define_builtins(store: &mut ScopeStore, dialect: &dyn Dialect) {
    for (name, classification) in dialect.builtins() {
        if store.lookup_local(ScopeId::global(), name).is_none() {
            let _ = store.define(ScopeId::global(), name, *classification, None);
        }
    }
}

/// Grouping key of a file: its directory
pub fn group_key(path: &Path) -> &Path {
    path.parent().unwrap_or(path)
}

/// Pass 1: attach the file's group scope, purge its previous symbols and
/// reset its record. Returns the scope and the names freed by the purge.
pub fn init_scope(
    store: &mut ScopeStore,
    path: &Path,
    record: &mut BindingRecord,
) -> (ScopeId, Vec<String>) {
    let scope = store.get_or_create_scope(group_key(path));
    let freed = store.remove_file_symbols(scope, path);
    *record = BindingRecord::default();
    (scope, freed)
}

/// Pass 2: bind every definition; the first writer of a name wins
pub fn bind_definitions(
    store: &mut ScopeStore,
    dialect: &dyn Dialect,
    parsed: &ParseOutput,
    path: &Path,
    scope: ScopeId,
    record: &mut BindingRecord,
) {
    let tree = &parsed.tree;
    for node in tree.terminals() {
        let Some(classification) = dialect.classify_definition(tree, record, node) else {
            if let Some(tag) = dialect.classify_tag(tree, node) {
                record.tags.insert(node, tag);
            }
            continue;
        };
        let leaf = tree.node(node);
        let name = leaf.text().unwrap_or_default().to_string();
        let forward = dialect.is_forward_declaration(tree, node);
        let site = DefinitionSite { file: path.to_path_buf(), node, span: leaf.span };
        let symbol = Symbol::new(name.clone(), classification, scope, Some(site))
            .with_forward_declaration(forward);

        record.tags.insert(node, classification);
        match store.define_symbol(symbol.clone()) {
            Ok(id) => {
                record.defs.insert(node, classification);
                record.symbols.insert(node, id);
            }
            Err(Duplicate { existing }) => {
                let declared_ahead = store
                    .symbol(existing)
                    .is_some_and(|s| s.forward_declaration && s.resolution_target.is_none());
                if declared_ahead && !forward {
                    // The real definition of a forward-declared name
                    let id = store.alloc_detached(symbol);
                    store.forward(existing, id);
                    record.defs.insert(node, classification);
                    record.symbols.insert(node, id);
                } else {
                    debug!(name = %name, file = %path.display(), "dropping duplicate definition");
                }
                record.dropped.insert(name);
            }
        }
    }
    record.comments = dialect.extract_comments(parsed);
}

/// Pass 3: resolve references against the current scope state.
///
/// The file's dependency edges are discarded and recomputed here.
pub fn bind_references(
    store: &ScopeStore,
    dialect: &dyn Dialect,
    parsed: &ParseOutput,
    path: &Path,
    scope: ScopeId,
    record: &mut BindingRecord,
    graph: &mut DependencyGraph,
) {
    graph.clear_file(path);
    record.refs.clear();
    record.resolved.clear();
    record.unresolved.clear();

    let tree = &parsed.tree;
    let resolver = NameResolver::new(store);
    for node in tree.terminals() {
        if record.defs.contains_key(&node) {
            continue;
        }
        let Some(classification) = dialect.classify_reference(tree, record, node) else {
            continue;
        };
        record.refs.insert(node, classification);
        record.tags.insert(node, classification);

        let name = tree.node(node).text().unwrap_or_default();
        let Some(direct) = store.resolve(scope, name) else {
            record.unresolved.insert(name.to_string());
            continue;
        };
        let target = resolver.target(direct);
        record.resolved.insert(node, target);
        for id in [direct, target] {
            if let Some(file) = store.symbol(id).and_then(|s| s.file()) {
                graph.record(path, file);
            }
        }
    }
}

/// Pass 4: retain parse error nodes
pub fn collect_errors(parsed: &ParseOutput, record: &mut BindingRecord) {
    record.errors = parsed.errors.iter().copied().collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Antlr4Dialect;
    use std::path::PathBuf;

    struct Bound {
        path: PathBuf,
        parsed: ParseOutput,
        scope: ScopeId,
        record: BindingRecord,
    }

    /// Run all four passes over `files` in order, pass by pass
    fn bind_all(store: &mut ScopeStore, graph: &mut DependencyGraph, files: &[(&str, &str)]) -> Vec<Bound> {
        let dialect = Antlr4Dialect::new();
        define_builtins(store, &dialect);
        let mut bound: Vec<Bound> = files
            .iter()
            .map(|(path, text)| {
                let path = PathBuf::from(path);
                let mut record = BindingRecord::default();
                let (scope, _) = init_scope(store, &path, &mut record);
                let parsed = dialect.backend().parse(text);
                Bound { path, parsed, scope, record }
            })
            .collect();
        for b in &mut bound {
            bind_definitions(store, &dialect, &b.parsed, &b.path, b.scope, &mut b.record);
        }
        for b in &mut bound {
            bind_references(store, &dialect, &b.parsed, &b.path, b.scope, &mut b.record, graph);
            collect_errors(&b.parsed, &mut b.record);
        }
        bound
    }

    fn node_named(b: &Bound, name: &str, nth: usize) -> NodeId {
        b.parsed
            .tree
            .terminals()
            .into_iter()
            .filter(|n| b.parsed.tree.node(*n).text() == Some(name))
            .nth(nth)
            .unwrap()
    }

    #[test]
    fn test_cross_file_resolution_in_same_directory() {
        let mut store = ScopeStore::new();
        let mut graph = DependencyGraph::new();
        let bound = bind_all(
            &mut store,
            &mut graph,
            &[("/g/g1.g4", "a : b c ;"), ("/g/g2.g4", "b : 'x' ;")],
        );

        let b_ref = node_named(&bound[0], "b", 0);
        let target = bound[0].record.resolved[&b_ref];
        let symbol = store.symbol(target).unwrap();
        assert_eq!(symbol.file(), Some(&PathBuf::from("/g/g2.g4")));
        assert_eq!(bound[0].record.unresolved, BTreeSet::from(["c".to_string()]));
        assert!(graph.dependents_of(Path::new("/g/g2.g4")).contains(Path::new("/g/g1.g4")));
    }

    #[test]
    fn test_other_directory_does_not_resolve() {
        let mut store = ScopeStore::new();
        let mut graph = DependencyGraph::new();
        let bound = bind_all(
            &mut store,
            &mut graph,
            &[("/g/a.g4", "x : 'x' ;"), ("/h/b.g4", "y : x ;")],
        );

        let x_ref = node_named(&bound[1], "x", 0);
        assert!(bound[1].record.resolved.get(&x_ref).is_none());
        assert_eq!(bound[1].record.refs.get(&x_ref), Some(&Classification::Nonterminal));
        assert_eq!(bound[1].record.tags.get(&x_ref), Some(&Classification::Nonterminal));
        assert!(graph.dependents_of(Path::new("/g/a.g4")).is_empty());
    }

    #[test]
    fn test_duplicate_definition_first_wins() {
        let mut store = ScopeStore::new();
        let mut graph = DependencyGraph::new();
        let bound = bind_all(
            &mut store,
            &mut graph,
            &[("/g/a.g4", "y : 'a' ;"), ("/g/b.g4", "y : 'b' ;\nz : y ;")],
        );

        let scope = bound[0].scope;
        let winner = store.resolve(scope, "y").unwrap();
        assert_eq!(store.symbol(winner).unwrap().file(), Some(&PathBuf::from("/g/a.g4")));
        assert_eq!(bound[0].record.defs.len(), 1);
        assert_eq!(bound[1].record.defs.len(), 1);
        assert!(bound[1].record.dropped.contains("y"));
    }

    #[test]
    fn test_forward_declaration_targets_lexer_rule() {
        let mut store = ScopeStore::new();
        let mut graph = DependencyGraph::new();
        let bound = bind_all(
            &mut store,
            &mut graph,
            &[("/g/a.g4", "tokens { ID }\nr : ID ;"), ("/g/b.g4", "ID : [a-z]+ ;")],
        );

        let id_ref = node_named(&bound[0], "ID", 1);
        let target = store.symbol(bound[0].record.resolved[&id_ref]).unwrap();
        assert_eq!(target.file(), Some(&PathBuf::from("/g/b.g4")));
        assert!(!target.forward_declaration);
        let head = node_named(&bound[1], "ID", 0);
        assert!(bound[1].record.defs.contains_key(&head));
        assert!(graph.dependents_of(Path::new("/g/b.g4")).contains(Path::new("/g/a.g4")));
    }

    #[test]
    fn test_builtins_resolve_everywhere() {
        let mut store = ScopeStore::new();
        let mut graph = DependencyGraph::new();
        let bound = bind_all(
            &mut store,
            &mut graph,
            &[("/g/a.g4", "r : 'x' EOF ;\nWS : ' ' -> channel(HIDDEN) ;")],
        );

        assert!(bound[0].record.unresolved.is_empty());
        let eof = node_named(&bound[0], "EOF", 0);
        assert!(store.symbol(bound[0].record.resolved[&eof]).unwrap().is_builtin());
        assert_eq!(graph.stats().edges, 0);
    }

    #[test]
    fn test_rebinding_is_idempotent() {
        let mut store = ScopeStore::new();
        let mut graph = DependencyGraph::new();
        let dialect = Antlr4Dialect::new();
        let mut bound = bind_all(&mut store, &mut graph, &[("/g/a.g4", "a : b ;\nb : 'x' $ ;")]);
        let before = bound[0].record.clone();

        let b = &mut bound[0];
        let (scope, freed) = init_scope(&mut store, &b.path, &mut b.record);
        assert_eq!(freed, vec!["a".to_string(), "b".to_string()]);
        bind_definitions(&mut store, &dialect, &b.parsed, &b.path, scope, &mut b.record);
        bind_references(&store, &dialect, &b.parsed, &b.path, scope, &mut b.record, &mut graph);
        collect_errors(&b.parsed, &mut b.record);

        assert_eq!(b.record.defs, before.defs);
        assert_eq!(b.record.refs, before.refs);
        assert_eq!(b.record.tags, before.tags);
        assert_eq!(b.record.errors, before.errors);
        assert_eq!(b.record.errors.len(), 1);
    }
}
