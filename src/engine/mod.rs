//! Engine - the live semantic model of a grammar workspace
//!
//! The engine owns:
//! - the document store (text, dirty flags)
//! - the dialect registry
//! - the [`WorkspaceIndex`]: scopes and symbols, per-file bindings, dependency edges
//! - the self-edit suppression table
//!
//! `compile()` brings the index up to date with the store; queries answer
//! against the index.

pub mod coordinator;
pub mod query;
pub mod refactor;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::adapter::{Dialect, DialectRegistry};
use crate::binder::{self, BindingRecord};
use crate::config::GrammarlensConfig;
use crate::edit::{Notification, SuppressionTable};
use crate::graph::DependencyGraph;
use crate::scope::{ScopeId, ScopeStore};
use crate::syntax::ParseOutput;
use crate::workspace::{DEFAULT_PROJECT, Document, DocumentStore, Workspace};

pub use query::{ClassifiedSpan, Diagnostic, Severity};

/// A range in one file, in character offsets
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub file: PathBuf,
    pub start: usize,
    pub end: usize,
}

/// Hover text for the symbol under the cursor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickInfo {
    pub display_text: String,
    pub start: usize,
    pub end: usize,
}

/// Everything the index keeps for one bound file
pub struct FileState {
    pub dialect: Arc<dyn Dialect>,
    pub parsed: ParseOutput,
    pub scope: ScopeId,
    pub record: BindingRecord,
}

/// Scopes, bindings and dependency edges for the whole workspace
pub struct WorkspaceIndex {
    pub scopes: ScopeStore,
    pub files: BTreeMap<PathBuf, FileState>,
    pub graph: DependencyGraph,
}

impl WorkspaceIndex {
    /// Empty index with the built-ins of every registered dialect bound
    pub fn new(registry: &DialectRegistry) -> Self {
        let mut scopes = ScopeStore::new();
        for dialect in registry.dialects() {
            binder::define_builtins(&mut scopes, dialect.as_ref());
        }
        Self { scopes, files: BTreeMap::new(), graph: DependencyGraph::new() }
    }

    pub fn file(&self, path: &Path) -> Option<&FileState> {
        self.files.get(path)
    }

    /// Drop a file from the index.
    ///
    /// Returns the files whose bindings may have depended on it.
    pub fn forget(&mut self, path: &Path) -> BTreeSet<PathBuf> {
        let Some(state) = self.files.remove(path) else {
            return BTreeSet::new();
        };
        let freed = self.scopes.remove_file_symbols(state.scope, path);
        self.graph.remove_file(path);

        let mut affected = self.graph.dependents_of(path);
        for (other, other_state) in &self.files {
            if other_state.scope == state.scope
                && freed.iter().any(|name| other_state.record.dropped.contains(name))
            {
                affected.insert(other.clone());
            }
        }
        affected.remove(path);
        affected
    }
}

/// The semantic engine over one workspace
pub struct Engine {
    store: Box<dyn DocumentStore>,
    registry: DialectRegistry,
    index: WorkspaceIndex,
    suppression: SuppressionTable,
    config: GrammarlensConfig,
}

impl Engine {
    /// Engine over an empty in-memory workspace
    pub fn new(registry: DialectRegistry, config: GrammarlensConfig) -> Self {
        Self::with_store(Box::new(Workspace::new()), registry, config)
    }

    pub fn with_store(
        store: Box<dyn DocumentStore>,
        registry: DialectRegistry,
        config: GrammarlensConfig,
    ) -> Self {
        let index = WorkspaceIndex::new(&registry);
        Self { store, registry, index, suppression: SuppressionTable::new(), config }
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn index(&self) -> &WorkspaceIndex {
        &self.index
    }

    pub fn registry(&self) -> &DialectRegistry {
        &self.registry
    }

    pub fn config(&self) -> &GrammarlensConfig {
        &self.config
    }

    pub fn suppression(&self) -> &SuppressionTable {
        &self.suppression
    }

    /// True if some document is stale
    pub fn needs_compile(&self) -> bool {
        self.store.documents().iter().any(|d| d.dirty)
            || self.index.files.keys().any(|p| self.store.find_document(p).is_none())
    }

    /// Add or replace a document; it is bound on the next compile
    pub fn open_document(&mut self, path: &Path, text: impl Into<String>) {
        self.suppression.disarm(path);
        match self.store.find_document_mut(path) {
            Some(doc) => doc.set_text(text),
            None => self.store.add_document(DEFAULT_PROJECT, Document::new(path, text)),
        }
    }

    /// Handle a change notification from the editor or the file system.
    ///
    /// The echo of the engine's own edit is consumed without touching the document.
    pub fn notify_change(&mut self, path: &Path, text: impl Into<String>) -> Notification {
        let text = text.into();
        let outcome = self.suppression.on_notification(path, &text);
        if outcome.needs_rebind() {
            match self.store.find_document_mut(path) {
                Some(doc) => doc.set_text(text),
                None => self.store.add_document(DEFAULT_PROJECT, Document::new(path, text)),
            }
        }
        outcome
    }

    /// Remove a document from the store and the index; its dependents go stale
    pub fn close_document(&mut self, path: &Path) -> Option<Document> {
        self.suppression.disarm(path);
        let removed = self.store.remove_document(path);
        let affected = self.index.forget(path);
        self.mark_dirty(&affected);
        removed
    }

    fn mark_dirty(&mut self, paths: &BTreeSet<PathBuf>) {
        for path in paths {
            if let Some(doc) = self.store.find_document_mut(path) {
                doc.dirty = true;
            }
        }
    }

    /// Discard the whole index and mark every document stale, so the next
    /// compile rebuilds a consistent model from scratch
    pub fn reset_index(&mut self) {
        self.index = WorkspaceIndex::new(&self.registry);
        let paths: BTreeSet<PathBuf> =
            self.store.documents().iter().map(|d| d.path.clone()).collect();
        self.mark_dirty(&paths);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapter::default_registry;

    pub(crate) fn engine_with(files: &[(&str, &str)]) -> Engine {
        let mut engine = Engine::new(default_registry(), GrammarlensConfig::default());
        for (path, text) in files {
            engine.open_document(Path::new(path), *text);
        }
        engine
    }

    #[test]
    fn test_builtins_seeded() {
        let engine = engine_with(&[]);
        assert!(engine.index().scopes.lookup_local(ScopeId::global(), "EOF").is_some());
        assert!(engine.index().scopes.lookup_local(ScopeId::global(), "DEFAULT_MODE").is_some());
    }

    #[test]
    fn test_notify_change_marks_dirty() {
        let mut engine = engine_with(&[("/g/a.g4", "a : 'x' ;")]);
        engine.compile().unwrap();
        assert!(!engine.needs_compile());

        let outcome = engine.notify_change(Path::new("/g/a.g4"), "a : 'y' ;");
        assert_eq!(outcome, Notification::Fresh);
        assert!(engine.needs_compile());
    }

    #[test]
    fn test_close_marks_dependents_dirty() {
        let mut engine = engine_with(&[("/g/a.g4", "a : b ;"), ("/g/b.g4", "b : 'x' ;")]);
        engine.compile().unwrap();

        engine.close_document(Path::new("/g/b.g4"));
        assert!(engine.index().file(Path::new("/g/b.g4")).is_none());
        assert!(engine.store().find_document(Path::new("/g/a.g4")).unwrap().dirty);

        let recompiled = engine.compile().unwrap();
        assert_eq!(recompiled, vec![PathBuf::from("/g/a.g4")]);
        let state = engine.index().file(Path::new("/g/a.g4")).unwrap();
        assert!(state.record.unresolved.contains("b"));
    }

    #[test]
    fn test_reset_index_rebuilds() {
        let mut engine = engine_with(&[("/g/a.g4", "a : b ;"), ("/g/b.g4", "b : 'x' ;")]);
        engine.compile().unwrap();
        engine.reset_index();
        assert!(engine.index().files.is_empty());
        assert_eq!(engine.compile().unwrap().len(), 2);
        assert!(engine.index().file(Path::new("/g/a.g4")).unwrap().record.unresolved.is_empty());
    }
}
