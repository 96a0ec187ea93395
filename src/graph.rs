//! Dependency Graph - which files' references resolve into which files
//!
//! An edge `dependent -> dependency` exists when a reference in `dependent`
//! resolved to a symbol defined in `dependency`. Edges are owned by the
//! dependent file and rebuilt from scratch each time that file is re-bound.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};

/// Bidirectional file dependency graph
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Forward edges: file -> files its references resolve into
    dependencies: FxHashMap<PathBuf, FxHashSet<PathBuf>>,
    /// Reverse edges: file -> files to notify when it changes
    dependents: FxHashMap<PathBuf, FxHashSet<PathBuf>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `dependent` resolved a reference into `dependency`
    pub fn record(&mut self, dependent: &Path, dependency: &Path) {
        if dependent == dependency {
            return;
        }
        self.dependencies
            .entry(dependent.to_path_buf())
            .or_default()
            .insert(dependency.to_path_buf());
        self.dependents
            .entry(dependency.to_path_buf())
            .or_default()
            .insert(dependent.to_path_buf());
    }

    /// Drop every edge owned by `file` (its outgoing edges)
    pub fn clear_file(&mut self, file: &Path) {
        let Some(old) = self.dependencies.remove(file) else {
            return;
        };
        for dependency in old {
            if let Some(reverse) = self.dependents.get_mut(&dependency) {
                reverse.remove(file);
                if reverse.is_empty() {
                    self.dependents.remove(&dependency);
                }
            }
        }
    }

    /// Forget a file entirely; its dependents keep their (now stale) edges
    /// until they are re-bound
    pub fn remove_file(&mut self, file: &Path) {
        self.clear_file(file);
    }

    /// Files whose references resolve directly into `file`, sorted
    pub fn dependents_of(&self, file: &Path) -> BTreeSet<PathBuf> {
        self.dependents
            .get(file)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Files `file` depends on, sorted
    pub fn dependencies_of(&self, file: &Path) -> BTreeSet<PathBuf> {
        self.dependencies
            .get(file)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every file that transitively depends on `file`, excluding `file` itself.
    ///
    /// Cycles are handled by tracking visited files.
    pub fn affected_files(&self, file: &Path) -> BTreeSet<PathBuf> {
        let mut affected = BTreeSet::new();
        let mut stack = vec![file.to_path_buf()];

        while let Some(current) = stack.pop() {
            for dependent in self.dependents.get(&current).into_iter().flatten() {
                if dependent != file && affected.insert(dependent.clone()) {
                    stack.push(dependent.clone());
                }
            }
        }

        affected
    }

    /// Get statistics about the graph
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            files: self
                .dependencies
                .keys()
                .chain(self.dependents.keys())
                .collect::<FxHashSet<_>>()
                .len(),
            edges: self.dependencies.values().map(|v| v.len()).sum(),
        }
    }
}

/// Statistics about a dependency graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphStats {
    pub files: usize,
    pub edges: usize,
}

impl std::fmt::Display for GraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} cross-file edges between {} files", self.edges, self.files)
    }
}
