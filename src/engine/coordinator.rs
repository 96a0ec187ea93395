//! Change Coordinator
//!
//! `compile()` re-binds exactly the stale part of the workspace:
//!
//! 1. Parse every dirty document
//! 2. Run scope-init and definitions for the current round of files
//! 3. Grow the next round from files the round may have invalidated:
//!    - dependents of a re-bound file
//!    - same-group files that dropped a duplicate of a name freed this round
//!    - same-group files whose references may now resolve to a newly defined name
//! 4. Repeat until no file is added, then resolve references and collect
//!    errors over everything bound
//!
//! Files are visited in path order, so the first writer of a name is stable.

use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::{debug, info, info_span};

use super::{Engine, FileState};
use crate::binder::{self, BindingRecord};
use crate::scope::ScopeId;
use crate::{Error, Result};

impl Engine {
    /// Bring the index up to date; returns every file that was re-bound, sorted
    pub fn compile(&mut self) -> Result<Vec<PathBuf>> {
        let span = info_span!("compile");
        let _enter = span.enter();

        let Engine { store, registry, index, .. } = self;

        // Documents removed from the store behind our back
        let vanished: Vec<PathBuf> = index
            .files
            .keys()
            .filter(|p| store.find_document(p).is_none())
            .cloned()
            .collect();
        for path in &vanished {
            for affected in index.forget(path) {
                if let Some(doc) = store.find_document_mut(&affected) {
                    doc.dirty = true;
                }
            }
        }

        let dirty: Vec<PathBuf> = store
            .documents()
            .iter()
            .filter(|d| d.dirty)
            .map(|d| d.path.clone())
            .collect();
        if dirty.is_empty() {
            return Ok(Vec::new());
        }

        // Every dirty file needs a dialect before anything is mutated
        let mut dialects = Vec::with_capacity(dirty.len());
        for path in &dirty {
            let dialect = registry
                .find_dialect(path)
                .ok_or_else(|| Error::NoDialect(path.clone()))?;
            dialects.push(dialect);
        }

        for (path, dialect) in dirty.iter().zip(dialects) {
            let Some(doc) = store.find_document(path) else {
                continue;
            };
            let parsed = dialect.backend().parse(&doc.text);
            debug!(file = %path.display(), errors = parsed.errors.len(), "parsed");
            index.files.insert(
                path.clone(),
                FileState { dialect, parsed, scope: ScopeId::global(), record: BindingRecord::default() },
            );
        }

        let mut bound: BTreeSet<PathBuf> = BTreeSet::new();
        let mut round: BTreeSet<PathBuf> = dirty.into_iter().collect();
        while !round.is_empty() {
            let mut freed: Vec<(ScopeId, String)> = Vec::new();
            for path in &round {
                let Some(state) = index.files.get_mut(path) else {
                    continue;
                };
                let (scope, names) = binder::init_scope(&mut index.scopes, path, &mut state.record);
                state.scope = scope;
                freed.extend(names.into_iter().map(|n| (scope, n)));
            }

            let mut defined: Vec<(ScopeId, String)> = Vec::new();
            for path in &round {
                let Some(state) = index.files.get_mut(path) else {
                    continue;
                };
                binder::bind_definitions(
                    &mut index.scopes,
                    state.dialect.as_ref(),
                    &state.parsed,
                    path,
                    state.scope,
                    &mut state.record,
                );
                for id in state.record.symbols.values() {
                    if let Some(symbol) = index.scopes.symbol(*id) {
                        defined.push((state.scope, symbol.name.clone()));
                    }
                }
                debug!(file = %path.display(), defs = state.record.defs.len(), "bound definitions");
            }
            bound.extend(round.iter().cloned());

            let mut next: BTreeSet<PathBuf> = BTreeSet::new();
            for path in &round {
                next.extend(index.graph.dependents_of(path));
            }
            for (path, state) in &index.files {
                if bound.contains(path) {
                    continue;
                }
                let dropped_freed = freed
                    .iter()
                    .any(|(scope, name)| *scope == state.scope && state.record.dropped.contains(name));
                let may_resolve = defined.iter().any(|(scope, name)| {
                    *scope == state.scope
                        && (state.record.unresolved.contains(name)
                            || resolves_to_global(index, &state.record, name))
                });
                if dropped_freed || may_resolve {
                    next.insert(path.clone());
                }
            }
            next.retain(|p| !bound.contains(p) && index.files.contains_key(p));
            if !next.is_empty() {
                debug!(files = next.len(), "propagating to dependent files");
            }
            round = next;
        }

        for path in &bound {
            let Some(state) = index.files.get_mut(path) else {
                continue;
            };
            binder::bind_references(
                &index.scopes,
                state.dialect.as_ref(),
                &state.parsed,
                path,
                state.scope,
                &mut state.record,
                &mut index.graph,
            );
            binder::collect_errors(&state.parsed, &mut state.record);
        }

        for path in &bound {
            if let Some(doc) = store.find_document_mut(path) {
                doc.dirty = false;
            }
        }

        info!(files = bound.len(), "compile finished");
        Ok(bound.into_iter().collect())
    }
}

/// True if one of the record's references to `name` resolved to a built-in,
/// which a new same-named group definition would now shadow
fn resolves_to_global(index: &super::WorkspaceIndex, record: &BindingRecord, name: &str) -> bool {
    record.resolved.values().any(|id| {
        index
            .scopes
            .symbol(*id)
            .is_some_and(|s| s.scope == ScopeId::global() && s.name == name)
    })
}
