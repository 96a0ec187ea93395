//! Applying whole-document rewrites produced by refactoring transforms

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, warn};

use super::Engine;
use crate::edit::{EditOperation, synthesize};
use crate::workspace::{DEFAULT_PROJECT, Document};
use crate::{Error, Result};

impl Engine {
    /// Write new texts into the store and re-bind.
    ///
    /// Returns the edits that turn each file's old text into its new one.
    /// Every touched file is armed so the editor's echo of the write is
    /// not treated as a fresh change.
    pub fn apply_refactor_result(
        &mut self,
        result: BTreeMap<PathBuf, String>,
    ) -> Result<BTreeMap<PathBuf, Vec<EditOperation>>> {
        if result.is_empty() {
            return Err(Error::NoChanges);
        }

        let mut edits = BTreeMap::new();
        for (path, new_text) in &result {
            let old_text = match self.store.find_document(path) {
                Some(doc) => doc.text.as_str(),
                None => {
                    if self.registry.find_dialect(path).is_none() {
                        return Err(Error::NoDialect(path.clone()));
                    }
                    ""
                }
            };
            let ops = synthesize(old_text, new_text);
            if !ops.is_empty() {
                edits.insert(path.clone(), ops);
            }
        }
        if edits.is_empty() {
            return Err(Error::NoChanges);
        }

        let mut previous = Vec::with_capacity(edits.len());
        for (path, new_text) in result {
            if !edits.contains_key(&path) {
                continue;
            }
            debug!(file = %path.display(), "applying refactor result");
            let doc = self.store.find_document(&path).cloned();
            previous.push((path.clone(), doc, self.suppression.state(&path)));
            self.suppression.arm(&path, &new_text);
            match self.store.find_document_mut(&path) {
                Some(doc) => doc.set_text(new_text),
                None => self.store.add_document(DEFAULT_PROJECT, Document::new(path, new_text)),
            }
        }

        if let Err(e) = self.compile() {
            warn!(error = %e, "re-bind after refactor failed; restoring documents");
            for (path, doc, state) in previous {
                self.suppression.restore(&path, state);
                match doc {
                    Some(doc) => {
                        if let Some(current) = self.store.find_document_mut(&path) {
                            *current = doc;
                        }
                    }
                    None => {
                        self.store.remove_document(&path);
                    }
                }
            }
            return Err(e);
        }
        Ok(edits)
    }
}
