//! Document store - file contents grouped into projects, keyed by absolute path
//!
//! The engine only reads documents and flips their dirty flag. Text is
//! written by the caller (editor notifications, file watcher) and by the
//! refactoring path after its edits have been synthesized.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Project new documents land in when the caller does not name one
pub const DEFAULT_PROJECT: &str = "Misc";

/// One file in the workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub text: String,
    /// Set when the text changed since the file was last bound
    pub dirty: bool,
}

impl Document {
    /// Create a new document; new documents start dirty
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self { path: path.into(), text: text.into(), dirty: true }
    }

    /// Content hash used to skip notifications that carry no change
    pub fn hash(&self) -> blake3::Hash {
        blake3::hash(self.text.as_bytes())
    }

    /// Replace the text and mark the document stale
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.dirty = true;
    }
}

/// The external key-value store the engine consumes
pub trait DocumentStore: Send {
    fn find_document(&self, path: &Path) -> Option<&Document>;

    fn find_document_mut(&mut self, path: &Path) -> Option<&mut Document>;

    /// Add a document, replacing any existing document with the same path
    fn add_document(&mut self, project: &str, document: Document);

    fn remove_document(&mut self, path: &Path) -> Option<Document>;

    /// All documents, sorted by path
    fn documents(&self) -> Vec<&Document>;
}

/// In-memory document store
#[derive(Debug, Default, Clone)]
pub struct Workspace {
    projects: BTreeMap<String, BTreeMap<PathBuf, Document>>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Project holding `path`, if any
    pub fn project_of(&self, path: &Path) -> Option<&str> {
        self.projects
            .iter()
            .find(|(_, docs)| docs.contains_key(path))
            .map(|(name, _)| name.as_str())
    }

    pub fn projects(&self) -> impl Iterator<Item = &str> {
        self.projects.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.projects.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentStore for Workspace {
    fn find_document(&self, path: &Path) -> Option<&Document> {
        self.projects.values().find_map(|docs| docs.get(path))
    }

    fn find_document_mut(&mut self, path: &Path) -> Option<&mut Document> {
        self.projects.values_mut().find_map(|docs| docs.get_mut(path))
    }

    fn add_document(&mut self, project: &str, document: Document) {
        self.remove_document(&document.path);
        self.projects
            .entry(project.to_string())
            .or_default()
            .insert(document.path.clone(), document);
    }

    fn remove_document(&mut self, path: &Path) -> Option<Document> {
        let removed = self.projects.values_mut().find_map(|docs| docs.remove(path));
        self.projects.retain(|_, docs| !docs.is_empty());
        removed
    }

    fn documents(&self) -> Vec<&Document> {
        let mut docs: Vec<&Document> = self.projects.values().flat_map(BTreeMap::values).collect();
        docs.sort_by(|a, b| a.path.cmp(&b.path));
        docs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_find_and_replace() {
        let mut ws = Workspace::new();
        ws.add_document(DEFAULT_PROJECT, Document::new("/g/a.g4", "a : 'x' ;"));
        ws.add_document("Other", Document::new("/g/b.g4", "b : 'y' ;"));

        assert_eq!(ws.len(), 2);
        assert_eq!(ws.project_of(Path::new("/g/b.g4")), Some("Other"));
        assert!(ws.find_document(Path::new("/g/a.g4")).unwrap().dirty);

        // Re-adding moves the document instead of duplicating it
        ws.add_document(DEFAULT_PROJECT, Document::new("/g/b.g4", "b : 'z' ;"));
        assert_eq!(ws.len(), 2);
        assert_eq!(ws.project_of(Path::new("/g/b.g4")), Some(DEFAULT_PROJECT));
        assert_eq!(ws.projects().collect::<Vec<_>>(), vec![DEFAULT_PROJECT]);
    }

    #[test]
    fn test_documents_sorted_by_path() {
        let mut ws = Workspace::new();
        ws.add_document("P", Document::new("/z.g4", ""));
        ws.add_document("A", Document::new("/a.g4", ""));
        let paths: Vec<_> = ws.documents().iter().map(|d| d.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("/a.g4"), PathBuf::from("/z.g4")]);
    }

    #[test]
    fn test_set_text_marks_dirty_and_changes_hash() {
        let mut doc = Document::new("/a.g4", "a : 'x' ;");
        doc.dirty = false;
        let before = doc.hash();
        doc.set_text("a : 'y' ;");
        assert!(doc.dirty);
        assert_ne!(before, doc.hash());
        assert!(Workspace::new().remove_document(Path::new("/a.g4")).is_none());
    }
}
