//! Query surface over the bound workspace
//!
//! All offsets are 0-based character offsets into the current text of a file.
//! Queries read the index as of the last `compile()`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{Engine, FileState, Location, QuickInfo};
use crate::edit::{EditOperation, synthesize};
use crate::scope::NameResolver;
use crate::symbol::{Classification, DocumentSymbol, SymbolId};
use crate::syntax::{NodeId, NodeKind, Span};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub start: usize,
    pub end: usize,
    pub message: String,
}

/// A highlighted range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedSpan {
    pub start: usize,
    pub end: usize,
    pub classification: Classification,
}

impl Engine {
    fn bound_file(&self, path: &Path) -> Result<&FileState> {
        self.index.file(path).ok_or_else(|| Error::DocumentNotFound(path.to_path_buf()))
    }

    /// The definition or reference node under `offset`.
    ///
    /// A node containing the offset wins over one ending exactly at it, so a
    /// cursor right after a name still finds it.
    fn node_at(state: &FileState, offset: usize) -> Option<NodeId> {
        let tree = &state.parsed.tree;
        let mut touching = None;
        for node in state.record.defs.keys().chain(state.record.refs.keys()) {
            let span = tree.node(*node).span;
            if span.start <= offset && offset < span.end {
                return Some(*node);
            }
            if span.end == offset && touching.is_none() {
                touching = Some(*node);
            }
        }
        touching
    }

    /// Final symbol the node under `offset` stands for
    fn target_at(&self, state: &FileState, offset: usize) -> Option<(NodeId, SymbolId)> {
        let node = Self::node_at(state, offset)?;
        let symbol = state.record.symbol_at(node)?;
        Some((node, NameResolver::new(&self.index.scopes).target(symbol)))
    }

    /// Definition site of the symbol under `offset`.
    ///
    /// Built-ins and unresolved references have none.
    pub fn find_definitions(&self, path: &Path, offset: usize) -> Result<Vec<Location>> {
        let state = self.bound_file(path)?;
        let Some((_, target)) = self.target_at(state, offset) else {
            return Ok(Vec::new());
        };
        let site = self.index.scopes.symbol(target).and_then(|s| s.definition.as_ref());
        Ok(site
            .map(|d| Location { file: d.file.clone(), start: d.span.start, end: d.span.end })
            .into_iter()
            .collect())
    }

    /// Every definition and reference of the symbol under `offset`, across the workspace
    pub fn find_references_and_definitions(&self, path: &Path, offset: usize) -> Result<Vec<Location>> {
        let state = self.bound_file(path)?;
        let Some((_, target)) = self.target_at(state, offset) else {
            return Ok(Vec::new());
        };
        Ok(self.occurrences(target))
    }

    fn occurrences(&self, target: SymbolId) -> Vec<Location> {
        let resolver = NameResolver::new(&self.index.scopes);
        let mut locations = Vec::new();
        for (file, state) in &self.index.files {
            let record = &state.record;
            for node in record.defs.keys().chain(record.refs.keys()) {
                let Some(symbol) = record.symbol_at(*node) else {
                    continue;
                };
                if resolver.target(symbol) == target {
                    let span = state.parsed.tree.node(*node).span;
                    locations.push(Location { file: file.clone(), start: span.start, end: span.end });
                }
            }
        }
        locations.sort();
        locations.dedup();
        locations
    }

    /// Occurrences of the symbol under `offset` within the same file
    pub fn highlights(&self, path: &Path, offset: usize) -> Result<Vec<Location>> {
        let mut locations = self.find_references_and_definitions(path, offset)?;
        locations.retain(|l| l.file == path);
        Ok(locations)
    }

    pub fn get_quick_info(&self, path: &Path, offset: usize) -> Result<Option<QuickInfo>> {
        let state = self.bound_file(path)?;
        let Some(node) = Self::node_at(state, offset) else {
            return Ok(None);
        };
        let span = state.parsed.tree.node(node).span;
        let display_text = match state.record.symbol_at(node) {
            Some(symbol) => {
                let target = NameResolver::new(&self.index.scopes).target(symbol);
                match self.index.scopes.symbol(target) {
                    Some(s) => s.short_description(),
                    None => return Ok(None),
                }
            }
            None => {
                let Some(classification) = state.record.classification(node) else {
                    return Ok(None);
                };
                let name = state.parsed.tree.node(node).text().unwrap_or_default();
                format!("{} {}\nunresolved", classification.label(), name)
            }
        };
        Ok(Some(QuickInfo { display_text, start: span.start, end: span.end }))
    }

    /// Names visible at `offset` that extend the identifier before the cursor
    pub fn completion(&self, path: &Path, offset: usize) -> Result<Vec<String>> {
        let state = self.bound_file(path)?;
        let doc = self
            .store
            .find_document(path)
            .ok_or_else(|| Error::DocumentNotFound(path.to_path_buf()))?;

        let before: Vec<char> = doc.text.chars().take(offset).collect();
        let prefix_len = before
            .iter()
            .rev()
            .take_while(|c| state.dialect.is_ident_char(**c))
            .count();
        let prefix: String = before[before.len() - prefix_len..].iter().collect();

        let mut names: Vec<String> = self
            .index
            .scopes
            .visible_symbols(state.scope)
            .into_iter()
            .map(|(name, _)| name)
            .chain(state.dialect.keywords().iter().copied())
            .filter(|name| name.starts_with(prefix.as_str()))
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Edits renaming the symbol under `offset` everywhere it is used
    pub fn rename(
        &self,
        path: &Path,
        offset: usize,
        new_name: &str,
    ) -> Result<BTreeMap<PathBuf, Vec<EditOperation>>> {
        let state = self.bound_file(path)?;
        let Some((_, target)) = self.target_at(state, offset) else {
            return Ok(BTreeMap::new());
        };
        let Some(symbol) = self.index.scopes.symbol(target) else {
            return Ok(BTreeMap::new());
        };
        if symbol.is_builtin() {
            return Err(Error::NotRenamable(symbol.name.clone()));
        }
        state.dialect.validate_name(symbol.classification, new_name)?;

        let mut edits: BTreeMap<PathBuf, Vec<EditOperation>> = BTreeMap::new();
        for location in self.occurrences(target) {
            edits
                .entry(location.file)
                .or_default()
                .extend(EditOperation::substitute(location.start, location.end - location.start, new_name));
        }
        Ok(edits)
    }

    /// Edits that bring the document to the dialect's canonical formatting.
    ///
    /// Nothing is applied; the caller owns the edits.
    pub fn reformat(&self, path: &Path) -> Result<Vec<EditOperation>> {
        let doc = self
            .store
            .find_document(path)
            .ok_or_else(|| Error::DocumentNotFound(path.to_path_buf()))?;
        let dialect = self
            .registry
            .find_dialect(path)
            .ok_or_else(|| Error::NoDialect(path.to_path_buf()))?;
        let formatted = dialect.format(&doc.text, &self.config.format);
        Ok(synthesize(&doc.text, &formatted))
    }

    /// Parse errors and unresolved references, in source order
    pub fn diagnostics(&self, path: &Path) -> Result<Vec<Diagnostic>> {
        let state = self.bound_file(path)?;
        let tree = &state.parsed.tree;
        let mut diagnostics = Vec::new();

        for node in &state.record.errors {
            let leaf = tree.node(*node);
            let NodeKind::Error { text } = &leaf.kind else {
                continue;
            };
            let message = if leaf.span.is_empty() {
                text.clone()
            } else {
                format!("syntax error at '{text}'")
            };
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                start: leaf.span.start,
                end: leaf.span.end,
                message,
            });
        }

        for (node, classification) in &state.record.refs {
            if state.record.resolved.contains_key(node) {
                continue;
            }
            let leaf = tree.node(*node);
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                start: leaf.span.start,
                end: leaf.span.end,
                message: format!(
                    "undefined {} '{}'",
                    classification.label(),
                    leaf.text().unwrap_or_default()
                ),
            });
        }

        diagnostics.sort_by_key(|d| (d.start, d.severity));
        Ok(diagnostics)
    }

    /// Outline of the file's definitions
    pub fn document_symbols(&self, path: &Path) -> Result<Vec<DocumentSymbol>> {
        let state = self.bound_file(path)?;
        let tree = &state.parsed.tree;
        let mut symbols: Vec<DocumentSymbol> = state
            .record
            .defs
            .iter()
            .filter(|(_, c)| c.is_symbolic())
            .map(|(node, classification)| {
                let leaf = tree.node(*node);
                DocumentSymbol {
                    name: leaf.text().unwrap_or_default().to_string(),
                    classification: *classification,
                    start: leaf.span.start,
                    end: leaf.span.end,
                }
            })
            .collect();
        symbols.sort_by_key(|s| s.start);
        Ok(symbols)
    }

    /// Highlight classes for every tagged token and comment overlapping `start..end`
    pub fn classify_range(&self, path: &Path, start: usize, end: usize) -> Result<Vec<ClassifiedSpan>> {
        let state = self.bound_file(path)?;
        let tree = &state.parsed.tree;
        let tagged = state
            .record
            .tags
            .iter()
            .map(|(node, c)| (tree.node(*node).span, *c));
        let comments = state.record.comments.iter().copied();

        let mut spans: Vec<ClassifiedSpan> = tagged
            .chain(comments)
            .filter(|(span, _)| span.overlaps(start, end))
            .map(|(span, classification)| ClassifiedSpan {
                start: span.start,
                end: span.end,
                classification,
            })
            .collect();
        spans.sort_by_key(|s| (s.start, s.end));
        Ok(spans)
    }

    /// Start of the nearest definition after (or before) `offset`
    pub fn next_definition(&self, path: &Path, offset: usize, forward: bool) -> Result<Option<usize>> {
        let state = self.bound_file(path)?;
        let starts = state
            .record
            .defs
            .keys()
            .map(|node| state.parsed.tree.node(*node).span)
            .map(|span: Span| span.start);
        Ok(if forward {
            starts.filter(|s| *s > offset).min()
        } else {
            starts.filter(|s| *s < offset).max()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::engine_with;
    use super::*;
    use crate::edit::EditKind;
    use pretty_assertions::assert_eq;

    fn loc(file: &str, start: usize, end: usize) -> Location {
        Location { file: PathBuf::from(file), start, end }
    }

    fn g(name: &str) -> PathBuf {
        PathBuf::from(format!("/g/{name}"))
    }

    #[test]
    fn test_definition_in_sibling_file() {
        let mut engine = engine_with(&[("/g/g1.g4", "a : b c ;"), ("/g/g2.g4", "b : 'x' ;")]);
        engine.compile().unwrap();

        let defs = engine.find_definitions(&g("g1.g4"), 4).unwrap();
        assert_eq!(defs, vec![loc("/g/g2.g4", 0, 1)]);
        // Cursor right after the name
        assert_eq!(engine.find_definitions(&g("g1.g4"), 5).unwrap(), defs);
        // Unresolved reference
        assert!(engine.find_definitions(&g("g1.g4"), 6).unwrap().is_empty());
    }

    #[test]
    fn test_references_include_definition() {
        let mut engine = engine_with(&[
            ("/g/g1.g4", "a : b c ;\nc : b ;"),
            ("/g/g2.g4", "b : 'x' ;"),
            ("/h/g3.g4", "d : b ;"),
        ]);
        engine.compile().unwrap();

        let refs = engine.find_references_and_definitions(&g("g2.g4"), 0).unwrap();
        assert_eq!(refs, vec![loc("/g/g1.g4", 4, 5), loc("/g/g1.g4", 14, 15), loc("/g/g2.g4", 0, 1)]);

        let local = engine.highlights(&g("g1.g4"), 4).unwrap();
        assert_eq!(local, vec![loc("/g/g1.g4", 4, 5), loc("/g/g1.g4", 14, 15)]);
    }

    #[test]
    fn test_rename_edits_every_file() {
        let mut engine = engine_with(&[("/g/g1.g4", "a : b c ;"), ("/g/g2.g4", "b : 'x' ;")]);
        engine.compile().unwrap();

        let edits = engine.rename(&g("g1.g4"), 4, "bb").unwrap();
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[&g("g1.g4")], EditOperation::substitute(4, 1, "bb").to_vec());
        assert_eq!(
            edits[&g("g2.g4")],
            vec![EditOperation::delete(0, 1), EditOperation::insert(1, "bb")]
        );
        assert!(edits.values().flatten().all(|op| op.kind != EditKind::Equal));
    }

    #[test]
    fn test_rename_rejections() {
        let mut engine = engine_with(&[("/g/a.g4", "a : b EOF ;\nb : 'x' ;")]);
        engine.compile().unwrap();

        let err = engine.rename(&g("a.g4"), 4, "Bad").unwrap_err();
        assert!(matches!(err, Error::InvalidName { .. }));
        let err = engine.rename(&g("a.g4"), 7, "END").unwrap_err();
        assert!(matches!(err, Error::NotRenamable(name) if name == "EOF"));
        assert!(engine.rename(&g("a.g4"), 2, "x").unwrap().is_empty());
    }

    #[test]
    fn test_forward_declaration_lands_on_lexer_rule() {
        let mut engine = engine_with(&[
            ("/g/a.g4", "tokens { ID }\nr : ID ;"),
            ("/g/b.g4", "ID : [a-z]+ ;"),
        ]);
        engine.compile().unwrap();

        assert_eq!(engine.find_definitions(&g("a.g4"), 18).unwrap(), vec![loc("/g/b.g4", 0, 2)]);
        let edits = engine.rename(&g("b.g4"), 0, "NAME").unwrap();
        // A delete and an insert per occurrence
        assert_eq!(edits[&g("a.g4")].len(), 4);
        assert_eq!(edits[&g("b.g4")].len(), 2);
    }

    #[test]
    fn test_quick_info() {
        let mut engine = engine_with(&[("/g/Expr.g4", "expr : ID EOF missing ;\nID : [a-z]+ ;")]);
        engine.compile().unwrap();
        let path = g("Expr.g4");

        let info = engine.get_quick_info(&path, 7).unwrap().unwrap();
        assert_eq!(info.display_text, "lexer rule ID\ndefined in Expr.g4");
        assert_eq!((info.start, info.end), (7, 9));

        let builtin = engine.get_quick_info(&path, 10).unwrap().unwrap();
        assert_eq!(builtin.display_text, "lexer rule EOF\nbuilt-in");

        let unresolved = engine.get_quick_info(&path, 14).unwrap().unwrap();
        assert_eq!(unresolved.display_text, "parser rule missing\nunresolved");

        assert!(engine.get_quick_info(&path, 5).unwrap().is_none());
    }

    #[test]
    fn test_completion_filters_by_prefix() {
        let mut engine = engine_with(&[("/g/a.g4", "expr : ex ;\nexpo : 'x' ;"), ("/g/b.g4", "extra : 'y' ;")]);
        engine.compile().unwrap();

        let names = engine.completion(&g("a.g4"), 9).unwrap();
        assert_eq!(names, vec!["expo", "expr", "extra"]);

        let all = engine.completion(&g("a.g4"), 7).unwrap();
        assert!(all.contains(&"EOF".to_string()));
        assert!(all.contains(&"fragment".to_string()));
    }

    #[test]
    fn test_diagnostics() {
        let mut engine = engine_with(&[("/g/a.g4", "a : b\nc : d $ ;")]);
        engine.compile().unwrap();

        let diagnostics = engine.diagnostics(&g("a.g4")).unwrap();
        let messages: Vec<_> = diagnostics.iter().map(|d| (d.severity, d.message.as_str())).collect();
        assert_eq!(
            messages,
            vec![
                (Severity::Warning, "undefined parser rule 'b'"),
                (Severity::Error, "missing ';'"),
                (Severity::Warning, "undefined parser rule 'd'"),
                (Severity::Error, "syntax error at '$'"),
            ]
        );
    }

    #[test]
    fn test_half_typed_rule_reports_error_and_keeps_definitions() {
        let mut engine = engine_with(&[("/g/a.g4", "r : B ;\nx\nB : 'b' ;")]);
        engine.compile().unwrap();

        let diagnostics = engine.diagnostics(&g("a.g4")).unwrap();
        let messages: Vec<_> = diagnostics
            .iter()
            .map(|d| (d.severity, d.start, d.message.as_str()))
            .collect();
        assert_eq!(messages, vec![(Severity::Error, 10, "missing ':'")]);
        assert_eq!(
            engine.find_definitions(&g("a.g4"), 4).unwrap(),
            vec![loc("/g/a.g4", 10, 11)]
        );
    }

    #[test]
    fn test_document_symbols_and_navigation() {
        let mut engine = engine_with(&[("/g/a.g4", "a : B ;\nB : 'b' ;\nmode M;\nC : 'c' ;")]);
        engine.compile().unwrap();
        let path = g("a.g4");

        let outline: Vec<_> = engine
            .document_symbols(&path)
            .unwrap()
            .into_iter()
            .map(|s| (s.name, s.classification, s.start))
            .collect();
        assert_eq!(
            outline,
            vec![
                ("a".to_string(), Classification::Nonterminal, 0),
                ("B".to_string(), Classification::Terminal, 8),
                ("M".to_string(), Classification::Mode, 23),
                ("C".to_string(), Classification::Terminal, 26),
            ]
        );

        assert_eq!(engine.next_definition(&path, 0, true).unwrap(), Some(8));
        assert_eq!(engine.next_definition(&path, 8, false).unwrap(), Some(0));
        assert_eq!(engine.next_definition(&path, 26, true).unwrap(), None);
    }

    #[test]
    fn test_classify_range() {
        let mut engine = engine_with(&[("/g/a.g4", "// rules\na : B 'x' ;")]);
        engine.compile().unwrap();

        let spans = engine.classify_range(&g("a.g4"), 0, 100).unwrap();
        let kinds: Vec<_> = spans.iter().map(|s| s.classification).collect();
        assert_eq!(
            kinds,
            vec![
                Classification::Comment,
                Classification::Nonterminal,
                Classification::Terminal,
                Classification::Literal,
            ]
        );

        let tail = engine.classify_range(&g("a.g4"), 13, 14).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].classification, Classification::Terminal);
    }

    #[test]
    fn test_reformat_produces_edits() {
        let mut engine = engine_with(&[("/g/a.g4", "a :\tb ;  \n")]);
        engine.compile().unwrap();

        let edits = engine.reformat(&g("a.g4")).unwrap();
        let text = &engine.store().find_document(&g("a.g4")).unwrap().text;
        assert_eq!(crate::edit::apply_edits(text, &edits), "a : b ;\n");
        assert!(engine.suppression().armed() == 0);
    }

    #[test]
    fn test_unknown_file() {
        let engine = engine_with(&[]);
        assert!(matches!(
            engine.find_definitions(Path::new("/nowhere.g4"), 0),
            Err(Error::DocumentNotFound(_))
        ));
    }
}
