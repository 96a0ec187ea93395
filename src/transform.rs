//! Refactoring transforms
//!
//! A transform reads the bound workspace and proposes whole-file rewrites.
//! It never writes; the session feeds its result to
//! [`Engine::apply_refactor_result`], which diffs, stores and re-binds.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::adapter::antlr4::PARSER_RULE_SPEC;
use crate::adapter::lexer::RULE_REF;
use crate::engine::Engine;
use crate::syntax::{NodeId, ParseTree};
use crate::{Error, Result};

/// A refactoring over the document at `path`.
///
/// An empty map means there is nothing to change.
pub trait Transform: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, engine: &Engine, path: &Path, offset: usize) -> Result<BTreeMap<PathBuf, String>>;
}

/// Reorder the parser rules of an ANTLR4 grammar alphabetically.
///
/// Rules swap places slot by slot, so lexer rules, modes, comments and the
/// text between rules stay where they are.
#[derive(Debug, Default, Clone, Copy)]
pub struct SortParserRules;

impl SortParserRules {
    fn rule_name(tree: &ParseTree, rule: NodeId) -> String {
        tree.node(rule)
            .children
            .iter()
            .find(|c| tree.node(**c).token() == Some(RULE_REF))
            .and_then(|c| tree.node(*c).text())
            .unwrap_or_default()
            .to_string()
    }
}

impl Transform for SortParserRules {
    fn name(&self) -> &str {
        "sort-parser-rules"
    }

    fn apply(&self, engine: &Engine, path: &Path, _offset: usize) -> Result<BTreeMap<PathBuf, String>> {
        let state = engine
            .index()
            .file(path)
            .ok_or_else(|| Error::DocumentNotFound(path.to_path_buf()))?;
        if state.dialect.name() != "antlr4" {
            return Err(Error::Refactor(format!(
                "{} only applies to ANTLR4 grammars, not {}",
                self.name(),
                state.dialect.name()
            )));
        }
        let text = &engine
            .store()
            .find_document(path)
            .ok_or_else(|| Error::DocumentNotFound(path.to_path_buf()))?
            .text;

        let tree = &state.parsed.tree;
        let chars: Vec<char> = text.chars().collect();
        let slots: Vec<NodeId> = tree
            .node(tree.root())
            .children
            .iter()
            .copied()
            .filter(|c| tree.node(*c).rule() == Some(PARSER_RULE_SPEC))
            .collect();

        let mut rules: Vec<(String, String)> = slots
            .iter()
            .map(|slot| {
                let span = tree.node(*slot).span;
                let end = span.end.min(chars.len());
                let start = span.start.min(end);
                (Self::rule_name(tree, *slot), chars[start..end].iter().collect())
            })
            .collect();
        if rules.windows(2).all(|w| w[0].0 <= w[1].0) {
            return Ok(BTreeMap::new());
        }
        rules.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = String::with_capacity(text.len());
        let mut cursor = 0usize;
        for (slot, (_, body)) in slots.iter().zip(&rules) {
            let span = tree.node(*slot).span;
            let start = span.start.clamp(cursor, chars.len());
            out.extend(&chars[cursor..start]);
            out.push_str(body);
            cursor = span.end.clamp(start, chars.len());
        }
        out.extend(&chars[cursor..]);

        Ok(BTreeMap::from([(path.to_path_buf(), out)]))
    }
}
