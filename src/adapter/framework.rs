//! Core dialect framework
//!
//! Defines the capability set every grammar dialect implements and the
//! registry that selects a dialect once per file, by extension.

use std::path::Path;
use std::sync::Arc;

use crate::Result;
use crate::binder::BindingRecord;
use crate::config::FormatOptions;
use crate::symbol::Classification;
use crate::syntax::{NodeId, ParseBackend, ParseOutput, ParseTree, Span};

/// A pure classification predicate over a (possibly partially built) binding record
pub type Predicate = fn(&ParseTree, &BindingRecord, NodeId) -> bool;

/// Ordered predicate list; evaluated in order, first match wins
#[derive(Clone, Copy)]
pub struct RuleSet(pub &'static [(Classification, Predicate)]);

impl RuleSet {
    pub fn first_match(
        &self,
        tree: &ParseTree,
        bindings: &BindingRecord,
        node: NodeId,
    ) -> Option<Classification> {
        self.0
            .iter()
            .find(|(_, rule)| rule(tree, bindings, node))
            .map(|(classification, _)| *classification)
    }
}

/// Trait for grammar dialects
///
/// Each dialect is responsible for:
/// 1. Identifying files it handles
/// 2. Supplying the parse backend for its syntax
/// 3. Classifying terminal nodes as definitions, references or highlight tags
/// 4. Declaring built-in names and naming rules
pub trait Dialect: Send + Sync {
    /// Get the dialect name (for display)
    fn name(&self) -> &str;

    /// Get file extensions this dialect handles
    fn file_extensions(&self) -> &[&str];

    /// Check if this dialect can handle a file
    fn can_handle(&self, path: &Path) -> bool {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            self.file_extensions().contains(&ext)
        } else {
            false
        }
    }

    fn backend(&self) -> &dyn ParseBackend;

    fn definition_rules(&self) -> RuleSet;

    fn reference_rules(&self) -> RuleSet;

    /// Definition classification of a node, if any
    fn classify_definition(
        &self,
        tree: &ParseTree,
        bindings: &BindingRecord,
        node: NodeId,
    ) -> Option<Classification> {
        self.definition_rules().first_match(tree, bindings, node)
    }

    /// Reference classification of a node, if any
    fn classify_reference(
        &self,
        tree: &ParseTree,
        bindings: &BindingRecord,
        node: NodeId,
    ) -> Option<Classification> {
        self.reference_rules().first_match(tree, bindings, node)
    }

    /// Highlight-only classification (keywords, literals) for nodes that are
    /// neither definitions nor references
    fn classify_tag(&self, _tree: &ParseTree, _node: NodeId) -> Option<Classification> {
        None
    }

    /// Comment spans with their highlight classification
    fn extract_comments(&self, parsed: &ParseOutput) -> Vec<(Span, Classification)> {
        parsed
            .comments
            .iter()
            .map(|c| (c.span, Classification::Comment))
            .collect()
    }

    /// True if the definition at `node` only declares a name ahead of its real definition
    fn is_forward_declaration(&self, _tree: &ParseTree, _node: NodeId) -> bool {
        false
    }

    /// Names bound in the global scope for every file
    fn builtins(&self) -> &[(&'static str, Classification)] {
        &[]
    }

    fn keywords(&self) -> &[&str] {
        &[]
    }

    /// Reject names that cannot legally carry the given classification
    fn validate_name(&self, _classification: Classification, _name: &str) -> Result<()> {
        Ok(())
    }

    /// Characters that make up an identifier, for completion prefixes
    fn is_ident_char(&self, c: char) -> bool {
        c.is_alphanumeric() || c == '_'
    }

    fn format(&self, text: &str, options: &FormatOptions) -> String {
        basic_format(text, options)
    }
}

/// Whitespace-only formatting: expand tabs, trim line ends, final newline
pub fn basic_format(text: &str, options: &FormatOptions) -> String {
    let mut out = String::with_capacity(text.len());
    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            out.push('\n');
        }
        let mut expanded = String::with_capacity(line.len());
        let mut column = 0usize;
        for c in line.chars() {
            if c == '\t' && options.tab_size > 0 {
                let width = options.tab_size - column % options.tab_size;
                expanded.extend(std::iter::repeat_n(' ', width));
                column += width;
            } else {
                expanded.push(c);
                column += 1;
            }
        }
        if options.trim_trailing_whitespace {
            out.push_str(expanded.trim_end());
        } else {
            out.push_str(&expanded);
        }
    }
    if options.insert_final_newline && !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Registry of grammar dialects
#[derive(Default, Clone)]
pub struct DialectRegistry {
    dialects: Vec<Arc<dyn Dialect>>,
}

impl DialectRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dialect
    pub fn register(&mut self, dialect: impl Dialect + 'static) {
        self.dialects.push(Arc::new(dialect));
    }

    /// Find a dialect for a file
    pub fn find_dialect(&self, path: &Path) -> Option<Arc<dyn Dialect>> {
        self.dialects.iter().find(|d| d.can_handle(path)).cloned()
    }

    /// Get all registered dialects
    pub fn dialects(&self) -> &[Arc<dyn Dialect>] {
        &self.dialects
    }
}

/// Create a default registry with all built-in dialects
pub fn default_registry() -> DialectRegistry {
    let mut registry = DialectRegistry::new();
    registry.register(super::antlr4::Antlr4Dialect::new());
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::ParseTree;

    struct NullBackend;

    impl ParseBackend for NullBackend {
        fn parse(&self, _text: &str) -> ParseOutput {
            ParseOutput {
                tree: ParseTree::new("root"),
                tokens: Vec::new(),
                comments: Vec::new(),
                errors: Vec::new(),
            }
        }
    }

    struct TestDialect;

    fn always(_: &ParseTree, _: &BindingRecord, _: NodeId) -> bool {
        true
    }

    fn never(_: &ParseTree, _: &BindingRecord, _: NodeId) -> bool {
        false
    }

    impl Dialect for TestDialect {
        fn name(&self) -> &str { "test" }
        fn file_extensions(&self) -> &[&str] { &["test"] }
        fn backend(&self) -> &dyn ParseBackend { &NullBackend }
        fn definition_rules(&self) -> RuleSet {
            RuleSet(&[(Classification::Mode, never), (Classification::Terminal, always)])
        }
        fn reference_rules(&self) -> RuleSet {
            RuleSet(&[])
        }
    }

    #[test]
    fn test_registry() {
        let mut registry = DialectRegistry::new();
        registry.register(TestDialect);

        assert!(registry.find_dialect(Path::new("foo.test")).is_some());
        assert!(registry.find_dialect(Path::new("foo.other")).is_none());
        assert!(registry.find_dialect(Path::new("Makefile")).is_none());
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let tree = ParseTree::new("root");
        let bindings = BindingRecord::default();
        let dialect = TestDialect;
        assert_eq!(
            dialect.classify_definition(&tree, &bindings, tree.root()),
            Some(Classification::Terminal)
        );
        assert_eq!(dialect.classify_reference(&tree, &bindings, tree.root()), None);
    }

    #[test]
    fn test_basic_format() {
        let options = FormatOptions::default();
        assert_eq!(basic_format("a :\tb ;  \nc : d ;", &options), "a : b ;\nc : d ;\n");
        assert_eq!(basic_format("", &options), "");

        let keep = FormatOptions {
            trim_trailing_whitespace: false,
            insert_final_newline: false,
            ..FormatOptions::default()
        };
        assert_eq!(basic_format("x  ", &keep), "x  ");
    }
}
