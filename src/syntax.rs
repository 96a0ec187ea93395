//! Parse-tree model shared by every grammar dialect
//!
//! A parse backend turns source text into:
//! - an arena-allocated parse tree addressed by [`NodeId`]
//! - the token stream
//! - a comment table
//! - the set of error nodes
//!
//! All spans are character offsets into the text that was parsed.

/// Handle to a node inside a [`ParseTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// A half-open character span `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True if `offset` is inside the span or directly after it
    pub fn touches(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }

    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && start < self.end
    }
}

/// What a node is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Interior node produced by a grammar rule (e.g. `parserRuleSpec`)
    Rule(&'static str),
    /// Leaf node wrapping one token
    Terminal { token: &'static str, text: String },
    /// Leaf covering input the parser could not match
    Error { text: String },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, NodeKind::Terminal { .. })
    }

    pub fn rule(&self) -> Option<&'static str> {
        match self.kind {
            NodeKind::Rule(name) => Some(name),
            _ => None,
        }
    }

    pub fn token(&self) -> Option<&'static str> {
        match self.kind {
            NodeKind::Terminal { token, .. } => Some(token),
            _ => None,
        }
    }

    /// Source text of a leaf; interior nodes have none
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Terminal { text, .. } | NodeKind::Error { text } => Some(text),
            NodeKind::Rule(_) => None,
        }
    }
}

/// Arena-allocated parse tree
#[derive(Debug, Clone)]
pub struct ParseTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl ParseTree {
    /// Create a tree holding only a root rule node
    pub fn new(root_rule: &'static str) -> Self {
        let root = Node {
            kind: NodeKind::Rule(root_rule),
            span: Span::default(),
            parent: None,
            children: Vec::new(),
        };
        Self { nodes: vec![root], root: NodeId(0) }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Append a child under `parent` and return its handle
    pub fn push(&mut self, parent: NodeId, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, span, parent: Some(parent), children: Vec::new() });
        self.nodes[parent.0 as usize].children.push(id);
        id
    }

    pub fn set_span(&mut self, id: NodeId, span: Span) {
        self.nodes[id.0 as usize].span = span;
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn parent_rule(&self, id: NodeId) -> Option<&'static str> {
        self.parent(id).and_then(|p| self.node(p).rule())
    }

    /// Nearest ancestor (excluding `id`) produced by the given rule
    pub fn ancestor(&self, id: NodeId, rule: &str) -> Option<NodeId> {
        let mut current = self.parent(id);
        while let Some(p) = current {
            if self.node(p).rule() == Some(rule) {
                return Some(p);
            }
            current = self.parent(p);
        }
        None
    }

    /// The sibling directly before / after `id` under the same parent
    pub fn sibling(&self, id: NodeId, delta: isize) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = &self.node(parent).children;
        let index = siblings.iter().position(|c| *c == id)? as isize + delta;
        if index < 0 {
            return None;
        }
        siblings.get(index as usize).copied()
    }

    /// All node ids in depth-first pre-order
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            for child in self.node(id).children.iter().rev() {
                stack.push(*child);
            }
        }
        order
    }

    /// Terminal leaves in source order
    pub fn terminals(&self) -> Vec<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|id| self.node(*id).is_terminal())
            .collect()
    }
}

/// One lexed token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: &'static str,
    pub text: String,
    pub span: Span,
}

/// A comment, kept out of the parse tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    pub span: Span,
}

/// Everything a parse backend produces for one text
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub tree: ParseTree,
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
    pub errors: Vec<NodeId>,
}

/// A concrete parser/lexer for one grammar dialect
pub trait ParseBackend: Send + Sync {
    fn parse(&self, text: &str) -> ParseOutput;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> (ParseTree, NodeId, NodeId, NodeId) {
        let mut tree = ParseTree::new("grammarSpec");
        let rule = tree.push(tree.root(), NodeKind::Rule("parserRuleSpec"), Span::new(0, 9));
        let head = tree.push(
            rule,
            NodeKind::Terminal { token: "RULE_REF", text: "a".into() },
            Span::new(0, 1),
        );
        let colon = tree.push(
            rule,
            NodeKind::Terminal { token: "COLON", text: ":".into() },
            Span::new(1, 2),
        );
        (tree, rule, head, colon)
    }

    #[test]
    fn test_preorder_and_terminals() {
        let (tree, rule, head, colon) = sample_tree();
        assert_eq!(tree.preorder(), vec![tree.root(), rule, head, colon]);
        assert_eq!(tree.terminals(), vec![head, colon]);
    }

    #[test]
    fn test_navigation() {
        let (tree, rule, head, colon) = sample_tree();
        assert_eq!(tree.parent_rule(head), Some("parserRuleSpec"));
        assert_eq!(tree.ancestor(colon, "grammarSpec"), Some(tree.root()));
        assert_eq!(tree.ancestor(colon, "modeSpec"), None);
        assert_eq!(tree.sibling(head, 1), Some(colon));
        assert_eq!(tree.sibling(head, -1), None);
        assert_eq!(tree.node(rule).text(), None);
        assert_eq!(tree.node(head).text(), Some("a"));
    }

    #[test]
    fn test_span_touches() {
        let span = Span::new(3, 5);
        assert!(span.touches(3));
        assert!(span.touches(5));
        assert!(!span.touches(6));
        assert!(span.overlaps(4, 10));
        assert!(!span.overlaps(5, 10));
    }
}
