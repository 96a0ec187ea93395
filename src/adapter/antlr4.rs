//! ANTLR4 grammar dialect (`.g4`)
//!
//! A recovering recursive-descent parser over the token stream from
//! [`super::lexer`], plus the classification predicates for parser rules,
//! lexer rules, modes and channels.

use std::sync::OnceLock;

use regex::Regex;

use super::framework::{Dialect, Predicate, RuleSet};
use super::lexer::{self, *};
use crate::binder::BindingRecord;
use crate::symbol::Classification;
use crate::syntax::{NodeId, NodeKind, ParseBackend, ParseOutput, ParseTree, Span, Token};
use crate::{Error, Result};

pub const GRAMMAR_SPEC: &str = "grammarSpec";
pub const GRAMMAR_DECL: &str = "grammarDecl";
pub const OPTIONS_SPEC: &str = "optionsSpec";
pub const TOKENS_SPEC: &str = "tokensSpec";
pub const CHANNELS_SPEC: &str = "channelsSpec";
pub const DELEGATE_GRAMMARS: &str = "delegateGrammars";
pub const ACTION_SPEC: &str = "action";
pub const MODE_SPEC: &str = "modeSpec";
pub const PARSER_RULE_SPEC: &str = "parserRuleSpec";
pub const LEXER_RULE_SPEC: &str = "lexerRuleSpec";
pub const RULE_BLOCK: &str = "ruleBlock";
pub const BLOCK: &str = "block";
pub const LEXER_COMMANDS: &str = "lexerCommands";
pub const LEXER_COMMAND: &str = "lexerCommand";
pub const ELEMENT_OPTIONS: &str = "elementOptions";
pub const EXCEPTION_GROUP: &str = "exceptionGroup";

const BUILTINS: &[(&str, Classification)] = &[
    ("EOF", Classification::Terminal),
    ("HIDDEN", Classification::Channel),
    ("DEFAULT_TOKEN_CHANNEL", Classification::Channel),
    ("DEFAULT_MODE", Classification::Mode),
];

/// Parser backend for `.g4` files
#[derive(Debug, Default)]
pub struct Antlr4Parser;

impl ParseBackend for Antlr4Parser {
    fn parse(&self, text: &str) -> ParseOutput {
        let (tokens, comments) = Lexer::new(text).tokenize();
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            tree: ParseTree::new(GRAMMAR_SPEC),
            errors: Vec::new(),
            end: text.chars().count(),
        };
        parser.grammar_spec();
        let Parser { tree, errors, .. } = parser;
        ParseOutput { tree, tokens, comments, errors }
    }
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    tree: ParseTree,
    errors: Vec<NodeId>,
    end: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn at(&self, kind: &str) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    fn at_keyword(&self, word: &str) -> bool {
        self.peek().is_some_and(|t| t.kind == KEYWORD && t.text == word)
    }

    fn next_is(&self, kind: &str) -> bool {
        self.tokens.get(self.pos + 1).is_some_and(|t| t.kind == kind)
    }

    /// `name :` at the current position means a new rule has started
    fn starts_rule(&self) -> bool {
        self.peek().is_some_and(|t| t.kind == TOKEN_REF || t.kind == RULE_REF) && self.next_is(COLON)
    }

    fn here(&self) -> usize {
        self.peek().map_or(self.end, |t| t.span.start)
    }

    fn open(&mut self, parent: NodeId, rule: &'static str) -> NodeId {
        let start = self.here();
        self.tree.push(parent, NodeKind::Rule(rule), Span::new(start, start))
    }

    fn close(&mut self, id: NodeId) {
        let node = self.tree.node(id);
        let span = match (node.children.first(), node.children.last()) {
            (Some(first), Some(last)) => {
                Span::new(self.tree.node(*first).span.start, self.tree.node(*last).span.end)
            }
            _ => return,
        };
        self.tree.set_span(id, span);
    }

    /// Consume the current token as a leaf of `parent`
    fn bump(&mut self, parent: NodeId) {
        let Some(token) = self.peek() else {
            return;
        };
        self.pos += 1;
        if token.kind == ERROR {
            let id = self.tree.push(parent, NodeKind::Error { text: token.text.clone() }, token.span);
            self.errors.push(id);
        } else {
            self.tree.push(
                parent,
                NodeKind::Terminal { token: token.kind, text: token.text.clone() },
                token.span,
            );
        }
    }

    /// Consume a token that cannot appear here as an error leaf
    fn stray(&mut self, parent: NodeId) {
        let Some(token) = self.peek() else {
            return;
        };
        self.pos += 1;
        let id = self.tree.push(parent, NodeKind::Error { text: token.text.clone() }, token.span);
        self.errors.push(id);
    }

    /// Record an empty error node for an expected token that is absent
    fn missing(&mut self, parent: NodeId, what: &str) {
        let at = self.here();
        let id = self.tree.push(
            parent,
            NodeKind::Error { text: format!("missing {what}") },
            Span::new(at, at),
        );
        self.errors.push(id);
    }

    fn grammar_spec(&mut self) {
        let root = self.tree.root();
        while let Some(token) = self.peek() {
            match token.kind {
                KEYWORD => match token.text.as_str() {
                    "lexer" | "parser" | "grammar" => self.until_semi(root, GRAMMAR_DECL),
                    "import" => self.until_semi(root, DELEGATE_GRAMMARS),
                    "mode" => self.until_semi(root, MODE_SPEC),
                    "options" => self.braced(root, OPTIONS_SPEC),
                    "tokens" => self.braced(root, TOKENS_SPEC),
                    "channels" => self.braced(root, CHANNELS_SPEC),
                    "fragment" => self.rule_spec(root, LEXER_RULE_SPEC),
                    _ => self.stray(root),
                },
                TOKEN_REF => self.rule_spec(root, LEXER_RULE_SPEC),
                RULE_REF => self.rule_spec(root, PARSER_RULE_SPEC),
                AT => self.named_action(root),
                _ => self.stray(root),
            }
        }
        self.tree.set_span(root, Span::new(0, self.end));
    }

    fn until_semi(&mut self, parent: NodeId, rule: &'static str) {
        let node = self.open(parent, rule);
        self.bump(node);
        loop {
            if self.peek().is_none() || self.starts_rule() {
                self.missing(node, "';'");
                break;
            }
            if self.at(SEMI) {
                self.bump(node);
                break;
            }
            self.bump(node);
        }
        self.close(node);
    }

    fn braced(&mut self, parent: NodeId, rule: &'static str) {
        let node = self.open(parent, rule);
        self.bump(node);
        if self.at(LBRACE) {
            self.bump(node);
        } else {
            self.missing(node, "'{'");
        }
        loop {
            match self.peek() {
                None => {
                    self.missing(node, "'}'");
                    break;
                }
                Some(t) if t.kind == RBRACE => {
                    self.bump(node);
                    break;
                }
                Some(_) => self.bump(node),
            }
        }
        self.close(node);
    }

    /// `@name {...}` or `@scope::name {...}`
    fn named_action(&mut self, parent: NodeId) {
        let node = self.open(parent, ACTION_SPEC);
        self.bump(node);
        while self.peek().is_some_and(|t| matches!(t.kind, RULE_REF | TOKEN_REF | KEYWORD | COLON)) {
            self.bump(node);
        }
        if self.at(ACTION) {
            self.bump(node);
        } else {
            self.missing(node, "action block");
        }
        self.close(node);
    }

    fn rule_spec(&mut self, parent: NodeId, rule: &'static str) {
        let node = self.open(parent, rule);
        if self.at_keyword("fragment") {
            self.bump(node);
        }
        self.bump(node);

        // Rule prequel: arguments, returns, locals, options
        loop {
            if self.starts_rule() || self.at_keyword("fragment") || self.at_keyword("mode") {
                self.missing(node, "':'");
                self.close(node);
                return;
            }
            match self.peek() {
                Some(t) if t.kind == COLON => break,
                Some(t) if t.kind == KEYWORD && t.text == "options" => {
                    self.braced(node, OPTIONS_SPEC)
                }
                Some(t) if t.kind != SEMI => self.bump(node),
                _ => {
                    self.missing(node, "':'");
                    if self.at(SEMI) {
                        self.bump(node);
                    }
                    self.close(node);
                    return;
                }
            }
        }
        self.bump(node);

        let body = self.open(node, RULE_BLOCK);
        let terminated = self.alternatives(body, SEMI);
        self.close(body);
        if terminated {
            self.bump(node);
        } else {
            self.missing(node, "';'");
        }

        if self.at_keyword("catch") || self.at_keyword("finally") {
            let group = self.open(node, EXCEPTION_GROUP);
            while self.at_keyword("catch") || self.at_keyword("finally") {
                self.bump(group);
                if self.at(CHAR_SET) {
                    self.bump(group);
                }
                if self.at(ACTION) {
                    self.bump(group);
                }
            }
            self.close(group);
        }
        self.close(node);
    }

    /// Parse rule elements until `close`; returns false if the body ended early
    fn alternatives(&mut self, node: NodeId, close: &str) -> bool {
        while let Some(token) = self.peek() {
            match token.kind {
                k if k == close => return true,
                SEMI => return false,
                LPAREN => {
                    let block = self.open(node, BLOCK);
                    self.bump(block);
                    if self.alternatives(block, RPAREN) {
                        self.bump(block);
                    } else {
                        self.missing(block, "')'");
                    }
                    self.close(block);
                }
                RPAREN => self.stray(node),
                RARROW => self.lexer_commands(node),
                PUNCT if token.text == "<" => self.element_options(node),
                TOKEN_REF | RULE_REF if self.next_is(COLON) => return false,
                KEYWORD if token.text == "fragment" => return false,
                KEYWORD if token.text == "mode" && !self.next_is(LPAREN) => return false,
                _ => self.bump(node),
            }
        }
        false
    }

    fn element_options(&mut self, parent: NodeId) {
        let node = self.open(parent, ELEMENT_OPTIONS);
        self.bump(node);
        loop {
            match self.peek() {
                Some(t) if t.kind == PUNCT && t.text == ">" => {
                    self.bump(node);
                    break;
                }
                Some(t) if t.kind != SEMI => self.bump(node),
                _ => {
                    self.missing(node, "'>'");
                    break;
                }
            }
        }
        self.close(node);
    }

    /// `-> skip, channel(HIDDEN), pushMode(X)`
    fn lexer_commands(&mut self, parent: NodeId) {
        let node = self.open(parent, LEXER_COMMANDS);
        self.bump(node);
        while self.peek().is_some_and(|t| matches!(t.kind, RULE_REF | TOKEN_REF | KEYWORD)) {
            let command = self.open(node, LEXER_COMMAND);
            self.bump(command);
            if self.at(LPAREN) {
                self.bump(command);
                if self.peek().is_some_and(|t| matches!(t.kind, RULE_REF | TOKEN_REF | INT)) {
                    self.bump(command);
                }
                if self.at(RPAREN) {
                    self.bump(command);
                } else {
                    self.missing(command, "')'");
                }
            }
            self.close(command);
            if !self.at(COMMA) {
                break;
            }
            self.bump(node);
        }
        self.close(node);
    }
}

fn token_is(tree: &ParseTree, node: NodeId, kinds: &[&str]) -> bool {
    tree.node(node).token().is_some_and(|t| kinds.contains(&t))
}

fn text_is(tree: &ParseTree, node: Option<NodeId>, words: &[&str]) -> bool {
    node.and_then(|n| tree.node(n).text()).is_some_and(|t| words.contains(&t))
}

// Definition predicates

fn parser_rule_head(tree: &ParseTree, _: &BindingRecord, node: NodeId) -> bool {
    token_is(tree, node, &[RULE_REF])
        && tree.parent_rule(node) == Some(PARSER_RULE_SPEC)
        && tree.sibling(node, -1).is_none()
}

fn lexer_rule_head(tree: &ParseTree, _: &BindingRecord, node: NodeId) -> bool {
    token_is(tree, node, &[TOKEN_REF])
        && tree.parent_rule(node) == Some(LEXER_RULE_SPEC)
        && match tree.sibling(node, -1) {
            None => true,
            prev => text_is(tree, prev, &["fragment"]),
        }
}

fn token_declaration(tree: &ParseTree, _: &BindingRecord, node: NodeId) -> bool {
    token_is(tree, node, &[TOKEN_REF]) && tree.parent_rule(node) == Some(TOKENS_SPEC)
}

fn mode_declaration(tree: &ParseTree, _: &BindingRecord, node: NodeId) -> bool {
    token_is(tree, node, &[TOKEN_REF, RULE_REF])
        && tree.parent_rule(node) == Some(MODE_SPEC)
        && text_is(tree, tree.sibling(node, -1), &["mode"])
}

fn channel_declaration(tree: &ParseTree, _: &BindingRecord, node: NodeId) -> bool {
    token_is(tree, node, &[TOKEN_REF, RULE_REF]) && tree.parent_rule(node) == Some(CHANNELS_SPEC)
}

// Reference predicates

/// An identifier used as a rule element (not a label, option or command)
fn rule_element(tree: &ParseTree, bindings: &BindingRecord, node: NodeId) -> bool {
    if bindings.defs.contains_key(&node) || tree.ancestor(node, RULE_BLOCK).is_none() {
        return false;
    }
    if tree.ancestor(node, ELEMENT_OPTIONS).is_some() || tree.ancestor(node, LEXER_COMMAND).is_some() {
        return false;
    }
    let label = tree
        .sibling(node, 1)
        .is_some_and(|next| token_is(tree, next, &[ASSIGN, PLUS_ASSIGN]));
    !label
}

fn parser_rule_ref(tree: &ParseTree, bindings: &BindingRecord, node: NodeId) -> bool {
    token_is(tree, node, &[RULE_REF]) && rule_element(tree, bindings, node)
}

fn lexer_rule_ref(tree: &ParseTree, bindings: &BindingRecord, node: NodeId) -> bool {
    (token_is(tree, node, &[TOKEN_REF]) && rule_element(tree, bindings, node))
        || command_argument(tree, node, &["type"])
}

fn mode_ref(tree: &ParseTree, _: &BindingRecord, node: NodeId) -> bool {
    command_argument(tree, node, &["mode", "pushMode"])
}

fn channel_ref(tree: &ParseTree, _: &BindingRecord, node: NodeId) -> bool {
    command_argument(tree, node, &["channel"])
}

/// The `X` in `-> command(X)`
fn command_argument(tree: &ParseTree, node: NodeId, commands: &[&str]) -> bool {
    token_is(tree, node, &[TOKEN_REF, RULE_REF])
        && tree.parent_rule(node) == Some(LEXER_COMMAND)
        && tree.sibling(node, -1).is_some_and(|prev| token_is(tree, prev, &[LPAREN]))
        && text_is(tree, tree.sibling(node, -2), commands)
}

const DEFINITION_RULES: &[(Classification, Predicate)] = &[
    (Classification::Nonterminal, parser_rule_head),
    (Classification::Terminal, lexer_rule_head),
    (Classification::Terminal, token_declaration),
    (Classification::Mode, mode_declaration),
    (Classification::Channel, channel_declaration),
];

const REFERENCE_RULES: &[(Classification, Predicate)] = &[
    (Classification::Nonterminal, parser_rule_ref),
    (Classification::Terminal, lexer_rule_ref),
    (Classification::Mode, mode_ref),
    (Classification::Channel, channel_ref),
];

/// The ANTLR4 dialect
#[derive(Debug, Default)]
pub struct Antlr4Dialect {
    parser: Antlr4Parser,
}

impl Antlr4Dialect {
    pub fn new() -> Self {
        Self::default()
    }
}

fn name_pattern(classification: Classification) -> &'static Regex {
    static PARSER: OnceLock<Regex> = OnceLock::new();
    static LEXER: OnceLock<Regex> = OnceLock::new();
    static OTHER: OnceLock<Regex> = OnceLock::new();
    let (cell, pattern) = match classification {
        Classification::Nonterminal => (&PARSER, r"^[a-z][A-Za-z0-9_]*$"),
        Classification::Terminal => (&LEXER, r"^[A-Z][A-Za-z0-9_]*$"),
        _ => (&OTHER, r"^[A-Za-z][A-Za-z0-9_]*$"),
    };
    cell.get_or_init(|| Regex::new(pattern).expect("valid identifier pattern"))
}

impl Dialect for Antlr4Dialect {
    fn name(&self) -> &str {
        "antlr4"
    }

    fn file_extensions(&self) -> &[&str] {
        &["g4"]
    }

    fn backend(&self) -> &dyn ParseBackend {
        &self.parser
    }

    fn definition_rules(&self) -> RuleSet {
        RuleSet(DEFINITION_RULES)
    }

    fn reference_rules(&self) -> RuleSet {
        RuleSet(REFERENCE_RULES)
    }

    fn classify_tag(&self, tree: &ParseTree, node: NodeId) -> Option<Classification> {
        match tree.node(node).token()? {
            KEYWORD => Some(Classification::Keyword),
            STRING_LITERAL | CHAR_SET => Some(Classification::Literal),
            _ => None,
        }
    }

    fn is_forward_declaration(&self, tree: &ParseTree, node: NodeId) -> bool {
        tree.parent_rule(node) == Some(TOKENS_SPEC)
    }

    fn builtins(&self) -> &[(&'static str, Classification)] {
        BUILTINS
    }

    fn keywords(&self) -> &[&str] {
        KEYWORDS
    }

    fn validate_name(&self, classification: Classification, name: &str) -> Result<()> {
        if KEYWORDS.contains(&name) {
            return Err(Error::InvalidName {
                name: name.to_string(),
                reason: "reserved word".to_string(),
            });
        }
        if !name_pattern(classification).is_match(name) {
            let reason = match classification {
                Classification::Nonterminal => "parser rule names must start with a lower-case letter",
                Classification::Terminal => "lexer rule names must start with an upper-case letter",
                _ => "not a valid identifier",
            };
            return Err(Error::InvalidName { name: name.to_string(), reason: reason.to_string() });
        }
        Ok(())
    }

    fn is_ident_char(&self, c: char) -> bool {
        lexer::is_ident_char(c)
    }
}
