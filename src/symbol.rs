//! Symbol types - named, classified entities bound in exactly one scope
//!
//! Every grammar dialect maps its tokens into these classifications:
//! - `Nonterminal`: parser rule
//! - `Terminal`: lexer rule / token
//! - `Mode`: lexer mode
//! - `Channel`: token channel
//! - `Comment`, `Keyword`, `Literal`: tag-only kinds used for highlighting

use crate::Error;
use crate::scope::ScopeId;
use crate::syntax::{NodeId, Span};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Classification of a definition, reference or highlight tag.
///
/// The discriminants are stable; editor clients use them as classifier indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Nonterminal = 0,
    Terminal = 1,
    Comment = 2,
    Keyword = 3,
    Literal = 4,
    Mode = 5,
    Channel = 6,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Nonterminal => "nonterminal",
            Classification::Terminal => "terminal",
            Classification::Comment => "comment",
            Classification::Keyword => "keyword",
            Classification::Literal => "literal",
            Classification::Mode => "mode",
            Classification::Channel => "channel",
        }
    }

    pub fn all() -> &'static [Classification] {
        &[
            Classification::Nonterminal,
            Classification::Terminal,
            Classification::Comment,
            Classification::Keyword,
            Classification::Literal,
            Classification::Mode,
            Classification::Channel,
        ]
    }

    /// Classifications that name bindable symbols (as opposed to highlight-only tags)
    pub fn is_symbolic(&self) -> bool {
        matches!(
            self,
            Classification::Nonterminal
                | Classification::Terminal
                | Classification::Mode
                | Classification::Channel
        )
    }

    /// Human-readable label used in hovers and diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Nonterminal => "parser rule",
            Classification::Terminal => "lexer rule",
            Classification::Comment => "comment",
            Classification::Keyword => "keyword",
            Classification::Literal => "literal",
            Classification::Mode => "mode",
            Classification::Channel => "channel",
        }
    }
}

impl FromStr for Classification {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nonterminal" | "parser" | "rule" => Ok(Classification::Nonterminal),
            "terminal" | "lexer" | "token" => Ok(Classification::Terminal),
            "comment" => Ok(Classification::Comment),
            "keyword" => Ok(Classification::Keyword),
            "literal" | "string" => Ok(Classification::Literal),
            "mode" => Ok(Classification::Mode),
            "channel" => Ok(Classification::Channel),
            _ => Err(Error::InvalidName {
                name: s.to_string(),
                reason: "unknown classification".to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Handle to a symbol in the [`ScopeStore`](crate::scope::ScopeStore) arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

/// Where a symbol was defined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionSite {
    pub file: PathBuf,
    pub node: NodeId,
    pub span: Span,
}

/// A symbol bound in one scope.
///
/// Built-in symbols have no definition site.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub classification: Classification,
    pub definition: Option<DefinitionSite>,
    pub scope: ScopeId,
    /// `None` means the symbol resolves to itself
    pub resolution_target: Option<SymbolId>,
    /// Declared ahead of its real definition (e.g. ANTLR4 `tokens { X }`)
    pub forward_declaration: bool,
}

impl Symbol {
    pub fn new(
        name: impl Into<String>,
        classification: Classification,
        scope: ScopeId,
        definition: Option<DefinitionSite>,
    ) -> Self {
        Self {
            name: name.into(),
            classification,
            definition,
            scope,
            resolution_target: None,
            forward_declaration: false,
        }
    }

    pub fn with_forward_declaration(mut self, forward: bool) -> Self {
        self.forward_declaration = forward;
        self
    }

    pub fn file(&self) -> Option<&PathBuf> {
        self.definition.as_ref().map(|d| &d.file)
    }

    pub fn is_builtin(&self) -> bool {
        self.definition.is_none()
    }

    /// Get a short description for display
    pub fn short_description(&self) -> String {
        let origin = match self.file().and_then(|f| f.file_name()) {
            Some(name) => format!("defined in {}", name.to_string_lossy()),
            None => "built-in".to_string(),
        };
        format!("{} {}\n{}", self.classification.label(), self.name, origin)
    }
}

/// One entry of a file outline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSymbol {
    pub name: String,
    pub classification: Classification,
    pub start: usize,
    pub end: usize,
}
