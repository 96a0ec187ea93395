//! # Grammarlens - incremental semantic analysis for grammar files
//!
//! Keeps a live model of a multi-file grammar workspace so that editor
//! features can be answered right after every keystroke.
//!
//! Grammarlens provides:
//! - A scope/symbol store with directory-scoped visibility
//! - Pluggable grammar dialects that classify definitions and references
//! - A four-pass binder with cross-file dependency tracking
//! - A change coordinator that re-binds exactly the stale files
//! - An edit synthesizer that turns whole-document rewrites into minimal edits

pub mod syntax;
pub mod symbol;
pub mod scope;
pub mod adapter;
pub mod binder;
pub mod graph;
pub mod workspace;
pub mod engine;
pub mod edit;
pub mod transform;
pub mod session;
pub mod watcher;
pub mod config;
pub mod ignore;
pub mod ui;

use std::path::PathBuf;

// Re-exports for convenient access
pub use symbol::{Classification, DocumentSymbol, Symbol, SymbolId};
pub use scope::{ScopeId, ScopeStore};
pub use adapter::{Dialect, DialectRegistry};
pub use engine::{ClassifiedSpan, Diagnostic, Engine, Location, QuickInfo, Severity};
pub use edit::{EditKind, EditOperation};
pub use workspace::{Document, DocumentStore, Workspace};
pub use session::Session;
pub use transform::{SortParserRules, Transform};

/// Result type alias for Grammarlens operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Grammarlens operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No grammar dialect registered for {0}")]
    NoDialect(PathBuf),

    #[error("Document not found: {0}")]
    DocumentNotFound(PathBuf),

    #[error("No changes were needed, none made.")]
    NoChanges,

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Built-in symbol '{0}' cannot be renamed")]
    NotRenamable(String),

    #[error("Refactoring failed: {0}")]
    Refactor(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
