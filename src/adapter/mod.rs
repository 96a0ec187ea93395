//! Grammar Dialect Framework
//!
//! Each dialect supplies a parse backend and ordered classification rules
//! that map parse-tree leaves to definitions, references and highlight tags.
//! The binder never sees dialect-specific logic.

pub mod framework;
pub mod lexer;
pub mod antlr4;

pub use framework::{Dialect, DialectRegistry, Predicate, RuleSet, basic_format, default_registry};
pub use antlr4::Antlr4Dialect;
