//! Scope Store - directory-scoped name binding
//!
//! All files in one directory share a scope whose parent is the single
//! global scope. Definitions in one file are therefore visible to
//! references in every other file of the same directory.

pub mod graph;
pub mod resolver;

pub use graph::{Duplicate, ScopeId, ScopeStore};
pub use resolver::NameResolver;
