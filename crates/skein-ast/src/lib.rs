//! Syntax tree for the skein scripting language.
//!
//! Parsing happens elsewhere; this crate only defines the tree the
//! interpreter walks, in a form that can be built in code or loaded from JSON.

pub mod ast;
pub mod ast_dump;

pub use ast::*;
