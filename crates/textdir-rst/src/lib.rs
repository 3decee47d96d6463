//! A reader for the subset of reStructuredText used in prose documents.
//!
//! [`parse`] turns source text into a tree of [`Node`]s: sections nested by title
//! level, the usual body elements and inline markup. Directives and comments are kept
//! as raw text for the caller to interpret.

mod block;
pub mod error;
mod inline;
pub mod node;

pub use block::parse;
pub use error::SyntaxError;
pub use node::{Node, NodeType, Position};
