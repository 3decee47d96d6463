//! Converts Markdown and reStructuredText sources into one [document tree](markup).
//!
//! ```
//! let doc = textdir::rst::convert("Title\n=====\n\nBody text.\n").unwrap();
//! assert_eq!(doc.title, "Title");
//! ```

pub mod config;
pub mod error;
pub mod markup;
pub mod md;
pub mod renderdoc;
pub mod rst;

pub use error::{AstError, Conversion, Diagnostic, MarkupError, ParseError, Result};
pub use markup::Document;
