use crate::markup::{Document, Position};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// The source is not valid markup according to the reader's grammar.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", .orig.message)]
pub struct ParseError {
    #[source]
    pub orig: textdir_rst::SyntaxError,
    pub pos: Position,
}

impl From<textdir_rst::SyntaxError> for ParseError {
    fn from(orig: textdir_rst::SyntaxError) -> Self {
        let pos = orig.location.into();
        ParseError { orig, pos }
    }
}

/// The source parsed, but contains a construct that can't be converted.
///
/// The offending node is kept as JSON so it can be shown to the author.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}{}", node_dump(.node))]
pub struct AstError {
    pub message: String,
    pub node: Option<serde_json::Value>,
    pub pos: Option<Position>,
}

fn node_dump(node: &Option<serde_json::Value>) -> String {
    node.as_ref()
        .and_then(|n| serde_json::to_string_pretty(n).ok())
        .map(|dump| format!("\n{}", dump))
        .unwrap_or_default()
}

impl AstError {
    pub fn new<S, N>(message: S, node: &N, pos: Option<Position>) -> Self
    where
        S: Into<String>,
        N: Serialize + ?Sized,
    {
        AstError {
            message: message.into(),
            node: serde_json::to_value(node).ok(),
            pos,
        }
    }

    /// An error that is not about a particular node.
    pub fn message<S: Into<String>>(message: S) -> Self {
        AstError {
            message: message.into(),
            node: None,
            pos: None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarkupError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Ast(#[from] AstError),
}

impl MarkupError {
    pub fn pos(&self) -> Option<Position> {
        match self {
            MarkupError::Parse(e) => Some(e.pos),
            MarkupError::Ast(e) => e.pos,
        }
    }
}

pub type Result<T> = std::result::Result<T, MarkupError>;

/// A non-fatal problem found during conversion, such as a link whose target could
/// not be resolved.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<Position>,
}

impl Diagnostic {
    pub fn new<S: Into<String>>(message: S, pos: Option<Position>) -> Self {
        Diagnostic {
            message: message.into(),
            pos,
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.pos {
            Some(pos) => write!(f, "{} ({})", self.message, pos),
            None => write!(f, "{}", self.message),
        }
    }
}

/// A converted document together with the warnings produced on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub document: Document,
    pub warnings: Vec<Diagnostic>,
}
