use crate::node::Position;
use thiserror::Error;

/// The source text is not valid reStructuredText as far as this reader is concerned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (line {}, column {})", .location.line, .location.column)]
pub struct SyntaxError {
    pub message: String,
    pub location: Position,
}

impl SyntaxError {
    pub fn new<S: Into<String>>(message: S, location: Position) -> Self {
        SyntaxError {
            message: message.into(),
            location,
        }
    }
}
