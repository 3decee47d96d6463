use serde::{Deserialize, Serialize};

/// Location of the first character of a node in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Byte offset into the source.
    pub offset: usize,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column, counted in characters.
    pub column: usize,
}

impl Position {
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Position {
            offset,
            line,
            column,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    #[default]
    Document,
    Section,
    Transition,
    Comment,
    Title,
    Paragraph,
    BlockQuote,
    LiteralBlock,
    Directive,
    BulletList,
    EnumeratedList,
    ListItem,
    DefinitionList,
    DefinitionListItem,
    Term,
    Definition,
    // inline
    Text,
    Literal,
    Emphasis,
    Strong,
    InterpretedText,
    Reference,
    FootnoteReference,
}

impl NodeType {
    pub fn name(&self) -> &'static str {
        match self {
            NodeType::Document => "document",
            NodeType::Section => "section",
            NodeType::Transition => "transition",
            NodeType::Comment => "comment",
            NodeType::Title => "title",
            NodeType::Paragraph => "paragraph",
            NodeType::BlockQuote => "block_quote",
            NodeType::LiteralBlock => "literal_block",
            NodeType::Directive => "directive",
            NodeType::BulletList => "bullet_list",
            NodeType::EnumeratedList => "enumerated_list",
            NodeType::ListItem => "list_item",
            NodeType::DefinitionList => "definition_list",
            NodeType::DefinitionListItem => "definition_list_item",
            NodeType::Term => "term",
            NodeType::Definition => "definition",
            NodeType::Text => "text",
            NodeType::Literal => "literal",
            NodeType::Emphasis => "emphasis",
            NodeType::Strong => "strong",
            NodeType::InterpretedText => "interpreted_text",
            NodeType::Reference => "reference",
            NodeType::FootnoteReference => "footnote_reference",
        }
    }
}

/// A node of the parsed document. Which of the optional fields are set depends on the
/// node type: `value` for text, `role` for interpreted text, `directive` for directives,
/// `bullet` for bullet lists, `enumtype` and `start` for enumerated lists and `depth` for
/// sections.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bullet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enumtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
    pub position: Position,
}

impl Node {
    pub fn new(node_type: NodeType, position: Position) -> Self {
        Node {
            node_type,
            position,
            ..Default::default()
        }
    }

    pub fn with_children(node_type: NodeType, position: Position, children: Vec<Node>) -> Self {
        Node {
            node_type,
            position,
            children,
            ..Default::default()
        }
    }

    pub fn text<S: Into<String>>(value: S, position: Position) -> Self {
        Node {
            node_type: NodeType::Text,
            value: Some(value.into()),
            position,
            ..Default::default()
        }
    }

    /// The concatenated text of this node and all its descendants.
    pub fn inner_text(&self) -> String {
        match &self.value {
            Some(value) => value.clone(),
            None => self.children.iter().map(Node::inner_text).collect(),
        }
    }

    /// The value of a text node, or `None` for any other node.
    pub fn text_value(&self) -> Option<&str> {
        match self.node_type {
            NodeType::Text => self.value.as_deref(),
            _ => None,
        }
    }
}
