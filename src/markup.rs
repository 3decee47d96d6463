//! The document tree both converters produce.
//!
//! A [Document] is a title, an ordered list of [Node]s and string metadata. Nodes are
//! either plain text or an [Element], whose [Kind] says what it is and carries the
//! kind-specific attributes. Serialized, an element is a flat object:
//! `{"type": "Title", "level": 1, "children": ["Intro"], "pos": {"line": 1, "column": 1}}`.

use linked_hash_map::LinkedHashMap;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Source location of a node, 1-based.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Position { line, column }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

impl From<textdir_rst::Position> for Position {
    fn from(value: textdir_rst::Position) -> Self {
        Position::new(value.line, value.column)
    }
}

/// Bullet style, named after CSS `list-style-type`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Bullet {
    Disc,
    Circle,
    Square,
    /// Custom bullet text, see [Kind::BulletList].
    Text,
}

/// Numbering style, named after CSS `list-style-type`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Enumeration {
    Decimal,
    DecimalLeadingZero,
    LowerRoman,
    UpperRoman,
    LowerGreek,
    LowerAlpha,
    LowerLatin,
    UpperAlpha,
    UpperLatin,
    ArabicIndic,
    Armenian,
    Bengali,
    CjkEarthlyBranch,
    CjkHeavenlyStem,
    Devanagari,
    EthiopicNumeric,
    Georgian,
    Gujarati,
    Gurmukhi,
    Kannada,
    Khmer,
    Lao,
    Malayalam,
    Oriya,
    Telugu,
    Thai,
}

/// Link target. A link either still points at a symbolic name or at a resolved
/// URL or in-document anchor, never both.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Reference {
    Name { name: String },
    Href { href: String },
}

impl Reference {
    pub fn name<S: Into<String>>(name: S) -> Self {
        Reference::Name { name: name.into() }
    }

    pub fn href<S: Into<String>>(href: S) -> Self {
        Reference::Href { href: href.into() }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum Kind {
    // block
    Paragraph,
    Section,
    Title {
        level: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        anchor: Option<String>,
    },
    BulletList {
        bullet: Bullet,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    EnumList {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        enumeration: Option<Enumeration>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<u32>,
    },
    ListItem,
    DefList,
    DefItem,
    DefTerm,
    Def,
    BlockQuote {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variant: Option<String>,
    },
    CodeBlock {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    Table {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Row,
    Cell,
    FieldList,
    Field {
        name: String,
    },
    // inline
    LineBreak,
    Emph,
    Strong,
    Superscript,
    Link {
        #[serde(rename = "ref")]
        reference: Reference,
    },
    Code,
    InlineMath {
        math: String,
    },
    // custom
    Plotly {
        url: String,
        #[serde(
            rename = "onClickLink",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        on_click_link: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        style: Option<LinkedHashMap<String, String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        config: Option<serde_json::Map<String, serde_json::Value>>,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Element {
    #[serde(flatten)]
    pub kind: Kind,
    #[serde(default)]
    pub children: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Position>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Node {
    Text(String),
    Element(Element),
}

impl Element {
    /// Creates an element from its kind and anything that can be flattened into a
    /// list of children.
    pub fn new<C: IntoNodes>(kind: Kind, children: C) -> Self {
        Element {
            kind,
            children: children.into_nodes(),
            pos: None,
        }
    }

    pub fn at<P: Into<Option<Position>>>(mut self, pos: P) -> Self {
        self.pos = pos.into();
        self
    }

    pub fn inner_text(&self) -> String {
        self.children.iter().map(Node::inner_text).collect()
    }
}

impl Node {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Node::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(t) => Some(t),
            Node::Element(_) => None,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        }
    }

    pub fn inner_text(&self) -> String {
        match self {
            Node::Text(t) => t.clone(),
            Node::Element(e) => e.inner_text(),
        }
    }
}

impl From<Element> for Node {
    fn from(value: Element) -> Self {
        Node::Element(value)
    }
}

/// Values that can be used as element children: single nodes, text, optional values
/// and (nested) vectors of those. Flattening keeps the order and drops `None`.
pub trait IntoNodes {
    fn push_into(self, nodes: &mut Vec<Node>);

    fn into_nodes(self) -> Vec<Node>
    where
        Self: Sized,
    {
        let mut nodes = Vec::new();
        self.push_into(&mut nodes);
        nodes
    }
}

impl IntoNodes for Node {
    fn push_into(self, nodes: &mut Vec<Node>) {
        nodes.push(self)
    }
}

impl IntoNodes for Element {
    fn push_into(self, nodes: &mut Vec<Node>) {
        nodes.push(Node::Element(self))
    }
}

impl IntoNodes for String {
    fn push_into(self, nodes: &mut Vec<Node>) {
        nodes.push(Node::Text(self))
    }
}

impl IntoNodes for &str {
    fn push_into(self, nodes: &mut Vec<Node>) {
        nodes.push(Node::Text(self.to_string()))
    }
}

impl IntoNodes for () {
    fn push_into(self, _nodes: &mut Vec<Node>) {}
}

impl<T: IntoNodes> IntoNodes for Option<T> {
    fn push_into(self, nodes: &mut Vec<Node>) {
        if let Some(inner) = self {
            inner.push_into(nodes)
        }
    }
}

impl<T: IntoNodes> IntoNodes for Vec<T> {
    fn push_into(self, nodes: &mut Vec<Node>) {
        for item in self {
            item.push_into(nodes)
        }
    }
}

impl<A: IntoNodes, B: IntoNodes> IntoNodes for (A, B) {
    fn push_into(self, nodes: &mut Vec<Node>) {
        self.0.push_into(nodes);
        self.1.push_into(nodes);
    }
}

/// A converted document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    pub title: String,
    pub children: Vec<Node>,
    #[serde(default)]
    pub metadata: LinkedHashMap<String, String>,
}

impl Document {
    /// Whether the metadata marks this document as a draft.
    pub fn is_draft(&self) -> bool {
        self.metadata
            .get("draft")
            .map_or(false, |v| matches!(v.trim(), "true" | "yes" | "1"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn children_are_flattened_in_order() {
        let elem = Element::new(
            Kind::Paragraph,
            vec![
                vec![Node::text("a"), Node::text("b")],
                vec![],
                vec![Element::new(Kind::Emph, "c").into()],
            ],
        );
        assert_eq!(elem.children.len(), 3);
        assert_eq!(elem.inner_text(), "abc");

        let elem = Element::new(Kind::Strong, (None::<String>, Some("x")));
        assert_eq!(elem.children, vec![Node::text("x")]);

        let elem = Element::new(Kind::LineBreak, ());
        assert!(elem.children.is_empty());
    }

    #[test]
    fn element_json_shape() {
        let title = Element::new(
            Kind::Title {
                level: 2,
                anchor: Some("intro".into()),
            },
            "Intro",
        )
        .at(Position::new(3, 1));
        assert_eq!(
            serde_json::to_value(&title).unwrap(),
            json!({
                "type": "Title",
                "level": 2,
                "anchor": "intro",
                "children": ["Intro"],
                "pos": {"line": 3, "column": 1}
            })
        );
    }

    #[test]
    fn link_reference_shape() {
        let named = Element::new(
            Kind::Link {
                reference: Reference::name("foo"),
            },
            "foo",
        );
        let resolved = Element::new(
            Kind::Link {
                reference: Reference::href("https://example.com"),
            },
            (),
        );
        assert_eq!(
            serde_json::to_value(&named).unwrap(),
            json!({"type": "Link", "ref": {"name": "foo"}, "children": ["foo"]})
        );
        assert_eq!(
            serde_json::to_value(&resolved).unwrap(),
            json!({"type": "Link", "ref": {"href": "https://example.com"}, "children": []})
        );
    }

    #[test]
    fn list_styles_use_css_names() {
        let list = Element::new(
            Kind::EnumList {
                enumeration: Some(Enumeration::LowerRoman),
                start: None,
            },
            (),
        );
        assert_eq!(
            serde_json::to_value(&list).unwrap(),
            json!({"type": "EnumList", "enumeration": "lower-roman", "children": []})
        );

        let list = Element::new(
            Kind::BulletList {
                bullet: Bullet::Text,
                text: Some("-".into()),
            },
            (),
        );
        assert_eq!(
            serde_json::to_value(&list).unwrap(),
            json!({"type": "BulletList", "bullet": "text", "text": "-", "children": []})
        );
    }

    #[test]
    fn draft_flag() {
        let mut doc = Document {
            title: "T".into(),
            children: vec![],
            metadata: LinkedHashMap::new(),
        };
        assert!(!doc.is_draft());
        doc.metadata.insert("draft".into(), "true".into());
        assert!(doc.is_draft());
    }
}
