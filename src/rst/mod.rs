//! reStructuredText conversion.
//!
//! The source is read into an [textdir_rst::Node] tree, which is then converted in four
//! steps: the tree is mapped onto the document model, named targets (titles, hyperlink
//! targets, footnotes) are collected from it and resolved, and finally the links of the
//! converted tree are pointed at their resolved targets. The leading field list, if any,
//! becomes the document metadata.

mod directive;
mod targets;

use crate::config::RstOptions;
use crate::error::{AstError, Conversion, Diagnostic, ParseError, Result};
use crate::markup::{
    Bullet, Document, Element, Enumeration, Kind, Node, Position, Reference,
};
use lazy_static::lazy_static;
use linked_hash_map::LinkedHashMap;
use regex::Regex;
use textdir_rst::NodeType;

lazy_static! {
    static ref FIELD: Regex =
        Regex::new(r"^:((?:\\:|[^:])+):\s+(.*)").expect("invalid regex expression");
    static ref PEP_NUMBER: Regex = Regex::new(r"^[0-9]+$").expect("invalid regex expression");
}

fn pos(node: &textdir_rst::Node) -> Option<Position> {
    Some(node.position.into())
}

pub(crate) struct Converter<'a> {
    options: &'a RstOptions,
}

impl<'a> Converter<'a> {
    pub(crate) fn new(options: &'a RstOptions) -> Self {
        Converter { options }
    }

    fn children(&self, node: &textdir_rst::Node, level: usize) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        for child in &node.children {
            nodes.extend(self.node(child, level)?);
        }
        Ok(nodes)
    }

    /// Converts a node; `level` is the number of enclosing sections.
    pub(crate) fn node(&self, node: &textdir_rst::Node, level: usize) -> Result<Vec<Node>> {
        let elem = |kind: Kind, children: Vec<Node>| -> Result<Vec<Node>> {
            Ok(vec![Element::new(kind, children).at(pos(node)).into()])
        };

        match node.node_type {
            NodeType::Document => self.children(node, level),
            NodeType::Comment => {
                let comment = node.inner_text();
                match targets::footnote(&comment) {
                    Some((label, text)) => {
                        let item = Element::new(Kind::ListItem, text).at(pos(node));
                        let kind = Kind::EnumList {
                            enumeration: None,
                            start: label.parse().ok(),
                        };
                        elem(kind, vec![item.into()])
                    }
                    None => Ok(vec![]),
                }
            }
            NodeType::Reference => {
                let text = node.inner_text();
                let kind = Kind::Link {
                    reference: Reference::name(text.clone()),
                };
                elem(kind, vec![Node::Text(text)])
            }
            NodeType::FootnoteReference => {
                let text = node.inner_text();
                let label = Element::new(Kind::Superscript, text.clone()).at(pos(node));
                let kind = Kind::Link {
                    reference: Reference::name(format!("footnote-{}", text)),
                };
                elem(kind, vec![label.into()])
            }
            NodeType::Section => elem(Kind::Section, self.children(node, level + 1)?),
            NodeType::Title => {
                if level < 1 {
                    return Err(AstError::new(
                        format!("Header with level {} < 1", level),
                        node,
                        pos(node),
                    )
                    .into());
                }
                let (_, anchor) = targets::anchor(&node.inner_text());
                let kind = Kind::Title {
                    level: level.min(6) as u8,
                    anchor: Some(anchor),
                };
                elem(kind, self.children(node, level)?)
            }
            NodeType::Paragraph => elem(Kind::Paragraph, self.children(node, level)?),
            NodeType::BlockQuote => elem(
                Kind::BlockQuote { variant: None },
                self.children(node, level)?,
            ),
            NodeType::Text => {
                let value = node.value.clone().unwrap_or_default();
                match FIELD.captures(&value) {
                    // TODO: merge runs of field lines into a single list
                    Some(caps) => {
                        let field = Element::new(
                            Kind::Field {
                                name: caps[1].to_string(),
                            },
                            caps[2].trim(),
                        )
                        .at(pos(node));
                        elem(Kind::FieldList, vec![field.into()])
                    }
                    None => Ok(vec![Node::Text(value)]),
                }
            }
            NodeType::Literal => elem(Kind::Code, self.children(node, level)?),
            NodeType::Emphasis => elem(Kind::Emph, self.children(node, level)?),
            NodeType::Strong => elem(Kind::Strong, self.children(node, level)?),
            NodeType::BulletList => {
                let kind = Kind::BulletList {
                    bullet: Bullet::Text,
                    text: node.bullet.clone(),
                };
                elem(kind, self.children(node, level)?)
            }
            NodeType::EnumeratedList => {
                let kind = Kind::EnumList {
                    enumeration: node.enumtype.as_deref().and_then(enumeration),
                    start: node.start,
                };
                elem(kind, self.children(node, level)?)
            }
            NodeType::ListItem => elem(Kind::ListItem, self.children(node, level)?),
            NodeType::DefinitionList => elem(Kind::DefList, self.children(node, level)?),
            NodeType::DefinitionListItem => elem(Kind::DefItem, self.children(node, level)?),
            NodeType::Term => elem(Kind::DefTerm, self.children(node, level)?),
            NodeType::Definition => elem(Kind::Def, self.children(node, level)?),
            NodeType::InterpretedText => self.interpreted(node, level),
            NodeType::LiteralBlock => {
                let code = node
                    .children
                    .iter()
                    .map(textdir_rst::Node::inner_text)
                    .collect::<Vec<_>>()
                    .join("\n");
                elem(Kind::CodeBlock { language: None }, vec![Node::Text(code)])
            }
            NodeType::Directive => self.directive(node, level),
            NodeType::Transition => Err(AstError::new(
                format!("Unknown node type “{}”", node.node_type.name()),
                node,
                pos(node),
            )
            .into()),
        }
    }

    fn interpreted(&self, node: &textdir_rst::Node, level: usize) -> Result<Vec<Node>> {
        let kind = match node.role.as_deref() {
            Some("math") => {
                let math = Element::new(
                    Kind::InlineMath {
                        math: node.inner_text(),
                    },
                    (),
                );
                return Ok(vec![math.at(pos(node)).into()]);
            }
            Some("pep") => {
                let number = node.inner_text();
                if !PEP_NUMBER.is_match(&number) {
                    return Err(AstError::new(
                        format!("Invalid PEP number “{}”", number),
                        node,
                        pos(node),
                    )
                    .into());
                }
                let href = format!("{}pep-{:0>4}/", self.options.pep_base_url, number);
                let link = Element::new(
                    Kind::Link {
                        reference: Reference::href(href),
                    },
                    format!("PEP {}", number),
                );
                return Ok(vec![link.at(pos(node)).into()]);
            }
            None | Some("emphasis") | Some("title-reference") => Kind::Emph,
            Some("strong") => Kind::Strong,
            Some("literal") | Some("code") => Kind::Code,
            Some("sup") | Some("superscript") => Kind::Superscript,
            Some(role) => {
                return Err(
                    AstError::new(format!("Unknown role “{}”", role), node, pos(node)).into(),
                )
            }
        };
        let elem = Element::new(kind, self.children(node, level)?).at(pos(node));
        Ok(vec![elem.into()])
    }
}

fn enumeration(enumtype: &str) -> Option<Enumeration> {
    match enumtype {
        "arabic" => Some(Enumeration::Decimal),
        "loweralpha" => Some(Enumeration::LowerAlpha),
        "upperalpha" => Some(Enumeration::UpperAlpha),
        "lowerroman" => Some(Enumeration::LowerRoman),
        "upperroman" => Some(Enumeration::UpperRoman),
        _ => None,
    }
}

pub(crate) fn parse(src: &str) -> Result<textdir_rst::Node> {
    Ok(textdir_rst::parse(src).map_err(ParseError::from)?)
}

/// Collects the leading field lists of `elem` as metadata.
fn metadata(elem: &Element) -> LinkedHashMap<String, String> {
    let lists: Vec<&Element> = match elem.kind {
        Kind::FieldList => vec![elem],
        _ => elem
            .children
            .iter()
            .filter_map(Node::as_element)
            .filter(|e| e.kind == Kind::FieldList)
            .collect(),
    };
    lists
        .into_iter()
        .flat_map(|list| list.children.iter().filter_map(Node::as_element))
        .filter_map(|field| match &field.kind {
            Kind::Field { name } => Some((
                name.clone(),
                field
                    .children
                    .first()
                    .map(Node::inner_text)
                    .unwrap_or_default(),
            )),
            _ => None,
        })
        .collect()
}

fn title(body: &[Node]) -> std::result::Result<String, AstError> {
    let section = match body.first() {
        None => return Err(AstError::message("Empty body")),
        Some(Node::Text(text)) => {
            return Err(AstError::new(
                format!("Body starts with string: {}", text),
                text,
                None,
            ))
        }
        Some(Node::Element(section)) => section,
    };
    if section.kind != Kind::Section {
        return Err(AstError::new("No section!", section, section.pos));
    }
    let title = match section.children.first() {
        None => return Err(AstError::new("Empty Section", section, section.pos)),
        Some(Node::Text(text)) => {
            return Err(AstError::new(
                format!("Section starts with string: {}", text),
                section,
                section.pos,
            ))
        }
        Some(Node::Element(title)) => title,
    };
    if !matches!(title.kind, Kind::Title { .. }) {
        return Err(AstError::new("No title!", title, title.pos.or(section.pos)));
    }
    match title.children.first() {
        Some(Node::Text(text)) => Ok(text.trim().to_string()),
        _ => Err(AstError::new("Empty title!", title, title.pos)),
    }
}

/// Converts an already parsed tree.
pub fn convert_tree(tree: &textdir_rst::Node, options: &RstOptions) -> Result<Conversion> {
    let mut warnings: Vec<Diagnostic> = Vec::new();

    let (resolved, unresolved) = targets::resolve(targets::extract(tree));
    if !unresolved.is_empty() {
        let names = unresolved
            .iter()
            .map(|(name, target)| format!("{} → {}", name, target))
            .collect::<Vec<_>>()
            .join(", ");
        warnings.push(Diagnostic::new(
            format!("Could not resolve references: {}", names),
            None,
        ));
    }

    let mut children = Converter::new(options).node(tree, 0)?;
    targets::apply(&mut children, &resolved, &mut warnings);

    let metadata = match children.first() {
        Some(Node::Element(first)) if first.kind != Kind::Section => {
            let meta = metadata(first);
            children.remove(0);
            meta
        }
        _ => LinkedHashMap::new(),
    };

    let title = title(&children)?;

    Ok(Conversion {
        document: Document {
            title,
            children,
            metadata,
        },
        warnings,
    })
}

pub fn convert_with(src: &str, options: &RstOptions) -> Result<Conversion> {
    convert_tree(&parse(src)?, options)
}

/// Converts reStructuredText with the default options.
///
/// Warnings about unresolved targets are dropped and the affected links keep their
/// names. Use [`convert_with`] to get them.
pub fn convert(src: &str) -> Result<Document> {
    Ok(convert_with(src, &RstOptions::default())?.document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MarkupError;

    fn ast_message<T: std::fmt::Debug>(res: Result<T>) -> String {
        match res {
            Err(MarkupError::Ast(e)) => e.message,
            other => panic!("expected an AST error, got {:?}", other),
        }
    }

    fn section_body(doc: &Document) -> &[Node] {
        &doc.children[0].as_element().unwrap().children
    }

    #[test]
    fn title_from_first_section() {
        let doc = convert("Title\n=====\n\nBody text.\n").unwrap();
        assert_eq!(doc.title, "Title");
        assert!(doc.metadata.is_empty());

        let section = doc.children[0].as_element().unwrap();
        assert_eq!(section.kind, Kind::Section);
        assert_eq!(
            section.children[0].as_element().unwrap().kind,
            Kind::Title {
                level: 1,
                anchor: Some("title".into())
            }
        );
        assert_eq!(section.children[1].inner_text(), "Body text.");
    }

    #[test]
    fn title_levels_are_clamped() {
        let adornments = ["=", "-", "~", "^", "\"", "+", "#", "*"];
        let src: String = adornments
            .iter()
            .enumerate()
            .map(|(i, a)| format!("Level {}\n{}\n\n", i + 1, a.repeat(7)))
            .collect();
        let doc = convert(&src).unwrap();

        let mut levels = Vec::new();
        let mut section = doc.children[0].as_element();
        while let Some(s) = section {
            if let Kind::Title { level, .. } = s.children[0].as_element().unwrap().kind {
                levels.push(level);
            }
            section = s.children.get(1).and_then(Node::as_element);
        }
        assert_eq!(levels, vec![1, 2, 3, 4, 5, 6, 6, 6]);
    }

    #[test]
    fn title_outside_section() {
        let tree = textdir_rst::Node::with_children(
            NodeType::Document,
            Default::default(),
            vec![textdir_rst::Node::with_children(
                NodeType::Title,
                Default::default(),
                vec![textdir_rst::Node::text("Loose", Default::default())],
            )],
        );
        assert_eq!(
            ast_message(convert_tree(&tree, &RstOptions::default())),
            "Header with level 0 < 1"
        );
    }

    #[test]
    fn unknown_directive_is_fatal() {
        let res = convert("Title\n=====\n\n.. foo:: bar\n");
        assert_eq!(ast_message(res), "Unknown directive “foo”");
    }

    #[test]
    fn unknown_role_is_fatal() {
        let res = convert("Title\n=====\n\n:kbd:`Ctrl`\n");
        assert_eq!(ast_message(res), "Unknown role “kbd”");
    }

    #[test]
    fn transitions_are_unsupported() {
        let res = convert("Title\n=====\n\nFirst.\n\n----------\n\nSecond.\n");
        assert_eq!(ast_message(res), "Unknown node type “transition”");
    }

    #[test]
    fn syntax_errors_carry_position() {
        match convert("Title\n=====\n\nSome `broken\n") {
            Err(MarkupError::Parse(e)) => {
                assert_eq!(e.pos, Position::new(4, 6));
                assert_eq!(e.to_string(), "Unterminated inline markup");
            }
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    #[test]
    fn convert_keeps_unresolved_links() {
        let src = "Title\n=====\n\nSee foo_.\n\n.. _foo: bar\n";
        let doc = convert(src).unwrap();
        let para = section_body(&doc)[1].as_element().unwrap();
        assert_eq!(
            para.children[1].as_element().unwrap().kind,
            Kind::Link {
                reference: Reference::name("foo")
            }
        );
        assert_eq!(convert_with(src, &RstOptions::default()).unwrap().warnings.len(), 2);
    }

    #[test]
    fn stray_backquotes_are_text() {
        let doc = convert("Title\n=====\n\nPress the ` key, don`t panic.\n").unwrap();
        let para = section_body(&doc)[1].as_element().unwrap();
        assert_eq!(para.kind, Kind::Paragraph);
        assert_eq!(para.children, vec![Node::text("Press the ` key, don`t panic.")]);
    }

    #[test]
    fn field_list_metadata() {
        let doc = convert(":draft: true\n:tags: notes\n\nTitle\n=====\n\nBody.\n").unwrap();
        assert_eq!(doc.metadata.get("draft").map(String::as_str), Some("true"));
        assert_eq!(doc.metadata.get("tags").map(String::as_str), Some("notes"));
        assert_eq!(doc.children.len(), 1);
        assert_eq!(doc.title, "Title");
    }

    #[test]
    fn field_lines_inside_body_stay_separate_lists() {
        let doc = convert("Title\n=====\n\n:a: 1\n:b: 2\n").unwrap();
        let para = section_body(&doc)[1].as_element().unwrap();
        assert_eq!(para.kind, Kind::Paragraph);
        assert_eq!(para.children.len(), 2);
        for child in &para.children {
            assert_eq!(child.as_element().unwrap().kind, Kind::FieldList);
        }
    }

    #[test]
    fn title_errors() {
        assert_eq!(ast_message(convert("")), "Empty body");
        assert_eq!(ast_message(convert("Just text.\n\nMore text.\n")), "No section!");
    }

    #[test]
    fn roles() {
        let doc = convert("Title\n=====\n\n:math:`x^2` `emph` :sup:`2` :pep:`8`\n").unwrap();
        let para = section_body(&doc)[1].as_element().unwrap();
        let elems: Vec<&Element> = para.children.iter().filter_map(Node::as_element).collect();

        assert_eq!(
            elems[0].kind,
            Kind::InlineMath {
                math: "x^2".into()
            }
        );
        assert_eq!(elems[1].kind, Kind::Emph);
        assert_eq!(elems[2].kind, Kind::Superscript);
        assert_eq!(
            elems[3].kind,
            Kind::Link {
                reference: Reference::href("https://www.python.org/dev/peps/pep-0008/")
            }
        );
        assert_eq!(elems[3].children, vec![Node::text("PEP 8")]);
    }

    #[test]
    fn pep_needs_a_number() {
        let res = convert("Title\n=====\n\n:pep:`eight`\n");
        assert_eq!(ast_message(res), "Invalid PEP number “eight”");
    }

    #[test]
    fn lists_and_definitions() {
        let src = "Title\n=====\n\n- a\n- b\n\nii. x\niii. y\n\nterm\n   def\n";
        let doc = convert(src).unwrap();
        let body = section_body(&doc);
        let kinds: Vec<&Kind> = body[1..]
            .iter()
            .filter_map(Node::as_element)
            .map(|e| &e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                &Kind::BulletList {
                    bullet: Bullet::Text,
                    text: Some("-".into())
                },
                &Kind::EnumList {
                    enumeration: Some(Enumeration::LowerRoman),
                    start: Some(2)
                },
                &Kind::DefList,
            ]
        );
        let item = body[3].as_element().unwrap().children[0].as_element().unwrap();
        assert_eq!(item.kind, Kind::DefItem);
        assert_eq!(item.children[1].inner_text(), "def");
    }

    #[test]
    fn literal_block_is_code() {
        let doc = convert("Title\n=====\n\nExample::\n\n   a = 1\n   b = 2\n").unwrap();
        let block = section_body(&doc)[2].as_element().unwrap();
        assert_eq!(block.kind, Kind::CodeBlock { language: None });
        assert_eq!(block.children, vec![Node::text("a = 1\nb = 2")]);
    }

    #[test]
    fn positions_are_kept() {
        let doc = convert("Title\n=====\n\nBody text.\n").unwrap();
        let para = section_body(&doc)[1].as_element().unwrap();
        assert_eq!(para.pos, Some(Position::new(4, 1)));
    }

    #[test]
    fn fixture() {
        let conv = convert_with(
            include_str!("../../resources/tests/intro.rst"),
            &RstOptions::default(),
        )
        .unwrap();
        let doc = conv.document;
        assert_eq!(doc.title, "Introduction");
        assert_eq!(doc.metadata.get("author").map(String::as_str), Some("Jo"));
        assert!(conv.warnings.is_empty(), "{:?}", conv.warnings);

        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains(r##""ref":{"href":"#layout"}"##));
        assert!(json.contains(r#""ref":{"href":"https://example.com/docs"}"#));
        assert!(json.contains(r#""type":"CodeBlock","language":"sh""#));
    }
}
