//! Markdown conversion.
//!
//! pulldown-cmark produces a flat stream of start, end and leaf events. The stream is
//! nested into [Token]s first (a start event owns everything up to its end event) and the
//! tokens are then mapped one by one onto the document model.

use crate::config::MarkdownOptions;
use crate::error::{AstError, Conversion, MarkupError, Result};
use crate::markup::{
    Bullet, Document, Element, Enumeration, IntoNodes, Kind, Node, Position, Reference,
};
use lazy_static::lazy_static;
use linked_hash_map::LinkedHashMap;
use pulldown_cmark::{CodeBlockKind, CowStr, Event, LinkType, Options, Parser, Tag};
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref HEADING_TAG: Regex = Regex::new(r"^h([1-6])$").expect("invalid regex expression");
}

/// An event with the events it encloses. Only start events have children.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct Token<'a> {
    event: Event<'a>,
    line: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<Token<'a>>,
}

impl Token<'_> {
    fn pos(&self) -> Option<Position> {
        Some(Position::new(self.line, 1))
    }

    /// Name of the token kind, for error messages.
    fn type_name(&self) -> &'static str {
        match &self.event {
            Event::Start(tag) | Event::End(tag) => match tag {
                Tag::Paragraph => "paragraph",
                Tag::Heading(..) => "heading",
                Tag::BlockQuote => "blockquote",
                Tag::CodeBlock(CodeBlockKind::Fenced(_)) => "fence",
                Tag::CodeBlock(CodeBlockKind::Indented) => "code_block",
                Tag::List(None) => "bullet_list",
                Tag::List(Some(_)) => "ordered_list",
                Tag::Item => "list_item",
                Tag::FootnoteDefinition(_) => "footnote_block",
                Tag::Table(_) => "table",
                Tag::TableHead => "thead",
                Tag::TableRow => "tr",
                Tag::TableCell => "td",
                Tag::Emphasis => "em",
                Tag::Strong => "strong",
                Tag::Strikethrough => "s",
                Tag::Link(..) => "link",
                Tag::Image(..) => "image",
            },
            Event::Text(_) => "text",
            Event::Code(_) => "code_inline",
            Event::Html(_) => "html",
            Event::FootnoteReference(_) => "footnote_ref",
            Event::SoftBreak => "softbreak",
            Event::HardBreak => "hardbreak",
            Event::Rule => "hr",
            Event::TaskListMarker(_) => "task_list_marker",
        }
    }
}

/// Start offsets of the lines of a source text.
struct LineIndex(Vec<usize>);

impl LineIndex {
    fn new(src: &str) -> Self {
        LineIndex(
            std::iter::once(0)
                .chain(src.match_indices('\n').map(|(i, _)| i + 1))
                .collect(),
        )
    }

    /// 1-based line of a byte offset.
    fn line(&self, offset: usize) -> usize {
        self.0.partition_point(|start| *start <= offset)
    }
}

fn options(md: &MarkdownOptions) -> Options {
    let mut options = Options::empty();
    if md.heading_attributes {
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    }
    if md.tables {
        options.insert(Options::ENABLE_TABLES);
    }
    options
}

/// The flat event stream with source lines. Consecutive text events are merged.
fn tokenize<'a>(src: &'a str, md: &MarkdownOptions) -> Vec<(Event<'a>, usize)> {
    let lines = LineIndex::new(src);
    let mut events: Vec<(Event<'a>, usize)> = Vec::new();

    for (event, range) in Parser::new_ext(src, options(md)).into_offset_iter() {
        if let Event::Text(text) = &event {
            if let Some((Event::Text(prev), _)) = events.last_mut() {
                *prev = CowStr::from(format!("{}{}", prev, text));
                continue;
            }
        }
        events.push((event, lines.line(range.start)));
    }

    events
}

/// Nests the events from `cursor` on until the end event matching `end`, or until the
/// stream is exhausted when `end` is `None`.
fn nest<'a>(
    events: &[(Event<'a>, usize)],
    cursor: &mut usize,
    end: Option<&Tag<'a>>,
) -> Result<Vec<Token<'a>>> {
    let mut tokens = Vec::new();

    while let Some((event, line)) = events.get(*cursor) {
        *cursor += 1;
        match event {
            Event::End(tag) => {
                return match end {
                    Some(open) if std::mem::discriminant(open) == std::mem::discriminant(tag) => {
                        Ok(tokens)
                    }
                    _ => Err(AstError::new(
                        "Unbalanced closing token",
                        event,
                        Some(Position::new(*line, 1)),
                    )
                    .into()),
                };
            }
            Event::Start(tag) => {
                let children = nest(events, cursor, Some(tag))?;
                tokens.push(Token {
                    event: event.clone(),
                    line: *line,
                    children,
                });
            }
            _ => tokens.push(Token {
                event: event.clone(),
                line: *line,
                children: vec![],
            }),
        }
    }

    match end {
        None => Ok(tokens),
        Some(tag) => Err(AstError::new("Unclosed token", tag, None).into()),
    }
}

fn plain_text(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|token| match &token.event {
            Event::Text(text) | Event::Code(text) => text.to_string(),
            _ => plain_text(&token.children),
        })
        .collect()
}

fn convert_all(tokens: &[Token]) -> Result<Vec<Node>> {
    let mut nodes = Vec::new();
    for token in tokens {
        nodes.extend(convert_token(token)?);
    }
    Ok(nodes)
}

fn element<C: IntoNodes>(kind: Kind, children: C, token: &Token) -> Vec<Node> {
    vec![Element::new(kind, children).at(token.pos()).into()]
}

fn convert_token(token: &Token) -> Result<Vec<Node>> {
    let tag = match &token.event {
        Event::Text(text) => return Ok(vec![Node::text(text.to_string())]),
        Event::Code(code) => return Ok(element(Kind::Code, code.to_string(), token)),
        Event::SoftBreak => return Ok(vec![]),
        Event::HardBreak => return Ok(element(Kind::LineBreak, (), token)),
        Event::Start(tag) => tag,
        _ => return Err(unknown(token)),
    };

    let children = || convert_all(&token.children);

    let nodes = match tag {
        Tag::Paragraph => element(Kind::Paragraph, children()?, token),
        Tag::Heading(level, id, _) => {
            let level = HEADING_TAG
                .captures(&level.to_string())
                .and_then(|c| c.get(1))
                .and_then(|l| l.as_str().parse::<u8>().ok())
                .ok_or_else(|| {
                    AstError::new(format!("Unexpected header tag {}", level), token, token.pos())
                })?;
            let kind = Kind::Title {
                level,
                anchor: id.map(String::from),
            };
            element(kind, children()?, token)
        }
        Tag::CodeBlock(kind) => {
            let language = match kind {
                CodeBlockKind::Fenced(info) => info.split_whitespace().next().map(String::from),
                CodeBlockKind::Indented => None,
            };
            let code = plain_text(&token.children);
            element(
                Kind::CodeBlock { language },
                (!code.is_empty()).then_some(code),
                token,
            )
        }
        Tag::List(None) => {
            let kind = Kind::BulletList {
                bullet: Bullet::Disc,
                text: None,
            };
            element(kind, children()?, token)
        }
        Tag::List(Some(start)) => {
            let kind = Kind::EnumList {
                enumeration: Some(Enumeration::Decimal),
                start: u32::try_from(*start).ok(),
            };
            element(kind, children()?, token)
        }
        Tag::Item => element(Kind::ListItem, children()?, token),
        Tag::Emphasis => element(Kind::Emph, children()?, token),
        Tag::Strong => element(Kind::Strong, children()?, token),
        Tag::Link(link_type, url, _) => {
            if url.is_empty() {
                return Err(AstError::new("Link without href encountered", token, token.pos()).into());
            }
            let href = match link_type {
                LinkType::Email => format!("mailto:{}", url),
                _ => url.to_string(),
            };
            let kind = Kind::Link {
                reference: Reference::href(href),
            };
            element(kind, children()?, token)
        }
        Tag::Table(_) => element(Kind::Table { caption: None }, children()?, token),
        Tag::TableHead | Tag::TableRow => element(Kind::Row, children()?, token),
        Tag::TableCell => element(Kind::Cell, children()?, token),
        Tag::BlockQuote
        | Tag::FootnoteDefinition(_)
        | Tag::Strikethrough
        | Tag::Image(..) => return Err(unknown(token)),
    };

    Ok(nodes)
}

fn unknown(token: &Token) -> MarkupError {
    AstError::new(
        format!("Unknown token type “{}”", token.type_name()),
        token,
        token.pos(),
    )
    .into()
}

/// Converts Markdown with the default options.
pub fn convert(src: &str) -> Result<Document> {
    Ok(convert_with(src, &MarkdownOptions::default())?.document)
}

pub fn convert_with(src: &str, md: &MarkdownOptions) -> Result<Conversion> {
    let events = tokenize(src, md);
    let tokens = nest(&events, &mut 0, None)?;

    let title = tokens
        .first()
        .map(|first| plain_text(&first.children).trim().to_string())
        .unwrap_or_default();
    if title.is_empty() {
        return Err(match tokens.first() {
            Some(first) => AstError::new("No title!", first, first.pos()),
            None => AstError::message("No title!"),
        }
        .into());
    }

    let document = Document {
        title,
        children: convert_all(&tokens)?,
        metadata: LinkedHashMap::new(),
    };

    Ok(Conversion {
        document,
        warnings: vec![],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(nodes: &[Node]) -> Vec<&Kind> {
        nodes
            .iter()
            .filter_map(Node::as_element)
            .map(|e| &e.kind)
            .collect()
    }

    fn ast_message(res: Result<Document>) -> String {
        match res {
            Err(MarkupError::Ast(e)) => e.message,
            other => panic!("expected an AST error, got {:?}", other),
        }
    }

    #[test]
    fn fenced_code_is_one_code_block() {
        let doc = convert("# Code\n\n```js\ncode\n```\n").unwrap();
        assert_eq!(doc.children.len(), 2);
        let block = doc.children[1].as_element().unwrap();
        assert_eq!(
            block.kind,
            Kind::CodeBlock {
                language: Some("js".into())
            }
        );
        assert_eq!(block.children, vec![Node::text("code\n")]);
        assert_eq!(block.pos, Some(Position::new(3, 1)));
    }

    #[test]
    fn title_from_first_heading() {
        let doc = convert("# Hello *world*\n\nText.\n").unwrap();
        assert_eq!(doc.title, "Hello world");
        assert!(doc.metadata.is_empty());

        let heading = doc.children[0].as_element().unwrap();
        assert_eq!(
            heading.kind,
            Kind::Title {
                level: 1,
                anchor: None
            }
        );
        assert_eq!(heading.children.len(), 2);
    }

    #[test]
    fn heading_levels_and_anchors() {
        let doc = convert("# Doc\n\n### Third {#third}\n").unwrap();
        assert_eq!(
            doc.children[1].as_element().unwrap().kind,
            Kind::Title {
                level: 3,
                anchor: Some("third".into())
            }
        );
    }

    #[test]
    fn missing_title() {
        assert_eq!(ast_message(convert("")), "No title!");
        assert_eq!(ast_message(convert("---\n")), "No title!");
    }

    #[test]
    fn text_runs_are_merged() {
        // pulldown-cmark splits text at the bracket
        let doc = convert("# T\n\na [b c\n").unwrap();
        let para = doc.children[1].as_element().unwrap();
        assert_eq!(para.children, vec![Node::text("a [b c")]);
    }

    #[test]
    fn breaks() {
        let doc = convert("# T\n\none\ntwo  \nthree\n").unwrap();
        let para = doc.children[1].as_element().unwrap();
        assert_eq!(
            para.children,
            vec![
                Node::text("one"),
                Node::text("two"),
                Element::new(Kind::LineBreak, ()).at(Position::new(4, 1)).into(),
                Node::text("three"),
            ]
        );
    }

    #[test]
    fn lists() {
        let doc = convert("# T\n\n- a\n- b\n\n3. c\n").unwrap();
        assert_eq!(
            kinds(&doc.children)[1..],
            [
                &Kind::BulletList {
                    bullet: Bullet::Disc,
                    text: None
                },
                &Kind::EnumList {
                    enumeration: Some(Enumeration::Decimal),
                    start: Some(3)
                },
            ]
        );
        let list = doc.children[1].as_element().unwrap();
        assert_eq!(kinds(&list.children), vec![&Kind::ListItem, &Kind::ListItem]);
    }

    #[test]
    fn inline_styles_and_links() {
        let doc = convert("# T\n\n*a* **b** `c` [d](https://example.com) <me@example.com>\n").unwrap();
        let para = doc.children[1].as_element().unwrap();
        let kinds = kinds(&para.children);
        assert_eq!(kinds[0], &Kind::Emph);
        assert_eq!(kinds[1], &Kind::Strong);
        assert_eq!(kinds[2], &Kind::Code);
        assert_eq!(
            kinds[3],
            &Kind::Link {
                reference: Reference::href("https://example.com")
            }
        );
        assert_eq!(
            kinds[4],
            &Kind::Link {
                reference: Reference::href("mailto:me@example.com")
            }
        );
    }

    #[test]
    fn link_without_href() {
        assert_eq!(
            ast_message(convert("# T\n\n[empty]()\n")),
            "Link without href encountered"
        );
    }

    macro_rules! unsupported_tests {
        ($prefix:ident $($name:ident: $value:expr,)*) => {
        $(
            paste::item!{
            #[test]
            fn [<$prefix _ $name>]() {
                let (input, token) = $value;
                assert_eq!(
                    ast_message(convert(input)),
                    format!("Unknown token type “{}”", token)
                );
            }
            }
        )*
        }
    }

    unsupported_tests! {
        unsupported
        blockquote: ("# T\n\n> quoted\n", "blockquote"),
        rule: ("# T\n\n***\n", "hr"),
        image: ("# T\n\nSee ![plot](plot.png).\n", "image"),
        html: ("# T\n\n<div>\nraw\n</div>\n", "html"),
    }

    #[test]
    fn tables_when_enabled() {
        let md = MarkdownOptions {
            tables: true,
            ..Default::default()
        };
        let src = "# T\n\n| a | b |\n|---|---|\n| 1 | 2 |\n";
        let doc = convert_with(src, &md).unwrap().document;
        let table = doc.children[1].as_element().unwrap();
        assert_eq!(table.kind, Kind::Table { caption: None });
        assert_eq!(kinds(&table.children), vec![&Kind::Row, &Kind::Row]);
        assert_eq!(table.children[1].inner_text(), "12");
    }

    #[test]
    fn fixture() {
        let doc = convert(include_str!("../resources/tests/intro.md")).unwrap();
        assert_eq!(doc.title, "Introduction");
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["children"][0]["type"], "Title");
        assert_eq!(json["children"][0]["anchor"], "intro");
        assert_eq!(json["metadata"], serde_json::json!({}));
    }
}
