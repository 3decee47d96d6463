use crate::error::SyntaxError;
use crate::node::{Node, NodeType, Position};
use pest::error::InputLocation;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

/// The parser for inline markup.
#[derive(Parser)]
#[grammar = "grammars/inline.pest"]
pub struct InlineParser;

/// Lines of a paragraph, title or term joined by newlines, remembering where each line
/// starts in the source so that inline nodes get source positions.
#[derive(Debug, Default)]
pub(crate) struct TextBlock {
    text: String,
    starts: Vec<(usize, Position)>,
}

impl TextBlock {
    pub(crate) fn push_line(&mut self, line: &str, position: Position) {
        if !self.starts.is_empty() {
            self.text.push('\n');
        }
        self.starts.push((self.text.len(), position));
        self.text.push_str(line);
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.text
    }

    fn locate(&self, index: usize) -> Position {
        let line = match self.starts.binary_search_by_key(&index, |(start, _)| *start) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        match self.starts.get(line) {
            Some((start, origin)) => Position::new(
                origin.offset + index - start,
                origin.line,
                origin.column + self.text[*start..index].chars().count(),
            ),
            None => Position::default(),
        }
    }

    /// Text nodes for a byte range, one per line. Every node but the last keeps its
    /// trailing newline.
    fn text_nodes(&self, start: usize, end: usize) -> Vec<Node> {
        let mut nodes = Vec::new();
        let mut from = start;
        while from < end {
            let to = self.text[from..end]
                .find('\n')
                .map_or(end, |newline| from + newline + 1);
            nodes.push(Node::text(&self.text[from..to], self.locate(from)));
            from = to;
        }
        nodes
    }

    fn normalized(&self, pair: &Pair<Rule>) -> Node {
        let value = pair.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
        Node::text(value, self.locate(pair.as_span().start()))
    }
}

pub(crate) fn parse_inline(block: &TextBlock) -> Result<Vec<Node>, SyntaxError> {
    let root = InlineParser::parse(Rule::text_block, block.as_str())
        .map_err(|e| {
            let index = match e.location {
                InputLocation::Pos(pos) => pos,
                InputLocation::Span((start, _)) => start,
            };
            SyntaxError::new("Unterminated inline markup", block.locate(index))
        })?
        .next();
    let root = match root {
        Some(root) => root,
        None => return Ok(vec![]),
    };

    // Everything but a stray backquote is consumed.
    let end = root.as_span().end();
    if end < block.as_str().len() {
        return Err(SyntaxError::new(
            "Unterminated inline markup",
            block.locate(end),
        ));
    }

    let mut nodes = Vec::new();
    let mut run: Option<(usize, usize)> = None;

    for pair in root.into_inner() {
        let span = pair.as_span();
        match pair.as_rule() {
            Rule::word | Rule::other => {
                run = Some(match run {
                    Some((start, _)) => (start, span.end()),
                    None => (span.start(), span.end()),
                });
            }
            _ => {
                if let Some((start, end)) = run.take() {
                    nodes.extend(block.text_nodes(start, end));
                }
                nodes.push(convert_pair(block, pair));
            }
        }
    }
    if let Some((start, end)) = run {
        nodes.extend(block.text_nodes(start, end));
    }

    Ok(nodes)
}

fn convert_pair(block: &TextBlock, pair: Pair<Rule>) -> Node {
    let position = block.locate(pair.as_span().start());
    let node_type = match pair.as_rule() {
        Rule::strong => NodeType::Strong,
        Rule::emphasis => NodeType::Emphasis,
        Rule::literal => NodeType::Literal,
        Rule::phrase_reference | Rule::reference => NodeType::Reference,
        Rule::interpreted => NodeType::InterpretedText,
        Rule::footnote_reference => NodeType::FootnoteReference,
        _ => unreachable!(),
    };
    let mut node = Node::new(node_type, position);

    for inner in pair.into_inner() {
        let span = inner.as_span();
        match inner.as_rule() {
            Rule::strong_body | Rule::emphasis_body | Rule::literal_body => {
                node.children = block.text_nodes(span.start(), span.end())
            }
            Rule::phrase_body if node_type == NodeType::Reference => {
                node.children = vec![block.normalized(&inner)]
            }
            Rule::phrase_body => node.children = block.text_nodes(span.start(), span.end()),
            Rule::role => node.role = Some(inner.as_str().to_string()),
            Rule::footnote_label | Rule::ref_name => node.children = vec![block.normalized(&inner)],
            _ => unreachable!(),
        }
    }

    node
}
