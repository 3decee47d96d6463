use crate::error::SyntaxError;
use crate::inline::{parse_inline, TextBlock};
use crate::node::{Node, NodeType, Position};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref BULLET: Regex = Regex::new(r"^([*+\-•‣⁃])(?:\s+|$)").expect("invalid regex expression");
    static ref ENUMERATOR: Regex =
        Regex::new(r"^(\()?([0-9]+|#|[a-zA-Z]|[ivxlcdmIVXLCDM]+)([.)])(?:\s+|$)")
            .expect("invalid regex expression");
    static ref DIRECTIVE: Regex =
        Regex::new(r"^([A-Za-z0-9][A-Za-z0-9_+.\-]*)::(?:\s+(.*))?$").expect("invalid regex expression");
}

const ADORNMENT_CHARS: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// One source line, seen from the indentation level of the block that contains it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Line<'s> {
    text: &'s str,
    position: Position,
}

impl<'s> Line<'s> {
    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    fn indent(&self) -> usize {
        self.text.len() - self.text.trim_start_matches([' ', '\t']).len()
    }

    /// Drops `bytes` leading bytes, which must be whitespace or an already matched marker.
    fn skip(&self, bytes: usize) -> Line<'s> {
        let bytes = bytes.min(self.text.len());
        let (skipped, rest) = self.text.split_at(bytes);
        Line {
            text: rest,
            position: Position::new(
                self.position.offset + bytes,
                self.position.line,
                self.position.column + skipped.chars().count(),
            ),
        }
    }

    /// The adornment character, if the line is made of a single repeated punctuation
    /// character.
    fn adornment(&self) -> Option<(char, usize)> {
        let text = self.text.trim_end();
        let first = text.chars().next()?;
        if self.indent() > 0 || !ADORNMENT_CHARS.contains(first) {
            return None;
        }
        text.chars()
            .all(|c| c == first)
            .then(|| (first, text.chars().count()))
    }
}

pub(crate) fn split_lines(source: &str) -> Vec<Line> {
    let mut offset = 0;
    source
        .split('\n')
        .enumerate()
        .map(|(i, raw)| {
            let line = Line {
                text: raw.strip_suffix('\r').unwrap_or(raw),
                position: Position::new(offset, i + 1, 1),
            };
            offset += raw.len() + 1;
            line
        })
        .collect()
}

/// Removes leading and trailing blank lines and the common indentation.
fn dedent<'s>(lines: &[Line<'s>]) -> Vec<Line<'s>> {
    let start = lines.iter().position(|l| !l.is_blank()).unwrap_or(lines.len());
    let end = lines.iter().rposition(|l| !l.is_blank()).map_or(start, |i| i + 1);
    unindent(&lines[start..end])
}

/// Removes the common indentation of the non-blank lines.
fn unindent<'s>(lines: &[Line<'s>]) -> Vec<Line<'s>> {
    let indent = lines
        .iter()
        .filter(|l| !l.is_blank())
        .map(Line::indent)
        .min()
        .unwrap_or(0);
    lines.iter().map(|l| l.skip(indent)).collect()
}

/// Index after the indented block (indented or blank lines) starting at `from`.
fn indented_end(lines: &[Line], from: usize) -> usize {
    lines[from..]
        .iter()
        .position(|l| !l.is_blank() && l.indent() == 0)
        .map_or(lines.len(), |i| from + i)
}

fn next_content(lines: &[Line], from: usize) -> usize {
    lines[from..]
        .iter()
        .position(|l| !l.is_blank())
        .map_or(lines.len(), |i| from + i)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Adornment {
    ch: char,
    overline: bool,
}

enum Item {
    Block(Node),
    Title { level: usize, title: Node },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Enumerator<'a> {
    parens: bool,
    suffix: &'a str,
    enumtype: &'static str,
    start: Option<u32>,
    len: usize,
}

fn enumerator(text: &str) -> Option<Enumerator> {
    let caps = ENUMERATOR.captures(text)?;
    let parens = caps.get(1).is_some();
    let suffix = caps.get(3)?.as_str();
    if parens && suffix != ")" {
        return None;
    }
    let ordinal = caps.get(2)?.as_str();
    let (enumtype, start) = if ordinal == "#" {
        ("arabic", None)
    } else if let Ok(number) = ordinal.parse::<u32>() {
        ("arabic", Some(number))
    } else if ordinal.len() > 1 || ordinal == "i" || ordinal == "I" {
        let upper = ordinal.chars().all(|c| c.is_ascii_uppercase());
        (
            if upper { "upperroman" } else { "lowerroman" },
            roman_value(ordinal),
        )
    } else {
        let c = ordinal.chars().next()?;
        let upper = c.is_ascii_uppercase();
        (
            if upper { "upperalpha" } else { "loweralpha" },
            Some(c.to_ascii_lowercase() as u32 - 'a' as u32 + 1),
        )
    };
    Some(Enumerator {
        parens,
        suffix,
        enumtype,
        start,
        len: caps.get(0)?.end(),
    })
}

fn roman_value(numeral: &str) -> Option<u32> {
    let values = numeral
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            'i' => Some(1),
            'v' => Some(5),
            'x' => Some(10),
            'l' => Some(50),
            'c' => Some(100),
            'd' => Some(500),
            'm' => Some(1000),
            _ => None,
        })
        .collect::<Option<Vec<u32>>>()?;
    let mut total = 0;
    for (i, value) in values.iter().enumerate() {
        match values.get(i + 1) {
            Some(next) if next > value => total -= *value as i64,
            _ => total += *value as i64,
        }
    }
    u32::try_from(total).ok()
}

#[derive(Default)]
struct BlockReader {
    styles: Vec<Adornment>,
    depth: usize,
}

impl BlockReader {
    fn read(&mut self, lines: &[Line], top: bool) -> Result<Vec<Item>, SyntaxError> {
        let mut items = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            if lines[i].is_blank() {
                i += 1;
                continue;
            }
            let (block, next) = self.block(lines, i, top)?;
            items.extend(block);
            i = next;
        }
        Ok(items)
    }

    /// Reads a nested body, where section titles are not allowed.
    fn body(&mut self, lines: &[Line]) -> Result<Vec<Node>, SyntaxError> {
        Ok(self
            .read(lines, false)?
            .into_iter()
            .filter_map(|item| match item {
                Item::Block(node) => Some(node),
                Item::Title { .. } => None,
            })
            .collect())
    }

    fn block(
        &mut self,
        lines: &[Line],
        i: usize,
        top: bool,
    ) -> Result<(Vec<Item>, usize), SyntaxError> {
        let line = lines[i];

        if line.indent() > 0 {
            let end = indented_end(lines, i);
            let quote = Node::with_children(
                NodeType::BlockQuote,
                line.skip(line.indent()).position,
                self.body(&dedent(&lines[i..end]))?,
            );
            return Ok((vec![Item::Block(quote)], end));
        }

        if let Some((item, next)) = self.section_title(lines, i, top)? {
            return Ok((vec![item], next));
        }

        if let Some((_, width)) = line.adornment() {
            if width >= 4 && lines.get(i + 1).map_or(true, Line::is_blank) {
                let transition = Node::new(NodeType::Transition, line.position);
                return Ok((vec![Item::Block(transition)], i + 1));
            }
        }

        if line.text == ".." || line.text.starts_with(".. ") {
            let (node, next) = self.explicit(lines, i);
            return Ok((vec![Item::Block(node)], next));
        }

        if let Some(caps) = BULLET.captures(line.text) {
            let bullet = caps.get(1).map_or("", |m| m.as_str());
            let (node, next) = self.bullet_list(lines, i, bullet)?;
            return Ok((vec![Item::Block(node)], next));
        }

        if let Some(first) = enumerator(line.text) {
            let follows = lines
                .get(i + 1)
                .map_or(true, |l| l.is_blank() || l.indent() > 0 || enumerator(l.text).is_some());
            if follows {
                let (node, next) = self.enumerated_list(lines, i, first)?;
                return Ok((vec![Item::Block(node)], next));
            }
        }

        if lines
            .get(i + 1)
            .map_or(false, |l| !l.is_blank() && l.indent() > 0)
        {
            let (node, next) = self.definition_list(lines, i)?;
            return Ok((vec![Item::Block(node)], next));
        }

        self.paragraph(lines, i)
    }

    fn section_title(
        &mut self,
        lines: &[Line],
        i: usize,
        top: bool,
    ) -> Result<Option<(Item, usize)>, SyntaxError> {
        let line = lines[i];
        let (text_line, adornment, next) = match (line.adornment(), lines.get(i + 1), lines.get(i + 2)) {
            (Some((ch, width)), Some(text), Some(under))
                if !text.is_blank() && under.adornment().map(|(c, _)| c) == Some(ch) =>
            {
                if width < text.text.trim().chars().count() {
                    return Err(SyntaxError::new("Title overline too short", line.position));
                }
                (*text, Adornment { ch, overline: true }, i + 3)
            }
            (None, Some(under), _) => match under.adornment() {
                Some((ch, width)) if width >= 4.min(line.text.trim().chars().count()) => {
                    (line, Adornment { ch, overline: false }, i + 2)
                }
                _ => return Ok(None),
            },
            _ => return Ok(None),
        };

        if !top {
            return Err(SyntaxError::new("Unexpected section title", line.position));
        }

        let level = match self.styles.iter().position(|s| *s == adornment) {
            Some(known) if known < self.depth + 1 => known + 1,
            None if self.styles.len() == self.depth => {
                self.styles.push(adornment);
                self.styles.len()
            }
            _ => return Err(SyntaxError::new("Title level inconsistent", line.position)),
        };
        self.depth = level;

        let text_line = text_line.skip(text_line.indent());
        let mut block = TextBlock::default();
        block.push_line(text_line.text.trim_end(), text_line.position);
        let title = Node::with_children(NodeType::Title, line.position, parse_inline(&block)?);

        Ok(Some((Item::Title { level, title }, next)))
    }

    fn explicit(&self, lines: &[Line], i: usize) -> (Node, usize) {
        let line = lines[i];
        let first = line.skip(2.min(line.text.len()));
        let first = first.skip(first.indent());
        let end = indented_end(lines, i + 1);
        let content = dedent(&lines[i + 1..end]);

        if let Some(caps) = DIRECTIVE.captures(first.text.trim_end()) {
            let name = caps.get(1).map_or("", |m| m.as_str());
            let header = match caps.get(2) {
                Some(arg) => Node::text(arg.as_str().trim(), first.skip(arg.start()).position),
                None => Node::text("", first.position),
            };
            let mut node = Node::new(NodeType::Directive, line.position);
            node.directive = Some(name.to_string());
            node.children = std::iter::once(header)
                .chain(content.iter().map(|l| Node::text(l.text.trim_end(), l.position)))
                .collect();
            return (node, end);
        }

        let text = std::iter::once(first.text)
            .chain(content.iter().map(|l| l.text))
            .collect::<Vec<_>>()
            .join("\n");
        let comment = Node::with_children(
            NodeType::Comment,
            line.position,
            vec![Node::text(text.trim(), first.position)],
        );
        (comment, end)
    }

    /// Reads a list item whose marker takes `marker` bytes of line `i`.
    fn list_item(
        &mut self,
        lines: &[Line],
        i: usize,
        marker: usize,
    ) -> Result<(Node, usize), SyntaxError> {
        let line = lines[i];
        let end = indented_end(lines, i + 1);
        let mut item_lines = vec![line.skip(marker)];
        item_lines.extend(unindent(&lines[i + 1..end]));
        let item = Node::with_children(NodeType::ListItem, line.position, self.body(&item_lines)?);
        Ok((item, end))
    }

    fn bullet_list(
        &mut self,
        lines: &[Line],
        i: usize,
        bullet: &str,
    ) -> Result<(Node, usize), SyntaxError> {
        let mut list = Node::new(NodeType::BulletList, lines[i].position);
        list.bullet = Some(bullet.to_string());

        let mut at = i;
        loop {
            let marker = BULLET.find(lines[at].text).map_or(0, |m| m.end());
            let (item, end) = self.list_item(lines, at, marker)?;
            list.children.push(item);

            let next = next_content(lines, end);
            let same = lines.get(next).and_then(|l| BULLET.captures(l.text));
            match same {
                Some(caps) if caps.get(1).map(|m| m.as_str()) == Some(bullet) => at = next,
                _ => return Ok((list, end)),
            }
        }
    }

    fn enumerated_list(
        &mut self,
        lines: &[Line],
        i: usize,
        first: Enumerator,
    ) -> Result<(Node, usize), SyntaxError> {
        let mut list = Node::new(NodeType::EnumeratedList, lines[i].position);
        list.enumtype = Some(first.enumtype.to_string());
        list.start = first.start;

        let mut at = i;
        let mut marker = first.len;
        loop {
            let (item, end) = self.list_item(lines, at, marker)?;
            list.children.push(item);

            let next = next_content(lines, end);
            match lines.get(next).and_then(|l| enumerator(l.text)) {
                Some(e) if e.parens == first.parens && e.suffix == first.suffix => {
                    at = next;
                    marker = e.len;
                }
                _ => return Ok((list, end)),
            }
        }
    }

    fn definition_list(&mut self, lines: &[Line], i: usize) -> Result<(Node, usize), SyntaxError> {
        let mut list = Node::new(NodeType::DefinitionList, lines[i].position);

        let mut at = i;
        loop {
            let line = lines[at];
            let mut block = TextBlock::default();
            block.push_line(line.text.trim_end(), line.position);
            let term = Node::with_children(NodeType::Term, line.position, parse_inline(&block)?);

            let end = indented_end(lines, at + 1);
            let body = dedent(&lines[at + 1..end]);
            let definition = Node::with_children(
                NodeType::Definition,
                body.first().map_or(line.position, |l| l.position),
                self.body(&body)?,
            );
            list.children.push(Node::with_children(
                NodeType::DefinitionListItem,
                line.position,
                vec![term, definition],
            ));

            let next = next_content(lines, end);
            let another = next + 1 < lines.len()
                && lines[next].indent() == 0
                && !lines[next + 1].is_blank()
                && lines[next + 1].indent() > 0
                && !lines[next].text.starts_with("..")
                && !BULLET.is_match(lines[next].text)
                && enumerator(lines[next].text).is_none();
            if another {
                at = next;
            } else {
                return Ok((list, end));
            }
        }
    }

    fn paragraph(&mut self, lines: &[Line], i: usize) -> Result<(Vec<Item>, usize), SyntaxError> {
        let end = lines[i..]
            .iter()
            .position(|l| l.is_blank() || l.indent() > 0)
            .map_or(lines.len(), |n| i + n);
        let mut text: Vec<&str> = lines[i..end].iter().map(|l| l.text.trim_end()).collect();

        let literal = text.last().map_or(false, |last| last.ends_with("::"));
        if !literal {
            if let Some(l) = lines.get(end).filter(|l| !l.is_blank()) {
                return Err(SyntaxError::new(
                    "Unexpected indentation",
                    l.skip(l.indent()).position,
                ));
            }
        }

        if literal {
            if let Some(last) = text.pop() {
                if last != "::" {
                    let marker = &last[..last.len() - 2];
                    text.push(if marker.ends_with(char::is_whitespace) {
                        marker.trim_end()
                    } else {
                        &last[..last.len() - 1]
                    });
                }
            }
        }

        let mut items = Vec::new();
        if !text.is_empty() {
            let mut block = TextBlock::default();
            for (line, text) in lines[i..].iter().zip(&text) {
                block.push_line(text, line.position);
            }
            items.push(Item::Block(Node::with_children(
                NodeType::Paragraph,
                lines[i].position,
                parse_inline(&block)?,
            )));
        }

        let mut next = end;
        if literal {
            let start = next_content(lines, end);
            if lines.get(start).map_or(false, |l| l.indent() > 0) {
                let stop = indented_end(lines, start);
                let body = dedent(&lines[start..stop]);
                items.push(Item::Block(Node::with_children(
                    NodeType::LiteralBlock,
                    body.first().map_or(lines[start].position, |l| l.position),
                    body.iter()
                        .map(|l| Node::text(l.text.trim_end(), l.position))
                        .collect(),
                )));
                next = stop;
            }
        }

        Ok((items, next))
    }
}

/// Nests the items read from the top level into sections.
fn assemble(items: Vec<Item>) -> Node {
    let mut stack = vec![Node::new(NodeType::Document, Position::new(0, 1, 1))];
    for item in items {
        match item {
            Item::Block(node) => push_child(&mut stack, node),
            Item::Title { level, title } => {
                close_sections(&mut stack, level);
                let mut section =
                    Node::with_children(NodeType::Section, title.position, vec![title]);
                section.depth = Some(level);
                stack.push(section);
            }
        }
    }
    close_sections(&mut stack, 1);
    stack.pop().unwrap_or_default()
}

fn push_child(stack: &mut [Node], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn close_sections(stack: &mut Vec<Node>, level: usize) {
    while stack.len() > level {
        if let Some(section) = stack.pop() {
            push_child(stack, section);
        }
    }
}

/// Parses reStructuredText source into a `document` node.
pub fn parse(source: &str) -> Result<Node, SyntaxError> {
    let lines = split_lines(source);
    let items = BlockReader::default().read(&lines, true)?;
    Ok(assemble(items))
}
