use super::{parse, pos, Converter};
use crate::error::{AstError, Result};
use crate::markup::{Element, Kind, Node};
use lazy_static::lazy_static;
use linked_hash_map::LinkedHashMap;
use regex::Regex;
use serde_json::json;

lazy_static! {
    static ref PARAM: Regex = Regex::new(r"^:(\w+):(?:\s(.*))?$").expect("invalid regex expression");
}

/// The content of a directive: the argument on the directive line, the `:name: value`
/// options right below it and the remaining body lines.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Directive {
    pub header: Option<String>,
    pub params: LinkedHashMap<String, String>,
    pub body: Vec<String>,
}

pub(crate) fn parse_directive(lines: &[textdir_rst::Node]) -> Directive {
    let mut texts = lines.iter().map(|line| {
        line.text_value()
            .map(String::from)
            .unwrap_or_else(|| line.inner_text())
    });

    let header = texts.next().filter(|h| !h.trim().is_empty());

    let mut params = LinkedHashMap::new();
    let mut rest = texts.skip_while(|l| l.trim().is_empty()).peekable();
    while let Some(caps) = rest.peek().and_then(|l| PARAM.captures(l)) {
        let value = caps.get(2).map_or("", |v| v.as_str().trim());
        params.insert(caps[1].to_string(), value.to_string());
        rest.next();
    }

    let body = rest.skip_while(|l| l.trim().is_empty()).collect();

    Directive {
        header,
        params,
        body,
    }
}

impl Converter<'_> {
    pub(super) fn directive(&self, node: &textdir_rst::Node, level: usize) -> Result<Vec<Node>> {
        let name = node.directive.as_deref().unwrap_or_default();
        let elem = |kind: Kind, children: Vec<Node>| -> Result<Vec<Node>> {
            Ok(vec![Element::new(kind, children).at(pos(node)).into()])
        };

        match name {
            "epigraph" | "highlights" | "pull-quote" => {
                let source = node
                    .children
                    .iter()
                    .map(textdir_rst::Node::inner_text)
                    .collect::<Vec<_>>()
                    .join("\n");
                let quoted = self.node(&parse(&source)?, level)?;
                let kind = Kind::BlockQuote {
                    variant: Some(name.to_string()),
                };
                elem(kind, quoted)
            }
            "code" | "code-block" => {
                let Directive { header, body, .. } = parse_directive(&node.children);
                let lines = body.into_iter().map(Node::Text).collect();
                elem(Kind::CodeBlock { language: header }, lines)
            }
            "csv-table" => {
                let Directive {
                    header,
                    params,
                    body,
                } = parse_directive(&node.children);
                let delimiter = match params.get("delim").map(String::as_str) {
                    Some("tab") => "\t",
                    Some("space") => " ",
                    Some(other) => other,
                    None => self.options.csv_delimiter.as_str(),
                };
                if delimiter.is_empty() {
                    return Err(AstError::new("Empty csv-table delimiter", node, pos(node)).into());
                }
                let rows = body
                    .iter()
                    .filter(|line| !line.trim().is_empty())
                    .map(|line| {
                        let cells: Vec<Element> = line
                            .split(delimiter)
                            .map(|cell| Element::new(Kind::Cell, cell.trim()).at(pos(node)))
                            .collect();
                        Element::new(Kind::Row, cells).at(pos(node)).into()
                    })
                    .collect();
                elem(Kind::Table { caption: header }, rows)
            }
            "plotly" => {
                let Directive { header, params, .. } = parse_directive(&node.children);
                let url = header.ok_or_else(|| {
                    AstError::new("The plotly directive needs a URL", node, pos(node))
                })?;
                let mut style = LinkedHashMap::new();
                style.insert("width".to_string(), "100%".to_string());
                let config = match json!({ "responsive": true }) {
                    serde_json::Value::Object(map) => Some(map),
                    _ => None,
                };
                let kind = Kind::Plotly {
                    url,
                    on_click_link: params.get("onClickLink").cloned(),
                    style: Some(style),
                    config,
                };
                elem(kind, vec![])
            }
            _ => Err(AstError::new(
                format!("Unknown directive “{}”", name),
                node,
                pos(node),
            )
            .into()),
        }
    }
}
