//! Named link targets: collection from the parsed tree, resolution of indirect targets
//! and rewriting of the links that refer to them.

use crate::error::Diagnostic;
use crate::markup::{Kind, Node, Reference};
use lazy_static::lazy_static;
use linked_hash_map::LinkedHashMap;
use regex::Regex;
use textdir_rst::NodeType;

lazy_static! {
    static ref HYPERLINK_TARGET: Regex =
        Regex::new(r"(?s)^_([^:]+):\s+(.+)$").expect("invalid regex expression");
    static ref FOOTNOTE: Regex =
        Regex::new(r"(?s)^\[([^\]]+)\]\s+(.+)$").expect("invalid regex expression");
    static ref URL: Regex =
        Regex::new(r"^(?:[a-zA-Z][a-zA-Z0-9+.\-]*://|mailto:)").expect("invalid regex expression");
    static ref ANCHOR: Regex = Regex::new(r"^#").expect("invalid regex expression");
    static ref INLINE_TARGET: Regex =
        Regex::new(r"(?s)^(.+?)\s*<([a-z]+:[^<>]+)>").expect("invalid regex expression");
}

/// Target name and anchor of a title.
pub(crate) fn anchor(title: &str) -> (String, String) {
    let name = title.to_lowercase();
    let anchor = name.replace(' ', "-");
    (name, anchor)
}

/// Label and text of a footnote comment (`[1] Some text`).
pub(crate) fn footnote(comment: &str) -> Option<(&str, &str)> {
    let caps = FOOTNOTE.captures(comment)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

fn extract_into(node: &textdir_rst::Node, targets: &mut LinkedHashMap<String, String>) {
    for child in &node.children {
        match child.node_type {
            NodeType::Title => {
                let (name, anchor) = anchor(&child.inner_text());
                targets.insert(name, format!("#{}", anchor));
            }
            NodeType::Comment => {
                let comment = child.inner_text();
                if let Some(caps) = HYPERLINK_TARGET.captures(&comment) {
                    let target: String = caps[2].split_whitespace().collect();
                    targets.insert(caps[1].to_lowercase(), target);
                }
                if let Some((label, _)) = footnote(&comment) {
                    let name = format!("footnote-{}", label.to_lowercase());
                    targets.insert(name.clone(), format!("#{}", name));
                }
            }
            _ => extract_into(child, targets),
        }
    }
}

/// Collects all targets of a tree, mapping lowercased names to URLs, anchors or the
/// names of other targets.
pub(crate) fn extract(tree: &textdir_rst::Node) -> LinkedHashMap<String, String> {
    let mut targets = LinkedHashMap::new();
    extract_into(tree, &mut targets);
    targets
}

fn is_final(target: &str) -> bool {
    URL.is_match(target) || ANCHOR.is_match(target)
}

/// Resolves indirect targets until nothing changes. Returns the resolved targets and
/// the ones that could not be resolved.
pub(crate) fn resolve(
    mut pending: LinkedHashMap<String, String>,
) -> (LinkedHashMap<String, String>, Vec<(String, String)>) {
    let mut resolved: LinkedHashMap<String, String> = LinkedHashMap::new();

    loop {
        let resolvable: Vec<(String, String)> = pending
            .iter()
            .filter_map(|(name, target)| {
                let reference = target.strip_suffix('_').unwrap_or(target).to_lowercase();
                let target = resolved.get(&reference).unwrap_or(target);
                is_final(target).then(|| (name.clone(), target.clone()))
            })
            .collect();

        if resolvable.is_empty() {
            break;
        }
        for (name, target) in resolvable {
            pending.remove(&name);
            resolved.insert(name, target);
        }
    }

    (resolved, pending.into_iter().collect())
}

fn lookup(name: &str, targets: &LinkedHashMap<String, String>) -> Option<(String, Option<String>)> {
    if let Some(href) = targets.get(&name.to_lowercase()) {
        return Some((href.clone(), None));
    }
    let caps = INLINE_TARGET.captures(name)?;
    Some((caps[2].to_string(), Some(caps[1].to_string())))
}

/// Points every named link at its resolved target. Links with an embedded
/// `text <scheme:target>` are split into text and target.
pub(crate) fn apply(
    nodes: &mut [Node],
    targets: &LinkedHashMap<String, String>,
    warnings: &mut Vec<Diagnostic>,
) {
    for node in nodes {
        let elem = match node {
            Node::Element(elem) => elem,
            Node::Text(_) => continue,
        };

        if let Kind::Link {
            reference: Reference::Name { name },
        } = &elem.kind
        {
            let name = name.clone();
            match lookup(&name, targets) {
                Some((href, text)) => {
                    elem.kind = Kind::Link {
                        reference: Reference::Href { href },
                    };
                    if let Some(text) = text {
                        elem.children = vec![Node::Text(text)];
                    }
                }
                None => warnings.push(Diagnostic::new(
                    format!("Unmatched link target {}", name),
                    elem.pos,
                )),
            }
        }

        apply(&mut elem.children, targets, warnings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::Position;
    use crate::rst::{convert_with, parse};
    use crate::config::RstOptions;

    fn map(entries: &[(&str, &str)]) -> LinkedHashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn links(nodes: &[Node], out: &mut Vec<Reference>) {
        for node in nodes.iter().filter_map(Node::as_element) {
            if let Kind::Link { reference } = &node.kind {
                out.push(reference.clone());
            }
            links(&node.children, out);
        }
    }

    #[test]
    fn anchors() {
        assert_eq!(
            anchor("Getting Started"),
            ("getting started".to_string(), "getting-started".to_string())
        );
    }

    #[test]
    fn extraction() {
        let tree = parse(
            "Intro Text\n==========\n\n.. _Python: https://python.org\n.. [2] A note\n\n- .. _nested: https://example.com\n",
        )
        .unwrap();
        assert_eq!(
            extract(&tree),
            map(&[
                ("intro text", "#intro-text"),
                ("python", "https://python.org"),
                ("footnote-2", "#footnote-2"),
                ("nested", "https://example.com"),
            ])
        );
    }

    #[test]
    fn indirect_targets_resolve_transitively() {
        let (resolved, unresolved) = resolve(map(&[
            ("a", "b_"),
            ("b", "c"),
            ("c", "https://example.com"),
            ("d", "#top"),
        ]));
        assert!(unresolved.is_empty());
        assert_eq!(resolved.get("a").map(String::as_str), Some("https://example.com"));
        assert_eq!(resolved.get("b").map(String::as_str), Some("https://example.com"));
        assert_eq!(resolved.get("d").map(String::as_str), Some("#top"));
    }

    #[test]
    fn cycles_stay_pending() {
        let (resolved, unresolved) = resolve(map(&[("a", "b"), ("b", "a"), ("m", "mailto:x@y.z")]));
        assert_eq!(resolved.len(), 1);
        assert_eq!(unresolved.len(), 2);
    }

    #[test]
    fn references_resolve_through_targets() {
        let src = "Title\n=====\n\nSee foo_.\n\n.. _foo: bar\n.. _bar: https://example.com\n";
        let conv = convert_with(src, &RstOptions::default()).unwrap();
        assert!(conv.warnings.is_empty());

        let mut found = vec![];
        links(&conv.document.children, &mut found);
        assert_eq!(found, vec![Reference::href("https://example.com")]);
    }

    #[test]
    fn unresolved_references_are_warnings() {
        let src = "Title\n=====\n\nSee foo_.\n\n.. _foo: bar\n";
        let conv = convert_with(src, &RstOptions::default()).unwrap();

        let mut found = vec![];
        links(&conv.document.children, &mut found);
        assert_eq!(found, vec![Reference::name("foo")]);

        assert_eq!(conv.warnings.len(), 2);
        assert_eq!(conv.warnings[0].message, "Could not resolve references: foo → bar");
        assert_eq!(conv.warnings[1].message, "Unmatched link target foo");
        assert_eq!(conv.warnings[1].pos, Some(Position::new(4, 5)));
    }

    #[test]
    fn embedded_targets() {
        let src = "Title\n=====\n\nSee `Python <https://python.org>`_ and `Title`_.\n";
        let conv = convert_with(src, &RstOptions::default()).unwrap();
        let para = conv.document.children[0].as_element().unwrap().children[1]
            .as_element()
            .unwrap();
        let links: Vec<_> = para.children.iter().filter_map(Node::as_element).collect();

        assert_eq!(
            links[0].kind,
            Kind::Link {
                reference: Reference::href("https://python.org")
            }
        );
        assert_eq!(links[0].children, vec![Node::text("Python")]);
        assert_eq!(
            links[1].kind,
            Kind::Link {
                reference: Reference::href("#title")
            }
        );
        assert!(conv.warnings.is_empty());
    }

    #[test]
    fn footnotes() {
        let src = "Title\n=====\n\nA claim [1]_.\n\n.. [1] The source.\n";
        let conv = convert_with(src, &RstOptions::default()).unwrap();
        let body = &conv.document.children[0].as_element().unwrap().children;

        let para = body[1].as_element().unwrap();
        let link = para.children[1].as_element().unwrap();
        assert_eq!(
            link.kind,
            Kind::Link {
                reference: Reference::href("#footnote-1")
            }
        );
        assert_eq!(link.children[0].as_element().unwrap().kind, Kind::Superscript);

        let note = body[2].as_element().unwrap();
        assert_eq!(
            note.kind,
            Kind::EnumList {
                enumeration: None,
                start: Some(1)
            }
        );
        assert_eq!(note.inner_text(), "The source.");
    }
}
