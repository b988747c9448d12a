//! Markup fragment parsing.
//!
//! The block parser never touches raw markup directly: it walks the [`Node`]
//! tree produced by a [`MarkupParser`]. [`HtmlFragmentParser`] is the default
//! adapter, built on `quick-xml` events and relaxed for editor HTML (void
//! elements, unquoted attributes, unknown entities).
use quick_xml::escape::unescape_with;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::MarkupError;

/// HTML elements that never have content or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Raw text as it appears in the markup (entities not expanded).
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lower-cased tag name.
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
    pub outer_html: String,
    pub inner_html: String,
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    /// Concatenated text of this node and its descendants, with entities
    /// expanded.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(raw) => out.push_str(&decode_text(raw)),
            Node::Element(el) => {
                for child in &el.children {
                    child.collect_text(out);
                }
            }
        }
    }

    pub fn has_visible_text(&self) -> bool {
        self.text_content().chars().any(|c| !c.is_whitespace())
    }
}

impl Element {
    /// Attribute value by case-insensitive name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag == tag
    }

    pub fn has_element_children(&self) -> bool {
        self.children.iter().any(|c| matches!(c, Node::Element(_)))
    }

    /// All descendant elements (not including `self`) matching `pred`, in
    /// document order.
    pub fn descendants<F>(&self, pred: F) -> Vec<&Element>
    where
        F: Fn(&Element) -> bool,
    {
        let mut out = Vec::new();
        let mut stack: Vec<&Element> = self
            .children
            .iter()
            .rev()
            .filter_map(Node::as_element)
            .collect();
        while let Some(el) = stack.pop() {
            if pred(el) {
                out.push(el);
            }
            stack.extend(el.children.iter().rev().filter_map(Node::as_element));
        }
        out
    }
}

/// Turns a markup string into a sequence of sibling top-level nodes.
pub trait MarkupParser: Send + Sync {
    fn parse_fragment(&self, markup: &str) -> Result<Vec<Node>, MarkupError>;
}

/// Default editor-HTML adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlFragmentParser;

struct OpenElement {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
    start: usize,
    inner_start: usize,
}

impl OpenElement {
    fn close(self, markup: &str, inner_end: usize, end: usize) -> Node {
        Node::Element(Element {
            tag: self.tag,
            attrs: self.attrs,
            children: self.children,
            outer_html: markup[self.start..end].to_string(),
            inner_html: markup[self.inner_start..inner_end].to_string(),
        })
    }
}

impl MarkupParser for HtmlFragmentParser {
    fn parse_fragment(&self, markup: &str) -> Result<Vec<Node>, MarkupError> {
        let mut reader = Reader::from_str(markup);
        {
            let config = reader.config_mut();
            config.trim_text(false);
            config.check_end_names = false;
            config.allow_unmatched_ends = true;
            config.expand_empty_elements = false;
        }

        let mut roots: Vec<Node> = Vec::new();
        let mut stack: Vec<OpenElement> = Vec::new();

        loop {
            let before = reader.buffer_position() as usize;
            let event = reader.read_event().map_err(|err| MarkupError::Syntax {
                position: reader.error_position() as usize,
                message: err.to_string(),
            })?;
            let after = reader.buffer_position() as usize;

            match event {
                Event::Start(start) => {
                    let (tag, attrs) = read_tag(&start);
                    if VOID_ELEMENTS.contains(&tag.as_str()) {
                        let el = Node::Element(Element {
                            tag,
                            attrs,
                            children: Vec::new(),
                            outer_html: markup[before..after].to_string(),
                            inner_html: String::new(),
                        });
                        push_node(&mut stack, &mut roots, el);
                    } else {
                        stack.push(OpenElement {
                            tag,
                            attrs,
                            children: Vec::new(),
                            start: before,
                            inner_start: after,
                        });
                    }
                }
                Event::Empty(start) => {
                    let (tag, attrs) = read_tag(&start);
                    let el = Node::Element(Element {
                        tag,
                        attrs,
                        children: Vec::new(),
                        outer_html: markup[before..after].to_string(),
                        inner_html: String::new(),
                    });
                    push_node(&mut stack, &mut roots, el);
                }
                Event::End(end) => {
                    let tag = String::from_utf8_lossy(end.name().as_ref()).to_ascii_lowercase();
                    // Stray end tags (including `</img>`) are ignored; elements
                    // left open inside the matched one close where it closes.
                    if let Some(idx) = stack.iter().rposition(|open| open.tag == tag) {
                        while stack.len() > idx + 1 {
                            if let Some(open) = stack.pop() {
                                let node = open.close(markup, before, before);
                                push_node(&mut stack, &mut roots, node);
                            }
                        }
                        if let Some(open) = stack.pop() {
                            let node = open.close(markup, before, after);
                            push_node(&mut stack, &mut roots, node);
                        }
                    }
                }
                Event::Text(_) => {
                    let node = Node::Text(markup[before..after].to_string());
                    push_node(&mut stack, &mut roots, node);
                }
                Event::CData(data) => {
                    let node = Node::Text(String::from_utf8_lossy(&data).into_owned());
                    push_node(&mut stack, &mut roots, node);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        while let Some(open) = stack.pop() {
            let node = open.close(markup, markup.len(), markup.len());
            push_node(&mut stack, &mut roots, node);
        }

        Ok(roots)
    }
}

fn push_node(stack: &mut [OpenElement], roots: &mut Vec<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

fn read_tag(start: &BytesStart<'_>) -> (String, Vec<(String, String)>) {
    let tag = String::from_utf8_lossy(start.name().as_ref()).to_ascii_lowercase();
    let attrs = start
        .html_attributes()
        .filter_map(Result::ok)
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
            let value = match attr.unescape_value() {
                Ok(v) => v.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            };
            (key, value)
        })
        .collect();
    (tag, attrs)
}

/// Expands XML entities plus `&nbsp;`; anything unknown is kept verbatim.
fn decode_text(raw: &str) -> String {
    match unescape_with(raw, |entity| match entity {
        "nbsp" => Some("\u{a0}"),
        _ => None,
    }) {
        Ok(text) => text.into_owned(),
        Err(_) => raw.to_string(),
    }
}
