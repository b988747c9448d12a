//! Editor markup -> ordered content blocks.
use crate::content::block::{ContentBlock, MediaRef};
use crate::content::markup::{Element, MarkupParser, Node};
use crate::error::{MarkupError, PublishError, ValidationError};

/// Attribute the editor toolbar stamps on images that came from an upload.
pub const MEDIA_ID_ATTR: &str = "data-media-id";

/// What a top-level node turns into. Borrowed from the node tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeShape<'a> {
    Image {
        src: &'a str,
        alt: &'a str,
        title: &'a str,
        media_id: Option<&'a str>,
    },
    Video {
        src: &'a str,
        title: &'a str,
        media_id: Option<&'a str>,
    },
    Quote {
        inner_html: &'a str,
    },
    Text {
        html: &'a str,
    },
}

impl NodeShape<'_> {
    pub fn into_block(self, order: u32) -> ContentBlock {
        match self {
            NodeShape::Image {
                src,
                alt,
                title,
                media_id,
            } => ContentBlock::image(order, src)
                .with_alt_text(alt)
                .with_caption(title)
                .with_media_ref(media_id.map(MediaRef::new)),
            NodeShape::Video {
                src,
                title,
                media_id,
            } => ContentBlock::video(order, src)
                .with_caption(title)
                .with_media_ref(media_id.map(MediaRef::new)),
            NodeShape::Quote { inner_html } => ContentBlock::quote(order, inner_html),
            NodeShape::Text { html } => ContentBlock::text(order, html),
        }
    }
}

/// Classify one top-level node; `None` means the node is dropped.
///
/// Rules, first match wins:
/// 1. an `img`, or a node with exactly one descendant `img`, is an image, and
///    is dropped when its `src` is empty. Other text in the same node is lost.
/// 2. an `iframe`/`video`/`embed`, or a node with exactly one of those, is a
///    video under the same source rule (`<video>` may carry its source in a
///    nested `<source>`).
/// 3. a `blockquote` is a quote carrying its inner markup.
/// 4. anything with visible text or nested tags is text carrying its outer
///    markup; empty wrappers are dropped.
pub fn classify(node: &Node) -> Option<NodeShape<'_>> {
    let el = match node {
        Node::Text(raw) => {
            return node.has_visible_text().then_some(NodeShape::Text { html: raw });
        }
        Node::Element(el) => el,
    };

    if let Some(img) = single(el, is_image) {
        let src = img.attr("src").unwrap_or("").trim();
        if src.is_empty() {
            return None;
        }
        return Some(NodeShape::Image {
            src,
            alt: img.attr("alt").unwrap_or(""),
            title: img.attr("title").unwrap_or(""),
            media_id: media_id(img),
        });
    }

    if let Some(frame) = single(el, is_embed) {
        let src = embed_source(frame);
        if src.is_empty() {
            return None;
        }
        return Some(NodeShape::Video {
            src,
            title: frame.attr("title").unwrap_or(""),
            media_id: media_id(frame),
        });
    }

    if el.is("blockquote") {
        return Some(NodeShape::Quote {
            inner_html: &el.inner_html,
        });
    }

    if node.has_visible_text() || el.has_element_children() {
        return Some(NodeShape::Text {
            html: &el.outer_html,
        });
    }
    None
}

/// Parse editor markup into blocks numbered `0..N-1` in document order.
/// Never fails on content grounds: an input with nothing worth keeping yields
/// an empty list.
pub fn parse_blocks(
    parser: &dyn MarkupParser,
    markup: &str,
) -> Result<Vec<ContentBlock>, MarkupError> {
    let nodes = parser.parse_fragment(markup)?;
    let blocks = nodes
        .iter()
        .filter_map(classify)
        .enumerate()
        .map(|(order, shape)| shape.into_block(order as u32))
        .collect();
    Ok(blocks)
}

/// Like [`parse_blocks`], but non-blank markup that yields no block is
/// reported as [`ValidationError::EmptyArticle`].
pub fn extract_blocks(
    parser: &dyn MarkupParser,
    markup: &str,
) -> Result<Vec<ContentBlock>, PublishError> {
    let blocks = parse_blocks(parser, markup)?;
    if blocks.is_empty() && !markup.trim().is_empty() {
        return Err(ValidationError::EmptyArticle.into());
    }
    Ok(blocks)
}

fn is_image(el: &Element) -> bool {
    el.is("img")
}

fn is_embed(el: &Element) -> bool {
    el.is("iframe") || el.is("video") || el.is("embed")
}

/// `el` itself when it matches, or its only matching descendant.
fn single(el: &Element, pred: fn(&Element) -> bool) -> Option<&Element> {
    if pred(el) {
        return Some(el);
    }
    match el.descendants(pred).as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}

fn embed_source(el: &Element) -> &str {
    let own = el.attr("src").unwrap_or("").trim();
    if !own.is_empty() {
        return own;
    }
    el.descendants(|e| e.is("source"))
        .into_iter()
        .filter_map(|s| s.attr("src"))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or("")
}

fn media_id(el: &Element) -> Option<&str> {
    el.attr(MEDIA_ID_ATTR)
        .map(str::trim)
        .filter(|id| !id.is_empty())
}
