//! Content blocks -> editor markup.
use crate::content::block::{BlockKind, ContentBlock};
use crate::content::parser::MEDIA_ID_ATTR;

/// Rebuild a single markup string from server blocks, for loading back into
/// the editor. Blocks are emitted by ascending `order`; equal orders keep
/// their array position.
pub fn render_blocks(blocks: &[ContentBlock]) -> String {
    let mut sorted: Vec<&ContentBlock> = blocks.iter().collect();
    sorted.sort_by_key(|b| b.order);

    let mut out = String::new();
    for block in sorted {
        render_block(block, &mut out);
    }
    out
}

fn render_block(block: &ContentBlock, out: &mut String) {
    match block.kind {
        BlockKind::Text => out.push_str(&block.content),
        BlockKind::Quote => {
            out.push_str("<blockquote>");
            out.push_str(&block.content);
            out.push_str("</blockquote>");
        }
        BlockKind::Image => {
            out.push_str(&format!(
                "<img src=\"{}\" alt=\"{}\" title=\"{}\"",
                html_attr(block.source_url()),
                html_attr(&block.alt_text),
                html_attr(&block.caption)
            ));
            push_media_id(block, out);
            out.push_str(" />");
        }
        BlockKind::Video => {
            out.push_str(&format!(
                "<iframe src=\"{}\" title=\"{}\"",
                html_attr(block.source_url()),
                html_attr(&block.caption)
            ));
            push_media_id(block, out);
            out.push_str(" allowfullscreen></iframe>");
        }
    }
}

fn push_media_id(block: &ContentBlock, out: &mut String) {
    if let Some(id) = &block.media_ref {
        out.push_str(&format!(" {}=\"{}\"", MEDIA_ID_ATTR, html_attr(id.as_str())));
    }
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn html_attr(s: &str) -> String {
    html_escape(s).replace('"', "&quot;")
}
