//! Article body model and its two-way mapping to editor markup.
//!
//! - `block`: the content block types shared with the persistence API.
//! - `markup`: the swappable markup-parsing seam and its default adapter.
//! - `parser`: markup -> ordered blocks.
//! - `render`: blocks -> markup for re-editing.

pub mod block;
pub mod markup;
pub mod parser;
pub mod render;

pub use block::{BlockKind, ContentBlock, MediaRef};
pub use markup::{HtmlFragmentParser, MarkupParser, Node};
pub use parser::{classify, extract_blocks, parse_blocks, NodeShape};
pub use render::render_blocks;
