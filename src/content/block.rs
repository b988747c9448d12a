use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Closed set of content block kinds, with their backend wire names.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BlockKind {
    #[serde(rename = "TEXTE")]
    Text,
    #[serde(rename = "IMAGE")]
    Image,
    #[serde(rename = "CITATION")]
    Quote,
    #[serde(rename = "VIDEO")]
    Video,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Text => "TEXTE",
            BlockKind::Image => "IMAGE",
            BlockKind::Quote => "CITATION",
            BlockKind::Video => "VIDEO",
        }
    }
}

/// Identifier of an uploaded asset. The backend has used both numeric and
/// string identifiers, so both are accepted on read; it is always written as a
/// string.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MediaRef(String);

impl MediaRef {
    pub fn new(id: impl Into<String>) -> Self {
        MediaRef(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MediaRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => MediaRef(s),
            Raw::Int(n) => MediaRef(n.to_string()),
        })
    }
}

/// One atomic unit of article body content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentBlock {
    /// Server-side block id, present on blocks read back from the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    #[serde(rename = "ordre", default)]
    pub order: u32,
    /// HTML fragment for text and quotes, a URL for media without an asset.
    #[serde(rename = "contenu", default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(rename = "legende", default, deserialize_with = "null_as_empty")]
    pub caption: String,
    #[serde(rename = "altText", default, deserialize_with = "null_as_empty")]
    pub alt_text: String,
    #[serde(rename = "url", default, deserialize_with = "null_as_empty")]
    pub asset_url: String,
    #[serde(rename = "mediaId", default)]
    pub media_ref: Option<MediaRef>,
    /// Owning article; 0 until the article is persisted.
    #[serde(rename = "articleId", default)]
    pub article_id: i64,
}

impl ContentBlock {
    fn bare(kind: BlockKind, order: u32, content: String) -> Self {
        ContentBlock {
            id: None,
            kind,
            order,
            content,
            caption: String::new(),
            alt_text: String::new(),
            asset_url: String::new(),
            media_ref: None,
            article_id: 0,
        }
    }

    pub fn text(order: u32, html: impl Into<String>) -> Self {
        Self::bare(BlockKind::Text, order, html.into())
    }

    pub fn quote(order: u32, inner_html: impl Into<String>) -> Self {
        Self::bare(BlockKind::Quote, order, inner_html.into())
    }

    pub fn image(order: u32, src: impl Into<String>) -> Self {
        Self::bare(BlockKind::Image, order, src.into())
    }

    pub fn video(order: u32, src: impl Into<String>) -> Self {
        Self::bare(BlockKind::Video, order, src.into())
    }

    pub fn with_alt_text(mut self, alt: impl Into<String>) -> Self {
        self.alt_text = alt.into();
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    pub fn with_media_ref(mut self, media_ref: Option<MediaRef>) -> Self {
        self.media_ref = media_ref;
        self
    }

    /// URL a media block should be displayed from: the asset URL when set,
    /// otherwise the raw content.
    pub fn source_url(&self) -> &str {
        if self.asset_url.trim().is_empty() {
            &self.content
        } else {
            &self.asset_url
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
