//! Draft metadata + blocks -> the exact payload the persistence API expects.
//!
//! Validation happens here so that invalid drafts never reach the network.
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::content::{extract_blocks, ContentBlock, MarkupParser, MediaRef};
use crate::error::{PublishError, ValidationError};
use crate::model::{ArticleRecord, ArticleStatus};

pub const TITLE_MIN: usize = 10;
pub const TITLE_MAX: usize = 200;
pub const DESCRIPTION_MIN: usize = 50;
pub const DESCRIPTION_MAX: usize = 500;

/// An article being authored. Lives in memory until the first successful
/// create assigns `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleDraft {
    /// Client-side identity, stable across create and later updates.
    pub local_key: Uuid,
    pub id: Option<i64>,
    pub title: String,
    pub description: String,
    pub rubric_id: Option<i64>,
    pub author_id: i64,
    pub cover_media_id: Option<i64>,
    pub region: String,
    pub blocks: Vec<ContentBlock>,
    pub tag_ids: BTreeSet<i64>,
    /// Tag names the article carried when it was loaded. The API only
    /// returns names, so these are not sent back.
    pub loaded_tags: Vec<String>,
    pub status: ArticleStatus,
    pub visible: bool,
    pub publish_date: Option<DateTime<Utc>>,
}

impl ArticleDraft {
    pub fn new(author_id: i64, region: impl Into<String>) -> Self {
        ArticleDraft {
            local_key: Uuid::new_v4(),
            id: None,
            title: String::new(),
            description: String::new(),
            rubric_id: None,
            author_id,
            cover_media_id: None,
            region: region.into(),
            blocks: Vec::new(),
            tag_ids: BTreeSet::new(),
            loaded_tags: Vec::new(),
            status: ArticleStatus::Draft,
            visible: false,
            publish_date: None,
        }
    }

    /// Draft for re-editing an article loaded from the API. Tags come back as
    /// names only, so tag ids start empty.
    pub fn from_record(record: &ArticleRecord) -> Self {
        ArticleDraft {
            local_key: Uuid::new_v4(),
            id: Some(record.id),
            title: record.title.clone(),
            description: record.description.clone(),
            rubric_id: record.rubric_id,
            author_id: record.author_id.unwrap_or_default(),
            cover_media_id: record.cover_id,
            region: record.region.clone().unwrap_or_default(),
            blocks: record.blocks.clone(),
            tag_ids: BTreeSet::new(),
            loaded_tags: record.tags.clone(),
            status: record.status,
            visible: record.visible.unwrap_or(false),
            publish_date: record.published_at,
        }
    }

    /// Tags the next save will drop: the loaded ones, unless tag ids have
    /// been set again. Saving always sends the full `tagIds` list.
    pub fn tags_to_clear(&self) -> &[String] {
        if self.tag_ids.is_empty() {
            &self.loaded_tags
        } else {
            &[]
        }
    }

    /// Replace the body with blocks extracted from editor markup. Full
    /// extraction every time; nothing is diffed against the previous body.
    pub fn set_markup(
        &mut self,
        parser: &dyn MarkupParser,
        markup: &str,
    ) -> Result<(), PublishError> {
        self.blocks = extract_blocks(parser, markup)?;
        Ok(())
    }
}

/// Wire shape for create and update.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ArticlePayload {
    #[serde(rename = "titre")]
    pub title: String,
    pub description: String,
    #[serde(rename = "rubriqueId")]
    pub rubric_id: i64,
    #[serde(rename = "auteurId")]
    pub author_id: i64,
    #[serde(rename = "imageCouvertureId")]
    pub cover_media_id: Option<i64>,
    pub region: String,
    #[serde(rename = "blocsContenu")]
    pub blocks: Vec<ContentBlock>,
    #[serde(rename = "tagIds")]
    pub tag_ids: Vec<i64>,
    #[serde(rename = "statut")]
    pub status: ArticleStatus,
    pub visible: bool,
    #[serde(rename = "datePublication")]
    pub publish_date: Option<DateTime<Utc>>,
}

/// Check a draft before it is sent anywhere. The first failing rule wins.
///
/// Rules run as title, description, rubric, then body. Upper bounds are
/// checked right after their lower bound.
pub fn validate(draft: &ArticleDraft) -> Result<(), ValidationError> {
    let title = draft.title.trim().chars().count();
    if title < TITLE_MIN {
        return Err(ValidationError::TitleTooShort { min: TITLE_MIN });
    }
    if title > TITLE_MAX {
        return Err(ValidationError::TitleTooLong { max: TITLE_MAX });
    }

    let description = draft.description.trim().chars().count();
    if description < DESCRIPTION_MIN {
        return Err(ValidationError::DescriptionTooShort {
            min: DESCRIPTION_MIN,
        });
    }
    if description > DESCRIPTION_MAX {
        return Err(ValidationError::DescriptionTooLong {
            max: DESCRIPTION_MAX,
        });
    }

    if !matches!(draft.rubric_id, Some(id) if id != 0) {
        return Err(ValidationError::CategoryRequired);
    }

    if draft.blocks.is_empty() {
        return Err(ValidationError::EmptyArticle);
    }
    Ok(())
}

/// Payload for the first create call: blocks point at article 0 and the
/// article starts hidden.
pub fn assemble_create(draft: &ArticleDraft) -> Result<ArticlePayload, ValidationError> {
    let mut payload = assemble(draft, 0)?;
    payload.visible = false;
    Ok(payload)
}

/// Payload for updating the persisted article `id`.
pub fn assemble_update(draft: &ArticleDraft, id: i64) -> Result<ArticlePayload, ValidationError> {
    assemble(draft, id)
}

fn assemble(draft: &ArticleDraft, article_id: i64) -> Result<ArticlePayload, ValidationError> {
    validate(draft)?;
    Ok(ArticlePayload {
        title: draft.title.clone(),
        description: draft.description.clone(),
        rubric_id: draft.rubric_id.unwrap_or_default(),
        author_id: draft.author_id,
        cover_media_id: draft.cover_media_id.filter(|id| *id != 0),
        region: draft.region.clone(),
        blocks: normalize_blocks(&draft.blocks, article_id),
        tag_ids: draft.tag_ids.iter().copied().collect(),
        status: draft.status,
        visible: draft.visible,
        publish_date: draft.publish_date,
    })
}

/// Renumber blocks by position and apply field defaults. Whatever order
/// values came in are discarded.
pub fn normalize_blocks(blocks: &[ContentBlock], article_id: i64) -> Vec<ContentBlock> {
    blocks
        .iter()
        .enumerate()
        .map(|(idx, block)| ContentBlock {
            id: None,
            order: idx as u32,
            media_ref: legacy_media_ref(block.media_ref.clone()),
            article_id,
            ..block.clone()
        })
        .collect()
}

/// Compatibility shim: the upload integration has returned `0` for failed or
/// placeholder uploads, so `"0"` (and blank) mean "no reference".
// TODO: remove once uploads stop answering with a zero id.
pub fn legacy_media_ref(media_ref: Option<MediaRef>) -> Option<MediaRef> {
    media_ref.filter(|r| {
        let id = r.as_str().trim();
        !id.is_empty() && id != "0"
    })
}
