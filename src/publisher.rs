//! Draft saving, submission and review transitions on top of [`ArticleApi`].
//!
//! The server owns status: after any transition the article is re-read and
//! the returned record is what callers see.
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::api::{ArticleApi, Transition};
use crate::content::{render_blocks, MarkupParser};
use crate::error::{PublishError, Result};
use crate::model::{ArticleRecord, ArticleStatus, MediaAsset, StatusAction};
use crate::payload::{assemble_create, assemble_update, ArticleDraft};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum InFlightKey {
    Draft(Uuid),
    Article(i64),
}

/// Releases its key when dropped, including when the request future is.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<InFlightKey>>,
    key: InFlightKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.key);
    }
}

pub struct Publisher {
    api: Arc<dyn ArticleApi>,
    parser: Arc<dyn MarkupParser>,
    in_flight: Mutex<HashSet<InFlightKey>>,
}

impl Publisher {
    pub fn new(api: Arc<dyn ArticleApi>, parser: Arc<dyn MarkupParser>) -> Self {
        Self {
            api,
            parser,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn begin(&self, key: InFlightKey) -> Result<InFlightGuard<'_>> {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(key) {
            return Err(PublishError::InFlight);
        }
        Ok(InFlightGuard {
            set: &self.in_flight,
            key,
        })
    }

    fn draft_key(draft: &ArticleDraft) -> InFlightKey {
        match draft.id {
            Some(id) => InFlightKey::Article(id),
            None => InFlightKey::Draft(draft.local_key),
        }
    }

    /// Whether a request for this draft is currently outstanding.
    pub fn is_in_flight(&self, draft: &ArticleDraft) -> bool {
        let set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        set.contains(&Self::draft_key(draft))
    }

    /// Extract blocks from editor markup into the draft, then save it.
    pub async fn save_markup(
        &self,
        draft: &mut ArticleDraft,
        markup: &str,
    ) -> Result<ArticleRecord> {
        draft.set_markup(self.parser.as_ref(), markup)?;
        self.save_draft(draft).await
    }

    /// Create the article on first save, update it afterwards. The draft picks
    /// up the server-assigned id and status.
    #[instrument(skip_all, fields(local_key = %draft.local_key, id = ?draft.id))]
    pub async fn save_draft(&self, draft: &mut ArticleDraft) -> Result<ArticleRecord> {
        if !draft.status.is_editable() {
            return Err(PublishError::ReadOnly(draft.status));
        }
        let record = match draft.id {
            None => {
                let payload = assemble_create(draft)?;
                let _guard = self.begin(Self::draft_key(draft))?;
                let record = self.api.create_article(&payload).await?;
                info!(id = record.id, "draft created");
                record
            }
            Some(id) => {
                let payload = assemble_update(draft, id)?;
                let _guard = self.begin(InFlightKey::Article(id))?;
                match self.api.update_article(id, &payload).await? {
                    Some(record) => record,
                    None => self.api.get_article(id).await?,
                }
            }
        };
        draft.id = Some(record.id);
        draft.status = record.status;
        Ok(record)
    }

    /// Hand a saved draft to the review queue.
    #[instrument(skip_all, fields(id = ?draft.id))]
    pub async fn submit(&self, draft: &mut ArticleDraft) -> Result<ArticleRecord> {
        let id = draft.id.ok_or(PublishError::MissingId)?;
        if draft.status.apply(StatusAction::Submit).is_none() {
            return Err(PublishError::IllegalTransition {
                action: StatusAction::Submit,
                from: draft.status,
            });
        }
        let _guard = self.begin(InFlightKey::Article(id))?;
        let record = self.api.submit_for_review(id, draft.author_id).await?;
        if record.status != ArticleStatus::PendingReview {
            warn!(status = %record.status, "server kept article out of review");
        }
        draft.status = record.status;
        Ok(record)
    }

    /// Request a review-side transition for `current`, then re-read the
    /// article so the caller sees the server's status.
    #[instrument(skip_all, fields(id = current.id, action = %transition.action()))]
    pub async fn transition(
        &self,
        current: &ArticleRecord,
        transition: Transition,
    ) -> Result<ArticleRecord> {
        let action = transition.action();
        if current.status.apply(action).is_none() {
            return Err(PublishError::IllegalTransition {
                action,
                from: current.status,
            });
        }
        let _guard = self.begin(InFlightKey::Article(current.id))?;
        self.api.transition(current.id, &transition).await?;
        let fresh = self.api.get_article(current.id).await?;
        info!(status = %fresh.status, "transition applied");
        Ok(fresh)
    }

    /// Load a persisted article for editing: the draft plus the markup to put
    /// back into the editor.
    pub async fn open_for_edit(&self, id: i64) -> Result<(ArticleDraft, String)> {
        let record = self.api.get_article(id).await?;
        let markup = render_blocks(&record.blocks);
        Ok((ArticleDraft::from_record(&record), markup))
    }

    /// Upload an image and return the asset with the markup to insert.
    pub async fn upload_image(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(MediaAsset, String)> {
        let asset = self.api.upload_media(file_name, mime_type, bytes).await?;
        let markup = render_blocks(&[asset.image_block(0)]);
        Ok((asset, markup))
    }
}
