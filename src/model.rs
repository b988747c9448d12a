use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::content::{ContentBlock, MediaRef};

/// Editorial status of an article. Transitions are requested by the client and
/// enforced by the server; see [`ArticleStatus::apply`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArticleStatus {
    Draft,
    PendingReview,
    Approved,
    Published,
    Rejected,
    Archived,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "DRAFT",
            ArticleStatus::PendingReview => "PENDING_REVIEW",
            ArticleStatus::Approved => "APPROVED",
            ArticleStatus::Published => "PUBLISHED",
            ArticleStatus::Rejected => "REJECTED",
            ArticleStatus::Archived => "ARCHIVED",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Some(ArticleStatus::Draft),
            "PENDING_REVIEW" => Some(ArticleStatus::PendingReview),
            "APPROVED" => Some(ArticleStatus::Approved),
            "PUBLISHED" => Some(ArticleStatus::Published),
            "REJECTED" => Some(ArticleStatus::Rejected),
            "ARCHIVED" => Some(ArticleStatus::Archived),
            _ => None,
        }
    }

    /// Content edits are only accepted while the article is with its author or
    /// waiting for review.
    pub fn is_editable(&self) -> bool {
        matches!(self, ArticleStatus::Draft | ArticleStatus::PendingReview)
    }

    /// The status the server is expected to move to for `action`, or `None`
    /// when the transition is not part of the workflow.
    pub fn apply(&self, action: StatusAction) -> Option<ArticleStatus> {
        use ArticleStatus::*;
        match (self, action) {
            (Draft, StatusAction::Submit) => Some(PendingReview),
            (PendingReview, StatusAction::Approve) => Some(Approved),
            (PendingReview, StatusAction::Reject) => Some(Draft),
            (Approved, StatusAction::Publish) => Some(Published),
            (Published, StatusAction::Archive) => Some(Archived),
            _ => None,
        }
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusAction {
    Submit,
    Approve,
    Publish,
    Reject,
    Archive,
}

impl StatusAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusAction::Submit => "submit",
            StatusAction::Approve => "approve",
            StatusAction::Publish => "publish",
            StatusAction::Reject => "reject",
            StatusAction::Archive => "archive",
        }
    }
}

impl fmt::Display for StatusAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Article as returned by the persistence API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArticleRecord {
    pub id: i64,
    #[serde(rename = "titre")]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    pub description: String,
    #[serde(rename = "rubriqueNom", default)]
    pub rubric_name: Option<String>,
    #[serde(rename = "rubriqueId", default)]
    pub rubric_id: Option<i64>,
    #[serde(rename = "auteurNom", default)]
    pub author_name: Option<String>,
    #[serde(rename = "auteurId", default)]
    pub author_id: Option<i64>,
    #[serde(rename = "imageCouvertureUrl", default)]
    pub cover_url: Option<String>,
    #[serde(rename = "imageCouvertureId", default)]
    pub cover_id: Option<i64>,
    #[serde(rename = "blocsContenu", default)]
    pub blocks: Vec<ContentBlock>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "statut")]
    pub status: ArticleStatus,
    #[serde(rename = "datePublication", default, deserialize_with = "lenient_datetime")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(rename = "dateCreation", default, deserialize_with = "lenient_datetime")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "dateModification", default, deserialize_with = "lenient_datetime")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "vues", default)]
    pub views: Option<u64>,
    #[serde(rename = "telechargements", default)]
    pub downloads: Option<u64>,
    #[serde(rename = "partages", default)]
    pub shares: Option<u64>,
    #[serde(rename = "commentaires", default)]
    pub comments: Option<u64>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub visible: Option<bool>,
}

/// Taxonomy node articles are filed under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rubric {
    pub id: i64,
    #[serde(rename = "nom")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(rename = "parentId", default)]
    pub parent_id: Option<i64>,
    #[serde(rename = "ordre", default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub visible: Option<bool>,
    #[serde(rename = "nombreArticles", default)]
    pub article_count: Option<u64>,
    #[serde(rename = "enfants", default)]
    pub children: Vec<Rubric>,
}

impl Rubric {
    /// Depth-first walk of this node and its descendants, paired with depth.
    pub fn walk(&self) -> Vec<(usize, &Rubric)> {
        let mut out = Vec::new();
        let mut stack = vec![(0usize, self)];
        while let Some((depth, node)) = stack.pop() {
            out.push((depth, node));
            for child in node.children.iter().rev() {
                stack.push((depth + 1, child));
            }
        }
        out
    }
}

/// An uploaded asset with its access URL already made absolute.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MediaAsset {
    pub media_ref: Option<MediaRef>,
    pub access_url: String,
    pub original_name: String,
    pub mime_type: String,
    pub content_hash: Option<String>,
}

impl MediaAsset {
    /// Image block the editor inserts for this asset; the original file name
    /// doubles as alt text and caption.
    pub fn image_block(&self, order: u32) -> ContentBlock {
        let mut block = ContentBlock::image(order, self.access_url.clone())
            .with_alt_text(self.original_name.clone())
            .with_caption(self.original_name.clone())
            .with_media_ref(self.media_ref.clone());
        block.asset_url = self.access_url.clone();
        block
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaffUser {
    pub id: i64,
    #[serde(rename = "nom", default)]
    pub last_name: String,
    #[serde(rename = "prenom", default)]
    pub first_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(rename = "dateCreation", default)]
    pub created_at: Option<String>,
    #[serde(rename = "actif", default)]
    pub active: Option<bool>,
}

impl StaffUser {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorStats {
    #[serde(rename = "totalArticles", default)]
    pub total_articles: u64,
    #[serde(rename = "vues", alias = "totalVues", default)]
    pub views: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StaffMember {
    pub user: StaffUser,
    pub stats: AuthorStats,
}

/// One page of a server-side paged listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
    #[serde(rename = "totalElements", default)]
    pub total_elements: Option<u64>,
    #[serde(rename = "totalPages", default)]
    pub total_pages: Option<u64>,
    #[serde(default)]
    pub number: Option<u64>,
}

/// Accepts RFC 3339 timestamps as well as zone-less ones (read as UTC).
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn workflow_transitions() {
        use ArticleStatus::*;
        assert_eq!(Draft.apply(StatusAction::Submit), Some(PendingReview));
        assert_eq!(PendingReview.apply(StatusAction::Approve), Some(Approved));
        assert_eq!(PendingReview.apply(StatusAction::Reject), Some(Draft));
        assert_eq!(Approved.apply(StatusAction::Publish), Some(Published));
        assert_eq!(Published.apply(StatusAction::Archive), Some(Archived));

        assert_eq!(Draft.apply(StatusAction::Publish), None);
        assert_eq!(Archived.apply(StatusAction::Submit), None);
        assert_eq!(Published.apply(StatusAction::Reject), None);
    }

    #[test]
    fn only_draft_and_pending_are_editable() {
        assert!(ArticleStatus::Draft.is_editable());
        assert!(ArticleStatus::PendingReview.is_editable());
        assert!(!ArticleStatus::Approved.is_editable());
        assert!(!ArticleStatus::Published.is_editable());
        assert!(!ArticleStatus::Archived.is_editable());
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(
            serde_json::to_value(ArticleStatus::PendingReview).unwrap(),
            json!("PENDING_REVIEW")
        );
        let s: ArticleStatus = serde_json::from_value(json!("ARCHIVED")).unwrap();
        assert_eq!(s, ArticleStatus::Archived);
        assert_eq!(ArticleStatus::parse_status(" draft "), Some(ArticleStatus::Draft));
        assert_eq!(ArticleStatus::parse_status("UNKNOWN"), None);
    }

    #[test]
    fn article_record_reads_backend_shape() {
        let raw = json!({
            "id": 12,
            "titre": "Un titre assez long",
            "slug": "un-titre",
            "description": "desc",
            "rubriqueId": 3,
            "blocsContenu": [
                { "id": 1, "type": "TEXTE", "contenu": "<p>a</p>", "ordre": 0,
                  "legende": "", "altText": "", "url": "", "mediaId": null, "articleId": 12 },
                { "id": 2, "type": "IMAGE", "contenu": "x.jpg", "ordre": 1,
                  "legende": "cap", "altText": "alt", "url": "http://m/x.jpg", "mediaId": 44, "articleId": 12 }
            ],
            "statut": "DRAFT",
            "dateCreation": "2025-03-01T10:15:00",
            "datePublication": null,
            "vues": 7
        });
        let article: ArticleRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(article.id, 12);
        assert_eq!(article.status, ArticleStatus::Draft);
        assert_eq!(article.blocks.len(), 2);
        assert_eq!(article.blocks[1].media_ref, Some(MediaRef::new("44")));
        assert!(article.created_at.is_some());
        assert!(article.published_at.is_none());
        assert_eq!(article.views, Some(7));
    }

    #[test]
    fn rubric_walk_is_depth_first() {
        let tree: Rubric = serde_json::from_value(json!({
            "id": 1, "nom": "Economie",
            "enfants": [
                { "id": 2, "nom": "Finance", "enfants": [ { "id": 4, "nom": "Banques" } ] },
                { "id": 3, "nom": "Commerce" }
            ]
        }))
        .unwrap();
        let names: Vec<(usize, &str)> = tree
            .walk()
            .into_iter()
            .map(|(d, r)| (d, r.name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![(0, "Economie"), (1, "Finance"), (2, "Banques"), (1, "Commerce")]
        );
    }

    #[test]
    fn author_stats_accepts_both_view_names() {
        let a: AuthorStats = serde_json::from_value(json!({ "totalArticles": 3, "vues": 10 })).unwrap();
        let b: AuthorStats = serde_json::from_value(json!({ "totalArticles": 3, "totalVues": 10 })).unwrap();
        assert_eq!(a, b);
    }
}
