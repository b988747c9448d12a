use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{Client, Method, Request, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::{PublishError, Result};
use crate::model::{
    ArticleRecord, ArticleStatus, AuthorStats, MediaAsset, Page, Rubric, StaffMember, StaffUser,
    StatusAction,
};
use crate::payload::{legacy_media_ref, ArticlePayload};

use self::model::UploadResp;

pub mod model;

/// Review-side status change. Submission goes through
/// [`ArticleApi::submit_for_review`] because it is keyed by author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Approve,
    Publish,
    Reject { reason: String },
    Archive,
}

impl Transition {
    pub fn action(&self) -> StatusAction {
        match self {
            Transition::Approve => StatusAction::Approve,
            Transition::Publish => StatusAction::Publish,
            Transition::Reject { .. } => StatusAction::Reject,
            Transition::Archive => StatusAction::Archive,
        }
    }
}

/// The persistence API as seen by the publishing workflow.
#[async_trait]
pub trait ArticleApi: Send + Sync {
    async fn create_article(&self, payload: &ArticlePayload) -> Result<ArticleRecord>;

    /// `None` when the server answered without a body; the caller re-fetches.
    async fn update_article(&self, id: i64, payload: &ArticlePayload)
        -> Result<Option<ArticleRecord>>;

    async fn get_article(&self, id: i64) -> Result<ArticleRecord>;

    async fn submit_for_review(&self, id: i64, author_id: i64) -> Result<ArticleRecord>;

    async fn transition(&self, id: i64, transition: &Transition) -> Result<()>;

    async fn upload_media(&self, file_name: &str, mime_type: &str, bytes: Vec<u8>)
        -> Result<MediaAsset>;
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    media_base_url: Url,
    token: Option<String>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("media_base_url", &self.media_base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(
        base_url: Url,
        media_base_url: Url,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("tody-press/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(PublishError::transport)?;
        Ok(Self {
            http,
            base_url: with_trailing_slash(base_url),
            media_base_url: with_trailing_slash(media_base_url),
            token,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = Url::parse(cfg.api.base_url.trim())
            .map_err(|e| PublishError::Transport(format!("invalid api.base_url: {e}")))?;
        let media_base_url = Url::parse(cfg.api.media_base_url.trim())
            .map_err(|e| PublishError::Transport(format!("invalid api.media_base_url: {e}")))?;
        Self::new(
            base_url,
            media_base_url,
            cfg.token().map(str::to_string),
            cfg.api_timeout(),
        )
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| PublishError::Transport(format!("invalid endpoint {path}: {e}")))
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Build an authorized request for `path`, with an optional JSON body.
    pub fn build_request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Request> {
        let mut builder = self.request(method, self.endpoint(path)?);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder.build().map_err(PublishError::transport)
    }

    /// Execute `request`, turning transport failures and non-success statuses
    /// into a single readable error.
    async fn execute(&self, request: Request) -> Result<Response> {
        let label = format!("{} {}", request.method(), request.url().path());
        debug!(url = %request.url(), "=== API REQUEST ===");
        for (name, value) in request.headers() {
            if name.as_str().eq_ignore_ascii_case("authorization") {
                debug!("  {}: Bearer [REDACTED]", name);
            } else {
                debug!("  {}: {}", name, value.to_str().unwrap_or("[invalid]"));
            }
        }

        let res = self
            .http
            .execute(request)
            .await
            .map_err(|e| PublishError::Transport(format!("{label} failed: {e}")))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, body = %body, "{} rejected", label);
            return Err(PublishError::Transport(format!(
                "{label} failed with {status}: {body}"
            )));
        }
        info!(%status, "{}", label);
        Ok(res)
    }

    async fn read_json<T: DeserializeOwned>(endpoint: &str, res: Response) -> Result<T> {
        let body = res
            .text()
            .await
            .map_err(|e| PublishError::malformed(endpoint, e))?;
        serde_json::from_str(&body).map_err(|e| PublishError::malformed(endpoint, e))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.build_request(Method::GET, path, None)?;
        let res = self.execute(request).await?;
        Self::read_json(path, res).await
    }

    async fn get_json_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let request = self
            .request(Method::GET, self.endpoint(path)?)
            .query(query)
            .build()
            .map_err(PublishError::transport)?;
        let res = self.execute(request).await?;
        Self::read_json(path, res).await
    }

    #[instrument(skip(self))]
    pub async fn delete_article(&self, id: i64) -> Result<()> {
        let request = self.build_request(Method::DELETE, &format!("articles/{id}"), None)?;
        self.execute(request).await?;
        info!(id, "article deleted");
        Ok(())
    }

    pub async fn rubric_tree(&self) -> Result<Vec<Rubric>> {
        self.get_json("rubriques").await
    }

    #[instrument(skip(self))]
    pub async fn create_rubric(&self, name: &str) -> Result<Rubric> {
        let body = json!({ "nom": name, "visible": true });
        let request = self.build_request(Method::POST, "rubriques", Some(&body))?;
        let res = self.execute(request).await?;
        Self::read_json("rubriques", res).await
    }

    pub async fn author_drafts(&self, author_id: i64) -> Result<Vec<ArticleRecord>> {
        self.get_json(&format!("redacteur/{author_id}/articles/brouillons"))
            .await
    }

    pub async fn author_published(&self, author_id: i64) -> Result<Vec<ArticleRecord>> {
        self.get_json(&format!("redacteur/{author_id}/articles/publies"))
            .await
    }

    pub async fn author_articles(
        &self,
        author_id: i64,
        page: u32,
        size: u32,
    ) -> Result<Page<ArticleRecord>> {
        self.get_json_query(
            &format!("redacteur/{author_id}/articles"),
            &paging(page, size),
        )
        .await
    }

    pub async fn articles_by_status(
        &self,
        status: ArticleStatus,
        page: u32,
        size: u32,
    ) -> Result<Page<ArticleRecord>> {
        self.get_json_query(
            &format!("articles/by-status/{}", status.as_str()),
            &paging(page, size),
        )
        .await
    }

    pub async fn staff(&self) -> Result<Vec<StaffUser>> {
        self.get_json("utilisateurs/redacteurs").await
    }

    pub async fn all_users(&self) -> Result<Vec<StaffUser>> {
        self.get_json("utilisateurs/all").await
    }

    pub async fn author_stats(&self, author_id: i64) -> Result<AuthorStats> {
        self.get_json(&format!("articles/author/{author_id}/stats"))
            .await
    }

    /// Staff users with their stats, fetched concurrently. A failed stats call
    /// leaves that member at zero instead of failing the listing.
    #[instrument(skip(self))]
    pub async fn team_directory(&self) -> Result<Vec<StaffMember>> {
        let users = self.staff().await?;
        let stats = join_all(users.iter().map(|u| self.author_stats(u.id))).await;
        Ok(users
            .into_iter()
            .zip(stats)
            .map(|(user, stats)| {
                let stats = stats.unwrap_or_else(|err| {
                    warn!(?err, user_id = user.id, "author stats unavailable");
                    AuthorStats::default()
                });
                StaffMember { user, stats }
            })
            .collect())
    }

    pub fn resolve_media_url(&self, access_url: &str, content_hash: Option<&str>) -> String {
        resolve_media_url(&self.base_url, &self.media_base_url, access_url, content_hash)
    }
}

#[async_trait]
impl ArticleApi for ApiClient {
    #[instrument(skip_all)]
    async fn create_article(&self, payload: &ArticlePayload) -> Result<ArticleRecord> {
        let body = serde_json::to_value(payload).map_err(|e| PublishError::malformed("articles", e))?;
        let request = self.build_request(Method::POST, "articles", Some(&body))?;
        let res = self.execute(request).await?;
        let record: ArticleRecord = Self::read_json("articles", res).await?;
        info!(id = record.id, "article created");
        Ok(record)
    }

    #[instrument(skip(self, payload))]
    async fn update_article(
        &self,
        id: i64,
        payload: &ArticlePayload,
    ) -> Result<Option<ArticleRecord>> {
        let path = format!("articles/{id}");
        let body = serde_json::to_value(payload).map_err(|e| PublishError::malformed(&path, e))?;
        let request = self.build_request(Method::PUT, &path, Some(&body))?;
        let res = self.execute(request).await?;
        if res.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Self::read_json(&path, res).await.map(Some)
    }

    #[instrument(skip(self))]
    async fn get_article(&self, id: i64) -> Result<ArticleRecord> {
        self.get_json(&format!("articles/{id}")).await
    }

    #[instrument(skip(self))]
    async fn submit_for_review(&self, id: i64, author_id: i64) -> Result<ArticleRecord> {
        let path = format!("redacteur/{author_id}/articles/{id}/submit");
        let request = self.build_request(Method::POST, &path, None)?;
        let res = self.execute(request).await?;
        Self::read_json(&path, res).await
    }

    #[instrument(skip(self))]
    async fn transition(&self, id: i64, transition: &Transition) -> Result<()> {
        let path = format!("articles/{id}/{}", transition.action().as_str());
        let url = self.endpoint(&path)?;
        let mut builder = self.request(Method::PATCH, url);
        builder = match transition {
            Transition::Reject { reason } => builder.query(&[("motif", reason.as_str())]),
            _ => builder.json(&json!({})),
        };
        let request = builder.build().map_err(PublishError::transport)?;
        self.execute(request).await?;
        Ok(())
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload_media(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<MediaAsset> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(PublishError::transport)?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let request = self
            .request(Method::POST, self.endpoint("media/upload")?)
            .query(&[("altText", file_name), ("legende", file_name)])
            .multipart(form)
            .build()
            .map_err(PublishError::transport)?;
        let res = self.execute(request).await?;
        let raw: UploadResp = Self::read_json("media/upload", res).await?;

        let access_url = self.resolve_media_url(
            raw.access_url.as_deref().unwrap_or(""),
            raw.content_hash.as_deref(),
        );
        let asset = MediaAsset {
            media_ref: legacy_media_ref(raw.id),
            access_url,
            original_name: raw
                .original_name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| file_name.to_string()),
            mime_type: raw
                .mime_type
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| mime_type.to_string()),
            content_hash: raw.content_hash,
        };
        info!(media_ref = ?asset.media_ref, url = %asset.access_url, "media uploaded");
        Ok(asset)
    }
}

/// Make an upload's access URL absolute.
///
/// Absolute URLs are kept. Server paths (`/uploads/...`, `.../media/file/...`)
/// are resolved against the API server's origin. Anything else falls back to
/// `media_base_url + hash` when a hash is known.
pub fn resolve_media_url(
    api_base: &Url,
    media_base: &Url,
    access_url: &str,
    content_hash: Option<&str>,
) -> String {
    let access_url = access_url.trim();
    let lower = access_url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return access_url.to_string();
    }
    if access_url.starts_with("/uploads/") || access_url.contains("/media/file/") {
        let path = if access_url.starts_with('/') {
            access_url.to_string()
        } else {
            format!("/{access_url}")
        };
        if let Ok(url) = api_base.join(&path) {
            return url.to_string();
        }
    }
    if let Some(hash) = content_hash.map(str::trim).filter(|h| !h.is_empty()) {
        if let Ok(url) = media_base.join(hash) {
            return url.to_string();
        }
    }
    access_url.to_string()
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn paging(page: u32, size: u32) -> Vec<(&'static str, String)> {
    vec![
        ("page", page.to_string()),
        ("size", size.to_string()),
        ("sort", "updatedAt,desc".to_string()),
    ]
}

pub fn content_type_for(file_path: &Path) -> &'static str {
    match file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_ascii_lowercase())
    {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "webp" => "image/webp",
        Some(ext) if ext == "mp4" => "video/mp4",
        Some(ext) if ext == "webm" => "video/webm",
        Some(ext) if ext == "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(token: Option<&str>) -> ApiClient {
        ApiClient::new(
            Url::parse("http://api.test:8080/api/v1").unwrap(),
            Url::parse("http://api.test:8080/api/v1/media/file/").unwrap(),
            token.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn build_request_sets_headers() {
        let client = client(Some("token"));
        let body = json!({ "sample": true });
        let request = client
            .build_request(Method::POST, "articles", Some(&body))
            .unwrap();
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.url().path(), "/api/v1/articles");
        let headers = request.headers();
        assert_eq!(
            headers
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "Bearer token"
        );
        assert_eq!(
            headers
                .get("Content-Type")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "application/json"
        );
    }

    #[test]
    fn anonymous_requests_carry_no_authorization() {
        let request = client(None)
            .build_request(Method::GET, "rubriques", None)
            .unwrap();
        assert!(request.headers().get("Authorization").is_none());
        assert_eq!(request.url().path(), "/api/v1/rubriques");
    }

    #[test]
    fn debug_output_hides_token() {
        let rendered = format!("{:?}", client(Some("secret-token")));
        assert!(!rendered.contains("secret-token"));
    }

    #[test]
    fn media_url_resolution() {
        let api = Url::parse("http://api.test:8080/api/v1/").unwrap();
        let media = Url::parse("https://cdn.test/files/").unwrap();

        assert_eq!(
            resolve_media_url(&api, &media, "https://elsewhere/x.jpg", Some("abc")),
            "https://elsewhere/x.jpg"
        );
        assert_eq!(
            resolve_media_url(&api, &media, "/api/v1/media/file/abc.jpg", None),
            "http://api.test:8080/api/v1/media/file/abc.jpg"
        );
        assert_eq!(
            resolve_media_url(&api, &media, "/uploads/pic.png", None),
            "http://api.test:8080/uploads/pic.png"
        );
        assert_eq!(
            resolve_media_url(&api, &media, "pic.png", Some("deadbeef")),
            "https://cdn.test/files/deadbeef"
        );
        assert_eq!(resolve_media_url(&api, &media, "", None), "");
    }

    #[test]
    fn transition_paths() {
        assert_eq!(Transition::Approve.action().as_str(), "approve");
        assert_eq!(
            Transition::Reject {
                reason: "x".into()
            }
            .action(),
            StatusAction::Reject
        );
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for(Path::new("a/B.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("clip.mp4")), "video/mp4");
        assert_eq!(content_type_for(Path::new("notes")), "application/octet-stream");
    }
}
