use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tody_press::api::{ArticleApi, Transition};
use tody_press::content::{HtmlFragmentParser, MediaRef};
use tody_press::model::{ArticleRecord, ArticleStatus, MediaAsset, StatusAction};
use tody_press::payload::{ArticleDraft, ArticlePayload};
use tody_press::publisher::Publisher;
use tody_press::{PublishError, Result};
use tokio::sync::{Mutex, Notify};

const BODY: &str = "<p>Le conseil municipal a voté le budget.</p><blockquote>Une étape</blockquote>";

/// In-memory stand-in for the persistence API. Records every call and keeps
/// the articles it has been sent.
#[derive(Clone, Default)]
struct RecordingApi {
    calls: Arc<Mutex<Vec<String>>>,
    payloads: Arc<Mutex<Vec<ArticlePayload>>>,
    articles: Arc<Mutex<HashMap<i64, ArticleRecord>>>,
    failures: Arc<Mutex<VecDeque<String>>>,
    /// Status the server settles on after a transition, regardless of the
    /// requested action.
    forced_status: Option<ArticleStatus>,
    update_without_body: bool,
    create_gate: Option<Arc<Notify>>,
}

impl RecordingApi {
    fn failing(messages: Vec<&str>) -> Self {
        Self {
            failures: Arc::new(Mutex::new(messages.into_iter().map(String::from).collect())),
            ..Default::default()
        }
    }

    async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    async fn payloads(&self) -> Vec<ArticlePayload> {
        self.payloads.lock().await.clone()
    }

    async fn record_call(&self, call: String) -> Result<()> {
        self.calls.lock().await.push(call);
        match self.failures.lock().await.pop_front() {
            Some(message) => Err(PublishError::Transport(message)),
            None => Ok(()),
        }
    }

    async fn store(&self, id: i64, payload: &ArticlePayload, status: ArticleStatus) -> ArticleRecord {
        let blocks: Vec<_> = payload
            .blocks
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let mut b = b.clone();
                b.id = Some(100 + i as i64);
                b.article_id = id;
                b
            })
            .collect();
        let record: ArticleRecord = serde_json::from_value(json!({
            "id": id,
            "titre": payload.title,
            "description": payload.description,
            "rubriqueId": payload.rubric_id,
            "auteurId": payload.author_id,
            "blocsContenu": blocks,
            "statut": status,
            "region": payload.region,
            "visible": payload.visible,
        }))
        .unwrap();
        self.articles.lock().await.insert(id, record.clone());
        record
    }

    async fn seed(&self, id: i64, status: ArticleStatus) -> ArticleRecord {
        let mut draft = valid_draft();
        draft.set_markup(&HtmlFragmentParser, BODY).unwrap();
        let payload = tody_press::payload::assemble_update(&draft, id).unwrap();
        self.store(id, &payload, status).await
    }
}

#[async_trait::async_trait]
impl ArticleApi for RecordingApi {
    async fn create_article(&self, payload: &ArticlePayload) -> Result<ArticleRecord> {
        if let Some(gate) = &self.create_gate {
            gate.notified().await;
        }
        self.record_call("create".into()).await?;
        self.payloads.lock().await.push(payload.clone());
        let id = 40 + self.articles.lock().await.len() as i64;
        Ok(self.store(id, payload, ArticleStatus::Draft).await)
    }

    async fn update_article(
        &self,
        id: i64,
        payload: &ArticlePayload,
    ) -> Result<Option<ArticleRecord>> {
        self.record_call(format!("update {id}")).await?;
        self.payloads.lock().await.push(payload.clone());
        let record = self.store(id, payload, payload.status).await;
        Ok((!self.update_without_body).then_some(record))
    }

    async fn get_article(&self, id: i64) -> Result<ArticleRecord> {
        self.record_call(format!("get {id}")).await?;
        self.articles
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| PublishError::Transport(format!("GET /articles/{id} failed with 404")))
    }

    async fn submit_for_review(&self, id: i64, author_id: i64) -> Result<ArticleRecord> {
        self.record_call(format!("submit {id} by {author_id}")).await?;
        let mut articles = self.articles.lock().await;
        let record = articles
            .get_mut(&id)
            .ok_or_else(|| PublishError::Transport("404".into()))?;
        record.status = ArticleStatus::PendingReview;
        Ok(record.clone())
    }

    async fn transition(&self, id: i64, transition: &Transition) -> Result<()> {
        let call = match transition {
            Transition::Reject { reason } => format!("reject {id}: {reason}"),
            other => format!("{} {id}", other.action()),
        };
        self.record_call(call).await?;
        let mut articles = self.articles.lock().await;
        if let Some(record) = articles.get_mut(&id) {
            record.status = match self.forced_status {
                Some(status) => status,
                None => record.status.apply(transition.action()).unwrap_or(record.status),
            };
        }
        Ok(())
    }

    async fn upload_media(&self, file_name: &str, mime_type: &str, _bytes: Vec<u8>) -> Result<MediaAsset> {
        self.record_call(format!("upload {file_name}")).await?;
        Ok(MediaAsset {
            media_ref: Some(MediaRef::new("77")),
            access_url: format!("http://media.test/files/{file_name}"),
            original_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            content_hash: None,
        })
    }
}

fn valid_draft() -> ArticleDraft {
    let mut draft = ArticleDraft::new(5, "GLOBAL");
    draft.title = "Budget municipal 2025".into();
    draft.description =
        "Le conseil municipal a adopté le budget primitif après trois heures de débat.".into();
    draft.rubric_id = Some(3);
    draft
}

fn publisher(api: &RecordingApi) -> Publisher {
    Publisher::new(Arc::new(api.clone()), Arc::new(HtmlFragmentParser))
}

#[tokio::test]
async fn first_save_creates_then_later_saves_update() {
    let api = RecordingApi::default();
    let p = publisher(&api);
    let mut draft = valid_draft();

    let created = p.save_markup(&mut draft, BODY).await.unwrap();
    assert_eq!(draft.id, Some(created.id));
    assert_eq!(draft.status, ArticleStatus::Draft);

    p.save_markup(&mut draft, "<p>Version corrigée</p>").await.unwrap();
    assert_eq!(api.calls().await, vec!["create".to_string(), format!("update {}", created.id)]);

    let payloads = api.payloads().await;
    let create = &payloads[0];
    assert!(!create.visible);
    assert!(create.blocks.iter().all(|b| b.article_id == 0));
    assert_eq!(
        create.blocks.iter().map(|b| b.order).collect::<Vec<_>>(),
        vec![0, 1]
    );

    let update = &payloads[1];
    assert_eq!(update.blocks.len(), 1);
    assert_eq!(update.blocks[0].article_id, created.id);
    assert_eq!(update.blocks[0].content, "<p>Version corrigée</p>");
}

#[tokio::test]
async fn update_without_body_is_followed_by_a_fetch() {
    let api = RecordingApi {
        update_without_body: true,
        ..Default::default()
    };
    api.seed(7, ArticleStatus::Draft).await;
    let p = publisher(&api);

    let (mut draft, markup) = p.open_for_edit(7).await.unwrap();
    assert!(markup.starts_with("<p>Le conseil municipal"));
    assert!(markup.ends_with("<blockquote>Une étape</blockquote>"));

    draft.title = "Budget municipal 2025, version finale".into();
    let record = p.save_draft(&mut draft).await.unwrap();
    assert_eq!(record.title, "Budget municipal 2025, version finale");
    assert_eq!(api.calls().await, vec!["get 7", "update 7", "get 7"]);
}

#[tokio::test]
async fn invalid_drafts_never_reach_the_api() {
    let api = RecordingApi::default();
    let p = publisher(&api);

    let mut no_rubric = valid_draft();
    no_rubric.rubric_id = None;
    let err = p.save_markup(&mut no_rubric, BODY).await.unwrap_err();
    assert!(err.is_validation());

    let mut empty = valid_draft();
    let err = p
        .save_markup(&mut empty, "<p>   </p><div></div>")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "article has no content");

    assert!(api.calls().await.is_empty());
}

#[tokio::test]
async fn concurrent_save_of_the_same_draft_is_refused() {
    let gate = Arc::new(Notify::new());
    let api = RecordingApi {
        create_gate: Some(gate.clone()),
        ..Default::default()
    };
    let p = Arc::new(publisher(&api));
    let mut draft = valid_draft();
    draft.set_markup(&HtmlFragmentParser, BODY).unwrap();

    let mut first = draft.clone();
    let p1 = p.clone();
    let handle = tokio::spawn(async move { p1.save_draft(&mut first).await });

    for _ in 0..100 {
        if p.is_in_flight(&draft) {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(p.is_in_flight(&draft));

    let mut second = draft.clone();
    assert!(matches!(
        p.save_draft(&mut second).await,
        Err(PublishError::InFlight)
    ));

    gate.notify_one();
    let record = handle.await.unwrap().unwrap();
    assert!(!p.is_in_flight(&draft));
    assert_eq!(api.calls().await, vec!["create"]);
    assert_eq!(record.status, ArticleStatus::Draft);
}

#[tokio::test]
async fn transport_errors_surface_and_release_the_draft() {
    let api = RecordingApi::failing(vec!["POST /articles failed with 500 Internal Server Error"]);
    let p = publisher(&api);
    let mut draft = valid_draft();

    let err = p.save_markup(&mut draft, BODY).await.unwrap_err();
    assert!(matches!(err, PublishError::Transport(ref m) if m.contains("500")));
    assert_eq!(draft.id, None);
    assert!(!p.is_in_flight(&draft));

    // retry goes through once the server recovers
    p.save_draft(&mut draft).await.unwrap();
    assert!(draft.id.is_some());
}

#[tokio::test]
async fn submit_hands_the_draft_to_review() {
    let api = RecordingApi::default();
    let p = publisher(&api);
    let mut draft = valid_draft();
    let created = p.save_markup(&mut draft, BODY).await.unwrap();

    let submitted = p.submit(&mut draft).await.unwrap();
    assert_eq!(submitted.status, ArticleStatus::PendingReview);
    assert_eq!(draft.status, ArticleStatus::PendingReview);
    assert_eq!(
        api.calls().await,
        vec!["create".to_string(), format!("submit {} by 5", created.id)]
    );

    // already in review: a second submit is refused locally
    assert!(matches!(
        p.submit(&mut draft).await,
        Err(PublishError::IllegalTransition {
            action: StatusAction::Submit,
            from: ArticleStatus::PendingReview
        })
    ));
}

#[tokio::test]
async fn review_transitions_re_read_the_article() {
    let api = RecordingApi::default();
    let pending = api.seed(9, ArticleStatus::PendingReview).await;
    let p = publisher(&api);

    let approved = p.transition(&pending, Transition::Approve).await.unwrap();
    assert_eq!(approved.status, ArticleStatus::Approved);

    let published = p.transition(&approved, Transition::Publish).await.unwrap();
    assert_eq!(published.status, ArticleStatus::Published);

    let archived = p.transition(&published, Transition::Archive).await.unwrap();
    assert_eq!(archived.status, ArticleStatus::Archived);

    assert_eq!(
        api.calls().await,
        vec!["approve 9", "get 9", "publish 9", "get 9", "archive 9", "get 9"]
    );
}

#[tokio::test]
async fn reject_sends_the_reason_and_returns_to_draft() {
    let api = RecordingApi::default();
    let pending = api.seed(11, ArticleStatus::PendingReview).await;
    let p = publisher(&api);

    let rejected = p
        .transition(
            &pending,
            Transition::Reject {
                reason: "sources manquantes".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(rejected.status, ArticleStatus::Draft);
    assert_eq!(api.calls().await, vec!["reject 11: sources manquantes", "get 11"]);
}

#[tokio::test]
async fn server_status_wins_over_the_expected_one() {
    let api = RecordingApi {
        forced_status: Some(ArticleStatus::PendingReview),
        ..Default::default()
    };
    let pending = api.seed(12, ArticleStatus::PendingReview).await;
    let p = publisher(&api);

    let after = p.transition(&pending, Transition::Approve).await.unwrap();
    assert_eq!(after.status, ArticleStatus::PendingReview);
}

#[tokio::test]
async fn illegal_transitions_and_read_only_saves_are_refused_locally() {
    let api = RecordingApi::default();
    let draft_record = api.seed(13, ArticleStatus::Draft).await;
    let published = api.seed(14, ArticleStatus::Published).await;
    let p = publisher(&api);

    assert!(matches!(
        p.transition(&draft_record, Transition::Publish).await,
        Err(PublishError::IllegalTransition {
            action: StatusAction::Publish,
            from: ArticleStatus::Draft
        })
    ));

    let mut locked = ArticleDraft::from_record(&published);
    assert!(matches!(
        p.save_draft(&mut locked).await,
        Err(PublishError::ReadOnly(ArticleStatus::Published))
    ));

    assert!(api.calls().await.is_empty());
}

#[tokio::test]
async fn uploaded_image_comes_back_as_editor_markup() {
    let api = RecordingApi::default();
    let p = publisher(&api);

    let (asset, markup) = p
        .upload_image("mairie.jpg", "image/jpeg", vec![0xff, 0xd8])
        .await
        .unwrap();
    assert_eq!(asset.media_ref, Some(MediaRef::new("77")));
    assert_eq!(
        markup,
        r#"<img src="http://media.test/files/mairie.jpg" alt="mairie.jpg" title="mairie.jpg" data-media-id="77" />"#
    );

    // and the inserted markup parses back into an image block keeping the asset
    let mut draft = valid_draft();
    p.save_markup(&mut draft, &format!("<p>Intro</p>{markup}"))
        .await
        .unwrap();
    let sent = &api.payloads().await[0];
    assert_eq!(sent.blocks[1].media_ref, Some(MediaRef::new("77")));
    assert_eq!(sent.blocks[1].content, "http://media.test/files/mairie.jpg");
    assert_eq!(sent.blocks[1].caption, "mairie.jpg");
}
