//! Error types surfaced by the article core.
use crate::model::{ArticleStatus, StatusAction};
use thiserror::Error;

/// Local validation failures. Detected before any network call and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title too short (min {min} characters)")]
    TitleTooShort { min: usize },
    #[error("title too long (max {max} characters)")]
    TitleTooLong { max: usize },
    #[error("description too short (min {min} characters)")]
    DescriptionTooShort { min: usize },
    #[error("description too long (max {max} characters)")]
    DescriptionTooLong { max: usize },
    #[error("a rubric is required")]
    CategoryRequired,
    #[error("article has no content")]
    EmptyArticle,
}

/// Raised by a markup adapter that cannot make sense of its input.
#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("markup parse error at byte {position}: {message}")]
    Syntax { position: usize, message: String },
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Markup(#[from] MarkupError),
    /// Network failure or non-success HTTP status.
    #[error("{0}")]
    Transport(String),
    /// Success status but the body could not be decoded.
    #[error("malformed response from {endpoint}: {message}")]
    MalformedResponse { endpoint: String, message: String },
    #[error("a request for this article is already in flight")]
    InFlight,
    #[error("article is {0} and can no longer be edited")]
    ReadOnly(ArticleStatus),
    #[error("cannot {action} an article that is {from}")]
    IllegalTransition {
        action: StatusAction,
        from: ArticleStatus,
    },
    #[error("article has not been created yet")]
    MissingId,
}

impl PublishError {
    pub fn transport(err: reqwest::Error) -> Self {
        PublishError::Transport(format!("request failed: {err}"))
    }

    pub fn malformed(endpoint: impl Into<String>, message: impl ToString) -> Self {
        PublishError::MalformedResponse {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, PublishError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, PublishError>;
