//! Editorial client for the Tody publishing backend.
//!
//! Articles are authored as editor markup, turned into ordered content blocks,
//! validated, and pushed to the persistence API; on edit the blocks are turned
//! back into markup.

pub mod api;
pub mod config;
pub mod content;
pub mod error;
pub mod model;
pub mod payload;
pub mod publisher;

pub use error::{PublishError, Result, ValidationError};
