//! Data types that flow between extraction, the session, and the surfaces.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::table::Table;

/// What extraction produced for one uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedContent {
    /// Delimited or spreadsheet data, answered by direct lookup.
    Table(Table),
    /// Free text, chunked and indexed for retrieval.
    Document { text: String },
}

/// Who wrote a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the conversation history.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            at: Utc::now(),
        }
    }
}
