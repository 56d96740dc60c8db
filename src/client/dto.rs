//! Wire records exchanged with the RecallAI backend.
//!
//! Every response is decoded into an explicit record. Required fields must be
//! present with the right type or decoding fails; extra fields the backend
//! adds (e.g. embedded `messages` in conversation listings) are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::types::Role;

/// Body carrying a user id.
#[derive(Debug, Clone, Serialize)]
pub struct UserIdBody {
    /// User id.
    pub user_id: i64,
}

/// Body carrying a conversation id.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationIdBody {
    /// Conversation id.
    pub conversation_id: i64,
}

/// Rename request body.
#[derive(Debug, Clone, Serialize)]
pub struct RenameBody {
    /// Conversation id.
    pub conversation_id: i64,
    /// New title.
    pub title: String,
}

/// Body carrying a message id.
#[derive(Debug, Clone, Serialize)]
pub struct MessageIdBody {
    /// Message id.
    pub message_id: i64,
}

/// Query string of the paginated message fetch.
#[derive(Debug, Clone, Serialize)]
pub struct PageQuery {
    /// Page size.
    pub limit: u32,
    /// Exclusive upper bound on message ids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_id: Option<i64>,
}

/// Plain-text chat request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Persisted conversation id.
    pub conversation_id: i64,
    /// Prompt text.
    pub prompt: String,
    /// Number of notes to retrieve.
    pub top_k: u32,
}

/// "Add chat message to notes" request body.
#[derive(Debug, Clone, Serialize)]
pub struct AddToNoteBody {
    /// Owner of the note.
    pub user_id: i64,
    /// Note content.
    pub content: String,
    /// Note title; the backend defaults to "Chat Snippet".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Login / registration body.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialsBody {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

/// Note creation body.
#[derive(Debug, Clone, Serialize)]
pub struct NoteCreateBody {
    /// Owner of the note.
    pub user_id: i64,
    /// Optional title.
    pub title: Option<String>,
    /// Note content.
    pub content: String,
    /// Optional provenance tag.
    pub source: Option<String>,
}

/// Body carrying a note id.
#[derive(Debug, Clone, Serialize)]
pub struct NoteIdBody {
    /// Note id.
    pub note_id: i64,
}

/// Partial note update body.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NoteUpdateBody {
    /// Note id.
    pub note_id: i64,
    /// New title, if changing.
    pub title: Option<String>,
    /// New content, if changing.
    pub content: Option<String>,
}

/// Conversation record as returned by list/create/rename.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConversationRecord {
    /// Server id.
    pub id: i64,
    /// Title, `null` until set.
    #[serde(default)]
    pub title: Option<String>,
}

/// Message record as returned by the paginated fetch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageRecord {
    /// Server id.
    pub id: i64,
    /// Author.
    pub role: Role,
    /// Markdown content.
    pub content: String,
    /// Creation time.
    #[serde(default, deserialize_with = "timestamp_serde::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A note cited by a chat answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSource {
    /// Cited note id.
    pub note_id: i64,
    /// Note title.
    #[serde(default)]
    pub title: Option<String>,
    /// Excerpt of the note.
    pub snippet: String,
}

/// Reply of the chat endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatReply {
    /// Assistant answer.
    pub answer: String,
    /// Notes used to answer.
    #[serde(default)]
    pub sources: Vec<ChatSource>,
    /// Server id of the stored assistant message.
    #[serde(default)]
    pub message_id: Option<i64>,
    /// Server id of the stored user message, when the backend reports it.
    #[serde(default)]
    pub user_message_id: Option<i64>,
}

/// Note record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NoteRecord {
    /// Note id.
    pub id: i64,
    /// Owner.
    pub user_id: i64,
    /// Title.
    #[serde(default)]
    pub title: Option<String>,
    /// Content.
    pub content: String,
    /// Provenance tag (`chat`, `bulk_upload`, ...).
    #[serde(default)]
    pub source: Option<String>,
}

/// Short note reference returned by "add chat message to notes".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NoteRef {
    /// Note id.
    pub id: i64,
    /// Title.
    #[serde(default)]
    pub title: Option<String>,
}

/// Authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserRecord {
    /// User id.
    pub id: i64,
    /// Account email.
    pub email: String,
}

/// Timestamps arrive either as RFC 3339 or as naive ISO strings (UTC).
mod timestamp_serde {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(Some(parsed.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Some(naive.and_utc()))
            .map_err(|err| D::Error::custom(format!("invalid timestamp {raw:?}: {err}")))
    }
}
