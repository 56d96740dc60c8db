//! Domain types for conversations and messages.
//!
//! Server-issued identifiers are plain integers. Two client-side identifiers
//! exist on top of them:
//! - [`ConversationId::Transient`], the unsaved conversation shown after "new chat";
//! - [`MessageId::Local`], the provisional id of an optimistic message.

use core::cmp::Ordering;
use core::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::dto::{ConversationRecord, MessageRecord};
use crate::client::errors::ClientResult;

/// Identifier of a conversation as seen by the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationId {
    /// Client-only conversation, not yet created on the server.
    Transient,
    /// Conversation persisted by the server.
    Persisted(i64),
}

impl ConversationId {
    /// Whether this is the transient sentinel.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Server id, if persisted.
    #[must_use]
    pub const fn server_id(self) -> Option<i64> {
        match self {
            Self::Transient => None,
            Self::Persisted(id) => Some(id),
        }
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => f.write_str("transient"),
            Self::Persisted(id) => write!(f, "{id}"),
        }
    }
}

impl From<i64> for ConversationId {
    fn from(value: i64) -> Self {
        Self::Persisted(value)
    }
}

/// Provisional message identifier.
///
/// `after` is the highest server id present in the window when the message was
/// created, so the message sorts right after it and before any later server
/// message. `seq` is unique per view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalId {
    /// Highest server id known when the message was created (0 if none).
    pub after: i64,
    /// Per-view sequence number.
    pub seq: u64,
}

/// Identifier of a message in a conversation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageId {
    /// Server-assigned id.
    Server(i64),
    /// Provisional id of an optimistic message.
    Local(LocalId),
}

impl MessageId {
    /// Server id, if assigned.
    #[must_use]
    pub const fn server_id(self) -> Option<i64> {
        match self {
            Self::Server(id) => Some(id),
            Self::Local(_) => None,
        }
    }

    /// Chronological sort key.
    const fn sort_key(self) -> (i64, u8, u64) {
        match self {
            Self::Server(id) => (id, 0, 0),
            Self::Local(local) => (local.after, 1, local.seq),
        }
    }
}

impl Ord for MessageId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for MessageId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(id) => write!(f, "{id}"),
            Self::Local(local) => write!(f, "local-{}", local.seq),
        }
    }
}

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The signed-in user.
    User,
    /// The RecallAI assistant.
    Assistant,
}

impl Role {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery state of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Optimistic, the request is still outstanding.
    Pending,
    /// Accepted by the server, but the server id is not known to the client.
    Delivered,
    /// Carries its server id.
    Confirmed,
    /// The request failed; the message was never persisted.
    Failed,
}

/// A message in a conversation window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Identifier, server-assigned or provisional.
    pub id: MessageId,
    /// Author.
    pub role: Role,
    /// Markdown source, may embed attachment references.
    pub content: String,
    /// Creation time, when reported by the server.
    pub created_at: Option<DateTime<Utc>>,
    /// Delivery state.
    pub status: MessageStatus,
}

impl Message {
    /// Build an optimistic user message.
    #[must_use]
    pub fn optimistic(id: LocalId, content: String) -> Self {
        Self {
            id: MessageId::Local(id),
            role: Role::User,
            content,
            created_at: Some(Utc::now()),
            status: MessageStatus::Pending,
        }
    }

    /// Whether the message exists on the server.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        matches!(
            self.status,
            MessageStatus::Confirmed | MessageStatus::Delivered
        )
    }
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: MessageId::Server(record.id),
            role: record.role,
            content: record.content,
            created_at: record.created_at,
            status: MessageStatus::Confirmed,
        }
    }
}

/// A file sent along with a prompt or uploaded as notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name shown to the user and sent to the server.
    pub file_name: String,
    /// MIME type, if known.
    pub mime: Option<String>,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Build an attachment from in-memory bytes.
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime = guess_mime(&file_name).map(str::to_string);
        Self {
            file_name,
            mime,
            bytes,
        }
    }

    /// Read an attachment from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub async fn from_path(path: &Path) -> ClientResult<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| "file".to_string(), |name| name.to_string_lossy().into_owned());
        Ok(Self::new(file_name, bytes))
    }
}

fn guess_mime(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "txt" | "md" => "text/plain",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "zip" => "application/zip",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => return None,
    };
    Some(mime)
}

/// Text shown for an optimistic user message: the prompt followed by one
/// reference line per attachment.
#[must_use]
pub fn compose_user_content(prompt: &str, attachments: &[Attachment]) -> String {
    let mut content = prompt.to_string();
    for attachment in attachments {
        if !content.is_empty() {
            content.push('\n');
        }
        content.push_str("[attachment: ");
        content.push_str(&attachment.file_name);
        content.push(']');
    }
    content
}

/// Sidebar entry for a persisted conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Server id.
    pub id: i64,
    /// Display title, `None` until set.
    pub title: Option<String>,
}

impl From<ConversationRecord> for ConversationSummary {
    fn from(record: ConversationRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
        }
    }
}

/// Locally materialized window of one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    /// Identifier.
    pub id: ConversationId,
    /// Display title.
    pub title: Option<String>,
    /// Loaded messages, ascending by id.
    pub messages: Vec<Message>,
    /// Oldest loaded server id, upper bound of the next older-page fetch.
    pub cursor: Option<i64>,
    /// Set once an older-page fetch came back empty.
    pub history_exhausted: bool,
    /// Whether the most recent page has been loaded.
    pub loaded: bool,
}

impl Conversation {
    /// A fresh transient conversation.
    #[must_use]
    pub const fn transient() -> Self {
        Self {
            id: ConversationId::Transient,
            title: None,
            messages: Vec::new(),
            cursor: None,
            history_exhausted: false,
            loaded: true,
        }
    }

    /// A persisted conversation whose messages have not been fetched yet.
    #[must_use]
    pub const fn unloaded(id: i64, title: Option<String>) -> Self {
        Self {
            id: ConversationId::Persisted(id),
            title,
            messages: Vec::new(),
            cursor: None,
            history_exhausted: false,
            loaded: false,
        }
    }

    /// Find a message by identity.
    #[must_use]
    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }
}
