//! Remote service contracts consumed by the conversation view.

use std::future::Future;
use std::pin::Pin;

use crate::client::dto::{
    ChatReply, ChatRequest, ConversationRecord, MessageRecord, NoteRecord, NoteRef,
    NoteUpdateBody, UserRecord,
};
use crate::client::errors::ClientResult;
use crate::conversation::types::Attachment;

/// Boxed future type for service operations.
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Remote conversation service.
pub trait ConversationService: Send + Sync {
    /// List the conversations of a user, newest first.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response is malformed.
    fn list_conversations(
        &self,
        user_id: i64,
    ) -> ServiceFuture<'_, ClientResult<Vec<ConversationRecord>>>;

    /// Create an empty conversation.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response is malformed.
    fn create_conversation(&self, user_id: i64)
    -> ServiceFuture<'_, ClientResult<ConversationRecord>>;

    /// Rename a conversation. `None` means the server did not find it.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response is malformed.
    fn rename_conversation(
        &self,
        conversation_id: i64,
        title: String,
    ) -> ServiceFuture<'_, ClientResult<Option<ConversationRecord>>>;

    /// Delete a conversation. Returns the server acknowledgement.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response is malformed.
    fn delete_conversation(&self, conversation_id: i64) -> ServiceFuture<'_, ClientResult<bool>>;

    /// Fetch up to `limit` messages with ids strictly below `before_id`
    /// (the newest page when `before_id` is `None`).
    ///
    /// # Errors
    /// Returns an error if the request fails or the response is malformed.
    fn fetch_messages(
        &self,
        conversation_id: i64,
        limit: u32,
        before_id: Option<i64>,
    ) -> ServiceFuture<'_, ClientResult<Vec<MessageRecord>>>;

    /// Delete one message. Returns the server acknowledgement.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response is malformed.
    fn delete_message(&self, message_id: i64) -> ServiceFuture<'_, ClientResult<bool>>;
}

/// Remote chat service.
pub trait ChatService: Send + Sync {
    /// Send a text prompt and wait for the assistant reply.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response is malformed.
    fn send_prompt(&self, request: ChatRequest) -> ServiceFuture<'_, ClientResult<ChatReply>>;

    /// Send a prompt with attached files (multipart) and wait for the reply.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response is malformed.
    fn send_prompt_with_attachments(
        &self,
        conversation_id: i64,
        prompt: String,
        attachments: Vec<Attachment>,
    ) -> ServiceFuture<'_, ClientResult<ChatReply>>;
}

/// Remote notes service.
pub trait NoteService: Send + Sync {
    /// Create a note.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response is malformed.
    fn create_note(
        &self,
        user_id: i64,
        title: Option<String>,
        content: String,
    ) -> ServiceFuture<'_, ClientResult<NoteRecord>>;

    /// Fetch one note. `None` when it does not exist.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response is malformed.
    fn get_note(&self, note_id: i64) -> ServiceFuture<'_, ClientResult<Option<NoteRecord>>>;

    /// List the notes of a user.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response is malformed.
    fn list_notes(&self, user_id: i64) -> ServiceFuture<'_, ClientResult<Vec<NoteRecord>>>;

    /// Update title and/or content. `None` when the note does not exist.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response is malformed.
    fn update_note(
        &self,
        update: NoteUpdateBody,
    ) -> ServiceFuture<'_, ClientResult<Option<NoteRecord>>>;

    /// Delete a note. Returns the server acknowledgement.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response is malformed.
    fn delete_note(&self, note_id: i64) -> ServiceFuture<'_, ClientResult<bool>>;

    /// Upload files; the server extracts their text into one note per file.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response is malformed.
    fn upload_notes(
        &self,
        user_id: i64,
        files: Vec<Attachment>,
    ) -> ServiceFuture<'_, ClientResult<Vec<NoteRecord>>>;

    /// Store a chat message as a note.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response is malformed.
    fn add_chat_message_to_notes(
        &self,
        user_id: i64,
        content: String,
        title: Option<String>,
    ) -> ServiceFuture<'_, ClientResult<NoteRef>>;
}

/// Remote authentication service.
pub trait AuthService: Send + Sync {
    /// Log in with email and password.
    ///
    /// # Errors
    /// Returns an error if the credentials are refused or the request fails.
    fn login(&self, email: String, password: String) -> ServiceFuture<'_, ClientResult<UserRecord>>;

    /// Create an account.
    ///
    /// # Errors
    /// Returns an error if the account cannot be created or the request fails.
    fn register(
        &self,
        email: String,
        password: String,
    ) -> ServiceFuture<'_, ClientResult<UserRecord>>;
}
