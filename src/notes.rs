//! Notes of the signed-in user.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::client::dto::{NoteRecord, NoteRef, NoteUpdateBody};
use crate::client::errors::{ClientError, ClientResult};
use crate::client::services::NoteService;
use crate::conversation::types::Attachment;
use crate::session::SessionContext;

/// Notes workflows for one session.
#[derive(Clone)]
pub struct NotesBook {
    service: Arc<dyn NoteService>,
    session: SessionContext,
}

impl NotesBook {
    /// Notes of `session`'s user.
    pub fn new(service: Arc<dyn NoteService>, session: SessionContext) -> Self {
        Self { service, session }
    }

    /// Create a note.
    ///
    /// # Errors
    /// Returns an error if the content is blank or the call fails.
    pub async fn create(&self, title: Option<String>, content: &str) -> ClientResult<NoteRecord> {
        if content.trim().is_empty() {
            return Err(ClientError::InvalidInput(
                "note content must not be empty".to_string(),
            ));
        }
        let note = self
            .service
            .create_note(self.session.user_id(), title, content.to_string())
            .await?;
        info!(note_id = note.id, "note created");
        Ok(note)
    }

    /// Fetch one note, `None` if it does not exist.
    ///
    /// # Errors
    /// Returns an error if the call fails.
    pub async fn get(&self, note_id: i64) -> ClientResult<Option<NoteRecord>> {
        self.service.get_note(note_id).await
    }

    /// All notes of the user, oldest first.
    ///
    /// # Errors
    /// Returns an error if the call fails.
    pub async fn list(&self) -> ClientResult<Vec<NoteRecord>> {
        let mut notes = self.service.list_notes(self.session.user_id()).await?;
        notes.sort_by_key(|note| note.id);
        Ok(notes)
    }

    /// Change the title and/or content of a note.
    ///
    /// # Errors
    /// Returns an error if nothing changes, the call fails or the note does not exist.
    pub async fn update(
        &self,
        note_id: i64,
        title: Option<String>,
        content: Option<String>,
    ) -> ClientResult<NoteRecord> {
        if title.is_none() && content.is_none() {
            return Err(ClientError::InvalidInput(
                "a note update needs a title or content".to_string(),
            ));
        }
        let update = NoteUpdateBody {
            note_id,
            title,
            content,
        };
        self.service
            .update_note(update)
            .await?
            .ok_or_else(|| ClientError::Rejected(format!("update of note {note_id}")))
    }

    /// Delete a note.
    ///
    /// # Errors
    /// Returns an error if the call fails or the note does not exist.
    pub async fn delete(&self, note_id: i64) -> ClientResult<()> {
        if !self.service.delete_note(note_id).await? {
            return Err(ClientError::Rejected(format!("delete of note {note_id}")));
        }
        info!(note_id, "note deleted");
        Ok(())
    }

    /// Upload files; the server turns each one into a note.
    ///
    /// # Errors
    /// Returns an error if no file is given or the call fails.
    pub async fn upload(&self, files: Vec<Attachment>) -> ClientResult<Vec<NoteRecord>> {
        if files.is_empty() {
            return Err(ClientError::InvalidInput(
                "at least one file is required".to_string(),
            ));
        }
        let notes = self
            .service
            .upload_notes(self.session.user_id(), files)
            .await?;
        info!(created = notes.len(), "files uploaded as notes");
        Ok(notes)
    }

    /// Read files from disk and upload them.
    ///
    /// # Errors
    /// Returns an error if a file cannot be read or the upload fails.
    pub async fn upload_paths<P: AsRef<Path>>(&self, paths: &[P]) -> ClientResult<Vec<NoteRecord>> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            files.push(Attachment::from_path(path.as_ref()).await?);
        }
        self.upload(files).await
    }

    /// Store a piece of chat as a note.
    ///
    /// # Errors
    /// Returns an error if the content is blank or the call fails.
    pub async fn add_chat_message(
        &self,
        content: &str,
        title: Option<String>,
    ) -> ClientResult<NoteRef> {
        if content.trim().is_empty() {
            return Err(ClientError::InvalidInput(
                "note content must not be empty".to_string(),
            ));
        }
        self.service
            .add_chat_message_to_notes(self.session.user_id(), content.to_string(), title)
            .await
    }
}
