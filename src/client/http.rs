//! `reqwest` implementation of the RecallAI remote services.

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::client::config::HttpConfig;
use crate::client::dto::{
    AddToNoteBody, ChatReply, ChatRequest, ConversationIdBody, ConversationRecord,
    CredentialsBody, MessageIdBody, MessageRecord, NoteCreateBody, NoteIdBody, NoteRecord,
    NoteRef, NoteUpdateBody, PageQuery, RenameBody, UserIdBody, UserRecord,
};
use crate::client::errors::{ClientError, ClientResult};
use crate::client::services::{
    AuthService, ChatService, ConversationService, NoteService, ServiceFuture,
};
use crate::conversation::types::Attachment;

/// Maximum number of body characters kept in a status error.
const ERROR_BODY_CHARS: usize = 512;

/// HTTP client for every RecallAI endpoint.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    base: Url,
}

impl HttpBackend {
    /// Build a backend client from HTTP settings.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: &HttpConfig) -> ClientResult<Self> {
        let mut base = Url::parse(config.base_url.trim_end_matches('/'))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidConfig(format!(
                "base url cannot be used as a base: {}",
                config.base_url
            )));
        }
        // `Url::join` replaces the last segment unless the path ends with '/'.
        let path = format!("{}/", base.path().trim_end_matches('/'));
        base.set_path(&path);

        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { client, base })
    }

    /// Base URL every endpoint is resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        Ok(self.base.join(path)?)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> ClientResult<R>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        let response = self.client.post(url).json(body).send().await?;
        decode(response).await
    }

    async fn post_json_with_query<Q, B, R>(&self, path: &str, query: &Q, body: &B) -> ClientResult<R>
    where
        Q: Serialize + Sync + ?Sized,
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        let response = self
            .client
            .post(url)
            .query(query)
            .json(body)
            .send()
            .await?;
        decode(response).await
    }

    async fn post_multipart<R>(&self, url: Url, form: Form) -> ClientResult<R>
    where
        R: DeserializeOwned,
    {
        debug!(%url, "POST multipart");
        let response = self.client.post(url).multipart(form).send().await?;
        decode(response).await
    }
}

async fn decode<R: DeserializeOwned>(response: Response) -> ClientResult<R> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ClientError::Status {
            status: status.as_u16(),
            body: body.chars().take(ERROR_BODY_CHARS).collect(),
        });
    }
    Ok(serde_json::from_str(&body)?)
}

fn file_part(attachment: Attachment) -> ClientResult<Part> {
    let part = Part::bytes(attachment.bytes).file_name(attachment.file_name);
    match attachment.mime {
        Some(mime) => Ok(part.mime_str(&mime)?),
        None => Ok(part),
    }
}

fn files_form(mut form: Form, files: Vec<Attachment>) -> ClientResult<Form> {
    for file in files {
        form = form.part("files", file_part(file)?);
    }
    Ok(form)
}

impl ConversationService for HttpBackend {
    fn list_conversations(
        &self,
        user_id: i64,
    ) -> ServiceFuture<'_, ClientResult<Vec<ConversationRecord>>> {
        Box::pin(async move {
            self.post_json("conversation/list", &UserIdBody { user_id })
                .await
        })
    }

    fn create_conversation(
        &self,
        user_id: i64,
    ) -> ServiceFuture<'_, ClientResult<ConversationRecord>> {
        Box::pin(async move {
            self.post_json("conversation/create", &UserIdBody { user_id })
                .await
        })
    }

    fn rename_conversation(
        &self,
        conversation_id: i64,
        title: String,
    ) -> ServiceFuture<'_, ClientResult<Option<ConversationRecord>>> {
        Box::pin(async move {
            let body = RenameBody {
                conversation_id,
                title,
            };
            self.post_json("conversation/rename", &body).await
        })
    }

    fn delete_conversation(&self, conversation_id: i64) -> ServiceFuture<'_, ClientResult<bool>> {
        Box::pin(async move {
            self.post_json("conversation/delete", &ConversationIdBody { conversation_id })
                .await
        })
    }

    fn fetch_messages(
        &self,
        conversation_id: i64,
        limit: u32,
        before_id: Option<i64>,
    ) -> ServiceFuture<'_, ClientResult<Vec<MessageRecord>>> {
        Box::pin(async move {
            let query = PageQuery { limit, before_id };
            self.post_json_with_query(
                "conversation/messages",
                &query,
                &ConversationIdBody { conversation_id },
            )
            .await
        })
    }

    fn delete_message(&self, message_id: i64) -> ServiceFuture<'_, ClientResult<bool>> {
        Box::pin(async move {
            self.post_json("conversation/delete-message", &MessageIdBody { message_id })
                .await
        })
    }
}

impl ChatService for HttpBackend {
    fn send_prompt(&self, request: ChatRequest) -> ServiceFuture<'_, ClientResult<ChatReply>> {
        Box::pin(async move { self.post_json("chat", &request).await })
    }

    fn send_prompt_with_attachments(
        &self,
        conversation_id: i64,
        prompt: String,
        attachments: Vec<Attachment>,
    ) -> ServiceFuture<'_, ClientResult<ChatReply>> {
        Box::pin(async move {
            let url = self.endpoint("chat/upload")?;
            let form = Form::new()
                .text("conversation_id", conversation_id.to_string())
                .text("prompt", prompt);
            let form = files_form(form, attachments)?;
            self.post_multipart(url, form).await
        })
    }
}

impl NoteService for HttpBackend {
    fn create_note(
        &self,
        user_id: i64,
        title: Option<String>,
        content: String,
    ) -> ServiceFuture<'_, ClientResult<NoteRecord>> {
        Box::pin(async move {
            let body = NoteCreateBody {
                user_id,
                title,
                content,
                source: None,
            };
            self.post_json("notes", &body).await
        })
    }

    fn get_note(&self, note_id: i64) -> ServiceFuture<'_, ClientResult<Option<NoteRecord>>> {
        Box::pin(async move { self.post_json("notes/get", &NoteIdBody { note_id }).await })
    }

    fn list_notes(&self, user_id: i64) -> ServiceFuture<'_, ClientResult<Vec<NoteRecord>>> {
        Box::pin(async move { self.post_json("notes/list", &UserIdBody { user_id }).await })
    }

    fn update_note(
        &self,
        update: NoteUpdateBody,
    ) -> ServiceFuture<'_, ClientResult<Option<NoteRecord>>> {
        Box::pin(async move { self.post_json("notes/update", &update).await })
    }

    fn delete_note(&self, note_id: i64) -> ServiceFuture<'_, ClientResult<bool>> {
        Box::pin(async move { self.post_json("notes/delete", &NoteIdBody { note_id }).await })
    }

    fn upload_notes(
        &self,
        user_id: i64,
        files: Vec<Attachment>,
    ) -> ServiceFuture<'_, ClientResult<Vec<NoteRecord>>> {
        Box::pin(async move {
            // The backend reads `user_id` from the query string, not the form.
            let mut url = self.endpoint("notes/bulk")?;
            url.query_pairs_mut()
                .append_pair("user_id", &user_id.to_string());
            let form = files_form(Form::new(), files)?;
            self.post_multipart(url, form).await
        })
    }

    fn add_chat_message_to_notes(
        &self,
        user_id: i64,
        content: String,
        title: Option<String>,
    ) -> ServiceFuture<'_, ClientResult<NoteRef>> {
        Box::pin(async move {
            let body = AddToNoteBody {
                user_id,
                content,
                title,
            };
            self.post_json("conversation/add-to-note", &body).await
        })
    }
}

impl AuthService for HttpBackend {
    fn login(&self, email: String, password: String) -> ServiceFuture<'_, ClientResult<UserRecord>> {
        Box::pin(async move {
            self.post_json("auth/login", &CredentialsBody { email, password })
                .await
        })
    }

    fn register(
        &self,
        email: String,
        password: String,
    ) -> ServiceFuture<'_, ClientResult<UserRecord>> {
        Box::pin(async move {
            self.post_json("auth/register", &CredentialsBody { email, password })
                .await
        })
    }
}
