//! In-memory backend for view tests.
//!
//! Behaves like the RecallAI server: ids come from one shared counter,
//! pages are filtered by `before_id`. Pages are returned newest first so
//! the view has to sort them. Chat calls and page fetches can be held back
//! with semaphores to exercise interleavings.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Semaphore;

use crate::client::dto::{
    ChatReply, ChatRequest, ChatSource, ConversationRecord, MessageRecord, NoteRecord, NoteRef,
    NoteUpdateBody, UserRecord,
};
use crate::client::errors::{ClientError, ClientResult};
use crate::client::services::{
    AuthService, ChatService, ConversationService, NoteService, ServiceFuture,
};
use crate::conversation::types::{Attachment, Role};

#[derive(Default)]
struct FakeState {
    next_id: i64,
    /// Newest first, like the list endpoint.
    conversations: Vec<ConversationRecord>,
    messages: BTreeMap<i64, Vec<MessageRecord>>,
    notes: Vec<NoteRecord>,
    users: Vec<(UserRecord, String)>,
    calls: HashMap<&'static str, usize>,
    fail_fetch: bool,
    fail_chat: bool,
    fail_rename: bool,
    omit_message_id: bool,
    report_user_message_id: bool,
    fetch_gate: Option<Arc<Semaphore>>,
    chat_gate: Option<Arc<Semaphore>>,
}

impl FakeState {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Fake RecallAI server.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn record(&self, call: &'static str) {
        *self.state().calls.entry(call).or_default() += 1;
    }

    /// Number of times `call` was invoked.
    pub fn calls(&self, call: &str) -> usize {
        self.state().calls.get(call).copied().unwrap_or_default()
    }

    /// Seed a conversation with `count` alternating user/assistant messages.
    pub fn seed_conversation(&self, title: &str, count: usize) -> (i64, Vec<i64>) {
        let mut state = self.state();
        let id = state.allocate();
        state.conversations.insert(
            0,
            ConversationRecord {
                id,
                title: Some(title.to_string()),
            },
        );
        let mut ids = Vec::with_capacity(count);
        let mut records = Vec::with_capacity(count);
        for index in 0..count {
            let message_id = state.allocate();
            ids.push(message_id);
            records.push(MessageRecord {
                id: message_id,
                role: if index % 2 == 0 {
                    Role::User
                } else {
                    Role::Assistant
                },
                content: format!("{title} #{index}"),
                created_at: None,
            });
        }
        state.messages.insert(id, records);
        (id, ids)
    }

    /// Server-side message ids of a conversation, ascending.
    pub fn stored_message_ids(&self, conversation_id: i64) -> Vec<i64> {
        self.state()
            .messages
            .get(&conversation_id)
            .map(|records| records.iter().map(|record| record.id).collect())
            .unwrap_or_default()
    }

    pub fn register_user(&self, email: &str, password: &str) -> UserRecord {
        let mut state = self.state();
        let id = state.allocate();
        let user = UserRecord {
            id,
            email: email.to_string(),
        };
        state.users.push((user.clone(), password.to_string()));
        user
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.state().fail_fetch = fail;
    }

    pub fn set_fail_chat(&self, fail: bool) {
        self.state().fail_chat = fail;
    }

    pub fn set_fail_rename(&self, fail: bool) {
        self.state().fail_rename = fail;
    }

    pub fn set_omit_message_id(&self, omit: bool) {
        self.state().omit_message_id = omit;
    }

    pub fn set_report_user_message_id(&self, report: bool) {
        self.state().report_user_message_id = report;
    }

    /// Hold page fetches until permits are added to the returned semaphore.
    pub fn gate_fetches(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.state().fetch_gate = Some(Arc::clone(&gate));
        gate
    }

    /// Hold chat replies until permits are added to the returned semaphore.
    pub fn gate_chat(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.state().chat_gate = Some(Arc::clone(&gate));
        gate
    }

    async fn pass(gate: Option<Arc<Semaphore>>) {
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
    }

    fn store_turn(&self, conversation_id: i64, prompt: String, answer: String) -> ChatReply {
        let mut state = self.state();
        let user_id = state.allocate();
        let assistant_id = state.allocate();
        let records = state.messages.entry(conversation_id).or_default();
        records.push(MessageRecord {
            id: user_id,
            role: Role::User,
            content: prompt,
            created_at: None,
        });
        records.push(MessageRecord {
            id: assistant_id,
            role: Role::Assistant,
            content: answer.clone(),
            created_at: None,
        });
        ChatReply {
            answer,
            sources: vec![ChatSource {
                note_id: 1,
                title: None,
                snippet: "...".to_string(),
            }],
            message_id: (!state.omit_message_id).then_some(assistant_id),
            user_message_id: state.report_user_message_id.then_some(user_id),
        }
    }
}

fn server_error(body: &str) -> ClientError {
    ClientError::Status {
        status: 500,
        body: body.to_string(),
    }
}

impl ConversationService for FakeBackend {
    fn list_conversations(
        &self,
        _user_id: i64,
    ) -> ServiceFuture<'_, ClientResult<Vec<ConversationRecord>>> {
        Box::pin(async move {
            self.record("list_conversations");
            Ok(self.state().conversations.clone())
        })
    }

    fn create_conversation(
        &self,
        _user_id: i64,
    ) -> ServiceFuture<'_, ClientResult<ConversationRecord>> {
        Box::pin(async move {
            self.record("create_conversation");
            let mut state = self.state();
            let id = state.allocate();
            let record = ConversationRecord { id, title: None };
            state.conversations.insert(0, record.clone());
            state.messages.insert(id, Vec::new());
            Ok(record)
        })
    }

    fn rename_conversation(
        &self,
        conversation_id: i64,
        title: String,
    ) -> ServiceFuture<'_, ClientResult<Option<ConversationRecord>>> {
        Box::pin(async move {
            self.record("rename_conversation");
            let mut state = self.state();
            if state.fail_rename {
                return Err(server_error("rename failed"));
            }
            Ok(state
                .conversations
                .iter_mut()
                .find(|record| record.id == conversation_id)
                .map(|record| {
                    record.title = Some(title);
                    record.clone()
                }))
        })
    }

    fn delete_conversation(&self, conversation_id: i64) -> ServiceFuture<'_, ClientResult<bool>> {
        Box::pin(async move {
            self.record("delete_conversation");
            let mut state = self.state();
            let before = state.conversations.len();
            state
                .conversations
                .retain(|record| record.id != conversation_id);
            state.messages.remove(&conversation_id);
            Ok(state.conversations.len() < before)
        })
    }

    fn fetch_messages(
        &self,
        conversation_id: i64,
        limit: u32,
        before_id: Option<i64>,
    ) -> ServiceFuture<'_, ClientResult<Vec<MessageRecord>>> {
        Box::pin(async move {
            self.record("fetch_messages");
            let gate = self.state().fetch_gate.clone();
            Self::pass(gate).await;

            let state = self.state();
            if state.fail_fetch {
                return Err(server_error("fetch failed"));
            }
            let mut page: Vec<MessageRecord> = state
                .messages
                .get(&conversation_id)
                .map(|records| {
                    records
                        .iter()
                        .filter(|record| before_id.is_none_or(|before| record.id < before))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            let keep = usize::try_from(limit).unwrap_or(usize::MAX);
            let skip = page.len().saturating_sub(keep);
            page.drain(..skip);
            page.reverse();
            Ok(page)
        })
    }

    fn delete_message(&self, message_id: i64) -> ServiceFuture<'_, ClientResult<bool>> {
        Box::pin(async move {
            self.record("delete_message");
            let mut state = self.state();
            let mut found = false;
            for records in state.messages.values_mut() {
                let before = records.len();
                records.retain(|record| record.id != message_id);
                found |= records.len() < before;
            }
            Ok(found)
        })
    }
}

impl ChatService for FakeBackend {
    fn send_prompt(&self, request: ChatRequest) -> ServiceFuture<'_, ClientResult<ChatReply>> {
        Box::pin(async move {
            self.record("send_prompt");
            let gate = self.state().chat_gate.clone();
            Self::pass(gate).await;
            if self.state().fail_chat {
                return Err(server_error("model unavailable"));
            }
            let answer = format!("echo: {}", request.prompt);
            Ok(self.store_turn(request.conversation_id, request.prompt, answer))
        })
    }

    fn send_prompt_with_attachments(
        &self,
        conversation_id: i64,
        prompt: String,
        attachments: Vec<Attachment>,
    ) -> ServiceFuture<'_, ClientResult<ChatReply>> {
        Box::pin(async move {
            self.record("send_prompt_with_attachments");
            let gate = self.state().chat_gate.clone();
            Self::pass(gate).await;
            if self.state().fail_chat {
                return Err(server_error("model unavailable"));
            }
            let names: Vec<&str> = attachments
                .iter()
                .map(|attachment| attachment.file_name.as_str())
                .collect();
            let answer = format!("read {}: {prompt}", names.join(", "));
            let mut reply = self.store_turn(conversation_id, prompt, answer);
            // The upload endpoint never reports the stored message id.
            reply.message_id = None;
            Ok(reply)
        })
    }
}

impl NoteService for FakeBackend {
    fn create_note(
        &self,
        user_id: i64,
        title: Option<String>,
        content: String,
    ) -> ServiceFuture<'_, ClientResult<NoteRecord>> {
        Box::pin(async move {
            self.record("create_note");
            let mut state = self.state();
            let note = NoteRecord {
                id: state.allocate(),
                user_id,
                title,
                content,
                source: None,
            };
            state.notes.push(note.clone());
            Ok(note)
        })
    }

    fn get_note(&self, note_id: i64) -> ServiceFuture<'_, ClientResult<Option<NoteRecord>>> {
        Box::pin(async move {
            self.record("get_note");
            Ok(self
                .state()
                .notes
                .iter()
                .find(|note| note.id == note_id)
                .cloned())
        })
    }

    fn list_notes(&self, user_id: i64) -> ServiceFuture<'_, ClientResult<Vec<NoteRecord>>> {
        Box::pin(async move {
            self.record("list_notes");
            let mut notes: Vec<NoteRecord> = self
                .state()
                .notes
                .iter()
                .filter(|note| note.user_id == user_id)
                .cloned()
                .collect();
            notes.reverse();
            Ok(notes)
        })
    }

    fn update_note(
        &self,
        update: NoteUpdateBody,
    ) -> ServiceFuture<'_, ClientResult<Option<NoteRecord>>> {
        Box::pin(async move {
            self.record("update_note");
            let mut state = self.state();
            Ok(state
                .notes
                .iter_mut()
                .find(|note| note.id == update.note_id)
                .map(|note| {
                    if let Some(title) = update.title {
                        note.title = Some(title);
                    }
                    if let Some(content) = update.content {
                        note.content = content;
                    }
                    note.clone()
                }))
        })
    }

    fn delete_note(&self, note_id: i64) -> ServiceFuture<'_, ClientResult<bool>> {
        Box::pin(async move {
            self.record("delete_note");
            let mut state = self.state();
            let before = state.notes.len();
            state.notes.retain(|note| note.id != note_id);
            Ok(state.notes.len() < before)
        })
    }

    fn upload_notes(
        &self,
        user_id: i64,
        files: Vec<Attachment>,
    ) -> ServiceFuture<'_, ClientResult<Vec<NoteRecord>>> {
        Box::pin(async move {
            self.record("upload_notes");
            let mut state = self.state();
            let mut created = Vec::with_capacity(files.len());
            for file in files {
                let note = NoteRecord {
                    id: state.allocate(),
                    user_id,
                    title: Some(file.file_name),
                    content: String::from_utf8_lossy(&file.bytes).into_owned(),
                    source: Some("bulk_upload".to_string()),
                };
                state.notes.push(note.clone());
                created.push(note);
            }
            Ok(created)
        })
    }

    fn add_chat_message_to_notes(
        &self,
        user_id: i64,
        content: String,
        title: Option<String>,
    ) -> ServiceFuture<'_, ClientResult<NoteRef>> {
        Box::pin(async move {
            self.record("add_chat_message_to_notes");
            let mut state = self.state();
            let title = title.unwrap_or_else(|| "Chat Snippet".to_string());
            let note = NoteRecord {
                id: state.allocate(),
                user_id,
                title: Some(title.clone()),
                content,
                source: Some("chat".to_string()),
            };
            state.notes.push(note.clone());
            Ok(NoteRef {
                id: note.id,
                title: Some(title),
            })
        })
    }
}

impl AuthService for FakeBackend {
    fn login(&self, email: String, password: String) -> ServiceFuture<'_, ClientResult<UserRecord>> {
        Box::pin(async move {
            self.record("login");
            self.state()
                .users
                .iter()
                .find(|(user, secret)| user.email == email && *secret == password)
                .map(|(user, _)| user.clone())
                .ok_or_else(|| ClientError::Status {
                    status: 401,
                    body: "Invalid email or password".to_string(),
                })
        })
    }

    fn register(
        &self,
        email: String,
        password: String,
    ) -> ServiceFuture<'_, ClientResult<UserRecord>> {
        Box::pin(async move {
            self.record("register");
            if self.state().users.iter().any(|(user, _)| user.email == email) {
                return Err(ClientError::Status {
                    status: 400,
                    body: "Email already registered".to_string(),
                });
            }
            Ok(self.register_user(&email, &password))
        })
    }
}
