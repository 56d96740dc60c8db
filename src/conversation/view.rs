//! The conversation view.
//!
//! [`ConversationView`] owns the conversation list, the active conversation
//! window and a small LRU of windows the user navigated away from. It merges
//! three sources of mutation into the active window:
//! - the most recent page, loaded when a conversation is opened;
//! - older pages, fetched when the user scrolls near the top;
//! - optimistic user messages and the replies that confirm them.
//!
//! State sits behind one async mutex that is never held across a network
//! call. Turns on the same conversation are serialized by a per-conversation
//! send lock. A response for a conversation that is no longer active only
//! touches that conversation's parked window, never the active one.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use lru::LruCache;
use tokio::sync::{Mutex, OwnedMutexGuard, watch};
use tracing::{debug, info, warn};

use crate::client::config::ClientConfig;
use crate::client::dto::{ChatRequest, ChatSource, ConversationRecord, NoteRef};
use crate::client::errors::{ClientError, ClientResult};
use crate::client::services::{ChatService, ConversationService, NoteService};
use crate::conversation::list::ConversationList;
use crate::conversation::merge;
use crate::conversation::title::TitleDeriver;
use crate::conversation::types::{
    Attachment, Conversation, ConversationId, ConversationSummary, LocalId, Message, MessageId,
    MessageStatus, Role, compose_user_content,
};
use crate::conversation::viewport::{ScrollAnchor, Viewport};
use crate::session::SessionContext;

/// Remote collaborators of the view.
#[derive(Clone)]
pub struct ViewBackends {
    /// Conversation list and message pages.
    pub conversations: Arc<dyn ConversationService>,
    /// Chat turns.
    pub chat: Arc<dyn ChatService>,
    /// Notes, for "save message to notes".
    pub notes: Arc<dyn NoteService>,
}

impl ViewBackends {
    /// Use one backend for every service.
    pub fn shared<B>(backend: Arc<B>) -> Self
    where
        B: ConversationService + ChatService + NoteService + 'static,
    {
        Self {
            conversations: Arc::clone(&backend) as Arc<dyn ConversationService>,
            chat: Arc::clone(&backend) as Arc<dyn ChatService>,
            notes: backend,
        }
    }
}

/// Outcome of [`ConversationView::load_most_recent_page`] and
/// [`ConversationView::open_conversation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecentPage {
    /// The page was fetched and replaced the window.
    Loaded {
        /// Messages in the window.
        messages: usize,
    },
    /// A cached window was reactivated without fetching.
    Restored {
        /// Messages in the window.
        messages: usize,
    },
    /// Another navigation happened while fetching; the page was cached only.
    Superseded,
}

/// Why an older-page request did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The conversation is not the active one.
    NotActive,
    /// Nothing loaded yet, or the conversation is empty.
    NoCursor,
    /// An older-page fetch is already outstanding.
    InFlight,
    /// The user navigated while the page was in flight.
    Superseded,
}

/// Outcome of [`ConversationView::load_older_page`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OlderPage {
    /// Older messages were merged.
    Merged {
        /// Messages actually inserted, after deduplication.
        added: usize,
        /// New cursor.
        cursor: i64,
    },
    /// Start of history reached; later requests are no-ops.
    Exhausted,
    /// Nothing was merged.
    Skipped(SkipReason),
}

/// Result of a successful turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Persisted conversation the turn went to.
    pub conversation_id: i64,
    /// Whether this turn promoted the transient conversation.
    pub promoted: bool,
    /// Id of the user message after reconciliation.
    pub user_message: MessageId,
    /// Id of the assistant message.
    pub assistant_message: MessageId,
    /// Assistant answer.
    pub answer: String,
    /// Notes cited by the answer.
    pub sources: Vec<ChatSource>,
}

/// Read-only copy of the view state for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSnapshot {
    /// Change counter at the time of the snapshot.
    pub revision: u64,
    /// Conversation list, most recently active first.
    pub conversations: Vec<ConversationSummary>,
    /// Active conversation.
    pub active: ConversationId,
    /// Title of the active conversation.
    pub title: Option<String>,
    /// Loaded window of the active conversation.
    pub messages: Vec<Message>,
    /// Upper bound of the next older-page fetch.
    pub cursor: Option<i64>,
    /// Whether the start of history was reached.
    pub history_exhausted: bool,
    /// Whether an older-page fetch is outstanding.
    pub loading_older: bool,
}

#[derive(Debug, Clone, Copy)]
struct Promotion {
    draft_token: u64,
    conversation_id: i64,
}

struct ViewState {
    list: ConversationList,
    active: Conversation,
    parked: LruCache<i64, Conversation>,
    older_in_flight: HashSet<i64>,
    next_local_seq: u64,
    /// Bumped whenever the active window is replaced; late pages compare against it.
    nav_epoch: u64,
    /// Bumped when a most-recent-page load starts; only the latest load may land.
    load_epoch: u64,
    /// Identifies the current transient conversation. A promotion only
    /// applies to the draft it was made for.
    draft_token: u64,
    promotion: Option<Promotion>,
    /// Conversations deleted in this view. Late replies must not resurrect them.
    deleted: HashSet<i64>,
}

impl ViewState {
    fn window(&self, id: ConversationId) -> Option<&Conversation> {
        if self.active.id == id {
            return Some(&self.active);
        }
        id.server_id().and_then(|server_id| self.parked.peek(&server_id))
    }

    fn window_mut(&mut self, id: ConversationId) -> Option<&mut Conversation> {
        if self.active.id == id {
            return Some(&mut self.active);
        }
        id.server_id()
            .and_then(|server_id| self.parked.peek_mut(&server_id))
    }

    fn next_local_id(&mut self, id: ConversationId) -> LocalId {
        self.next_local_seq += 1;
        let after = self
            .window(id)
            .and_then(|window| merge::newest_server_id(&window.messages))
            .unwrap_or(0);
        LocalId {
            after,
            seq: self.next_local_seq,
        }
    }

    /// Promoted id of the current draft, while that conversation is shown.
    fn promoted_draft(&self) -> Option<i64> {
        self.promotion
            .filter(|promotion| promotion.draft_token == self.draft_token)
            .map(|promotion| promotion.conversation_id)
            .filter(|id| self.active.id == ConversationId::Persisted(*id))
    }

    /// Make `next` active and return the previous window.
    ///
    /// The draft token is retired unless `next` is the conversation the
    /// current draft was promoted to.
    fn replace_active(&mut self, next: Conversation) -> Conversation {
        self.nav_epoch += 1;
        if let ConversationId::Persisted(id) = next.id {
            self.parked.pop(&id);
        }
        let keeps_draft = self
            .promotion
            .is_some_and(|promotion| {
                promotion.draft_token == self.draft_token
                    && next.id == ConversationId::Persisted(promotion.conversation_id)
            });
        if !keeps_draft {
            self.draft_token += 1;
        }
        std::mem::replace(&mut self.active, next)
    }

    /// Make `next` active, parking the previous window.
    fn switch_to(&mut self, next: Conversation) {
        let previous = self.replace_active(next);
        if let ConversationId::Persisted(id) = previous.id {
            if previous.loaded && self.active.id != previous.id {
                self.parked.put(id, previous);
            }
        }
    }
}

enum Fallback {
    Ready(ConversationId),
    Load(i64),
}

/// Paged, optimistically updated view over the conversations of one user.
pub struct ConversationView {
    backends: ViewBackends,
    session: SessionContext,
    page_size: u32,
    top_k: u32,
    titles: TitleDeriver,
    state: Mutex<ViewState>,
    send_locks: DashMap<ConversationId, Arc<Mutex<()>>>,
    revision: watch::Sender<u64>,
}

impl ConversationView {
    /// Create a view showing a fresh transient conversation.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: &ClientConfig,
        session: SessionContext,
        backends: ViewBackends,
    ) -> ClientResult<Self> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.cache.window_capacity).ok_or_else(|| {
            ClientError::InvalidConfig("cache.window_capacity must be > 0".to_string())
        })?;
        let titles = TitleDeriver::new(config.chat.title_max_chars)
            .map_err(|err| ClientError::InvalidConfig(format!("title patterns: {err}")))?;
        let (revision, _) = watch::channel(0);

        Ok(Self {
            backends,
            session,
            page_size: config.paging.page_size,
            top_k: config.chat.top_k,
            titles,
            state: Mutex::new(ViewState {
                list: ConversationList::new(),
                active: Conversation::transient(),
                parked: LruCache::new(capacity),
                older_in_flight: HashSet::new(),
                next_local_seq: 0,
                nav_epoch: 0,
                load_epoch: 0,
                draft_token: 0,
                promotion: None,
                deleted: HashSet::new(),
            }),
            send_locks: DashMap::new(),
            revision,
        })
    }

    /// Session the view acts for.
    #[must_use]
    pub const fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Receiver notified after every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    fn send_lock(&self, id: ConversationId) -> Arc<Mutex<()>> {
        Arc::clone(self.send_locks.entry(id).or_default().value())
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> ViewSnapshot {
        let state = self.state.lock().await;
        let loading_older = state
            .active
            .id
            .server_id()
            .is_some_and(|id| state.older_in_flight.contains(&id));
        ViewSnapshot {
            revision: *self.revision.borrow(),
            conversations: state.list.as_slice().to_vec(),
            active: state.active.id,
            title: state.active.title.clone(),
            messages: state.active.messages.clone(),
            cursor: state.active.cursor,
            history_exhausted: state.active.history_exhausted,
            loading_older,
        }
    }

    /// Id of the active conversation.
    pub async fn active_id(&self) -> ConversationId {
        self.state.lock().await.active.id
    }

    /// Replace the conversation list with the server's.
    ///
    /// # Errors
    /// Returns an error if the list cannot be fetched; the list is unchanged.
    pub async fn refresh_conversations(&self) -> ClientResult<usize> {
        let records = self
            .backends
            .conversations
            .list_conversations(self.session.user_id())
            .await?;
        let mut state = self.state.lock().await;
        state
            .list
            .replace(records.into_iter().map(ConversationSummary::from));
        if let ConversationId::Persisted(id) = state.active.id {
            if let Some(title) = state.list.title_of(id).map(str::to_string) {
                state.active.title = Some(title);
            }
        }
        let count = state.list.len();
        drop(state);
        self.bump();
        debug!(conversations = count, "conversation list refreshed");
        Ok(count)
    }

    /// Activate a fresh transient conversation. No network call.
    pub async fn new_chat(&self) {
        let mut state = self.state.lock().await;
        state.switch_to(Conversation::transient());
        drop(state);
        self.bump();
        debug!("new transient conversation");
    }

    /// Fetch the newest page of a conversation and make it the active window.
    ///
    /// The page replaces the window and the viewport is scrolled to the
    /// newest message. For the transient conversation nothing is fetched.
    ///
    /// # Errors
    /// Returns an error if the page cannot be fetched; the view is unchanged.
    pub async fn load_most_recent_page<V>(
        &self,
        conversation_id: ConversationId,
        viewport: &mut V,
    ) -> ClientResult<RecentPage>
    where
        V: Viewport + ?Sized,
    {
        let ConversationId::Persisted(id) = conversation_id else {
            self.new_chat().await;
            viewport.render(&[]);
            return Ok(RecentPage::Loaded { messages: 0 });
        };

        // A failed load leaves `nav_epoch` alone, so older-page fetches of
        // the still active window keep their result.
        let (ticket, epoch) = {
            let mut state = self.state.lock().await;
            state.load_epoch += 1;
            (state.load_epoch, state.nav_epoch)
        };
        let page = self
            .backends
            .conversations
            .fetch_messages(id, self.page_size, None)
            .await?;
        let messages = merge::normalize_page(page.into_iter().map(Message::from).collect());

        let mut state = self.state.lock().await;
        let conversation = Conversation {
            id: conversation_id,
            title: state.list.title_of(id).map(str::to_string),
            cursor: merge::oldest_server_id(&messages),
            messages,
            history_exhausted: false,
            loaded: true,
        };

        if state.load_epoch != ticket || state.nav_epoch != epoch {
            debug!(conversation_id = id, "page superseded by a later navigation");
            if state.active.id != conversation_id && !state.parked.contains(&id) {
                state.parked.put(id, conversation);
            }
            return Ok(RecentPage::Superseded);
        }

        let count = conversation.messages.len();
        state.switch_to(conversation);
        viewport.render(&state.active.messages);
        viewport.scroll_to_bottom();
        drop(state);
        self.bump();
        info!(conversation_id = id, messages = count, "loaded most recent page");
        Ok(RecentPage::Loaded { messages: count })
    }

    /// Switch to a listed conversation, reusing its cached window if any.
    ///
    /// # Errors
    /// Returns an error if the conversation is not listed or its page cannot be fetched.
    pub async fn open_conversation<V>(&self, id: i64, viewport: &mut V) -> ClientResult<RecentPage>
    where
        V: Viewport + ?Sized,
    {
        {
            let mut state = self.state.lock().await;
            if !state.list.contains(id) {
                return Err(ClientError::UnknownConversation(id.to_string()));
            }
            let target = ConversationId::Persisted(id);
            let restored = if state.active.id == target && state.active.loaded {
                true
            } else if let Some(cached) = state.parked.pop(&id) {
                state.switch_to(cached);
                true
            } else {
                false
            };
            if restored {
                let count = state.active.messages.len();
                viewport.render(&state.active.messages);
                viewport.scroll_to_bottom();
                drop(state);
                self.bump();
                debug!(conversation_id = id, "restored cached window");
                return Ok(RecentPage::Restored { messages: count });
            }
        }
        self.load_most_recent_page(ConversationId::Persisted(id), viewport)
            .await
    }

    /// Fetch the page before the cursor and prepend it, keeping the viewport
    /// on the messages the user was looking at.
    ///
    /// At most one fetch per conversation is outstanding; extra calls return
    /// [`OlderPage::Skipped`]. An empty page marks the start of history.
    ///
    /// # Errors
    /// Returns an error if the fetch fails. The in-flight guard is released
    /// either way.
    pub async fn load_older_page<V>(
        &self,
        conversation_id: ConversationId,
        viewport: &mut V,
    ) -> ClientResult<OlderPage>
    where
        V: Viewport + ?Sized,
    {
        let ConversationId::Persisted(id) = conversation_id else {
            return Ok(OlderPage::Skipped(SkipReason::NoCursor));
        };
        let (cursor, epoch) = {
            let mut state = self.state.lock().await;
            if state.active.id != conversation_id {
                return Ok(OlderPage::Skipped(SkipReason::NotActive));
            }
            if state.active.history_exhausted {
                return Ok(OlderPage::Exhausted);
            }
            let Some(cursor) = state.active.cursor else {
                return Ok(OlderPage::Skipped(SkipReason::NoCursor));
            };
            if !state.older_in_flight.insert(id) {
                return Ok(OlderPage::Skipped(SkipReason::InFlight));
            }
            (cursor, state.nav_epoch)
        };
        self.bump();
        debug!(conversation_id = id, cursor, "fetching older page");

        let fetched = self
            .backends
            .conversations
            .fetch_messages(id, self.page_size, Some(cursor))
            .await;

        let mut state = self.state.lock().await;
        state.older_in_flight.remove(&id);
        let outcome = match fetched {
            Err(err) => {
                warn!(conversation_id = id, error = %err, "older page fetch failed");
                Err(err)
            }
            Ok(_) if state.nav_epoch != epoch || state.active.id != conversation_id => {
                debug!(conversation_id = id, "older page dropped after navigation");
                Ok(OlderPage::Skipped(SkipReason::Superseded))
            }
            Ok(page) if page.is_empty() => {
                state.active.history_exhausted = true;
                info!(conversation_id = id, "start of history reached");
                Ok(OlderPage::Exhausted)
            }
            Ok(page) => {
                let page: Vec<Message> = page.into_iter().map(Message::from).collect();
                let page_oldest = merge::oldest_server_id(&page);

                let anchor = ScrollAnchor::capture(&*viewport);
                let added = merge::merge_older(&mut state.active.messages, page);
                let cursor = match merge::advance_cursor(Some(cursor), page_oldest) {
                    Some(next) => {
                        state.active.cursor = Some(next);
                        next
                    }
                    None => {
                        warn!(
                            conversation_id = id,
                            cursor, "older page did not reach below the cursor"
                        );
                        state.active.history_exhausted = true;
                        cursor
                    }
                };
                viewport.render(&state.active.messages);
                anchor.restore(viewport);
                debug!(conversation_id = id, added, cursor, "merged older page");
                Ok(OlderPage::Merged { added, cursor })
            }
        };
        drop(state);
        self.bump();
        outcome
    }

    /// Send a turn: optimistic user message, chat call, assistant reply.
    ///
    /// Sending to [`ConversationId::Transient`] first creates the conversation
    /// on the server and names it after the prompt; later turns to the same
    /// draft reuse that id. Turns on one conversation never interleave.
    ///
    /// # Errors
    /// Returns [`ClientError::EmptyTurn`] when there is nothing to send, or
    /// the remote error. After a failed chat call the user message stays in
    /// the window with [`MessageStatus::Failed`].
    pub async fn send_turn(
        &self,
        conversation_id: ConversationId,
        prompt: &str,
        attachments: Vec<Attachment>,
    ) -> ClientResult<TurnOutcome> {
        if prompt.trim().is_empty() && attachments.is_empty() {
            return Err(ClientError::EmptyTurn);
        }
        let (id, promoted, _turn) = self
            .acquire_turn(conversation_id, prompt, &attachments)
            .await?;
        let target = ConversationId::Persisted(id);

        let local = {
            let mut state = self.state.lock().await;
            if state.deleted.contains(&id) {
                return Err(ClientError::UnknownConversation(id.to_string()));
            }
            let local = state.next_local_id(target);
            let message = Message::optimistic(local, compose_user_content(prompt, &attachments));
            if let Some(window) = state.window_mut(target) {
                merge::upsert(&mut window.messages, message);
            }
            state.list.touch_front(id, None);
            local
        };
        self.bump();
        debug!(conversation_id = id, message = %MessageId::Local(local), "optimistic message added");

        let result = if attachments.is_empty() {
            let request = ChatRequest {
                conversation_id: id,
                prompt: prompt.to_string(),
                top_k: self.top_k,
            };
            self.backends.chat.send_prompt(request).await
        } else {
            self.backends
                .chat
                .send_prompt_with_attachments(id, prompt.to_string(), attachments)
                .await
        };

        let mut state = self.state.lock().await;
        let reply = match result {
            Ok(reply) => reply,
            Err(err) => {
                if let Some(message) = state.window_mut(target).and_then(|window| {
                    window
                        .messages
                        .iter_mut()
                        .find(|message| message.id == MessageId::Local(local))
                }) {
                    message.status = MessageStatus::Failed;
                }
                drop(state);
                self.bump();
                warn!(conversation_id = id, error = %err, "chat turn failed");
                return Err(err);
            }
        };

        let user_message = reply
            .user_message_id
            .map_or(MessageId::Local(local), MessageId::Server);
        let (assistant_message, status) = match reply.message_id {
            Some(server_id) => (MessageId::Server(server_id), MessageStatus::Confirmed),
            None => (
                MessageId::Local(state.next_local_id(target)),
                MessageStatus::Delivered,
            ),
        };
        let outcome = TurnOutcome {
            conversation_id: id,
            promoted,
            user_message,
            assistant_message,
            answer: reply.answer,
            sources: reply.sources,
        };
        if state.deleted.contains(&id) {
            drop(state);
            debug!(conversation_id = id, "reply for a deleted conversation dropped");
            return Ok(outcome);
        }
        if let Some(window) = state.window_mut(target) {
            confirm_user_message(window, local, user_message);
        }
        let is_active = state.active.id == target;
        match state.window_mut(target) {
            Some(window) => {
                merge::upsert(
                    &mut window.messages,
                    Message {
                        id: assistant_message,
                        role: Role::Assistant,
                        content: outcome.answer.clone(),
                        created_at: Some(Utc::now()),
                        status,
                    },
                );
            }
            None => debug!(conversation_id = id, "reply for a conversation no longer cached"),
        }
        state.list.touch_front(id, None);
        drop(state);
        self.bump();

        if !is_active {
            info!(conversation_id = id, "reply stored for inactive conversation");
        }
        Ok(outcome)
    }

    async fn acquire_turn(
        &self,
        conversation_id: ConversationId,
        prompt: &str,
        attachments: &[Attachment],
    ) -> ClientResult<(i64, bool, OwnedMutexGuard<()>)> {
        match conversation_id {
            ConversationId::Persisted(id) => {
                let guard = self.send_lock(conversation_id).lock_owned().await;
                Ok((id, false, guard))
            }
            ConversationId::Transient => self.acquire_draft(prompt, attachments).await,
        }
    }

    async fn acquire_draft(
        &self,
        prompt: &str,
        attachments: &[Attachment],
    ) -> ClientResult<(i64, bool, OwnedMutexGuard<()>)> {
        let token = {
            let state = self.state.lock().await;
            if !state.active.id.is_transient() && state.promoted_draft().is_none() {
                return Err(ClientError::UnknownConversation(
                    ConversationId::Transient.to_string(),
                ));
            }
            state.draft_token
        };

        let draft_guard = self
            .send_lock(ConversationId::Transient)
            .lock_owned()
            .await;
        let known = self
            .state
            .lock()
            .await
            .promotion
            .filter(|promotion| promotion.draft_token == token)
            .map(|promotion| promotion.conversation_id);
        let (id, promoted) = match known {
            Some(id) => (id, false),
            None => (self.promote(token, prompt, attachments).await?, true),
        };
        let guard = self
            .send_lock(ConversationId::Persisted(id))
            .lock_owned()
            .await;
        drop(draft_guard);
        Ok((id, promoted, guard))
    }

    /// Create the draft on the server and give it a title.
    async fn promote(&self, token: u64, prompt: &str, attachments: &[Attachment]) -> ClientResult<i64> {
        let record = self
            .backends
            .conversations
            .create_conversation(self.session.user_id())
            .await?;
        let id = record.id;
        let title = self.titles.derive(prompt, attachments);
        let title = match self
            .backends
            .conversations
            .rename_conversation(id, title.clone())
            .await
        {
            Ok(Some(ConversationRecord { title: renamed, .. })) => renamed.or(Some(title)),
            Ok(None) => {
                warn!(conversation_id = id, "new conversation vanished before rename");
                record.title
            }
            Err(err) => {
                warn!(conversation_id = id, error = %err, "naming new conversation failed");
                record.title
            }
        };

        let mut state = self.state.lock().await;
        state.promotion = Some(Promotion {
            draft_token: token,
            conversation_id: id,
        });
        if state.draft_token == token && state.active.id.is_transient() {
            state.active.id = ConversationId::Persisted(id);
            state.active.title.clone_from(&title);
        }
        state.list.touch_front(id, title);
        drop(state);
        self.bump();
        info!(conversation_id = id, "transient conversation promoted");
        Ok(id)
    }

    /// Delete a message by identity once the server confirmed it.
    ///
    /// Failed optimistic messages were never stored remotely and are removed
    /// locally only.
    ///
    /// # Errors
    /// Returns an error if the message is unknown, still unconfirmed, or the
    /// remote delete fails; the window is then unchanged.
    pub async fn delete_message(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> ClientResult<()> {
        let status = self
            .state
            .lock()
            .await
            .window(conversation_id)
            .and_then(|window| window.message(message_id))
            .map(|message| message.status)
            .ok_or_else(|| ClientError::UnknownMessage(message_id.to_string()))?;

        match (message_id, status) {
            (MessageId::Server(server_id), _) => {
                let acknowledged = self
                    .backends
                    .conversations
                    .delete_message(server_id)
                    .await?;
                if !acknowledged {
                    warn!(message_id = server_id, "backend had no such message");
                }
            }
            (MessageId::Local(_), MessageStatus::Failed) => {}
            (MessageId::Local(_), _) => {
                return Err(ClientError::UnconfirmedMessage(message_id.to_string()));
            }
        }

        let mut state = self.state.lock().await;
        if let Some(window) = state.window_mut(conversation_id) {
            merge::remove_by_id(&mut window.messages, message_id);
        }
        drop(state);
        self.bump();
        info!(conversation_id = %conversation_id, message_id = %message_id, "message deleted");
        Ok(())
    }

    /// Delete a conversation once the server confirmed it.
    ///
    /// If it was active, the view falls back to the first listed
    /// conversation, or to a fresh transient one when the list is empty.
    /// Returns the conversation active afterwards.
    ///
    /// # Errors
    /// Returns an error if the remote delete fails; nothing changes then.
    pub async fn delete_conversation<V>(
        &self,
        conversation_id: ConversationId,
        viewport: &mut V,
    ) -> ClientResult<ConversationId>
    where
        V: Viewport + ?Sized,
    {
        if let ConversationId::Persisted(id) = conversation_id {
            let acknowledged = self.backends.conversations.delete_conversation(id).await?;
            if !acknowledged {
                warn!(conversation_id = id, "backend had no such conversation");
            }
        }

        let fallback = {
            let mut state = self.state.lock().await;
            if let ConversationId::Persisted(id) = conversation_id {
                state.deleted.insert(id);
                state.list.remove(id);
                state.parked.pop(&id);
                self.send_locks.remove(&conversation_id);
            }
            if state.active.id == conversation_id {
                let fallback = match state.list.first().cloned() {
                    Some(next) => match state.parked.pop(&next.id) {
                        Some(cached) => {
                            state.replace_active(cached);
                            Fallback::Ready(ConversationId::Persisted(next.id))
                        }
                        None => {
                            state.replace_active(Conversation::unloaded(next.id, next.title));
                            Fallback::Load(next.id)
                        }
                    },
                    None => {
                        state.replace_active(Conversation::transient());
                        Fallback::Ready(ConversationId::Transient)
                    }
                };
                viewport.render(&state.active.messages);
                viewport.scroll_to_bottom();
                fallback
            } else {
                Fallback::Ready(state.active.id)
            }
        };
        self.bump();
        info!(conversation_id = %conversation_id, "conversation deleted");

        match fallback {
            Fallback::Ready(active) => Ok(active),
            Fallback::Load(next) => {
                let next = ConversationId::Persisted(next);
                if let Err(err) = self.load_most_recent_page(next, viewport).await {
                    warn!(conversation_id = %next, error = %err, "loading fallback conversation failed");
                }
                Ok(next)
            }
        }
    }

    /// Rename a conversation once the server confirmed it.
    ///
    /// # Errors
    /// Returns an error if the title is blank, the call fails, or the server
    /// does not know the conversation.
    pub async fn rename_conversation(&self, id: i64, title: &str) -> ClientResult<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ClientError::InvalidInput(
                "conversation title must not be empty".to_string(),
            ));
        }
        let record = self
            .backends
            .conversations
            .rename_conversation(id, title.to_string())
            .await?
            .ok_or_else(|| ClientError::Rejected(format!("rename of conversation {id}")))?;
        let title = record.title.unwrap_or_else(|| title.to_string());

        let mut state = self.state.lock().await;
        if !state.list.rename(id, title.clone()) {
            state.list.touch_front(id, Some(title.clone()));
        }
        if let Some(window) = state.window_mut(ConversationId::Persisted(id)) {
            window.title = Some(title);
        }
        drop(state);
        self.bump();
        Ok(())
    }

    /// Store the content of a message of the active window as a note.
    ///
    /// # Errors
    /// Returns an error if the message is not in the active window or the call fails.
    pub async fn save_message_to_notes(
        &self,
        message_id: MessageId,
        title: Option<String>,
    ) -> ClientResult<NoteRef> {
        let content = self
            .state
            .lock()
            .await
            .active
            .message(message_id)
            .map(|message| message.content.clone())
            .ok_or_else(|| ClientError::UnknownMessage(message_id.to_string()))?;
        let note = self
            .backends
            .notes
            .add_chat_message_to_notes(self.session.user_id(), content, title)
            .await?;
        info!(note_id = note.id, message_id = %message_id, "message saved to notes");
        Ok(note)
    }
}

fn confirm_user_message(window: &mut Conversation, local: LocalId, confirmed: MessageId) {
    let local = MessageId::Local(local);
    if confirmed != local && !merge::reassign_id(&mut window.messages, local, confirmed) {
        return;
    }
    let status = if confirmed.server_id().is_some() {
        MessageStatus::Confirmed
    } else {
        MessageStatus::Delivered
    };
    if let Some(message) = window
        .messages
        .iter_mut()
        .find(|message| message.id == confirmed)
    {
        message.status = status;
    }
}
