//! Startup and line-oriented front end of the `recallai` binary.
//!
//! Plain lines are sent as chat turns to the active conversation. Lines
//! starting with `/` are commands, see [`Command`].

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};

use crate::client::config::ClientConfig;
use crate::client::errors::{ClientError, ClientResult};
use crate::client::http::HttpBackend;
use crate::client::services::{AuthService, NoteService};
use crate::conversation::types::{Attachment, ConversationId, MessageId};
use crate::conversation::view::{ConversationView, OlderPage, RecentPage, ViewBackends};
use crate::conversation::viewport::{LineViewport, Viewport};
use crate::notes::NotesBook;
use crate::session::{IdentityStore, SessionContext};

/// Environment variable holding the login email used when no identity is cached.
pub const EMAIL_ENV: &str = "RECALLAI_EMAIL";
/// Environment variable holding the login password used when no identity is cached.
pub const PASSWORD_ENV: &str = "RECALLAI_PASSWORD";

const COLUMNS: usize = 100;
const ROWS: usize = 30;

/// Run the terminal client.
///
/// # Returns
/// `ExitCode::SUCCESS` on `/quit` or end of input, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting RecallAI client v{}", env!("CARGO_PKG_VERSION"));

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };
    tracing::info!("Backend endpoint: {}", config.http.base_url);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(run_client(config)) {
        tracing::error!("Client error: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Sign in, load conversations and notes, then serve stdin until `/quit`.
///
/// # Errors
/// Returns an error if the session cannot be opened, the initial listing
/// fails, or the terminal cannot be read or written.
pub async fn run_client(config: ClientConfig) -> ClientResult<()> {
    let backend = Arc::new(HttpBackend::new(&config.http)?);
    let store = IdentityStore::new(config.session.identity_path.clone());
    let session = open_session(backend.as_ref(), &store).await?;
    tracing::info!(
        user_id = session.user_id(),
        session = %session.session_tag(),
        "session opened"
    );

    let view = ConversationView::new(
        &config,
        session.clone(),
        ViewBackends::shared(Arc::clone(&backend)),
    )?;
    let notes = NotesBook::new(Arc::clone(&backend) as Arc<dyn NoteService>, session);

    let (conversations, known_notes) =
        futures::try_join!(view.refresh_conversations(), notes.list())?;
    tracing::info!(conversations, notes = known_notes.len(), "ready");

    let mut terminal = Terminal {
        view,
        notes,
        store,
        viewport: LineViewport::new(COLUMNS, ROWS),
        out: tokio::io::stdout(),
    };
    terminal.list().await?;
    terminal.serve().await
}

async fn open_session(auth: &dyn AuthService, store: &IdentityStore) -> ClientResult<SessionContext> {
    if let Some(session) = SessionContext::restore(store).await? {
        return Ok(session);
    }
    match (std::env::var(EMAIL_ENV), std::env::var(PASSWORD_ENV)) {
        (Ok(email), Ok(password)) => SessionContext::sign_in(auth, store, &email, &password).await,
        _ => Err(ClientError::NotSignedIn),
    }
}

/// Message reference typed by the user: a server id or `local-<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRef {
    /// Server id.
    Server(i64),
    /// Sequence number of a provisional id.
    Local(u64),
}

impl MessageRef {
    fn parse(raw: &str) -> ClientResult<Self> {
        let raw = raw.trim();
        let parsed = match raw.strip_prefix("local-") {
            Some(seq) => seq.parse().map(Self::Local).ok(),
            None => raw.parse().map(Self::Server).ok(),
        };
        parsed.ok_or_else(|| ClientError::InvalidInput(format!("not a message id: {raw:?}")))
    }

    const fn matches(self, id: MessageId) -> bool {
        match (self, id) {
            (Self::Server(wanted), MessageId::Server(actual)) => wanted == actual,
            (Self::Local(wanted), MessageId::Local(actual)) => wanted == actual.seq,
            _ => false,
        }
    }
}

/// One line of terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send a prompt to the active conversation.
    Send(String),
    /// `/new`: start a transient conversation.
    New,
    /// `/open <id>`: switch conversation.
    Open(i64),
    /// `/older`: load the previous page.
    Older,
    /// `/delete <id>`: delete a conversation.
    Delete(i64),
    /// `/rm <message>`: delete a message of the active conversation.
    DeleteMessage(MessageRef),
    /// `/rename <title>`: rename the active conversation.
    Rename(String),
    /// `/attach <path> <prompt>`: send a prompt with a file.
    Attach {
        /// File to attach.
        path: PathBuf,
        /// Prompt text, may be empty.
        prompt: String,
    },
    /// `/note <message>`: save a message to notes.
    Note(MessageRef),
    /// `/list`: show conversations.
    List,
    /// `/quit`: leave.
    Quit,
}

impl Command {
    /// Parse a line. Blank lines yield `None`.
    ///
    /// # Errors
    /// Returns [`ClientError::InvalidInput`] for unknown commands or bad arguments.
    pub fn parse(line: &str) -> ClientResult<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let Some(command) = line.strip_prefix('/') else {
            return Ok(Some(Self::Send(line.to_string())));
        };
        let (name, rest) = command
            .split_once(char::is_whitespace)
            .map_or((command, ""), |(name, rest)| (name, rest.trim()));

        let parsed = match name {
            "new" => Self::New,
            "older" => Self::Older,
            "list" => Self::List,
            "quit" | "exit" => Self::Quit,
            "open" => Self::Open(parse_id(rest)?),
            "delete" => Self::Delete(parse_id(rest)?),
            "rm" => Self::DeleteMessage(MessageRef::parse(rest)?),
            "note" => Self::Note(MessageRef::parse(rest)?),
            "rename" if !rest.is_empty() => Self::Rename(rest.to_string()),
            "attach" if !rest.is_empty() => {
                let (path, prompt) = rest
                    .split_once(char::is_whitespace)
                    .map_or((rest, ""), |(path, prompt)| (path, prompt.trim()));
                Self::Attach {
                    path: PathBuf::from(path),
                    prompt: prompt.to_string(),
                }
            }
            "rename" | "attach" => {
                return Err(ClientError::InvalidInput(format!("/{name} needs an argument")));
            }
            other => {
                return Err(ClientError::InvalidInput(format!("unknown command /{other}")));
            }
        };
        Ok(Some(parsed))
    }
}

fn parse_id(raw: &str) -> ClientResult<i64> {
    raw.parse()
        .map_err(|_| ClientError::InvalidInput(format!("not a conversation id: {raw:?}")))
}

struct Terminal {
    view: ConversationView,
    notes: NotesBook,
    store: IdentityStore,
    viewport: LineViewport,
    out: Stdout,
}

impl Terminal {
    async fn serve(&mut self) -> ClientResult<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let command = match Command::parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(err) => {
                    self.emit(&err.to_string()).await?;
                    continue;
                }
            };
            if command == Command::Quit {
                break;
            }
            if let Err(err) = self.execute(command).await {
                if matches!(err, ClientError::Io(_)) {
                    return Err(err);
                }
                tracing::warn!(error = %err, retryable = err.is_retryable(), "command failed");
                self.emit(&format!("error: {err}")).await?;
            }
        }
        tracing::debug!(identity = %self.store.path().display(), "leaving, identity kept");
        Ok(())
    }

    async fn execute(&mut self, command: Command) -> ClientResult<()> {
        match command {
            Command::Send(prompt) => self.send(&prompt, Vec::new()).await,
            Command::Attach { path, prompt } => {
                let attachment = Attachment::from_path(&path).await?;
                self.send(&prompt, vec![attachment]).await
            }
            Command::New => {
                self.view.new_chat().await;
                self.viewport.render(&[]);
                self.emit("new conversation").await
            }
            Command::Open(id) => {
                match self.view.open_conversation(id, &mut self.viewport).await? {
                    RecentPage::Superseded => Ok(()),
                    RecentPage::Loaded { .. } | RecentPage::Restored { .. } => self.show().await,
                }
            }
            Command::Older => {
                let active = self.view.active_id().await;
                match self.view.load_older_page(active, &mut self.viewport).await? {
                    OlderPage::Merged { added, .. } => {
                        self.emit(&format!("{added} older messages loaded")).await?;
                        self.show().await
                    }
                    OlderPage::Exhausted => self.emit("start of conversation").await,
                    OlderPage::Skipped(reason) => {
                        tracing::debug!(?reason, "older page skipped");
                        Ok(())
                    }
                }
            }
            Command::Delete(id) => {
                let active = self
                    .view
                    .delete_conversation(ConversationId::Persisted(id), &mut self.viewport)
                    .await?;
                self.emit(&format!("deleted conversation {id}, now in {active}"))
                    .await?;
                self.show().await
            }
            Command::DeleteMessage(target) => {
                let (active, message) = self.resolve(target).await?;
                self.view.delete_message(active, message).await?;
                self.rerender().await;
                self.show().await
            }
            Command::Rename(title) => {
                let Some(id) = self.view.active_id().await.server_id() else {
                    return Err(ClientError::InvalidInput(
                        "send a message before renaming".to_string(),
                    ));
                };
                self.view.rename_conversation(id, &title).await?;
                self.list().await
            }
            Command::Note(target) => {
                let (_, message) = self.resolve(target).await?;
                let note = self.view.save_message_to_notes(message, None).await?;
                let total = self.notes.list().await?.len();
                self.emit(&format!("saved as note {} ({total} notes)", note.id))
                    .await
            }
            Command::List => self.list().await,
            Command::Quit => Ok(()),
        }
    }

    async fn send(&mut self, prompt: &str, attachments: Vec<Attachment>) -> ClientResult<()> {
        let active = self.view.active_id().await;
        let result = self.view.send_turn(active, prompt, attachments).await;
        // The window changed even when the turn failed.
        self.rerender().await;
        self.viewport.scroll_to_bottom();
        let outcome = result?;
        if outcome.promoted {
            tracing::info!(conversation_id = outcome.conversation_id, "conversation created");
        }
        self.show().await?;
        for source in &outcome.sources {
            let title = source.title.as_deref().unwrap_or("untitled");
            self.emit(&format!("  source: note {} ({title})", source.note_id))
                .await?;
        }
        Ok(())
    }

    async fn resolve(&self, target: MessageRef) -> ClientResult<(ConversationId, MessageId)> {
        let snapshot = self.view.snapshot().await;
        snapshot
            .messages
            .iter()
            .find(|message| target.matches(message.id))
            .map(|message| (snapshot.active, message.id))
            .ok_or_else(|| ClientError::UnknownMessage(format!("{target:?}")))
    }

    async fn rerender(&mut self) {
        let snapshot = self.view.snapshot().await;
        self.viewport.render(&snapshot.messages);
    }

    async fn show(&mut self) -> ClientResult<()> {
        let text = self.viewport.visible().join("\n");
        self.emit(&text).await
    }

    async fn list(&mut self) -> ClientResult<()> {
        let snapshot = self.view.snapshot().await;
        let mut text = String::from("conversations:");
        for entry in &snapshot.conversations {
            let marker = if snapshot.active == ConversationId::Persisted(entry.id) {
                '*'
            } else {
                ' '
            };
            let title = entry.title.as_deref().unwrap_or("(untitled)");
            text.push_str(&format!("\n{marker} {:>5}  {title}", entry.id));
        }
        self.emit(&text).await
    }

    async fn emit(&mut self, text: &str) -> ClientResult<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await?;
        Ok(())
    }
}
