//! Conversation synchronization core: ordering, pagination, optimistic turns.

pub mod list;
pub mod merge;
#[cfg(test)]
pub(crate) mod testing;
pub mod title;
pub mod types;
pub mod view;
pub mod viewport;

pub use list::ConversationList;
pub use title::TitleDeriver;
pub use types::{
    Attachment, Conversation, ConversationId, ConversationSummary, LocalId, Message, MessageId,
    MessageStatus, Role,
};
pub use view::{
    ConversationView, OlderPage, RecentPage, SkipReason, TurnOutcome, ViewBackends, ViewSnapshot,
};
pub use viewport::{LineViewport, ScrollAnchor, Viewport};
