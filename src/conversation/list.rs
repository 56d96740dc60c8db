//! Sidebar list of persisted conversations, most recently active first.

use crate::conversation::types::ConversationSummary;

/// Ordered list of conversations. Ids are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationList {
    entries: Vec<ConversationSummary>,
}

impl ConversationList {
    /// Empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Replace the whole list, keeping server order and dropping repeated ids.
    pub fn replace(&mut self, entries: impl IntoIterator<Item = ConversationSummary>) {
        self.entries.clear();
        for entry in entries {
            if !self.contains(entry.id) {
                self.entries.push(entry);
            }
        }
    }

    /// Move a conversation to position 0, inserting it if missing.
    ///
    /// A known title is kept when `title` is `None`.
    pub fn touch_front(&mut self, id: i64, title: Option<String>) {
        let existing = self.remove(id);
        let title = title.or_else(|| existing.and_then(|entry| entry.title));
        self.entries.insert(0, ConversationSummary { id, title });
    }

    /// Remove a conversation by id.
    pub fn remove(&mut self, id: i64) -> Option<ConversationSummary> {
        let pos = self.entries.iter().position(|entry| entry.id == id)?;
        Some(self.entries.remove(pos))
    }

    /// Set a title. Returns `false` if the conversation is not listed.
    pub fn rename(&mut self, id: i64, title: String) -> bool {
        match self.entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.title = Some(title);
                true
            }
            None => false,
        }
    }

    /// First entry.
    #[must_use]
    pub fn first(&self) -> Option<&ConversationSummary> {
        self.entries.first()
    }

    /// Title of a listed conversation.
    #[must_use]
    pub fn title_of(&self, id: i64) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .and_then(|entry| entry.title.as_deref())
    }

    /// Whether `id` is listed.
    #[must_use]
    pub fn contains(&self, id: i64) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    /// Position of `id` in the list.
    #[must_use]
    pub fn position(&self, id: i64) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in display order.
    pub fn iter(&self) -> impl Iterator<Item = &ConversationSummary> {
        self.entries.iter()
    }

    /// Entries as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[ConversationSummary] {
        &self.entries
    }
}
