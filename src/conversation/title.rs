//! Titles for conversations promoted on their first send.

use regex::Regex;

use crate::conversation::types::Attachment;

/// Title used when neither prompt text nor attachment name is usable.
pub const DEFAULT_TITLE: &str = "New conversation";

const ELLIPSIS: &str = "...";

/// Derives a display title from the first prompt of a conversation.
#[derive(Debug, Clone)]
pub struct TitleDeriver {
    max_chars: usize,
    markup: Regex,
    whitespace: Regex,
}

impl TitleDeriver {
    /// Build a deriver truncating to `max_chars` characters.
    ///
    /// # Errors
    /// Returns an error if the internal patterns fail to compile.
    pub fn new(max_chars: usize) -> Result<Self, regex::Error> {
        Ok(Self {
            max_chars: max_chars.max(1),
            markup: Regex::new(r"[#*_`>~\[\]|]+")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Title for a first turn: the cleaned prompt, else the first attachment name.
    #[must_use]
    pub fn derive(&self, prompt: &str, attachments: &[Attachment]) -> String {
        let cleaned = self.clean(prompt);
        let source = if cleaned.is_empty() {
            attachments
                .first()
                .map(|attachment| self.clean(&attachment.file_name))
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_TITLE.to_string())
        } else {
            cleaned
        };
        self.truncate(&source)
    }

    fn clean(&self, raw: &str) -> String {
        let stripped = self.markup.replace_all(raw, "");
        self.whitespace.replace_all(&stripped, " ").trim().to_string()
    }

    fn truncate(&self, text: &str) -> String {
        if text.chars().count() <= self.max_chars {
            return text.to_string();
        }
        let head: String = text.chars().take(self.max_chars).collect();
        format!("{}{ELLIPSIS}", head.trim_end())
    }
}
