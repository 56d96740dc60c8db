//! Content-height oracle and scroll anchoring.
//!
//! The view never measures anything itself. It asks a [`Viewport`] for the
//! scroll offset and content height before a merge, lets it re-render, then
//! asks again and shifts the offset by the height delta.

use crate::conversation::types::{Message, MessageStatus};

/// Presentation surface queried around window mutations.
pub trait Viewport: Send {
    /// Current scroll offset, from the top of the content.
    fn scroll_offset(&self) -> usize;

    /// Total scrollable content height.
    fn content_height(&self) -> usize;

    /// Re-render the content for `messages`.
    fn render(&mut self, messages: &[Message]);

    /// Move the scroll offset.
    fn set_scroll_offset(&mut self, offset: usize);

    /// Show the newest message.
    fn scroll_to_bottom(&mut self) {
        let height = self.content_height();
        self.set_scroll_offset(height);
    }
}

/// Scroll position captured before a prepend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollAnchor {
    /// Offset before the mutation.
    pub offset: usize,
    /// Content height before the mutation.
    pub height: usize,
}

impl ScrollAnchor {
    /// Capture the current position of `viewport`.
    pub fn capture<V: Viewport + ?Sized>(viewport: &V) -> Self {
        Self {
            offset: viewport.scroll_offset(),
            height: viewport.content_height(),
        }
    }

    /// Offset keeping the same content in view once the height became `new_height`.
    #[must_use]
    pub const fn restored_offset(&self, new_height: usize) -> usize {
        if new_height >= self.height {
            self.offset.saturating_add(new_height - self.height)
        } else {
            self.offset.saturating_sub(self.height - new_height)
        }
    }

    /// Apply [`Self::restored_offset`] to a re-rendered viewport.
    pub fn restore<V: Viewport + ?Sized>(&self, viewport: &mut V) {
        let offset = self.restored_offset(viewport.content_height());
        viewport.set_scroll_offset(offset);
    }
}

/// Terminal viewport: one row per wrapped line.
#[derive(Debug, Clone)]
pub struct LineViewport {
    columns: usize,
    visible_rows: usize,
    lines: Vec<String>,
    offset: usize,
}

impl LineViewport {
    /// Create a viewport `columns` wide showing `visible_rows` rows.
    #[must_use]
    pub fn new(columns: usize, visible_rows: usize) -> Self {
        Self {
            columns: columns.max(1),
            visible_rows: visible_rows.max(1),
            lines: Vec::new(),
            offset: 0,
        }
    }

    /// Rows currently in view.
    #[must_use]
    pub fn visible(&self) -> &[String] {
        let end = self.offset.saturating_add(self.visible_rows).min(self.lines.len());
        let start = self.offset.min(end);
        &self.lines[start..end]
    }

    /// Every rendered row.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    const fn max_offset(&self) -> usize {
        self.lines.len().saturating_sub(self.visible_rows)
    }

    fn push_wrapped(&mut self, text: &str) {
        for paragraph in text.split('\n') {
            let chars: Vec<char> = paragraph.chars().collect();
            if chars.is_empty() {
                self.lines.push(String::new());
                continue;
            }
            for chunk in chars.chunks(self.columns) {
                self.lines.push(chunk.iter().collect());
            }
        }
    }
}

impl Viewport for LineViewport {
    fn scroll_offset(&self) -> usize {
        self.offset
    }

    fn content_height(&self) -> usize {
        self.lines.len()
    }

    fn render(&mut self, messages: &[Message]) {
        self.lines.clear();
        for message in messages {
            let marker = match message.status {
                MessageStatus::Pending => " (sending)",
                MessageStatus::Failed => " (failed)",
                MessageStatus::Delivered | MessageStatus::Confirmed => "",
            };
            self.lines
                .push(format!("[{}] {}{marker}", message.id, message.role));
            self.push_wrapped(&message.content);
            self.lines.push(String::new());
        }
        self.offset = self.offset.min(self.max_offset());
    }

    fn set_scroll_offset(&mut self, offset: usize) {
        self.offset = offset.min(self.max_offset());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::types::{MessageId, Role};

    fn msg(id: i64, content: &str) -> Message {
        Message {
            id: MessageId::Server(id),
            role: Role::Assistant,
            content: content.to_string(),
            created_at: None,
            status: MessageStatus::Confirmed,
        }
    }

    #[test]
    fn test_restored_offset_adds_height_delta() {
        let anchor = ScrollAnchor {
            offset: 7,
            height: 40,
        };
        assert_eq!(anchor.restored_offset(55), 22);
        assert_eq!(anchor.restored_offset(40), 7);
        assert_eq!(anchor.restored_offset(35), 2);
    }

    #[test]
    fn test_wrapping() {
        let mut viewport = LineViewport::new(4, 10);
        viewport.render(&[msg(1, "abcdefghij\n\nxy")]);
        assert_eq!(
            viewport.lines(),
            ["[1] assistant", "abcd", "efgh", "ij", "", "xy", ""]
        );
    }

    #[test]
    fn test_anchor_keeps_same_rows_visible() {
        let mut viewport = LineViewport::new(20, 3);
        let mut window = vec![msg(10, "ten"), msg(11, "eleven"), msg(12, "twelve")];
        viewport.render(&window);
        viewport.set_scroll_offset(3);
        let before: Vec<String> = viewport.visible().to_vec();

        let anchor = ScrollAnchor::capture(&viewport);
        window.insert(0, msg(9, "nine\nmore"));
        viewport.render(&window);
        anchor.restore(&mut viewport);

        assert_eq!(viewport.scroll_offset(), 3 + 4);
        assert_eq!(viewport.visible(), before.as_slice());
    }

    #[test]
    fn test_scroll_to_bottom_clamps() {
        let mut viewport = LineViewport::new(20, 2);
        viewport.render(&[msg(1, "a"), msg(2, "b")]);
        viewport.scroll_to_bottom();
        assert_eq!(viewport.scroll_offset(), 4);
        assert_eq!(viewport.visible(), ["b", ""]);
    }
}
