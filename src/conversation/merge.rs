//! Ordering and merge primitives for a conversation window.
//!
//! All functions keep a window strictly ascending by [`MessageId`] with no
//! duplicate ids.

use std::collections::HashSet;

use crate::conversation::types::{Message, MessageId};

/// Sort a page and drop repeated ids, keeping the first occurrence.
#[must_use]
pub fn normalize_page(mut page: Vec<Message>) -> Vec<Message> {
    page.sort_by_key(|message| message.id);
    page.dedup_by_key(|message| message.id);
    page
}

/// Merge an older page into `window`.
///
/// Messages whose id is already loaded are skipped. Returns the number of
/// messages actually added.
pub fn merge_older(window: &mut Vec<Message>, page: Vec<Message>) -> usize {
    let mut known: HashSet<MessageId> = window.iter().map(|message| message.id).collect();
    let mut to_add: Vec<Message> = page
        .into_iter()
        .filter(|message| known.insert(message.id))
        .collect();

    if to_add.is_empty() {
        return 0;
    }
    let added = to_add.len();
    to_add.sort_by_key(|message| message.id);

    let fits_before = match (to_add.last(), window.first()) {
        (Some(last_new), Some(first_old)) => last_new.id < first_old.id,
        _ => true,
    };
    if fits_before {
        // Pagination case: everything is older than the window.
        to_add.append(window);
        *window = to_add;
    } else {
        window.extend(to_add);
        window.sort_by_key(|message| message.id);
    }
    added
}

/// Insert or replace a message, keeping the window sorted.
///
/// Returns `true` when the message was new.
pub fn upsert(window: &mut Vec<Message>, message: Message) -> bool {
    match window.binary_search_by_key(&message.id, |existing| existing.id) {
        Ok(pos) => {
            window[pos] = message;
            false
        }
        Err(pos) => {
            window.insert(pos, message);
            true
        }
    }
}

/// Change a message id in place and restore ordering.
///
/// If another message already carries `to`, the renamed one replaces it.
/// Returns `false` when `from` is not in the window.
pub fn reassign_id(window: &mut Vec<Message>, from: MessageId, to: MessageId) -> bool {
    let Some(mut message) = remove_by_id(window, from) else {
        return false;
    };
    message.id = to;
    upsert(window, message);
    true
}

/// Remove a message by identity, never by position.
pub fn remove_by_id(window: &mut Vec<Message>, id: MessageId) -> Option<Message> {
    let pos = window.iter().position(|message| message.id == id)?;
    Some(window.remove(pos))
}

/// Highest server id in the window.
#[must_use]
pub fn newest_server_id(window: &[Message]) -> Option<i64> {
    window.iter().filter_map(|message| message.id.server_id()).max()
}

/// Lowest server id in the window.
#[must_use]
pub fn oldest_server_id(window: &[Message]) -> Option<i64> {
    window.iter().filter_map(|message| message.id.server_id()).min()
}

/// Next cursor after a merge: only ever moves strictly backwards.
///
/// Returns `None` when the merged messages do not extend history below
/// `current`.
#[must_use]
pub fn advance_cursor(current: Option<i64>, merged_oldest: Option<i64>) -> Option<i64> {
    match (current, merged_oldest) {
        (Some(current), Some(oldest)) if oldest < current => Some(oldest),
        (None, Some(oldest)) => Some(oldest),
        _ => None,
    }
}

/// Whether ids are strictly ascending.
#[must_use]
pub fn is_strictly_ascending(window: &[Message]) -> bool {
    window.windows(2).all(|pair| pair[0].id < pair[1].id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::types::{LocalId, MessageStatus, Role};

    fn msg(id: i64) -> Message {
        Message {
            id: MessageId::Server(id),
            role: Role::User,
            content: format!("m{id}"),
            created_at: None,
            status: MessageStatus::Confirmed,
        }
    }

    fn ids(window: &[Message]) -> Vec<MessageId> {
        window.iter().map(|message| message.id).collect()
    }

    #[test]
    fn test_merge_older_prepends() {
        let mut window = vec![msg(20), msg(21)];
        let added = merge_older(&mut window, vec![msg(19), msg(17), msg(18)]);
        assert_eq!(added, 3);
        assert_eq!(
            ids(&window),
            [17, 18, 19, 20, 21].map(MessageId::Server).to_vec()
        );
    }

    #[test]
    fn test_merge_same_page_twice_is_idempotent() {
        let mut window = vec![msg(20), msg(21)];
        let page = vec![msg(18), msg(19)];
        merge_older(&mut window, page.clone());
        let added = merge_older(&mut window, page);
        assert_eq!(added, 0);
        assert_eq!(window.len(), 4);
        assert!(is_strictly_ascending(&window));
    }

    #[test]
    fn test_merge_overlapping_page_falls_back_to_sort() {
        let mut window = vec![msg(10), msg(30)];
        let added = merge_older(&mut window, vec![msg(30), msg(20), msg(5), msg(20)]);
        assert_eq!(added, 2);
        assert_eq!(ids(&window), [5, 10, 20, 30].map(MessageId::Server).to_vec());
    }

    #[test]
    fn test_ordering_holds_across_sequences() {
        let mut window = normalize_page(vec![msg(50), msg(48), msg(49), msg(48)]);
        assert_eq!(window.len(), 3);
        let local = MessageId::Local(LocalId { after: 50, seq: 1 });
        upsert(
            &mut window,
            Message {
                id: local,
                ..msg(0)
            },
        );
        merge_older(&mut window, vec![msg(45), msg(47)]);
        merge_older(&mut window, vec![msg(46), msg(44)]);
        assert!(is_strictly_ascending(&window));
        assert_eq!(window.last().map(|message| message.id), Some(local));
    }

    #[test]
    fn test_delete_by_identity_after_prepend() {
        let mut window = vec![msg(42), msg(77)];
        merge_older(&mut window, vec![msg(10)]);
        let removed = remove_by_id(&mut window, MessageId::Server(42));
        assert_eq!(removed.map(|message| message.id), Some(MessageId::Server(42)));
        assert_eq!(ids(&window), [10, 77].map(MessageId::Server).to_vec());
        assert!(remove_by_id(&mut window, MessageId::Server(42)).is_none());
    }

    #[test]
    fn test_reassign_id_keeps_order() {
        let local = MessageId::Local(LocalId { after: 3, seq: 9 });
        let mut window = vec![msg(3), Message { id: local, ..msg(0) }];
        assert!(reassign_id(&mut window, local, MessageId::Server(4)));
        assert_eq!(ids(&window), [3, 4].map(MessageId::Server).to_vec());
        assert!(!reassign_id(&mut window, local, MessageId::Server(5)));
    }

    #[test]
    fn test_cursor_only_moves_backwards() {
        assert_eq!(advance_cursor(Some(20), Some(11)), Some(11));
        assert_eq!(advance_cursor(Some(20), Some(20)), None);
        assert_eq!(advance_cursor(Some(20), Some(25)), None);
        assert_eq!(advance_cursor(Some(20), None), None);
        assert_eq!(advance_cursor(None, Some(3)), Some(3));
    }

    #[test]
    fn test_server_id_bounds_ignore_local_ids() {
        let local = MessageId::Local(LocalId { after: 99, seq: 1 });
        let window = vec![msg(7), msg(9), Message { id: local, ..msg(0) }];
        assert_eq!(newest_server_id(&window), Some(9));
        assert_eq!(oldest_server_id(&window), Some(7));
        assert_eq!(newest_server_id(&[]), None);
    }
}
