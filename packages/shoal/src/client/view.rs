//! Client view state
//!
//! Pure state for one chat session: the visible log, the pending queue and
//! unread counter while the user has paused scrolling, the transient typing
//! indicator, and the draft. Terminal I/O lives in session.rs; everything
//! here is synchronous and unit-testable.

use std::collections::VecDeque;

use crate::models::ChatMessage;

/// What a draft edit implies for typing notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftChange {
    /// First character landed in an empty draft
    StartedTyping,
    /// The draft went back to empty
    StoppedTyping,
    None,
}

pub struct ChatView {
    log: Vec<ChatMessage>,
    /// Messages held back while not following the tail
    pending: VecDeque<ChatMessage>,
    unread: usize,
    following: bool,
    typing_from: Option<String>,
    draft: String,
}

impl ChatView {
    pub fn new() -> Self {
        Self {
            log: Vec::new(),
            pending: VecDeque::new(),
            unread: 0,
            following: true,
            typing_from: None,
            draft: String::new(),
        }
    }

    pub fn load_history(&mut self, messages: Vec<ChatMessage>) {
        self.log.extend(messages);
    }

    /// Optimistic local echo: our own message always renders immediately,
    /// because the server will never send it back to us.
    pub fn push_local(&mut self, msg: ChatMessage) {
        self.log.push(msg);
    }

    /// A message pushed by the server. Returns true when it should render
    /// now; while paused it is queued and counted instead.
    pub fn push_remote(&mut self, msg: ChatMessage) -> bool {
        if self.following {
            self.log.push(msg);
            true
        } else {
            self.pending.push_back(msg);
            self.unread += 1;
            false
        }
    }

    /// Toggle follow mode. Resuming flushes the queue into the log and
    /// clears the unread counter; the returned messages are newly visible.
    pub fn toggle_follow(&mut self) -> Vec<ChatMessage> {
        self.following = !self.following;
        if self.following {
            self.unread = 0;
            let flushed: Vec<ChatMessage> = self.pending.drain(..).collect();
            self.log.extend(flushed.iter().cloned());
            flushed
        } else {
            Vec::new()
        }
    }

    pub fn is_following(&self) -> bool {
        self.following
    }

    pub fn unread(&self) -> usize {
        self.unread
    }

    pub fn log(&self) -> &[ChatMessage] {
        &self.log
    }

    /// The next typing event overwrites the current indicator.
    pub fn set_typing(&mut self, username: &str) {
        self.typing_from = Some(username.to_string());
    }

    /// Clears the indicator only when the name matches; a stale stop event
    /// for a previous typist must not erase the current one.
    pub fn clear_typing(&mut self, username: &str) {
        if self.typing_from.as_deref() == Some(username) {
            self.typing_from = None;
        }
    }

    pub fn typing_from(&self) -> Option<&str> {
        self.typing_from.as_deref()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn push_char(&mut self, c: char) -> DraftChange {
        let was_empty = self.draft.is_empty();
        self.draft.push(c);
        if was_empty {
            DraftChange::StartedTyping
        } else {
            DraftChange::None
        }
    }

    pub fn backspace(&mut self) -> DraftChange {
        if self.draft.pop().is_some() && self.draft.is_empty() {
            DraftChange::StoppedTyping
        } else {
            DraftChange::None
        }
    }

    /// Take the draft for sending, leaving it empty.
    pub fn take_draft(&mut self) -> String {
        std::mem::take(&mut self.draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn msg(user: &str, text: &str) -> ChatMessage {
        ChatMessage {
            id: None,
            user: user.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn local_echo_renders_immediately() {
        let mut view = ChatView::new();
        view.push_local(msg("me", "hello"));
        assert_eq!(view.log().len(), 1);
        assert_eq!(view.unread(), 0);
    }

    #[test]
    fn remote_messages_render_while_following() {
        let mut view = ChatView::new();
        assert!(view.push_remote(msg("Bob", "hi")));
        assert_eq!(view.log().len(), 1);
        assert_eq!(view.unread(), 0);
    }

    #[test]
    fn paused_view_accumulates_unread_instead_of_rendering() {
        let mut view = ChatView::new();
        view.toggle_follow();
        assert!(!view.is_following());

        assert!(!view.push_remote(msg("Bob", "one")));
        assert!(!view.push_remote(msg("Bob", "two")));
        assert_eq!(view.unread(), 2);
        assert!(view.log().is_empty());
    }

    #[test]
    fn resume_flushes_pending_in_order_and_clears_unread() {
        let mut view = ChatView::new();
        view.push_remote(msg("Bob", "before"));
        view.toggle_follow();
        view.push_remote(msg("Bob", "held one"));
        view.push_remote(msg("Carol", "held two"));

        let flushed = view.toggle_follow();
        assert_eq!(flushed.len(), 2);
        assert_eq!(flushed[0].text, "held one");
        assert_eq!(flushed[1].text, "held two");
        assert_eq!(view.unread(), 0);

        let texts: Vec<_> = view.log().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["before", "held one", "held two"]);
    }

    #[test]
    fn local_echo_still_renders_while_paused() {
        let mut view = ChatView::new();
        view.toggle_follow();
        view.push_local(msg("me", "mine"));
        assert_eq!(view.log().len(), 1);
        assert_eq!(view.unread(), 0);
    }

    #[test]
    fn typing_indicator_is_overwritten_by_next_event() {
        let mut view = ChatView::new();
        view.set_typing("Alice");
        view.set_typing("Bob");
        assert_eq!(view.typing_from(), Some("Bob"));
    }

    #[test]
    fn stale_stop_typing_does_not_clear_current_typist() {
        let mut view = ChatView::new();
        view.set_typing("Alice");
        view.set_typing("Bob");
        view.clear_typing("Alice");
        assert_eq!(view.typing_from(), Some("Bob"));

        view.clear_typing("Bob");
        assert_eq!(view.typing_from(), None);
    }

    #[test]
    fn draft_edits_report_typing_transitions() {
        let mut view = ChatView::new();
        assert_eq!(view.push_char('h'), DraftChange::StartedTyping);
        assert_eq!(view.push_char('i'), DraftChange::None);
        assert_eq!(view.backspace(), DraftChange::None);
        assert_eq!(view.backspace(), DraftChange::StoppedTyping);
        assert_eq!(view.backspace(), DraftChange::None);
    }

    #[test]
    fn take_draft_clears_it() {
        let mut view = ChatView::new();
        view.push_char('h');
        view.push_char('i');
        assert_eq!(view.take_draft(), "hi");
        assert_eq!(view.draft(), "");
    }
}
