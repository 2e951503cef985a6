pub mod models;

use chrono::{DateTime, Utc};
use models::{Conversation, Message, SensitiveDataNotice};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// At most this many sensitive-data notices are retained; inserting another
/// evicts the oldest.
pub const MAX_NOTICES: usize = 3;

/// New conversations take their title from the first message, truncated.
pub const TITLE_PREVIEW_CHARS: usize = 30;

/// How a send was initiated. Replaces the ad hoc `skipNotices`/`override`
/// flag pair with the two combinations that actually occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SendMode {
    /// Regular send from the input box.
    Normal,
    /// Resend of a blocked prompt after explicit user consent. Asks the
    /// backend to override the PII block, never enqueues a new notice, and
    /// leaves the input box alone (the user may have edited it meanwhile).
    RetryWithOverride,
}

impl SendMode {
    pub fn overrides_block(self) -> bool {
        matches!(self, SendMode::RetryWithOverride)
    }

    pub fn suppresses_notices(self) -> bool {
        matches!(self, SendMode::RetryWithOverride)
    }

    pub fn clears_input(self) -> bool {
        matches!(self, SendMode::Normal)
    }
}

/// Whole-app chat state. Owned by [`ChatStore`] and mutated only through the
/// transition methods below; commands lock, transition, and emit a snapshot.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatState {
    pub conversations: Vec<Conversation>,
    pub active_conversation_id: Option<String>,
    pub notices: Vec<SensitiveDataNotice>,
    pub input_value: String,
    pub typing: bool,
    #[serde(skip)]
    history_initialized: bool,
}

pub fn derive_title(first_message: &str) -> String {
    let preview: String = first_message.chars().take(TITLE_PREVIEW_CHARS).collect();
    if first_message.chars().count() > TITLE_PREVIEW_CHARS {
        format!("{preview}...")
    } else {
        preview
    }
}

impl ChatState {
    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    fn conversation_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        let id = self.active_conversation_id.as_deref()?;
        self.conversation(id)
    }

    /// Creates a conversation for a first message: fresh random session id,
    /// title derived from the message. Prepended and made active.
    pub fn create_conversation(&mut self, first_message: &str, now: DateTime<Utc>) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        let conversation = Conversation {
            id: session_id.clone(),
            session_id: session_id.clone(),
            title: derive_title(first_message),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.conversations.insert(0, conversation);
        self.active_conversation_id = Some(session_id.clone());
        session_id
    }

    pub fn append_message(
        &mut self,
        conversation_id: &str,
        message: Message,
        now: DateTime<Utc>,
    ) {
        if let Some(conversation) = self.conversation_mut(conversation_id) {
            conversation.messages.push(message);
            conversation.updated_at = now;
        }
    }

    /// Rollback of an optimistically appended message.
    pub fn remove_message(&mut self, conversation_id: &str, message_id: &str, now: DateTime<Utc>) {
        if let Some(conversation) = self.conversation_mut(conversation_id) {
            conversation.messages.retain(|m| m.id != message_id);
            conversation.updated_at = now;
        }
    }

    /// Newest notice goes first; the queue is capped by truncation after
    /// insertion, not by refusing it.
    pub fn push_notice(&mut self, notice: SensitiveDataNotice) {
        self.notices.insert(0, notice);
        self.notices.truncate(MAX_NOTICES);
    }

    pub fn dismiss_notice(&mut self, timestamp_millis: i64) {
        self.notices.retain(|n| n.key() != timestamp_millis);
    }

    pub fn dismiss_all_notices(&mut self) {
        self.notices.clear();
    }

    pub fn notice(&self, timestamp_millis: i64) -> Option<&SensitiveDataNotice> {
        self.notices.iter().find(|n| n.key() == timestamp_millis)
    }

    /// Removes and returns a notice; used by the proceed-anyway flow so the
    /// resend cannot race a second dismissal.
    pub fn take_notice(&mut self, timestamp_millis: i64) -> Option<SensitiveDataNotice> {
        let index = self.notices.iter().position(|n| n.key() == timestamp_millis)?;
        Some(self.notices.remove(index))
    }

    pub fn set_input(&mut self, value: impl Into<String>) {
        self.input_value = value.into();
    }

    pub fn set_typing(&mut self, typing: bool) {
        self.typing = typing;
    }

    pub fn set_active(&mut self, id: Option<String>) {
        self.active_conversation_id = id;
    }

    /// Merges server session history into the conversation list: server
    /// sessions first (their order preserved), then local conversations the
    /// server does not know about. The first successful load selects the
    /// newest session if nothing is active yet.
    pub fn merge_sessions(&mut self, mapped: Vec<Conversation>) {
        let first_id = mapped.first().map(|c| c.id.clone());
        let mut merged = mapped;
        let known: Vec<String> = merged.iter().map(|c| c.id.clone()).collect();
        for existing in self.conversations.drain(..) {
            if !known.contains(&existing.id) {
                merged.push(existing);
            }
        }
        self.conversations = merged;

        if !self.history_initialized {
            if let Some(id) = first_id {
                if self.active_conversation_id.is_none() {
                    self.active_conversation_id = Some(id);
                }
                self.history_initialized = true;
            }
        }
    }

    /// Replaces a conversation with its freshly hydrated version and moves
    /// it to the front of the list.
    pub fn adopt_conversation(&mut self, hydrated: Conversation) {
        self.conversations.retain(|c| c.id != hydrated.id);
        self.conversations.insert(0, hydrated);
    }
}

/// Managed Tauri state wrapping the chat state behind a mutex. Critical
/// sections are short; commands never hold the lock across an await point.
pub struct ChatStore {
    pub state: Mutex<ChatState>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChatState::default()),
        }
    }

    pub fn snapshot(&self) -> ChatState {
        self.state.lock().unwrap().clone()
    }
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::models::Role;
    use chrono::TimeZone;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    fn notice_at(millis: i64, text: &str) -> SensitiveDataNotice {
        SensitiveDataNotice {
            message: "Sensitive data found in message.".to_string(),
            details: None,
            user_message: text.to_string(),
            timestamp: at(millis),
        }
    }

    fn message(id: &str, role: Role, content: &str, millis: i64) -> Message {
        Message {
            id: id.to_string(),
            role,
            content: content.to_string(),
            timestamp: at(millis),
        }
    }

    #[test]
    fn short_first_message_becomes_title_verbatim() {
        assert_eq!(derive_title("hello there"), "hello there");
        let exactly_thirty = "a".repeat(30);
        assert_eq!(derive_title(&exactly_thirty), exactly_thirty);
    }

    #[test]
    fn long_first_message_is_truncated_with_ellipsis() {
        let long = "b".repeat(31);
        let title = derive_title(&long);
        assert_eq!(title, format!("{}...", "b".repeat(30)));
    }

    #[test]
    fn title_truncation_counts_characters_not_bytes() {
        let long: String = "é".repeat(40);
        let title = derive_title(&long);
        assert_eq!(title.chars().count(), 33);
    }

    #[test]
    fn create_conversation_prepends_and_activates() {
        let mut state = ChatState::default();
        let first = state.create_conversation("first", at(1));
        let second = state.create_conversation("second", at(2));
        assert_eq!(state.conversations.len(), 2);
        assert_eq!(state.conversations[0].id, second);
        assert_eq!(state.active_conversation_id.as_deref(), Some(second.as_str()));
        assert_eq!(state.conversation(&first).unwrap().title, "first");
        assert_eq!(
            state.conversation(&first).unwrap().session_id,
            state.conversation(&first).unwrap().id
        );
    }

    #[test]
    fn append_advances_updated_at() {
        let mut state = ChatState::default();
        let id = state.create_conversation("hi", at(1));
        state.append_message(&id, message("m1", Role::User, "hi", 5), at(5));
        state.append_message(&id, message("m2", Role::Assistant, "hello", 9), at(9));
        let conversation = state.conversation(&id).unwrap();
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.updated_at, at(9));
        assert!(conversation.updated_at > conversation.created_at);
    }

    #[test]
    fn remove_message_rolls_back_by_id() {
        let mut state = ChatState::default();
        let id = state.create_conversation("hi", at(1));
        state.append_message(&id, message("keep", Role::User, "a", 2), at(2));
        state.append_message(&id, message("drop", Role::User, "b", 3), at(3));
        state.remove_message(&id, "drop", at(4));
        let conversation = state.conversation(&id).unwrap();
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(conversation.messages[0].id, "keep");
    }

    #[test]
    fn notice_queue_is_newest_first_and_capped_at_three() {
        let mut state = ChatState::default();
        for i in 1..=4 {
            state.push_notice(notice_at(i, &format!("prompt {i}")));
        }
        assert_eq!(state.notices.len(), MAX_NOTICES);
        assert_eq!(state.notices[0].user_message, "prompt 4");
        assert_eq!(state.notices[2].user_message, "prompt 2");
        // The oldest entry was evicted.
        assert!(state.notice(1).is_none());
    }

    #[test]
    fn dismiss_removes_only_the_matching_notice() {
        let mut state = ChatState::default();
        state.push_notice(notice_at(10, "a"));
        state.push_notice(notice_at(20, "b"));
        state.dismiss_notice(10);
        assert_eq!(state.notices.len(), 1);
        assert_eq!(state.notices[0].key(), 20);
        state.dismiss_all_notices();
        assert!(state.notices.is_empty());
    }

    #[test]
    fn take_notice_returns_and_removes() {
        let mut state = ChatState::default();
        state.push_notice(notice_at(10, "a"));
        let taken = state.take_notice(10).unwrap();
        assert_eq!(taken.user_message, "a");
        assert!(state.take_notice(10).is_none());
    }

    #[test]
    fn merge_keeps_unknown_local_conversations() {
        let mut state = ChatState::default();
        let local = state.create_conversation("local only", at(1));
        state.set_active(None);

        let server = Conversation {
            id: "srv-1".to_string(),
            session_id: "srv-1".to_string(),
            title: "Previous chat".to_string(),
            messages: Vec::new(),
            created_at: at(0),
            updated_at: at(0),
        };
        state.merge_sessions(vec![server]);

        assert_eq!(state.conversations.len(), 2);
        assert_eq!(state.conversations[0].id, "srv-1");
        assert_eq!(state.conversations[1].id, local);
        // First load selects the newest server session.
        assert_eq!(state.active_conversation_id.as_deref(), Some("srv-1"));
    }

    #[test]
    fn merge_does_not_steal_an_existing_selection() {
        let mut state = ChatState::default();
        let local = state.create_conversation("mine", at(1));
        let server = Conversation {
            id: "srv-1".to_string(),
            session_id: "srv-1".to_string(),
            title: "Previous chat".to_string(),
            messages: Vec::new(),
            created_at: at(0),
            updated_at: at(0),
        };
        state.merge_sessions(vec![server]);
        assert_eq!(state.active_conversation_id.as_deref(), Some(local.as_str()));
    }

    #[test]
    fn adopt_moves_hydrated_conversation_to_front() {
        let mut state = ChatState::default();
        state.create_conversation("one", at(1));
        let id = state.create_conversation("two", at(2));
        state.create_conversation("three", at(3));

        let mut hydrated = state.conversation(&id).unwrap().clone();
        hydrated.messages.push(message("m", Role::User, "two", 4));
        state.adopt_conversation(hydrated);

        assert_eq!(state.conversations.len(), 3);
        assert_eq!(state.conversations[0].id, id);
        assert_eq!(state.conversations[0].messages.len(), 1);
    }

    #[test]
    fn send_mode_mapping() {
        assert!(!SendMode::Normal.overrides_block());
        assert!(SendMode::Normal.clears_input());
        assert!(!SendMode::Normal.suppresses_notices());
        assert!(SendMode::RetryWithOverride.overrides_block());
        assert!(SendMode::RetryWithOverride.suppresses_notices());
        assert!(!SendMode::RetryWithOverride.clears_input());
    }
}
