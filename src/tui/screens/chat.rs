//! Community, AI assistant and direct message rooms

use crate::core::records::{ChatMessage, Conversation, UserProfile};
use crate::services::chat::dm_room_id;
use crate::tui::screens::{Loadable, TextInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatRoom {
    #[default]
    Community,
    Assistant,
    Direct,
}

impl ChatRoom {
    pub fn all() -> &'static [ChatRoom] {
        &[ChatRoom::Community, ChatRoom::Assistant, ChatRoom::Direct]
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChatRoom::Community => "Community",
            ChatRoom::Assistant => "AI Assistant",
            ChatRoom::Direct => "Direct",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            ChatRoom::Community => ChatRoom::Assistant,
            ChatRoom::Assistant => ChatRoom::Direct,
            ChatRoom::Direct => ChatRoom::Community,
        }
    }
}

/// The other side of a direct conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectPartner {
    pub uid: String,
    pub name: String,
    pub room_id: String,
}

#[derive(Debug, Default)]
pub struct CommunityChat {
    pub room: ChatRoom,
    pub conversation: Loadable<Conversation>,
    /// People to message in the direct room
    pub people: Loadable<Vec<UserProfile>>,
    pub people_cursor: usize,
    pub partner: Option<DirectPartner>,
    pub messages: Vec<ChatMessage>,
    pub input: TextInput,
    pub sending: bool,
    pub fetching: bool,
    /// Tick of the last message poll
    pub last_poll_tick: u64,
    pub error: Option<String>,
}

impl CommunityChat {
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation.ready().map(|c| c.id.as_str())
    }

    /// Id messages are read from and sent to: the conversation, or the
    /// direct room once a partner is chosen
    pub fn channel_id(&self) -> Option<&str> {
        match self.room {
            ChatRoom::Direct => self.partner.as_ref().map(|p| p.room_id.as_str()),
            _ => self.conversation_id(),
        }
    }

    /// The direct room is showing its list of people
    pub fn choosing_partner(&self) -> bool {
        self.room == ChatRoom::Direct && self.partner.is_none()
    }

    /// Replace the shown messages, oldest first
    pub fn set_messages(&mut self, mut messages: Vec<ChatMessage>) {
        messages.sort_by_key(|m| m.timestamp);
        self.messages = messages;
        self.error = None;
    }

    /// Forget requests in flight; their answers are dropped
    pub fn restart(&mut self) {
        self.sending = false;
        self.fetching = false;
        self.error = None;
    }

    /// Switch rooms, dropping everything shown for the old one
    pub fn switch_room(&mut self) {
        self.room = self.room.toggled();
        self.conversation = Loadable::Idle;
        self.people = Loadable::Idle;
        self.people_cursor = 0;
        self.partner = None;
        self.messages.clear();
        self.restart();
    }

    pub fn move_people_cursor(&mut self, down: bool) {
        let total = self.people.ready().map_or(0, Vec::len);
        if total == 0 {
            return;
        }
        self.people_cursor = if down {
            (self.people_cursor + 1) % total
        } else {
            self.people_cursor.checked_sub(1).unwrap_or(total - 1)
        };
    }

    /// Open a direct room with the person under the cursor
    pub fn pick_partner(&mut self, my_uid: &str) -> bool {
        let Some(person) = self
            .people
            .ready()
            .and_then(|people| people.get(self.people_cursor))
        else {
            return false;
        };
        self.partner = Some(DirectPartner {
            uid: person.uid.clone(),
            name: person.display_name.clone(),
            room_id: dm_room_id(my_uid, &person.uid),
        });
        self.messages.clear();
        self.restart();
        true
    }

    /// Back from a direct room to the list of people
    pub fn leave_partner(&mut self) -> bool {
        if self.partner.take().is_none() {
            return false;
        }
        self.messages.clear();
        self.restart();
        true
    }

    /// Whether a poll is due, given the tick counter and ticks per poll
    pub fn poll_due(&self, tick: u64, every: u64) -> bool {
        !self.fetching
            && self.channel_id().is_some()
            && tick.saturating_sub(self.last_poll_tick) >= every.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::records::ConversationKind;

    fn message(id: &str, ts: i64) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            conversation_id: "c1".into(),
            sender_id: "u1".into(),
            sender_name: "Lan".into(),
            sender_role: None,
            content: id.into(),
            timestamp: ts,
            is_ai_response: false,
            mentions: vec![],
        }
    }

    fn room() -> Conversation {
        Conversation {
            id: "c1".into(),
            kind: ConversationKind::Community,
            name: "Community".into(),
            participants: vec![],
            last_message: None,
            last_message_time: None,
            last_message_sender: None,
            unread_count: 0,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_messages_sorted_by_time() {
        let mut chat = CommunityChat::default();
        chat.set_messages(vec![message("b", 20), message("a", 10), message("c", 30)]);
        let order: Vec<_> = chat.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(order, ["a", "b", "c"]);
    }

    #[test]
    fn test_poll_waits_for_room_and_interval() {
        let mut chat = CommunityChat::default();
        assert!(!chat.poll_due(100, 20), "no room yet");

        chat.conversation = Loadable::Ready(room());
        chat.last_poll_tick = 90;
        assert!(!chat.poll_due(100, 20));
        assert!(chat.poll_due(110, 20));

        chat.fetching = true;
        assert!(!chat.poll_due(200, 20));
    }

    #[test]
    fn test_switch_room_clears_state() {
        let mut chat = CommunityChat {
            conversation: Loadable::Ready(room()),
            ..CommunityChat::default()
        };
        chat.set_messages(vec![message("a", 1)]);
        chat.sending = true;
        chat.fetching = true;
        chat.switch_room();
        assert_eq!(chat.room, ChatRoom::Assistant);
        assert!(chat.messages.is_empty());
        assert!(chat.conversation_id().is_none());
        assert!(!chat.sending && !chat.fetching);
    }

    #[test]
    fn test_rooms_cycle_through_direct() {
        let mut chat = CommunityChat::default();
        chat.switch_room();
        chat.switch_room();
        assert_eq!(chat.room, ChatRoom::Direct);
        assert!(chat.choosing_partner());
        chat.switch_room();
        assert_eq!(chat.room, ChatRoom::Community);
    }

    #[test]
    fn test_pick_and_leave_partner() {
        let mut chat = CommunityChat {
            room: ChatRoom::Direct,
            people: Loadable::Ready(vec![
                UserProfile::new_learner("u2", "minh@example.com", "Minh"),
                UserProfile::new_learner("u0", "an@example.com", "An"),
            ]),
            ..CommunityChat::default()
        };
        assert!(chat.channel_id().is_none());
        assert!(!chat.poll_due(100, 1));

        chat.move_people_cursor(false);
        assert_eq!(chat.people_cursor, 1);
        assert!(chat.pick_partner("u1"));
        assert_eq!(chat.channel_id(), Some("dm_u0_u1"));
        assert_eq!(chat.partner.as_ref().unwrap().name, "An");
        assert!(chat.poll_due(100, 1));

        assert!(chat.leave_partner());
        assert!(chat.choosing_partner());
        assert!(!chat.leave_partner());
    }
}
