//! Chat rooms: the shared community room, a private AI room per learner,
//! and direct messages
//!
//! Conversations live in `conversations`, their messages in
//! `conversations/{id}/messages`. A message that mentions `@AI` gets an
//! answer from the tutor. Direct messages have no conversation document:
//! they go straight to `dm_messages/{room}/messages`, where the room id is
//! derived from the two uids.

use std::sync::Arc;

use futures::future::try_join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::ai::Tutor;
use crate::auth::profile::USERS_COLLECTION;
use crate::auth::UserIdentity;
use crate::core::records::{
    now_millis, ChatMessage, Conversation, ConversationKind, UserProfile, UserRole,
};
use crate::error::{AppError, Result};
use crate::store::DocumentStore;

pub const CONVERSATIONS: &str = "conversations";
pub const DM_MESSAGES: &str = "dm_messages";
pub const AI_SENDER_ID: &str = "ai-bot";
pub const AI_SENDER_NAME: &str = "AI Assistant";
pub const COMMUNITY_ROOM_NAME: &str = "Community";
pub const AI_ROOM_NAME: &str = "AI Assistant";

/// Only the most recent messages are shown
pub const MESSAGE_LIMIT: usize = 50;

static AI_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"@AI\s|@AI$|^@AI\s").unwrap());
static MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"@(\w+)").unwrap());

/// Whether the message asks the AI assistant to answer
pub fn is_mentioning_ai(content: &str) -> bool {
    AI_MENTION.is_match(content)
}

/// Names mentioned with `@name`, in order of appearance
pub fn extract_mentions(content: &str) -> Vec<String> {
    MENTION
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Room id for a direct conversation; the same for either order of uids
pub fn dm_room_id(uid_a: &str, uid_b: &str) -> String {
    let (first, second) = if uid_a <= uid_b {
        (uid_a, uid_b)
    } else {
        (uid_b, uid_a)
    };
    format!("dm_{first}_{second}")
}

fn messages_collection(conversation_id: &str) -> String {
    format!("{CONVERSATIONS}/{conversation_id}/messages")
}

fn dm_collection(room_id: &str) -> String {
    format!("{DM_MESSAGES}/{room_id}/messages")
}

/// Who a message is from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub uid: String,
    pub name: String,
    pub role: UserRole,
}

impl Sender {
    pub fn from_session(user: &UserIdentity, profile: Option<&UserProfile>) -> Self {
        Self {
            uid: user.uid.clone(),
            name: profile
                .map(|p| p.display_name.clone())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| user.label().to_string()),
            role: profile.map(|p| p.role).unwrap_or_default(),
        }
    }

    fn assistant() -> Self {
        Self {
            uid: AI_SENDER_ID.to_string(),
            name: AI_SENDER_NAME.to_string(),
            role: UserRole::AiBot,
        }
    }
}

pub struct ChatService {
    store: Arc<dyn DocumentStore>,
}

impl ChatService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn decode_conversation(id: String, data: &crate::store::Document) -> Result<Conversation> {
        let mut conversation: Conversation = data.decode()?;
        conversation.id = id;
        Ok(conversation)
    }

    pub async fn create_conversation(
        &self,
        creator_uid: &str,
        kind: ConversationKind,
        name: &str,
        other_uids: &[String],
    ) -> Result<Conversation> {
        let participants = match kind {
            ConversationKind::Direct => std::iter::once(creator_uid.to_string())
                .chain(other_uids.iter().cloned())
                .collect(),
            ConversationKind::Community => vec![creator_uid.to_string()],
            ConversationKind::Ai => vec![creator_uid.to_string(), AI_SENDER_ID.to_string()],
        };

        let now = now_millis();
        let mut conversation = Conversation {
            id: String::new(),
            kind,
            name: name.to_string(),
            participants,
            last_message: None,
            last_message_time: None,
            last_message_sender: None,
            unread_count: 0,
            created_at: now,
            updated_at: now,
        };
        conversation.id = self
            .store
            .create(CONVERSATIONS, serde_json::to_value(&conversation)?)
            .await?;
        tracing::debug!(conversation = %conversation.id, "created conversation");
        Ok(conversation)
    }

    /// Conversations `uid` takes part in, most recently active first
    pub async fn list_conversations(&self, uid: &str) -> Result<Vec<Conversation>> {
        let mut conversations = self
            .store
            .list(CONVERSATIONS)
            .await?
            .iter()
            .map(|doc| Self::decode_conversation(doc.id.clone(), doc))
            .collect::<Result<Vec<_>>>()?;
        conversations.retain(|c| c.participants.iter().any(|p| p == uid));
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    /// The shared community room, created on first use
    pub async fn get_or_create_community_chat(&self, uid: &str) -> Result<Conversation> {
        let existing = self
            .store
            .find_by_field(CONVERSATIONS, "type", &json!("community"))
            .await?;
        match existing.first() {
            Some(doc) => Self::decode_conversation(doc.id.clone(), doc),
            None => {
                self.create_conversation(uid, ConversationKind::Community, COMMUNITY_ROOM_NAME, &[])
                    .await
            }
        }
    }

    /// The learner's private AI room, created on first use
    pub async fn get_or_create_ai_chat(&self, uid: &str) -> Result<Conversation> {
        let existing = self
            .store
            .find_by_field(CONVERSATIONS, "type", &json!("ai"))
            .await?;
        for doc in &existing {
            let conversation = Self::decode_conversation(doc.id.clone(), doc)?;
            if conversation.participants.iter().any(|p| p == uid) {
                return Ok(conversation);
            }
        }
        self.create_conversation(uid, ConversationKind::Ai, AI_ROOM_NAME, &[])
            .await
    }

    /// Store one message in `collection`
    async fn write_message(
        &self,
        collection: &str,
        conversation_id: &str,
        sender: &Sender,
        content: &str,
        timestamp: i64,
        is_ai_response: bool,
    ) -> Result<ChatMessage> {
        let mut message = ChatMessage {
            id: String::new(),
            conversation_id: conversation_id.to_string(),
            sender_id: sender.uid.clone(),
            sender_name: sender.name.clone(),
            sender_role: Some(sender.role),
            content: content.to_string(),
            timestamp,
            is_ai_response,
            mentions: if is_ai_response {
                Vec::new()
            } else {
                extract_mentions(content)
            },
        };
        message.id = self
            .store
            .create(collection, serde_json::to_value(&message)?)
            .await?;
        Ok(message)
    }

    /// Store a message and make it the conversation's latest
    async fn post(
        &self,
        conversation_id: &str,
        sender: &Sender,
        content: &str,
        timestamp: i64,
        is_ai_response: bool,
    ) -> Result<ChatMessage> {
        let message = self
            .write_message(
                &messages_collection(conversation_id),
                conversation_id,
                sender,
                content,
                timestamp,
                is_ai_response,
            )
            .await?;

        self.store
            .update(
                CONVERSATIONS,
                conversation_id,
                json!({
                    "lastMessage": content,
                    "lastMessageTime": timestamp,
                    "lastMessageSender": sender.name,
                    "updatedAt": timestamp,
                }),
            )
            .await?;
        Ok(message)
    }

    /// Post a message and make it the conversation's latest
    pub async fn send_message(
        &self,
        conversation_id: &str,
        sender: &Sender,
        content: &str,
    ) -> Result<ChatMessage> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::InvalidInput("Message cannot be empty".into()));
        }
        self.post(conversation_id, sender, content, now_millis(), false)
            .await
    }

    /// Post the learner's message, then the assistant's answer to it
    pub async fn handle_ai_message(
        &self,
        tutor: &Tutor,
        conversation_id: &str,
        sender: &Sender,
        content: &str,
        topic: Option<&str>,
    ) -> Result<(ChatMessage, ChatMessage)> {
        let question = self.send_message(conversation_id, sender, content).await?;

        let prompt = question.content.replace("@AI", "");
        let reply = tutor.chat_reply(prompt.trim(), topic).await?;

        // Keep the answer ordered after the question even within one millisecond
        let timestamp = now_millis().max(question.timestamp + 1);
        let answer = self
            .post(conversation_id, &Sender::assistant(), &reply, timestamp, true)
            .await?;
        Ok((question, answer))
    }

    /// The most recent messages, oldest first
    pub async fn list_messages(&self, conversation_id: &str) -> Result<Vec<ChatMessage>> {
        self.read_messages(&messages_collection(conversation_id), conversation_id)
            .await
    }

    async fn read_messages(
        &self,
        collection: &str,
        conversation_id: &str,
    ) -> Result<Vec<ChatMessage>> {
        let mut messages = self
            .store
            .list(collection)
            .await?
            .into_iter()
            .map(|doc| {
                let mut message: ChatMessage = doc.decode()?;
                message.id = doc.id;
                message.conversation_id = conversation_id.to_string();
                Ok(message)
            })
            .collect::<Result<Vec<_>>>()?;
        messages.sort_by_key(|m| m.timestamp);
        let skip = messages.len().saturating_sub(MESSAGE_LIMIT);
        Ok(messages.split_off(skip))
    }

    /// Learners someone can message directly: everyone but `uid` and the bot
    pub async fn available_users(&self, uid: &str) -> Result<Vec<UserProfile>> {
        let mut people: Vec<UserProfile> = self
            .store
            .list(USERS_COLLECTION)
            .await?
            .iter()
            .filter_map(|doc| match doc.decode::<UserProfile>() {
                Ok(profile) => Some(profile),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable profile");
                    None
                }
            })
            .filter(|p| p.uid != uid && p.role != UserRole::AiBot)
            .collect();
        people.sort_by_key(|p| p.display_name.to_lowercase());
        Ok(people)
    }

    /// Latest direct messages of a room, oldest first
    pub async fn list_dm_messages(&self, room_id: &str) -> Result<Vec<ChatMessage>> {
        self.read_messages(&dm_collection(room_id), room_id).await
    }

    pub async fn send_dm(
        &self,
        room_id: &str,
        sender: &Sender,
        content: &str,
    ) -> Result<ChatMessage> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::InvalidInput("Message cannot be empty".into()));
        }
        self.write_message(
            &dm_collection(room_id),
            room_id,
            sender,
            content,
            now_millis(),
            false,
        )
        .await
    }

    pub async fn mark_as_read(&self, conversation_id: &str) -> Result<()> {
        self.store
            .update(CONVERSATIONS, conversation_id, json!({ "unreadCount": 0 }))
            .await
    }

    /// Delete every message, then the conversation itself
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        let collection = messages_collection(conversation_id);
        let messages = self.store.list(&collection).await?;
        try_join_all(
            messages
                .iter()
                .map(|doc| self.store.delete(&collection, &doc.id)),
        )
        .await?;
        self.store.delete(CONVERSATIONS, conversation_id).await?;
        tracing::info!(conversation = %conversation_id, "deleted conversation");
        Ok(())
    }

    /// Raw conversation document, for callers that need fields not modelled
    pub async fn conversation_data(&self, conversation_id: &str) -> Result<Option<Value>> {
        Ok(self
            .store
            .get(CONVERSATIONS, conversation_id)
            .await?
            .map(|doc| doc.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockTextGenerator;
    use crate::store::MemoryStore;

    fn learner() -> Sender {
        Sender {
            uid: "u1".into(),
            name: "Lan".into(),
            role: UserRole::User,
        }
    }

    fn service() -> (Arc<MemoryStore>, ChatService) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), ChatService::new(store))
    }

    #[test]
    fn test_ai_mention_detection() {
        assert!(is_mentioning_ai("@AI what is a gerund?"));
        assert!(is_mentioning_ai("help me @AI"));
        assert!(is_mentioning_ai("hey @AI please"));
        assert!(!is_mentioning_ai("@AIbot hello"));
        assert!(!is_mentioning_ai("no mention here"));
    }

    #[test]
    fn test_extract_mentions() {
        assert_eq!(
            extract_mentions("@AI and @minh_anh, look"),
            vec!["AI".to_string(), "minh_anh".to_string()]
        );
        assert!(extract_mentions("nobody").is_empty());
    }

    #[test]
    fn test_dm_room_id_is_order_independent() {
        assert_eq!(dm_room_id("bob", "alice"), "dm_alice_bob");
        assert_eq!(dm_room_id("alice", "bob"), "dm_alice_bob");
    }

    #[test]
    fn test_sender_prefers_profile_name() {
        let user = UserIdentity {
            uid: "u1".into(),
            email: "lan@example.com".into(),
            display_name: None,
        };
        assert_eq!(Sender::from_session(&user, None).name, "lan@example.com");

        let mut profile = UserProfile::new_learner("u1", "lan@example.com", "Lan");
        profile.role = UserRole::Moderator;
        let sender = Sender::from_session(&user, Some(&profile));
        assert_eq!(sender.name, "Lan");
        assert_eq!(sender.role, UserRole::Moderator);
    }

    #[tokio::test]
    async fn test_community_chat_is_shared() {
        let (_, chat) = service();
        let first = chat.get_or_create_community_chat("u1").await.unwrap();
        let second = chat.get_or_create_community_chat("u2").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.kind, ConversationKind::Community);
    }

    #[tokio::test]
    async fn test_ai_chat_is_per_user() {
        let (_, chat) = service();
        let mine = chat.get_or_create_ai_chat("u1").await.unwrap();
        let again = chat.get_or_create_ai_chat("u1").await.unwrap();
        let theirs = chat.get_or_create_ai_chat("u2").await.unwrap();
        assert_eq!(mine.id, again.id);
        assert_ne!(mine.id, theirs.id);
    }

    #[tokio::test]
    async fn test_send_message_updates_conversation() {
        let (_, chat) = service();
        let room = chat.get_or_create_community_chat("u1").await.unwrap();

        let message = chat
            .send_message(&room.id, &learner(), "  hi @minh  ")
            .await
            .unwrap();
        assert_eq!(message.content, "hi @minh");
        assert_eq!(message.mentions, vec!["minh".to_string()]);

        let data = chat.conversation_data(&room.id).await.unwrap().unwrap();
        assert_eq!(data["lastMessage"], "hi @minh");
        assert_eq!(data["lastMessageSender"], "Lan");
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let (_, chat) = service();
        let room = chat.get_or_create_community_chat("u1").await.unwrap();
        assert!(matches!(
            chat.send_message(&room.id, &learner(), "   ").await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_handle_ai_message_posts_question_and_answer() {
        let (_, chat) = service();
        let room = chat.get_or_create_ai_chat("u1").await.unwrap();

        let mut mock = MockTextGenerator::new();
        mock.expect_generate()
            .withf(|req| req.prompt.contains("\"what is a gerund?\""))
            .times(1)
            .returning(|_| Ok("A gerund is a verb ending in -ing used as a noun.".into()));
        let tutor = Tutor::new(Arc::new(mock));

        let (question, answer) = chat
            .handle_ai_message(&tutor, &room.id, &learner(), "@AI what is a gerund?", None)
            .await
            .unwrap();
        assert!(!question.is_ai_response);
        assert!(answer.is_ai_response);
        assert_eq!(answer.sender_id, AI_SENDER_ID);
        assert_eq!(answer.sender_role, Some(UserRole::AiBot));
        assert!(answer.timestamp > question.timestamp);

        let messages = chat.list_messages(&room.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].id, answer.id);
    }

    #[tokio::test]
    async fn test_list_messages_keeps_latest_sorted() {
        let (store, chat) = service();
        let room = chat.get_or_create_community_chat("u1").await.unwrap();
        let collection = messages_collection(&room.id);
        // Insert out of order, more than the limit
        for ts in (0..60).rev() {
            store
                .create(
                    &collection,
                    json!({
                        "conversationId": room.id,
                        "senderId": "u1",
                        "senderName": "Lan",
                        "content": format!("m{ts}"),
                        "timestamp": ts,
                    }),
                )
                .await
                .unwrap();
        }

        let messages = chat.list_messages(&room.id).await.unwrap();
        assert_eq!(messages.len(), MESSAGE_LIMIT);
        assert_eq!(messages[0].timestamp, 10);
        assert_eq!(messages[MESSAGE_LIMIT - 1].timestamp, 59);
        assert!(messages.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_mark_as_read_and_delete() {
        let (store, chat) = service();
        let room = chat.get_or_create_community_chat("u1").await.unwrap();
        chat.send_message(&room.id, &learner(), "one").await.unwrap();
        chat.send_message(&room.id, &learner(), "two").await.unwrap();

        chat.mark_as_read(&room.id).await.unwrap();
        assert_eq!(
            chat.conversation_data(&room.id).await.unwrap().unwrap()["unreadCount"],
            0
        );

        chat.delete_conversation(&room.id).await.unwrap();
        assert_eq!(store.count(&messages_collection(&room.id)).await, 0);
        assert!(chat.conversation_data(&room.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_direct_messages_stay_out_of_conversations() {
        let (store, chat) = service();
        let room = dm_room_id("u2", "u1");
        chat.send_dm(&room, &learner(), " first ").await.unwrap();
        let bob = Sender {
            uid: "u2".into(),
            name: "Minh".into(),
            role: UserRole::User,
        };
        chat.send_dm(&room, &bob, "second").await.unwrap();

        let messages = chat.list_dm_messages(&room).await.unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["first", "second"]);
        assert!(messages.iter().all(|m| m.conversation_id == "dm_u1_u2"));
        assert_eq!(store.count(CONVERSATIONS).await, 0);

        assert!(matches!(
            chat.send_dm(&room, &learner(), "  ").await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_dm_written_without_conversation_id_still_reads() {
        let (store, chat) = service();
        store
            .create(
                &dm_collection("dm_u1_u2"),
                json!({ "senderId": "u2", "senderName": "Minh", "content": "hi", "timestamp": 5 }),
            )
            .await
            .unwrap();
        let messages = chat.list_dm_messages("dm_u1_u2").await.unwrap();
        assert_eq!(messages[0].conversation_id, "dm_u1_u2");
    }

    #[tokio::test]
    async fn test_available_users_excludes_self_and_bot() {
        let (store, chat) = service();
        let mut bot = UserProfile::new_learner(AI_SENDER_ID, "", AI_SENDER_NAME);
        bot.role = UserRole::AiBot;
        for profile in [
            UserProfile::new_learner("u1", "lan@example.com", "Lan"),
            UserProfile::new_learner("u3", "vy@example.com", "vy"),
            UserProfile::new_learner("u2", "minh@example.com", "Minh"),
            bot,
        ] {
            store
                .set(USERS_COLLECTION, &profile.uid.clone(), serde_json::to_value(profile).unwrap())
                .await
                .unwrap();
        }
        store
            .set(USERS_COLLECTION, "broken", json!({ "uid": 7 }))
            .await
            .unwrap();

        let people = chat.available_users("u1").await.unwrap();
        let names: Vec<_> = people.iter().map(|p| p.display_name.as_str()).collect();
        assert_eq!(names, ["Minh", "vy"]);
    }

    #[tokio::test]
    async fn test_list_conversations_for_participant() {
        let (_, chat) = service();
        chat.get_or_create_ai_chat("u1").await.unwrap();
        chat.create_conversation("u2", ConversationKind::Direct, "DM", &["u1".into()])
            .await
            .unwrap();
        chat.get_or_create_ai_chat("u3").await.unwrap();

        let rooms = chat.list_conversations("u1").await.unwrap();
        assert_eq!(rooms.len(), 2);
    }
}
