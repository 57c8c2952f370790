//! Conversation storage.
//!
//! A conversation owns its participants and its message history. Every
//! mutation runs under the conversation's map entry, so an invite, its
//! notice message and the unread bookkeeping land together.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use dashmap::DashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub user_id: Uuid,
    pub joined_at: SystemTime,
    pub unread_count: u32,
    pub last_read_at: Option<SystemTime>,
}

impl Participant {
    fn new(user_id: Uuid, at: SystemTime) -> Self {
        Self {
            user_id,
            joined_at: at,
            unread_count: 0,
            last_read_at: None,
        }
    }
}

/// One reaction per user per message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub user_id: Uuid,
    pub emoji: String,
    pub created_at: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub author_id: Uuid,
    pub body: Option<String>,
    pub media_id: Option<Uuid>,
    pub created_at: SystemTime,
    pub reactions: Vec<Reaction>,
}

/// Input for a new message. At least one of `body` and `media_id` is set.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub author_id: Uuid,
    pub body: Option<String>,
    pub media_id: Option<Uuid>,
}

impl NewMessage {
    pub fn text(author_id: Uuid, body: impl Into<String>) -> Self {
        Self {
            author_id,
            body: Some(body.into()),
            media_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: Uuid,
    pub title: String,
    pub created_by: Uuid,
    pub created_at: SystemTime,
    /// Insertion order, used to break `created_at` ties.
    pub seq: u64,
    pub participants: Vec<Participant>,
    /// Oldest first.
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn participant(&self, user_id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.participant(user_id).is_some()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn message(&self, message_id: Uuid) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    fn push_message(&mut self, new: NewMessage, at: SystemTime) -> Message {
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: self.id,
            author_id: new.author_id,
            body: new.body,
            media_id: new.media_id,
            created_at: at,
            reactions: Vec::new(),
        };
        for participant in &mut self.participants {
            if participant.user_id == message.author_id {
                participant.unread_count = 0;
                participant.last_read_at = Some(at);
            } else {
                participant.unread_count = participant.unread_count.saturating_add(1);
            }
        }
        self.messages.push(message.clone());
        message
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("Conversation not found.")]
    ConversationNotFound,

    #[error("Message not found.")]
    MessageNotFound,

    #[error("Participant not found in this conversation.")]
    NotParticipant,

    #[error("User is already in this conversation.")]
    AlreadyParticipant,

    #[error("Cannot remove the last participant from a conversation.")]
    LastParticipant,
}

/// Conversation, participant, message and reaction storage.
pub trait ConversationStore: Send + Sync {
    /// Create a conversation whose participants are `participant_ids`
    /// (deduplicated, creator included).
    fn create(&self, title: String, created_by: Uuid, participant_ids: &[Uuid]) -> Conversation;
    fn get(&self, id: Uuid) -> Option<Conversation>;
    /// Newest first.
    fn list(&self) -> Vec<Conversation>;
    fn rename(&self, id: Uuid, title: String) -> Result<Conversation, ChatError>;
    /// Add `user_id` and post `notice` in the same step.
    fn add_participant(&self, id: Uuid, user_id: Uuid, notice: NewMessage) -> Result<Message, ChatError>;
    fn remove_participant(&self, id: Uuid, user_id: Uuid) -> Result<(), ChatError>;
    fn post_message(&self, id: Uuid, message: NewMessage) -> Result<Message, ChatError>;
    /// Reset `user_id`'s unread count. Non-participants are ignored.
    fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<(), ChatError>;
    /// Set (`Some`) or clear (`None`) the user's reaction and return the
    /// message's reactions ordered by emoji, then age.
    fn set_reaction(
        &self,
        id: Uuid,
        message_id: Uuid,
        user_id: Uuid,
        emoji: Option<String>,
    ) -> Result<Vec<Reaction>, ChatError>;
}

/// Process-local conversation table.
#[derive(Default)]
pub struct MemoryConversationStore {
    conversations: DashMap<Uuid, Conversation>,
    next_seq: AtomicU64,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

impl ConversationStore for MemoryConversationStore {
    fn create(&self, title: String, created_by: Uuid, participant_ids: &[Uuid]) -> Conversation {
        let now = SystemTime::now();
        let mut participants: Vec<Participant> = Vec::with_capacity(participant_ids.len() + 1);
        for &user_id in participant_ids.iter().chain(std::iter::once(&created_by)) {
            if !participants.iter().any(|p| p.user_id == user_id) {
                participants.push(Participant::new(user_id, now));
            }
        }

        let conversation = Conversation {
            id: Uuid::new_v4(),
            title,
            created_by,
            created_at: now,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            participants,
            messages: Vec::new(),
        };
        self.conversations.insert(conversation.id, conversation.clone());
        conversation
    }

    fn get(&self, id: Uuid) -> Option<Conversation> {
        self.conversations.get(&id).map(|c| c.value().clone())
    }

    fn list(&self) -> Vec<Conversation> {
        let mut conversations: Vec<Conversation> =
            self.conversations.iter().map(|c| c.value().clone()).collect();
        conversations.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.seq.cmp(&a.seq)));
        conversations
    }

    fn rename(&self, id: Uuid, title: String) -> Result<Conversation, ChatError> {
        let mut conversation = self
            .conversations
            .get_mut(&id)
            .ok_or(ChatError::ConversationNotFound)?;
        conversation.title = title;
        Ok(conversation.clone())
    }

    fn add_participant(&self, id: Uuid, user_id: Uuid, notice: NewMessage) -> Result<Message, ChatError> {
        let mut conversation = self
            .conversations
            .get_mut(&id)
            .ok_or(ChatError::ConversationNotFound)?;
        if conversation.is_participant(user_id) {
            return Err(ChatError::AlreadyParticipant);
        }

        let now = SystemTime::now();
        conversation.participants.push(Participant::new(user_id, now));
        Ok(conversation.push_message(notice, now))
    }

    fn remove_participant(&self, id: Uuid, user_id: Uuid) -> Result<(), ChatError> {
        let mut conversation = self
            .conversations
            .get_mut(&id)
            .ok_or(ChatError::ConversationNotFound)?;
        let index = conversation
            .participants
            .iter()
            .position(|p| p.user_id == user_id)
            .ok_or(ChatError::NotParticipant)?;
        if conversation.participants.len() <= 1 {
            return Err(ChatError::LastParticipant);
        }
        conversation.participants.remove(index);
        Ok(())
    }

    fn post_message(&self, id: Uuid, message: NewMessage) -> Result<Message, ChatError> {
        let mut conversation = self
            .conversations
            .get_mut(&id)
            .ok_or(ChatError::ConversationNotFound)?;
        Ok(conversation.push_message(message, SystemTime::now()))
    }

    fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<(), ChatError> {
        let mut conversation = self
            .conversations
            .get_mut(&id)
            .ok_or(ChatError::ConversationNotFound)?;
        if let Some(participant) = conversation.participants.iter_mut().find(|p| p.user_id == user_id) {
            participant.unread_count = 0;
            participant.last_read_at = Some(SystemTime::now());
        }
        Ok(())
    }

    fn set_reaction(
        &self,
        id: Uuid,
        message_id: Uuid,
        user_id: Uuid,
        emoji: Option<String>,
    ) -> Result<Vec<Reaction>, ChatError> {
        let mut conversation = self
            .conversations
            .get_mut(&id)
            .ok_or(ChatError::ConversationNotFound)?;
        let message = conversation
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or(ChatError::MessageNotFound)?;

        let existing = message.reactions.iter().position(|r| r.user_id == user_id);
        match (emoji, existing) {
            (Some(emoji), Some(index)) => message.reactions[index].emoji = emoji,
            (Some(emoji), None) => message.reactions.push(Reaction {
                user_id,
                emoji,
                created_at: SystemTime::now(),
            }),
            (None, Some(index)) => {
                message.reactions.remove(index);
            }
            (None, None) => {}
        }

        // Stable sort keeps insertion order for equal timestamps.
        let mut reactions = message.reactions.clone();
        reactions.sort_by(|a, b| a.emoji.cmp(&b.emoji).then(a.created_at.cmp(&b.created_at)));
        Ok(reactions)
    }
}
