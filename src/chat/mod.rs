//! Conversations between standard users.
//!
//! # Data Flow
//! ```text
//! POST /api/conversations               → store.rs (create with participants)
//! POST /api/conversations/{id}/messages → store.rs (append, bump unread counts)
//!                                         media/catalog.rs (mediaId ownership)
//! GET  /api/conversations/{id}/messages → store.rs (history, mark read)
//! ```

pub mod store;

pub use store::{
    ChatError, Conversation, ConversationStore, MemoryConversationStore, Message, NewMessage, Participant,
    Reaction,
};
