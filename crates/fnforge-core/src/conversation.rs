//! Branching conversation tree
//!
//! Messages form an arena addressed by id; each record stores only a parent
//! back-reference, never a handle to children. The active path from root to
//! the head is the effective model context, and moving the head to a sibling
//! branch implements "regenerate" without losing history.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub parent: Option<MessageId>,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub feedback: Option<String>,
}

#[derive(Debug, Default)]
pub struct Conversation {
    arena: HashMap<MessageId, Message>,
    head: Option<MessageId>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message as a child of the current head and advance the head.
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> MessageId {
        self.append_child_of(self.head, role, content)
    }

    /// Append a message under an explicit parent (branching). The head moves
    /// to the new message, so the active path follows the new branch.
    pub fn append_child_of(
        &mut self,
        parent: Option<MessageId>,
        role: Role,
        content: impl Into<String>,
    ) -> MessageId {
        let id = MessageId::new();
        let message = Message {
            id,
            parent,
            role,
            content: content.into(),
            created_at: Utc::now(),
            feedback: None,
        };
        self.arena.insert(id, message);
        self.head = Some(id);
        id
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.arena.get(&id)
    }

    pub fn head(&self) -> Option<MessageId> {
        self.head
    }

    /// Move the head to an existing message. Returns false if unknown.
    pub fn set_head(&mut self, id: MessageId) -> bool {
        if self.arena.contains_key(&id) {
            self.head = Some(id);
            true
        } else {
            false
        }
    }

    pub fn set_feedback(&mut self, id: MessageId, tag: impl Into<String>) -> bool {
        match self.arena.get_mut(&id) {
            Some(message) => {
                message.feedback = Some(tag.into());
                true
            }
            None => false,
        }
    }

    /// Root-to-head path, following parent back-references.
    pub fn active_path(&self) -> Vec<&Message> {
        let mut path = Vec::new();
        let mut cursor = self.head;
        while let Some(id) = cursor {
            match self.arena.get(&id) {
                Some(message) => {
                    cursor = message.parent;
                    path.push(message);
                }
                None => break,
            }
        }
        path.reverse();
        path
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }
}

/// In-memory registry of live conversations keyed by id. Message CRUD
/// persistence is owned by the document store; the orchestrator only reads
/// and appends through this handle.
pub struct ConversationRegistry {
    conversations: DashMap<String, Arc<RwLock<Conversation>>>,
}

impl Default for ConversationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self {
            conversations: DashMap::new(),
        }
    }

    pub fn get_or_create(&self, id: &str) -> Arc<RwLock<Conversation>> {
        self.conversations
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(Conversation::new())))
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<RwLock<Conversation>>> {
        self.conversations.get(id).map(|c| c.clone())
    }

    pub fn remove(&self, id: &str) -> Option<Arc<RwLock<Conversation>>> {
        self.conversations.remove(id).map(|(_, c)| c)
    }

    pub fn list(&self) -> Vec<String> {
        self.conversations.iter().map(|e| e.key().clone()).collect()
    }
}
