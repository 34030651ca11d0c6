//! Chat history data structures.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of chat a history was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatKind {
    /// One-to-many channel, posts carry no per-user context
    Broadcast,
    /// Multi-party chat, messages are attributed to speakers
    Group,
}

/// One message as returned by a history source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub date: DateTime<Utc>,
    /// Empty for media-only or service messages
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub sender_id: Option<i64>,
}

/// A member of a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: i64,
    pub display_name: String,
}

/// Recent messages of one channel or chat, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatHistory {
    pub title: String,
    pub kind: ChatKind,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

impl ChatHistory {
    /// Sender ID to display name lookup.
    pub fn name_lookup(&self) -> HashMap<i64, &str> {
        self.participants
            .iter()
            .map(|p| (p.id, p.display_name.as_str()))
            .collect()
    }
}
