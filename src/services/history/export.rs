//! History read from Telegram Desktop JSON exports.
//!
//! Each channel is expected at `<dir>/<identifier>.json`, in the
//! single-chat export format (`name`, `type`, `messages`).

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::{HistorySource, normalize_identifier};
use crate::error::{AppError, Result};
use crate::models::{ChatHistory, ChatKind, ChatMessage, Participant};

#[derive(Debug, Deserialize)]
struct ExportFile {
    name: Option<String>,
    #[serde(rename = "type", default)]
    chat_type: String,
    #[serde(default)]
    messages: Vec<ExportMessage>,
}

#[derive(Debug, Deserialize)]
struct ExportMessage {
    id: i64,
    #[serde(rename = "type", default)]
    message_type: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    date_unixtime: Option<String>,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    from_id: Option<String>,
    #[serde(default)]
    text: Value,
}

impl ExportMessage {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        if let Some(secs) = self.date_unixtime.as_deref().and_then(|s| s.parse().ok()) {
            return DateTime::<Utc>::from_timestamp(secs, 0);
        }
        let naive = NaiveDateTime::parse_from_str(self.date.as_deref()?, "%Y-%m-%dT%H:%M:%S").ok()?;
        Some(naive.and_utc())
    }

    /// Numeric part of `user123` / `channel123`.
    fn sender_id(&self) -> Option<i64> {
        let raw = self.from_id.as_deref()?;
        let digits = raw.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        digits.parse().ok()
    }
}

/// Flatten export text: a string, or an array of strings and entity objects.
fn flatten_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                Value::Object(obj) => obj
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                _ => String::new(),
            })
            .collect(),
        _ => String::new(),
    }
}

/// Export-file backed history source.
pub struct ExportHistory {
    dir: PathBuf,
}

impl ExportHistory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, channel: &str) -> PathBuf {
        self.dir.join(format!("{}.json", normalize_identifier(channel)))
    }
}

fn into_history(channel: &str, export: ExportFile, limit: usize) -> ChatHistory {
    let kind = if export.chat_type.contains("channel") {
        ChatKind::Broadcast
    } else {
        ChatKind::Group
    };

    let mut names: HashMap<i64, String> = HashMap::new();
    let mut messages: Vec<ChatMessage> = export
        .messages
        .iter()
        .filter(|m| m.message_type.is_empty() || m.message_type == "message")
        .filter_map(|m| {
            let date = m.timestamp()?;
            let sender_id = m.sender_id();
            if let (Some(id), Some(name)) = (sender_id, m.from.as_ref()) {
                names.entry(id).or_insert_with(|| name.clone());
            }
            Some(ChatMessage {
                id: m.id,
                date,
                text: flatten_text(&m.text),
                sender_id,
            })
        })
        .collect();

    // Newest first, like a live history request.
    messages.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
    messages.truncate(limit);

    let mut participants: Vec<Participant> = names
        .into_iter()
        .map(|(id, display_name)| Participant { id, display_name })
        .collect();
    participants.sort_by_key(|p| p.id);

    ChatHistory {
        title: export.name.unwrap_or_else(|| channel.to_string()),
        kind,
        messages,
        participants,
    }
}

#[async_trait]
impl HistorySource for ExportHistory {
    async fn fetch_history(&self, channel: &str, limit: usize) -> Result<ChatHistory> {
        let path = self.path_for(channel);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| AppError::history(channel, format!("{}: {e}", path.display())))?;
        let export: ExportFile = serde_json::from_slice(&bytes)?;
        Ok(into_history(channel, export, limit))
    }
}
