//! Chat history sources for the summarizer.
//!
//! - `ExportHistory`: Telegram Desktop JSON exports on disk
//! - `MtprotoHistory`: live user session (feature `mtproto`)

mod export;
#[cfg(feature = "mtproto")]
mod mtproto;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ChatHistory;

pub use export::ExportHistory;
#[cfg(feature = "mtproto")]
pub use mtproto::MtprotoHistory;

/// Reads recent messages of a channel or chat.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Up to `limit` most recent messages (newest first) plus participants.
    ///
    /// `channel` is a handle (`@name`, `name`, `https://t.me/name`) or a
    /// numeric chat ID.
    async fn fetch_history(&self, channel: &str, limit: usize) -> Result<ChatHistory>;
}

/// Normalize a configured channel identifier to a bare handle or ID.
pub fn normalize_identifier(channel: &str) -> String {
    let trimmed = channel.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let without_host = without_scheme
        .strip_prefix("t.me/")
        .or_else(|| without_scheme.strip_prefix("telegram.me/"))
        .unwrap_or(without_scheme);
    without_host
        .trim_start_matches('@')
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("https://t.me/rustlang/"), "rustlang");
        assert_eq!(normalize_identifier("@rustlang"), "rustlang");
        assert_eq!(normalize_identifier(" -1001234567890 "), "-1001234567890");
        assert_eq!(normalize_identifier("t.me/some_chat"), "some_chat");
    }
}
