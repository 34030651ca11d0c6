//! Telegram Bot API delivery.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode, Recipient};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::TelegramConfig;
use crate::utils::retry::{RetryPolicy, with_retry};

/// Maximum length of a text message.
pub const MESSAGE_LIMIT: usize = 4096;

/// Maximum length of a photo caption.
pub const CAPTION_LIMIT: usize = 1024;

/// A photo message with an HTML caption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoMessage {
    pub photo_url: String,
    pub caption: String,
}

/// Something that can post messages to the notification chat.
#[async_trait]
pub trait ChatSender: Send + Sync {
    /// Send a text message. `html` switches on HTML parse mode.
    async fn send_text(&self, text: &str, html: bool) -> Result<()>;

    /// Send a photo with an HTML caption.
    async fn send_photo(&self, photo: &PhotoMessage) -> Result<()>;
}

/// Bot bound to one chat.
pub struct BotClient {
    bot: Bot,
    chat: Recipient,
    retry: RetryPolicy,
}

impl BotClient {
    pub fn new(api_base: &str, token: &str, chat_id: &str, retry: RetryPolicy) -> Result<Self> {
        let bot = Bot::new(token).set_api_url(Url::parse(api_base)?);
        Ok(Self {
            bot,
            chat: recipient(chat_id),
            retry,
        })
    }

    /// Build a client from configuration; token and chat are required.
    pub fn from_config(config: &TelegramConfig, retry: RetryPolicy) -> Result<Self> {
        let token = config
            .bot_token
            .as_deref()
            .ok_or_else(|| AppError::config("BOT_TOKEN is not set"))?;
        let chat_id = config
            .chat_id
            .as_deref()
            .ok_or_else(|| AppError::config("BOT_CHATID is not set"))?;
        Self::new(&config.api_base, token, chat_id, retry)
    }
}

/// Numeric chat IDs as-is, anything else as a public `@username`.
fn recipient(chat_id: &str) -> Recipient {
    let chat_id = chat_id.trim();
    match chat_id.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) if chat_id.starts_with('@') => Recipient::ChannelUsername(chat_id.to_string()),
        Err(_) => Recipient::ChannelUsername(format!("@{chat_id}")),
    }
}

#[async_trait]
impl ChatSender for BotClient {
    async fn send_text(&self, text: &str, html: bool) -> Result<()> {
        with_retry(&self.retry, "sendMessage", || async move {
            let mut request = self.bot.send_message(self.chat.clone(), text);
            if html {
                request = request.parse_mode(ParseMode::Html);
            }
            request.await?;
            Ok(())
        })
        .await
    }

    async fn send_photo(&self, photo: &PhotoMessage) -> Result<()> {
        let photo_url = Url::parse(&photo.photo_url)?;
        with_retry(&self.retry, "sendPhoto", || {
            let photo_url = photo_url.clone();
            async move {
                self.bot
                    .send_photo(self.chat.clone(), InputFile::url(photo_url))
                    .caption(photo.caption.as_str())
                    .parse_mode(ParseMode::Html)
                    .await?;
                Ok(())
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::utils::test_server::TestServer;

    fn bot(server: &TestServer, chat_id: &str) -> BotClient {
        BotClient::new(
            &server.url(),
            "123:abc",
            chat_id,
            RetryPolicy::fixed(2, Duration::from_millis(1)),
        )
        .unwrap()
    }

    #[test]
    fn test_recipient_from_chat_id() {
        assert_eq!(recipient("-100500"), Recipient::Id(ChatId(-100500)));
        assert_eq!(
            recipient("movie_club"),
            Recipient::ChannelUsername("@movie_club".into())
        );
        assert_eq!(
            recipient("@movie_club"),
            Recipient::ChannelUsername("@movie_club".into())
        );
    }

    #[test]
    fn test_from_config_requires_token() {
        let config = TelegramConfig::default();
        let result = BotClient::from_config(&config, RetryPolicy::default());
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_refused_message_is_a_permanent_error() {
        let server = TestServer::start(|_| {
            (
                200,
                r#"{"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}"#
                    .to_string(),
            )
        })
        .await;

        let err = bot(&server, "-100500")
            .send_text("<b>Film</b>", true)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Telegram(_)));
        assert!(!err.is_transient());
        assert!(err.to_string().contains("chat not found"));

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].target.to_lowercase().ends_with("/bot123:abc/sendmessage"));
        assert!(requests[0].body.contains("-100500"));
        assert!(requests[0].body.contains("\"HTML\""));
    }

    #[tokio::test]
    async fn test_flood_wait_is_retried() {
        let server = TestServer::start(|_| {
            (
                429,
                r#"{"ok": false, "error_code": 429, "description": "Too Many Requests: retry after 1", "parameters": {"retry_after": 1}}"#
                    .to_string(),
            )
        })
        .await;

        let err = bot(&server, "-100500")
            .send_text("plain", false)
            .await
            .unwrap_err();

        assert!(err.is_rate_limited());
        assert_eq!(server.requests().len(), 2);
    }
}
