//! History read through a live Telegram user session.

use std::path::Path;

use async_trait::async_trait;
use grammers_client::types::Chat;
use grammers_client::{Client, Config, InitParams, SignInError};
use grammers_session::Session;

use super::{HistorySource, normalize_identifier};
use crate::error::{AppError, Result};
use crate::models::{ChatHistory, ChatKind, ChatMessage, Participant};

/// MTProto-backed history source.
pub struct MtprotoHistory {
    client: Client,
}

impl MtprotoHistory {
    /// Connect with an already authorized session file.
    pub async fn connect(api_id: i32, api_hash: &str, session_file: &Path) -> Result<Self> {
        let session = Session::load_file(session_file).map_err(|e| {
            AppError::session(format!("cannot load {}: {e}", session_file.display()))
        })?;
        let client = open_client(api_id, api_hash, session).await?;

        if !is_authorized(&client).await? {
            return Err(AppError::auth(
                "Telegram",
                "session is not authorized; run `session login` first",
            ));
        }
        Ok(Self { client })
    }

    /// Sign in with a login code and write the authorized session to `session_file`.
    ///
    /// `prompt` asks the operator for the code and, when two-step
    /// verification is on, the account password.
    pub async fn login<F>(
        api_id: i32,
        api_hash: &str,
        session_file: &Path,
        phone: &str,
        prompt: F,
    ) -> Result<()>
    where
        F: Fn(&str) -> Result<String>,
    {
        let session = Session::load_file_or_create(session_file).map_err(|e| {
            AppError::session(format!("cannot open {}: {e}", session_file.display()))
        })?;
        let client = open_client(api_id, api_hash, session).await?;

        if is_authorized(&client).await? {
            log::info!("Session {} is already signed in", session_file.display());
        } else {
            let token = client
                .request_login_code(phone)
                .await
                .map_err(|e| AppError::auth("Telegram", e))?;
            let code = prompt("Login code")?;
            let user = match client.sign_in(&token, &code).await {
                Ok(user) => user,
                Err(SignInError::PasswordRequired(password_token)) => {
                    let password = prompt("Two-step verification password")?;
                    client
                        .check_password(password_token, password.trim())
                        .await
                        .map_err(|e| AppError::auth("Telegram", e))?
                }
                Err(e) => return Err(AppError::auth("Telegram", e)),
            };
            log::info!("Signed in as {}", user.full_name());
        }

        client.session().save_to_file(session_file)?;
        Ok(())
    }

    async fn resolve(&self, channel: &str) -> Result<Chat> {
        let ident = normalize_identifier(channel);
        let bare = ident
            .strip_prefix("-100")
            .unwrap_or_else(|| ident.trim_start_matches('-'));

        if let Ok(id) = bare.parse::<i64>() {
            let mut dialogs = self.client.iter_dialogs();
            while let Some(dialog) = dialogs
                .next()
                .await
                .map_err(|e| AppError::history(channel, e))?
            {
                if dialog.chat().id() == id {
                    return Ok(dialog.chat().clone());
                }
            }
            return Err(AppError::history(channel, "chat not found among dialogs"));
        }

        self.client
            .resolve_username(&ident)
            .await
            .map_err(|e| AppError::history(channel, e))?
            .ok_or_else(|| AppError::history(channel, "username not found"))
    }
}

#[async_trait]
impl HistorySource for MtprotoHistory {
    async fn fetch_history(&self, channel: &str, limit: usize) -> Result<ChatHistory> {
        let chat = self.resolve(channel).await?;
        let kind = match chat {
            Chat::Channel(_) => ChatKind::Broadcast,
            _ => ChatKind::Group,
        };

        let mut messages = Vec::new();
        let mut iter = self.client.iter_messages(chat.pack()).limit(limit);
        while let Some(message) = iter
            .next()
            .await
            .map_err(|e| AppError::history(channel, e))?
        {
            messages.push(ChatMessage {
                id: i64::from(message.id()),
                date: message.date(),
                text: message.text().to_string(),
                sender_id: message.sender().map(|s| s.id()),
            });
        }

        // Broadcast channels only expose members to admins.
        let mut participants = Vec::new();
        if kind == ChatKind::Group {
            let mut iter = self.client.iter_participants(chat.pack());
            while let Some(participant) = iter
                .next()
                .await
                .map_err(|e| AppError::history(channel, e))?
            {
                participants.push(Participant {
                    id: participant.user.id(),
                    display_name: participant.user.full_name(),
                });
            }
        }

        Ok(ChatHistory {
            title: chat.name().to_string(),
            kind,
            messages,
            participants,
        })
    }
}

async fn open_client(api_id: i32, api_hash: &str, session: Session) -> Result<Client> {
    Client::connect(Config {
        session,
        api_id,
        api_hash: api_hash.to_string(),
        params: InitParams::default(),
    })
    .await
    .map_err(|e| AppError::auth("Telegram", e))
}

async fn is_authorized(client: &Client) -> Result<bool> {
    client
        .is_authorized()
        .await
        .map_err(|e| AppError::auth("Telegram", e))
}
