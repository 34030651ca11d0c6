// src/config.rs

//! Configuration loading.
//!
//! Settings come from an optional TOML file and are then overlaid with
//! environment variables, which always win. Secrets are expected to come
//! from the environment only.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{Config, SourceConfig};

/// Load `path` (defaults if missing or invalid), then apply the process environment.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load_or_default(path);
    apply_env(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Overlay environment values onto `config`.
///
/// `lookup` returns the value of a variable; empty values count as unset.
pub fn apply_env<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(urls) = var("LISTING_URLS") {
        config.sources = split_list(&urls)
            .filter_map(SourceConfig::from_entry)
            .collect();
    }

    if let Some(token) = var("BOT_TOKEN") {
        config.telegram.bot_token = Some(token);
    }
    if let Some(chat_id) = var("BOT_CHATID") {
        config.telegram.chat_id = Some(chat_id);
    }

    if let Some(credentials) = var("CREDENTIALS") {
        config.state.credentials_json = Some(credentials);
    }
    if let Some(id) = var("SPREADSHEET_ID") {
        config.state.spreadsheet_id = Some(id);
    }
    if let Some(worksheet) = var("WORKSHEET") {
        config.state.worksheet = worksheet;
    }
    if let Some(path) = var("STATE_FILE") {
        config.state.local_path = path;
    }

    if let Some(key) = var("YOUTUBE_API_KEY") {
        config.trailers.api_key = Some(key);
    }

    if let Some(channels) = var("CHANNEL_URL") {
        config.summarizer.channels = split_list(&channels).map(str::to_string).collect();
    }
    if let Some(key) = var("GOOGLE_API_KEY") {
        config.summarizer.api_key = Some(key);
    }
    if let Some(model) = var("GEMINI_MODEL") {
        config.summarizer.model = model;
    }

    let history = &mut config.summarizer.history;
    if let Some(api_id) = var("TELEGRAM_API_ID") {
        let parsed = api_id
            .trim()
            .parse()
            .map_err(|_| AppError::config(format!("TELEGRAM_API_ID is not a number: {api_id}")))?;
        history.api_id = Some(parsed);
    }
    if let Some(hash) = var("API_HASH") {
        history.api_hash = Some(hash);
    }
    if let Some(key) = var("SECRET_KEY") {
        history.session_key = Some(key);
    }
    if let Some(phone) = var("PHONE_NUMBER") {
        history.phone_number = Some(phone);
    }
    if let Some(path) = var("SESSION_FILE") {
        history.session_file = path;
    }
    if let Some(path) = var("ENCRYPTED_SESSION_FILE") {
        history.encrypted_session_file = path;
    }
    if let Some(dir) = var("HISTORY_EXPORT_DIR") {
        history.export_dir = dir;
    }

    Ok(())
}

/// Non-empty, trimmed items of a `;`-separated list.
fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(';').map(str::trim).filter(|s| !s.is_empty())
}
