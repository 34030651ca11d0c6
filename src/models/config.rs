//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Backoff for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Listing pages to watch
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// Telegram Bot API delivery
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// YouTube trailer lookup
    #[serde(default)]
    pub trailers: TrailerConfig,

    /// Where the notified set lives
    #[serde(default)]
    pub state: StateConfig,

    /// Channel summarizer settings
    #[serde(default)]
    pub summarizer: SummarizerConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::validation("retry.max_attempts must be > 0"));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(AppError::validation(
                "retry.max_delay_ms must be >= retry.base_delay_ms",
            ));
        }
        for source in &self.sources {
            url::Url::parse(&source.url).map_err(|e| {
                AppError::validation(format!("source '{}' has invalid url: {e}", source.label))
            })?;
            if source.selectors.item.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "source '{}' has an empty item selector",
                    source.label
                )));
            }
        }
        if self.summarizer.window_hours == 0 {
            return Err(AppError::validation("summarizer.window_hours must be > 0"));
        }
        if self.summarizer.message_limit == 0 {
            return Err(AppError::validation("summarizer.message_limit must be > 0"));
        }
        if self.summarizer.quota_retry_attempts == 0 {
            return Err(AppError::validation(
                "summarizer.quota_retry_attempts must be > 0",
            ));
        }
        Ok(())
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Exponential backoff settings for transient failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(default = "defaults::base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound for a single delay
    #[serde(default = "defaults::max_delay_ms")]
    pub max_delay_ms: u64,
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay_ms(),
            max_delay_ms: defaults::max_delay_ms(),
        }
    }
}

/// A listing page to watch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Human-readable label shown in messages
    pub label: String,

    /// Listing page URL
    pub url: String,

    /// How to pick records out of the page
    #[serde(default)]
    pub selectors: ListingSelectors,
}

impl SourceConfig {
    /// Parse one `LISTING_URLS` entry: `url` or `label|url`.
    pub fn from_entry(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        if entry.is_empty() {
            return None;
        }
        let (label, url) = match entry.split_once('|') {
            Some((label, url)) => (label.trim().to_string(), url.trim().to_string()),
            None => {
                let label = crate::utils::get_domain(entry).unwrap_or_else(|| entry.to_string());
                (label, entry.to_string())
            }
        };
        Some(Self {
            label,
            url,
            selectors: ListingSelectors::default(),
        })
    }
}

/// CSS selectors describing a listing page layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSelectors {
    /// Selector matching one element per listed item
    #[serde(default = "defaults::item_selector")]
    pub item: String,

    /// Attribute holding the title; `None` means the element text
    #[serde(default = "defaults::name_attr")]
    pub name_attr: Option<String>,

    /// Attribute holding the detail link on the item element
    #[serde(default = "defaults::link_attr")]
    pub link_attr: String,

    /// Selector for the poster image, relative to the item element
    #[serde(default = "defaults::poster_selector")]
    pub poster: Option<String>,

    /// Attribute holding the poster URL
    #[serde(default = "defaults::poster_attr")]
    pub poster_attr: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            item: defaults::item_selector(),
            name_attr: defaults::name_attr(),
            link_attr: defaults::link_attr(),
            poster: defaults::poster_selector(),
            poster_attr: defaults::poster_attr(),
        }
    }
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token
    #[serde(default, skip_serializing)]
    pub bot_token: Option<String>,

    /// Chat receiving notifications
    #[serde(default)]
    pub chat_id: Option<String>,

    /// Bot API base URL
    #[serde(default = "defaults::telegram_api_base")]
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: defaults::telegram_api_base(),
        }
    }
}

/// Trailer lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailerConfig {
    /// YouTube Data API key; lookups are skipped without it
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Search query, `{name}` is replaced with the title
    #[serde(default = "defaults::trailer_query")]
    pub query_template: String,

    /// Candidates requested per search
    #[serde(default = "defaults::trailer_max_results")]
    pub max_results: u32,
}

impl Default for TrailerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            query_template: defaults::trailer_query(),
            max_results: defaults::trailer_max_results(),
        }
    }
}

/// Notified-set storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Spreadsheet ID; when set the spreadsheet is the state store
    #[serde(default)]
    pub spreadsheet_id: Option<String>,

    /// Worksheet (tab) title inside the spreadsheet
    #[serde(default = "defaults::worksheet")]
    pub worksheet: String,

    /// Service-account key JSON
    #[serde(default, skip_serializing)]
    pub credentials_json: Option<String>,

    /// JSON file used when no spreadsheet is configured
    #[serde(default = "defaults::state_file")]
    pub local_path: String,

    /// Sheets API base URL
    #[serde(default = "defaults::sheets_api_base")]
    pub api_base: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            worksheet: defaults::worksheet(),
            credentials_json: None,
            local_path: defaults::state_file(),
            api_base: defaults::sheets_api_base(),
        }
    }
}

/// Channel summarizer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Channel/chat identifiers (handles or numeric IDs)
    #[serde(default)]
    pub channels: Vec<String>,

    /// Generative-language API key
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Generative model identifier
    #[serde(default = "defaults::model")]
    pub model: String,

    /// Generative-language API base URL
    #[serde(default = "defaults::gemini_api_base")]
    pub api_base: String,

    /// Trailing window of messages to summarize
    #[serde(default = "defaults::window_hours")]
    pub window_hours: u32,

    /// Most recent messages fetched per channel
    #[serde(default = "defaults::message_limit")]
    pub message_limit: usize,

    /// Attempts when the model answers with a quota error
    #[serde(default = "defaults::quota_retry_attempts")]
    pub quota_retry_attempts: u32,

    /// Fixed wait between quota retries
    #[serde(default = "defaults::quota_retry_delay_secs")]
    pub quota_retry_delay_secs: u64,

    /// Instruction appended to broadcast channel posts
    #[serde(default = "defaults::broadcast_prompt")]
    pub broadcast_prompt: String,

    /// Instruction appended to multi-party chat transcripts
    #[serde(default = "defaults::chat_prompt")]
    pub chat_prompt: String,

    /// Chat history source settings
    #[serde(default)]
    pub history: HistoryConfig,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            api_key: None,
            model: defaults::model(),
            api_base: defaults::gemini_api_base(),
            window_hours: defaults::window_hours(),
            message_limit: defaults::message_limit(),
            quota_retry_attempts: defaults::quota_retry_attempts(),
            quota_retry_delay_secs: defaults::quota_retry_delay_secs(),
            broadcast_prompt: defaults::broadcast_prompt(),
            chat_prompt: defaults::chat_prompt(),
            history: HistoryConfig::default(),
        }
    }
}

/// Chat history source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Directory of Telegram JSON exports (`<identifier>.json`)
    #[serde(default = "defaults::export_dir")]
    pub export_dir: String,

    /// MTProto application ID
    #[serde(default)]
    pub api_id: Option<i32>,

    /// MTProto application hash
    #[serde(default, skip_serializing)]
    pub api_hash: Option<String>,

    /// Decrypted session file path
    #[serde(default = "defaults::session_file")]
    pub session_file: String,

    /// Encrypted session file path
    #[serde(default = "defaults::encrypted_session_file")]
    pub encrypted_session_file: String,

    /// Fernet key for the encrypted session
    #[serde(default, skip_serializing)]
    pub session_key: Option<String>,

    /// Account phone number used by `session login`
    #[serde(default, skip_serializing)]
    pub phone_number: Option<String>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            export_dir: defaults::export_dir(),
            api_id: None,
            api_hash: None,
            session_file: defaults::session_file(),
            encrypted_session_file: defaults::encrypted_session_file(),
            session_key: None,
            phone_number: None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/46.0.2490.80 Safari/537.36"
            .into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Retry defaults
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn base_delay_ms() -> u64 {
        1_000
    }
    pub fn max_delay_ms() -> u64 {
        30_000
    }

    // Listing selector defaults
    pub fn item_selector() -> String {
        r#"a[href^="/details.php"]"#.into()
    }
    pub fn name_attr() -> Option<String> {
        Some("title".into())
    }
    pub fn link_attr() -> String {
        "href".into()
    }
    pub fn poster_selector() -> Option<String> {
        Some("img".into())
    }
    pub fn poster_attr() -> String {
        "src".into()
    }

    // Delivery defaults
    pub fn telegram_api_base() -> String {
        "https://api.telegram.org".into()
    }
    pub fn trailer_query() -> String {
        "{name} трейлер".into()
    }
    pub fn trailer_max_results() -> u32 {
        5
    }

    // State defaults
    pub fn worksheet() -> String {
        "Sheet1".into()
    }
    pub fn state_file() -> String {
        "storage/notified.json".into()
    }
    pub fn sheets_api_base() -> String {
        "https://sheets.googleapis.com/v4/spreadsheets".into()
    }

    // Summarizer defaults
    pub fn model() -> String {
        "gemini-1.5-flash".into()
    }
    pub fn gemini_api_base() -> String {
        "https://generativelanguage.googleapis.com/v1beta".into()
    }
    pub fn window_hours() -> u32 {
        24
    }
    pub fn message_limit() -> usize {
        100
    }
    pub fn quota_retry_attempts() -> u32 {
        3
    }
    pub fn quota_retry_delay_secs() -> u64 {
        60
    }
    pub fn broadcast_prompt() -> String {
        "Это текст сообщений из канала. \
         Проанализируй этот текст и выдели ключевые темы. \
         Будь лаконичным."
            .into()
    }
    pub fn chat_prompt() -> String {
        "Это текст сообщений из чата, перед каждым сообщением указано имя автора. \
         Проанализируй этот текст, выдели ключевые темы и кто их обсуждал. \
         Будь лаконичным."
            .into()
    }
    pub fn export_dir() -> String {
        "storage/history".into()
    }
    pub fn session_file() -> String {
        "anon.session".into()
    }
    pub fn encrypted_session_file() -> String {
        "anon.session.encrypted".into()
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.crawler.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_source_url() {
        let mut config = Config::default();
        config.sources.push(SourceConfig {
            label: "broken".into(),
            url: "not a url".into(),
            selectors: ListingSelectors::default(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn source_entry_with_label() {
        let source = SourceConfig::from_entry(" Kinozal | https://kinozal.tv/top.php ").unwrap();
        assert_eq!(source.label, "Kinozal");
        assert_eq!(source.url, "https://kinozal.tv/top.php");
    }

    #[test]
    fn source_entry_without_label_uses_domain() {
        let source = SourceConfig::from_entry("https://kinozal.tv/top.php?j=&t=0").unwrap();
        assert_eq!(source.label, "kinozal.tv");
        assert!(SourceConfig::from_entry("  ").is_none());
    }

    #[test]
    fn toml_sections_fill_defaults() {
        let config: Config = toml::from_str(
            r#"
            [retry]
            max_attempts = 5

            [[sources]]
            label = "Top"
            url = "https://example.com/top"
            "#,
        )
        .unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 1_000);
        assert_eq!(config.sources[0].selectors.link_attr, "href");
        assert_eq!(config.summarizer.message_limit, 100);
    }
}
