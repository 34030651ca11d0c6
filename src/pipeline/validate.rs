// src/pipeline/validate.rs

use url::Url;

use crate::error::Result;
use crate::models::Config;
use crate::services::parse_listing;
use crate::utils;

/// Check configuration sanity and report which collaborators are configured.
///
/// Fails on invalid values or unparsable selectors; missing credentials
/// are only reported, since each subcommand needs a different subset.
pub fn run_validate(config: &Config) -> Result<()> {
    utils::log::header("Validating configuration");

    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }
    utils::log::sub_item(&format!("User agent: {}", config.crawler.user_agent));
    utils::log::sub_item(&format!("Timeout: {}s", config.crawler.timeout_secs));
    utils::log::sub_item(&format!(
        "Retry: {} attempts, {}ms..{}ms",
        config.retry.max_attempts, config.retry.base_delay_ms, config.retry.max_delay_ms
    ));

    for source in &config.sources {
        // An empty page still compiles every selector.
        parse_listing("", &Url::parse(&source.url)?, &source.selectors)?;
        utils::log::sub_item(&format!("Source {}: {}", source.label, source.url));
    }

    let missing = missing_settings(config);
    for name in &missing {
        log::warn!("Not set: {}", name);
    }

    utils::log::summary(
        "Validation passed",
        &[
            ("Sources", config.sources.len().to_string()),
            ("Channels", config.summarizer.channels.len().to_string()),
            (
                "State store",
                if config.state.spreadsheet_id.is_some() {
                    "spreadsheet".to_string()
                } else {
                    format!("file {}", config.state.local_path)
                },
            ),
            ("Missing settings", missing.len().to_string()),
        ],
    );
    Ok(())
}

/// Environment settings a full deployment needs but which are unset.
pub fn missing_settings(config: &Config) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if config.sources.is_empty() {
        missing.push("LISTING_URLS");
    }
    if config.telegram.bot_token.is_none() {
        missing.push("BOT_TOKEN");
    }
    if config.telegram.chat_id.is_none() {
        missing.push("BOT_CHATID");
    }
    if config.state.spreadsheet_id.is_some() && config.state.credentials_json.is_none() {
        missing.push("CREDENTIALS");
    }
    if config.trailers.api_key.is_none() {
        missing.push("YOUTUBE_API_KEY");
    }
    if config.summarizer.channels.is_empty() {
        missing.push("CHANNEL_URL");
    }
    if config.summarizer.api_key.is_none() {
        missing.push("GOOGLE_API_KEY");
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::SourceConfig;

    #[test]
    fn test_default_config_passes_with_missing_settings() {
        let config = Config::default();
        assert!(run_validate(&config).is_ok());
        let missing = missing_settings(&config);
        assert!(missing.contains(&"BOT_TOKEN"));
        assert!(!missing.contains(&"CREDENTIALS"));
    }

    #[test]
    fn test_spreadsheet_without_credentials_is_reported() {
        let mut config = Config::default();
        config.state.spreadsheet_id = Some("sheet".into());
        assert!(missing_settings(&config).contains(&"CREDENTIALS"));
    }

    #[test]
    fn test_bad_selector_fails() {
        let mut config = Config::default();
        let mut source = SourceConfig::from_entry("Bad|https://example.com/top").unwrap();
        source.selectors.item = "a[href^=".into();
        config.sources.push(source);

        assert!(matches!(
            run_validate(&config),
            Err(AppError::Selector { .. })
        ));
    }
}
