//! listwatch CLI
//!
//! Local and scheduled execution entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use listwatch::{
    config,
    error::{AppError, Result},
    models::{Config, HistoryConfig},
    pipeline,
    services::{
        BotClient, ChannelSummarizer, ChatSender, ExportHistory, GeminiClient, HistorySource,
        HtmlListingSource, ListingSource, Notifier, SessionVault, TrailerSearch, YoutubeSearch,
    },
    storage::{LocalStore, NotifiedStore, SheetsStore},
    utils::{self, http, retry::RetryPolicy},
};

/// listwatch - listing watcher and channel summarizer
#[derive(Parser, Debug)]
#[command(
    name = "listwatch",
    version,
    about = "Posts new listing titles to Telegram and summarizes channels"
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "storage/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch listings and notify new items
    Notify {
        /// Report new items without sending or persisting anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Summarize recent channel history
    Summarize {
        /// Post the digest to the bot chat instead of printing it
        #[arg(long)]
        send: bool,
    },

    /// Validate configuration
    Validate,

    /// Manage the encrypted session file
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Show configured sources, channels and state
    Info,
}

#[derive(Subcommand, Debug)]
enum SessionAction {
    /// Sign in to Telegram and write the plain session file
    #[cfg(feature = "mtproto")]
    Login,
    /// Encrypt the plain session file
    Seal,
    /// Decrypt the encrypted session file
    Unseal,
    /// Print a fresh encryption key
    Keygen,
}

/// Initialize logging; `RUST_LOG` wins over the given default level.
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Read one line from the terminal.
#[cfg(feature = "mtproto")]
fn prompt(message: &str) -> Result<String> {
    use std::io::Write;

    print!("{message}: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[cfg(feature = "mtproto")]
async fn login(config: &HistoryConfig) -> Result<()> {
    let (Some(api_id), Some(api_hash)) = (config.api_id, config.api_hash.as_deref()) else {
        return Err(AppError::config("TELEGRAM_API_ID and API_HASH are required to sign in"));
    };
    let phone = match config.phone_number.clone() {
        Some(phone) => phone,
        None => prompt("Phone number")?,
    };
    let plain = Path::new(&config.session_file);
    listwatch::services::MtprotoHistory::login(api_id, api_hash, plain, &phone, prompt).await?;
    log::info!("Session written to {}", plain.display());

    if config.session_key.is_some() {
        SessionVault::from_config(config)?
            .seal(plain, Path::new(&config.encrypted_session_file))
            .await?;
    }
    Ok(())
}

/// Spreadsheet when one is configured, local JSON file otherwise.
fn build_store(
    config: &Config,
    client: reqwest::Client,
    retry: RetryPolicy,
) -> Result<Box<dyn NotifiedStore>> {
    if config.state.spreadsheet_id.is_some() {
        Ok(Box::new(SheetsStore::from_config(&config.state, client, retry)?))
    } else {
        Ok(Box::new(LocalStore::new(&config.state.local_path)))
    }
}

#[cfg(feature = "mtproto")]
async fn live_history(config: &HistoryConfig) -> Result<Option<Arc<dyn HistorySource>>> {
    let (Some(api_id), Some(api_hash)) = (config.api_id, config.api_hash.as_deref()) else {
        return Ok(None);
    };
    let history = listwatch::services::MtprotoHistory::connect(
        api_id,
        api_hash,
        Path::new(&config.session_file),
    )
    .await?;
    Ok(Some(Arc::new(history)))
}

#[cfg(not(feature = "mtproto"))]
async fn live_history(config: &HistoryConfig) -> Result<Option<Arc<dyn HistorySource>>> {
    if config.api_id.is_some() {
        log::warn!("TELEGRAM_API_ID is set but this build has no mtproto support");
    }
    Ok(None)
}

async fn build_history(config: &HistoryConfig) -> Result<Arc<dyn HistorySource>> {
    if config.session_key.is_some() {
        SessionVault::from_config(config)?
            .unseal(
                Path::new(&config.encrypted_session_file),
                Path::new(&config.session_file),
            )
            .await?;
    }
    if let Some(history) = live_history(config).await? {
        return Ok(history);
    }
    log::info!("Reading chat history from exports in {}", config.export_dir);
    Ok(Arc::new(ExportHistory::new(config.export_dir.clone())))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        Config::load(&cli.config)
            .map(|c| c.logging.level)
            .unwrap_or_else(|_| "info".to_string())
    };
    init_logging(&level);

    log::info!("listwatch starting...");
    let config = config::load_config(&cli.config)?;
    log::info!("Loaded configuration from {}", cli.config.display());

    let retry = RetryPolicy::from_config(&config.retry);

    match cli.command {
        Command::Notify { dry_run } => {
            if config.sources.is_empty() {
                return Err(AppError::config("LISTING_URLS is not set"));
            }
            let client = http::create_async_client(&config.crawler)?;
            let sources: Vec<Box<dyn ListingSource>> = config
                .sources
                .iter()
                .cloned()
                .map(|source| {
                    Box::new(HtmlListingSource::new(source, client.clone(), retry.clone()))
                        as Box<dyn ListingSource>
                })
                .collect();
            let store = build_store(&config, client.clone(), retry.clone())?;

            let notifier = if dry_run {
                None
            } else {
                let bot = BotClient::from_config(&config.telegram, retry.clone())?;
                let trailers =
                    YoutubeSearch::from_config(&config.trailers, client.clone(), retry.clone())
                        .map(|search| Arc::new(search) as Arc<dyn TrailerSearch>);
                if trailers.is_none() {
                    log::info!("YOUTUBE_API_KEY not set, trailer links disabled");
                }
                Some(Notifier::new(Arc::new(bot), trailers))
            };

            let report = pipeline::run_notifier(&sources, store.as_ref(), notifier.as_ref()).await?;
            log::info!(
                "Notify complete: {} new, {} delivered",
                report.new_items(),
                report.delivered()
            );
        }

        Command::Summarize { send } => {
            let channels = config.summarizer.channels.clone();
            if channels.is_empty() {
                return Err(AppError::config("CHANNEL_URL is not set"));
            }
            let client = http::create_async_client(&config.crawler)?;
            let generator = Arc::new(GeminiClient::from_config(&config.summarizer, client)?);
            let bot = if send {
                Some(BotClient::from_config(&config.telegram, retry)?)
            } else {
                None
            };
            let history = build_history(&config.summarizer.history).await?;
            let summarizer = ChannelSummarizer::new(history, generator, config.summarizer.clone());

            let sender = bot.as_ref().map(|b| b as &dyn ChatSender);
            let report = pipeline::run_summarizer(&summarizer, &channels, sender).await?;
            if !send {
                println!("{}", report.digest());
            }
        }

        Command::Validate => {
            pipeline::run_validate(&config)?;
            log::info!("All validations passed!");
        }

        Command::Session { action } => {
            let history = &config.summarizer.history;
            let plain = Path::new(&history.session_file);
            let sealed = Path::new(&history.encrypted_session_file);
            match action {
                SessionAction::Keygen => println!("{}", SessionVault::generate_key()),
                #[cfg(feature = "mtproto")]
                SessionAction::Login => login(history).await?,
                SessionAction::Seal => SessionVault::from_config(history)?.seal(plain, sealed).await?,
                SessionAction::Unseal => {
                    SessionVault::from_config(history)?.unseal(sealed, plain).await?
                }
            }
        }

        Command::Info => {
            utils::log::header("listwatch info");
            for source in &config.sources {
                utils::log::sub_item(&format!("source {}: {}", source.label, source.url));
            }
            for channel in &config.summarizer.channels {
                utils::log::sub_item(&format!("channel: {}", channel));
            }

            let client = http::create_async_client(&config.crawler)?;
            match build_store(&config, client, retry) {
                Ok(store) => match store.load().await {
                    Ok(records) => log::info!(
                        "Notified set: {} records in {}",
                        records.len(),
                        store.describe()
                    ),
                    Err(e) => log::warn!("Cannot read {}: {}", store.describe(), e),
                },
                Err(e) => log::warn!("State store not available: {}", e),
            }

            let missing = pipeline::missing_settings(&config);
            if !missing.is_empty() {
                log::info!("Not set: {}", missing.join(", "));
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
