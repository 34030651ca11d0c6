//! Service layer for the bot.
//!
//! This module contains the collaborators used by the pipelines:
//! - Listing page scraping (`HtmlListingSource`)
//! - Chat delivery (`BotClient`) and per-item notification (`Notifier`)
//! - Trailer lookup (`YoutubeSearch`)
//! - Channel summaries (`ChannelSummarizer`, `GeminiClient`, history sources)
//! - Session file encryption (`SessionVault`)

mod gemini;
pub mod history;
mod listings;
mod notifier;
mod session;
mod summarizer;
mod telegram;
mod trailers;

pub use gemini::{GeminiClient, TextGenerator};
pub use history::{ExportHistory, HistorySource};
#[cfg(feature = "mtproto")]
pub use history::MtprotoHistory;
pub use listings::{HtmlListingSource, ListingSource, parse_listing};
pub use notifier::{Notifier, format_caption, format_diagnostic};
pub use session::SessionVault;
pub use summarizer::{ChannelSummarizer, build_transcript};
pub use telegram::{BotClient, CAPTION_LIMIT, ChatSender, MESSAGE_LIMIT, PhotoMessage};
pub use trailers::{TrailerSearch, YoutubeSearch};
