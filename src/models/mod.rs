// src/models/mod.rs

//! Domain models for the bot.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod history;
mod record;
mod report;

// Re-export all public types
pub use config::{
    Config, CrawlerConfig, HistoryConfig, ListingSelectors, LoggingConfig, RetryConfig,
    SourceConfig, StateConfig, SummarizerConfig, TelegramConfig, TrailerConfig,
};
pub use history::{ChatHistory, ChatKind, ChatMessage, Participant};
pub use record::ListingRecord;
pub use report::{
    ChannelOutcome, ChannelSummary, DeliveryStatus, ItemOutcome, RunReport, SourceOutcome,
    SummaryReport, SummaryStatus,
};
