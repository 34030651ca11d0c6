// src/services/summarizer.rs

//! Channel summarizer.
//!
//! Reads the recent history of each configured channel, builds a transcript
//! of the text messages inside the trailing window and asks the text
//! generator for a summary. Channels are processed one at a time and a
//! failing channel never stops the others.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{
    ChannelOutcome, ChatHistory, ChatKind, SummarizerConfig, SummaryReport, SummaryStatus,
};
use crate::services::gemini::TextGenerator;
use crate::services::history::HistorySource;
use crate::utils::retry::{RetryPolicy, with_retry_if};

pub struct ChannelSummarizer {
    history: Arc<dyn HistorySource>,
    generator: Arc<dyn TextGenerator>,
    config: SummarizerConfig,
    quota_policy: RetryPolicy,
}

impl ChannelSummarizer {
    pub fn new(
        history: Arc<dyn HistorySource>,
        generator: Arc<dyn TextGenerator>,
        config: SummarizerConfig,
    ) -> Self {
        let quota_policy = RetryPolicy::fixed(
            config.quota_retry_attempts,
            Duration::from_secs(config.quota_retry_delay_secs),
        );
        Self {
            history,
            generator,
            config,
            quota_policy,
        }
    }

    /// Override the wait used between quota retries.
    pub fn with_quota_policy(mut self, policy: RetryPolicy) -> Self {
        self.quota_policy = policy;
        self
    }

    /// Summarize every channel, in order.
    pub async fn summarize(&self, channels: &[String]) -> SummaryReport {
        self.summarize_at(channels, Utc::now()).await
    }

    pub async fn summarize_at(&self, channels: &[String], now: DateTime<Utc>) -> SummaryReport {
        let mut report = SummaryReport::default();
        for channel in channels {
            log::info!("Summarizing {}", channel);
            let outcome = self.summarize_channel(channel, now).await;
            match &outcome.status {
                SummaryStatus::Summarized(_) => {
                    log::info!("  ✓ {} ({} messages)", outcome.channel_name, outcome.message_count)
                }
                SummaryStatus::NoMessages => {
                    log::info!("  - {}: no messages in window", outcome.channel_name)
                }
                SummaryStatus::NoCandidates => {
                    log::warn!("  - {}: model returned no candidates", outcome.channel_name)
                }
                SummaryStatus::Failed(e) => log::error!("  ✗ {}: {}", channel, e),
            }
            report.channels.push(outcome);
        }
        report
    }

    async fn summarize_channel(&self, channel: &str, now: DateTime<Utc>) -> ChannelOutcome {
        let mut outcome = ChannelOutcome {
            channel: channel.to_string(),
            channel_name: channel.to_string(),
            message_count: 0,
            status: SummaryStatus::NoMessages,
        };

        let history = match self
            .history
            .fetch_history(channel, self.config.message_limit)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                outcome.status = SummaryStatus::Failed(e.to_string());
                return outcome;
            }
        };
        if !history.title.is_empty() {
            outcome.channel_name = history.title.clone();
        }

        let window = chrono::Duration::hours(i64::from(self.config.window_hours));
        let lines = build_transcript(&history, now, window);
        outcome.message_count = lines.len();
        if lines.is_empty() {
            return outcome;
        }

        let prompt_tail = match history.kind {
            ChatKind::Broadcast => &self.config.broadcast_prompt,
            ChatKind::Group => &self.config.chat_prompt,
        };
        let prompt = format!("{} {}", lines.join("\n"), prompt_tail);

        outcome.status = match self.generate(&prompt, &outcome.channel_name).await {
            Ok(Some(text)) => SummaryStatus::Summarized(text),
            Ok(None) => SummaryStatus::NoCandidates,
            Err(e) => SummaryStatus::Failed(e.to_string()),
        };
        outcome
    }

    async fn generate(&self, prompt: &str, label: &str) -> Result<Option<String>> {
        with_retry_if(
            &self.quota_policy,
            label,
            AppError::is_rate_limited,
            || self.generator.generate(prompt),
        )
        .await
    }
}

/// Text lines inside `(now - window, now]`, oldest first.
///
/// Group chats get a `Name: ` prefix resolved from the participant list.
pub fn build_transcript(
    history: &ChatHistory,
    now: DateTime<Utc>,
    window: chrono::Duration,
) -> Vec<String> {
    let since = now - window;
    let names = history.name_lookup();

    let mut messages: Vec<_> = history
        .messages
        .iter()
        .filter(|m| m.date > since && m.date <= now && !m.text.trim().is_empty())
        .collect();
    messages.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));

    messages
        .into_iter()
        .map(|m| match history.kind {
            ChatKind::Broadcast => m.text.clone(),
            ChatKind::Group => {
                let speaker = match m.sender_id {
                    Some(id) => names
                        .get(&id)
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| id.to_string()),
                    None => "Unknown".to_string(),
                };
                format!("{}: {}", speaker, m.text)
            }
        })
        .collect()
}
