//! Run reports for the notify and summarize flows.

use serde::Serialize;

/// How one listing source fared during a run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub label: String,
    pub url: String,
    /// Records parsed, `None` when the fetch failed
    pub fetched: Option<usize>,
    pub error: Option<String>,
}

/// Delivery status of a single new item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// The formatted message was accepted
    Delivered,
    /// The message failed, the diagnostic fallback was accepted
    FallbackSent { error: String },
    /// Both the message and the fallback failed
    Failed {
        error: String,
        fallback_error: String,
    },
    /// Delivery was not attempted (dry run)
    Skipped,
}

impl DeliveryStatus {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Outcome for one new item.
#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    pub name: String,
    pub trailer_url: Option<String>,
    pub status: DeliveryStatus,
}

/// Summary of one notify run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub sources: Vec<SourceOutcome>,
    /// Unique records across all sources
    pub fetched: usize,
    /// Size of the notified set before the run
    pub previously_notified: usize,
    pub outcomes: Vec<ItemOutcome>,
    /// Whether the notified set was written back
    pub persisted: bool,
}

impl RunReport {
    pub fn new_items(&self) -> usize {
        self.outcomes.len()
    }

    pub fn delivered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status.is_delivered())
            .count()
    }

    pub fn delivery_failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                matches!(
                    o.status,
                    DeliveryStatus::FallbackSent { .. } | DeliveryStatus::Failed { .. }
                )
            })
            .count()
    }

    pub fn source_failures(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_some()).count()
    }
}

/// Result of summarizing one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SummaryStatus {
    Summarized(String),
    /// No text messages inside the window; the model was not called
    NoMessages,
    /// The model answered without candidates
    NoCandidates,
    Failed(String),
}

/// Outcome for one channel.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelOutcome {
    /// Identifier as configured
    pub channel: String,
    /// Display title, falls back to the identifier
    pub channel_name: String,
    /// Text messages inside the window
    pub message_count: usize,
    pub status: SummaryStatus,
}

/// A finished channel summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSummary {
    pub channel_name: String,
    pub summary_text: String,
}

/// Summary of one summarizer run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SummaryReport {
    pub channels: Vec<ChannelOutcome>,
}

impl SummaryReport {
    /// Channels that produced a summary, in processing order.
    pub fn summaries(&self) -> Vec<ChannelSummary> {
        self.channels
            .iter()
            .filter_map(|c| match &c.status {
                SummaryStatus::Summarized(text) => Some(ChannelSummary {
                    channel_name: c.channel_name.clone(),
                    summary_text: text.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> usize {
        self.channels
            .iter()
            .filter(|c| matches!(c.status, SummaryStatus::Failed(_)))
            .count()
    }

    /// Render all summaries as one digest text.
    pub fn digest(&self) -> String {
        self.summaries()
            .iter()
            .map(|s| {
                format!(
                    "-----Telegram channel: {} -----\n{}",
                    s.channel_name,
                    s.summary_text.trim()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
