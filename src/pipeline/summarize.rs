// src/pipeline/summarize.rs

//! Channel digest pipeline.

use crate::error::Result;
use crate::models::SummaryReport;
use crate::services::{ChannelSummarizer, ChatSender, MESSAGE_LIMIT};
use crate::utils;

/// Summarize `channels` and optionally post the digest to the bot chat.
///
/// Per-channel failures end up in the report; only a failed delivery of
/// the digest is returned as an error.
pub async fn run_summarizer(
    summarizer: &ChannelSummarizer,
    channels: &[String],
    sender: Option<&dyn ChatSender>,
) -> Result<SummaryReport> {
    utils::log::header("Channel summarizer");
    let report = summarizer.summarize(channels).await;

    let summaries = report.summaries();
    if let Some(sender) = sender {
        if summaries.is_empty() {
            utils::log::sub_item("nothing to send");
        } else {
            let chunks = utils::split_message(&report.digest(), MESSAGE_LIMIT);
            for chunk in &chunks {
                sender.send_text(chunk, false).await?;
            }
            utils::log::sub_item(&format!("digest sent in {} message(s)", chunks.len()));
        }
    }

    utils::log::summary(
        "Summarizer finished",
        &[
            ("Channels", report.channels.len().to_string()),
            ("Summarized", summaries.len().to_string()),
            ("Failures", report.failures().to_string()),
        ],
    );
    Ok(report)
}
