// src/services/notifier.rs

//! Per-item notification with trailer enrichment and diagnostic fallback.

use std::sync::Arc;

use unicode_segmentation::UnicodeSegmentation;

use crate::models::{DeliveryStatus, ItemOutcome, ListingRecord};
use crate::services::telegram::{CAPTION_LIMIT, ChatSender, MESSAGE_LIMIT, PhotoMessage};
use crate::services::trailers::TrailerSearch;
use crate::utils::escape_html;

/// Posts new listing items to the chat.
///
/// Delivery is best effort: a failed item produces a diagnostic message
/// and an outcome, never an error, so one bad item cannot stop a batch.
pub struct Notifier {
    sender: Arc<dyn ChatSender>,
    trailers: Option<Arc<dyn TrailerSearch>>,
}

impl Notifier {
    pub fn new(sender: Arc<dyn ChatSender>, trailers: Option<Arc<dyn TrailerSearch>>) -> Self {
        Self { sender, trailers }
    }

    /// Look up a trailer, then deliver the item.
    pub async fn notify_item(&self, record: &ListingRecord, source_label: &str) -> ItemOutcome {
        let trailer_url = self.lookup_trailer(&record.name).await;
        let status = self
            .notify(record, trailer_url.as_deref(), source_label)
            .await;
        ItemOutcome {
            name: record.name.clone(),
            trailer_url,
            status,
        }
    }

    /// Trailer URL for a title; lookup failures only cost the link.
    pub async fn lookup_trailer(&self, name: &str) -> Option<String> {
        let search = self.trailers.as_ref()?;
        match search.find_trailer(name).await {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Trailer lookup failed for '{}': {}", name, e);
                None
            }
        }
    }

    /// Deliver one item, falling back to a plain diagnostic text on failure.
    pub async fn notify(
        &self,
        record: &ListingRecord,
        trailer_url: Option<&str>,
        source_label: &str,
    ) -> DeliveryStatus {
        let caption = format_caption(record, trailer_url, source_label);
        let sent = if record.has_poster() {
            let photo = PhotoMessage {
                photo_url: record.poster_url.clone(),
                caption,
            };
            self.sender.send_photo(&photo).await
        } else {
            self.sender.send_text(&caption, true).await
        };

        let error = match sent {
            Ok(()) => {
                log::info!("Notified: {}", record.name);
                return DeliveryStatus::Delivered;
            }
            Err(e) => e.to_string(),
        };

        log::warn!("Delivery failed for '{}': {}", record.name, error);
        let diagnostic = format_diagnostic(record, trailer_url, &error);
        match self.sender.send_text(&diagnostic, false).await {
            Ok(()) => DeliveryStatus::FallbackSent { error },
            Err(e) => {
                log::error!("Fallback message failed for '{}': {}", record.name, e);
                DeliveryStatus::Failed {
                    error,
                    fallback_error: e.to_string(),
                }
            }
        }
    }
}

/// HTML caption: linked bold title, optional trailer line, source line.
///
/// The caption limit applies to the visible text, so only the title, the
/// trailer link text and the label count towards it. An overlong title is
/// shortened; the rest is kept.
pub fn format_caption(record: &ListingRecord, trailer_url: Option<&str>, source_label: &str) -> String {
    let mut tail = String::new();
    let mut tail_len = 0;
    if let Some(url) = trailer_url {
        tail.push_str(&format!("\n🎬 <a href=\"{}\">Трейлер</a>", escape_html(url)));
        tail_len += "\n🎬 Трейлер".chars().count();
    }
    if !source_label.is_empty() {
        tail.push_str(&format!("\n<i>{}</i>", escape_html(source_label)));
        tail_len += 1 + source_label.chars().count();
    }

    let name = escape_html(&fit_title(&record.name, CAPTION_LIMIT.saturating_sub(tail_len)));
    if record.detail_url.is_empty() {
        format!("<b>{name}</b>{tail}")
    } else {
        format!(
            "<b><a href=\"{}\">{name}</a></b>{tail}",
            escape_html(&record.detail_url)
        )
    }
}

/// `title` cut on a grapheme boundary, with an ellipsis, to at most `budget` characters.
fn fit_title(title: &str, budget: usize) -> String {
    if title.chars().count() <= budget {
        return title.to_string();
    }
    let mut short = String::new();
    let mut len = 1;
    for grapheme in title.graphemes(true) {
        let n = grapheme.chars().count();
        if len + n > budget {
            break;
        }
        short.push_str(grapheme);
        len += n;
    }
    short.push('…');
    short
}

/// Plain-text diagnostic describing a failed delivery.
pub fn format_diagnostic(record: &ListingRecord, trailer_url: Option<&str>, error: &str) -> String {
    let text = format!(
        "Failed to deliver listing notification\n\
         name: {}\n\
         poster: {}\n\
         detail: {}\n\
         trailer: {}\n\
         error: {}",
        record.name,
        record.poster_url,
        record.detail_url,
        trailer_url.unwrap_or("-"),
        error
    );
    text.chars().take(MESSAGE_LIMIT).collect()
}
