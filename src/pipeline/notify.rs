// src/pipeline/notify.rs

//! Listing pipeline: fetch, reconcile, notify, persist.

use std::collections::HashMap;

use crate::error::Result;
use crate::models::{DeliveryStatus, ItemOutcome, ListingRecord, RunReport, SourceOutcome};
use crate::pipeline::reconcile::{dedupe_by_name, reconcile};
use crate::services::{ListingSource, Notifier};
use crate::storage::NotifiedStore;
use crate::utils;

/// Run one notification cycle.
///
/// Without a notifier the run is a dry run: new items are reported but
/// nothing is sent or written. Source failures are recorded and skipped;
/// a failing state store aborts the run. Every new item is persisted
/// whatever its delivery status, so a broken item is reported once
/// instead of on every run.
pub async fn run_notifier(
    sources: &[Box<dyn ListingSource>],
    store: &dyn NotifiedStore,
    notifier: Option<&Notifier>,
) -> Result<RunReport> {
    let dry_run = notifier.is_none();
    utils::log::header(if dry_run {
        "Listing notifier (dry run)"
    } else {
        "Listing notifier"
    });
    let mut report = RunReport::default();

    // 1. Fetch every source, one at a time
    utils::log::step(1, 4, &format!("Fetching {} source(s)", sources.len()));
    let mut fetched: Vec<(ListingRecord, String)> = Vec::new();
    for source in sources {
        match source.fetch_top_items().await {
            Ok(records) => {
                utils::log::sub_item(&format!("{}: {} items", source.label(), records.len()));
                report.sources.push(SourceOutcome {
                    label: source.label().to_string(),
                    url: source.url().to_string(),
                    fetched: Some(records.len()),
                    error: None,
                });
                let label = source.label().to_string();
                fetched.extend(records.into_iter().map(|r| (r, label.clone())));
            }
            Err(e) => {
                log::error!("Source {} failed: {}", source.label(), e);
                report.sources.push(SourceOutcome {
                    label: source.label().to_string(),
                    url: source.url().to_string(),
                    fetched: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }
    let fetched = dedupe_by_name(fetched, |(record, _)| record.name.as_str());
    report.fetched = fetched.len();

    // 2. Reconcile against the notified set
    utils::log::step(2, 4, &format!("Loading notified set from {}", store.describe()));
    let notified = store.load().await?;
    report.previously_notified = notified.len();

    let labels: HashMap<&str, &str> = fetched
        .iter()
        .map(|(record, label)| (record.name.as_str(), label.as_str()))
        .collect();
    let current: Vec<ListingRecord> = fetched.iter().map(|(record, _)| record.clone()).collect();
    let new_items = reconcile(&current, &notified);
    utils::log::sub_item(&format!(
        "{} fetched, {} already notified, {} new",
        current.len(),
        notified.len(),
        new_items.len()
    ));

    // 3. Notify
    utils::log::step(3, 4, &format!("Notifying {} new item(s)", new_items.len()));
    for record in &new_items {
        let label = labels.get(record.name.as_str()).copied().unwrap_or_default();
        let outcome = match notifier {
            Some(notifier) => notifier.notify_item(record, label).await,
            None => {
                utils::log::sub_item(&format!("would notify: {} [{}]", record.name, label));
                ItemOutcome {
                    name: record.name.clone(),
                    trailer_url: None,
                    status: DeliveryStatus::Skipped,
                }
            }
        };
        report.outcomes.push(outcome);
    }

    // 4. Persist
    utils::log::step(4, 4, "Persisting notified set");
    if dry_run {
        utils::log::sub_item("dry run, nothing written");
    } else if new_items.is_empty() {
        utils::log::sub_item("no new items, nothing written");
    } else {
        let mut updated = notified;
        updated.extend(new_items);
        store.replace_all(&updated).await?;
        report.persisted = true;
    }

    utils::log::summary(
        "Notifier finished",
        &[
            ("Sources", report.sources.len().to_string()),
            ("Source failures", report.source_failures().to_string()),
            ("Fetched", report.fetched.to_string()),
            ("New", report.new_items().to_string()),
            ("Delivered", report.delivered().to_string()),
            ("Delivery failures", report.delivery_failures().to_string()),
            ("Persisted", report.persisted.to_string()),
        ],
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::error::AppError;
    use crate::services::{ChatSender, PhotoMessage};

    struct FakeSource {
        label: String,
        items: Option<Vec<ListingRecord>>,
    }

    #[async_trait]
    impl ListingSource for FakeSource {
        fn label(&self) -> &str {
            &self.label
        }

        fn url(&self) -> &str {
            "https://example.com/top.php"
        }

        async fn fetch_top_items(&self) -> Result<Vec<ListingRecord>> {
            self.items
                .clone()
                .ok_or_else(|| AppError::api("Listing", 503, "Service Unavailable"))
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<Vec<ListingRecord>>,
        writes: Mutex<usize>,
        fail_load: bool,
    }

    #[async_trait]
    impl NotifiedStore for MemoryStore {
        async fn load(&self) -> Result<Vec<ListingRecord>> {
            if self.fail_load {
                return Err(AppError::api("Sheets", 403, "PERMISSION_DENIED"));
            }
            Ok(self.records.lock().unwrap().clone())
        }

        async fn replace_all(&self, records: &[ListingRecord]) -> Result<()> {
            *self.records.lock().unwrap() = records.to_vec();
            *self.writes.lock().unwrap() += 1;
            Ok(())
        }

        fn describe(&self) -> String {
            "memory".into()
        }
    }

    /// Accepts texts, rejects photos whose caption mentions "Broken".
    #[derive(Default)]
    struct FakeChat {
        captions: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatSender for FakeChat {
        async fn send_text(&self, text: &str, _html: bool) -> Result<()> {
            self.captions.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn send_photo(&self, photo: &PhotoMessage) -> Result<()> {
            if photo.caption.contains("Broken") {
                return Err(AppError::api("Telegram", 400, "Bad Request: wrong type"));
            }
            self.captions.lock().unwrap().push(photo.caption.clone());
            Ok(())
        }
    }

    fn rec(name: &str) -> ListingRecord {
        ListingRecord::new(name, format!("https://x/{name}.jpg"), format!("https://x/{name}"))
    }

    fn source(label: &str, items: Option<Vec<ListingRecord>>) -> Box<dyn ListingSource> {
        Box::new(FakeSource {
            label: label.to_string(),
            items,
        })
    }

    fn notifier(chat: Arc<FakeChat>) -> Notifier {
        Notifier::new(chat, None)
    }

    #[tokio::test]
    async fn test_new_items_notified_and_persisted() {
        let store = MemoryStore::default();
        store.records.lock().unwrap().push(rec("Film A"));
        let chat = Arc::new(FakeChat::default());
        let sources = vec![source("Kinozal", Some(vec![rec("Film A"), rec("Film B")]))];

        let report = run_notifier(&sources, &store, Some(&notifier(chat.clone())))
            .await
            .unwrap();

        assert_eq!(report.new_items(), 1);
        assert_eq!(report.delivered(), 1);
        assert!(report.persisted);
        let stored = store.records.lock().unwrap().clone();
        assert_eq!(stored, vec![rec("Film A"), rec("Film B")]);
        assert!(chat.captions.lock().unwrap()[0].contains("<i>Kinozal</i>"));
    }

    #[tokio::test]
    async fn test_second_run_finds_nothing_new() {
        let store = MemoryStore::default();
        let chat = Arc::new(FakeChat::default());
        let sources = vec![source("Kinozal", Some(vec![rec("Film A"), rec("Film B")]))];

        run_notifier(&sources, &store, Some(&notifier(chat.clone())))
            .await
            .unwrap();
        let report = run_notifier(&sources, &store, Some(&notifier(chat)))
            .await
            .unwrap();

        assert_eq!(report.new_items(), 0);
        assert!(!report.persisted);
        assert_eq!(*store.writes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_source_does_not_stop_others() {
        let store = MemoryStore::default();
        let chat = Arc::new(FakeChat::default());
        let sources = vec![
            source("Down", None),
            source("Up", Some(vec![rec("Film C")])),
        ];

        let report = run_notifier(&sources, &store, Some(&notifier(chat)))
            .await
            .unwrap();

        assert_eq!(report.source_failures(), 1);
        assert!(report.sources[0].error.as_deref().unwrap().contains("503"));
        assert_eq!(report.new_items(), 1);
    }

    #[tokio::test]
    async fn test_failed_delivery_is_still_persisted() {
        let store = MemoryStore::default();
        let chat = Arc::new(FakeChat::default());
        let sources = vec![source("Kinozal", Some(vec![rec("Broken"), rec("Fine")]))];

        let report = run_notifier(&sources, &store, Some(&notifier(chat)))
            .await
            .unwrap();

        assert!(matches!(
            report.outcomes[0].status,
            DeliveryStatus::FallbackSent { .. }
        ));
        assert!(report.outcomes[1].status.is_delivered());
        assert_eq!(store.records.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicates_across_sources_notified_once() {
        let store = MemoryStore::default();
        let chat = Arc::new(FakeChat::default());
        let sources = vec![
            source("One", Some(vec![rec("Film A")])),
            source("Two", Some(vec![rec("Film A"), rec("Film B")])),
        ];

        let report = run_notifier(&sources, &store, Some(&notifier(chat.clone())))
            .await
            .unwrap();

        assert_eq!(report.fetched, 2);
        assert_eq!(report.new_items(), 2);
        assert!(chat.captions.lock().unwrap()[0].contains("<i>One</i>"));
    }

    #[tokio::test]
    async fn test_dry_run_sends_and_writes_nothing() {
        let store = MemoryStore::default();
        let sources = vec![source("Kinozal", Some(vec![rec("Film A")]))];

        let report = run_notifier(&sources, &store, None).await.unwrap();

        assert_eq!(report.outcomes[0].status, DeliveryStatus::Skipped);
        assert!(!report.persisted);
        assert_eq!(*store.writes.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_aborts() {
        let store = MemoryStore {
            fail_load: true,
            ..MemoryStore::default()
        };
        let chat = Arc::new(FakeChat::default());
        let sources = vec![source("Kinozal", Some(vec![rec("Film A")]))];

        let result = run_notifier(&sources, &store, Some(&notifier(chat.clone()))).await;

        assert!(result.is_err());
        assert!(chat.captions.lock().unwrap().is_empty());
    }
}
