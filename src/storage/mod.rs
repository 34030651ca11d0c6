//! Storage backends for the notified set.
//!
//! The notified set is read once at the start of a run and rewritten
//! wholesale at its end:
//! - `SheetsStore`: a Google Sheets worksheet, one `(name, poster, detail)` row per item
//! - `LocalStore`: a JSON file on disk
//!
//! ## Local file layout
//!
//! ```text
//! storage/
//! ├── config.toml           # Bot configuration
//! └── notified.json         # Notified set
//! ```

pub mod local;
pub mod sheets;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::ListingRecord;

// Re-export for convenience
pub use local::LocalStore;
pub use sheets::{SheetsStore, ServiceAccountKey};

/// On-disk envelope for the notified set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifiedData {
    /// ISO 8601 timestamp of last update
    pub updated_at: DateTime<Utc>,
    pub count: usize,
    pub records: Vec<ListingRecord>,
}

impl NotifiedData {
    pub fn new(records: Vec<ListingRecord>) -> Self {
        Self {
            updated_at: Utc::now(),
            count: records.len(),
            records,
        }
    }
}

/// Durable storage for already-notified records.
#[async_trait]
pub trait NotifiedStore: Send + Sync {
    /// All records, in stored order.
    async fn load(&self) -> Result<Vec<ListingRecord>>;

    /// Replace the stored contents with `records`.
    async fn replace_all(&self, records: &[ListingRecord]) -> Result<()>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}
