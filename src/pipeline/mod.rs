//! Pipeline entry points for bot operations.
//!
//! - `run_notifier`: Fetch listings, reconcile, notify and persist
//! - `run_summarizer`: Summarize recent channel history into a digest
//! - `run_validate`: Check configuration sanity

pub mod notify;
pub mod reconcile;
pub mod summarize;
pub mod validate;

pub use notify::run_notifier;
pub use reconcile::{dedupe_by_name, reconcile};
pub use summarize::run_summarizer;
pub use validate::{missing_settings, run_validate};
