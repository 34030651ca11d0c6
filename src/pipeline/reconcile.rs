//! Reconciliation of freshly scraped records against the notified set.
//!
//! Membership is decided by exact `name` equality only. Titles that differ
//! by whitespace or an edition marker are different items.

use std::collections::HashSet;

use crate::models::ListingRecord;

/// Records of `current` whose name does not appear in `notified`.
///
/// Order follows `current`; duplicates inside `current` are all returned.
pub fn reconcile(current: &[ListingRecord], notified: &[ListingRecord]) -> Vec<ListingRecord> {
    let known: HashSet<&str> = notified.iter().map(|r| r.name.as_str()).collect();
    current
        .iter()
        .filter(|r| !known.contains(r.name.as_str()))
        .cloned()
        .collect()
}

/// Drop repeated names, keeping the first occurrence.
pub fn dedupe_by_name<T, F>(items: Vec<T>, name: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut seen: HashSet<String> = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(name(item).to_string()))
        .collect()
}
