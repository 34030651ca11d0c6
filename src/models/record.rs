//! Listing record data structure.

use serde::{Deserialize, Serialize};

/// A title scraped from a listing page.
///
/// Records are keyed by `name`; two records with the same name are the same
/// item no matter where their poster or detail page points.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ListingRecord {
    /// Title exactly as it appears on the listing page
    pub name: String,

    /// Absolute URL of the poster image (empty if the page has none)
    #[serde(default)]
    pub poster_url: String,

    /// Absolute URL of the detail page
    #[serde(default)]
    pub detail_url: String,
}

impl ListingRecord {
    pub fn new(
        name: impl Into<String>,
        poster_url: impl Into<String>,
        detail_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            poster_url: poster_url.into(),
            detail_url: detail_url.into(),
        }
    }

    /// Build a record from a spreadsheet row, padding missing cells.
    ///
    /// Returns `None` for rows whose first cell is blank.
    pub fn from_row(row: &[String]) -> Option<Self> {
        let cell = |i: usize| row.get(i).cloned().unwrap_or_default();
        let name = cell(0);
        if name.trim().is_empty() {
            return None;
        }
        Some(Self {
            name,
            poster_url: cell(1),
            detail_url: cell(2),
        })
    }

    /// Spreadsheet row representation: `[name, poster_url, detail_url]`.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.poster_url.clone(),
            self.detail_url.clone(),
        ]
    }

    pub fn has_poster(&self) -> bool {
        !self.poster_url.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_row_pads_short_rows() {
        let row = vec!["Film A".to_string()];
        let record = ListingRecord::from_row(&row).unwrap();
        assert_eq!(record.name, "Film A");
        assert!(record.poster_url.is_empty());
        assert!(record.detail_url.is_empty());
        assert!(!record.has_poster());
    }

    #[test]
    fn test_from_row_skips_blank_name() {
        let row = vec!["  ".to_string(), "https://example.com/p.jpg".to_string()];
        assert!(ListingRecord::from_row(&row).is_none());
        assert!(ListingRecord::from_row(&[]).is_none());
    }

    #[test]
    fn test_name_is_kept_verbatim() {
        let row = vec![" Film A ".to_string(), String::new(), String::new()];
        let record = ListingRecord::from_row(&row).unwrap();
        assert_eq!(record.name, " Film A ");
        assert_eq!(record.to_row()[0], " Film A ");
    }
}
