// src/services/listings.rs

//! Listing page fetching and parsing.
//!
//! Pulls title, poster and detail link out of listing pages using
//! configured CSS selectors.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ListingRecord, ListingSelectors, SourceConfig};
use crate::utils::http::fetch_page_async;
use crate::utils::resolve_url;
use crate::utils::retry::{RetryPolicy, with_retry};

/// Something that can list the items currently on top of a listing site.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Label used in logs and reports.
    fn label(&self) -> &str;

    /// URL the items are read from.
    fn url(&self) -> &str;

    /// Fetch and parse the current items, in page order.
    async fn fetch_top_items(&self) -> Result<Vec<ListingRecord>>;
}

/// A listing page scraped with CSS selectors.
pub struct HtmlListingSource {
    source: SourceConfig,
    client: Client,
    retry: RetryPolicy,
}

impl HtmlListingSource {
    pub fn new(source: SourceConfig, client: Client, retry: RetryPolicy) -> Self {
        Self {
            source,
            client,
            retry,
        }
    }
}

#[async_trait]
impl ListingSource for HtmlListingSource {
    fn label(&self) -> &str {
        &self.source.label
    }

    fn url(&self) -> &str {
        &self.source.url
    }

    async fn fetch_top_items(&self) -> Result<Vec<ListingRecord>> {
        let label = format!("fetch {}", self.source.label);
        let html = with_retry(&self.retry, &label, || {
            fetch_page_async(&self.client, &self.source.url)
        })
        .await?;

        let base_url = Url::parse(&self.source.url)?;
        let records = parse_listing(&html, &base_url, &self.source.selectors)?;
        log::debug!(
            "Parsed {} records from {} ({})",
            records.len(),
            self.source.label,
            self.source.url
        );
        Ok(records)
    }
}

/// Extract listing records from a page.
///
/// Names are kept exactly as found; elements without a name are skipped.
pub fn parse_listing(
    html: &str,
    base_url: &Url,
    selectors: &ListingSelectors,
) -> Result<Vec<ListingRecord>> {
    let document = Html::parse_document(html);
    let item_sel = parse_selector(&selectors.item)?;
    let poster_sel = selectors
        .poster
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(parse_selector)
        .transpose()?;

    let mut records = Vec::new();
    for item in document.select(&item_sel) {
        match parse_item(&item, poster_sel.as_ref(), selectors, base_url) {
            Some(record) => records.push(record),
            None => log::debug!("Skipping listing element without a name: {}", item.html()),
        }
    }
    Ok(records)
}

fn parse_item(
    item: &ElementRef,
    poster_sel: Option<&Selector>,
    selectors: &ListingSelectors,
    base_url: &Url,
) -> Option<ListingRecord> {
    let name: String = match selectors.name_attr.as_deref().filter(|a| !a.is_empty()) {
        Some(attr) => item.value().attr(attr)?.to_string(),
        None => item.text().collect(),
    };
    if name.trim().is_empty() {
        return None;
    }

    let detail_url = item
        .value()
        .attr(&selectors.link_attr)
        .map(|href| resolve_url(base_url, href))
        .unwrap_or_default();

    let poster_url = poster_sel
        .and_then(|sel| item.select(sel).next())
        .and_then(|img| img.value().attr(&selectors.poster_attr))
        .map(|src| resolve_url(base_url, src))
        .unwrap_or_default();

    Some(ListingRecord {
        name,
        poster_url,
        detail_url,
    })
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOP_PAGE: &str = r#"
        <html><body>
          <div class="bx1">
            <a href="/details.php?id=101" title="Film A / 2024 / WEB-DL">
              <img src="/i/poster/1/101.jpg">
            </a>
            <a href="/details.php?id=102" title="Film B / 2023 / BDRip">
              <img src="https://cdn.example.com/102.jpg">
            </a>
            <a href="/details.php?id=103" title="">
              <img src="/i/poster/1/103.jpg">
            </a>
            <a href="/details.php?id=104">no title attribute</a>
            <a href="/browse.php" title="Not an item">Browse</a>
          </div>
        </body></html>
    "#;

    fn base() -> Url {
        Url::parse("https://kinozal.tv/top.php?j=&t=0&d=12").unwrap()
    }

    #[test]
    fn test_parse_selector_valid() {
        assert!(parse_selector(r#"a[href^="/details.php"]"#).is_ok());
        assert!(parse_selector("div.bx1 a:has(img)").is_ok());
    }

    #[test]
    fn test_parse_selector_invalid() {
        assert!(parse_selector("[[invalid").is_err());
    }

    #[test]
    fn test_parse_top_page() {
        let records = parse_listing(TOP_PAGE, &base(), &ListingSelectors::default()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Film A / 2024 / WEB-DL");
        assert_eq!(records[0].detail_url, "https://kinozal.tv/details.php?id=101");
        assert_eq!(records[0].poster_url, "https://kinozal.tv/i/poster/1/101.jpg");
        assert_eq!(records[1].poster_url, "https://cdn.example.com/102.jpg");
    }

    #[test]
    fn test_parse_uses_element_text_without_name_attr() {
        let selectors = ListingSelectors {
            item: "li.event a".into(),
            name_attr: None,
            link_attr: "href".into(),
            poster: None,
            poster_attr: "src".into(),
        };
        let html = r#"<ul><li class="event"><a href="e/1">Concert</a></li></ul>"#;
        let base = Url::parse("https://afisha.example.com/events/").unwrap();

        let records = parse_listing(html, &base, &selectors).unwrap();
        assert_eq!(
            records,
            vec![ListingRecord::new(
                "Concert",
                "",
                "https://afisha.example.com/events/e/1"
            )]
        );
    }

    #[test]
    fn test_parse_empty_page() {
        let records = parse_listing("<html></html>", &base(), &ListingSelectors::default());
        assert!(records.unwrap().is_empty());
    }
}
