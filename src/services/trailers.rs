//! Trailer lookup through the YouTube Data API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::Result;
use crate::models::TrailerConfig;
use crate::utils::http::check_status;
use crate::utils::retry::{RetryPolicy, with_retry};

const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";
const VIDEO_KIND: &str = "youtube#video";

/// Finds a trailer link for a title.
#[async_trait]
pub trait TrailerSearch: Send + Sync {
    async fn find_trailer(&self, name: &str) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: ItemId,
}

#[derive(Debug, Deserialize)]
struct ItemId {
    kind: String,
    #[serde(rename = "videoId", default)]
    video_id: Option<String>,
}

/// YouTube search client.
pub struct YoutubeSearch {
    client: Client,
    api_key: String,
    query_template: String,
    max_results: u32,
    retry: RetryPolicy,
}

impl YoutubeSearch {
    pub fn new(client: Client, api_key: impl Into<String>, retry: RetryPolicy) -> Self {
        let defaults = TrailerConfig::default();
        Self {
            client,
            api_key: api_key.into(),
            query_template: defaults.query_template,
            max_results: defaults.max_results,
            retry,
        }
    }

    /// Build a client when an API key is configured.
    pub fn from_config(config: &TrailerConfig, client: Client, retry: RetryPolicy) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self {
            client,
            api_key,
            query_template: config.query_template.clone(),
            max_results: config.max_results.max(1),
            retry,
        })
    }

    fn query_for(&self, name: &str) -> String {
        self.query_template.replace("{name}", name)
    }

    async fn search(&self, query: &str) -> Result<SearchResponse> {
        let max_results = self.max_results.to_string();
        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("q", query),
                ("maxResults", max_results.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;
        let response = check_status("YouTube", response).await?;
        Ok(response.json().await?)
    }
}

/// Canonical watch URL of the first playable result.
fn first_video_url(response: &SearchResponse) -> Option<String> {
    response
        .items
        .iter()
        .filter(|item| item.id.kind == VIDEO_KIND)
        .find_map(|item| item.id.video_id.as_deref())
        .map(|id| format!("https://www.youtube.com/watch?v={id}"))
}

#[async_trait]
impl TrailerSearch for YoutubeSearch {
    async fn find_trailer(&self, name: &str) -> Result<Option<String>> {
        let query = self.query_for(name);
        let response = with_retry(&self.retry, "youtube search", || self.search(&query)).await?;
        Ok(first_video_url(&response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_video_skips_channels_and_playlists() {
        let response: SearchResponse = serde_json::from_str(
            r#"{"items": [
                {"id": {"kind": "youtube#channel", "channelId": "UC1"}},
                {"id": {"kind": "youtube#playlist", "playlistId": "PL1"}},
                {"id": {"kind": "youtube#video", "videoId": "dQw4w9WgXcQ"}},
                {"id": {"kind": "youtube#video", "videoId": "second"}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            first_video_url(&response),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_no_items_means_no_trailer() {
        let response: SearchResponse = serde_json::from_str(r#"{"kind": "x"}"#).unwrap();
        assert_eq!(first_video_url(&response), None);
    }

    #[test]
    fn test_query_template() {
        let search = YoutubeSearch::new(Client::new(), "key", RetryPolicy::default());
        assert_eq!(search.query_for("Film A"), "Film A трейлер");
    }

    #[test]
    fn test_from_config_without_key() {
        let config = TrailerConfig::default();
        assert!(YoutubeSearch::from_config(&config, Client::new(), RetryPolicy::default()).is_none());
    }
}
