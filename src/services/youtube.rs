use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use serde::Deserialize;
use url::Url;

use crate::config::YouTubeFeedConfig;
use crate::services::{check_status, AdapterError, AdapterResult, VideoFeed};
use crate::types::VideoRecord;

const YOUTUBE_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// YouTube API list response
#[derive(Debug, Deserialize)]
struct YouTubeResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

impl<T> YouTubeResponse<T> {
    fn first(self, field: &'static str) -> AdapterResult<T> {
        self.items.into_iter().next().ok_or(AdapterError::MissingField(field))
    }
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    #[serde(rename = "contentDetails")]
    content_details: ChannelContentDetails,
}

#[derive(Debug, Deserialize)]
struct ChannelContentDetails {
    #[serde(rename = "relatedPlaylists")]
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: PlaylistItemSnippet,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemSnippet {
    title: String,
    #[serde(rename = "publishedAt")]
    published_at: Option<DateTime<Utc>>,
    #[serde(rename = "resourceId")]
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
struct ResourceId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    snippet: VideoSnippet,
}

#[derive(Debug, Deserialize)]
struct VideoSnippet {
    title: String,
    #[serde(rename = "publishedAt")]
    published_at: Option<DateTime<Utc>>,
}

impl YouTubeResponse<ChannelItem> {
    fn uploads_playlist(self) -> AdapterResult<String> {
        self.first("items[0]")?
            .content_details
            .related_playlists
            .uploads
            .ok_or(AdapterError::MissingField("contentDetails.relatedPlaylists.uploads"))
    }
}

impl YouTubeResponse<PlaylistItem> {
    fn latest_video(self) -> AdapterResult<VideoRecord> {
        let snippet = self.first("items[0]")?.snippet;
        let id = snippet
            .resource_id
            .video_id
            .ok_or(AdapterError::MissingField("snippet.resourceId.videoId"))?;

        Ok(VideoRecord {
            url: VideoRecord::watch_url(&id),
            id,
            title: snippet.title,
            published_at: snippet.published_at,
        })
    }
}

/// Read-only client for the YouTube Data API
pub struct YouTubeClient {
    http_client: reqwest::Client,
    config: YouTubeFeedConfig,
    base_url: String,
}

impl YouTubeClient {
    pub fn new(config: YouTubeFeedConfig) -> Self {
        Self::with_base_url(config, YOUTUBE_API_BASE_URL)
    }

    /// Point the client at another API root, e.g. a local mock server
    pub fn with_base_url(config: YouTubeFeedConfig, base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            config,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn list<T>(&self, resource: &str, params: &[(&str, &str)]) -> AdapterResult<YouTubeResponse<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, resource);
        debug!("Querying YouTube {} with {:?}", resource, params);

        let response = self
            .http_client
            .get(&url)
            .query(params)
            .query(&[("key", self.config.api_key.as_str())])
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }
}

#[async_trait]
impl VideoFeed for YouTubeClient {
    async fn latest_video(&self) -> AdapterResult<VideoRecord> {
        let channels: YouTubeResponse<ChannelItem> = self
            .list("channels", &[("part", "contentDetails"), ("id", self.config.channel_id.as_str())])
            .await?;
        let uploads = channels.uploads_playlist()?;

        let items: YouTubeResponse<PlaylistItem> = self
            .list(
                "playlistItems",
                &[("part", "snippet"), ("playlistId", uploads.as_str()), ("maxResults", "1")],
            )
            .await?;

        items.latest_video()
    }

    async fn video_by_id(&self, video_id: &str) -> AdapterResult<VideoRecord> {
        let videos: YouTubeResponse<VideoItem> = self
            .list("videos", &[("part", "snippet"), ("id", video_id)])
            .await?;
        let video = videos.first("items[0]")?;

        Ok(VideoRecord {
            url: VideoRecord::watch_url(&video.id),
            id: video.id,
            title: video.snippet.title,
            published_at: video.snippet.published_at,
        })
    }
}

/// Find the first YouTube video link in free text and return its video id
pub fn extract_video_id(text: &str) -> Option<String> {
    text.split_whitespace()
        .filter(|token| token.starts_with("http://") || token.starts_with("https://"))
        .filter_map(|token| Url::parse(token.trim_end_matches(|c: char| matches!(c, ')' | '>' | ',' | '.'))).ok())
        .find_map(|url| video_id_from_url(&url))
}

fn video_id_from_url(url: &Url) -> Option<String> {
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
    let mut segments = url.path_segments()?;

    let id = match host {
        "youtu.be" => segments.next().map(str::to_string),
        "youtube.com" => match segments.next()? {
            "watch" => url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            "shorts" | "live" => segments.next().map(str::to_string),
            _ => None,
        },
        _ => None,
    }?;

    let valid = !id.is_empty()
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then_some(id)
}
