//! Outbound REST adapters.
//!
//! Each adapter wraps exactly one remote call and reports failure through
//! [`AdapterError`]; callers decide what the user sees.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{RankInfo, VideoRecord};

pub mod helix;
pub mod henrik;
pub mod youtube;

pub use helix::HelixClient;
pub use henrik::HenrikClient;
pub use youtube::YouTubeClient;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response is missing {0}")]
    MissingField(&'static str),
}

pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// Turn a non-2xx response into [`AdapterError::Status`]
pub(crate) async fn check_status(response: reqwest::Response) -> AdapterResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
    Err(AdapterError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Twitch clip management
#[async_trait]
pub trait ClipService: Send + Sync {
    /// Resolve a channel login to its broadcaster id
    async fn broadcaster_id(&self, login: &str) -> AdapterResult<String>;

    /// Create a clip of the live broadcast and return its public URL
    async fn create_clip(&self, broadcaster_id: &str) -> AdapterResult<String>;
}

/// Player rank lookup
#[async_trait]
pub trait RankService: Send + Sync {
    async fn rank(&self, puuid: &str) -> AdapterResult<RankInfo>;
}

/// Upload feed of the watched channel
#[async_trait]
pub trait VideoFeed: Send + Sync {
    /// Most recent upload of the configured channel
    async fn latest_video(&self) -> AdapterResult<VideoRecord>;

    /// Look up a single upload by id
    async fn video_by_id(&self, video_id: &str) -> AdapterResult<VideoRecord>;
}
