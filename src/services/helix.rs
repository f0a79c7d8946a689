use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;

use crate::config::HelixConfig;
use crate::services::{check_status, AdapterError, AdapterResult, ClipService};

const HELIX_BASE_URL: &str = "https://api.twitch.tv/helix";
const CLIPS_BASE_URL: &str = "https://clips.twitch.tv";

/// Helix wraps every payload in a `data` array
#[derive(Debug, Deserialize)]
struct HelixResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct HelixId {
    id: String,
}

impl HelixResponse<HelixId> {
    fn first_id(self, field: &'static str) -> AdapterResult<String> {
        self.data
            .into_iter()
            .next()
            .map(|item| item.id)
            .filter(|id| !id.is_empty())
            .ok_or(AdapterError::MissingField(field))
    }
}

/// Client for the Twitch Helix user and clip endpoints
pub struct HelixClient {
    http_client: reqwest::Client,
    config: HelixConfig,
    base_url: String,
}

impl HelixClient {
    pub fn new(config: HelixConfig) -> Self {
        Self::with_base_url(config, HELIX_BASE_URL)
    }

    /// Point the client at another API root, e.g. a local mock server
    pub fn with_base_url(config: HelixConfig, base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            config,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("Client-ID", &self.config.client_id)
            .bearer_auth(&self.config.api_token)
    }
}

#[async_trait]
impl ClipService for HelixClient {
    async fn broadcaster_id(&self, login: &str) -> AdapterResult<String> {
        let url = format!("{}/users?login={}", self.base_url, urlencoding::encode(login));
        debug!("Resolving broadcaster id for {}", login);

        let response = self.authorized(self.http_client.get(&url)).send().await?;
        let users: HelixResponse<HelixId> = check_status(response).await?.json().await?;

        users.first_id("data[0].id")
    }

    async fn create_clip(&self, broadcaster_id: &str) -> AdapterResult<String> {
        let url = format!(
            "{}/clips?broadcaster_id={}",
            self.base_url,
            urlencoding::encode(broadcaster_id)
        );

        let response = self
            .authorized(self.http_client.post(&url))
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let clips: HelixResponse<HelixId> = check_status(response).await?.json().await?;

        let clip_id = clips.first_id("data[0].id")?;
        info!("Created clip {} for broadcaster {}", clip_id, broadcaster_id);
        Ok(format!("{}/{}", CLIPS_BASE_URL, clip_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn test_first_id_from_users_payload() {
        let users: HelixResponse<HelixId> = serde_json::from_str(
            r#"{"data":[{"id":"141981764","login":"b0rja","display_name":"B0rja"}]}"#,
        )
        .unwrap();

        assert_eq!(users.first_id("data[0].id").unwrap(), "141981764");
    }

    #[test]
    fn test_empty_data_is_missing_field() {
        let users: HelixResponse<HelixId> = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert!(matches!(
            users.first_id("data[0].id"),
            Err(AdapterError::MissingField("data[0].id"))
        ));

        let no_data: HelixResponse<HelixId> = serde_json::from_str(r#"{}"#).unwrap();
        assert!(no_data.first_id("data[0].id").is_err());
    }

    #[test]
    fn test_clip_payload() {
        let clips: HelixResponse<HelixId> = serde_json::from_str(
            r#"{"data":[{"id":"FiveWordsForClipSlug","edit_url":"https://clips.twitch.tv/FiveWordsForClipSlug/edit"}]}"#,
        )
        .unwrap();

        assert_eq!(clips.first_id("data[0].id").unwrap(), "FiveWordsForClipSlug");
    }

    fn config() -> HelixConfig {
        HelixConfig {
            client_id: "client".to_string(),
            api_token: "token".to_string(),
        }
    }

    #[tokio::test]
    async fn test_broadcaster_id_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/users".to_string()))
            .match_query(Matcher::UrlEncoded("login".to_string(), "b0rja".to_string()))
            .match_header("client-id", "client")
            .match_header("authorization", "Bearer token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[{"id":"141981764","login":"b0rja"}]}"#)
            .create_async()
            .await;

        let client = HelixClient::with_base_url(config(), server.url());
        assert_eq!(client.broadcaster_id("b0rja").await.unwrap(), "141981764");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_clip_returns_public_url() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Regex(r"^/clips".to_string()))
            .match_query(Matcher::UrlEncoded("broadcaster_id".to_string(), "141981764".to_string()))
            .match_header("client-id", "client")
            .match_header("authorization", "Bearer token")
            .with_status(202)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[{"id":"FiveWordsForClipSlug","edit_url":"https://clips.twitch.tv/FiveWordsForClipSlug/edit"}]}"#)
            .create_async()
            .await;

        let client = HelixClient::with_base_url(config(), server.url());
        assert_eq!(
            client.create_clip("141981764").await.unwrap(),
            "https://clips.twitch.tv/FiveWordsForClipSlug"
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_offline_channel_maps_to_status_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Regex(r"^/clips".to_string()))
            .with_status(404)
            .with_body("Clipping is not possible for an offline channel.")
            .create_async()
            .await;

        let client = HelixClient::with_base_url(config(), server.url());
        match client.create_clip("141981764").await {
            Err(AdapterError::Status { status, body }) => {
                assert_eq!(status, 404);
                assert!(body.contains("offline"));
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }
}
