use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

use crate::config::RankConfig;
use crate::services::{check_status, AdapterError, AdapterResult, RankService};
use crate::types::RankInfo;

const HENRIK_BASE_URL: &str = "https://api.henrikdev.xyz/valorant/v2";
const UNKNOWN_TIER: &str = "Desconocido";

#[derive(Debug, Deserialize)]
struct MmrResponse {
    data: Option<MmrData>,
}

#[derive(Debug, Deserialize)]
struct MmrData {
    current_data: Option<CurrentData>,
}

#[derive(Debug, Deserialize)]
struct CurrentData {
    currenttierpatched: Option<String>,
    ranking_in_tier: Option<i64>,
}

impl MmrResponse {
    fn into_rank(self) -> AdapterResult<RankInfo> {
        let current = self
            .data
            .ok_or(AdapterError::MissingField("data"))?
            .current_data
            .ok_or(AdapterError::MissingField("data.current_data"))?;

        Ok(RankInfo {
            tier: current
                .currenttierpatched
                .filter(|tier| !tier.is_empty())
                .unwrap_or_else(|| UNKNOWN_TIER.to_string()),
            ranking_in_tier: current.ranking_in_tier.unwrap_or(0),
        })
    }
}

/// Client for the HenrikDev Valorant MMR endpoint
pub struct HenrikClient {
    http_client: reqwest::Client,
    config: RankConfig,
    base_url: String,
}

impl HenrikClient {
    pub fn new(config: RankConfig) -> Self {
        Self::with_base_url(config, HENRIK_BASE_URL)
    }

    /// Point the client at another API root, e.g. a local mock server
    pub fn with_base_url(config: RankConfig, base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            config,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RankService for HenrikClient {
    async fn rank(&self, puuid: &str) -> AdapterResult<RankInfo> {
        let url = format!(
            "{}/by-puuid/mmr/{}/{}",
            self.base_url,
            urlencoding::encode(&self.config.region),
            urlencoding::encode(puuid)
        );
        debug!("Fetching rank for {}", puuid);

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", &self.config.api_key)
            .send()
            .await?;
        let mmr: MmrResponse = check_status(response).await?.json().await?;

        mmr.into_rank()
    }
}
