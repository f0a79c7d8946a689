use log::info;
use regex::Regex;
use std::sync::LazyLock;
use tokio::sync::RwLock;

static PUUID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("Failed to compile PUUID regex")
});

/// Check the 8-4-4-4-12 hexadecimal PUUID layout
pub fn is_valid_puuid(candidate: &str) -> bool {
    PUUID_REGEX.is_match(candidate)
}

/// Player account whose rank `!rank` reports
pub struct TrackedSubject {
    puuid: RwLock<String>,
}

impl TrackedSubject {
    pub fn new(initial: String) -> Self {
        Self {
            puuid: RwLock::new(initial),
        }
    }

    pub async fn get(&self) -> String {
        self.puuid.read().await.clone()
    }

    /// Replace the tracked PUUID; malformed values leave it unchanged
    pub async fn set(&self, candidate: &str) -> bool {
        if !is_valid_puuid(candidate) {
            return false;
        }

        *self.puuid.write().await = candidate.to_string();
        info!("Tracked PUUID changed to {}", candidate);
        true
    }
}
