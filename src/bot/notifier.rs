// src/bot/notifier.rs - Announces new uploads in chat

use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::bot::video_store::VideoStore;
use crate::services::youtube::extract_video_id;
use crate::services::VideoFeed;
use crate::types::VideoRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierState {
    Idle,
    Checking,
}

/// Compares the newest upload with the stored one and builds the `!editcom` announcement
pub struct VideoNotifier {
    feed: Arc<dyn VideoFeed>,
    store: VideoStore,
    // Held for a whole check so the ticker and the relay never interleave
    state: Mutex<NotifierState>,
}

impl VideoNotifier {
    pub fn new(feed: Arc<dyn VideoFeed>, store: VideoStore) -> Self {
        Self {
            feed,
            store,
            state: Mutex::new(NotifierState::Idle),
        }
    }

    pub fn store(&self) -> &VideoStore {
        &self.store
    }

    pub fn state(&self) -> NotifierState {
        match self.state.try_lock() {
            Ok(state) => *state,
            Err(_) => NotifierState::Checking,
        }
    }

    pub fn announcement(video: &VideoRecord) -> String {
        format!("!editcom !youtube Nuevo video: {}", video.url)
    }

    /// Timer path: ask the feed for the newest upload
    pub async fn check_for_new_video(&self) -> Option<String> {
        let mut state = self.state.lock().await;
        *state = NotifierState::Checking;

        let announcement = match self.feed.latest_video().await {
            Ok(video) => self.announce_if_new(video).await,
            Err(e) => {
                error!("Failed to check YouTube for new videos: {}", e);
                None
            }
        };

        *state = NotifierState::Idle;
        announcement
    }

    /// Relay path: take the video id from a notification message and look up only that upload
    pub async fn handle_relay(&self, content: &str) -> Option<String> {
        let Some(video_id) = extract_video_id(content) else {
            debug!("Relay message has no YouTube link");
            return None;
        };

        let mut state = self.state.lock().await;
        *state = NotifierState::Checking;

        let announcement = if self.is_known(&video_id).await {
            debug!("Relayed video {} was already announced", video_id);
            None
        } else {
            match self.feed.video_by_id(&video_id).await {
                Ok(video) => self.announce_if_new(video).await,
                Err(e) => {
                    error!("Failed to look up relayed video {}: {}", video_id, e);
                    None
                }
            }
        };

        *state = NotifierState::Idle;
        announcement
    }

    async fn is_known(&self, video_id: &str) -> bool {
        self.store
            .load()
            .await
            .map_or(false, |last| last.id == video_id)
    }

    async fn announce_if_new(&self, video: VideoRecord) -> Option<String> {
        if self.is_known(&video.id).await {
            debug!("No new videos (latest is {})", video.id);
            return None;
        }

        if let Err(e) = self.store.save(&video).await {
            error!("Failed to persist video {}: {:#}", video.id, e);
            return None;
        }

        info!("New video detected: {}", video.title);
        Some(Self::announcement(&video))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{AdapterError, AdapterResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tempfile::tempdir;

    struct FakeFeed {
        latest: StdMutex<Option<VideoRecord>>,
        lookups: AtomicUsize,
        fail_lookup: bool,
    }

    impl FakeFeed {
        fn returning(video: Option<VideoRecord>) -> Self {
            Self {
                latest: StdMutex::new(video),
                lookups: AtomicUsize::new(0),
                fail_lookup: false,
            }
        }

        fn failing_lookup() -> Self {
            Self {
                fail_lookup: true,
                ..Self::returning(None)
            }
        }
    }

    #[async_trait]
    impl VideoFeed for FakeFeed {
        async fn latest_video(&self) -> AdapterResult<VideoRecord> {
            self.latest
                .lock()
                .unwrap()
                .clone()
                .ok_or(AdapterError::MissingField("items[0]"))
        }

        async fn video_by_id(&self, video_id: &str) -> AdapterResult<VideoRecord> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.fail_lookup {
                return Err(AdapterError::Status {
                    status: 403,
                    body: "quotaExceeded".to_string(),
                });
            }
            Ok(VideoRecord {
                title: format!("Título {}", video_id),
                ..record(video_id)
            })
        }
    }

    fn record(id: &str) -> VideoRecord {
        VideoRecord {
            id: id.to_string(),
            title: format!("Video {}", id),
            url: VideoRecord::watch_url(id),
            published_at: None,
        }
    }

    fn notifier(dir: &tempfile::TempDir, feed: Arc<FakeFeed>) -> VideoNotifier {
        VideoNotifier::new(feed, VideoStore::new(dir.path().join("lastVideo.json")))
    }

    #[tokio::test]
    async fn test_new_video_replaces_stored_record() {
        let temp_dir = tempdir().unwrap();
        let feed = Arc::new(FakeFeed::returning(Some(record("B"))));
        let notifier = notifier(&temp_dir, feed);
        notifier.store().save(&record("A")).await.unwrap();

        let announcement = notifier.check_for_new_video().await.unwrap();

        assert_eq!(announcement, "!editcom !youtube Nuevo video: https://www.youtube.com/watch?v=B");
        assert_eq!(notifier.store().load().await, Some(record("B")));
        assert_eq!(notifier.state(), NotifierState::Idle);
    }

    #[test_log::test(tokio::test)]
    async fn test_same_video_announced_once() {
        let temp_dir = tempdir().unwrap();
        let feed = Arc::new(FakeFeed::returning(Some(record("B"))));
        let notifier = notifier(&temp_dir, feed);

        assert!(notifier.check_for_new_video().await.is_some());
        assert!(notifier.check_for_new_video().await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_store() {
        let temp_dir = tempdir().unwrap();
        let feed = Arc::new(FakeFeed::returning(None));
        let notifier = notifier(&temp_dir, feed);
        notifier.store().save(&record("A")).await.unwrap();

        assert!(notifier.check_for_new_video().await.is_none());
        assert_eq!(notifier.store().load().await, Some(record("A")));
        assert_eq!(notifier.state(), NotifierState::Idle);
    }

    #[tokio::test]
    async fn test_store_write_failure_suppresses_then_retries() {
        let temp_dir = tempdir().unwrap();
        // A regular file where the store's directory should be makes every write fail
        let blocker = temp_dir.path().join("storage");
        std::fs::write(&blocker, "not a directory").unwrap();

        let feed = Arc::new(FakeFeed::returning(Some(record("B"))));
        let notifier = VideoNotifier::new(feed, VideoStore::new(blocker.join("lastVideo.json")));

        assert!(notifier.check_for_new_video().await.is_none());
        assert_eq!(notifier.state(), NotifierState::Idle);

        std::fs::remove_file(&blocker).unwrap();
        let announcement = notifier.check_for_new_video().await;
        assert_eq!(
            announcement.as_deref(),
            Some("!editcom !youtube Nuevo video: https://www.youtube.com/watch?v=B")
        );
        assert_eq!(notifier.store().load().await, Some(record("B")));
    }

    #[tokio::test]
    async fn test_relay_message_looks_up_only_new_ids() {
        let temp_dir = tempdir().unwrap();
        let feed = Arc::new(FakeFeed::returning(None));
        let notifier = notifier(&temp_dir, feed.clone());
        notifier.store().save(&record("dQw4w9WgXcQ")).await.unwrap();

        let content = "Nuevo vídeo subido!\nhttps://youtu.be/dQw4w9WgXcQ";
        assert!(notifier.handle_relay(content).await.is_none());
        assert_eq!(feed.lookups.load(Ordering::SeqCst), 0);

        let content = "Nuevo vídeo subido!\nhttps://www.youtube.com/watch?v=abcDEF12345";
        let announcement = notifier.handle_relay(content).await.unwrap();
        assert_eq!(
            announcement,
            "!editcom !youtube Nuevo video: https://www.youtube.com/watch?v=abcDEF12345"
        );
        assert_eq!(feed.lookups.load(Ordering::SeqCst), 1);

        let stored = notifier.store().load().await.unwrap();
        assert_eq!(stored.id, "abcDEF12345");
        assert_eq!(stored.title, "Título abcDEF12345");
    }

    #[tokio::test]
    async fn test_relay_lookup_failure_keeps_store() {
        let temp_dir = tempdir().unwrap();
        let feed = Arc::new(FakeFeed::failing_lookup());
        let notifier = notifier(&temp_dir, feed.clone());
        notifier.store().save(&record("A")).await.unwrap();

        let content = "https://www.youtube.com/watch?v=abcDEF12345";
        assert!(notifier.handle_relay(content).await.is_none());

        assert_eq!(feed.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.store().load().await, Some(record("A")));
        assert_eq!(notifier.state(), NotifierState::Idle);
    }

    #[tokio::test]
    async fn test_relay_without_link_is_ignored() {
        let temp_dir = tempdir().unwrap();
        let feed = Arc::new(FakeFeed::returning(None));
        let notifier = notifier(&temp_dir, feed.clone());

        assert!(notifier.handle_relay("directo mañana a las 18h").await.is_none());
        assert!(notifier.store().load().await.is_none());
    }
}
