// Device-local persistence. Everything is stored as JSON documents under
// namespaced keys in a key/value backend.

mod memory;
mod sqlite;

use std::sync::Arc;

pub use memory::MemoryKeyValueStore;
pub use sqlite::SqliteKeyValueStore;

use crate::domain::models::{ProgressMap, ProgressStatus, Session};

pub const PROGRESS_KEY: &str = "kanji-progress";
pub const SESSION_KEY: &str = "kanji-auth-session";

#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// Progress map persisted under [`PROGRESS_KEY`].
///
/// Reads fail open to an empty map and write failures are only logged: the
/// in-memory map held by the synchronizer stays authoritative for the session.
#[derive(Clone)]
pub struct LocalProgressStore {
    kv: Arc<dyn KeyValueStore>,
}

impl LocalProgressStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn load(&self) -> ProgressMap {
        let raw = match self.kv.get(PROGRESS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return ProgressMap::new(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read local progress, starting empty");
                return ProgressMap::new();
            }
        };
        parse_progress(&raw)
    }

    #[tracing::instrument(level = "debug", skip(self, map), fields(entries = map.len()))]
    pub async fn save(&self, map: &ProgressMap) {
        let body = match serde_json::to_string(map) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize local progress");
                return;
            }
        };
        if let Err(e) = self.kv.set(PROGRESS_KEY, &body).await {
            tracing::warn!(error = %e, "failed to persist local progress");
        }
    }
}

/// Entries with unknown status strings are dropped one by one rather than
/// discarding the whole document.
fn parse_progress(raw: &str) -> ProgressMap {
    let entries: std::collections::BTreeMap<String, String> = match serde_json::from_str(raw) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "local progress is not a valid JSON object, starting empty");
            return ProgressMap::new();
        }
    };
    entries
        .into_iter()
        .filter_map(|(kanji, status)| match status.parse::<ProgressStatus>() {
            Ok(status) => Some((kanji, status)),
            Err(e) => {
                tracing::debug!(%kanji, error = %e, "skipping local progress entry");
                None
            }
        })
        .collect()
}

/// Auth session persisted under [`SESSION_KEY`] so a restart keeps the user signed in.
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub async fn load(&self) -> Option<Session> {
        let raw = match self.kv.get(SESSION_KEY).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stored session");
                return None;
            }
        };
        serde_json::from_str(&raw)
            .map_err(|e| tracing::warn!(error = %e, "ignoring unreadable stored session"))
            .ok()
    }

    pub async fn save(&self, session: &Session) {
        let result = match serde_json::to_string(session) {
            Ok(body) => self.kv.set(SESSION_KEY, &body).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to persist session");
        }
    }

    pub async fn clear(&self) {
        if let Err(e) = self.kv.remove(SESSION_KEY).await {
            tracing::warn!(error = %e, "failed to clear stored session");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::*;

    /// Backend whose every call fails, standing in for a full or broken disk.
    pub(crate) struct FailingKeyValueStore;

    #[async_trait::async_trait]
    impl KeyValueStore for FailingKeyValueStore {
        async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            anyhow::bail!("disk unavailable")
        }
        async fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            anyhow::bail!("quota exceeded")
        }
        async fn remove(&self, _key: &str) -> anyhow::Result<()> {
            anyhow::bail!("disk unavailable")
        }
    }

    fn sample() -> ProgressMap {
        ProgressMap::new()
            .with_status("日", ProgressStatus::Learned)
            .with_status("本", ProgressStatus::Learning)
    }

    #[tokio::test]
    async fn load_without_data_is_empty() {
        let store = LocalProgressStore::new(Arc::new(MemoryKeyValueStore::new()));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn save_then_load() {
        let store = LocalProgressStore::new(Arc::new(MemoryKeyValueStore::new()));
        store.save(&sample()).await;
        assert_eq!(store.load().await, sample());
    }

    #[tokio::test]
    async fn resaving_a_loaded_map_writes_identical_bytes() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        kv.set(PROGRESS_KEY, r#"{"本":"learning","日":"learned"}"#)
            .await
            .unwrap();
        let store = LocalProgressStore::new(kv.clone());

        let loaded = store.load().await;
        store.save(&loaded).await;
        let first = kv.get(PROGRESS_KEY).await.unwrap();
        store.save(&store.load().await).await;
        let second = kv.get(PROGRESS_KEY).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.load().await, loaded);
    }

    #[tokio::test]
    async fn corrupt_document_fails_open() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        kv.set(PROGRESS_KEY, "[1, 2").await.unwrap();
        let store = LocalProgressStore::new(kv);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_and_default_statuses_are_dropped() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        kv.set(
            PROGRESS_KEY,
            r#"{"日":"learned","本":"mastered","人":"not_visited"}"#,
        )
        .await
        .unwrap();
        let store = LocalProgressStore::new(kv);

        let map = store.load().await;
        assert_eq!(map.len(), 1);
        assert_eq!(map.status("日"), ProgressStatus::Learned);
    }

    #[tokio::test]
    async fn backend_failures_are_swallowed() {
        let store = LocalProgressStore::new(Arc::new(FailingKeyValueStore));
        store.save(&sample()).await;
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn session_round_trip_and_clear() {
        let store = SessionStore::new(Arc::new(MemoryKeyValueStore::new()));
        assert!(store.load().await.is_none());

        let session = Session {
            user_id: Uuid::new_v4(),
            email: Some("learner@example.com".into()),
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        };
        store.save(&session).await;
        assert_eq!(store.load().await, Some(session));

        store.clear().await;
        assert!(store.load().await.is_none());
    }
}
