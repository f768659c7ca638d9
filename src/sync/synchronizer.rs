use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::{sync::watch, task::JoinHandle};

use super::{
    remote::RemoteProgressStore,
    writer::{RemoteWrite, RemoteWriter},
};
use crate::{
    domain::{
        models::{Identity, ProgressMap, ProgressStatus},
        progress::merge_local_over_remote,
    },
    storage::LocalProgressStore,
};

struct RemoteLink {
    store: Arc<dyn RemoteProgressStore>,
    writer: RemoteWriter,
}

/// Keeps the learner's progress map and mirrors it to the remote store while
/// someone is signed in.
///
/// Guests only touch the local store. Each transition into a signed-in identity
/// runs one merge cycle: fetch remote, merge with local winning on collisions,
/// persist locally, push the merged map back. Later writes go to the local
/// store first and are then queued for the remote store.
///
/// The map is never mutated in place; every change swaps in a new `Arc`, so a
/// snapshot handed out earlier stays consistent.
pub struct ProgressSynchronizer {
    local: LocalProgressStore,
    remote: Option<RemoteLink>,
    map: RwLock<Arc<ProgressMap>>,
    identity: RwLock<Option<Identity>>,
    save_lock: tokio::sync::Mutex<()>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl ProgressSynchronizer {
    /// Synchronizer that mirrors progress to `remote` when signed in.
    pub async fn open(local: LocalProgressStore, remote: Arc<dyn RemoteProgressStore>) -> Self {
        let writer = RemoteWriter::spawn(remote.clone());
        Self::build(
            local,
            Some(RemoteLink {
                store: remote,
                writer,
            }),
        )
        .await
    }

    /// Synchronizer that never talks to a remote store, whatever the identity.
    pub async fn local_only(local: LocalProgressStore) -> Self {
        Self::build(local, None).await
    }

    async fn build(local: LocalProgressStore, remote: Option<RemoteLink>) -> Self {
        let initial = local.load().await;
        tracing::debug!(entries = initial.len(), remote = remote.is_some(), "loaded local progress");
        Self {
            local,
            remote,
            map: RwLock::new(Arc::new(initial)),
            identity: RwLock::new(None),
            save_lock: tokio::sync::Mutex::new(()),
            listener: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> Arc<ProgressMap> {
        self.map.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn status(&self, kanji: &str) -> ProgressStatus {
        self.snapshot().status(kanji)
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_map(&self, update: impl FnOnce(&ProgressMap) -> ProgressMap) -> Arc<ProgressMap> {
        let mut guard = self.map.write().unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(update(&guard));
        *guard = next.clone();
        next
    }

    /// Saves whatever the map holds once the lock is acquired, so concurrent
    /// writers cannot leave an older map on disk.
    async fn persist(&self) {
        let _guard = self.save_lock.lock().await;
        let current = self.snapshot();
        self.local.save(&current).await;
    }

    /// Record a status. The local map and store are updated before this returns;
    /// the remote copy is updated in the background when signed in.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn set_status(&self, kanji: &str, status: ProgressStatus) {
        self.replace_map(|map| map.with_status(kanji, status));
        self.persist().await;

        let (Some(link), Some(identity)) = (&self.remote, self.identity()) else {
            return;
        };
        link.writer.submit(RemoteWrite::UpsertOne {
            identity,
            kanji: kanji.to_string(),
            status,
        });
    }

    /// React to an identity event. `None` switches to guest mode; a concrete
    /// identity triggers a merge cycle. A failed fetch leaves the map untouched.
    #[tracing::instrument(level = "debug", skip(self, identity), fields(signed_in = identity.is_some()))]
    pub async fn on_identity_change(&self, identity: Option<Identity>) {
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = identity.clone();

        let (Some(link), Some(identity)) = (&self.remote, identity) else {
            tracing::debug!("local-only progress");
            return;
        };

        let remote = match link.store.fetch_all(&identity).await {
            Ok(remote) => remote,
            Err(e) => {
                tracing::warn!(user_id = %identity.user_id, error = %e, "failed to fetch remote progress, keeping local");
                return;
            }
        };

        let merged = self.replace_map(|local| merge_local_over_remote(&remote, local));
        tracing::info!(
            user_id = %identity.user_id,
            remote = remote.len(),
            merged = merged.len(),
            "merged remote progress"
        );
        self.persist().await;

        link.writer.submit(RemoteWrite::UpsertMany {
            identity,
            entries: merged.entries(),
        });
    }

    /// Subscribe to identity events. The value current at subscription time is
    /// handled like an event.
    pub fn attach(self: &Arc<Self>, mut identities: watch::Receiver<Option<Identity>>) {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let initial = identities.borrow_and_update().clone();
            this.on_identity_change(initial).await;
            while identities.changed().await.is_ok() {
                let identity = identities.borrow_and_update().clone();
                this.on_identity_change(identity).await;
            }
            tracing::debug!("identity channel closed");
        });
        let previous = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stop listening for identity events and let queued remote writes finish.
    pub async fn dispose(&self) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            listener.abort();
        }
        if let Some(link) = &self.remote {
            link.writer.shutdown().await;
        }
    }
}
