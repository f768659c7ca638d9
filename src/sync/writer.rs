use std::sync::{Arc, Mutex, PoisonError};

use tokio::{sync::mpsc, task::JoinHandle};

use super::remote::RemoteProgressStore;
use crate::domain::models::{Identity, ProgressStatus};

#[derive(Debug, Clone)]
pub enum RemoteWrite {
    UpsertMany {
        identity: Identity,
        entries: Vec<(String, ProgressStatus)>,
    },
    UpsertOne {
        identity: Identity,
        kanji: String,
        status: ProgressStatus,
    },
}

/// Background delivery of remote writes.
///
/// Delivery is at-most-once: each queued write is attempted exactly one time in
/// submission order, failures are logged and dropped, nothing is retried.
pub struct RemoteWriter {
    tx: Mutex<Option<mpsc::UnboundedSender<RemoteWrite>>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl RemoteWriter {
    /// Spawns the delivery task on the current tokio runtime.
    pub fn spawn(store: Arc<dyn RemoteProgressStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(deliver(store, rx));
        Self {
            tx: Mutex::new(Some(tx)),
            worker: tokio::sync::Mutex::new(Some(worker)),
        }
    }

    pub fn submit(&self, write: RemoteWrite) {
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) => {
                if tx.send(write).is_err() {
                    tracing::debug!("remote writer stopped, dropping write");
                }
            }
            None => tracing::debug!("remote writer shut down, dropping write"),
        }
    }

    /// Stops accepting writes and waits for the queued ones to be attempted.
    pub async fn shutdown(&self) {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        drop(tx);
        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "remote writer task ended abnormally");
            }
        }
    }
}

async fn deliver(store: Arc<dyn RemoteProgressStore>, mut rx: mpsc::UnboundedReceiver<RemoteWrite>) {
    while let Some(write) = rx.recv().await {
        match write {
            RemoteWrite::UpsertMany { identity, entries } => {
                let count = entries.len();
                match store.upsert_many(&identity, &entries).await {
                    Ok(()) => tracing::debug!(user_id = %identity.user_id, count, "pushed merged progress"),
                    Err(e) => tracing::warn!(user_id = %identity.user_id, count, error = %e, "failed to push merged progress"),
                }
            }
            RemoteWrite::UpsertOne {
                identity,
                kanji,
                status,
            } => match store.upsert_one(&identity, &kanji, status).await {
                Ok(()) => tracing::debug!(user_id = %identity.user_id, %kanji, %status, "pushed progress entry"),
                Err(e) => tracing::warn!(user_id = %identity.user_id, %kanji, %status, error = %e, "failed to push progress entry"),
            },
        }
    }
    tracing::debug!("remote writer drained");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::tests::StubRemote;

    fn identity() -> Identity {
        Identity {
            user_id: uuid::Uuid::new_v4(),
            email: None,
            access_token: "t".into(),
        }
    }

    #[tokio::test]
    async fn writes_are_attempted_once_in_order() {
        let remote = Arc::new(StubRemote::default());
        let writer = RemoteWriter::spawn(remote.clone());
        let id = identity();

        writer.submit(RemoteWrite::UpsertOne {
            identity: id.clone(),
            kanji: "日".into(),
            status: ProgressStatus::Learning,
        });
        writer.submit(RemoteWrite::UpsertOne {
            identity: id.clone(),
            kanji: "日".into(),
            status: ProgressStatus::Learned,
        });
        writer.shutdown().await;

        assert_eq!(
            remote.upserted(),
            vec![
                ("日".to_string(), ProgressStatus::Learning),
                ("日".to_string(), ProgressStatus::Learned),
            ]
        );
    }

    #[tokio::test]
    async fn failed_writes_are_not_retried() {
        let remote = Arc::new(StubRemote::failing());
        let writer = RemoteWriter::spawn(remote.clone());

        writer.submit(RemoteWrite::UpsertMany {
            identity: identity(),
            entries: vec![("本".into(), ProgressStatus::Learned)],
        });
        writer.shutdown().await;

        assert_eq!(remote.upsert_calls(), 1);
    }

    #[tokio::test]
    async fn writes_after_shutdown_are_dropped() {
        let remote = Arc::new(StubRemote::default());
        let writer = RemoteWriter::spawn(remote.clone());
        writer.shutdown().await;

        writer.submit(RemoteWrite::UpsertOne {
            identity: identity(),
            kanji: "人".into(),
            status: ProgressStatus::Learned,
        });

        assert_eq!(remote.upsert_calls(), 0);
    }
}
