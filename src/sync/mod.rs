pub mod identity;
pub mod remote;
pub mod synchronizer;
pub mod writer;

pub use identity::{AuthBackend, AuthOutcome, IdentityProvider};
pub use remote::RemoteProgressStore;
pub use synchronizer::ProgressSynchronizer;

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::domain::models::{Identity, ProgressMap, ProgressStatus};

    /// In-process remote store that counts every call.
    #[derive(Default)]
    pub(crate) struct StubRemote {
        rows: Mutex<ProgressMap>,
        fail: bool,
        fetches: AtomicUsize,
        upserts: AtomicUsize,
        upserted: Mutex<Vec<(String, ProgressStatus)>>,
    }

    impl StubRemote {
        pub(crate) fn with_rows(rows: ProgressMap) -> Self {
            Self {
                rows: Mutex::new(rows),
                ..Default::default()
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub(crate) fn fetch_calls(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        pub(crate) fn upsert_calls(&self) -> usize {
            self.upserts.load(Ordering::SeqCst)
        }

        pub(crate) fn upserted(&self) -> Vec<(String, ProgressStatus)> {
            self.upserted.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl RemoteProgressStore for StubRemote {
        async fn fetch_all(&self, _identity: &Identity) -> anyhow::Result<ProgressMap> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("network unreachable");
            }
            Ok(self.rows.lock().unwrap().clone())
        }

        async fn upsert_many(
            &self,
            _identity: &Identity,
            entries: &[(String, ProgressStatus)],
        ) -> anyhow::Result<()> {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("network unreachable");
            }
            self.upserted.lock().unwrap().extend(entries.iter().cloned());
            let mut rows = self.rows.lock().unwrap();
            for (kanji, status) in entries {
                rows.insert(kanji.clone(), *status);
            }
            Ok(())
        }

        async fn upsert_one(
            &self,
            _identity: &Identity,
            kanji: &str,
            status: ProgressStatus,
        ) -> anyhow::Result<()> {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("network unreachable");
            }
            self.upserted.lock().unwrap().push((kanji.to_string(), status));
            self.rows.lock().unwrap().insert(kanji.to_string(), status);
            Ok(())
        }
    }
}
