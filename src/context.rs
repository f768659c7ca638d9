use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;

use crate::{
    catalog::KanjiCatalog,
    config::Config,
    storage::{KeyValueStore, LocalProgressStore, SessionStore},
    supabase_client::SupabaseClient,
    sync::{AuthBackend, IdentityProvider, ProgressSynchronizer, RemoteProgressStore},
};

/// Process-wide services, built once at startup and passed to every consumer.
pub struct AppContext {
    pub config: Arc<Config>,
    pub catalog: Arc<KanjiCatalog>,
    pub identity: Arc<IdentityProvider>,
    pub progress: Arc<ProgressSynchronizer>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AppContext {
    pub async fn build(config: Config, kv: Arc<dyn KeyValueStore>) -> anyhow::Result<Self> {
        let catalog = KanjiCatalog::load(&config.dataset_path).await;
        let local = LocalProgressStore::new(kv.clone());
        let sessions = SessionStore::new(kv);

        let (identity, progress) = match &config.supabase {
            Some(sb) => {
                let client = Arc::new(
                    SupabaseClient::new(&sb.url, &sb.anon_key)?
                        .with_progress_table(&config.progress_table),
                );
                tracing::info!(supabase_url = %sb.url, table = %config.progress_table, "configured sync backend");
                let auth: Arc<dyn AuthBackend> = client.clone();
                let remote: Arc<dyn RemoteProgressStore> = client;
                (
                    IdentityProvider::new(Some(auth), sessions),
                    ProgressSynchronizer::open(local, remote).await,
                )
            }
            None => {
                tracing::info!("no sync backend configured, progress stays on this device");
                (
                    IdentityProvider::new(None, sessions),
                    ProgressSynchronizer::local_only(local).await,
                )
            }
        };

        Ok(Self::from_parts(config, catalog, identity, progress))
    }

    pub fn from_parts(
        config: Config,
        catalog: KanjiCatalog,
        identity: IdentityProvider,
        progress: ProgressSynchronizer,
    ) -> Self {
        Self {
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            identity: Arc::new(identity),
            progress: Arc::new(progress),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Wire identity events into the synchronizer, restore the previous
    /// session and start the token refresh loop.
    pub async fn init(&self) {
        self.progress.attach(self.identity.subscribe());
        self.identity.restore().await;
        if self.identity.is_configured() {
            let refresher = tokio::spawn(Arc::clone(&self.identity).run_refresh_loop());
            self.tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(refresher);
        }
        tracing::info!(
            catalog_ok = !self.catalog.load_failed(),
            signed_in = self.identity.current().is_some(),
            "application context initialized"
        );
    }

    pub async fn dispose(&self) {
        let tasks: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for task in tasks {
            task.abort();
        }
        self.progress.dispose().await;
        tracing::info!("application context disposed");
    }
}
