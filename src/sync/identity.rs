use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};

use crate::{
    domain::models::{Identity, Session},
    storage::SessionStore,
    supabase_client::SupabaseClient,
};

/// Refresh this many seconds before the access token expires.
const REFRESH_MARGIN_SECS: i64 = 60;
/// How often the refresh loop looks again when there is nothing to refresh.
const IDLE_RECHECK: Duration = Duration::from_secs(30);

#[async_trait::async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> anyhow::Result<Session>;
    /// `None` when the account still needs e-mail confirmation.
    async fn sign_up(&self, email: &str, password: &str) -> anyhow::Result<Option<Session>>;
    async fn sign_out(&self, session: &Session) -> anyhow::Result<()>;
    async fn refresh(&self, session: &Session) -> anyhow::Result<Session>;
}

#[async_trait::async_trait]
impl AuthBackend for SupabaseClient {
    async fn sign_in(&self, email: &str, password: &str) -> anyhow::Result<Session> {
        self.sign_in_with_password(email, password).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> anyhow::Result<Option<Session>> {
        SupabaseClient::sign_up(self, email, password).await
    }

    async fn sign_out(&self, session: &Session) -> anyhow::Result<()> {
        SupabaseClient::sign_out(self, &session.access_token).await
    }

    async fn refresh(&self, session: &Session) -> anyhow::Result<Session> {
        self.refresh_session(&session.refresh_token).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub ok: bool,
    pub message: Option<String>,
}

impl AuthOutcome {
    fn ok(message: &str) -> Self {
        Self {
            ok: true,
            message: Some(message.to_string()),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
        }
    }
}

/// Owns the current session and publishes identity changes.
///
/// Every sign-in, sign-out and token refresh is published on a watch channel;
/// subscribers see `None` for guests.
pub struct IdentityProvider {
    backend: Option<Arc<dyn AuthBackend>>,
    sessions: SessionStore,
    session: Mutex<Option<Session>>,
    tx: watch::Sender<Option<Identity>>,
}

impl IdentityProvider {
    /// Without a backend the provider stays in guest mode for the whole process.
    pub fn new(backend: Option<Arc<dyn AuthBackend>>, sessions: SessionStore) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            backend,
            sessions,
            session: Mutex::new(None),
            tx,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    pub fn current(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }

    async fn install(&self, session: Option<Session>) {
        match &session {
            Some(s) => self.sessions.save(s).await,
            None => self.sessions.clear().await,
        }
        let identity = session.as_ref().map(Session::identity);
        *self.session.lock().await = session;
        tracing::info!(
            signed_in = identity.is_some(),
            user_id = %identity.as_ref().map(|i| i.user_id.to_string()).unwrap_or_default(),
            "identity changed"
        );
        self.tx.send_replace(identity);
    }

    /// Pick up the session persisted by a previous run. Expired sessions are
    /// refreshed; if that fails the user continues as a guest.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn restore(&self) {
        let Some(backend) = &self.backend else {
            return;
        };
        let Some(stored) = self.sessions.load().await else {
            return;
        };
        if !stored.is_expired(Utc::now()) {
            self.install(Some(stored)).await;
            return;
        }
        match backend.refresh(&stored).await {
            Ok(fresh) => self.install(Some(fresh)).await,
            Err(e) => {
                tracing::warn!(error = %e, "stored session expired and could not be refreshed");
                self.sessions.clear().await;
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthOutcome {
        let Some(backend) = &self.backend else {
            return AuthOutcome::failed("Sync backend not configured. Sign-in unavailable.");
        };
        match backend.sign_in(email, password).await {
            Ok(session) => {
                self.install(Some(session)).await;
                AuthOutcome::ok("Signed in")
            }
            Err(e) => {
                tracing::info!(error = %e, "sign-in rejected");
                AuthOutcome::failed(e.to_string())
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self, password))]
    pub async fn sign_up(&self, email: &str, password: &str) -> AuthOutcome {
        let Some(backend) = &self.backend else {
            return AuthOutcome::failed("Sync backend not configured. Sign-up unavailable.");
        };
        match backend.sign_up(email, password).await {
            Ok(Some(session)) => {
                self.install(Some(session)).await;
                AuthOutcome::ok("Account created")
            }
            Ok(None) => AuthOutcome::ok("Account created. Confirm your e-mail to sign in."),
            Err(e) => {
                tracing::info!(error = %e, "sign-up rejected");
                AuthOutcome::failed(e.to_string())
            }
        }
    }

    /// Local sign-out always succeeds; revoking the token upstream is best-effort.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn sign_out(&self) {
        let Some(backend) = &self.backend else {
            return;
        };
        let previous = self.session.lock().await.clone();
        self.install(None).await;
        if let Some(session) = previous {
            if let Err(e) = backend.sign_out(&session).await {
                tracing::warn!(error = %e, "failed to revoke session upstream");
            }
        }
    }

    /// Exchange the refresh token for a new session and publish it. Returns
    /// `false` when there is no session to refresh.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn refresh(&self) -> anyhow::Result<bool> {
        let Some(backend) = &self.backend else {
            return Ok(false);
        };
        let Some(current) = self.session.lock().await.clone() else {
            return Ok(false);
        };
        let fresh = backend.refresh(&current).await?;
        // A sign-out or new sign-in while the refresh was in flight wins.
        let still_current = self
            .session
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| s.refresh_token == current.refresh_token);
        if still_current {
            self.install(Some(fresh)).await;
        }
        Ok(still_current)
    }

    async fn refresh_delay(&self, now: DateTime<Utc>) -> Option<Duration> {
        let session = self.session.lock().await;
        let due = session.as_ref()?.expires_at - chrono::Duration::seconds(REFRESH_MARGIN_SECS);
        Some((due - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// Keeps the session alive until the task is aborted.
    pub async fn run_refresh_loop(self: Arc<Self>) {
        loop {
            let Some(wait) = self.refresh_delay(Utc::now()).await else {
                tokio::time::sleep(IDLE_RECHECK).await;
                continue;
            };
            tokio::time::sleep(wait).await;
            if self.refresh_delay(Utc::now()).await != Some(Duration::ZERO) {
                continue;
            }
            if let Err(e) = self.refresh().await {
                tracing::warn!(error = %e, "failed to refresh session");
                let expired = self
                    .session
                    .lock()
                    .await
                    .as_ref()
                    .is_some_and(|s| s.is_expired(Utc::now()));
                if expired {
                    tracing::info!("session expired, continuing as guest");
                    self.install(None).await;
                }
                tokio::time::sleep(IDLE_RECHECK).await;
            }
        }
    }
}
