// HTTP client for the hosted backend (Supabase-compatible auth + PostgREST)

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::{Identity, Session};

pub const DEFAULT_PROGRESS_TABLE: &str = "user_progress";

#[derive(Clone, Debug)]
pub struct SupabaseClient {
    base_url: String,
    anon_key: String,
    progress_table: String,
    client: reqwest::Client,
}

impl SupabaseClient {
    /// Create a new client for the project at `base_url` (e.g. "https://abc.supabase.co").
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        let base_url_str = base_url.into();
        tracing::debug!(base_url = %base_url_str, "creating SupabaseClient");
        Ok(SupabaseClient {
            base_url: base_url_str.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            progress_table: DEFAULT_PROGRESS_TABLE.to_string(),
            client,
        })
    }

    /// Return a client that reads and writes progress rows in `table`
    pub fn with_progress_table(mut self, table: impl Into<String>) -> Self {
        self.progress_table = table.into();
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Requests carry the project key; user-scoped ones also carry the user's token.
    fn request(&self, method: reqwest::Method, path: &str, bearer: Option<&str>) -> reqwest::RequestBuilder {
        let url = self.url(path);
        tracing::debug!(%url, %method, "building request");
        let bearer = bearer.unwrap_or(&self.anon_key);
        self.client
            .request(method, &url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }

    /// POST /auth/v1/token?grant_type=password
    #[tracing::instrument(level = "debug", skip(self, password))]
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> anyhow::Result<Session> {
        let resp = self
            .request(reqwest::Method::POST, "/auth/v1/token", None)
            .query(&[("grant_type", "password")])
            .json(&Credentials { email, password })
            .send()
            .await?;
        let body = error_for_auth(resp).await?.text().await?;
        let parsed: TokenResponse = serde_json::from_str(&body)?;
        Ok(parsed.into_session(Utc::now()))
    }

    /// POST /auth/v1/signup. Returns `None` when the project requires e-mail
    /// confirmation before a session is issued.
    #[tracing::instrument(level = "debug", skip(self, password))]
    pub async fn sign_up(&self, email: &str, password: &str) -> anyhow::Result<Option<Session>> {
        let resp = self
            .request(reqwest::Method::POST, "/auth/v1/signup", None)
            .json(&Credentials { email, password })
            .send()
            .await?;
        let body = error_for_auth(resp).await?.text().await?;
        let parsed: SignUpResponse = serde_json::from_str(&body)?;
        Ok(parsed.into_session(Utc::now()))
    }

    /// POST /auth/v1/token?grant_type=refresh_token
    #[tracing::instrument(level = "debug", skip(self, refresh_token))]
    pub async fn refresh_session(&self, refresh_token: &str) -> anyhow::Result<Session> {
        let resp = self
            .request(reqwest::Method::POST, "/auth/v1/token", None)
            .query(&[("grant_type", "refresh_token")])
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let body = error_for_auth(resp).await?.text().await?;
        let parsed: TokenResponse = serde_json::from_str(&body)?;
        Ok(parsed.into_session(Utc::now()))
    }

    /// POST /auth/v1/logout
    #[tracing::instrument(level = "debug", skip(self, access_token))]
    pub async fn sign_out(&self, access_token: &str) -> anyhow::Result<()> {
        let resp = self
            .request(reqwest::Method::POST, "/auth/v1/logout", Some(access_token))
            .send()
            .await?;
        error_for_auth(resp).await?;
        Ok(())
    }

    /// GET /rest/v1/{table}?select=kanji,status. Row-level security scopes the
    /// result to the token's user.
    #[tracing::instrument(level = "debug", skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn fetch_progress_rows(&self, identity: &Identity) -> anyhow::Result<Vec<ProgressRow>> {
        let path = format!("/rest/v1/{}", self.progress_table);
        let resp = self
            .request(reqwest::Method::GET, &path, Some(&identity.access_token))
            .query(&[("select", "kanji,status")])
            .send()
            .await?;
        let status = resp.error_for_status()?;
        let body = status.text().await?;
        match serde_json::from_str::<Vec<ProgressRow>>(&body) {
            Ok(rows) => Ok(rows),
            Err(e) => {
                let snippet_len = body.len().min(500);
                let snippet = body.get(..snippet_len).unwrap_or_default();
                tracing::error!(error = %e, body_snippet = %snippet, "failed to parse progress rows");
                Err(e.into())
            }
        }
    }

    /// POST /rest/v1/{table}?on_conflict=user_id,kanji as an upsert. An empty
    /// batch sends nothing.
    #[tracing::instrument(level = "debug", skip(self, identity, rows), fields(user_id = %identity.user_id, rows = rows.len()))]
    pub async fn upsert_progress_rows(
        &self,
        identity: &Identity,
        rows: &[ProgressRowWrite<'_>],
    ) -> anyhow::Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let path = format!("/rest/v1/{}", self.progress_table);
        let resp = self
            .request(reqwest::Method::POST, &path, Some(&identity.access_token))
            .query(&[("on_conflict", "user_id,kanji")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows)
            .send()
            .await?;
        resp.error_for_status()?;
        Ok(())
    }
}

/// GoTrue answers errors with a JSON body; surface its message instead of a bare status code.
async fn error_for_auth(resp: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<AuthErrorResponse>(&body)
        .ok()
        .and_then(AuthErrorResponse::message)
        .unwrap_or_else(|| format!("auth request failed with status {}", status));
    anyhow::bail!(message)
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    /// Unix seconds; older servers only send `expires_in`
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(|| now + Duration::seconds(self.expires_in));
        Session {
            user_id: self.user.id,
            email: self.user.email,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        }
    }
}

/// Sign-up returns a full token response when auto-confirm is on, otherwise
/// just the pending user.
#[derive(Debug, Deserialize, PartialEq)]
pub struct SignUpResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub expires_at: Option<i64>,
    pub user: Option<AuthUser>,
}

impl SignUpResponse {
    fn into_session(self, now: DateTime<Utc>) -> Option<Session> {
        let token = TokenResponse {
            access_token: self.access_token?,
            refresh_token: self.refresh_token?,
            expires_in: self.expires_in.unwrap_or(3600),
            expires_at: self.expires_at,
            user: self.user?,
        };
        Some(token.into_session(now))
    }
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct AuthErrorResponse {
    pub error_description: Option<String>,
    pub msg: Option<String>,
    pub message: Option<String>,
}

impl AuthErrorResponse {
    fn message(self) -> Option<String> {
        self.error_description.or(self.msg).or(self.message)
    }
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct ProgressRow {
    pub kanji: String,
    pub status: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ProgressRowWrite<'a> {
    pub user_id: Uuid,
    pub kanji: &'a str,
    pub status: &'a str,
}
