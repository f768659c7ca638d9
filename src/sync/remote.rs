use crate::{
    domain::models::{Identity, ProgressMap, ProgressStatus},
    supabase_client::{ProgressRowWrite, SupabaseClient},
};

/// Per-user progress rows on the hosted backend, keyed by (user, kanji).
///
/// Never the sole source of truth: callers treat every error as "no remote data"
/// or as a dropped write.
#[async_trait::async_trait]
pub trait RemoteProgressStore: Send + Sync {
    async fn fetch_all(&self, identity: &Identity) -> anyhow::Result<ProgressMap>;
    async fn upsert_many(
        &self,
        identity: &Identity,
        entries: &[(String, ProgressStatus)],
    ) -> anyhow::Result<()>;
    async fn upsert_one(
        &self,
        identity: &Identity,
        kanji: &str,
        status: ProgressStatus,
    ) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
impl RemoteProgressStore for SupabaseClient {
    async fn fetch_all(&self, identity: &Identity) -> anyhow::Result<ProgressMap> {
        let rows = self.fetch_progress_rows(identity).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row.status.parse::<ProgressStatus>() {
                Ok(status) => Some((row.kanji, status)),
                Err(e) => {
                    tracing::debug!(kanji = %row.kanji, error = %e, "skipping remote progress row");
                    None
                }
            })
            .collect())
    }

    async fn upsert_many(
        &self,
        identity: &Identity,
        entries: &[(String, ProgressStatus)],
    ) -> anyhow::Result<()> {
        let rows: Vec<ProgressRowWrite<'_>> = entries
            .iter()
            .map(|(kanji, status)| ProgressRowWrite {
                user_id: identity.user_id,
                kanji,
                status: status.as_str(),
            })
            .collect();
        self.upsert_progress_rows(identity, &rows).await
    }

    async fn upsert_one(
        &self,
        identity: &Identity,
        kanji: &str,
        status: ProgressStatus,
    ) -> anyhow::Result<()> {
        let row = ProgressRowWrite {
            user_id: identity.user_id,
            kanji,
            status: status.as_str(),
        };
        self.upsert_progress_rows(identity, std::slice::from_ref(&row))
            .await
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use uuid::Uuid;

    use super::*;

    fn identity() -> Identity {
        Identity {
            user_id: Uuid::parse_str("b8df8f4c-5f93-4a10-812b-84ec4cee4389").unwrap(),
            email: None,
            access_token: "t".into(),
        }
    }

    #[tokio::test]
    async fn fetch_all_skips_unknown_statuses() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/rest/v1/user_progress")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"[{"kanji":"日","status":"learned"},{"kanji":"本","status":"bogus"},{"kanji":"人","status":"learning"}]"#,
            )
            .create_async()
            .await;

        let client = SupabaseClient::new(server.url(), "anon").unwrap();
        let map = client.fetch_all(&identity()).await.unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.status("日"), ProgressStatus::Learned);
        assert_eq!(map.status("本"), ProgressStatus::NotVisited);
    }

    #[tokio::test]
    async fn upsert_one_sends_reset_as_not_visited() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/user_progress")
            .match_query(Matcher::Any)
            .match_body(Matcher::Json(serde_json::json!([
                { "user_id": "b8df8f4c-5f93-4a10-812b-84ec4cee4389", "kanji": "日", "status": "not_visited" }
            ])))
            .with_status(201)
            .create_async()
            .await;

        let client = SupabaseClient::new(server.url(), "anon").unwrap();
        client
            .upsert_one(&identity(), "日", ProgressStatus::NotVisited)
            .await
            .unwrap();

        mock.assert_async().await;
    }
}
