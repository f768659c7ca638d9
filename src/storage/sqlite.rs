use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use entities::local_kv;
use sea_orm::{ActiveValue::Set, DatabaseConnection, EntityTrait, sea_query::OnConflict};

use super::KeyValueStore;

/// Key/value rows in the `local_kv` table.
#[derive(Clone, Debug)]
pub struct SqliteKeyValueStore {
    db: Arc<DatabaseConnection>,
}

impl SqliteKeyValueStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let row = local_kv::Entity::find_by_id(key.to_string())
            .one(self.db.as_ref())
            .await
            .with_context(|| format!("Failed to read local key {key}"))?;
        Ok(row.map(|r| r.value))
    }

    #[tracing::instrument(level = "debug", skip(self, value), fields(bytes = value.len()))]
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let row = local_kv::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(Utc::now()),
        };
        local_kv::Entity::insert(row)
            .on_conflict(
                OnConflict::column(local_kv::Column::Key)
                    .update_columns([local_kv::Column::Value, local_kv::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec(self.db.as_ref())
            .await
            .with_context(|| format!("Failed to write local key {key}"))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        local_kv::Entity::delete_by_id(key.to_string())
            .exec(self.db.as_ref())
            .await
            .with_context(|| format!("Failed to delete local key {key}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use migration::MigratorTrait;
    use sea_orm::Database;

    use super::*;

    async fn open(dir: &tempfile::TempDir) -> SqliteKeyValueStore {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("kv.sqlite").display());
        let db = Database::connect(&url).await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        SqliteKeyValueStore::new(Arc::new(db))
    }

    #[tokio::test]
    async fn set_overwrites_and_remove_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await;

        assert_eq!(store.get("kanji-progress").await.unwrap(), None);
        store.set("kanji-progress", r#"{"日":"learning"}"#).await.unwrap();
        store.set("kanji-progress", r#"{"日":"learned"}"#).await.unwrap();
        assert_eq!(
            store.get("kanji-progress").await.unwrap().as_deref(),
            Some(r#"{"日":"learned"}"#)
        );

        store.remove("kanji-progress").await.unwrap();
        assert_eq!(store.get("kanji-progress").await.unwrap(), None);
    }

    #[tokio::test]
    async fn data_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        open(&dir).await.set("k", "v").await.unwrap();

        let reopened = open(&dir).await;
        assert_eq!(reopened.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
