use std::{net::SocketAddr, path::PathBuf};

use crate::supabase_client::DEFAULT_PROGRESS_TABLE;

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug)]
pub struct Config {
    /// `None` runs the app in guest-only mode
    pub supabase: Option<SupabaseConfig>,
    pub progress_table: String,
    pub db_connection_string: String,
    pub dataset_path: PathBuf,
    pub bind_addr: String,
    supabase_url: String,
    supabase_anon_key: String,
}

const DEFAULT_DB_CONNECTION_STRING: &str = "sqlite://kanji.sqlite?mode=rwc";
const DEFAULT_DATASET_PATH: &str = "data/kanji.json";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
/// Connection string selecting the in-memory local store
pub const MEMORY_DB: &str = "memory";

impl Config {
    pub fn load() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let supabase_url = get("SUPABASE_URL").unwrap_or_default();
        let supabase_anon_key = get("SUPABASE_ANON_KEY").unwrap_or_default();
        let supabase = (!supabase_url.is_empty() && !supabase_anon_key.is_empty()).then(|| {
            SupabaseConfig {
                url: supabase_url.clone(),
                anon_key: supabase_anon_key.clone(),
            }
        });
        Config {
            supabase,
            progress_table: get("PROGRESS_TABLE").unwrap_or(DEFAULT_PROGRESS_TABLE.into()),
            db_connection_string: get("DB_CONNECTION_STRING")
                .unwrap_or(DEFAULT_DB_CONNECTION_STRING.into()),
            dataset_path: get("KANJI_DATASET_PATH")
                .unwrap_or(DEFAULT_DATASET_PATH.into())
                .into(),
            bind_addr: get("BIND_ADDR").unwrap_or(DEFAULT_BIND_ADDR.into()),
            supabase_url,
            supabase_anon_key,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.supabase_url.is_empty() != self.supabase_anon_key.is_empty() {
            return Err("SUPABASE_URL and SUPABASE_ANON_KEY must be set together".into());
        }
        if self.bind_addr.parse::<SocketAddr>().is_err() {
            return Err(format!("BIND_ADDR is not a socket address: {}", self.bind_addr));
        }
        if self.progress_table.is_empty() {
            return Err("PROGRESS_TABLE is empty".into());
        }
        Ok(())
    }

    pub fn uses_memory_store(&self) -> bool {
        self.db_connection_string == MEMORY_DB
    }

    #[cfg(test)]
    pub fn default_for_tests() -> Self {
        Self::from_lookup(|_| None)
    }
}
