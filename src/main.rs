mod api;
mod catalog;
mod config;
mod context;
mod domain;
mod storage;
mod supabase_client;
mod sync;

use std::{path::Path, sync::Arc};

use anyhow::Context;
use config::Config;
use context::AppContext;
use migration::MigratorTrait;
use poem::{
    EndpointExt, Route, Server,
    listener::TcpListener,
    middleware::{Cors, Tracing as PoemTracing},
};
use poem_openapi::OpenApiService;
use sea_orm::Database;
use storage::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder, prelude::*};

type KanjiStudyResult<T> = anyhow::Result<T>;

#[tokio::main]
async fn main() -> KanjiStudyResult<()> {
    // Respect RUST_LOG if set, default to info for our crate and warn for deps.
    let default_filter = format!(
        "{}=info,poem=info,reqwest=warn,h2=warn,sqlx=warn",
        env!("CARGO_PKG_NAME")
    );
    let env_filter = std::env::var("RUST_LOG").unwrap_or(default_filter);
    SubscriberBuilder::default()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .with_level(true)
        .pretty()
        .finish()
        .with(ErrorLayer::default())
        .init();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting Kanji Study");

    if Path::new(".env.local").exists() {
        dotenvy::from_filename(".env.local")?;
    } else if Path::new(".env").exists() {
        dotenvy::from_filename(".env")?;
    };
    let config = Config::load();
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    let kv = open_local_store(&config).await?;
    let ctx = Arc::new(AppContext::build(config, kv).await?);
    ctx.init().await;

    let served = run_poem(ctx.clone()).await;
    ctx.dispose().await;
    served
}

async fn open_local_store(config: &Config) -> KanjiStudyResult<Arc<dyn KeyValueStore>> {
    if config.uses_memory_store() {
        tracing::warn!("using in-memory local store, progress is lost on exit");
        return Ok(Arc::new(MemoryKeyValueStore::new()));
    }

    let db_conn = Database::connect(&config.db_connection_string)
        .await
        .with_context(|| "Failed to connect to database")?;

    migration::Migrator::up(&db_conn, None)
        .await
        .with_context(|| "Failed to run database migrations")?;

    Ok(Arc::new(SqliteKeyValueStore::new(Arc::new(db_conn))))
}

pub async fn run_poem(ctx: Arc<AppContext>) -> KanjiStudyResult<()> {
    let version = env!("CARGO_PKG_VERSION");
    let bind_addr = ctx.config.bind_addr.clone();
    let api = api::KanjiStudyApi { ctx };
    let api_service = OpenApiService::new(api, "Kanji Study API", version)
        .server(format!("http://{bind_addr}"));
    let ui = api_service.rapidoc();
    let spec = api_service.spec();
    let route = Route::new()
        .nest("/", api_service)
        .nest("/ui", ui)
        .nest("/spec", poem::endpoint::make_sync(move |_| spec.clone()))
        .with(Cors::new())
        .with(PoemTracing);

    tracing::info!(%bind_addr, "starting HTTP server");
    Server::new(TcpListener::bind(bind_addr))
        .run_with_graceful_shutdown(
            route,
            async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "failed to listen for shutdown signal");
                }
                tracing::info!("shutdown requested");
            },
            None,
        )
        .await?;
    Ok(())
}
