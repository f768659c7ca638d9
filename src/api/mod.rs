pub mod models;
pub mod routes;
pub mod services;

pub use routes::KanjiStudyApi;

#[cfg(test)]
mod tests {
    use std::{path::Path, sync::Arc};

    use poem::{Route, http::StatusCode, test::TestClient};
    use poem_openapi::OpenApiService;
    use serde_json::json;

    use super::*;
    use crate::{
        catalog::KanjiCatalog,
        config::Config,
        context::AppContext,
        domain::models::ProgressStatus,
        storage::{KeyValueStore, LocalProgressStore, MemoryKeyValueStore, SessionStore},
        sync::{IdentityProvider, ProgressSynchronizer, identity::tests::StubAuth},
    };

    const DATASET: &str = r#"{
        "本": { "strokes": 5, "jlpt_new": 5, "meanings": ["book"], "readings_on": ["ほん"], "readings_kun": ["もと"] },
        "日": { "strokes": 4, "jlpt_new": 5, "meanings": ["day", "sun"], "readings_on": ["にち"], "readings_kun": ["ひ"],
                "examples": [{ "word": "日本", "reading": "にほん", "meaning": "Japan" }] },
        "会": { "strokes": 6, "jlpt_new": 4, "meanings": ["meeting"], "readings_on": ["かい"], "readings_kun": ["あ.う"] }
    }"#;

    async fn context(catalog: KanjiCatalog) -> Arc<AppContext> {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let ctx = AppContext::from_parts(
            Config::default_for_tests(),
            catalog,
            IdentityProvider::new(
                Some(Arc::new(StubAuth::default())),
                SessionStore::new(kv.clone()),
            ),
            ProgressSynchronizer::local_only(LocalProgressStore::new(kv)).await,
        );
        ctx.init().await;
        Arc::new(ctx)
    }

    fn client(ctx: Arc<AppContext>) -> TestClient<Route> {
        let service = OpenApiService::new(KanjiStudyApi { ctx }, "Kanji Study API", "test");
        TestClient::new(Route::new().nest("/", service))
    }

    #[tokio::test]
    async fn lists_level_with_status() {
        let ctx = context(KanjiCatalog::from_json(DATASET).unwrap()).await;
        ctx.progress.set_status("本", ProgressStatus::Learning).await;
        let cli = client(ctx.clone());

        let resp = cli.get("/v1/levels/N5/kanji").send().await;
        resp.assert_status_is_ok();
        let json = resp.json().await;
        let value = json.value();
        let items = value.array();
        items.assert_len(2);
        let first = items.get(0);
        first.object().get("kanji").assert_string("日");
        first.object().get("status").assert_string("not_visited");
        items.get(1).object().get("status").assert_string("learning");

        let resp = cli.get("/v1/levels/4/kanji").query("q", &"MEET").send().await;
        resp.assert_status_is_ok();
        resp.json().await.value().array().assert_len(1);

        cli.get("/v1/levels/N9/kanji")
            .send()
            .await
            .assert_status(StatusCode::NOT_FOUND);
        ctx.dispose().await;
    }

    #[tokio::test]
    async fn health_reports_catalog_size() {
        let ctx = context(KanjiCatalog::from_json(DATASET).unwrap()).await;
        let cli = client(ctx.clone());

        let resp = cli.get("/health").send().await;
        resp.assert_status_is_ok();
        resp.assert_text("ok kanji=3").await;
        ctx.dispose().await;
    }

    #[tokio::test]
    async fn failed_catalog_reports_unavailable() {
        let catalog = KanjiCatalog::load(Path::new("does/not/exist.json")).await;
        let ctx = context(catalog).await;
        let cli = client(ctx.clone());

        cli.get("/health")
            .send()
            .await
            .assert_status(StatusCode::SERVICE_UNAVAILABLE);
        cli.get("/v1/levels/N5/kanji")
            .send()
            .await
            .assert_status(StatusCode::SERVICE_UNAVAILABLE);
        ctx.dispose().await;
    }

    #[tokio::test]
    async fn kanji_detail_includes_stroke_order() {
        let ctx = context(KanjiCatalog::from_json(DATASET).unwrap()).await;
        let cli = client(ctx.clone());

        let resp = cli.get("/v1/kanji").query("kanji", &"日").send().await;
        resp.assert_status_is_ok();
        let json = resp.json().await;
        let value = json.value();
        let detail = value.object();
        detail.get("level").assert_string("N5");
        detail.get("strokes").assert_i64(4);
        detail.get("stroke_order_url").assert_string(
            "https://raw.githubusercontent.com/KanjiVG/kanjivg/master/kanji/065e5.svg",
        );
        let examples = detail.get("examples");
        let list = examples.array();
        list.assert_len(1);
        let first = list.get(0);
        first.object().get("word").assert_string("日本");
        first.object().get("reading").assert_string("にほん");

        cli.get("/v1/kanji")
            .query("kanji", &"丁")
            .send()
            .await
            .assert_status(StatusCode::NOT_FOUND);
        ctx.dispose().await;
    }

    #[tokio::test]
    async fn put_progress_updates_map_and_stats() {
        let ctx = context(KanjiCatalog::from_json(DATASET).unwrap()).await;
        let cli = client(ctx.clone());

        let resp = cli
            .put("/v1/progress")
            .body_json(&json!({ "kanji": "本", "status": "learned" }))
            .send()
            .await;
        resp.assert_status_is_ok();
        resp.assert_json(json!({ "kanji": "本", "status": "learned" })).await;
        assert_eq!(ctx.progress.status("本"), ProgressStatus::Learned);

        cli.get("/v1/progress")
            .send()
            .await
            .assert_json(json!({ "本": "learned" }))
            .await;

        let resp = cli.get("/v1/progress/stats").send().await;
        resp.assert_status_is_ok();
        let json = resp.json().await;
        let value = json.value();
        let stats = value.object();
        stats.get("learned").assert_i64(1);
        stats.get("total").assert_i64(3);
        stats.get("percentage").assert_i64(33);
        let levels = stats.get("levels");
        let levels = levels.array();
        let n5 = levels.get(0);
        n5.object().get("level").assert_string("N5");
        n5.object().get("percentage").assert_i64(50);

        cli.put("/v1/progress")
            .body_json(&json!({ "kanji": "本", "status": "not_visited" }))
            .send()
            .await
            .assert_status_is_ok();
        cli.get("/v1/progress").send().await.assert_json(json!({})).await;
        ctx.dispose().await;
    }

    #[tokio::test]
    async fn put_progress_rejects_multi_character_keys() {
        let ctx = context(KanjiCatalog::from_json(DATASET).unwrap()).await;
        let cli = client(ctx.clone());

        for kanji in ["", "日本"] {
            cli.put("/v1/progress")
                .body_json(&json!({ "kanji": kanji, "status": "learning" }))
                .send()
                .await
                .assert_status(StatusCode::BAD_REQUEST);
        }
        assert!(ctx.progress.snapshot().is_empty());
        ctx.dispose().await;
    }

    #[tokio::test]
    async fn put_progress_accepts_kanji_with_variation_selector() {
        let ctx = context(KanjiCatalog::from_json(DATASET).unwrap()).await;
        let cli = client(ctx.clone());
        let kanji = "\u{845B}\u{E0100}";

        cli.put("/v1/progress")
            .body_json(&json!({ "kanji": kanji, "status": "learned" }))
            .send()
            .await
            .assert_status_is_ok();
        assert_eq!(ctx.progress.status(kanji), ProgressStatus::Learned);
        ctx.dispose().await;
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let ctx = context(KanjiCatalog::default()).await;
        let cli = client(ctx.clone());

        let resp = cli.get("/v1/session").send().await;
        resp.assert_status_is_ok();
        let json = resp.json().await;
        json.value().object().get("signed_in").assert_bool(false);
        json.value().object().get("sync_available").assert_bool(true);

        cli.post("/v1/session/sign-in")
            .body_json(&json!({ "email": "learner@example.com", "password": "wrong" }))
            .send()
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let resp = cli
            .post("/v1/session/sign-in")
            .body_json(&json!({ "email": "learner@example.com", "password": "secret" }))
            .send()
            .await;
        resp.assert_status_is_ok();
        resp.json().await.value().object().get("ok").assert_bool(true);
        assert!(ctx.identity.current().is_some());

        let resp = cli.get("/v1/session").send().await;
        let json = resp.json().await;
        json.value().object().get("signed_in").assert_bool(true);
        json.value()
            .object()
            .get("email")
            .assert_string("learner@example.com");

        cli.post("/v1/session/sign-out")
            .send()
            .await
            .assert_status(StatusCode::NO_CONTENT);
        assert!(ctx.identity.current().is_none());
        ctx.dispose().await;
    }
}
