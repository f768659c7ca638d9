use std::sync::Arc;

use poem_openapi::{
    OpenApi,
    param::{Path, Query},
    payload::Json,
};

use super::models::{
    AuthResponse, CredentialsDto, HealthResponse, KanjiDetailResponse, KanjiListResponse,
    NoContentResponse, ProgressEntryDto, ProgressMapResponse, ProgressStatsResponse,
    SessionResponse, SetStatusResponse,
};
use super::services::{
    catalog::CatalogService, health::HealthService, progress::ProgressService,
    session::SessionService,
};
use crate::context::AppContext;

pub struct KanjiStudyApi {
    pub ctx: Arc<AppContext>,
}

#[OpenApi]
impl KanjiStudyApi {
    #[oai(path = "/health", method = "get")]
    async fn health(&self) -> HealthResponse {
        HealthService::new(&self.ctx.catalog).status()
    }

    // ===== Catalog =====

    /// Kanji of one JLPT level with the learner's status for each
    #[oai(path = "/v1/levels/:level/kanji", method = "get")]
    #[tracing::instrument(level = "debug", skip(self, level, q))]
    async fn list_level(
        &self,
        /// "N5" .. "N1", or just the number
        level: Path<String>,
        /// Case-insensitive filter over character, meanings and readings
        Query(q): Query<Option<String>>,
    ) -> KanjiListResponse {
        CatalogService::new(&self.ctx.catalog, &self.ctx.progress)
            .list_level(&level.0, q.as_deref())
    }

    #[oai(path = "/v1/kanji", method = "get")]
    #[tracing::instrument(level = "debug", skip(self, kanji))]
    async fn kanji_detail(&self, Query(kanji): Query<String>) -> KanjiDetailResponse {
        CatalogService::new(&self.ctx.catalog, &self.ctx.progress).detail(&kanji)
    }

    // ===== Progress =====

    #[oai(path = "/v1/progress", method = "get")]
    async fn progress(&self) -> ProgressMapResponse {
        ProgressService::new(&self.ctx.catalog, &self.ctx.progress).map()
    }

    #[oai(path = "/v1/progress/stats", method = "get")]
    async fn progress_stats(&self) -> ProgressStatsResponse {
        ProgressService::new(&self.ctx.catalog, &self.ctx.progress).stats()
    }

    /// Set the status of one kanji; `not_visited` clears it
    #[oai(path = "/v1/progress", method = "put")]
    #[tracing::instrument(level = "debug", skip(self, body))]
    async fn set_progress(&self, body: Json<ProgressEntryDto>) -> SetStatusResponse {
        let ProgressEntryDto { kanji, status } = body.0;
        ProgressService::new(&self.ctx.catalog, &self.ctx.progress)
            .set_status(&kanji, status.into())
            .await
    }

    // ===== Session =====

    #[oai(path = "/v1/session", method = "get")]
    async fn session(&self) -> SessionResponse {
        SessionService::new(&self.ctx.identity).current()
    }

    #[oai(path = "/v1/session/sign-in", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, body))]
    async fn sign_in(&self, body: Json<CredentialsDto>) -> AuthResponse {
        SessionService::new(&self.ctx.identity)
            .sign_in(&body.email, &body.password)
            .await
    }

    #[oai(path = "/v1/session/sign-up", method = "post")]
    #[tracing::instrument(level = "debug", skip(self, body))]
    async fn sign_up(&self, body: Json<CredentialsDto>) -> AuthResponse {
        SessionService::new(&self.ctx.identity)
            .sign_up(&body.email, &body.password)
            .await
    }

    #[oai(path = "/v1/session/sign-out", method = "post")]
    async fn sign_out(&self) -> NoContentResponse {
        SessionService::new(&self.ctx.identity).sign_out().await
    }
}
