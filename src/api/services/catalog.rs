use poem_openapi::payload::Json;

use crate::{
    api::models::{ErrorDto, KanjiDetailDto, KanjiDetailResponse, KanjiItemDto, KanjiListResponse},
    catalog::KanjiCatalog,
    domain::models::JlptLevel,
    sync::ProgressSynchronizer,
};

const CATALOG_UNAVAILABLE: &str = "Failed to load kanji data";

pub struct CatalogService<'a> {
    pub catalog: &'a KanjiCatalog,
    pub progress: &'a ProgressSynchronizer,
}

impl<'a> CatalogService<'a> {
    pub fn new(catalog: &'a KanjiCatalog, progress: &'a ProgressSynchronizer) -> Self {
        Self { catalog, progress }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn list_level(&self, level: &str, query: Option<&str>) -> KanjiListResponse {
        if self.catalog.load_failed() {
            return KanjiListResponse::ServiceUnavailable(Json(ErrorDto::from(
                CATALOG_UNAVAILABLE.to_string(),
            )));
        }
        let level: JlptLevel = match level.parse() {
            Ok(l) => l,
            Err(e) => {
                return KanjiListResponse::NotFound(Json(ErrorDto::from(e.to_string())));
            }
        };
        // One snapshot for the whole page so every row reflects the same map.
        let progress = self.progress.snapshot();
        let items = self
            .catalog
            .search(level, query.unwrap_or_default())
            .into_iter()
            .map(|item| KanjiItemDto::new(item, progress.status(&item.char)))
            .collect::<Vec<_>>();
        tracing::debug!(%level, count = items.len(), "listed kanji");
        KanjiListResponse::Ok(Json(items))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn detail(&self, kanji: &str) -> KanjiDetailResponse {
        if self.catalog.load_failed() {
            return KanjiDetailResponse::ServiceUnavailable(Json(ErrorDto::from(
                CATALOG_UNAVAILABLE.to_string(),
            )));
        }
        match self.catalog.find(kanji) {
            Some(item) => KanjiDetailResponse::Ok(Json(KanjiDetailDto::new(
                item,
                self.progress.status(kanji),
            ))),
            None => KanjiDetailResponse::NotFound(Json(ErrorDto::from(format!(
                "unknown kanji: {kanji}"
            )))),
        }
    }
}
