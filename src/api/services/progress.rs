use std::collections::BTreeMap;

use poem_openapi::payload::Json;
use unicode_segmentation::UnicodeSegmentation;

use crate::{
    api::models::{
        ErrorDto, ProgressEntryDto, ProgressMapResponse, ProgressOverviewDto,
        ProgressStatsResponse, ProgressStatusDto, SetStatusResponse,
    },
    catalog::KanjiCatalog,
    domain::{
        models::{JlptLevel, ProgressStatus},
        progress::{level_stats, overview},
    },
    sync::ProgressSynchronizer,
};

pub struct ProgressService<'a> {
    pub catalog: &'a KanjiCatalog,
    pub progress: &'a ProgressSynchronizer,
}

impl<'a> ProgressService<'a> {
    pub fn new(catalog: &'a KanjiCatalog, progress: &'a ProgressSynchronizer) -> Self {
        Self { catalog, progress }
    }

    pub fn map(&self) -> ProgressMapResponse {
        let map: BTreeMap<String, ProgressStatusDto> = self
            .progress
            .snapshot()
            .iter()
            .map(|(kanji, status)| (kanji.to_string(), status.into()))
            .collect();
        ProgressMapResponse::Ok(Json(map))
    }

    pub fn stats(&self) -> ProgressStatsResponse {
        if self.catalog.load_failed() {
            return ProgressStatsResponse::ServiceUnavailable(Json(ErrorDto::from(
                "Failed to load kanji data".to_string(),
            )));
        }
        let progress = self.progress.snapshot();
        let levels = JlptLevel::ALL
            .iter()
            .map(|&level| level_stats(level, self.catalog.items_for_level(level), &progress))
            .collect();
        ProgressStatsResponse::Ok(Json(ProgressOverviewDto::from(&overview(levels))))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn set_status(&self, kanji: &str, status: ProgressStatus) -> SetStatusResponse {
        if kanji.graphemes(true).count() != 1 {
            return SetStatusResponse::BadRequest(Json(ErrorDto::from(format!(
                "expected a single character, got {kanji:?}"
            ))));
        }
        self.progress.set_status(kanji, status).await;
        SetStatusResponse::Ok(Json(ProgressEntryDto {
            kanji: kanji.to_string(),
            status: self.progress.status(kanji).into(),
        }))
    }
}
