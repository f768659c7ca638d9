use poem_openapi::payload::PlainText;

use crate::{api::models::HealthResponse, catalog::KanjiCatalog};

pub struct HealthService<'a> {
    pub catalog: &'a KanjiCatalog,
}

impl<'a> HealthService<'a> {
    pub fn new(catalog: &'a KanjiCatalog) -> Self {
        Self { catalog }
    }

    pub fn status(&self) -> HealthResponse {
        match self.catalog.load_error() {
            None => HealthResponse::Ok(PlainText(format!("ok kanji={}", self.catalog.len()))),
            Some(e) => HealthResponse::Unavailable(PlainText(format!("catalog unavailable: {e}"))),
        }
    }
}
