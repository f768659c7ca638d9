use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

use anyhow::Context;
use serde::Deserialize;

use crate::domain::models::{JlptLevel, KanjiExample, KanjiItem};

const STROKE_ORDER_BASE: &str = "https://raw.githubusercontent.com/KanjiVG/kanjivg/master/kanji";

/// Record shape of the kanji dataset file (keyed by character).
#[derive(Debug, Deserialize, PartialEq)]
pub struct RawKanjiRecord {
    pub strokes: Option<u32>,
    pub grade: Option<u32>,
    pub freq: Option<u32>,
    pub jlpt_old: Option<i64>,
    pub jlpt_new: Option<i64>,
    #[serde(default)]
    pub meanings: Vec<String>,
    #[serde(default)]
    pub readings_on: Vec<String>,
    #[serde(default)]
    pub readings_kun: Vec<String>,
    #[serde(default)]
    pub examples: Vec<KanjiExample>,
}

/// Static kanji dataset, loaded once and indexed by JLPT level.
#[derive(Debug, Default)]
pub struct KanjiCatalog {
    by_level: HashMap<JlptLevel, Vec<KanjiItem>>,
    load_error: Option<String>,
}

impl KanjiCatalog {
    /// Load the dataset file. Never fails: a broken dataset yields an empty
    /// catalog with `load_failed()` set.
    #[tracing::instrument(level = "debug")]
    pub async fn load(path: &Path) -> Self {
        match Self::read(path).await {
            Ok(catalog) => {
                tracing::info!(
                    path = %path.display(),
                    kanji = catalog.len(),
                    "loaded kanji catalog"
                );
                catalog
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %format!("{:#}", e), "failed to load kanji catalog");
                KanjiCatalog {
                    by_level: HashMap::new(),
                    load_error: Some(format!("{:#}", e)),
                }
            }
        }
    }

    async fn read(path: &Path) -> anyhow::Result<Self> {
        let body = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read kanji dataset {}", path.display()))?;
        Self::from_json(&body)
    }

    pub fn from_json(body: &str) -> anyhow::Result<Self> {
        let raw: BTreeMap<String, RawKanjiRecord> =
            serde_json::from_str(body).context("Failed to parse kanji dataset")?;
        Ok(Self::from_records(raw))
    }

    pub fn from_records(raw: impl IntoIterator<Item = (String, RawKanjiRecord)>) -> Self {
        let mut by_level: HashMap<JlptLevel, Vec<KanjiItem>> = HashMap::new();
        for (char, rec) in raw {
            let Some(level) = rec
                .jlpt_new
                .or(rec.jlpt_old)
                .and_then(JlptLevel::from_number)
            else {
                continue;
            };
            by_level.entry(level).or_default().push(KanjiItem {
                char,
                level,
                meanings: rec.meanings,
                on_readings: rec.readings_on,
                kun_readings: rec.readings_kun,
                strokes: rec.strokes,
                grade: rec.grade,
                frequency: rec.freq,
                examples: rec.examples,
            });
        }
        for items in by_level.values_mut() {
            items.sort_by(|a, b| a.char.cmp(&b.char));
        }
        KanjiCatalog {
            by_level,
            load_error: None,
        }
    }

    pub fn load_failed(&self) -> bool {
        self.load_error.is_some()
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn len(&self) -> usize {
        self.by_level.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn items_for_level(&self, level: JlptLevel) -> &[KanjiItem] {
        self.by_level.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find(&self, kanji: &str) -> Option<&KanjiItem> {
        self.by_level
            .values()
            .flat_map(|items| items.iter())
            .find(|item| item.char == kanji)
    }

    pub fn search(&self, level: JlptLevel, query: &str) -> Vec<&KanjiItem> {
        self.items_for_level(level)
            .iter()
            .filter(|item| matches_search(item, query))
            .collect()
    }
}

/// Case-insensitive substring match over the character, meanings and readings.
pub fn matches_search(item: &KanjiItem, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    item.char.contains(&query)
        || item.meanings.join(" ").to_lowercase().contains(&query)
        || item.on_readings.join(" ").to_lowercase().contains(&query)
        || item.kun_readings.join(" ").to_lowercase().contains(&query)
}

/// KanjiVG stroke-order SVG for the first character of `kanji`.
pub fn stroke_order_url(kanji: &str) -> String {
    let cp = kanji.chars().next().map(u32::from).unwrap_or(0);
    format!("{}/{:05x}.svg", STROKE_ORDER_BASE, cp)
}
