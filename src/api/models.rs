use std::collections::BTreeMap;

use poem_openapi::{ApiResponse, Enum, Object, payload::Json, payload::PlainText};
use uuid::Uuid;

use crate::{
    catalog::stroke_order_url,
    domain::models::{
        Identity, KanjiExample, KanjiItem, LevelStats, ProgressOverview, ProgressStatus,
    },
    sync::AuthOutcome,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
#[oai(rename_all = "snake_case")]
pub enum ProgressStatusDto {
    NotVisited,
    Learning,
    Learned,
}

impl From<ProgressStatus> for ProgressStatusDto {
    fn from(status: ProgressStatus) -> Self {
        match status {
            ProgressStatus::NotVisited => ProgressStatusDto::NotVisited,
            ProgressStatus::Learning => ProgressStatusDto::Learning,
            ProgressStatus::Learned => ProgressStatusDto::Learned,
        }
    }
}

impl From<ProgressStatusDto> for ProgressStatus {
    fn from(status: ProgressStatusDto) -> Self {
        match status {
            ProgressStatusDto::NotVisited => ProgressStatus::NotVisited,
            ProgressStatusDto::Learning => ProgressStatus::Learning,
            ProgressStatusDto::Learned => ProgressStatus::Learned,
        }
    }
}

#[derive(Debug, Clone, Object)]
pub struct KanjiItemDto {
    pub kanji: String,
    /// "N5" .. "N1"
    pub level: String,
    pub meanings: Vec<String>,
    pub on_readings: Vec<String>,
    pub kun_readings: Vec<String>,
    pub status: ProgressStatusDto,
}

impl KanjiItemDto {
    pub fn new(item: &KanjiItem, status: ProgressStatus) -> Self {
        Self {
            kanji: item.char.clone(),
            level: item.level.to_string(),
            meanings: item.meanings.clone(),
            on_readings: item.on_readings.clone(),
            kun_readings: item.kun_readings.clone(),
            status: status.into(),
        }
    }
}

#[derive(Debug, Clone, Object)]
pub struct KanjiExampleDto {
    pub word: String,
    pub reading: String,
    pub meaning: String,
}

impl From<&KanjiExample> for KanjiExampleDto {
    fn from(e: &KanjiExample) -> Self {
        Self {
            word: e.word.clone(),
            reading: e.reading.clone(),
            meaning: e.meaning.clone(),
        }
    }
}

#[derive(Debug, Clone, Object)]
pub struct KanjiDetailDto {
    #[oai(flatten)]
    pub item: KanjiItemDto,
    pub strokes: Option<u32>,
    pub grade: Option<u32>,
    pub frequency: Option<u32>,
    /// KanjiVG SVG used for the stroke-order animation
    pub stroke_order_url: String,
    pub examples: Vec<KanjiExampleDto>,
}

impl KanjiDetailDto {
    pub fn new(item: &KanjiItem, status: ProgressStatus) -> Self {
        Self {
            item: KanjiItemDto::new(item, status),
            strokes: item.strokes,
            grade: item.grade,
            frequency: item.frequency,
            stroke_order_url: stroke_order_url(&item.char),
            examples: item.examples.iter().map(KanjiExampleDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Object)]
pub struct ProgressEntryDto {
    pub kanji: String,
    pub status: ProgressStatusDto,
}

#[derive(Debug, Clone, Object)]
pub struct LevelStatsDto {
    pub level: String,
    pub learned: u32,
    pub studying: u32,
    pub unexplored: u32,
    pub total: u32,
    pub percentage: u8,
}

impl From<&LevelStats> for LevelStatsDto {
    fn from(s: &LevelStats) -> Self {
        Self {
            level: s.level.to_string(),
            learned: s.learned as u32,
            studying: s.studying as u32,
            unexplored: s.unexplored as u32,
            total: s.total as u32,
            percentage: s.percentage,
        }
    }
}

#[derive(Debug, Clone, Object)]
pub struct ProgressOverviewDto {
    pub learned: u32,
    pub studying: u32,
    pub unexplored: u32,
    pub total: u32,
    pub percentage: u8,
    pub levels: Vec<LevelStatsDto>,
}

impl From<&ProgressOverview> for ProgressOverviewDto {
    fn from(o: &ProgressOverview) -> Self {
        Self {
            learned: o.learned as u32,
            studying: o.studying as u32,
            unexplored: o.unexplored as u32,
            total: o.total as u32,
            percentage: o.percentage,
            levels: o.levels.iter().map(LevelStatsDto::from).collect(),
        }
    }
}

#[derive(Clone, Object)]
pub struct CredentialsDto {
    pub email: String,
    #[oai(write_only)]
    pub password: String,
}

#[derive(Debug, Clone, Object)]
pub struct AuthOutcomeDto {
    pub ok: bool,
    pub message: Option<String>,
}

impl From<AuthOutcome> for AuthOutcomeDto {
    fn from(o: AuthOutcome) -> Self {
        Self {
            ok: o.ok,
            message: o.message,
        }
    }
}

#[derive(Debug, Clone, Object)]
pub struct SessionDto {
    /// False when no sync backend is configured
    pub sync_available: bool,
    pub signed_in: bool,
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
}

impl SessionDto {
    pub fn new(sync_available: bool, identity: Option<&Identity>) -> Self {
        Self {
            sync_available,
            signed_in: identity.is_some(),
            user_id: identity.map(|i| i.user_id),
            email: identity.and_then(|i| i.email.clone()),
        }
    }
}

#[derive(Debug, Clone, Object)]
pub struct ErrorDto {
    /// Human-readable error message
    pub message: String,
}

impl From<String> for ErrorDto {
    fn from(message: String) -> Self {
        ErrorDto { message }
    }
}

#[derive(ApiResponse)]
pub enum HealthResponse {
    #[oai(status = 200)]
    Ok(PlainText<String>),

    /// The kanji dataset could not be loaded
    #[oai(status = 503)]
    Unavailable(PlainText<String>),
}

#[derive(ApiResponse)]
pub enum KanjiListResponse {
    #[oai(status = 200)]
    Ok(Json<Vec<KanjiItemDto>>),

    /// Unknown JLPT level
    #[oai(status = 404)]
    NotFound(Json<ErrorDto>),

    /// The kanji dataset could not be loaded; reload to retry
    #[oai(status = 503)]
    ServiceUnavailable(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum KanjiDetailResponse {
    #[oai(status = 200)]
    Ok(Json<KanjiDetailDto>),

    #[oai(status = 404)]
    NotFound(Json<ErrorDto>),

    #[oai(status = 503)]
    ServiceUnavailable(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum ProgressMapResponse {
    /// Kanji -> status; kanji not listed are not visited
    #[oai(status = 200)]
    Ok(Json<BTreeMap<String, ProgressStatusDto>>),
}

#[derive(ApiResponse)]
pub enum ProgressStatsResponse {
    #[oai(status = 200)]
    Ok(Json<ProgressOverviewDto>),

    #[oai(status = 503)]
    ServiceUnavailable(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum SetStatusResponse {
    #[oai(status = 200)]
    Ok(Json<ProgressEntryDto>),

    #[oai(status = 400)]
    BadRequest(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum SessionResponse {
    #[oai(status = 200)]
    Ok(Json<SessionDto>),
}

#[derive(ApiResponse)]
pub enum AuthResponse {
    #[oai(status = 200)]
    Ok(Json<AuthOutcomeDto>),

    /// Credentials rejected or sync backend not configured
    #[oai(status = 400)]
    Rejected(Json<AuthOutcomeDto>),
}

#[derive(ApiResponse)]
pub enum NoContentResponse {
    #[oai(status = 204)]
    NoContent,
}
