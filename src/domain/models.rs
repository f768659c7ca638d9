// Domain models shared by the catalog, the stores and the HTTP layer

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    #[default]
    NotVisited,
    Learning,
    Learned,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::NotVisited => "not_visited",
            ProgressStatus::Learning => "learning",
            ProgressStatus::Learned => "learned",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_visited" => Ok(ProgressStatus::NotVisited),
            "learning" => Ok(ProgressStatus::Learning),
            "learned" => Ok(ProgressStatus::Learned),
            other => Err(anyhow::anyhow!("unknown progress status: {other}")),
        }
    }
}

/// Kanji character -> status. Keys absent from the map are `NotVisited`,
/// and `NotVisited` is never stored explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressMap(BTreeMap<String, ProgressStatus>);

impl ProgressMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, kanji: &str) -> ProgressStatus {
        self.0.get(kanji).copied().unwrap_or_default()
    }

    /// Returns a copy of the map with `kanji` set to `status`.
    pub fn with_status(&self, kanji: &str, status: ProgressStatus) -> Self {
        let mut next = self.clone();
        next.insert(kanji.to_string(), status);
        next
    }

    pub fn insert(&mut self, kanji: String, status: ProgressStatus) {
        if status == ProgressStatus::NotVisited {
            self.0.remove(&kanji);
        } else {
            self.0.insert(kanji, status);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ProgressStatus)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn entries(&self) -> Vec<(String, ProgressStatus)> {
        self.0.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }
}

impl FromIterator<(String, ProgressStatus)> for ProgressMap {
    fn from_iter<I: IntoIterator<Item = (String, ProgressStatus)>>(iter: I) -> Self {
        let mut map = ProgressMap::new();
        for (kanji, status) in iter {
            map.insert(kanji, status);
        }
        map
    }
}

/// Signed-in user as seen by the synchronizer and the remote store.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub access_token: String,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Authenticated session issued by the auth backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id,
            email: self.email.clone(),
            access_token: self.access_token.clone(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JlptLevel {
    N5,
    N4,
    N3,
    N2,
    N1,
}

impl JlptLevel {
    /// Easiest first, the order the levels are presented in.
    pub const ALL: [JlptLevel; 5] = [
        JlptLevel::N5,
        JlptLevel::N4,
        JlptLevel::N3,
        JlptLevel::N2,
        JlptLevel::N1,
    ];

    pub fn from_number(n: i64) -> Option<Self> {
        match n {
            5 => Some(JlptLevel::N5),
            4 => Some(JlptLevel::N4),
            3 => Some(JlptLevel::N3),
            2 => Some(JlptLevel::N2),
            1 => Some(JlptLevel::N1),
            _ => None,
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            JlptLevel::N5 => 5,
            JlptLevel::N4 => 4,
            JlptLevel::N3 => 3,
            JlptLevel::N2 => 2,
            JlptLevel::N1 => 1,
        }
    }
}

impl fmt::Display for JlptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.number())
    }
}

impl FromStr for JlptLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('N')
            .or_else(|| trimmed.strip_prefix('n'))
            .unwrap_or(trimmed);
        digits
            .parse::<i64>()
            .ok()
            .and_then(JlptLevel::from_number)
            .ok_or_else(|| anyhow::anyhow!("invalid JLPT level: {s}"))
    }
}

/// Vocabulary using the kanji, shown in the detail view.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KanjiExample {
    pub word: String,
    pub reading: String,
    pub meaning: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KanjiItem {
    pub char: String,
    pub level: JlptLevel,
    pub meanings: Vec<String>,
    pub on_readings: Vec<String>,
    pub kun_readings: Vec<String>,
    pub strokes: Option<u32>,
    pub grade: Option<u32>,
    pub frequency: Option<u32>,
    pub examples: Vec<KanjiExample>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelStats {
    pub level: JlptLevel,
    pub learned: usize,
    pub studying: usize,
    pub unexplored: usize,
    pub total: usize,
    pub percentage: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressOverview {
    pub levels: Vec<LevelStats>,
    pub learned: usize,
    pub studying: usize,
    pub unexplored: usize,
    pub total: usize,
    pub percentage: u8,
}
