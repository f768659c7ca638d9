// Pure progress operations: merging a fetched remote map into the local one and
// summarising a map against the catalog.

use super::models::{JlptLevel, KanjiItem, LevelStats, ProgressMap, ProgressOverview, ProgressStatus};

/// Local entries win on key collision; remote only contributes keys the local
/// map does not have.
pub fn merge_local_over_remote(remote: &ProgressMap, local: &ProgressMap) -> ProgressMap {
    let mut merged = remote.clone();
    for (kanji, status) in local.iter() {
        merged.insert(kanji.to_string(), status);
    }
    merged
}

/// Rounds half up, matching how percentages are shown to the learner.
fn percentage(part: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((part * 200 + total) / (total * 2)).min(100) as u8
}

pub fn level_stats<'a>(
    level: JlptLevel,
    items: impl IntoIterator<Item = &'a KanjiItem>,
    progress: &ProgressMap,
) -> LevelStats {
    let mut learned = 0;
    let mut studying = 0;
    let mut total = 0;
    for item in items {
        total += 1;
        match progress.status(&item.char) {
            ProgressStatus::Learned => learned += 1,
            ProgressStatus::Learning => studying += 1,
            ProgressStatus::NotVisited => {}
        }
    }
    LevelStats {
        level,
        learned,
        studying,
        unexplored: total - learned - studying,
        total,
        percentage: percentage(learned, total),
    }
}

pub fn overview(levels: Vec<LevelStats>) -> ProgressOverview {
    let learned = levels.iter().map(|s| s.learned).sum();
    let studying = levels.iter().map(|s| s.studying).sum();
    let total = levels.iter().map(|s| s.total).sum();
    ProgressOverview {
        learned,
        studying,
        unexplored: total - learned - studying,
        total,
        percentage: percentage(learned, total),
        levels,
    }
}
