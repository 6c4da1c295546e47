//! Level table and experience math.
//!
//! Level and title are a pure function of total experience. Nothing else in
//! the crate stores a level without going through [`level_for`].

use serde::Serialize;

/// One row of the level table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelInfo {
    pub level: u32,
    pub title: &'static str,
    /// Experience needed to reach this level
    #[serde(rename = "minXP")]
    pub min_xp: u64,
}

const fn row(level: u32, title: &'static str, min_xp: u64) -> LevelInfo {
    LevelInfo {
        level,
        title,
        min_xp,
    }
}

/// Level thresholds, ascending by `min_xp`.
pub const LEVEL_TABLE: &[LevelInfo] = &[
    row(1, "Apprentice", 0),
    row(2, "Seeker", 100),
    row(3, "Scholar", 300),
    row(4, "Adept", 600),
    row(5, "Keeper", 1000),
    row(6, "Guardian", 1500),
    row(7, "Champion", 2200),
    row(8, "Hero", 3000),
    row(9, "Legend", 4000),
    row(10, "Archmage", 5500),
    row(11, "Mythic", 7500),
    row(12, "Transcendent", 10000),
];

/// Look up the level for a total experience value.
pub fn level_for(total_xp: u64) -> &'static LevelInfo {
    LEVEL_TABLE
        .iter()
        .rev()
        .find(|info| total_xp >= info.min_xp)
        .unwrap_or(&LEVEL_TABLE[0])
}

/// Row for a level number, if it exists.
pub fn level_info(level: u32) -> Option<&'static LevelInfo> {
    LEVEL_TABLE.iter().find(|info| info.level == level)
}

/// Title for a level number; unknown levels fall back to the first title.
pub fn title_for_level(level: u32) -> &'static str {
    level_info(level).unwrap_or(&LEVEL_TABLE[0]).title
}

/// Experience threshold of the level after `level`, `None` at max level.
pub fn xp_for_next_level(level: u32) -> Option<u64> {
    level_info(level + 1).map(|info| info.min_xp)
}

/// Progress inside the current level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XpProgress {
    /// Experience earned since the current level's threshold
    pub current: u64,
    /// Experience span of the current level
    pub required: u64,
    /// Whole percent, 100 at max level
    pub percentage: u8,
}

/// Compute progress towards the next level.
pub fn xp_progress(total_xp: u64) -> XpProgress {
    let current_level = level_for(total_xp);
    let current = total_xp - current_level.min_xp;

    match xp_for_next_level(current_level.level) {
        Some(next_min) => {
            let required = next_min - current_level.min_xp;
            let percentage = (current * 100 / required).min(100) as u8;
            XpProgress {
                current,
                required,
                percentage,
            }
        }
        None => XpProgress {
            current,
            required: current,
            percentage: 100,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_ascending() {
        for pair in LEVEL_TABLE.windows(2) {
            assert!(pair[0].min_xp < pair[1].min_xp);
            assert_eq!(pair[0].level + 1, pair[1].level);
        }
    }

    #[test]
    fn level_boundaries() {
        assert_eq!(level_for(0).level, 1);
        assert_eq!(level_for(99).level, 1);
        assert_eq!(level_for(100).level, 2);
        assert_eq!(level_for(105).title, "Seeker");
        assert_eq!(level_for(9_999).level, 11);
        assert_eq!(level_for(10_000).level, 12);
        assert_eq!(level_for(u64::MAX).title, "Transcendent");
    }

    #[test]
    fn next_level_threshold() {
        assert_eq!(xp_for_next_level(1), Some(100));
        assert_eq!(xp_for_next_level(11), Some(10_000));
        assert_eq!(xp_for_next_level(12), None);
    }

    #[test]
    fn progress_within_level() {
        let progress = xp_progress(450);
        assert_eq!(progress.current, 150);
        assert_eq!(progress.required, 300);
        assert_eq!(progress.percentage, 50);
    }

    #[test]
    fn progress_at_max_level() {
        let progress = xp_progress(12_000);
        assert_eq!(progress.current, 2_000);
        assert_eq!(progress.percentage, 100);
    }

    #[test]
    fn unknown_level_title_falls_back() {
        assert_eq!(title_for_level(42), "Apprentice");
        assert_eq!(title_for_level(3), "Scholar");
    }
}
