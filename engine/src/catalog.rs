//! Static catalogs: achievements, rewards, games, shop items and the
//! threshold rules that unlock achievements automatically.

use crate::stats::{StatBag, StatValue};
use serde::Serialize;

/// An unlockable achievement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Experience granted on unlock
    #[serde(rename = "xpBonus")]
    pub xp_bonus: u64,
    /// Hidden from listings until unlocked
    pub secret: bool,
}

const fn achievement(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    xp_bonus: u64,
) -> Achievement {
    Achievement {
        id,
        name,
        description,
        xp_bonus,
        secret: false,
    }
}

const fn secret(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    xp_bonus: u64,
) -> Achievement {
    Achievement {
        id,
        name,
        description,
        xp_bonus,
        secret: true,
    }
}

pub const ACHIEVEMENTS: &[Achievement] = &[
    // General
    achievement("first_game", "First Steps", "Play your first game", 10),
    achievement("streak_3", "On Fire", "3 day play streak", 25),
    achievement("streak_7", "Dedicated", "7 day play streak", 50),
    achievement("streak_14", "Unstoppable", "14 day play streak", 100),
    achievement("level_5", "Rising Star", "Reach level 5", 50),
    achievement("level_10", "Archmage", "Reach level 10", 100),
    achievement("coins_500", "Coin Collector", "Earn 500 lifetime coins", 25),
    achievement("coins_2000", "Treasure Hunter", "Earn 2000 lifetime coins", 75),
    // Spell Siege
    achievement("ss_first_win", "Castle Defender", "Win a game of Spell Siege", 15),
    achievement("ss_wave_10", "Wave Master", "Reach wave 10 in Spell Siege", 30),
    achievement("ss_words_100", "Spell Slinger", "Spell 100 words in Spell Siege", 40),
    achievement("ss_perfect_wave", "Flawless", "Complete a wave with no mistakes", 20),
    // Canada Adventure
    achievement("ca_first_battle", "Brave Explorer", "Win your first battle", 15),
    achievement("ca_all_regions", "True Canadian", "Unlock all 7 regions", 75),
    achievement("ca_combo_5", "Combo King", "Get a 5x combo", 25),
    achievement("ca_questions_50", "Knowledge Seeker", "Answer 50 questions correctly", 35),
    // Word Forge
    achievement("wf_first_craft", "Apprentice Smith", "Craft your first item", 15),
    achievement("wf_legendary", "Master Forger", "Craft a legendary item", 50),
    achievement("wf_collection_10", "Collector", "Collect 10 different items", 30),
    // Lumina Racer
    achievement("lr_first_race", "Speed Demon", "Complete your first race", 15),
    achievement("lr_win_5", "Racing Champion", "Win 5 races", 40),
    // Secret
    secret("secret_night", "Night Owl", "Play after 8 PM", 10),
    secret("secret_weekend", "Weekend Warrior", "Play on Saturday and Sunday", 15),
];

pub fn achievement_by_id(id: &str) -> Option<&'static Achievement> {
    ACHIEVEMENTS.iter().find(|a| a.id == id)
}

/// A stat threshold that unlocks an achievement when a game ends.
#[derive(Debug, Clone, Copy)]
pub struct StatRule {
    pub game_id: &'static str,
    pub stat: &'static str,
    pub threshold: i64,
    pub achievement_id: &'static str,
}

const fn rule(
    game_id: &'static str,
    stat: &'static str,
    threshold: i64,
    achievement_id: &'static str,
) -> StatRule {
    StatRule {
        game_id,
        stat,
        threshold,
        achievement_id,
    }
}

pub const GAME_RULES: &[StatRule] = &[
    rule("spellSiege", "gamesWon", 1, "ss_first_win"),
    rule("spellSiege", "highWave", 10, "ss_wave_10"),
    rule("spellSiege", "wordsSpelled", 100, "ss_words_100"),
    rule("spellSiege", "perfectWaves", 1, "ss_perfect_wave"),
    rule("canadaAdventure", "enemiesDefeated", 1, "ca_first_battle"),
    rule("canadaAdventure", "regionsUnlocked", 7, "ca_all_regions"),
    rule("canadaAdventure", "maxCombo", 5, "ca_combo_5"),
    rule("canadaAdventure", "questionsCorrect", 50, "ca_questions_50"),
    rule("wordForge", "itemsCrafted", 1, "wf_first_craft"),
    rule("wordForge", "legendariesCrafted", 1, "wf_legendary"),
    rule("wordForge", "itemsCrafted", 10, "wf_collection_10"),
    rule("luminaRacer", "gamesPlayed", 1, "lr_first_race"),
    rule("luminaRacer", "racesWon", 5, "lr_win_5"),
];

/// Achievements earned by a game's stat bag.
pub fn earned_game_achievements<'a>(
    game_id: &'a str,
    stats: &'a StatBag,
) -> impl Iterator<Item = &'static str> + 'a {
    GAME_RULES
        .iter()
        .filter(move |r| r.game_id == game_id)
        .filter(move |r| {
            stats
                .get(r.stat)
                .and_then(StatValue::as_i64)
                .is_some_and(|v| v >= r.threshold)
        })
        .map(|r| r.achievement_id)
}

/// Profile-wide thresholds: (minimum, achievement id).
pub const LEVEL_MILESTONES: &[(u64, &str)] = &[(5, "level_5"), (10, "level_10")];
pub const COIN_MILESTONES: &[(u64, &str)] = &[(500, "coins_500"), (2000, "coins_2000")];
pub const STREAK_MILESTONES: &[(u64, &str)] = &[(3, "streak_3"), (7, "streak_7"), (14, "streak_14")];

/// A real-world reward purchasable with reward points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub id: &'static str,
    pub name: &'static str,
    pub points: u64,
    pub category: &'static str,
}

pub const REWARDS: &[Reward] = &[
    Reward { id: "game_15", name: "Screen Time (15 min)", points: 100, category: "gaming" },
    Reward { id: "game_30", name: "Screen Time (30 min)", points: 200, category: "gaming" },
    Reward { id: "game_60", name: "Screen Time (1 hour)", points: 350, category: "gaming" },
    Reward { id: "movie_pick", name: "Pick Movie Night", points: 250, category: "family" },
    Reward { id: "dinner_pick", name: "Pick Dinner", points: 300, category: "family" },
    Reward { id: "stay_up_30", name: "Stay Up 30 min Late", points: 350, category: "privilege" },
    Reward { id: "treat", name: "Special Treat", points: 150, category: "treat" },
    Reward { id: "skip_chore", name: "Skip One Chore", points: 400, category: "privilege" },
    Reward { id: "friend_playdate", name: "Friend Playdate", points: 500, category: "social" },
];

pub fn reward_by_id(id: &str) -> Option<&'static Reward> {
    REWARDS.iter().find(|r| r.id == id)
}

/// A game known to the hub and the stat bag a fresh profile starts with.
#[derive(Debug, Clone, Copy)]
pub struct Game {
    pub id: &'static str,
    pub name: &'static str,
    default_stats: &'static [(&'static str, DefaultStat)],
}

#[derive(Debug, Clone, Copy)]
enum DefaultStat {
    Zero,
    One,
    Unset,
}

impl Game {
    pub fn default_stats(&self) -> StatBag {
        self.default_stats
            .iter()
            .map(|(field, value)| {
                let value = match value {
                    DefaultStat::Zero => StatValue::Int(0),
                    DefaultStat::One => StatValue::Int(1),
                    DefaultStat::Unset => StatValue::Null,
                };
                (field.to_string(), value)
            })
            .collect()
    }
}

use DefaultStat::{One, Unset, Zero};

pub const GAMES: &[Game] = &[
    Game {
        id: "spellSiege",
        name: "Spell Siege",
        default_stats: &[
            ("highScore", Zero),
            ("highWave", Zero),
            ("gamesPlayed", Zero),
            ("gamesWon", Zero),
            ("wordsSpelled", Zero),
            ("perfectWaves", Zero),
        ],
    },
    Game {
        id: "canadaAdventure",
        name: "Canada Adventure",
        default_stats: &[
            ("highScore", Zero),
            ("gamesPlayed", Zero),
            ("questionsCorrect", Zero),
            ("questionsTotal", Zero),
            ("regionsUnlocked", One),
            ("enemiesDefeated", Zero),
            ("maxCombo", Zero),
        ],
    },
    Game {
        id: "wordForge",
        name: "Word Forge",
        default_stats: &[
            ("highScore", Zero),
            ("gamesPlayed", Zero),
            ("itemsCrafted", Zero),
            ("legendariesCrafted", Zero),
            ("wordsSpelled", Zero),
        ],
    },
    Game {
        id: "luminaRacer",
        name: "Lumina Racer",
        default_stats: &[
            ("bestTime", Unset),
            ("gamesPlayed", Zero),
            ("racesWon", Zero),
            ("wordsTyped", Zero),
        ],
    },
    Game {
        id: "mathQuest",
        name: "Math Quest",
        default_stats: &[
            ("highScore", Zero),
            ("gamesPlayed", Zero),
            ("questionsCorrect", Zero),
        ],
    },
    Game {
        id: "rhythmAcademy",
        name: "Rhythm Academy",
        default_stats: &[("highScore", Zero), ("gamesPlayed", Zero), ("maxCombo", Zero)],
    },
];

pub fn game_by_id(id: &str) -> Option<&'static Game> {
    GAMES.iter().find(|g| g.id == id)
}

/// What owning a shop item means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemKind {
    /// Consumable, counted
    PowerUp,
    /// Permanent hub theme
    Theme,
    /// Permanent avatar cosmetic
    Cosmetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopItem {
    pub id: &'static str,
    pub name: &'static str,
    pub price: u64,
    pub kind: ItemKind,
}

pub const SHOP_ITEMS: &[ShopItem] = &[
    ShopItem { id: "hint", name: "Hint Scroll", price: 20, kind: ItemKind::PowerUp },
    ShopItem { id: "shield", name: "Castle Shield", price: 35, kind: ItemKind::PowerUp },
    ShopItem { id: "double_xp", name: "Double XP Potion", price: 60, kind: ItemKind::PowerUp },
    ShopItem { id: "extra_life", name: "Extra Life", price: 45, kind: ItemKind::PowerUp },
    ShopItem { id: "theme_ocean", name: "Ocean Theme", price: 150, kind: ItemKind::Theme },
    ShopItem { id: "theme_forest", name: "Forest Theme", price: 150, kind: ItemKind::Theme },
    ShopItem { id: "theme_galaxy", name: "Galaxy Theme", price: 300, kind: ItemKind::Theme },
    ShopItem { id: "hat_wizard", name: "Wizard Hat", price: 120, kind: ItemKind::Cosmetic },
    ShopItem { id: "cape_star", name: "Star Cape", price: 200, kind: ItemKind::Cosmetic },
];

pub fn shop_item_by_id(id: &str) -> Option<&'static ShopItem> {
    SHOP_ITEMS.iter().find(|i| i.id == id)
}

/// A daily challenge template.
#[derive(Debug, Clone, Copy)]
pub struct ChallengeTemplate {
    pub id: &'static str,
    pub game_id: &'static str,
    pub stat: &'static str,
    pub target: u64,
    pub reward_coins: u64,
    pub description: &'static str,
}

pub const CHALLENGE_TEMPLATES: &[ChallengeTemplate] = &[
    ChallengeTemplate { id: "ss_words_20", game_id: "spellSiege", stat: "wordsSpelled", target: 20, reward_coins: 25, description: "Spell 20 words in Spell Siege" },
    ChallengeTemplate { id: "ss_wave_5", game_id: "spellSiege", stat: "highWave", target: 5, reward_coins: 30, description: "Reach wave 5 in Spell Siege" },
    ChallengeTemplate { id: "ca_questions_10", game_id: "canadaAdventure", stat: "questionsCorrect", target: 10, reward_coins: 25, description: "Answer 10 questions in Canada Adventure" },
    ChallengeTemplate { id: "wf_craft_3", game_id: "wordForge", stat: "itemsCrafted", target: 3, reward_coins: 20, description: "Craft 3 items in Word Forge" },
    ChallengeTemplate { id: "lr_words_50", game_id: "luminaRacer", stat: "wordsTyped", target: 50, reward_coins: 30, description: "Type 50 words in Lumina Racer" },
    ChallengeTemplate { id: "mq_correct_15", game_id: "mathQuest", stat: "questionsCorrect", target: 15, reward_coins: 25, description: "Solve 15 problems in Math Quest" },
    ChallengeTemplate { id: "ra_combo_20", game_id: "rhythmAcademy", stat: "maxCombo", target: 20, reward_coins: 35, description: "Hit a 20 note combo in Rhythm Academy" },
];
