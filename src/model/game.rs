use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GameCategory {
    Memory,
    Numerical,
    Logical,
    Verbal,
    Spatial,
    Attention,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Built-in game metadata. The mini-games themselves live in the web client.
#[derive(Debug, Clone, Copy)]
pub struct GameMeta {
    pub id: &'static str,
    pub name: &'static str,
    pub category: GameCategory,
    pub difficulty: Difficulty,
    pub description: &'static str,
    pub max_score: u32,
}

pub static CATALOG: &[GameMeta] = &[
    GameMeta { id: "memory-match", name: "Memory Match", category: GameCategory::Memory, difficulty: Difficulty::Easy, description: "Flip cards and match the pairs in as few moves as possible.", max_score: 100 },
    GameMeta { id: "sequence-recall", name: "Sequence Recall", category: GameCategory::Memory, difficulty: Difficulty::Medium, description: "Repeat a growing sequence of tiles.", max_score: 100 },
    GameMeta { id: "number-series", name: "Number Series", category: GameCategory::Numerical, difficulty: Difficulty::Medium, description: "Find the next number in the series.", max_score: 100 },
    GameMeta { id: "speed-math", name: "Speed Math", category: GameCategory::Numerical, difficulty: Difficulty::Easy, description: "Solve arithmetic problems against the clock.", max_score: 100 },
    GameMeta { id: "logic-grid", name: "Logic Grid", category: GameCategory::Logical, difficulty: Difficulty::Hard, description: "Deduce the arrangement from a set of clues.", max_score: 100 },
    GameMeta { id: "pattern-matrix", name: "Pattern Matrix", category: GameCategory::Logical, difficulty: Difficulty::Medium, description: "Complete the missing cell of a visual matrix.", max_score: 100 },
    GameMeta { id: "word-scramble", name: "Word Scramble", category: GameCategory::Verbal, difficulty: Difficulty::Easy, description: "Unscramble letters to form words.", max_score: 100 },
    GameMeta { id: "shape-rotation", name: "Shape Rotation", category: GameCategory::Spatial, difficulty: Difficulty::Hard, description: "Decide whether two shapes are rotations of each other.", max_score: 100 },
    GameMeta { id: "color-stroop", name: "Color Stroop", category: GameCategory::Attention, difficulty: Difficulty::Medium, description: "Name the ink colour, not the word.", max_score: 100 },
];

static CATALOG_INDEX: Lazy<HashMap<&'static str, &'static GameMeta>> =
    Lazy::new(|| CATALOG.iter().map(|g| (g.id, g)).collect());

impl GameMeta {
    pub fn lookup(id: &str) -> Option<&'static GameMeta> {
        CATALOG_INDEX.get(id).copied()
    }
}

/// Optional dynamic document at `games/{id}` overriding catalog fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Catalog entry with any override applied.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: String,
    pub name: String,
    pub category: GameCategory,
    pub difficulty: Difficulty,
    pub description: String,
    pub max_score: u32,
    pub enabled: bool,
}

impl Game {
    pub fn from_meta(meta: &GameMeta, ov: Option<&GameOverride>) -> Self {
        let ov = ov.cloned().unwrap_or_default();
        Self {
            id: meta.id.to_string(),
            name: ov.name.unwrap_or_else(|| meta.name.to_string()),
            category: meta.category,
            difficulty: ov.difficulty.unwrap_or(meta.difficulty),
            description: ov.description.unwrap_or_else(|| meta.description.to_string()),
            max_score: meta.max_score,
            enabled: ov.enabled.unwrap_or(true),
        }
    }
}
