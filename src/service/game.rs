//! Word-search game configuration attached to every new instance.

use serde::Serialize;

pub const DEFAULT_BOARD_SIZE: u32 = 10;
pub const MIN_BOARD_SIZE: u32 = 5;
pub const MAX_BOARD_SIZE: u32 = 20;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_WORDS: [&str; 5] = ["APSI", "INVENIRA", "FACADE", "ADAPTER", "PROXY"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameConfig {
    pub size: u32,
    pub words: Vec<String>,
    pub seed: u64,
}

/// Builds [`GameConfig`] values. Output is deterministic: the same builder
/// always yields the same board parameters.
#[derive(Debug, Clone)]
pub struct GameConfigBuilder {
    size: u32,
    words: Vec<String>,
    seed: u64,
}

impl GameConfigBuilder {
    pub fn new() -> Self {
        Self {
            size: DEFAULT_BOARD_SIZE,
            words: DEFAULT_WORDS.iter().map(|w| w.to_string()).collect(),
            seed: DEFAULT_SEED,
        }
    }

    /// Board size, clamped to the supported range.
    pub fn size(mut self, size: u32) -> Self {
        self.size = size.clamp(MIN_BOARD_SIZE, MAX_BOARD_SIZE);
        self
    }

    /// Replace the word list. An empty list keeps the defaults.
    pub fn words<I, W>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = W>,
        W: Into<String>,
    {
        let words: Vec<String> = words.into_iter().map(Into::into).collect();
        if !words.is_empty() {
            self.words = words;
        }
        self
    }

    pub fn build(&self) -> GameConfig {
        GameConfig {
            size: self.size,
            words: self.words.clone(),
            seed: self.seed,
        }
    }

    /// The configuration as the opaque blob stored on an instance.
    pub fn build_value(&self) -> serde_json::Value {
        let config = self.build();
        serde_json::json!({
            "size": config.size,
            "words": config.words,
            "seed": config.seed,
        })
    }

    /// Parameter schema advertised to the platform.
    pub fn params_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "activity": "Word Search",
            "params": [
                {
                    "name": "size",
                    "type": "int",
                    "default": DEFAULT_BOARD_SIZE,
                    "min": MIN_BOARD_SIZE,
                    "max": MAX_BOARD_SIZE,
                },
                {
                    "name": "words",
                    "type": "list[str]",
                    "default": DEFAULT_WORDS,
                },
            ],
        })
    }
}

impl Default for GameConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
