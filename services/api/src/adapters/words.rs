//! services/api/src/adapters/words.rs
//!
//! An embedded word list implementing the `WordProvider` port. Used only to
//! offer drawing prompts; not part of the game's correctness surface.

use draw_duel_core::WordProvider;
use rand::seq::IndexedRandom;

const WORDS: &[&str] = &[
    "cat", "dog", "house", "tree", "rocket", "pizza", "guitar", "castle", "dragon", "bridge",
    "umbrella", "lighthouse", "penguin", "robot", "bicycle", "volcano", "snowman", "octopus",
    "windmill", "cactus", "airplane", "mermaid", "tornado", "campfire", "anchor", "balloon",
    "ladder", "crown", "spider", "island", "glasses", "hammer", "candle", "rainbow", "whale",
    "pirate", "wizard", "skeleton", "telescope", "mountain",
];

/// Samples distinct prompt words from a compiled-in list.
#[derive(Default)]
pub struct EmbeddedWordList;

impl EmbeddedWordList {
    pub fn new() -> Self {
        Self
    }
}

impl WordProvider for EmbeddedWordList {
    fn pick_random_words(&self, count: usize) -> Vec<String> {
        let mut rng = rand::rng();
        WORDS
            .choose_multiple(&mut rng, count.min(WORDS.len()))
            .map(|w| w.to_string())
            .collect()
    }
}
