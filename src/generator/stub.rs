use std::thread;
use std::time::Duration;

use rand::prelude::*;

use super::CardGenerator;
use crate::error::Result;
use crate::image::ImageData;
use crate::models::{CardData, Rarity};

const NAMES: [&str; 7] = [
    "Blue-Eyes White Developer",
    "Dark Magician of Code",
    "Pot of Greed (But for RAM)",
    "Infinite Loop Dragon",
    "Bug Squash Knight",
    "The Great Firewall",
    "Quantum Cat",
];

const DESCRIPTIONS: [&str; 7] = [
    "When this card is summoned, you can special summon one 'Stack Overflow' token to your opponent's field.",
    "Flip: Destroy all bugs on the field. If you do, draw 2 cards from your repository.",
    "Cannot be destroyed by syntax errors. Once per turn, you can negate a compilation failure.",
    "This card gains 500 ATK for every unclosed parenthesis in your graveyard.",
    "Pay 1000 LP; force your opponent to refactor their entire deck.",
    "When an opponent declares an attack, you can banish this card to restart the server.",
    "If this card is in the superposition state, it is both alive and dead until observed.",
];

/// Offline generator returning random joke cards.
#[derive(Debug, Clone, Default)]
pub struct StubGenerator {
    delay: Duration,
}

impl StubGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long per card to mimic network latency.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

impl CardGenerator for StubGenerator {
    fn generate(&self, _image: &ImageData) -> Result<CardData> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let mut rng = thread_rng();
        let rarity = *Rarity::ALL.choose(&mut rng).unwrap_or(&Rarity::N);
        let name = NAMES.choose(&mut rng).copied().unwrap_or(NAMES[0]);
        let description = DESCRIPTIONS
            .choose(&mut rng)
            .copied()
            .unwrap_or(DESCRIPTIONS[0]);
        Ok(CardData {
            rarity,
            name: name.to_string(),
            description: description.to_string(),
            atk: (rng.gen_range(0..=500) * 10).to_string(),
            def: (rng.gen_range(0..=500) * 10).to_string(),
        })
    }
}
