use serde::{Deserialize, Serialize};

use super::card::{CardData, Rarity};

// ---------------------------------------------------------------------------
// SavedCard — One entry of the draw history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCard {
    pub id: i64,
    pub hash: String,
    pub rarity: Rarity,
    pub name: String,
    pub description: String,
    pub atk: String,
    pub def: String,
    pub image_locator: String,
    /// Milliseconds since the Unix epoch.
    pub saved_at: i64,
}

impl SavedCard {
    pub fn card(&self) -> CardData {
        CardData {
            rarity: self.rarity,
            name: self.name.clone(),
            description: self.description.clone(),
            atk: self.atk.clone(),
            def: self.def.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// DrawResult — Outcome of a single draw
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawResult {
    pub locator: String,
    pub hash: String,
    pub card: CardData,
    /// `true` when the card came from the cache without a generation call.
    pub cached: bool,
}
