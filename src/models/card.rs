use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CardGenError;

// ---------------------------------------------------------------------------
// Rarity — Cosmetic tier assigned by the model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rarity {
    N,
    R,
    SR,
    SSR,
    UR,
}

impl Rarity {
    pub const ALL: [Rarity; 5] = [Rarity::N, Rarity::R, Rarity::SR, Rarity::SSR, Rarity::UR];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rarity::N => "N",
            Rarity::R => "R",
            Rarity::SR => "SR",
            Rarity::SSR => "SSR",
            Rarity::UR => "UR",
        }
    }

    /// Lenient parse of free-form model output.
    ///
    /// Looks for the longest codes first so `"SSR!"` is not read as `R`.
    /// Anything unrecognised is `N`.
    pub fn from_model_text(text: &str) -> Self {
        let upper = text.trim().to_uppercase();
        [Rarity::SSR, Rarity::UR, Rarity::SR, Rarity::R, Rarity::N]
            .into_iter()
            .find(|r| upper.contains(r.as_str()))
            .unwrap_or(Rarity::N)
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rarity {
    type Err = CardGenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rarity::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CardGenError::InvalidArgument(format!("Unknown rarity: {}", s)))
    }
}

// ---------------------------------------------------------------------------
// CardData — Generated card, immutable once cached
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardData {
    pub rarity: Rarity,
    pub name: String,
    pub description: String,
    pub atk: String,
    pub def: String,
}

/// Keep only the ASCII digits of a stat value; `"0"` when none remain.
pub fn clean_stat(text: &str) -> String {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        "0".to_string()
    } else {
        digits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rarity_prefers_longest_code() {
        assert_eq!(Rarity::from_model_text("ssr"), Rarity::SSR);
        assert_eq!(Rarity::from_model_text("Rarity: UR"), Rarity::UR);
        assert_eq!(Rarity::from_model_text(" SR\n"), Rarity::SR);
        assert_eq!(Rarity::from_model_text("r"), Rarity::R);
    }

    #[test]
    fn rarity_defaults_to_common() {
        assert_eq!(Rarity::from_model_text(""), Rarity::N);
        assert_eq!(Rarity::from_model_text("epic"), Rarity::N);
    }

    #[test]
    fn rarity_from_str_is_strict() {
        assert_eq!("ssr".parse::<Rarity>().unwrap(), Rarity::SSR);
        assert!("legendary".parse::<Rarity>().is_err());
    }

    #[test]
    fn rarity_serializes_as_code() {
        let json = serde_json::to_string(&Rarity::SSR).unwrap();
        assert_eq!(json, "\"SSR\"");
    }

    #[test]
    fn clean_stat_extracts_digits() {
        assert_eq!(clean_stat("ATK: 2,500"), "2500");
        assert_eq!(clean_stat("none"), "0");
        assert_eq!(clean_stat("1200"), "1200");
    }
}
