use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CardGenError;

// ---------------------------------------------------------------------------
// PackStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackStatus {
    Processing,
    Ready,
    Opened,
}

impl PackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackStatus::Processing => "processing",
            PackStatus::Ready => "ready",
            PackStatus::Opened => "opened",
        }
    }

    /// Whether the one-way lifecycle allows moving from `self` to `next`.
    ///
    /// Staying on the same status is always allowed.
    pub fn can_transition_to(&self, next: PackStatus) -> bool {
        matches!(
            (self, next),
            (PackStatus::Processing, PackStatus::Processing)
                | (PackStatus::Processing, PackStatus::Ready)
                | (PackStatus::Ready, PackStatus::Ready)
                | (PackStatus::Ready, PackStatus::Opened)
                | (PackStatus::Opened, PackStatus::Opened)
        )
    }
}

impl fmt::Display for PackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackStatus {
    type Err = CardGenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(PackStatus::Processing),
            "ready" => Ok(PackStatus::Ready),
            "opened" => Ok(PackStatus::Opened),
            other => Err(CardGenError::InvalidArgument(format!(
                "Unknown pack status: {}",
                other
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// PackItem / Pack
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackItem {
    /// File path or `http(s)` URL of the source image.
    pub locator: String,
    /// Content hash of the image bytes.
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pack {
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    pub status: PackStatus,
    pub items: Vec<PackItem>,
}

impl Pack {
    pub fn hashes(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|i| i.hash.as_str())
    }
}
