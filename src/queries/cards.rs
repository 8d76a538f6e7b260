//! Card cache: generated cards keyed by image content hash.
//!
//! Entries are write-once: inserting a hash that is already cached keeps the
//! first card stored for it.

use serde::{Deserialize, Serialize};

use super::now_millis;
use crate::connection::Connection;
use crate::error::Result;
use crate::models::CardData;
use crate::sql_builder::SqlBuilder;

const CARD_COLUMNS: &[&str] = &["hash", "rarity", "name", "description", "atk", "\"def\"", "created_at"];

/// A cache entry together with its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCard {
    pub hash: String,
    #[serde(flatten)]
    pub card: CardData,
    pub created_at: i64,
}

// ---------------------------------------------------------------------------
// CardQuery
// ---------------------------------------------------------------------------

/// Query interface for the `cards` cache table.
pub struct CardQuery<'a> {
    conn: &'a Connection,
}

impl<'a> CardQuery<'a> {
    /// Create a new `CardQuery` bound to the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Look up the card cached for `hash`.
    pub fn get(&self, hash: &str) -> Result<Option<CardData>> {
        let (sql, params) = SqlBuilder::new("cards")
            .select(CARD_COLUMNS)
            .where_eq("hash", hash)
            .limit(1)
            .build();

        let rows: Vec<CachedCard> = self.conn.execute_into(&sql, &params)?;
        Ok(rows.into_iter().next().map(|c| c.card))
    }

    pub fn contains(&self, hash: &str) -> Result<bool> {
        let value = self
            .conn
            .execute_scalar("SELECT COUNT(*) FROM cards WHERE hash = ?", &[hash.to_string()])?;
        Ok(value.and_then(|v| v.as_i64()).unwrap_or(0) > 0)
    }

    /// Cache `card` under `hash`.
    ///
    /// Returns `false` (and leaves the stored card untouched) if the hash was
    /// already cached.
    pub fn insert(&self, hash: &str, card: &CardData) -> Result<bool> {
        let written = self.conn.execute_write(
            "INSERT INTO cards (hash, rarity, name, description, atk, \"def\", created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) ON CONFLICT DO NOTHING",
            &[
                &hash,
                &card.rarity.as_str(),
                &card.name,
                &card.description,
                &card.atk,
                &card.def,
                &now_millis(),
            ],
        )?;
        if written == 0 {
            log::debug!("Card {} already cached, keeping existing entry", hash);
            return Ok(false);
        }
        log::info!("Cached card {} ({} {})", hash, card.rarity, card.name);
        Ok(true)
    }

    /// Number of cached cards.
    pub fn count(&self) -> Result<i64> {
        let value = self.conn.execute_scalar("SELECT COUNT(*) FROM cards", &[])?;
        Ok(value.and_then(|v| v.as_i64()).unwrap_or(0))
    }

    /// Every cached hash, in no particular order.
    pub fn hashes(&self) -> Result<Vec<String>> {
        let rows = self.conn.execute("SELECT hash FROM cards", &[])?;
        Ok(rows
            .into_iter()
            .filter_map(|r| r.get("hash").and_then(|v| v.as_str()).map(|s| s.to_string()))
            .collect())
    }

    /// Of the given hashes, return those with no cache entry (input order kept).
    pub fn missing(&self, hashes: &[&str]) -> Result<Vec<String>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let (sql, params) = SqlBuilder::new("cards")
            .select(&["hash"])
            .where_in("hash", hashes)
            .build();

        let rows = self.conn.execute(&sql, &params)?;
        let present: Vec<&str> = rows
            .iter()
            .filter_map(|r| r.get("hash").and_then(|v| v.as_str()))
            .collect();

        Ok(hashes
            .iter()
            .filter(|h| !present.contains(*h))
            .map(|h| h.to_string())
            .collect())
    }

    /// Every cached card, newest first.
    pub fn list(&self) -> Result<Vec<CachedCard>> {
        let (sql, params) = SqlBuilder::new("cards")
            .select(CARD_COLUMNS)
            .order_by(&["created_at DESC", "hash"])
            .build();
        self.conn.execute_into(&sql, &params)
    }
}
