//! Library: the user's history of drawn and opened cards.
//!
//! Unlike the card cache, the library may hold the same hash many times,
//! once per draw.

use std::collections::HashMap;

use super::now_millis;
use crate::connection::Connection;
use crate::error::Result;
use crate::models::{CardData, Rarity, SavedCard};
use crate::sql_builder::SqlBuilder;

const LIBRARY_COLUMNS: &[&str] = &[
    "id",
    "hash",
    "rarity",
    "name",
    "description",
    "atk",
    "\"def\"",
    "image_locator",
    "saved_at",
];

/// Parameters for [`LibraryQuery::list`].
#[derive(Debug, Clone)]
pub struct SearchLibraryParams {
    pub rarity: Option<Rarity>,
    /// Case-insensitive substring match on the card name.
    pub name: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for SearchLibraryParams {
    fn default() -> Self {
        Self {
            rarity: None,
            name: None,
            limit: 100,
            offset: 0,
        }
    }
}

/// Query interface for the `library` table.
pub struct LibraryQuery<'a> {
    conn: &'a Connection,
}

impl<'a> LibraryQuery<'a> {
    /// Create a new `LibraryQuery` bound to the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Record a card in the library and return the stored entry.
    pub fn add(&self, hash: &str, card: &CardData, image_locator: &str) -> Result<SavedCard> {
        let saved_at = now_millis();
        let id = self.conn.execute_returning_i64(
            "INSERT INTO library (hash, rarity, name, description, atk, \"def\", image_locator, saved_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
            &[
                &hash,
                &card.rarity.as_str(),
                &card.name,
                &card.description,
                &card.atk,
                &card.def,
                &image_locator,
                &saved_at,
            ],
        )?;
        log::debug!("Saved {} to library as #{}", card.name, id);

        Ok(SavedCard {
            id,
            hash: hash.to_string(),
            rarity: card.rarity,
            name: card.name.clone(),
            description: card.description.clone(),
            atk: card.atk.clone(),
            def: card.def.clone(),
            image_locator: image_locator.to_string(),
            saved_at,
        })
    }

    pub fn get(&self, id: i64) -> Result<Option<SavedCard>> {
        let sql = format!(
            "SELECT {} FROM library WHERE id = CAST(? AS BIGINT)",
            LIBRARY_COLUMNS.join(", ")
        );
        let rows: Vec<SavedCard> = self.conn.execute_into(&sql, &[id.to_string()])?;
        Ok(rows.into_iter().next())
    }

    /// Newest entries first, filtered and paged by `params`.
    pub fn list(&self, params: &SearchLibraryParams) -> Result<Vec<SavedCard>> {
        let mut qb = SqlBuilder::new("library");
        qb.select(LIBRARY_COLUMNS);

        if let Some(rarity) = params.rarity {
            qb.where_eq("rarity", rarity.as_str());
        }
        if let Some(ref name) = params.name {
            qb.where_contains("name", name);
        }

        qb.order_by(&["saved_at DESC", "id DESC"])
            .limit(params.limit)
            .offset(params.offset);

        let (sql, sql_params) = qb.build();
        self.conn.execute_into(&sql, &sql_params)
    }

    /// Total number of library entries.
    pub fn count(&self) -> Result<i64> {
        let value = self.conn.execute_scalar("SELECT COUNT(*) FROM library", &[])?;
        Ok(value.and_then(|v| v.as_i64()).unwrap_or(0))
    }

    /// Number of entries per rarity. Rarities with no entries are absent.
    pub fn rarity_counts(&self) -> Result<HashMap<Rarity, i64>> {
        let (sql, params) = SqlBuilder::new("library")
            .select(&["rarity", "COUNT(*) AS n"])
            .group_by(&["rarity"])
            .build();

        let rows = self.conn.execute(&sql, &params)?;
        let mut counts = HashMap::new();
        for row in rows {
            let rarity = match row.get("rarity").and_then(|v| v.as_str()) {
                Some(text) => text.parse::<Rarity>()?,
                None => continue,
            };
            let n = row.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
            counts.insert(rarity, n);
        }
        Ok(counts)
    }
}
