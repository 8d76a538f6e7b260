//! Pack store: batches of images waiting for, or holding, generated cards.
//!
//! Lifecycle is `processing -> ready -> opened`, never backwards. A pack
//! becomes `ready` only once every member hash is in the card cache, and
//! packs are never deleted.

use std::collections::HashMap;

use serde::Deserialize;

use super::cards::CardQuery;
use super::now_millis;
use crate::connection::Connection;
use crate::error::{CardGenError, Result};
use crate::models::{CardData, Pack, PackItem, PackStatus};
use crate::sql_builder::SqlBuilder;

#[derive(Debug, Deserialize)]
struct PackRow {
    id: String,
    created_at: i64,
    status: String,
}

#[derive(Debug, Deserialize)]
struct PackItemRow {
    pack_id: String,
    locator: String,
    hash: String,
}

/// Result of opening a pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedPack {
    pub pack: Pack,
    /// Items paired with their cards, in pack order.
    pub cards: Vec<(PackItem, CardData)>,
    /// `true` only for the call that moved the pack from `ready` to `opened`.
    pub first_open: bool,
}

// ---------------------------------------------------------------------------
// PackQuery
// ---------------------------------------------------------------------------

/// Query interface for the `packs` and `pack_items` tables.
pub struct PackQuery<'a> {
    conn: &'a Connection,
}

impl<'a> PackQuery<'a> {
    /// Create a new `PackQuery` bound to the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Store a new pack in `processing` state.
    pub fn create(&self, items: Vec<PackItem>) -> Result<Pack> {
        if items.is_empty() {
            return Err(CardGenError::InvalidArgument(
                "A pack needs at least one image".into(),
            ));
        }

        let pack = Pack {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now_millis(),
            status: PackStatus::Processing,
            items,
        };

        self.conn.transaction(|conn| {
            conn.execute_write(
                "INSERT INTO packs (id, created_at, status) VALUES (?, ?, ?)",
                &[&pack.id, &pack.created_at, &pack.status.as_str()],
            )?;
            for (slot, item) in pack.items.iter().enumerate() {
                let slot = i64::try_from(slot).map_err(|_| {
                    CardGenError::InvalidArgument(format!("Pack slot {} out of range", slot))
                })?;
                conn.execute_write(
                    "INSERT INTO pack_items (pack_id, slot, locator, hash) VALUES (?, ?, ?, ?)",
                    &[&pack.id, &slot, &item.locator, &item.hash],
                )?;
            }
            Ok(())
        })?;

        log::info!("Created pack {} with {} items", pack.id, pack.items.len());
        Ok(pack)
    }

    /// All packs, newest first.
    pub fn list(&self) -> Result<Vec<Pack>> {
        self.load(None)
    }

    /// Packs currently in `status`, newest first.
    pub fn list_by_status(&self, status: PackStatus) -> Result<Vec<Pack>> {
        self.load(Some(("status", status.as_str())))
    }

    pub fn get(&self, id: &str) -> Result<Option<Pack>> {
        Ok(self.load(Some(("id", id)))?.into_iter().next())
    }

    /// Move a pack to `status`, enforcing the one-way lifecycle.
    ///
    /// Promoting to `ready` additionally requires every item to be cached.
    /// Setting the current status again is a no-op.
    pub fn update_status(&self, id: &str, status: PackStatus) -> Result<Pack> {
        let mut pack = self.require(id)?;
        if pack.status == status {
            return Ok(pack);
        }
        if !pack.status.can_transition_to(status) {
            return Err(CardGenError::InvalidState(format!(
                "Pack {} cannot go from {} to {}",
                id, pack.status, status
            )));
        }
        if status == PackStatus::Ready && !self.all_cached(&pack)? {
            return Err(CardGenError::InvalidState(format!(
                "Pack {} still has items without cards",
                id
            )));
        }

        if self.swap_status(id, pack.status, status)? {
            log::info!("Pack {}: {} -> {}", id, pack.status, status);
            pack.status = status;
            Ok(pack)
        } else {
            // Lost a race with another handle; report what is stored now.
            self.require(id)
        }
    }

    /// Promote a `processing` pack to `ready` if every item has a card.
    ///
    /// Returns the pack's status after the check. Opened packs are untouched.
    pub fn check_readiness(&self, id: &str) -> Result<PackStatus> {
        let pack = self.require(id)?;
        if pack.status != PackStatus::Processing || !self.all_cached(&pack)? {
            return Ok(pack.status);
        }
        if self.swap_status(id, PackStatus::Processing, PackStatus::Ready)? {
            log::info!("Pack {} is ready", id);
            return Ok(PackStatus::Ready);
        }
        Ok(self.require(id)?.status)
    }

    /// Ids of `processing` packs that include `hash`.
    pub fn packs_containing(&self, hash: &str) -> Result<Vec<String>> {
        let rows = self.conn.execute(
            "SELECT DISTINCT p.id, p.created_at FROM packs p \
             JOIN pack_items i ON i.pack_id = p.id \
             WHERE p.status = ? AND i.hash = ? \
             ORDER BY p.created_at",
            &[PackStatus::Processing.as_str().to_string(), hash.to_string()],
        )?;
        Ok(rows
            .into_iter()
            .filter_map(|r| r.get("id").and_then(|v| v.as_str()).map(|s| s.to_string()))
            .collect())
    }

    /// Items of `processing` packs whose hash is not cached yet, oldest pack
    /// first and one entry per hash.
    pub fn pending_items(&self) -> Result<Vec<PackItem>> {
        let mut packs = self.list_by_status(PackStatus::Processing)?;
        packs.reverse();

        let cards = CardQuery::new(self.conn);
        let mut seen: Vec<String> = Vec::new();
        let mut pending = Vec::new();
        for pack in packs {
            let hashes: Vec<&str> = pack.hashes().collect();
            let missing = cards.missing(&hashes)?;
            for item in pack.items {
                if missing.contains(&item.hash) && !seen.contains(&item.hash) {
                    seen.push(item.hash.clone());
                    pending.push(item);
                }
            }
        }
        Ok(pending)
    }

    /// Open a pack and return its cards.
    ///
    /// A `ready` pack becomes `opened`; an already opened pack can be viewed
    /// again. A pack still `processing` cannot be opened.
    pub fn open(&self, id: &str) -> Result<OpenedPack> {
        let mut pack = self.require(id)?;
        let first_open = match pack.status {
            PackStatus::Processing => {
                return Err(CardGenError::InvalidState(format!(
                    "Pack {} is still processing",
                    id
                )))
            }
            PackStatus::Ready => {
                let swapped = self.swap_status(id, PackStatus::Ready, PackStatus::Opened)?;
                if swapped {
                    log::info!("Pack {} opened", id);
                }
                pack.status = PackStatus::Opened;
                swapped
            }
            PackStatus::Opened => false,
        };

        let card_query = CardQuery::new(self.conn);
        let mut cards = Vec::with_capacity(pack.items.len());
        for item in &pack.items {
            let card = card_query.get(&item.hash)?.ok_or_else(|| {
                CardGenError::NotFound(format!("No card cached for {}", item.hash))
            })?;
            cards.push((item.clone(), card));
        }

        Ok(OpenedPack {
            pack,
            cards,
            first_open,
        })
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn require(&self, id: &str) -> Result<Pack> {
        self.get(id)?
            .ok_or_else(|| CardGenError::NotFound(format!("Pack {}", id)))
    }

    fn all_cached(&self, pack: &Pack) -> Result<bool> {
        let hashes: Vec<&str> = pack.hashes().collect();
        Ok(CardQuery::new(self.conn).missing(&hashes)?.is_empty())
    }

    /// Compare-and-set on the stored status. Returns whether a row changed.
    fn swap_status(&self, id: &str, from: PackStatus, to: PackStatus) -> Result<bool> {
        let changed = self.conn.execute_write(
            "UPDATE packs SET status = ? WHERE id = ? AND status = ?",
            &[&to.as_str(), &id, &from.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Load packs with their items, optionally filtered on one column.
    fn load(&self, filter: Option<(&str, &str)>) -> Result<Vec<Pack>> {
        let mut qb = SqlBuilder::new("packs");
        qb.select(&["id", "created_at", "status"])
            .order_by(&["created_at DESC", "rowid DESC"]);
        if let Some((column, value)) = filter {
            qb.where_eq(column, value);
        }
        let (sql, params) = qb.build();
        let rows: Vec<PackRow> = self.conn.execute_into(&sql, &params)?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        let (sql, params) = SqlBuilder::new("pack_items")
            .select(&["pack_id", "locator", "hash"])
            .where_in("pack_id", &ids)
            .order_by(&["pack_id", "slot"])
            .build();
        let item_rows: Vec<PackItemRow> = self.conn.execute_into(&sql, &params)?;

        let mut items_by_pack: HashMap<String, Vec<PackItem>> = HashMap::new();
        for row in item_rows {
            items_by_pack.entry(row.pack_id).or_default().push(PackItem {
                locator: row.locator,
                hash: row.hash,
            });
        }

        rows.into_iter()
            .map(|row| -> Result<Pack> {
                Ok(Pack {
                    items: items_by_pack.remove(&row.id).unwrap_or_default(),
                    status: row.status.parse()?,
                    id: row.id,
                    created_at: row.created_at,
                })
            })
            .collect()
    }
}
