//! DuckDB connection wrapper holding the card cache, pack store and library.
//!
//! The database lives in a single file inside the data directory (or in
//! memory for tests). Every table is created on open if missing, so a fresh
//! directory is a valid empty store.

use std::collections::HashMap;
use std::path::Path;

use duckdb::{types::ValueRef, Connection as DuckDbConnection, ToSql};
use serde::de::DeserializeOwned;

use crate::error::Result;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cards (
    hash        VARCHAR PRIMARY KEY,
    rarity      VARCHAR NOT NULL,
    name        VARCHAR NOT NULL,
    description VARCHAR NOT NULL,
    atk         VARCHAR NOT NULL,
    "def"       VARCHAR NOT NULL,
    created_at  BIGINT NOT NULL
);

CREATE TABLE IF NOT EXISTS packs (
    id          VARCHAR PRIMARY KEY,
    created_at  BIGINT NOT NULL,
    status      VARCHAR NOT NULL
);

CREATE TABLE IF NOT EXISTS pack_items (
    pack_id     VARCHAR NOT NULL,
    slot        BIGINT NOT NULL,
    locator     VARCHAR NOT NULL,
    hash        VARCHAR NOT NULL,
    PRIMARY KEY (pack_id, slot)
);

CREATE SEQUENCE IF NOT EXISTS library_id_seq START 1;

CREATE TABLE IF NOT EXISTS library (
    id            BIGINT PRIMARY KEY DEFAULT nextval('library_id_seq'),
    hash          VARCHAR NOT NULL,
    rarity        VARCHAR NOT NULL,
    name          VARCHAR NOT NULL,
    description   VARCHAR NOT NULL,
    atk           VARCHAR NOT NULL,
    "def"         VARCHAR NOT NULL,
    image_locator VARCHAR NOT NULL,
    saved_at      BIGINT NOT NULL
);
"#;

/// Wraps a DuckDB connection with the card store schema applied.
pub struct Connection {
    conn: DuckDbConnection,
}

impl Connection {
    /// Open (or create) the store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = DuckDbConnection::open(path)?;
        log::info!("Opened card store at {}", path.display());
        Self::with_schema(conn)
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_schema(DuckDbConnection::open_in_memory()?)
    }

    fn with_schema(conn: DuckDbConnection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// A second handle on the same database, for use on another thread.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            conn: self.conn.try_clone()?,
        })
    }

    /// Execute SQL and return results as a `Vec` of `HashMap`s.
    ///
    /// Each row is represented as a `HashMap<String, serde_json::Value>`.
    pub fn execute(
        &self,
        sql: &str,
        params: &[String],
    ) -> Result<Vec<HashMap<String, serde_json::Value>>> {
        let mut stmt = self.conn.prepare(sql)?;

        let param_values: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();

        let mut rows = stmt.query(param_values.as_slice())?;

        // Column metadata is only available once the statement has run
        let column_names: Vec<String> = match rows.as_ref() {
            Some(stmt) => stmt.column_names().into_iter().map(|s| s.to_string()).collect(),
            None => Vec::new(),
        };

        let mut out: Vec<HashMap<String, serde_json::Value>> = Vec::new();

        while let Some(row) = rows.next()? {
            let mut map = HashMap::with_capacity(column_names.len());
            for (i, col_name) in column_names.iter().enumerate() {
                map.insert(col_name.clone(), convert_value_ref(row.get_ref(i)?));
            }
            out.push(map);
        }

        Ok(out)
    }

    /// Execute SQL and deserialize each row into type `T`.
    pub fn execute_into<T: DeserializeOwned>(&self, sql: &str, params: &[String]) -> Result<Vec<T>> {
        let rows = self.execute(sql, params)?;
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let value = serde_json::Value::Object(row.into_iter().collect());
            results.push(serde_json::from_value(value)?);
        }
        Ok(results)
    }

    /// Execute SQL and return the first column of the first row.
    ///
    /// Returns `None` if the result set is empty.
    pub fn execute_scalar(
        &self,
        sql: &str,
        params: &[String],
    ) -> Result<Option<serde_json::Value>> {
        let mut stmt = self.conn.prepare(sql)?;
        let param_values: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();

        let mut rows = stmt.query(param_values.as_slice())?;

        if let Some(row) = rows.next()? {
            Ok(Some(convert_value_ref(row.get_ref(0)?)))
        } else {
            Ok(None)
        }
    }

    /// Execute a write statement with typed parameters, returning the number
    /// of affected rows.
    pub fn execute_write(&self, sql: &str, params: &[&dyn ToSql]) -> Result<usize> {
        Ok(self.conn.execute(sql, params)?)
    }

    /// Execute a statement ending in `RETURNING <integer column>` and return
    /// that value from the first row.
    pub fn execute_returning_i64(&self, sql: &str, params: &[&dyn ToSql]) -> Result<i64> {
        Ok(self.conn.query_row(sql, params, |row| row.get::<_, i64>(0))?)
    }

    /// Run `f` inside a transaction, committing on success.
    pub fn transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    log::warn!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    /// Access the underlying DuckDB connection for advanced usage.
    pub fn raw(&self) -> &DuckDbConnection {
        &self.conn
    }
}

/// Convert a DuckDB `ValueRef` to a `serde_json::Value`.
fn convert_value_ref(val: ValueRef<'_>) -> serde_json::Value {
    match val {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Boolean(b) => serde_json::Value::Bool(b),
        ValueRef::TinyInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::SmallInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::Int(n) => serde_json::Value::Number(n.into()),
        ValueRef::BigInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::HugeInt(n) => match i64::try_from(n) {
            Ok(i) => serde_json::Value::Number(i.into()),
            Err(_) => serde_json::Value::String(n.to_string()),
        },
        ValueRef::UTinyInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::USmallInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::UInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::UBigInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::Double(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(bytes) => serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()),
        _ => serde_json::Value::Null,
    }
}
