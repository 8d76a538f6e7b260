//! Unit tests for the SqlBuilder query construction.

use cardgen_sdk::SqlBuilder;

// ---------------------------------------------------------------------------
// Basic construction
// ---------------------------------------------------------------------------

#[test]
fn new_creates_select_star_from_table() {
    let (sql, params) = SqlBuilder::new("cards").build();
    assert_eq!(sql, "SELECT *\nFROM cards");
    assert!(params.is_empty());
}

#[test]
fn select_replaces_default_star() {
    let (sql, _) = SqlBuilder::new("cards")
        .select(&["hash", "name"])
        .build();
    assert!(sql.starts_with("SELECT hash, name\n"));
}

// ---------------------------------------------------------------------------
// WHERE conditions
// ---------------------------------------------------------------------------

#[test]
fn where_eq_adds_equality_with_param() {
    let (sql, params) = SqlBuilder::new("library")
        .where_eq("rarity", "SSR")
        .build();
    assert!(sql.contains("WHERE rarity = ?"));
    assert_eq!(params, vec!["SSR"]);
}

#[test]
fn where_contains_adds_case_insensitive_substring_match() {
    let (sql, params) = SqlBuilder::new("library")
        .where_contains("name", "100%_dragon")
        .build();
    assert!(sql.contains("contains(LOWER(name), LOWER(?))"));
    assert!(!sql.contains("LIKE"));
    assert_eq!(params, vec!["100%_dragon"]);
}

#[test]
fn where_in_adds_in_clause() {
    let (sql, params) = SqlBuilder::new("cards")
        .where_in("hash", &["a", "b", "c"])
        .build();
    assert!(sql.contains("hash IN (?, ?, ?)"));
    assert_eq!(params, vec!["a", "b", "c"]);
}

#[test]
fn where_in_empty_produces_false() {
    let (sql, params) = SqlBuilder::new("cards")
        .where_in("hash", &[])
        .build();
    assert!(sql.contains("WHERE FALSE"));
    assert!(params.is_empty());
}

#[test]
fn multiple_conditions_are_anded_in_order() {
    let (sql, params) = SqlBuilder::new("library")
        .where_eq("rarity", "UR")
        .where_contains("name", "cat")
        .build();
    assert!(sql.contains("WHERE rarity = ? AND contains(LOWER(name), LOWER(?))"));
    assert_eq!(params, vec!["UR", "cat"]);
}

// ---------------------------------------------------------------------------
// GROUP BY / ORDER BY / paging
// ---------------------------------------------------------------------------

#[test]
fn group_by_adds_clause() {
    let (sql, _) = SqlBuilder::new("library")
        .select(&["rarity", "COUNT(*) AS n"])
        .group_by(&["rarity"])
        .build();
    assert!(sql.contains("GROUP BY rarity"));
}

#[test]
fn order_by_adds_clause() {
    let (sql, _) = SqlBuilder::new("packs")
        .order_by(&["created_at DESC", "rowid DESC"])
        .build();
    assert!(sql.contains("ORDER BY created_at DESC, rowid DESC"));
}

#[test]
fn limit_and_offset_come_last() {
    let (sql, _) = SqlBuilder::new("library")
        .order_by(&["saved_at DESC"])
        .limit(10)
        .offset(20)
        .build();
    assert!(sql.ends_with("ORDER BY saved_at DESC\nLIMIT 10\nOFFSET 20"));
}
