//! Integration tests for the card library.

mod common;

use cardgen_sdk::models::Rarity;
use cardgen_sdk::queries::{LibraryQuery, SearchLibraryParams};
use cardgen_sdk::Connection;
use common::sample_card;

fn seeded() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    let library = LibraryQuery::new(&conn);
    library
        .add("h1", &sample_card("Infinite Loop Dragon", Rarity::SSR), "/a.jpg")
        .unwrap();
    library
        .add("h2", &sample_card("Quantum Cat", Rarity::N), "/b.jpg")
        .unwrap();
    library
        .add("h3", &sample_card("Dark Magician of Code", Rarity::SSR), "/c.jpg")
        .unwrap();
    conn
}

#[test]
fn add_assigns_increasing_ids() {
    let conn = Connection::open_in_memory().unwrap();
    let library = LibraryQuery::new(&conn);
    let a = library.add("h1", &sample_card("A", Rarity::N), "/a.jpg").unwrap();
    let b = library.add("h1", &sample_card("A", Rarity::N), "/a.jpg").unwrap();
    assert!(b.id > a.id);
    assert_eq!(library.count().unwrap(), 2);
}

#[test]
fn get_returns_saved_entry() {
    let conn = Connection::open_in_memory().unwrap();
    let library = LibraryQuery::new(&conn);
    let saved = library
        .add("h9", &sample_card("Bug Squash Knight", Rarity::UR), "https://x/y.png")
        .unwrap();

    let loaded = library.get(saved.id).unwrap().unwrap();
    assert_eq!(loaded, saved);
    assert_eq!(loaded.card(), sample_card("Bug Squash Knight", Rarity::UR));
    assert!(library.get(saved.id + 100).unwrap().is_none());
}

#[test]
fn list_defaults_to_newest_first() {
    let conn = seeded();
    let names: Vec<String> = LibraryQuery::new(&conn)
        .list(&SearchLibraryParams::default())
        .unwrap()
        .into_iter()
        .map(|c| c.hash)
        .collect();
    assert_eq!(names, vec!["h3", "h2", "h1"]);
}

#[test]
fn list_filters_by_rarity_and_name() {
    let conn = seeded();
    let library = LibraryQuery::new(&conn);

    let ssr = library
        .list(&SearchLibraryParams {
            rarity: Some(Rarity::SSR),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(ssr.len(), 2);
    assert!(ssr.iter().all(|c| c.rarity == Rarity::SSR));

    let cats = library
        .list(&SearchLibraryParams {
            name: Some("CAT".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(cats.len(), 1);
    assert_eq!(cats[0].name, "Quantum Cat");
}

#[test]
fn name_search_treats_wildcards_literally() {
    let conn = Connection::open_in_memory().unwrap();
    let library = LibraryQuery::new(&conn);
    library
        .add("h1", &sample_card("100% Cotton Golem", Rarity::R), "/a.jpg")
        .unwrap();
    library
        .add("h2", &sample_card("1000 Year Sloth", Rarity::N), "/b.jpg")
        .unwrap();
    library
        .add("h3", &sample_card("Snake_Case Serpent", Rarity::SR), "/c.jpg")
        .unwrap();
    library
        .add("h4", &sample_card("Snake Case Serpent", Rarity::SR), "/d.jpg")
        .unwrap();

    let search = |name: &str| -> Vec<String> {
        library
            .list(&SearchLibraryParams {
                name: Some(name.into()),
                ..Default::default()
            })
            .unwrap()
            .into_iter()
            .map(|c| c.hash)
            .collect()
    };
    assert_eq!(search("100%"), vec!["h1"]);
    assert_eq!(search("snake_case"), vec!["h3"]);
    assert_eq!(search("%").len(), 1);
}

#[test]
fn list_pages_with_limit_and_offset() {
    let conn = seeded();
    let page = LibraryQuery::new(&conn)
        .list(&SearchLibraryParams {
            limit: 1,
            offset: 1,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].hash, "h2");
}

#[test]
fn rarity_counts_group_entries() {
    let conn = seeded();
    let counts = LibraryQuery::new(&conn).rarity_counts().unwrap();
    assert_eq!(counts.get(&Rarity::SSR), Some(&2));
    assert_eq!(counts.get(&Rarity::N), Some(&1));
    assert_eq!(counts.get(&Rarity::UR), None);
}
