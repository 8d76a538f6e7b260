//! Query modules for the card store.
//!
//! Each module provides a query struct that borrows from a
//! [`Connection`](crate::connection::Connection) and exposes typed methods
//! returning `Result<T>`.

pub mod cards;
pub mod library;
pub mod packs;

pub use cards::{CachedCard, CardQuery};
pub use library::{LibraryQuery, SearchLibraryParams};
pub use packs::{OpenedPack, PackQuery};

/// Current time in milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
