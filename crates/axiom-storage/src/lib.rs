//! AXIOM Storage Layer
//!
//! SQLite-backed persistence for bookmarks, visited history, settings and
//! frozen tab snapshots.

mod database;
mod error;
mod migrations;

pub use database::Database;
pub use error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;
