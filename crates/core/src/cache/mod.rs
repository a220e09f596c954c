//! SQLite-backed store of HTTP responses, grouped into versioned stores.
//!
//! - Entries keyed by a SHA-256 of the normalized request identity
//! - Whole-store create / delete by version tag
//! - Automatic schema migrations and WAL mode

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod storage;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use storage::CacheStorage;
