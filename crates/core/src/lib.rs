//! Core types and shared functionality for the AquaSentry offline cache.
//!
//! This crate provides:
//! - Request/response snapshots and request identities
//! - Versioned cache stores with a SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, CacheStorage};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{InterceptedRequest, RequestIdentity, RequestMode, ResponseSnapshot};
