//! Offline worker for the AquaSentry dashboard.
//!
//! This crate provides the upstream fetch pipeline, the per-request serving
//! strategies, and the worker lifecycle that owns versioned cache stores.

pub mod fetch;
pub mod lifecycle;
pub mod strategy;

#[cfg(test)]
mod test_support;

pub use fetch::{FetchClient, FetchConfig, Fetcher};
pub use lifecycle::{ActivationReport, MessageOutcome, PrimeReport, Worker, WorkerOptions, WorkerState, WorkerStatus};
pub use strategy::{CachePolicy, RequestClass, Router};
