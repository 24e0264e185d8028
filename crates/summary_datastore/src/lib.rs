//! # DataStore Module
//!
//! This module provides functionality for persisting completed video summaries
//! in a Postgres database, keyed by YouTube video id.
//!
//! The module uses sqlx for database operations and exposes a small trait so the
//! summary pipeline can be exercised against other stores in tests.

mod datastore;
mod domain;

pub use datastore::postgres::PgDataStore;
pub use datastore::{DataStore, InsertOutcome};
pub use domain::{NewSummary, SummaryRecord};
