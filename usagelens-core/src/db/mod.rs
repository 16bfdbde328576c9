//! Database layer for usagelens
//!
//! This module provides read access to the usage store using SQLite with:
//! - Store schema (owned by the ingestion side, installable for tests)
//! - A shared connection handle
//! - Local-time scalar functions used by every aggregation query

pub mod functions;
pub mod repo;
pub mod schema;

pub use repo::Database;
