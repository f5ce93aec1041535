//! Adapters implementing the domain ports: SQLite persistence and generation routines.

pub mod generators;
pub mod sqlite;
