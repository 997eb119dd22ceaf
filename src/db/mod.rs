//! Database module: models, schema, and stores for persistent state.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows and insert payloads
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: pool setup
//! - `readings.rs`: append-only reading history
//! - `registry.rs`: patients, caregivers, devices

pub mod models;
pub mod readings;
pub mod registry;
pub mod schema;
pub mod sqlite;

pub use readings::ReadingStore;
pub use registry::Registry;
pub use schema::SQLITE_INIT;
pub use sqlite::{SqlitePool, open};
