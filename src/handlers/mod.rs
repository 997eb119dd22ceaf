pub mod ingest;
pub mod readings;
pub mod registry;
