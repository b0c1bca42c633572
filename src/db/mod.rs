//! Database layer for the code graph.
//!
//! - [`schema`]: connection pragmas and the base `metadata` table (`initialize_database`).
//! - [`migrations`]: graph tables and version-gated alterations (`run_migrations`).
//! - [`converters`]: Row-to-struct conversions (`row_to_entity`, `row_to_relationship`).

pub mod converters;
pub mod migrations;
pub mod schema;

pub use converters::{row_to_entity, row_to_relationship};
pub use migrations::{run_migrations, LATEST_SCHEMA_VERSION};
pub use schema::initialize_database;
