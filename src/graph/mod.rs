//! Graph layer: SQLite-backed store, name resolution, and structural queries.

pub mod query;
pub mod resolver;
pub mod store;

pub use query::{CalleeInfo, CallerInfo, EntityRef, GraphQueries, InheritanceChild, InheritanceNode};
pub use store::{GraphStats, GraphStore, StoredCounts};
