//! # Spindle Persistence
//!
//! SQLite storage for the queue, catalogued records and estimation
//! snapshots. A single pool is constructed at startup and injected into
//! every store.

pub mod estimates;
pub mod queue;
pub mod records;
pub mod sqlite;

pub use estimates::SqliteEstimateStore;
pub use queue::SqliteQueueBackend;
pub use records::SqliteRecordStore;
pub use sqlite::{Database, SqliteConfig};
