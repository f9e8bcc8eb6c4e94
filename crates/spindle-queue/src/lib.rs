//! # Spindle Queue
//!
//! Durable at-least-once work queue with a fixed-size worker pool.
//!
//! Features:
//! - Dispatch by job kind to registered handlers
//! - Pluggable backend (memory, SQLite via `spindle-persist`)
//! - Retry with exponential backoff, bounded attempts
//! - Visibility-timeout redelivery for jobs held by crashed workers
//! - Retention pruning of completed and exhausted jobs

pub mod backend;
pub mod job;
pub mod memory;
pub mod worker;

pub use backend::{QueueBackend, QueueError};
pub use job::{JobEntry, JobId, JobStatus, RetentionPolicy, RetryPolicy};
pub use memory::MemoryQueue;
pub use worker::{HandlerError, JobContext, JobHandler, WorkerConfig, WorkerPool};
