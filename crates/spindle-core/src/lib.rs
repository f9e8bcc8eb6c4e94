//! # Spindle Core
//!
//! Domain types shared across the estimation pipeline:
//! - Catalogue metadata (`ReleaseMeta`, `SubjectRecord`)
//! - Estimation snapshots (`EstimationResult`)
//! - Storage seams (`RecordStore`, `EstimateStore`)

pub mod estimate;
pub mod meta;
pub mod store;

pub use estimate::EstimationResult;
pub use meta::{ReleaseMeta, SubjectRecord};
pub use store::{EstimateStore, RecordStore, StoreError, StoredEstimate};
