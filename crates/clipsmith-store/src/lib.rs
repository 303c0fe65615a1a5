//! Durable job records.
//!
//! One JSON file holds the whole job table; every mutation is a full
//! rewrite through a temp file + rename, so in-flight state survives
//! process restarts without a partial-write window.

pub mod error;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{JobPatch, JobStore, StepPatch};
