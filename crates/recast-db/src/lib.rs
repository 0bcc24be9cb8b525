//! Data access layer for Recast.
//!
//! The persistence engine is treated as a document store with point-reads,
//! inserts, and field-level merge-patch writes; those semantics are the
//! [`RunStore`] and [`CheckpointStore`] traits. Two implementations ship:
//! Postgres (production) and in-memory (tests, local development). Both
//! apply a whole patch atomically and refuse to mutate terminal runs.

pub mod memory;
pub mod postgres;
pub mod store;

pub use memory::MemoryStore;
pub use postgres::{PgCheckpointStore, PgRunStore};
pub use store::{CheckpointOutcome, CheckpointStore, RunStore, StepCheckpoint};
