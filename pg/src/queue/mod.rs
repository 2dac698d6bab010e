//! Durable, per-form-serialized migration queue.
//!
//! Two halves:
//! - [`store`]: the persistent job table. Jobs survive process restarts;
//!   a claim takes the oldest queued job of any form with nothing running,
//!   using `FOR UPDATE SKIP LOCKED` so concurrent dispatchers never double-
//!   claim.
//! - [`runtime`]: the in-process dispatcher and worker pool. A per-form
//!   async lock keeps same-form migrations strictly serial while different
//!   forms run in parallel up to the pool size.

pub mod runtime;
pub mod store;

pub use runtime::{FormLocks, QueueRuntime, RuntimeConfig};
pub use store::{JobHandle, JobState, MigrationJob, PgJobStore, QueueStatus};
