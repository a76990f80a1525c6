//! Ingestion Module
//!
//! Turns the remote ledger into the local block / transaction / trace /
//! transfer tables. Two streams share one mechanism:
//!
//! - **backfill**: a historical height range in fixed-size batches
//! - **live**: follows the tip behind a confirmation lag and repairs reorgs
//!
//! Derived tables are built afterwards, see `application::derivation`.

mod batch_builder;
mod ingestion_engine;
mod reorg;

pub use batch_builder::BatchBuilder;
pub use ingestion_engine::{IngestSummary, IngestionEngine};
pub use reorg::{ReorgHandler, ReorgOutcome};
