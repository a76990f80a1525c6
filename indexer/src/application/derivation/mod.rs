mod balances;
mod metrics;
mod pipeline;
mod signals;
mod unlocks;

pub use pipeline::{ComponentRun, DaySpan, DerivationPipeline, RecomputeScope};
