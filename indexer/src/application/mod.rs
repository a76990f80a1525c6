pub mod derivation;
pub mod indexer;
pub mod inputs;
pub mod query;
