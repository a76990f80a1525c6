pub mod ledger;
pub mod persistence;
