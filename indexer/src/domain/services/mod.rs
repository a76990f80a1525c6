pub mod balance_engine;
pub mod concentration;
pub mod exchange_flows;
pub mod holder_flags;
pub mod labels;
pub mod supply;
pub mod transfer_extractor;
pub mod unlock_reconciliation;
pub mod unlock_schedule;

// Re-export services for direct imports
pub use balance_engine::{BalanceBook, BalanceEngine, DailyFlows};
pub use concentration::ConcentrationEngine;
pub use exchange_flows::{unlock_proximity, ExchangeFlowEngine};
pub use holder_flags::{build_activity, ActivityLedger, HolderFlagEngine};
pub use supply::SupplyCalculator;
pub use transfer_extractor::TransferExtractor;
pub use unlock_reconciliation::{ReconciliationReport, ScheduleMismatch, UnlockReconciler};
pub use unlock_schedule::{AllocationFile, UnlockScheduleGenerator};
