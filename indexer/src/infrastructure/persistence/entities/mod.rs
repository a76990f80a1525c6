pub mod address_labels;
pub mod blocks;
pub mod concentration_timeseries;
pub mod daily_balances;
pub mod derivation_cursors;
pub mod exchange_flows;
pub mod holder_flags;
pub mod realized_unlocks;
pub mod supply_timeseries;
pub mod sync_state;
pub mod top_holders_snapshot;
pub mod traces;
pub mod transactions;
pub mod transfers;
pub mod unlock_confirmations;
pub mod unlock_schedule;
