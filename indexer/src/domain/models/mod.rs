pub mod balance;
pub mod block;
pub mod concentration;
pub mod cursor;
pub mod exchange_flow;
pub mod holder_flag;
pub mod label;
pub mod supply;
pub mod sync_state;
pub mod transaction;
pub mod transfer;
pub mod units;
pub mod unlock;
pub mod window;

pub use balance::DailyBalance;
pub use block::Block;
pub use concentration::{ConcentrationPoint, TopHolder};
pub use cursor::DerivationComponent;
pub use exchange_flow::{ExchangeFlow, UnlockProximity};
pub use holder_flag::{Confidence, HolderFlag, HolderFlagKind};
pub use label::AddressLabel;
pub use supply::SupplyPoint;
pub use sync_state::SyncState;
pub use transaction::{Trace, Transaction};
pub use transfer::{DatedTransfer, Transfer, TransferSource};
pub use units::TokenUnits;
pub use unlock::{RealizedUnlock, UnlockBasis, UnlockConfirmation, UnlockScheduleEntry};
pub use window::{DateRange, TimeWindow};
