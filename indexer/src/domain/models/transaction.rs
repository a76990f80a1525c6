use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A transaction of an ingested block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction hash
    pub hash: String,

    /// Height of the containing block
    pub block_number: u64,

    /// Sender address
    pub from: String,

    /// Recipient address, `None` for contract creation
    pub to: Option<String>,

    /// Native value moved by the call, in base units
    pub value: Decimal,

    /// Receipt status, `None` when receipts are not fetched
    pub success: Option<bool>,

    /// Gas used, from the receipt
    pub gas_used: Option<u64>,

    /// EIP-1559 max fee per gas
    pub max_fee_per_gas: Option<Decimal>,

    /// EIP-1559 max priority fee per gas
    pub max_priority_fee_per_gas: Option<Decimal>,

    /// Address of the contract created by this transaction, from the receipt
    pub created_contract: Option<String>,
}

impl Transaction {
    /// Recipient of the top-level value movement
    pub fn recipient(&self) -> Option<&str> {
        self.to.as_deref().or(self.created_contract.as_deref())
    }

    /// Unknown status (receipts disabled) counts as success
    pub fn succeeded(&self) -> bool {
        self.success != Some(false)
    }
}

/// An internal value movement recorded by a call trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub tx_hash: String,
    /// 1-based position of the frame inside the transaction, root frame excluded
    pub trace_index: u32,
    pub from: String,
    pub to: Option<String>,
    pub value: Decimal,
    /// The frame, or one of its ancestors, reverted
    pub reverted: bool,
}
