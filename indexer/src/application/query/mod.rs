//! Read-only accessors for dashboards and ad-hoc analysis

use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::models::{
    ConcentrationPoint, DailyBalance, DateRange, DatedTransfer, DerivationComponent, ExchangeFlow,
    HolderFlag, RealizedUnlock, SupplyPoint, SyncState, TopHolder,
};
use crate::domain::services::labels::normalize_address;
use crate::infrastructure::persistence::{DbError, DerivedStore, LedgerStore};

/// Inclusive date range plus an optional address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    pub range: DateRange,
    pub address: Option<String>,
}

impl QueryFilter {
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            address: None,
        }
    }

    /// Restricts the query to one address; input is normalized to lowercase
    pub fn for_address(mut self, address: &str) -> Self {
        self.address =
            Some(normalize_address(address.trim()).unwrap_or_else(|| address.trim().to_lowercase()));
        self
    }

    fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }
}

pub struct QueryService {
    ledger: Arc<dyn LedgerStore>,
    derived: Arc<dyn DerivedStore>,
}

impl QueryService {
    pub fn new(ledger: Arc<dyn LedgerStore>, derived: Arc<dyn DerivedStore>) -> Self {
        Self { ledger, derived }
    }

    pub async fn daily_balances(&self, filter: &QueryFilter) -> Result<Vec<DailyBalance>, DbError> {
        self.derived.daily_balances(filter.range, filter.address()).await
    }

    /// Balance of `address` at the end of `asof`, zero if it never held any
    pub async fn balance_at(&self, address: &str, asof: NaiveDate) -> Result<Option<DailyBalance>, DbError> {
        let filter = QueryFilter::new(DateRange::new(None, Some(asof))).for_address(address);
        Ok(self.daily_balances(&filter).await?.into_iter().last())
    }

    pub async fn top_holders(&self, filter: &QueryFilter) -> Result<Vec<TopHolder>, DbError> {
        self.derived.top_holders(filter.range, filter.address()).await
    }

    pub async fn concentration(&self, filter: &QueryFilter) -> Result<Vec<ConcentrationPoint>, DbError> {
        self.derived.concentration(filter.range).await
    }

    pub async fn supply(&self, filter: &QueryFilter) -> Result<Vec<SupplyPoint>, DbError> {
        self.derived.supply(filter.range).await
    }

    pub async fn holder_flags(&self, filter: &QueryFilter) -> Result<Vec<HolderFlag>, DbError> {
        self.derived.holder_flags(filter.range, filter.address()).await
    }

    /// Exchange flows, optionally for one exchange name (or `ALL`)
    pub async fn exchange_flows(
        &self,
        filter: &QueryFilter,
        exchange: Option<&str>,
    ) -> Result<Vec<ExchangeFlow>, DbError> {
        let rows = self.derived.exchange_flows(filter.range).await?;
        Ok(match exchange {
            Some(exchange) => rows
                .into_iter()
                .filter(|r| r.exchange.eq_ignore_ascii_case(exchange))
                .collect(),
            None => rows,
        })
    }

    pub async fn realized_unlocks(&self, filter: &QueryFilter) -> Result<Vec<RealizedUnlock>, DbError> {
        self.derived.realized_unlocks(filter.range).await
    }

    pub async fn transfers(&self, filter: &QueryFilter) -> Result<Vec<DatedTransfer>, DbError> {
        self.ledger.dated_transfers(filter.range, filter.address()).await
    }

    pub async fn sync_states(&self) -> Result<Vec<SyncState>, DbError> {
        self.ledger.list_sync_states().await
    }

    /// Last derived day per component
    pub async fn cursors(&self) -> Result<Vec<(DerivationComponent, Option<NaiveDate>)>, DbError> {
        let mut cursors = Vec::new();
        for component in DerivationComponent::ALL {
            cursors.push((component, self.derived.get_cursor(component).await?));
        }
        Ok(cursors)
    }
}
