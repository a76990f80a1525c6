use crate::application::derivation::pipeline::{DaySpan, DerivationPipeline};
use crate::domain::errors::DeriveError;
use crate::domain::models::DateRange;
use crate::domain::services::{ReconciliationReport, UnlockReconciler};
use crate::utils::logging;

impl DerivationPipeline {
    /// Rebuilds the realized-unlock table; the span only bounds the ledger read
    pub(super) async fn derive_unlocks(&self, span: DaySpan) -> Result<usize, DeriveError> {
        let report = self.reconcile_unlocks(span).await?;
        for mismatch in &report.mismatches {
            logging::log_info(&format!(
                "[derive:unlocks] Schedule mismatch: {} {} scheduled {} observed {}",
                mismatch.unlock_date,
                mismatch.category,
                self.config.units.to_tokens(mismatch.scheduled_amount),
                self.config.units.to_tokens(mismatch.observed_amount)
            ));
        }
        if report.pending > 0 {
            logging::log_debug(&format!(
                "[derive:unlocks] {} entries still inside their window",
                report.pending
            ));
        }

        self.derived
            .replace_realized_unlocks(&report.realized)
            .await?;
        Ok(report.realized.len())
    }

    /// Matches the whole schedule against transfers up to `span.until`
    async fn reconcile_unlocks(&self, span: DaySpan) -> Result<ReconciliationReport, DeriveError> {
        let schedule = self.derived.unlock_schedule().await?;
        let reconciler = UnlockReconciler::new(
            self.config.reconciliation_window_days,
            self.config.reconciliation_tolerance,
            &self.derived.labels().await?,
            &self.derived.unlock_confirmations().await?,
        );

        let Some((from, to)) = reconciler.span(&schedule) else {
            return Ok(ReconciliationReport::default());
        };
        let transfers = if from > span.until {
            Vec::new()
        } else {
            self.ledger
                .dated_transfers(DateRange::between(from, to.min(span.until)), None)
                .await?
        };
        Ok(reconciler.reconcile(&schedule, &transfers, span.until))
    }
}
