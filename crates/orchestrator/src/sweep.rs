//! Reconciliation sweep.

use std::sync::Arc;
use std::time::Duration;

use ledger::InventoryLedger;
use store::{OrderStore, Outbox, OutboxEntry};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::backlog::ReleaseBacklog;
use crate::events::order_created_payload;

/// What one sweep pass accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Confirmed orders that were missing an outbox entry and got one.
    pub re_enqueued: u32,

    /// Backlogged releases that went through this pass.
    pub retried_releases: u32,
}

/// Background worker that repairs the two gaps the saga tolerates at
/// request time.
///
/// A confirmed order whose enqueue failed has no outbox entry; the sweep
/// backfills one, restoring the guarantee that every committed order
/// eventually emits its event. A compensating release that failed sits on
/// the [`ReleaseBacklog`]; the sweep retries it until the stock is back.
pub struct ReconciliationSweep<S, O, L> {
    store: Arc<S>,
    outbox: Arc<O>,
    ledger: Arc<L>,
    backlog: ReleaseBacklog,
    interval: Duration,
}

impl<S, O, L> ReconciliationSweep<S, O, L>
where
    S: OrderStore,
    O: Outbox,
    L: InventoryLedger,
{
    /// Creates a sweep running at the given interval.
    pub fn new(
        store: Arc<S>,
        outbox: Arc<O>,
        ledger: Arc<L>,
        backlog: ReleaseBacklog,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            outbox,
            ledger,
            backlog,
            interval,
        }
    }

    /// Runs one reconciliation pass.
    pub async fn run_once(&self) -> store::Result<SweepReport> {
        let mut report = SweepReport::default();

        // Backfill missing outbox entries. Only confirmed orders qualify:
        // pending and cancelled rows never emitted an event by contract.
        for order in self.store.list_confirmed().await? {
            if !self.outbox.has_entry_for(order.id).await? {
                let entry = OutboxEntry::order_created(order.id, order_created_payload(&order));
                self.outbox.enqueue(entry).await?;
                metrics::counter!("outbox_backfilled_total").increment(1);
                warn!(order_id = %order.id, "Backfilled missing outbox entry");
                report.re_enqueued += 1;
            }
        }

        // Retry parked releases. A release that fails again goes straight
        // back on the backlog for the next pass.
        for pending in self.backlog.drain() {
            match self
                .ledger
                .release(&pending.product_id, pending.quantity)
                .await
            {
                Ok(()) => {
                    metrics::counter!("backlog_releases_retried_total").increment(1);
                    info!(
                        product_id = %pending.product_id,
                        quantity = pending.quantity,
                        "Backlogged release completed"
                    );
                    report.retried_releases += 1;
                }
                Err(error) => {
                    warn!(
                        product_id = %pending.product_id,
                        quantity = pending.quantity,
                        %error,
                        "Backlogged release failed again"
                    );
                    self.backlog.push(pending.product_id, pending.quantity);
                }
            }
        }

        Ok(report)
    }

    /// Runs reconciliation passes on the interval until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        info!(interval_ms = self.interval.as_millis() as u64, "Reconciliation sweep started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(report) if report.re_enqueued > 0 || report.retried_releases > 0 => {
                            info!(
                                re_enqueued = report.re_enqueued,
                                retried_releases = report.retried_releases,
                                "Sweep pass repaired state"
                            );
                        }
                        Ok(_) => {}
                        Err(error) => error!(%error, "Sweep pass failed"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("Reconciliation sweep stopping");
                    break;
                }
            }
        }
    }
}
