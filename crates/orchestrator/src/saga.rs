//! The order-creation saga.

use std::sync::Arc;
use std::time::Instant;

use ledger::{InventoryLedger, LedgerError, ReservationOutcome};
use store::{Order, OrderStatus, OrderStore, Outbox, OutboxEntry, StoreError};
use tracing::{info, warn};

use crate::attempt::ReservationAttempt;
use crate::backlog::ReleaseBacklog;
use crate::error::{CreateOrderError, Result};
use crate::events::order_created_payload;
use crate::phase::SagaPhase;
use crate::request::CreateOrderRequest;
use crate::retry::RetryPolicy;
use crate::services::{DirectoryError, UserDirectory};

/// Coordinates one order-creation attempt across the user directory, the
/// inventory ledger, the order store and the outbox.
///
/// The coordinator owns the consistency contract:
///
/// - stock is reserved line by line, and on any failure every reserved
///   line of the attempt is released before an error is returned;
/// - the order row is only confirmed after every line is reserved;
/// - the outbox entry is enqueued only after the row is confirmed, and an
///   enqueue failure never fails the order (the reconciliation sweep
///   backfills it);
/// - a release that itself fails is parked on the [`ReleaseBacklog`]
///   rather than blocking the caller.
pub struct OrderOrchestrator<D, L, S, O> {
    directory: Arc<D>,
    ledger: Arc<L>,
    store: Arc<S>,
    outbox: Arc<O>,
    retry_policy: RetryPolicy,
    backlog: ReleaseBacklog,
}

impl<D, L, S, O> OrderOrchestrator<D, L, S, O>
where
    D: UserDirectory,
    L: InventoryLedger,
    S: OrderStore,
    O: Outbox,
{
    /// Creates a new orchestrator with the default retry policy.
    pub fn new(directory: Arc<D>, ledger: Arc<L>, store: Arc<S>, outbox: Arc<O>) -> Self {
        Self {
            directory,
            ledger,
            store,
            outbox,
            retry_policy: RetryPolicy::default(),
            backlog: ReleaseBacklog::new(),
        }
    }

    /// Overrides the retry policy for transient dependency failures.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Shares an existing release backlog (so the reconciliation sweep can
    /// drain it).
    pub fn with_release_backlog(mut self, backlog: ReleaseBacklog) -> Self {
        self.backlog = backlog;
        self
    }

    /// Returns a handle to the release backlog.
    pub fn release_backlog(&self) -> ReleaseBacklog {
        self.backlog.clone()
    }

    /// Runs the saga for one request.
    ///
    /// On success the returned order is `Confirmed` and its event is
    /// durably enqueued (or will be backfilled by the sweep). On error the
    /// attempt holds no stock, except for releases parked on the backlog.
    #[tracing::instrument(
        skip(self, request),
        fields(
            idempotency_key = %request.idempotency_key,
            user_id = %request.user_id,
            items = request.items.len(),
        )
    )]
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order> {
        let started = Instant::now();
        metrics::counter!("order_saga_executions_total").increment(1);

        let result = self.run(&request).await;

        metrics::histogram!("order_saga_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        match &result {
            Ok(order) => {
                metrics::counter!("order_saga_confirmed_total").increment(1);
                info!(order_id = %order.id, total_cents = order.total_amount.cents(), "Order confirmed");
            }
            Err(error) => {
                metrics::counter!("order_saga_aborted_total").increment(1);
                warn!(%error, "Order creation aborted");
            }
        }

        result
    }

    async fn run(&self, request: &CreateOrderRequest) -> Result<Order> {
        request.validate()?;

        // Replay check before any side effect. Only a confirmed prior
        // order is replayed; a pending or cancelled holder means the key
        // is burned and the caller must mint a new one.
        if let Some(existing) = self.store.find_by_idempotency_key(&request.idempotency_key).await? {
            return if existing.status == OrderStatus::Confirmed {
                metrics::counter!("order_saga_idempotent_replays_total").increment(1);
                info!(order_id = %existing.id, "Idempotent replay, returning confirmed order");
                Ok(existing)
            } else {
                Err(CreateOrderError::DuplicateRequest {
                    order_id: existing.id,
                    status: existing.status,
                })
            };
        }

        if let Err(error) = self.validate_user(request).await {
            warn!(phase = %SagaPhase::Validating.abort(), %error, "Validation phase aborted");
            return Err(error);
        }

        let attempt = match self.reserve_all(request).await {
            Ok(attempt) => attempt,
            Err(error) => {
                warn!(phase = %SagaPhase::Reserving.abort(), %error, "Reservation phase aborted");
                return Err(error);
            }
        };

        let order = match self.persist(request, &attempt).await {
            Ok(order) => order,
            Err(error) => {
                warn!(phase = %SagaPhase::Persisting.abort(), %error, "Persistence phase aborted");
                return Err(error);
            }
        };

        self.enqueue_event(&order).await;
        Ok(order)
    }

    /// Confirms the purchasing user exists, retrying transient directory
    /// failures within the policy budget.
    async fn validate_user(&self, request: &CreateOrderRequest) -> Result<()> {
        for attempt in 1..=self.retry_policy.max_attempts {
            match self.directory.user_exists(request.user_id).await {
                Ok(true) => return Ok(()),
                Ok(false) => return Err(CreateOrderError::UserNotFound(request.user_id)),
                Err(DirectoryError::Unavailable(reason)) => {
                    warn!(attempt, reason, "User directory unavailable");
                    if attempt < self.retry_policy.max_attempts {
                        tokio::time::sleep(self.retry_policy.delay_for(attempt)).await;
                    }
                }
            }
        }

        Err(CreateOrderError::DependencyUnavailable {
            component: "user_directory",
        })
    }

    /// Reserves every line item sequentially. On any failure, releases the
    /// lines reserved so far before returning the error.
    async fn reserve_all(&self, request: &CreateOrderRequest) -> Result<ReservationAttempt> {
        let mut attempt = ReservationAttempt::new(&request.items);

        for (index, item) in request.items.iter().enumerate() {
            match self.reserve_line(&item.product_id, item.quantity).await {
                Ok(ReservationOutcome::Reserved { unit_price }) => {
                    attempt.mark_reserved(index, unit_price);
                }
                Ok(ReservationOutcome::InsufficientStock { available }) => {
                    attempt.mark_failed(index);
                    warn!(
                        product_id = %item.product_id,
                        requested = item.quantity,
                        available,
                        "Insufficient stock"
                    );
                    self.compensate(&attempt).await;
                    return Err(CreateOrderError::InsufficientStock {
                        product_id: item.product_id.clone(),
                    });
                }
                Ok(ReservationOutcome::NotFound) => {
                    attempt.mark_failed(index);
                    self.compensate(&attempt).await;
                    return Err(CreateOrderError::ProductNotFound {
                        product_id: item.product_id.clone(),
                    });
                }
                Err(error) => {
                    attempt.mark_failed(index);
                    warn!(product_id = %item.product_id, %error, "Ledger unreachable");
                    self.compensate(&attempt).await;
                    return Err(CreateOrderError::DependencyUnavailable {
                        component: "inventory_ledger",
                    });
                }
            }
        }

        Ok(attempt)
    }

    /// One line's reservation with retries for transient ledger failures.
    /// Business refusals (insufficient stock, unknown product) pass through
    /// untouched.
    async fn reserve_line(
        &self,
        product_id: &common::ProductId,
        quantity: u32,
    ) -> std::result::Result<ReservationOutcome, LedgerError> {
        let mut last_error = None;
        for attempt in 1..=self.retry_policy.max_attempts {
            match self.ledger.try_reserve(product_id, quantity).await {
                Ok(outcome) => return Ok(outcome),
                Err(LedgerError::Unavailable(reason)) => {
                    warn!(attempt, %product_id, reason, "Ledger unavailable, retrying");
                    last_error = Some(LedgerError::Unavailable(reason));
                    if attempt < self.retry_policy.max_attempts {
                        tokio::time::sleep(self.retry_policy.delay_for(attempt)).await;
                    }
                }
                Err(error) => return Err(error),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            LedgerError::Unavailable("retry budget exhausted".to_string())
        }))
    }

    /// Inserts the order and confirms it. Any failure here releases every
    /// reservation of the attempt.
    async fn persist(
        &self,
        request: &CreateOrderRequest,
        attempt: &ReservationAttempt,
    ) -> Result<Order> {
        let mut order = Order::new(
            common::OrderId::new(),
            request.user_id,
            request.idempotency_key.clone(),
            attempt.order_lines(),
        );

        match self.store.insert(&order).await {
            Ok(()) => {}
            Err(StoreError::Conflict(order_id)) => {
                self.compensate(attempt).await;
                return Err(CreateOrderError::IdConflict(order_id));
            }
            Err(StoreError::IdempotencyKeyTaken(key)) => {
                // A concurrent request with the same key won the insert
                // race. Our reservations are surplus; release them and
                // defer to the winner.
                self.compensate(attempt).await;
                return match self.store.find_by_idempotency_key(&key).await? {
                    Some(winner) if winner.status == OrderStatus::Confirmed => {
                        metrics::counter!("order_saga_idempotent_replays_total").increment(1);
                        Ok(winner)
                    }
                    Some(winner) => Err(CreateOrderError::DuplicateRequest {
                        order_id: winner.id,
                        status: winner.status,
                    }),
                    None => Err(CreateOrderError::PersistenceFailed(format!(
                        "idempotency key {key} taken but holder not found"
                    ))),
                };
            }
            Err(error) => {
                self.compensate(attempt).await;
                return Err(CreateOrderError::PersistenceFailed(error.to_string()));
            }
        }

        match self
            .store
            .update_status(order.id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await
        {
            Ok(()) => {
                order.status = OrderStatus::Confirmed;
                Ok(order)
            }
            Err(StoreError::StaleState { order_id, .. }) => {
                self.compensate(attempt).await;
                self.cancel_best_effort(order.id).await;
                Err(CreateOrderError::StaleOrderState(order_id))
            }
            Err(error) => {
                self.compensate(attempt).await;
                self.cancel_best_effort(order.id).await;
                Err(CreateOrderError::PersistenceFailed(error.to_string()))
            }
        }
    }

    /// Enqueues the order.created event. Failure is logged and left for
    /// the reconciliation sweep; the confirmed order stands either way.
    async fn enqueue_event(&self, order: &Order) {
        let entry = OutboxEntry::order_created(order.id, order_created_payload(order));
        if let Err(error) = self.outbox.enqueue(entry).await {
            metrics::counter!("outbox_enqueue_failures_total").increment(1);
            warn!(order_id = %order.id, %error, "Outbox enqueue failed, sweep will backfill");
        }
    }

    /// Releases every reserved line of the attempt. A release that fails
    /// is parked on the backlog for the sweep to retry.
    async fn compensate(&self, attempt: &ReservationAttempt) {
        for (product_id, quantity) in attempt.reserved() {
            if let Err(error) = self.ledger.release(product_id, quantity).await {
                metrics::counter!("reservation_releases_failed_total").increment(1);
                warn!(%product_id, quantity, %error, "Release failed, parking on backlog");
                self.backlog.push(product_id.clone(), quantity);
            }
        }
    }

    /// Marks an orphaned pending row cancelled. Best effort: the row is
    /// already unreachable through the idempotency path only once a new
    /// key is used, and the sweep ignores non-confirmed orders.
    async fn cancel_best_effort(&self, order_id: common::OrderId) {
        if let Err(error) = self
            .store
            .update_status(order_id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await
        {
            warn!(%order_id, %error, "Could not cancel orphaned pending order");
        }
    }
}
