//! End-to-end tests wiring the saga, the outbox drain and the
//! reconciliation sweep together over the in-memory backends.

use std::sync::Arc;
use std::time::Duration;

use common::{Money, ProductId, UserId};
use ledger::InMemoryLedger;
use orchestrator::{
    CreateOrderError, CreateOrderRequest, InMemoryEventBus, InMemoryUserDirectory, LineItem,
    MAX_DELIVERY_ATTEMPTS, OrderOrchestrator, OutboxDrain, ReconciliationSweep, ReleaseBacklog,
    RetryPolicy, TOPIC_ORDER_EVENTS,
};
use store::{
    DeliveryState, EVENT_ORDER_CREATED, InMemoryOrderStore, InMemoryOutbox, OrderStatus,
    OrderStore, Outbox,
};

struct System {
    directory: Arc<InMemoryUserDirectory>,
    ledger: Arc<InMemoryLedger>,
    store: Arc<InMemoryOrderStore>,
    outbox: Arc<InMemoryOutbox>,
    bus: Arc<InMemoryEventBus>,
    backlog: ReleaseBacklog,
    user_id: UserId,
}

impl System {
    fn new() -> Self {
        let directory = Arc::new(InMemoryUserDirectory::new());
        let user_id = UserId::new();
        directory.add_user(user_id);
        Self {
            directory,
            ledger: Arc::new(InMemoryLedger::new()),
            store: Arc::new(InMemoryOrderStore::new()),
            outbox: Arc::new(InMemoryOutbox::new()),
            bus: Arc::new(InMemoryEventBus::new()),
            backlog: ReleaseBacklog::new(),
            user_id,
        }
    }

    fn orchestrator(
        &self,
    ) -> OrderOrchestrator<InMemoryUserDirectory, InMemoryLedger, InMemoryOrderStore, InMemoryOutbox>
    {
        OrderOrchestrator::new(
            self.directory.clone(),
            self.ledger.clone(),
            self.store.clone(),
            self.outbox.clone(),
        )
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(1)))
        .with_release_backlog(self.backlog.clone())
    }

    fn drain(&self) -> OutboxDrain<InMemoryOutbox, InMemoryEventBus> {
        OutboxDrain::new(
            self.outbox.clone(),
            self.bus.clone(),
            Duration::from_millis(10),
        )
    }

    fn sweep(&self) -> ReconciliationSweep<InMemoryOrderStore, InMemoryOutbox, InMemoryLedger> {
        ReconciliationSweep::new(
            self.store.clone(),
            self.outbox.clone(),
            self.ledger.clone(),
            self.backlog.clone(),
            Duration::from_millis(10),
        )
    }

    fn request(&self, key: &str, items: Vec<LineItem>) -> CreateOrderRequest {
        CreateOrderRequest::new(key, self.user_id, items)
    }
}

#[tokio::test]
async fn confirmed_order_reaches_the_bus() {
    let system = System::new();
    system.ledger.set_stock("SKU-A", 5, Money::from_cents(1200));

    let order = system
        .orchestrator()
        .create_order(system.request("key-1", vec![LineItem::new("SKU-A", 3)]))
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Confirmed);
    assert_eq!(system.ledger.stock_of(&ProductId::new("SKU-A")), Some(2));

    let delivered = system.drain().run_once().await.unwrap();
    assert_eq!(delivered, 1);

    let events = system.bus.published();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].topic, TOPIC_ORDER_EVENTS);
    assert_eq!(events[0].event_type, EVENT_ORDER_CREATED);
    assert_eq!(events[0].payload["order_id"], serde_json::json!(order.id));
    assert_eq!(events[0].payload["total_amount_cents"], 3600);
    assert_eq!(events[0].payload["status"], "confirmed");
}

#[tokio::test]
async fn refused_order_leaves_no_trace() {
    let system = System::new();
    system.ledger.set_stock("SKU-A", 2, Money::from_cents(1200));

    let result = system
        .orchestrator()
        .create_order(system.request("key-1", vec![LineItem::new("SKU-A", 3)]))
        .await;

    assert!(matches!(
        result,
        Err(CreateOrderError::InsufficientStock { .. })
    ));
    assert_eq!(system.ledger.stock_of(&ProductId::new("SKU-A")), Some(2));
    assert_eq!(system.store.order_count(), 0);

    // Nothing to deliver, nothing to repair.
    assert_eq!(system.drain().run_once().await.unwrap(), 0);
    let report = system.sweep().run_once().await.unwrap();
    assert_eq!(report.re_enqueued, 0);
}

#[tokio::test]
async fn multi_line_abort_releases_every_reserved_line() {
    let system = System::new();
    system.ledger.set_stock("SKU-A", 10, Money::from_cents(1000));
    system.ledger.set_stock("SKU-B", 5, Money::from_cents(2000));

    let result = system
        .orchestrator()
        .create_order(system.request(
            "key-1",
            vec![LineItem::new("SKU-A", 2), LineItem::new("SKU-B", 999_999)],
        ))
        .await;

    assert!(matches!(
        result,
        Err(CreateOrderError::InsufficientStock { ref product_id })
            if product_id.as_str() == "SKU-B"
    ));
    assert_eq!(system.ledger.stock_of(&ProductId::new("SKU-A")), Some(10));
    assert_eq!(system.ledger.stock_of(&ProductId::new("SKU-B")), Some(5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_cannot_oversell() {
    let system = System::new();
    system.ledger.set_stock("SKU-A", 5, Money::from_cents(100));
    let orchestrator = Arc::new(system.orchestrator());

    let mut handles = Vec::new();
    for i in 0..2 {
        let orchestrator = orchestrator.clone();
        let request = system.request(&format!("key-{i}"), vec![LineItem::new("SKU-A", 3)]);
        handles.push(tokio::spawn(
            async move { orchestrator.create_order(request).await },
        ));
    }

    let mut confirmed = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => confirmed += 1,
            Err(CreateOrderError::InsufficientStock { .. }) => refused += 1,
            Err(other) => panic!("unexpected outcome: {other}"),
        }
    }

    assert_eq!(confirmed, 1);
    assert_eq!(refused, 1);
    assert_eq!(system.ledger.stock_of(&ProductId::new("SKU-A")), Some(2));
    assert_eq!(system.store.order_count(), 1);
}

#[tokio::test]
async fn replayed_request_emits_one_event_total() {
    let system = System::new();
    system.ledger.set_stock("SKU-A", 5, Money::from_cents(1000));
    let orchestrator = system.orchestrator();

    let request = system.request("key-1", vec![LineItem::new("SKU-A", 2)]);
    let first = orchestrator.create_order(request.clone()).await.unwrap();
    let second = orchestrator.create_order(request).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(system.ledger.stock_of(&ProductId::new("SKU-A")), Some(3));

    system.drain().run_once().await.unwrap();
    assert_eq!(system.bus.published_count(), 1);
}

#[tokio::test]
async fn sweep_backfills_event_after_enqueue_failure() {
    let system = System::new();
    system.ledger.set_stock("SKU-A", 5, Money::from_cents(1000));
    system.outbox.set_fail_enqueue(true);

    let order = system
        .orchestrator()
        .create_order(system.request("key-1", vec![LineItem::new("SKU-A", 1)]))
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Confirmed);
    assert!(!system.outbox.has_entry_for(order.id).await.unwrap());

    system.outbox.set_fail_enqueue(false);
    let report = system.sweep().run_once().await.unwrap();
    assert_eq!(report.re_enqueued, 1);

    let delivered = system.drain().run_once().await.unwrap();
    assert_eq!(delivered, 1);
    assert_eq!(
        system.bus.published()[0].payload["order_id"],
        serde_json::json!(order.id)
    );
}

#[tokio::test]
async fn bus_outage_dead_letters_but_keeps_order_confirmed() {
    let system = System::new();
    system.ledger.set_stock("SKU-A", 5, Money::from_cents(1000));
    system.bus.set_fail_publishes(true);

    let order = system
        .orchestrator()
        .create_order(system.request("key-1", vec![LineItem::new("SKU-A", 1)]))
        .await
        .unwrap();

    let drain = system.drain();
    for _ in 0..MAX_DELIVERY_ATTEMPTS {
        drain.run_once().await.unwrap();
    }

    assert_eq!(system.outbox.count_in_state(DeliveryState::DeadLettered), 1);
    let stored = system.store.get_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Confirmed);

    // The dead-lettered entry still marks the order as eventable, so the
    // sweep does not re-enqueue a duplicate.
    let report = system.sweep().run_once().await.unwrap();
    assert_eq!(report.re_enqueued, 0);
}

#[tokio::test]
async fn sweep_completes_release_parked_on_backlog() {
    let system = System::new();
    system.ledger.set_stock("SKU-A", 10, Money::from_cents(1000));
    system.ledger.set_stock("SKU-B", 0, Money::from_cents(500));
    system.ledger.set_fail_releases(true);

    let result = system
        .orchestrator()
        .create_order(system.request(
            "key-1",
            vec![LineItem::new("SKU-A", 4), LineItem::new("SKU-B", 1)],
        ))
        .await;

    assert!(matches!(
        result,
        Err(CreateOrderError::InsufficientStock { .. })
    ));
    // Release failed, stock still held, parked on the backlog.
    assert_eq!(system.ledger.stock_of(&ProductId::new("SKU-A")), Some(6));
    assert_eq!(system.backlog.len(), 1);

    system.ledger.set_fail_releases(false);
    let report = system.sweep().run_once().await.unwrap();
    assert_eq!(report.retried_releases, 1);
    assert_eq!(system.ledger.stock_of(&ProductId::new("SKU-A")), Some(10));
    assert!(system.backlog.is_empty());
}

#[tokio::test]
async fn background_workers_run_until_shutdown() {
    let system = System::new();
    system.ledger.set_stock("SKU-A", 5, Money::from_cents(1000));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let drain = system.drain();
    let sweep = system.sweep();
    let drain_rx = shutdown_rx.clone();
    let drain_task = tokio::spawn(async move { drain.run(drain_rx).await });
    let sweep_task = tokio::spawn(async move { sweep.run(shutdown_rx).await });

    let order = system
        .orchestrator()
        .create_order(system.request("key-1", vec![LineItem::new("SKU-A", 2)]))
        .await
        .unwrap();

    // Give the drain a few ticks to pick the entry up.
    for _ in 0..50 {
        if system.bus.published_count() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(system.bus.published_count(), 1);
    assert_eq!(
        system.bus.published()[0].payload["order_id"],
        serde_json::json!(order.id)
    );

    shutdown_tx.send(true).unwrap();
    drain_task.await.unwrap();
    sweep_task.await.unwrap();
}
