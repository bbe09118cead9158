//! End-to-end order saga scenarios across the order, product and payment
//! contexts, wired in-process: in-memory units of work per service, the
//! in-process task transport between the three workers.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use uuid::Uuid;

use emporium_core::clock::SystemClock;
use emporium_order::app::{NewOrder, NewOrderItem, OrderAppService};
use emporium_order::domain::OrderStatus;
use emporium_order::testkit::{memory_service_with, MemoryOrderUow};
use emporium_payment::app::WalletAppService;
use emporium_payment::testkit::MemoryPaymentUow;
use emporium_product::app::{NewProduct, ProductAppService};
use emporium_product::testkit::MemoryProductUow;
use emporium_workflow::{
    InMemoryRunStore, InProcessTransport, RetryPolicy, TaskQueueTransport, WorkflowClient,
    WorkflowRunStore,
};

const WALLET_BALANCE: i64 = 1000;

struct Cluster {
    orders: Arc<OrderAppService<MemoryOrderUow>>,
    order_uow: MemoryOrderUow,
    products: Arc<ProductAppService<MemoryProductUow>>,
    wallets: Arc<WalletAppService<MemoryPaymentUow>>,
    payment_uow: MemoryPaymentUow,
}

/// Wire the three bounded contexts onto one in-process task transport.
fn cluster() -> Cluster {
    let transport = InProcessTransport::new();
    let runs = Arc::new(InMemoryRunStore::new());
    let fast_retry = RetryPolicy::default().with_initial_delay(Duration::from_millis(1));

    let product_uow = MemoryProductUow::default();
    let products = Arc::new(ProductAppService::new(
        product_uow.clone(),
        Arc::new(SystemClock),
    ));
    let product_worker = emporium_product::infrastructure::activities::build_worker(
        Arc::clone(&products),
        Arc::clone(&transport) as Arc<dyn TaskQueueTransport>,
        Arc::clone(&runs) as Arc<dyn WorkflowRunStore>,
    )
    .with_retry_policy(fast_retry.clone());
    transport.register(Arc::new(product_worker));

    let payment_uow = MemoryPaymentUow::default();
    let payments = Arc::new(emporium_payment::app::PaymentAppService::new(
        payment_uow.clone(),
        Arc::new(SystemClock),
    ));
    let wallets = Arc::new(WalletAppService::new(
        payment_uow.clone(),
        Arc::new(SystemClock),
        Decimal::from(WALLET_BALANCE),
    ));
    let payment_worker = emporium_payment::infrastructure::activities::build_worker(
        payments,
        Arc::clone(&wallets),
        Arc::clone(&transport) as Arc<dyn TaskQueueTransport>,
        Arc::clone(&runs) as Arc<dyn WorkflowRunStore>,
    )
    .with_retry_policy(fast_retry.clone());
    transport.register(Arc::new(payment_worker));

    let workflow_client = Arc::new(WorkflowClient::new(
        Arc::clone(&transport) as Arc<dyn TaskQueueTransport>,
        Arc::clone(&runs) as Arc<dyn WorkflowRunStore>,
    ));
    let (orders, order_uow) = memory_service_with(Arc::clone(&workflow_client));
    let orders = Arc::new(orders);
    let order_worker = emporium_order::infrastructure::activities::build_worker(
        Arc::clone(&orders),
        Arc::clone(&transport) as Arc<dyn TaskQueueTransport>,
        Arc::clone(&runs) as Arc<dyn WorkflowRunStore>,
    )
    .with_retry_policy(fast_retry);
    transport.register(Arc::new(order_worker));

    Cluster {
        orders,
        order_uow,
        products,
        wallets,
        payment_uow,
    }
}

async fn wait_for_status(
    orders: &OrderAppService<MemoryOrderUow>,
    order_id: Uuid,
    expected: OrderStatus,
) -> bool {
    for _ in 0..400 {
        let order = orders.find_order(order_id).await.expect("find order");
        if order.status == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

async fn wallet_balance(cluster: &Cluster) -> Decimal {
    cluster
        .payment_uow
        .read(|p| p.wallets.values().next().map(|w| w.balance))
        .await
        .expect("wallet exists")
}

async fn status_changes(order_uow: &MemoryOrderUow) -> Vec<(i32, i32)> {
    order_uow
        .read(|p| {
            p.outbox
                .iter()
                .filter(|e| e.event_type == "OrderStatusChanged")
                .map(|e| {
                    (
                        e.payload["from"].as_i64().expect("from") as i32,
                        e.payload["to"].as_i64().expect("to") as i32,
                    )
                })
                .collect()
        })
        .await
}

#[tokio::test]
async fn happy_path_reserves_charges_and_settles() {
    let cluster = cluster();

    let customer = Uuid::now_v7();
    cluster.wallets.create_wallet(customer).await.expect("wallet");
    let product = cluster
        .products
        .create_product(NewProduct {
            name: "widget".into(),
            price: Decimal::from(100),
            quantity: 10,
        })
        .await
        .expect("product");

    let order_id = cluster
        .orders
        .store_order(NewOrder {
            order_id: None,
            customer_id: customer,
            status: OrderStatus::Open,
            items: vec![NewOrderItem {
                product_id: product,
                count: 1,
                total_price: Decimal::from(100),
            }],
        })
        .await
        .expect("store order");

    assert!(wait_for_status(&cluster.orders, order_id, OrderStatus::Paid).await);

    let stock = cluster.products.find_product(product).await.expect("find").quantity;
    assert_eq!(stock, 9);
    assert_eq!(wallet_balance(&cluster).await, Decimal::from(WALLET_BALANCE - 100));

    // Open -> Pending -> Paid on the wire.
    let changes = status_changes(&cluster.order_uow).await;
    assert_eq!(changes, vec![(0, 1), (1, 2)]);
}

#[tokio::test]
async fn insufficient_funds_releases_reservations_and_cancels() {
    let cluster = cluster();

    let customer = Uuid::now_v7();
    cluster.wallets.create_wallet(customer).await.expect("wallet");
    let product = cluster
        .products
        .create_product(NewProduct {
            name: "widget".into(),
            price: Decimal::from(100),
            quantity: 10,
        })
        .await
        .expect("product");

    let order_id = cluster
        .orders
        .store_order(NewOrder {
            order_id: None,
            customer_id: customer,
            status: OrderStatus::Open,
            items: vec![NewOrderItem {
                product_id: product,
                count: 2,
                total_price: Decimal::from(WALLET_BALANCE + 500),
            }],
        })
        .await
        .expect("store order");

    assert!(wait_for_status(&cluster.orders, order_id, OrderStatus::Cancelled).await);

    // Reservation was compensated and the wallet never charged.
    let stock = cluster.products.find_product(product).await.expect("find").quantity;
    assert_eq!(stock, 10);
    assert_eq!(wallet_balance(&cluster).await, Decimal::from(WALLET_BALANCE));

    let changes = status_changes(&cluster.order_uow).await;
    assert_eq!(changes, vec![(0, 1), (1, 3)]);
}

#[tokio::test]
async fn out_of_stock_cancels_without_touching_the_wallet() {
    let cluster = cluster();

    let customer = Uuid::now_v7();
    cluster.wallets.create_wallet(customer).await.expect("wallet");
    let product = cluster
        .products
        .create_product(NewProduct {
            name: "widget".into(),
            price: Decimal::from(100),
            quantity: 0,
        })
        .await
        .expect("product");

    let order_id = cluster
        .orders
        .store_order(NewOrder {
            order_id: None,
            customer_id: customer,
            status: OrderStatus::Open,
            items: vec![NewOrderItem {
                product_id: product,
                count: 1,
                total_price: Decimal::from(100),
            }],
        })
        .await
        .expect("store order");

    assert!(wait_for_status(&cluster.orders, order_id, OrderStatus::Cancelled).await);
    assert_eq!(wallet_balance(&cluster).await, Decimal::from(WALLET_BALANCE));
}

#[tokio::test]
async fn partial_reservation_is_released_on_failure() {
    let cluster = cluster();

    let customer = Uuid::now_v7();
    cluster.wallets.create_wallet(customer).await.expect("wallet");
    let in_stock = cluster
        .products
        .create_product(NewProduct {
            name: "available".into(),
            price: Decimal::from(10),
            quantity: 5,
        })
        .await
        .expect("product");
    let sold_out = cluster
        .products
        .create_product(NewProduct {
            name: "sold-out".into(),
            price: Decimal::from(10),
            quantity: 0,
        })
        .await
        .expect("product");

    let order_id = cluster
        .orders
        .store_order(NewOrder {
            order_id: None,
            customer_id: customer,
            status: OrderStatus::Open,
            items: vec![
                NewOrderItem {
                    product_id: in_stock,
                    count: 2,
                    total_price: Decimal::from(20),
                },
                NewOrderItem {
                    product_id: sold_out,
                    count: 1,
                    total_price: Decimal::from(10),
                },
            ],
        })
        .await
        .expect("store order");

    assert!(wait_for_status(&cluster.orders, order_id, OrderStatus::Cancelled).await);

    // The successful reservation on the first product was released.
    let stock = cluster.products.find_product(in_stock).await.expect("find").quantity;
    assert_eq!(stock, 5);
    assert_eq!(wallet_balance(&cluster).await, Decimal::from(WALLET_BALANCE));
}

#[tokio::test]
async fn duplicate_store_order_requests_run_one_saga() {
    let cluster = cluster();

    let customer = Uuid::now_v7();
    cluster.wallets.create_wallet(customer).await.expect("wallet");
    let product = cluster
        .products
        .create_product(NewProduct {
            name: "widget".into(),
            price: Decimal::from(100),
            quantity: 10,
        })
        .await
        .expect("product");

    let order_id = cluster
        .orders
        .store_order(NewOrder {
            order_id: None,
            customer_id: customer,
            status: OrderStatus::Open,
            items: vec![NewOrderItem {
                product_id: product,
                count: 1,
                total_price: Decimal::from(100),
            }],
        })
        .await
        .expect("store order");

    assert!(wait_for_status(&cluster.orders, order_id, OrderStatus::Paid).await);

    // Re-storing the settled order is accepted and must not start a second
    // saga run: the workflow id dedups and the order stays terminal.
    cluster
        .orders
        .store_order(NewOrder {
            order_id: Some(order_id),
            customer_id: customer,
            status: OrderStatus::Paid,
            items: vec![],
        })
        .await
        .expect("idempotent store");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stock = cluster.products.find_product(product).await.expect("find").quantity;
    assert_eq!(stock, 9);
    assert_eq!(wallet_balance(&cluster).await, Decimal::from(WALLET_BALANCE - 100));
}
