//! User lifecycle fan-out across the payment and notification contexts:
//! one `user_created` fact provisions a wallet and a welcome notification,
//! and replayed deliveries leave every subscriber unchanged.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use uuid::Uuid;

use emporium_core::bus::{Delivery, Disposition, EventRouter};
use emporium_core::clock::SystemClock;
use emporium_core::event::EventEnvelope;
use emporium_notification::app::{NotificationAppService, UserProjectionService};
use emporium_notification::domain::ProjectedUserStatus;
use emporium_notification::testkit::MemoryNotificationUow;
use emporium_payment::app::{PaymentAppService, WalletAppService};
use emporium_payment::testkit::MemoryPaymentUow;
use emporium_user::app::NewUser;
use emporium_user::domain::{UserStatus, UserUpdate};
use emporium_user::testkit::memory_service as user_memory_service;
use emporium_workflow::{
    InMemoryRunStore, InProcessTransport, RetryPolicy, TaskQueueTransport, WorkflowClient,
    WorkflowRunStore,
};

const SEED_BALANCE: i64 = 100_000;

struct FanOut {
    payment_router: EventRouter,
    notification_router: EventRouter,
    payment_uow: MemoryPaymentUow,
    notification_uow: MemoryNotificationUow,
}

fn fan_out() -> FanOut {
    let transport = InProcessTransport::new();
    let runs = Arc::new(InMemoryRunStore::new());
    let fast_retry = RetryPolicy::default().with_initial_delay(Duration::from_millis(1));

    let payment_uow = MemoryPaymentUow::default();
    let payments = Arc::new(PaymentAppService::new(
        payment_uow.clone(),
        Arc::new(SystemClock),
    ));
    let wallets = Arc::new(WalletAppService::new(
        payment_uow.clone(),
        Arc::new(SystemClock),
        Decimal::from(SEED_BALANCE),
    ));
    let payment_worker = emporium_payment::infrastructure::activities::build_worker(
        payments,
        wallets,
        Arc::clone(&transport) as Arc<dyn TaskQueueTransport>,
        Arc::clone(&runs) as Arc<dyn WorkflowRunStore>,
    )
    .with_retry_policy(fast_retry.clone());
    transport.register(Arc::new(payment_worker));

    let notification_uow = MemoryNotificationUow::default();
    let notifications = Arc::new(NotificationAppService::new(
        notification_uow.clone(),
        Arc::new(SystemClock),
    ));
    let users = Arc::new(UserProjectionService::new(notification_uow.clone()));
    let notification_worker = emporium_notification::infrastructure::activities::build_worker(
        notifications,
        users,
        Arc::clone(&transport) as Arc<dyn TaskQueueTransport>,
        Arc::clone(&runs) as Arc<dyn WorkflowRunStore>,
    )
    .with_retry_policy(fast_retry);
    transport.register(Arc::new(notification_worker));

    let client = Arc::new(WorkflowClient::new(
        Arc::clone(&transport) as Arc<dyn TaskQueueTransport>,
        runs as Arc<dyn WorkflowRunStore>,
    ));
    let payment_router = emporium_payment::infrastructure::ingress::event_router(Arc::clone(&client));
    let notification_router = emporium_notification::infrastructure::ingress::event_router(client);

    FanOut {
        payment_router,
        notification_router,
        payment_uow,
        notification_uow,
    }
}

async fn deliver(router: &EventRouter, envelope: &EventEnvelope) {
    let delivery = Delivery::from_envelope(envelope).expect("encodable");
    assert_eq!(router.dispatch(delivery).await, Disposition::Ack);
}

async fn wait_until<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..400 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn user_created_provisions_wallet_and_welcome_notification() {
    let fan_out = fan_out();
    let (user_service, user_uow) = user_memory_service();

    let user_id = user_service
        .create_user(NewUser {
            login: "u".into(),
            email: Some("u@x".into()),
            telegram: Some("@u".into()),
            status: Some(UserStatus::Active),
        })
        .await
        .expect("create user");

    let created = user_uow
        .read(|p| p.outbox.first().cloned())
        .await
        .expect("user_created envelope");
    assert_eq!(created.event_type, "user_created");

    deliver(&fan_out.payment_router, &created).await;
    deliver(&fan_out.notification_router, &created).await;

    let payment_uow = fan_out.payment_uow.clone();
    assert!(
        wait_until(|| {
            let payment_uow = payment_uow.clone();
            async move {
                payment_uow
                    .read(|p| {
                        p.wallets
                            .values()
                            .any(|w| w.user_id == user_id && w.balance == Decimal::from(SEED_BALANCE))
                    })
                    .await
            }
        })
        .await,
        "wallet was provisioned"
    );

    let notification_uow = fan_out.notification_uow.clone();
    assert!(
        wait_until(|| {
            let notification_uow = notification_uow.clone();
            async move {
                notification_uow
                    .read(|p| {
                        p.notifications.values().any(|n| {
                            n.payload.email == "u@x" && n.payload.message == "User Created"
                        })
                    })
                    .await
            }
        })
        .await,
        "welcome notification was recorded"
    );

    // The projection landed too.
    let projected = fan_out
        .notification_uow
        .read(|p| p.users.get(&user_id).cloned())
        .await
        .expect("projection stored");
    assert_eq!(projected.login, "u");

    // Redelivery of the same fact is absorbed by the workflow-id dedup.
    deliver(&fan_out.payment_router, &created).await;
    deliver(&fan_out.notification_router, &created).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let wallet_count = fan_out.payment_uow.read(|p| p.wallets.len()).await;
    assert_eq!(wallet_count, 1);
    let notification_count = fan_out.notification_uow.read(|p| p.notifications.len()).await;
    assert_eq!(notification_count, 1);
}

#[tokio::test]
async fn replayed_user_updated_leaves_projection_unchanged() {
    let fan_out = fan_out();
    let (user_service, user_uow) = user_memory_service();

    let user_id = user_service
        .create_user(NewUser {
            login: "u".into(),
            email: Some("u@x".into()),
            telegram: None,
            status: Some(UserStatus::Active),
        })
        .await
        .expect("create user");

    let created = user_uow
        .read(|p| p.outbox.first().cloned())
        .await
        .expect("user_created envelope");
    deliver(&fan_out.notification_router, &created).await;

    let notification_uow = fan_out.notification_uow.clone();
    assert!(
        wait_until(|| {
            let notification_uow = notification_uow.clone();
            async move {
                notification_uow
                    .read(|p| p.users.contains_key(&user_id))
                    .await
            }
        })
        .await,
        "projection stored"
    );

    // The user loses their only contact channel.
    user_service
        .update_user(
            user_id,
            UserUpdate {
                email: emporium_core::Patch::Clear,
                ..UserUpdate::default()
            },
        )
        .await
        .expect("clear email");

    let updated = user_uow
        .read(|p| {
            p.outbox
                .iter()
                .find(|e| e.event_type == "user_updated")
                .cloned()
        })
        .await
        .expect("user_updated envelope");

    // Two deliveries with distinct correlation ids force two workflow
    // runs; the second application must change nothing.
    deliver(
        &fan_out.notification_router,
        &updated.clone().with_correlation_id("delivery-1"),
    )
    .await;

    let notification_uow = fan_out.notification_uow.clone();
    assert!(
        wait_until(|| {
            let notification_uow = notification_uow.clone();
            async move {
                notification_uow
                    .read(|p| {
                        p.users
                            .get(&user_id)
                            .is_some_and(|u| u.status == ProjectedUserStatus::Blocked)
                    })
                    .await
            }
        })
        .await,
        "user was blocked after losing contact info"
    );

    let after_first = fan_out.notification_uow.read(|p| p.users.clone()).await;

    deliver(
        &fan_out.notification_router,
        &updated.with_correlation_id("delivery-2"),
    )
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let after_second = fan_out.notification_uow.read(|p| p.users.clone()).await;
    assert_eq!(after_first, after_second);
}
