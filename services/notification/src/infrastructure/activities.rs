//! Workflow activities served on the notification task queue.

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use emporium_core::event::EventDispatcher;
use emporium_core::uow::UnitOfWork;
use emporium_workflow::error::ActivityError;
use emporium_workflow::{TaskQueueTransport, Worker, WorkflowRunStore};

use crate::app::{NotificationAppService, UserProjectionService};
use crate::domain::{
    NotificationPayload, NotificationRepository, ProjectedUser, ProjectedUserStatus,
    UserProjectionRepository,
};
use crate::infrastructure::workflows;
use crate::TASK_QUEUE;

/// Input of the `FindUser` activity.
#[derive(Debug, Deserialize)]
pub struct FindUserInput {
    /// User to look up.
    pub user_id: Uuid,
}

/// Input of the `SetUserStatus` activity.
#[derive(Debug, Deserialize)]
pub struct SetUserStatusInput {
    /// User to update.
    pub user_id: Uuid,
    /// Desired status.
    pub status: ProjectedUserStatus,
}

/// Build the notification worker with activities and workflows registered.
#[must_use]
pub fn build_worker<U>(
    notifications: Arc<NotificationAppService<U>>,
    users: Arc<UserProjectionService<U>>,
    transport: Arc<dyn TaskQueueTransport>,
    runs: Arc<dyn WorkflowRunStore>,
) -> Worker
where
    U: UnitOfWork + 'static,
    U::Provider: NotificationRepository + UserProjectionRepository + EventDispatcher,
{
    let mut worker = Worker::new(TASK_QUEUE, transport, runs);

    let store_users = Arc::clone(&users);
    worker.register_activity("StoreUser", move |user: ProjectedUser| {
        let users = Arc::clone(&store_users);
        async move { users.store_user(user).await.map_err(ActivityError::from) }
    });

    let find_users = Arc::clone(&users);
    worker.register_activity("FindUser", move |input: FindUserInput| {
        let users = Arc::clone(&find_users);
        async move { users.find_user(input.user_id).await.map_err(ActivityError::from) }
    });

    let status_users = users;
    worker.register_activity("SetUserStatus", move |input: SetUserStatusInput| {
        let users = Arc::clone(&status_users);
        async move {
            users
                .set_user_status(input.user_id, input.status)
                .await
                .map_err(ActivityError::from)
        }
    });

    worker.register_activity("CreateNotification", move |payload: NotificationPayload| {
        let notifications = Arc::clone(&notifications);
        async move {
            notifications
                .create_notification(payload)
                .await
                .map_err(ActivityError::from)
        }
    });

    workflows::register(&mut worker);
    worker
}
