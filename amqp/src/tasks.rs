//! Task queues over AMQP.
//!
//! Activity calls are request/response: the caller publishes the call to
//! the owner's queue with a `reply_to` pointing at its exclusive reply
//! queue and matches replies by correlation id. Workflow submissions are
//! one-way; durability comes from the run store, not the broker.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    QueueDeclareOptions,
};
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tracing::{error, info, warn};
use uuid::Uuid;

use emporium_workflow::activity::ActivityCall;
use emporium_workflow::error::{ActivityError, WorkflowError};
use emporium_workflow::transport::{TaskQueueTransport, WorkflowSubmission};
use emporium_workflow::worker::Worker;

const KIND_ACTIVITY: &str = "activity.call";
const KIND_WORKFLOW: &str = "workflow.submit";

fn short(value: &str) -> ShortString {
    ShortString::from(value.to_string())
}

/// Wire form of an activity outcome.
#[derive(Debug, Serialize, Deserialize)]
enum ActivityReply {
    /// Handler output.
    Ok(Value),
    /// Handler or dispatch failure, stringified.
    Err(String),
}

type PendingReplies = Arc<Mutex<HashMap<String, oneshot::Sender<ActivityReply>>>>;

/// Removes a pending reply slot when a caller gives up (timeout, drop).
struct PendingGuard {
    pending: PendingReplies,
    key: String,
    armed: bool,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Ok(mut pending) = self.pending.lock() {
                pending.remove(&self.key);
            }
        }
    }
}

/// Caller side of the AMQP task transport.
pub struct AmqpTaskTransport {
    channel: Channel,
    reply_queue: String,
    pending: PendingReplies,
    declared: Mutex<HashSet<String>>,
}

impl AmqpTaskTransport {
    /// Set up the exclusive reply queue and its consumer.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Transport`] when broker setup fails.
    pub async fn new(connection: &Connection) -> Result<Arc<Self>, WorkflowError> {
        let channel = connection
            .create_channel()
            .await
            .map_err(transport_err)?;
        let reply_queue = channel
            .queue_declare(
                "",
                QueueDeclareOptions {
                    exclusive: true,
                    auto_delete: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(transport_err)?
            .name()
            .to_string();

        let transport = Arc::new(Self {
            channel: channel.clone(),
            reply_queue: reply_queue.clone(),
            pending: Arc::new(Mutex::new(HashMap::new())),
            declared: Mutex::new(HashSet::new()),
        });

        let mut consumer = channel
            .basic_consume(
                &reply_queue,
                "emporium-task-replies",
                BasicConsumeOptions {
                    no_ack: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(transport_err)?;

        let pending = Arc::clone(&transport.pending);
        tokio::spawn(async move {
            while let Some(delivery) = consumer.next().await {
                let Ok(delivery) = delivery else {
                    warn!("task reply stream error");
                    continue;
                };
                let Some(correlation_id) =
                    delivery.properties.correlation_id().clone().map(|s| s.to_string())
                else {
                    warn!("task reply without correlation id, dropping");
                    continue;
                };
                let sender = pending
                    .lock()
                    .ok()
                    .and_then(|mut pending| pending.remove(&correlation_id));
                let Some(sender) = sender else {
                    // Caller already gave up on this attempt.
                    continue;
                };
                match serde_json::from_slice::<ActivityReply>(&delivery.data) {
                    Ok(reply) => {
                        let _ = sender.send(reply);
                    }
                    Err(err) => {
                        let _ = sender.send(ActivityReply::Err(format!(
                            "undecodable activity reply: {err}"
                        )));
                    }
                }
            }
        });

        Ok(transport)
    }

    async fn declare_queue(&self, queue: &str) -> Result<(), lapin::Error> {
        {
            if let Ok(declared) = self.declared.lock() {
                if declared.contains(queue) {
                    return Ok(());
                }
            }
        }
        self.channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        if let Ok(mut declared) = self.declared.lock() {
            declared.insert(queue.to_string());
        }
        Ok(())
    }

    async fn publish(
        &self,
        queue: &str,
        kind: &str,
        body: &[u8],
        properties: BasicProperties,
    ) -> Result<(), lapin::Error> {
        self.declare_queue(queue).await?;
        self.channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                body,
                properties.with_kind(short(kind)),
            )
            .await?
            .await?;
        Ok(())
    }
}

fn transport_err(err: lapin::Error) -> WorkflowError {
    WorkflowError::Transport(err.to_string())
}

#[async_trait]
impl TaskQueueTransport for AmqpTaskTransport {
    async fn call_activity(
        &self,
        queue: &str,
        call: ActivityCall,
    ) -> Result<Value, ActivityError> {
        let correlation_id = Uuid::now_v7().to_string();
        let (sender, receiver) = oneshot::channel();
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(correlation_id.clone(), sender);
        }
        let mut guard = PendingGuard {
            pending: Arc::clone(&self.pending),
            key: correlation_id.clone(),
            armed: true,
        };

        let body = serde_json::to_vec(&call)
            .map_err(|e| ActivityError::Transport(e.to_string()))?;
        let properties = BasicProperties::default()
            .with_correlation_id(short(&correlation_id))
            .with_reply_to(short(&self.reply_queue));
        self.publish(queue, KIND_ACTIVITY, &body, properties)
            .await
            .map_err(|e| ActivityError::Transport(e.to_string()))?;

        match receiver.await {
            Ok(ActivityReply::Ok(value)) => {
                guard.armed = false;
                Ok(value)
            }
            Ok(ActivityReply::Err(message)) => {
                guard.armed = false;
                Err(ActivityError::Application(message))
            }
            Err(_) => Err(ActivityError::Transport(
                "task reply channel closed".to_string(),
            )),
        }
    }

    async fn submit_workflow(
        &self,
        queue: &str,
        submission: WorkflowSubmission,
    ) -> Result<(), WorkflowError> {
        let body = serde_json::to_vec(&submission)
            .map_err(|e| WorkflowError::Serialization(e.to_string()))?;
        self.publish(queue, KIND_WORKFLOW, &body, BasicProperties::default())
            .await
            .map_err(transport_err)
    }
}

/// Server side: consumes a worker's task queue.
pub struct AmqpTaskServer {
    connection: Arc<Connection>,
    worker: Arc<Worker>,
    prefetch: u16,
    shutdown: broadcast::Receiver<()>,
}

impl AmqpTaskServer {
    /// Server pulling work for the given worker's queue.
    #[must_use]
    pub fn new(
        connection: Arc<Connection>,
        worker: Arc<Worker>,
        prefetch: u16,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            connection,
            worker,
            prefetch,
            shutdown,
        }
    }

    /// Run the consume loop until shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Transport`] when the queue cannot be
    /// consumed; in-flight handler failures are replied to the caller, not
    /// returned.
    pub async fn run(mut self) -> Result<(), WorkflowError> {
        let queue = self.worker.queue().to_string();
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(transport_err)?;
        channel
            .basic_qos(self.prefetch, BasicQosOptions::default())
            .await
            .map_err(transport_err)?;
        channel
            .queue_declare(
                &queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(transport_err)?;

        let mut consumer = channel
            .basic_consume(
                &queue,
                "emporium-task-worker",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(transport_err)?;

        info!(%queue, "task worker consuming");

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(%queue, "task worker received shutdown signal");
                    return Ok(());
                }
                delivery = consumer.next() => {
                    let Some(delivery) = delivery else {
                        warn!(%queue, "task stream ended");
                        return Ok(());
                    };
                    let delivery = delivery.map_err(transport_err)?;
                    self.handle_delivery(&channel, delivery).await;
                }
            }
        }
    }

    async fn handle_delivery(&self, channel: &Channel, delivery: lapin::message::Delivery) {
        let kind = delivery
            .properties
            .kind()
            .clone()
            .map(|s| s.to_string())
            .unwrap_or_default();

        match kind.as_str() {
            KIND_ACTIVITY => {
                let reply = match serde_json::from_slice::<ActivityCall>(&delivery.data) {
                    Ok(call) => match self.worker.handle_activity(call).await {
                        Ok(value) => ActivityReply::Ok(value),
                        Err(err) => ActivityReply::Err(err.to_string()),
                    },
                    Err(err) => ActivityReply::Err(format!("undecodable activity call: {err}")),
                };
                if let Some(reply_to) = delivery.properties.reply_to().clone() {
                    let correlation = delivery.properties.correlation_id().clone();
                    if let Err(err) = send_reply(channel, reply_to.as_str(), correlation, &reply).await {
                        error!(error = %err, "failed to send activity reply");
                    }
                }
            }
            KIND_WORKFLOW => match serde_json::from_slice::<WorkflowSubmission>(&delivery.data) {
                Ok(submission) => {
                    let worker = Arc::clone(&self.worker);
                    tokio::spawn(async move {
                        worker.handle_submission(submission).await;
                    });
                }
                Err(err) => {
                    error!(error = %err, "undecodable workflow submission, dropping");
                }
            },
            other => {
                warn!(kind = %other, "unknown task message kind, dropping");
            }
        }

        if let Err(err) = delivery.ack(BasicAckOptions::default()).await {
            error!(error = %err, "failed to ack task delivery");
        }
    }
}

async fn send_reply(
    channel: &Channel,
    reply_to: &str,
    correlation_id: Option<ShortString>,
    reply: &ActivityReply,
) -> Result<(), lapin::Error> {
    let body = serde_json::to_vec(reply).unwrap_or_else(|_| b"{\"Err\":\"unserializable\"}".to_vec());
    let mut properties = BasicProperties::default();
    if let Some(correlation_id) = correlation_id {
        properties = properties.with_correlation_id(correlation_id);
    }
    channel
        .basic_publish("", reply_to, BasicPublishOptions::default(), &body, properties)
        .await?
        .await?;
    Ok(())
}
