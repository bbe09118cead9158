//! Activity registration and invocation by string name.
//!
//! Workers in different services register handlers independently; callers
//! invoke activities by explicit name so no service links another's code.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ActivityError;

/// One activity invocation on a task queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityCall {
    /// Registered activity name.
    pub activity: String,
    /// JSON input for the handler.
    pub input: Value,
    /// Unique id of this attempt, for tracing.
    pub call_id: Uuid,
}

impl ActivityCall {
    /// Build a call with a fresh attempt id.
    #[must_use]
    pub fn new(activity: impl Into<String>, input: Value) -> Self {
        Self {
            activity: activity.into(),
            input,
            call_id: Uuid::now_v7(),
        }
    }
}

type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, ActivityError>> + Send + Sync>;

/// Registry of activity handlers keyed by name.
#[derive(Default, Clone)]
pub struct ActivityRegistry {
    handlers: HashMap<&'static str, Handler>,
}

impl ActivityRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed handler under a name.
    ///
    /// Input is deserialized into `I`, the output serialized back to JSON.
    /// Handlers returning `()` serialize to JSON null.
    pub fn register<I, O, F, Fut>(&mut self, name: &'static str, handler: F)
    where
        I: DeserializeOwned + Send + 'static,
        O: Serialize + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, ActivityError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.handlers.insert(
            name,
            Arc::new(move |input: Value| {
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    let input: I = serde_json::from_value(input)
                        .map_err(|e| ActivityError::Application(format!("invalid input: {e}")))?;
                    let output = handler(input).await?;
                    serde_json::to_value(output)
                        .map_err(|e| ActivityError::Application(format!("invalid output: {e}")))
                })
            }),
        );
    }

    /// Run one call against the registry.
    ///
    /// # Errors
    ///
    /// [`ActivityError::NotRegistered`] for unknown names, otherwise
    /// whatever the handler returned.
    pub async fn invoke(&self, call: ActivityCall) -> Result<Value, ActivityError> {
        let handler = self
            .handlers
            .get(call.activity.as_str())
            .cloned()
            .ok_or_else(|| ActivityError::NotRegistered(call.activity.clone()))?;
        handler(call.input).await
    }

    /// Whether a handler is registered under this name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct AddInput {
        a: i64,
        b: i64,
    }

    #[tokio::test]
    async fn invokes_registered_handler_by_name() {
        let mut registry = ActivityRegistry::new();
        registry.register("Add", |input: AddInput| async move { Ok(input.a + input.b) });

        let result = registry
            .invoke(ActivityCall::new("Add", serde_json::json!({"a": 2, "b": 3})))
            .await
            .expect("handler succeeds");
        assert_eq!(result, serde_json::json!(5));
    }

    #[tokio::test]
    async fn unknown_activity_is_rejected() {
        let registry = ActivityRegistry::new();
        let err = registry
            .invoke(ActivityCall::new("Missing", Value::Null))
            .await
            .expect_err("no handler");
        assert!(matches!(err, ActivityError::NotRegistered(name) if name == "Missing"));
    }

    #[tokio::test]
    async fn unit_output_serializes_to_null() {
        let mut registry = ActivityRegistry::new();
        registry.register("Noop", |_: Value| async move { Ok(()) });

        let result = registry
            .invoke(ActivityCall::new("Noop", Value::Null))
            .await
            .expect("handler succeeds");
        assert_eq!(result, Value::Null);
    }

    #[tokio::test]
    async fn invalid_input_fails_the_call() {
        let mut registry = ActivityRegistry::new();
        registry.register("Add", |input: AddInput| async move { Ok(input.a + input.b) });

        let err = registry
            .invoke(ActivityCall::new("Add", serde_json::json!("nope")))
            .await
            .expect_err("bad input");
        assert!(matches!(err, ActivityError::Application(_)));
    }
}
