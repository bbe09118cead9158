//! Workflow registration by string name.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::WorkflowContext;
use crate::error::WorkflowError;

/// Boxed workflow entry point.
pub type WorkflowHandler =
    Arc<dyn Fn(WorkflowContext, Value) -> BoxFuture<'static, Result<(), WorkflowError>> + Send + Sync>;

/// Registry of workflow handlers keyed by name.
#[derive(Default, Clone)]
pub struct WorkflowRegistry {
    handlers: HashMap<&'static str, WorkflowHandler>,
}

impl WorkflowRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed workflow under a name.
    pub fn register<I, F, Fut>(&mut self, name: &'static str, workflow: F)
    where
        I: DeserializeOwned + Send + 'static,
        F: Fn(WorkflowContext, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), WorkflowError>> + Send + 'static,
    {
        let workflow = Arc::new(workflow);
        self.handlers.insert(
            name,
            Arc::new(move |ctx: WorkflowContext, input: Value| {
                let workflow = Arc::clone(&workflow);
                Box::pin(async move {
                    let input: I = serde_json::from_value(input)
                        .map_err(|e| WorkflowError::Serialization(e.to_string()))?;
                    workflow(ctx, input).await
                })
            }),
        );
    }

    /// Look up a workflow handler.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<WorkflowHandler> {
        self.handlers.get(name).cloned()
    }

    /// Whether a workflow is registered under this name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}
