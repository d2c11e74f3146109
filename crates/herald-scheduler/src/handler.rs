use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

/// Code that runs when a job with a matching [`Invocation::handler`](crate::Invocation) is due.
///
/// Handlers may be invoked more than once for the same job (see the crate
/// docs), so they must tolerate duplicates.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, args: serde_json::Value) -> Result<(), String>;
}

/// Handler id → handler. Populated once at startup, then shared read-only.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `id`, replacing any previous registration.
    pub fn register(&mut self, id: impl Into<String>, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(id.into(), handler);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(id).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
