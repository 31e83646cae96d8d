//! Dispatch handler registry
//!
//! Populated once by the host process before any shard starts, then shared
//! read-only by every connection.

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::client::Client;
use crate::error::{BoxError, GatewayError};
use crate::gateway::Envelope;
use crate::shard::ShardHandle;

/// Handles one or more named dispatch events
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn run(
        &self,
        envelope: Arc<Envelope>,
        shard: ShardHandle,
        client: Client,
    ) -> Result<(), BoxError>;
}

/// Adapter turning an async closure into an [`EventHandler`]
pub struct HandlerFn<F>(F);

#[async_trait]
impl<F, Fut> EventHandler for HandlerFn<F>
where
    F: Fn(Arc<Envelope>, ShardHandle, Client) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn run(
        &self,
        envelope: Arc<Envelope>,
        shard: ShardHandle,
        client: Client,
    ) -> Result<(), BoxError> {
        (self.0)(envelope, shard, client).await
    }
}

pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(Arc<Envelope>, ShardHandle, Client) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(HandlerFn(f))
}

/// Runs several handlers for one event, in order.
///
/// Every handler runs even if an earlier one fails; the first error is
/// returned.
pub struct HandlerChain(Vec<Arc<dyn EventHandler>>);

#[async_trait]
impl EventHandler for HandlerChain {
    async fn run(
        &self,
        envelope: Arc<Envelope>,
        shard: ShardHandle,
        client: Client,
    ) -> Result<(), BoxError> {
        let mut first_error = None;
        for handler in &self.0 {
            if let Err(e) = handler
                .run(Arc::clone(&envelope), shard.clone(), client.clone())
                .await
            {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

pub fn chain(handlers: Vec<Arc<dyn EventHandler>>) -> Arc<dyn EventHandler> {
    Arc::new(HandlerChain(handlers))
}

/// Event name → handler mapping
#[derive(Default, Clone)]
pub struct EventRegistry {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for the dispatch named `name`.
    ///
    /// Names must look like gateway event names (`GUILD_CREATE`). A second
    /// registration under the same name replaces the first.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), GatewayError> {
        let name = name.into();
        validate_event_name(&name)?;
        if self.handlers.insert(name.clone(), handler).is_some() {
            debug!(event_name = %name, "Replaced existing handler");
        } else {
            debug!(event_name = %name, "Loaded event handler");
        }
        Ok(())
    }

    /// Register one handler under several names
    pub fn register_all<I, S>(
        &mut self,
        names: I,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), GatewayError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.register(name, Arc::clone(&handler))?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn EventHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered event names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("events", &self.names())
            .finish()
    }
}

fn validate_event_name(name: &str) -> Result<(), GatewayError> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(GatewayError::Registry(format!(
            "invalid event name '{name}': expected UPPER_SNAKE_CASE"
        )))
    }
}
