// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Reactive value wrapper
//!
//! [`Data`] holds a value decoded from the server together with the service
//! links it came with. A reactive wrapper re-reads its origin (the `self`
//! link) when it is read after its expiry; a non-reactive one never does
//! unless asked to.

use crate::batch::Task;
use crate::client::Client;
use crate::endpoint::Links;
use crate::error::{Error, Result};
use crate::transform::{parse_entity, ParsedEntity};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct DataState {
    node: Value,
    links: Links,
    labels: Vec<String>,
    rel_type: Option<String>,
    reactive: bool,
    ttl: Duration,
    expires_at: Instant,
}

/// A value decoded from the server, shared between clones
#[derive(Clone)]
pub struct Data {
    state: Arc<Mutex<DataState>>,
    client: Option<Client>,
}

impl Data {
    /// Wraps a plain value; it never refreshes
    pub fn new(value: Value) -> Self {
        Self::build(None, value, Links::new(), false)
    }

    pub(crate) fn from_entity(client: Option<Client>, parsed: ParsedEntity, reactive: bool) -> Self {
        let data = Self::build(client, Value::Null, Links::new(), reactive);
        data.replace(parsed);
        data
    }

    /// Placeholder for an entity whose payload is still on its way
    pub(crate) fn pending(client: Client, reactive: bool) -> Self {
        Self::build(Some(client), Value::Null, Links::new(), reactive)
    }

    fn build(client: Option<Client>, node: Value, links: Links, reactive: bool) -> Self {
        let ttl = client
            .as_ref()
            .map(|client| client.config().reactive_ttl())
            .unwrap_or_default();
        Self {
            state: Arc::new(Mutex::new(DataState {
                node,
                links,
                labels: Vec::new(),
                rel_type: None,
                reactive,
                ttl,
                expires_at: Instant::now() + ttl,
            })),
            client,
        }
    }

    /// Current value without any refresh
    pub fn peek(&self) -> Value {
        self.state.lock().node.clone()
    }

    pub fn is_reactive(&self) -> bool {
        self.state.lock().reactive
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.state.lock().expires_at
    }

    pub fn links(&self) -> Links {
        self.state.lock().links.clone()
    }

    /// Labels reported with the payload (nodes only)
    pub fn labels(&self) -> Vec<String> {
        self.state.lock().labels.clone()
    }

    pub(crate) fn set_labels(&self, labels: Vec<String>) {
        self.state.lock().labels = labels;
    }

    /// Relationship type reported with the payload
    pub fn rel_type(&self) -> Option<String> {
        self.state.lock().rel_type.clone()
    }

    pub fn link(&self, name: &str) -> Result<String> {
        self.state.lock().links.get(name).cloned().ok_or_else(|| {
            Error::Shape(format!("Payload carries no '{}' link", name))
        })
    }

    /// Reads the value, refreshing it first when reactive and expired
    pub async fn get(&self) -> Result<Value> {
        let stale = {
            let state = self.state.lock();
            state.reactive && Instant::now() >= state.expires_at
        };
        if stale {
            self.update(false).await?;
        }
        Ok(self.peek())
    }

    /// Re-fetches the value from its origin.
    ///
    /// Does nothing unless the wrapper is reactive or `force` is set, or when
    /// it has no origin to read from.
    pub async fn update(&self, force: bool) -> Result<()> {
        let origin = {
            let mut state = self.state.lock();
            if state.node.is_null() || !(state.reactive || force) {
                None
            } else {
                state.expires_at = Instant::now() + state.ttl;
                state.links.get("self").cloned()
            }
        };

        let (Some(client), Some(url)) = (&self.client, origin) else {
            return Ok(());
        };
        let payload = client.submit(Task::get(url)).await?;
        self.replace(parse_entity(&payload));
        Ok(())
    }

    /// Swaps in a freshly parsed payload when its value differs
    pub(crate) fn replace(&self, parsed: ParsedEntity) {
        let mut state = self.state.lock();
        if state.node != parsed.value {
            state.node = parsed.value;
        }
        if !parsed.links.is_empty() {
            state.links = parsed.links;
        }
        if let Some(labels) = parsed.labels {
            state.labels = labels;
        }
        if parsed.rel_type.is_some() {
            state.rel_type = parsed.rel_type;
        }
        state.expires_at = Instant::now() + state.ttl;
    }

    /// Mutates the local shadow copy of an object value
    pub(crate) fn modify<R>(&self, f: impl FnOnce(&mut Map<String, Value>) -> R) -> Option<R> {
        let mut state = self.state.lock();
        match &mut state.node {
            Value::Object(map) => Some(f(map)),
            _ => None,
        }
    }

    pub(crate) fn clear(&self) {
        self.state.lock().node = Value::Null;
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Data")
            .field("node", &state.node)
            .field("reactive", &state.reactive)
            .finish()
    }
}

/// Behavior shared by every value wrapper
#[async_trait]
pub trait Reactive: Send + Sync {
    fn data(&self) -> &Data;

    /// Waits until the wrapper is backed by server state
    async fn ready(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self) -> Result<Value> {
        self.ready().await?;
        self.data().get().await
    }

    async fn update(&self, force: bool) -> Result<()> {
        self.ready().await?;
        self.data().update(force).await
    }
}

impl Reactive for Data {
    fn data(&self) -> &Data {
        self
    }
}
