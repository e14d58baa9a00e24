// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Shared machinery for node and relationship wrappers
//!
//! An entity wrapper is returned to the caller immediately; the create or
//! fetch call that backs it completes in the background and flips a readiness
//! signal. Every operation awaits that signal first.

use crate::batch::{Task, TaskHandle};
use crate::client::Client;
use crate::data::Data;
use crate::error::{Error, Result};
use crate::transform::{classify, parse_entity, ParsedEntity, Shape};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq)]
enum Readiness {
    Pending,
    Ready,
    Failed(String),
}

pub(crate) struct EntityCore {
    pub(crate) client: Client,
    pub(crate) data: Data,
    kind: &'static str,
    id: OnceLock<u64>,
    span: OnceLock<(u64, u64)>,
    ready: watch::Sender<Readiness>,
}

impl EntityCore {
    /// Core for a payload that is already at hand
    pub(crate) fn loaded(client: &Client, kind: &'static str, parsed: ParsedEntity, reactive: bool) -> Self {
        let core = Self::new(client, kind, Data::pending(client.clone(), reactive), Readiness::Ready);
        core.absorb_identity(&parsed);
        core.data.replace(parsed);
        core
    }

    /// Core whose payload arrives once `request` completes
    pub(crate) fn spawn(
        client: &Client,
        kind: &'static str,
        request: Result<TaskHandle>,
        reactive: bool,
    ) -> Arc<Self> {
        let core = Arc::new(Self::new(
            client,
            kind,
            Data::pending(client.clone(), reactive),
            Readiness::Pending,
        ));

        match request {
            Ok(handle) => {
                let pending = Arc::clone(&core);
                tokio::spawn(async move {
                    match handle.await {
                        Ok(payload) if matches!(classify(&payload), Shape::Entity(_)) => {
                            pending.resolve(parse_entity(&payload))
                        }
                        Ok(_) => pending.fail(format!(
                            "{} was not created correctly, the server returned no metadata",
                            pending.kind
                        )),
                        Err(e) => pending.fail(e.to_string()),
                    }
                });
            }
            Err(e) => core.fail(e.to_string()),
        }
        core
    }

    fn new(client: &Client, kind: &'static str, data: Data, readiness: Readiness) -> Self {
        let (ready, _) = watch::channel(readiness);
        Self {
            client: client.clone(),
            data,
            kind,
            id: OnceLock::new(),
            span: OnceLock::new(),
            ready,
        }
    }

    fn absorb_identity(&self, parsed: &ParsedEntity) {
        if let Some(id) = parsed.id {
            let _ = self.id.set(id);
        }
        if let (Some(start), Some(end)) = (parsed.start, parsed.end) {
            let _ = self.span.set((start, end));
        }
    }

    fn resolve(&self, parsed: ParsedEntity) {
        self.absorb_identity(&parsed);
        self.data.replace(parsed);
        log::debug!("{} {:?} is ready", self.kind, self.id());
        self.ready.send_replace(Readiness::Ready);
    }

    fn fail(&self, reason: String) {
        log::warn!("{} could not be loaded: {}", self.kind, reason);
        self.ready.send_replace(Readiness::Failed(reason));
    }

    pub(crate) fn id(&self) -> Option<u64> {
        self.id.get().copied()
    }

    pub(crate) fn span(&self) -> Option<(u64, u64)> {
        self.span.get().copied()
    }

    pub(crate) fn is_ready(&self) -> bool {
        *self.ready.borrow() == Readiness::Ready
    }

    pub(crate) async fn wait_ready(&self) -> Result<()> {
        let mut rx = self.ready.subscribe();
        if *rx.borrow() == Readiness::Pending {
            self.client.scheduler().yielding();
        }
        let state = rx
            .wait_for(|state| *state != Readiness::Pending)
            .await
            .map(|state| state.clone())
            .map_err(|_| Error::Unavailable(format!("{} was dropped before loading", self.kind)))?;

        match state {
            Readiness::Failed(reason) => Err(Error::Unavailable(format!("{}: {}", self.kind, reason))),
            _ => Ok(()),
        }
    }

    /// Id of a ready entity
    pub(crate) async fn require_id(&self) -> Result<u64> {
        self.wait_ready().await?;
        self.id()
            .ok_or_else(|| Error::Shape(format!("{} payload carries no id", self.kind)))
    }

    pub(crate) fn link(&self, name: &str) -> Result<String> {
        self.data.link(name)
    }

    /// Sends a write without waiting for the server's confirmation
    pub(crate) fn fire(&self, task: Task) {
        let description = format!("{} {}", task.method, task.to);
        match self.client.scheduler().enqueue(task) {
            Ok(handle) => {
                tokio::spawn(async move {
                    if let Err(e) = handle.await {
                        log::warn!("Background write {} failed: {}", description, e);
                    }
                });
            }
            Err(e) => log::warn!("Background write {} rejected: {}", description, e),
        }
    }
}

impl fmt::Debug for EntityCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.kind)
            .field("id", &self.id())
            .field("ready", &*self.ready.borrow())
            .field("data", &self.data)
            .finish()
    }
}

/// Checks that a value can be stored as a property
pub(crate) fn check_property(name: &str, value: &Value) -> Result<()> {
    fn scalar_kind(value: &Value) -> Option<u8> {
        match value {
            Value::String(_) => Some(0),
            Value::Number(_) => Some(1),
            Value::Bool(_) => Some(2),
            _ => None,
        }
    }

    if name.is_empty() {
        return Err(Error::Validation("Property name must not be empty".into()));
    }
    let valid = match value {
        Value::Array(items) => {
            let mut kinds = items.iter().map(scalar_kind);
            match kinds.next() {
                None => true,
                Some(None) => false,
                Some(first) => kinds.all(|kind| kind == first),
            }
        }
        other => scalar_kind(other).is_some(),
    };

    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "Property '{}' must be a string, number, boolean or a homogeneous array of those, got {}",
            name, value
        )))
    }
}

/// Property access on a node or relationship
pub struct Properties<'a> {
    core: &'a EntityCore,
    merge_on_update: bool,
}

impl<'a> Properties<'a> {
    pub(crate) fn new(core: &'a EntityCore, merge_on_update: bool) -> Self {
        Self { core, merge_on_update }
    }

    async fn loaded(&self) -> Result<()> {
        self.core.wait_ready().await?;
        self.core.data.update(false).await
    }

    pub async fn all(&self) -> Result<Map<String, Value>> {
        self.loaded().await?;
        match self.core.data.peek() {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    pub async fn get(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.all().await?.remove(name))
    }

    pub async fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        check_property(name, &value)?;
        self.core.wait_ready().await?;

        let url = self.core.link("property")?.replace("{key}", name);
        self.core.data.modify(|map| map.insert(name.to_string(), value.clone()));
        self.core.fire(Task::put(url, value));
        Ok(())
    }

    /// Sets several properties; each becomes its own task in one envelope
    pub async fn set_many(&self, values: Map<String, Value>) -> Result<()> {
        for (name, value) in &values {
            check_property(name, value)?;
        }
        for (name, value) in values {
            self.set(&name, value).await?;
        }
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        self.delete_many(&[name]).await
    }

    pub async fn delete_many(&self, names: &[&str]) -> Result<()> {
        self.core.wait_ready().await?;
        let template = self.core.link("property")?;
        for name in names {
            let removed = self
                .core
                .data
                .modify(|map| map.remove(*name).is_some())
                .unwrap_or(false);
            if removed {
                self.core.fire(Task::delete(template.replace("{key}", name)));
            }
        }
        Ok(())
    }

    /// Removes every property
    pub async fn clear(&self) -> Result<()> {
        self.core.wait_ready().await?;
        let url = self.core.link("properties")?;
        self.core.data.modify(Map::clear);
        self.core.fire(Task::delete(url));
        Ok(())
    }

    /// Writes a whole property bag.
    ///
    /// Node properties are replaced; relationship properties are merged into
    /// the existing set before the write.
    pub async fn update(&self, values: Map<String, Value>) -> Result<()> {
        for (name, value) in &values {
            check_property(name, value)?;
        }
        self.core.wait_ready().await?;
        let url = self.core.link("properties")?;

        let merge = self.merge_on_update;
        let bag = self
            .core
            .data
            .modify(|map| {
                if !merge {
                    map.clear();
                }
                map.extend(values.clone());
                map.clone()
            })
            .unwrap_or(values);
        self.core.fire(Task::put(url, Value::Object(bag)));
        Ok(())
    }
}

/// Legacy (explicit) index types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    #[default]
    Exact,
    Fulltext,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Exact => "exact",
            IndexKind::Fulltext => "fulltext",
        }
    }
}

/// Legacy index membership of a node or relationship
pub struct LegacyIndex<'a> {
    core: &'a EntityCore,
    service: &'static str,
}

impl<'a> LegacyIndex<'a> {
    pub(crate) fn new(core: &'a EntityCore, service: &'static str) -> Self {
        Self { core, service }
    }

    fn check(label: &str, key: &str) -> Result<()> {
        if label.is_empty() || key.is_empty() {
            return Err(Error::Validation("Index label and key must not be empty".into()));
        }
        Ok(())
    }

    async fn entry_url(&self, label: &str, key: &str, kind: IndexKind) -> Result<String> {
        let id = self.core.require_id().await?;
        let base = self.core.client.endpoints().link(self.service)?;
        Ok(format!("{}/{}/{}/{}/{}", base, label, key, kind.as_str(), id))
    }

    /// Adds the entity to index `label` under `key`
    pub async fn create(&self, label: &str, key: &str, kind: IndexKind) -> Result<Value> {
        Self::check(label, key)?;
        self.core.wait_ready().await?;
        let base = self.core.client.endpoints().link(self.service)?;
        let body = json!({"key": key, "uri": self.core.link("self")?, "value": kind.as_str()});
        self.core
            .client
            .submit(Task::post(format!("{}/{}", base, label), body))
            .await
    }

    pub async fn get(&self, label: &str, key: &str, kind: IndexKind) -> Result<Value> {
        Self::check(label, key)?;
        let url = self.entry_url(label, key, kind).await?;
        self.core.client.submit(Task::get(url)).await
    }

    pub async fn drop(&self, label: &str, key: &str, kind: IndexKind) -> Result<Value> {
        Self::check(label, key)?;
        let url = self.entry_url(label, key, kind).await?;
        self.core.client.submit(Task::delete(url)).await
    }
}
