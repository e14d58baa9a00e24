// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Relationship wrapper

use crate::batch::Task;
use crate::client::Client;
use crate::data::{Data, Reactive};
use crate::entity::{EntityCore, LegacyIndex, Properties};
use crate::error::{Error, Result};
use crate::transform::{parse_entity, ParsedEntity};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;

/// A typed, directed edge between two nodes
#[derive(Clone)]
pub struct Relationship {
    core: Arc<EntityCore>,
}

impl Relationship {
    /// Wraps a relationship payload returned by the server
    pub fn from_payload(client: &Client, payload: &Value, reactive: bool) -> Result<Self> {
        let parsed = parse_entity(payload);
        if parsed.start.is_none() || parsed.end.is_none() {
            return Err(Error::Shape(format!(
                "Relationship payload carries no start/end: {}",
                payload
            )));
        }
        Ok(Self::from_parsed(client, parsed, reactive))
    }

    pub(crate) fn from_parsed(client: &Client, parsed: ParsedEntity, reactive: bool) -> Self {
        Self {
            core: Arc::new(EntityCore::loaded(client, "Relationship", parsed, reactive)),
        }
    }

    /// Fetches an existing relationship by id
    pub fn fetch(client: &Client, id: u64, reactive: bool) -> Self {
        let request = client
            .scheduler()
            .enqueue(Task::get(format!("/relationship/{}", id)));
        Self {
            core: EntityCore::spawn(client, "Relationship", request, reactive),
        }
    }

    /// Creates a relationship between two existing nodes
    pub(crate) fn create(
        client: &Client,
        from: u64,
        to: u64,
        rel_type: &str,
        properties: Map<String, Value>,
        reactive: bool,
    ) -> Self {
        let request = client.endpoints().link("node").and_then(|node| {
            let body = json!({
                "to": format!("{}/{}", node, to),
                "type": rel_type,
                "data": properties,
            });
            client
                .scheduler()
                .enqueue(Task::post(format!("{}/{}/relationships", node, from), body))
        });
        Self {
            core: EntityCore::spawn(client, "Relationship", request, reactive),
        }
    }

    pub fn id(&self) -> Option<u64> {
        self.core.id()
    }

    /// Id of the start node, once loaded
    pub fn start(&self) -> Option<u64> {
        self.core.span().map(|(start, _)| start)
    }

    /// Id of the end node, once loaded
    pub fn end(&self) -> Option<u64> {
        self.core.span().map(|(_, end)| end)
    }

    /// Relationship type, once loaded
    pub fn rel_type(&self) -> Option<String> {
        self.core.data.rel_type()
    }

    pub fn is_ready(&self) -> bool {
        self.core.is_ready()
    }

    pub async fn delete(&self) -> Result<()> {
        self.core.wait_ready().await?;
        let url = self.core.link("self")?;
        self.core.fire(Task::delete(url));
        self.core.data.clear();
        Ok(())
    }

    pub async fn property(&self, name: &str) -> Result<Option<Value>> {
        self.properties().get(name).await
    }

    pub async fn set_property(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.properties().set(name, value).await
    }

    /// Properties; `update` merges into the existing set
    pub fn properties(&self) -> Properties<'_> {
        Properties::new(&self.core, true)
    }

    pub fn index(&self) -> LegacyIndex<'_> {
        LegacyIndex::new(&self.core, "relationship_index")
    }
}

#[async_trait]
impl Reactive for Relationship {
    fn data(&self) -> &Data {
        &self.core.data
    }

    async fn ready(&self) -> Result<()> {
        self.core.wait_ready().await
    }
}

impl fmt::Debug for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.core, f)
    }
}
