// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Node wrapper
//!
//! A [`Node`] is returned immediately and becomes usable once the call that
//! creates or fetches it completes:
//!
//! - an entity payload (with `metadata`) is ready at once
//! - a property bag creates a new node with those properties
//! - an id fetches the existing node
//! - nothing creates an empty node
//!
//! Property and label writes update the local copy and are sent without
//! waiting for the server's confirmation.

use crate::batch::Task;
use crate::client::Client;
use crate::cursor::Cursor;
use crate::data::{Data, Reactive};
use crate::entity::{EntityCore, LegacyIndex, Properties};
use crate::error::{Error, Result};
use crate::path::{Direction, PathResult, PathSettings};
use crate::relationship::Relationship;
use crate::transform::{parse_entity, ParsedEntity, Transformer};
use crate::transport::Method;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Ways to obtain a node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSource {
    /// A REST node payload, as returned by the server
    Payload(Value),
    /// Properties of a node to create
    Properties(Map<String, Value>),
    /// Id of an existing node
    Id(u64),
    /// Create a node without properties
    Empty,
}

impl From<u64> for NodeSource {
    fn from(id: u64) -> Self {
        NodeSource::Id(id)
    }
}

impl From<Map<String, Value>> for NodeSource {
    fn from(properties: Map<String, Value>) -> Self {
        NodeSource::Properties(properties)
    }
}

impl From<Value> for NodeSource {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) if map.contains_key("metadata") => NodeSource::Payload(Value::Object(map)),
            Value::Object(map) => NodeSource::Properties(map),
            Value::Number(number) => number.as_u64().map_or(NodeSource::Empty, NodeSource::Id),
            _ => NodeSource::Empty,
        }
    }
}

impl From<()> for NodeSource {
    fn from(_: ()) -> Self {
        NodeSource::Empty
    }
}

/// A node given by id or by wrapper
#[derive(Debug, Clone)]
pub enum NodeRef {
    Id(u64),
    Node(Node),
}

impl NodeRef {
    pub(crate) async fn resolve_id(&self) -> Result<u64> {
        match self {
            NodeRef::Id(id) => Ok(*id),
            NodeRef::Node(node) => node.core.require_id().await,
        }
    }
}

impl From<u64> for NodeRef {
    fn from(id: u64) -> Self {
        NodeRef::Id(id)
    }
}

impl From<Node> for NodeRef {
    fn from(node: Node) -> Self {
        NodeRef::Node(node)
    }
}

impl From<&Node> for NodeRef {
    fn from(node: &Node) -> Self {
        NodeRef::Node(node.clone())
    }
}

/// A graph node
#[derive(Clone)]
pub struct Node {
    core: Arc<EntityCore>,
}

impl Node {
    pub fn new(client: &Client, source: impl Into<NodeSource>, reactive: bool) -> Self {
        let endpoint = client.endpoints().link("node").map(str::to_string);
        let task = match source.into() {
            NodeSource::Payload(payload) => {
                return Self::from_parsed(client, parse_entity(&payload), reactive);
            }
            NodeSource::Properties(properties) => {
                endpoint.map(|url| Task::post(url, Value::Object(properties)))
            }
            NodeSource::Id(id) => endpoint.map(|url| Task::get(format!("{}/{}", url, id))),
            NodeSource::Empty => endpoint.map(|url| Task::new(Method::Post, url)),
        };

        let request = task.and_then(|task| client.scheduler().enqueue(task));
        Self {
            core: EntityCore::spawn(client, "Node", request, reactive),
        }
    }

    pub(crate) fn from_parsed(client: &Client, parsed: ParsedEntity, reactive: bool) -> Self {
        Self {
            core: Arc::new(EntityCore::loaded(client, "Node", parsed, reactive)),
        }
    }

    /// Node id, once loaded
    pub fn id(&self) -> Option<u64> {
        self.core.id()
    }

    pub fn is_ready(&self) -> bool {
        self.core.is_ready()
    }

    /// Deletes the node; the local value is cleared immediately
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

    pub fn properties(&self) -> Properties<'_> {
        Properties::new(&self.core, false)
    }

    pub fn labels(&self) -> Labels<'_> {
        Labels { core: &self.core }
    }

    /// Legacy index membership
    pub fn index(&self) -> LegacyIndex<'_> {
        LegacyIndex::new(&self.core, "node_index")
    }

    /// Number of relationships in `direction`, optionally restricted to `types`
    pub async fn degree(&self, direction: Direction, types: &[&str]) -> Result<u64> {
        self.core.wait_ready().await?;
        let mut url = format!("{}/degree/{}", self.core.link("self")?, direction);
        if !types.is_empty() {
            url = format!("{}/{}", url, types.join("&"));
        }
        let degree = self.core.client.submit(Task::get(url)).await?;
        Ok(degree.as_u64().unwrap_or(0))
    }

    /// Relationships of the node in `direction`, optionally restricted to `types`
    pub async fn relationships(&self, direction: Direction, types: &[&str], reactive: bool) -> Result<Cursor> {
        self.core.wait_ready().await?;
        let mut url = format!("{}/{}", self.core.link("create_relationship")?, direction);
        if !types.is_empty() {
            url = format!("{}/{}", url, types.join("&"));
        }
        let response = self.core.client.submit(Task::get(url)).await?;
        let decoded = Transformer::new(&self.core.client, reactive).transform(response)?;
        Ok(Cursor::from(decoded))
    }

    /// Creates a relationship from this node to `other`
    pub async fn to(
        &self,
        other: impl Into<NodeRef>,
        rel_type: &str,
        properties: Map<String, Value>,
        reactive: bool,
    ) -> Result<Relationship> {
        self.core
            .client
            .relationship_create(self, other, rel_type, properties, reactive)
            .await
    }

    /// Creates a relationship from `other` to this node
    pub async fn from(
        &self,
        other: impl Into<NodeRef>,
        rel_type: &str,
        properties: Map<String, Value>,
        reactive: bool,
    ) -> Result<Relationship> {
        self.core
            .client
            .relationship_create(other, self, rel_type, properties, reactive)
            .await
    }

    /// Paths from this node to `to` over relationships of `rel_type`
    pub async fn path(
        &self,
        to: impl Into<NodeRef>,
        rel_type: &str,
        settings: PathSettings,
    ) -> Result<Vec<PathResult>> {
        let node_endpoint = self.core.client.endpoints().link("node")?.to_string();
        let target = to.into().resolve_id().await?;
        let body = settings.to_body(&format!("{}/{}", node_endpoint, target), rel_type)?;

        self.core.wait_ready().await?;
        let url = format!("{}/paths", self.core.link("self")?);
        let response = self.core.client.submit(Task::post(url, body)).await?;
        PathResult::from_response(&response)
    }
}

#[async_trait]
impl Reactive for Node {
    fn data(&self) -> &Data {
        &self.core.data
    }

    async fn ready(&self) -> Result<()> {
        self.core.wait_ready().await
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.core, f)
    }
}

/// Label access on a node
pub struct Labels<'a> {
    core: &'a EntityCore,
}

impl Labels<'_> {
    fn current(&self) -> Vec<String> {
        self.core.data.labels()
    }

    fn store(&self, labels: &[String]) {
        self.core.data.set_labels(labels.to_vec());
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        self.core.wait_ready().await?;
        self.core.data.update(false).await?;
        Ok(self.current())
    }

    /// Adds labels; blank and repeated names are skipped
    pub async fn set(&self, labels: &[&str]) -> Result<()> {
        self.core.wait_ready().await?;
        let url = self.core.link("labels")?;

        let mut current = self.current();
        let mut added = Vec::new();
        for label in labels.iter().filter(|label| !label.is_empty()) {
            if !current.iter().any(|existing| existing == label) {
                current.push(label.to_string());
                added.push(label.to_string());
            }
        }
        if added.is_empty() {
            return Ok(());
        }
        self.store(&current);
        self.core.fire(Task::post(url, serde_json::json!(added)));
        Ok(())
    }

    pub async fn add(&self, label: &str) -> Result<()> {
        self.set(&[label]).await
    }

    /// Replaces every label of the node
    pub async fn replace(&self, labels: &[&str]) -> Result<()> {
        let mut unique: Vec<String> = Vec::new();
        for label in labels.iter().filter(|label| !label.is_empty()) {
            if !unique.iter().any(|existing| existing == label) {
                unique.push(label.to_string());
            }
        }
        if unique.is_empty() {
            return Err(Error::Validation("Replacement label set must not be empty".into()));
        }

        self.core.wait_ready().await?;
        let url = self.core.link("labels")?;
        self.store(&unique);
        self.core.fire(Task::put(url, serde_json::json!(unique)));
        Ok(())
    }

    /// Removes labels the node carries
    pub async fn delete(&self, labels: &[&str]) -> Result<()> {
        self.core.wait_ready().await?;
        let url = self.core.link("labels")?;

        let mut current = self.current();
        for label in labels {
            if let Some(position) = current.iter().position(|existing| existing == label) {
                current.remove(position);
                self.core.fire(Task::delete(format!("{}/{}", url, label)));
            }
        }
        self.store(&current);
        Ok(())
    }
}
