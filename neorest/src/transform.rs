// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Response-shape transformation
//!
//! REST payloads are loosely typed: the same endpoint can answer with a
//! transactional result envelope, a legacy `{columns, data}` table, a single
//! node or relationship, a list of them or a bare value. [`classify`] decides
//! which of these a payload is (first matching rule wins):
//!
//! 1. `results` / `errors` envelope
//! 2. legacy `columns` + `data` table
//! 3. a single entity (`data`/`metadata`, `start`+`end` or a `self` link)
//! 4. a non-empty list holding at least one entity
//! 5. anything else is a scalar
//!
//! [`Transformer`] then materializes the matching typed wrappers.

use crate::client::Client;
use crate::data::{Data, Reactive};
use crate::endpoint::{is_link, Links};
use crate::error::{Error, Result, ServerError};
use crate::node::Node;
use crate::relationship::Relationship;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

lazy_static! {
    /// Numeric id at the end of an entity url
    static ref TRAILING_ID: Regex = Regex::new(r"/(\d+)/?$").expect("valid trailing id pattern");
}

/// Top-level shape of a response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Transactional,
    Legacy,
    Entity(EntityKind),
    EntityList,
    Scalar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Node,
    Relationship,
    Plain,
}

/// Decides which decoding rule applies to a payload
pub fn classify(body: &Value) -> Shape {
    match body {
        Value::Object(map) => {
            if map.contains_key("results") || map.contains_key("errors") {
                Shape::Transactional
            } else if map.contains_key("columns") && map.contains_key("data") {
                Shape::Legacy
            } else if is_entity_like(map) {
                Shape::Entity(entity_kind(map))
            } else {
                Shape::Scalar
            }
        }
        Value::Array(items)
            if items
                .iter()
                .any(|item| item.as_object().is_some_and(is_entity_like)) =>
        {
            Shape::EntityList
        }
        _ => Shape::Scalar,
    }
}

fn is_entity_like(map: &Map<String, Value>) -> bool {
    map.contains_key("data")
        || map.contains_key("metadata")
        || has_endpoints(map)
        || map.get("self").and_then(Value::as_str).is_some_and(is_link)
}

fn has_endpoints(map: &Map<String, Value>) -> bool {
    let present = |key: &str| map.get(key).is_some_and(|v| !v.is_null());
    (present("start") && present("end")) || (present("startNode") && present("endNode"))
}

/// Node or relationship as listed by the `graph` result format
fn is_graph_entity(map: &Map<String, Value>) -> bool {
    map.contains_key("id") && map.get("properties").is_some_and(Value::is_object)
}

fn entity_kind(map: &Map<String, Value>) -> EntityKind {
    if has_endpoints(map) {
        EntityKind::Relationship
    } else if map.contains_key("self") {
        EntityKind::Node
    } else {
        EntityKind::Plain
    }
}

/// Extracts the numeric id a REST url ends with
pub fn id_from_url(url: &str) -> Option<u64> {
    TRAILING_ID
        .captures(url)
        .and_then(|captures| captures.get(1))
        .and_then(|id| id.as_str().parse().ok())
}

fn id_of(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) if is_link(text) => id_from_url(text),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

/// An entity payload split into its property bag, identity and service links
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedEntity {
    /// Property bag, without identity or service fields
    pub value: Value,
    pub links: Links,
    pub id: Option<u64>,
    pub labels: Option<Vec<String>>,
    pub rel_type: Option<String>,
    pub start: Option<u64>,
    pub end: Option<u64>,
}

/// Normalizes a REST or graph-format entity payload.
///
/// URL-valued fields move to the link map, identity (`id`, `labels`, `type`,
/// `start`/`end`) is read from the payload or its nested `metadata`, and the
/// value keeps only the property bag. Payloads that are not entity-shaped are
/// returned untouched.
pub fn parse_entity(payload: &Value) -> ParsedEntity {
    let Some(map) = payload
        .as_object()
        .filter(|map| is_entity_like(map) || is_graph_entity(map))
    else {
        return ParsedEntity {
            value: payload.clone(),
            ..ParsedEntity::default()
        };
    };

    let links: Links = map
        .iter()
        .filter_map(|(key, value)| match value {
            Value::String(text) if is_link(text) => Some((key.clone(), text.clone())),
            _ => None,
        })
        .collect();

    let value = match map.get("data").or_else(|| map.get("properties")) {
        Some(Value::Object(properties)) => properties.clone(),
        _ => Map::new(),
    };

    let metadata = map.get("metadata").and_then(Value::as_object);
    let field = |name: &str| metadata.and_then(|m| m.get(name)).or_else(|| map.get(name));

    let id = field("id")
        .and_then(id_of)
        .or_else(|| links.get("self").and_then(|url| id_from_url(url)));
    let labels = match field("labels") {
        Some(Value::Array(labels)) => Some(
            labels
                .iter()
                .filter_map(|label| label.as_str().map(str::to_string))
                .collect(),
        ),
        _ => None,
    };
    let rel_type = match field("type") {
        Some(Value::String(kind)) if !is_link(kind) => Some(kind.clone()),
        _ => None,
    };

    ParsedEntity {
        value: Value::Object(value),
        links,
        id,
        labels,
        rel_type,
        start: map.get("start").or_else(|| map.get("startNode")).and_then(id_of),
        end: map.get("end").or_else(|| map.get("endNode")).and_then(id_of),
    }
}

/// A decoded value
#[derive(Debug, Clone)]
pub enum Item {
    Data(Data),
    Node(Node),
    Relationship(Relationship),
}

impl Item {
    pub fn as_reactive(&self) -> &dyn Reactive {
        match self {
            Item::Data(data) => data,
            Item::Node(node) => node,
            Item::Relationship(relationship) => relationship,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Item::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            Item::Relationship(relationship) => Some(relationship),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&Data> {
        match self {
            Item::Data(data) => Some(data),
            _ => None,
        }
    }

    /// Current value without waiting or refreshing
    pub fn peek(&self) -> Value {
        self.as_reactive().data().peek()
    }

    /// Value after readiness and any reactive refresh
    pub async fn resolve(&self) -> Result<Value> {
        self.as_reactive().get().await
    }
}

/// Nodes and relationships returned by the `graph` result format
#[derive(Debug, Clone, Default)]
pub struct GraphFragment {
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
}

impl GraphFragment {
    pub async fn resolve(&self) -> Result<Value> {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            nodes.push(node.get().await?);
        }
        let mut relationships = Vec::with_capacity(self.relationships.len());
        for relationship in &self.relationships {
            relationships.push(relationship.get().await?);
        }
        Ok(serde_json::json!({"nodes": nodes, "relationships": relationships}))
    }
}

/// One result row, bound column by column
#[derive(Debug, Clone, Default)]
pub struct Row {
    pub columns: Vec<String>,
    pub values: HashMap<String, Item>,
    pub graph: Option<GraphFragment>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&Item> {
        self.values.get(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.graph.is_none()
    }

    /// Resolves every column; a graph fragment adds `nodes` and `relationships`
    pub async fn resolve(&self) -> Result<Value> {
        let mut out = Map::new();
        for column in &self.columns {
            if let Some(item) = self.values.get(column) {
                out.insert(column.clone(), item.resolve().await?);
            }
        }
        if let Some(graph) = &self.graph {
            if let Value::Object(fragment) = graph.resolve().await? {
                out.extend(fragment);
            }
        }
        Ok(Value::Object(out))
    }
}

/// Result of transforming one response body
#[derive(Debug, Clone)]
pub enum Decoded {
    Rows(Vec<Row>),
    Entity(Item),
    Entities(Vec<Item>),
    Scalar(Data),
}

impl Decoded {
    /// Requires the payload to have been a single entity
    pub fn into_entity(self) -> Result<Item> {
        match self {
            Decoded::Entity(item) => Ok(item),
            other => Err(Error::Shape(format!("Expected a single entity, got {}", other.kind()))),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Decoded::Rows(_) => "rows",
            Decoded::Entity(_) => "entity",
            Decoded::Entities(_) => "entity list",
            Decoded::Scalar(_) => "scalar",
        }
    }
}

/// Materializes typed wrappers for a client
pub struct Transformer<'a> {
    client: &'a Client,
    reactive: bool,
}

impl<'a> Transformer<'a> {
    pub fn new(client: &'a Client, reactive: bool) -> Self {
        Self { client, reactive }
    }

    pub fn transform(&self, body: Value) -> Result<Decoded> {
        match classify(&body) {
            Shape::Transactional => self.transactional(&body),
            Shape::Legacy => Ok(Decoded::Rows(self.table(&body))),
            Shape::Entity(kind) => Ok(Decoded::Entity(self.entity(&body, kind))),
            Shape::EntityList => {
                let items = body
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|item| {
                                item.as_object()
                                    .filter(|map| is_entity_like(map))
                                    .map(|map| self.entity(item, entity_kind(map)))
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(Decoded::Entities(items))
            }
            Shape::Scalar => {
                log::debug!("Response kept as a plain value");
                Ok(Decoded::Scalar(Data::new(body)))
            }
        }
    }

    fn transactional(&self, body: &Value) -> Result<Decoded> {
        let errors = ServerError::collect(body);
        if !errors.is_empty() {
            for error in &errors {
                log::error!("Statement failed: {}", error);
            }
            return Err(Error::Statement(errors));
        }

        let rows = body
            .get("results")
            .and_then(Value::as_array)
            .map(|results| results.iter().flat_map(|result| self.table(result)).collect())
            .unwrap_or_default();
        Ok(Decoded::Rows(rows))
    }

    /// Decodes a `{columns, data}` table
    fn table(&self, result: &Value) -> Vec<Row> {
        let columns: Vec<String> = result
            .get("columns")
            .and_then(Value::as_array)
            .map(|columns| {
                columns
                    .iter()
                    .filter_map(|c| c.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        result
            .get("data")
            .and_then(Value::as_array)
            .map(|data| data.iter().map(|datum| self.row(datum, &columns)).collect())
            .unwrap_or_default()
    }

    fn row(&self, datum: &Value, columns: &[String]) -> Row {
        let mut row = Row {
            columns: columns.to_vec(),
            ..Row::default()
        };

        // `rest` wins over `row` when both are present
        let (cells, rest) = match datum {
            Value::Object(map) => match (map.get("rest"), map.get("row")) {
                (Some(Value::Array(cells)), _) => (Some(cells), true),
                (_, Some(Value::Array(cells))) => (Some(cells), false),
                _ => (None, true),
            },
            Value::Array(cells) => (Some(cells), true),
            _ => (None, true),
        };

        if let Some(graph) = datum.get("graph").and_then(Value::as_object) {
            row.graph = Some(self.graph(graph));
        }
        if let Some(cells) = cells {
            for (column, cell) in columns.iter().zip(cells) {
                row.values.insert(column.clone(), self.cell(cell, rest));
            }
        }
        row
    }

    fn cell(&self, cell: &Value, rest: bool) -> Item {
        match cell.as_object() {
            Some(map) if rest && is_entity_like(map) => {
                let kind = if has_endpoints(map) {
                    EntityKind::Relationship
                } else {
                    EntityKind::Node
                };
                self.entity(cell, kind)
            }
            _ => Item::Data(Data::new(cell.clone())),
        }
    }

    fn graph(&self, graph: &Map<String, Value>) -> GraphFragment {
        let list = |key: &str| {
            graph
                .get(key)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
        };

        GraphFragment {
            nodes: list("nodes")
                .iter()
                .map(|node| Node::from_parsed(self.client, parse_entity(node), false))
                .collect(),
            relationships: list("relationships")
                .iter()
                .map(|rel| Relationship::from_parsed(self.client, parse_entity(rel), false))
                .collect(),
        }
    }

    fn entity(&self, payload: &Value, kind: EntityKind) -> Item {
        let parsed = parse_entity(payload);
        let reactive = self.reactive && parsed.links.contains_key("self");
        match kind {
            EntityKind::Relationship => {
                Item::Relationship(Relationship::from_parsed(self.client, parsed, reactive))
            }
            EntityKind::Node => Item::Node(Node::from_parsed(self.client, parsed, reactive)),
            EntityKind::Plain => Item::Data(Data::from_entity(Some(self.client.clone()), parsed, reactive)),
        }
    }
}
