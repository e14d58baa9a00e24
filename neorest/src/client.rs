// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Database client
//!
//! [`Client`] discovers the server's endpoints at connect time and is the
//! entry point for queries, transactions, entity wrappers and schema calls.
//! Clones share one connection state and one batch scheduler.

use crate::batch::{BatchScheduler, Task};
use crate::config::ClientConfig;
use crate::cursor::Cursor;
use crate::endpoint::Endpoints;
use crate::error::{Error, Result, ServerError};
use crate::node::{Node, NodeRef, NodeSource};
use crate::query::{Query, ResultContent};
use crate::relationship::Relationship;
use crate::schema::{Constraints, Indexes};
use crate::transaction::Transaction;
use crate::transform::Transformer;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method, Transport};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// How [`Client::batch`] returns its results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Entities materialized from the results refresh themselves when read
    pub reactive: bool,
    /// Return raw JSON instead of cursors
    pub plain: bool,
}

/// Result of one task of a [`Client::batch`] call
#[derive(Debug)]
pub enum BatchValue {
    Plain(Value),
    Cursor(Cursor),
}

#[derive(Debug)]
pub struct BatchOutput {
    pub id: u64,
    pub result: Result<BatchValue>,
}

struct ClientInner {
    config: ClientConfig,
    root: String,
    transport: Arc<dyn Transport>,
    headers: Vec<(String, String)>,
    endpoints: Endpoints,
    scheduler: BatchScheduler,
}

/// Connection to a Neo4j REST service
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Connects over HTTP
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config.transport, config.credentials())?;
        Self::connect_with_transport(config, Arc::new(transport)).await
    }

    /// Connects over a caller-provided transport
    pub async fn connect_with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let root = config.root();
        let headers = config.default_headers();
        let scheduler = BatchScheduler::new(Arc::clone(&transport), root.clone(), headers.clone());

        let request = HttpRequest::new(Method::Get, root.clone()).with_headers(headers.clone());
        let response = transport.call(request).await.map_err(|e| {
            Error::Connect(format!(
                "Cannot reach {}: {}. Make sure the database is started and reachable",
                root, e
            ))
        })?;
        if response.status != 200 {
            return Err(Error::Connect(format!(
                "Unexpected status {} from {}: {}",
                response.status, root, response.body
            )));
        }
        let document = response
            .json()
            .map_err(|e| Error::Connect(format!("Undecodable discovery document: {}", e)))?;

        let endpoints = Endpoints::from_discovery(&document)?;
        scheduler.mark_ready(endpoints.link("batch")?);
        log::info!(
            "Connected to Neo4j {} on {}",
            endpoints.version().unwrap_or("(unknown version)"),
            config.url
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                root,
                transport,
                headers,
                endpoints,
                scheduler,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn root(&self) -> &str {
        &self.inner.root
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.inner.endpoints
    }

    pub fn scheduler(&self) -> &BatchScheduler {
        &self.inner.scheduler
    }

    /// Server version reported at discovery
    pub fn version(&self) -> Option<&str> {
        self.inner.endpoints.version()
    }

    /// Submits a raw task through the batch scheduler
    pub async fn submit(&self, task: Task) -> Result<Value> {
        self.inner.scheduler.submit(task).await
    }

    /// Sends a request directly, outside of any batch
    pub async fn call(&self, method: Method, url: &str, body: Option<Value>) -> Result<HttpResponse> {
        let mut request = HttpRequest::new(method, url).with_headers(self.inner.headers.clone());
        request.body = body;
        self.inner.transport.call(request).await
    }

    /// Direct call whose body must decode as JSON and whose status must be 2xx
    pub(crate) async fn request_json(&self, method: Method, url: &str, body: Option<Value>) -> Result<Value> {
        let response = self.call(method, url, body).await?;
        if response.is_success() {
            return response.json();
        }

        let errors = response
            .json()
            .map(|body| ServerError::collect(&body))
            .unwrap_or_default();
        if errors.is_empty() {
            Err(Error::Transport(format!(
                "{} {} answered with status {}",
                method, url, response.status
            )))
        } else {
            Err(Error::Statement(errors))
        }
    }

    /// Property keys in use
    pub async fn property_keys(&self) -> Result<Vec<String>> {
        let keys = self.submit(Task::get("/propertykeys")).await?;
        Ok(strings(keys))
    }

    /// Labels in use
    pub async fn labels(&self) -> Result<Vec<String>> {
        let url = self.endpoints().link("node_labels")?.to_string();
        Ok(strings(self.submit(Task::get(url)).await?))
    }

    /// Relationship types in use
    pub async fn relationship_types(&self) -> Result<Vec<String>> {
        let url = self.endpoints().link("relationship_types")?.to_string();
        Ok(strings(self.request_json(Method::Get, &url, None).await?))
    }

    fn query_task(&self, query: &Query) -> Result<Task> {
        query.validate()?;
        let url = format!("{}/commit", self.endpoints().link("transaction")?);
        Ok(Task::post(url, serde_json::json!({"statements": query.to_statements()})))
    }

    /// Runs a query in a single-request transaction
    pub async fn query(&self, query: impl Into<Query>) -> Result<Cursor> {
        let query = query.into();
        let response = self.submit(self.query_task(&query)?).await?;
        Ok(Cursor::from(
            Transformer::new(self, query.is_reactive()).transform(response)?,
        ))
    }

    /// First row of a query, if any
    pub async fn query_one(&self, query: impl Into<Query>) -> Result<Option<Value>> {
        let cursor = self.query(query).await?;
        Ok(cursor.fetch(true).await?.into_iter().next())
    }

    /// Runs a query with the `graph` result format
    pub async fn graph(&self, query: impl Into<Query>) -> Result<Cursor> {
        self.query(query.into().contents([ResultContent::Graph])).await
    }

    /// Runs a query against the legacy cypher endpoint
    pub async fn cypher(&self, query: impl Into<Query>) -> Result<Cursor> {
        let query = query.into();
        let body = query.to_legacy()?;
        let url = self.endpoints().link("cypher")?.to_string();
        let response = self.submit(Task::post(url, body)).await?;
        Ok(Cursor::from(
            Transformer::new(self, query.is_reactive()).transform(response)?,
        ))
    }

    /// Starts a query in the background.
    ///
    /// The task is queued before this returns, so it shares an envelope with
    /// whatever else is submitted in the same tick.
    pub fn query_async(&self, query: impl Into<Query>) -> JoinHandle<Result<Cursor>> {
        let query = query.into();
        let handle = self
            .query_task(&query)
            .and_then(|task| self.inner.scheduler.enqueue(task));
        let client = self.clone();
        tokio::spawn(async move {
            let response = handle?.await?;
            Ok(Cursor::from(
                Transformer::new(&client, query.is_reactive()).transform(response)?,
            ))
        })
    }

    /// Submits raw tasks in one envelope; results keep submission order.
    ///
    /// A rejected task (empty target, repeated or in-flight id) rejects the
    /// whole batch before anything is queued.
    pub async fn batch(&self, tasks: Vec<Task>, options: BatchOptions) -> Result<Vec<BatchOutput>> {
        let handles = self.inner.scheduler.enqueue_all(tasks)?;

        let mut outputs = Vec::with_capacity(handles.len());
        for handle in handles {
            let id = handle.id();
            let result = handle.await.and_then(|value| {
                if options.plain {
                    Ok(BatchValue::Plain(value))
                } else {
                    Transformer::new(self, options.reactive)
                        .transform(value)
                        .map(|decoded| BatchValue::Cursor(Cursor::from(decoded)))
                }
            });
            outputs.push(BatchOutput { id, result });
        }
        Ok(outputs)
    }

    /// Opens a transaction, optionally running `query` in the opening request
    pub fn transaction(&self, query: Option<Query>) -> Result<Transaction> {
        Transaction::open(self, query)
    }

    /// Creates, fetches or wraps a node
    pub fn nodes(&self, source: impl Into<NodeSource>, reactive: bool) -> Node {
        Node::new(self, source, reactive)
    }

    /// Creates a relationship `from -[rel_type]-> to`
    pub async fn relationship_create(
        &self,
        from: impl Into<NodeRef>,
        to: impl Into<NodeRef>,
        rel_type: &str,
        properties: Map<String, Value>,
        reactive: bool,
    ) -> Result<Relationship> {
        if rel_type.trim().is_empty() {
            return Err(Error::Validation("Relationship type must not be empty".into()));
        }
        for (name, value) in &properties {
            crate::entity::check_property(name, value)?;
        }
        let from = from.into().resolve_id().await?;
        let to = to.into().resolve_id().await?;
        Ok(Relationship::create(self, from, to, rel_type, properties, reactive))
    }

    /// Fetches a relationship by id
    pub fn relationship(&self, id: u64, reactive: bool) -> Relationship {
        Relationship::fetch(self, id, reactive)
    }

    pub fn constraints(&self) -> Constraints<'_> {
        Constraints::new(self)
    }

    pub fn indexes(&self) -> Indexes<'_> {
        Indexes::new(self)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("root", &self.inner.root)
            .field("version", &self.version())
            .finish()
    }
}

fn strings(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
