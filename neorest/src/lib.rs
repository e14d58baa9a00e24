// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! NeoRest - batching Cypher client for the Neo4j REST API
//!
//! This crate issues Cypher queries against a Neo4j server's REST interface
//! and returns typed results (nodes, relationships, rows, graph fragments)
//! instead of raw JSON.
//!
//! # Quick Start
//!
//! ```no_run
//! use neorest::{Client, ClientConfig, Reactive};
//!
//! # async fn run() -> neorest::Result<()> {
//! let client = Client::connect(ClientConfig::from_env()).await?;
//!
//! let cursor = client.query("MATCH (n:User) RETURN n LIMIT 10").await?;
//! for row in cursor.fetch(false).await? {
//!     println!("{}", row["n"]);
//! }
//!
//! let tx = client.transaction(None)?;
//! tx.execute("CREATE (n:User {name: 'alice'}) RETURN n").await?;
//! tx.commit(None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Request Batching** - Calls issued in the same scheduling tick share one HTTP batch request
//! - **Transactions** - Open, execute, renew, commit and roll back server-side transactions
//! - **Typed Results** - Responses are classified and materialized as nodes, relationships or data
//! - **Reactive Wrappers** - Entities can refresh themselves from the server when read
//! - **Schema** - Constraint and index management
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   Application Code                      │
//! └─────────────────────────────────────────┘
//!                  │
//!                  ▼
//! ┌─────────────────────────────────────────┐
//! │  Client / Transaction / Node / ...      │
//! └─────────────────────────────────────────┘
//!                  │ Task
//!                  ▼
//! ┌─────────────────────────────────────────┐
//! │  BatchScheduler  ──►  Transport (HTTP)  │
//! └─────────────────────────────────────────┘
//!                  │ raw JSON
//!                  ▼
//! ┌─────────────────────────────────────────┐
//! │  Transformer  ──►  Cursor / wrappers    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! - [`client`] - Connection, queries and entry points
//! - [`batch`] - Task batching
//! - [`transform`] - Response classification and decoding
//! - [`cursor`] - Result navigation
//! - [`transaction`] - Transaction state machine
//! - [`node`], [`relationship`], [`data`] - Entity wrappers
//! - [`schema`] - Constraints and indexes
//! - [`error`] - Error types

pub mod batch;
pub mod client;
pub mod config;
pub mod cursor;
pub mod data;
pub mod endpoint;
mod entity;
pub mod error;
pub mod node;
pub mod path;
pub mod query;
pub mod relationship;
pub mod schema;
pub mod transaction;
pub mod transform;
pub mod transport;

pub use batch::{BatchScheduler, Task, TaskHandle};
pub use client::{BatchOptions, BatchOutput, BatchValue, Client};
pub use config::{ClientConfig, TransportConfig};
pub use cursor::{Cursor, Record};
pub use data::{Data, Reactive};
pub use endpoint::Endpoints;
pub use entity::{IndexKind, LegacyIndex, Properties};
pub use error::{Error, Result, ServerError};
pub use node::{Labels, Node, NodeRef, NodeSource};
pub use path::{Direction, PathAlgorithm, PathResult, PathSettings};
pub use query::{Query, ResultContent};
pub use relationship::Relationship;
pub use schema::{Constraints, Indexes};
pub use transaction::{Transaction, TransactionState};
pub use transform::{classify, Decoded, GraphFragment, Item, Row, Shape};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, Transport};
