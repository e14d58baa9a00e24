// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Server-side transactions
//!
//! A [`Transaction`] is opened in the background as soon as it is created.
//! Operations issued before the server answers queue behind the opening
//! request and run in issue order once it completes.
//!
//! State machine:
//!
//! ```text
//! Opening --> Open --> Committed
//!    |         |  \--> RolledBack
//!    v         v
//!  Failed    Failed (commit error)
//! ```

use crate::client::Client;
use crate::cursor::Cursor;
use crate::error::{Error, Result, ServerError};
use crate::query::Query;
use crate::transform::Transformer;
use crate::transport::Method;
use chrono::{DateTime, FixedOffset};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Opening,
    Open,
    Committed,
    RolledBack,
    Failed,
}

impl TransactionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::RolledBack | TransactionState::Failed
        )
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Opening => "opening",
            TransactionState::Open => "open",
            TransactionState::Committed => "committed",
            TransactionState::RolledBack => "rolled back",
            TransactionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

struct TxState {
    state: TransactionState,
    commit_url: Option<String>,
    exec_url: Option<String>,
    expires: Option<String>,
    failure: Option<String>,
    results: Vec<Cursor>,
}

impl TxState {
    fn opening() -> Self {
        Self {
            state: TransactionState::Opening,
            commit_url: None,
            exec_url: None,
            expires: None,
            failure: None,
            results: Vec::new(),
        }
    }

    fn ensure_open(&self, operation: &str) -> Result<()> {
        match self.state {
            TransactionState::Open => Ok(()),
            TransactionState::Failed => Err(Error::Transaction(format!(
                "Cannot {}: transaction failed ({})",
                operation,
                self.failure.as_deref().unwrap_or("unknown reason")
            ))),
            state => Err(Error::Transaction(format!(
                "Cannot {}: transaction is {}",
                operation, state
            ))),
        }
    }

    fn exec_url(&self) -> Result<String> {
        self.exec_url
            .clone()
            .ok_or_else(|| Error::Transaction("Transaction has no execution url".into()))
    }

    fn refresh_expiry(&mut self, response: &Value) {
        if let Some(expires) = response
            .get("transaction")
            .and_then(|tx| tx.get("expires"))
            .and_then(Value::as_str)
        {
            self.expires = Some(expires.to_string());
        }
    }

    fn fail(&mut self, reason: String) {
        log::warn!("Transaction failed: {}", reason);
        self.state = TransactionState::Failed;
        self.failure = Some(reason);
    }
}

/// A transaction spanning several requests
#[derive(Clone)]
pub struct Transaction {
    client: Client,
    inner: Arc<Mutex<TxState>>,
}

impl Transaction {
    /// Starts opening a transaction, optionally running `query` in the same request
    pub(crate) fn open(client: &Client, query: Option<Query>) -> Result<Self> {
        let query = query.unwrap_or_default();
        if !query.is_empty() {
            query.validate()?;
        }
        let url = client.endpoints().link("transaction")?.to_string();

        let inner = Arc::new(Mutex::new(TxState::opening()));
        let guard = Arc::clone(&inner)
            .try_lock_owned()
            .map_err(|_| Error::Transaction("Transaction state is already locked".into()))?;

        tokio::spawn(open_transaction(client.clone(), url, query, guard));
        Ok(Self {
            client: client.clone(),
            inner,
        })
    }

    /// Runs statements inside the transaction and records their cursor.
    ///
    /// A statement error fails the transaction: the server has already
    /// rolled it back.
    pub async fn execute(&self, query: impl Into<Query>) -> Result<Cursor> {
        let query = query.into();
        query.validate()?;

        let mut tx = self.inner.lock().await;
        tx.ensure_open("execute")?;
        let url = tx.exec_url()?;
        let decoded = self
            .client
            .request_json(Method::Post, &url, Some(json!({"statements": query.to_statements()})))
            .await
            .and_then(|response| {
                tx.refresh_expiry(&response);
                Transformer::new(&self.client, query.is_reactive()).transform(response)
            });
        let decoded = match decoded {
            Ok(decoded) => decoded,
            Err(e @ Error::Statement(_)) => {
                tx.fail(e.to_string());
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let cursor = Cursor::from(decoded);
        tx.results.push(cursor.clone());
        log::debug!("Transaction executed {} statement(s)", query.statements().len());
        Ok(cursor)
    }

    /// Keeps the transaction alive without running anything
    pub async fn reset_timeout(&self) -> Result<()> {
        let mut tx = self.inner.lock().await;
        tx.ensure_open("reset timeout")?;
        let url = tx.exec_url()?;
        let response = self
            .client
            .request_json(Method::Post, &url, Some(json!({"statements": []})))
            .await?;
        tx.refresh_expiry(&response);
        Ok(())
    }

    /// Commits, optionally running final statements, and returns every cursor
    pub async fn commit(&self, query: Option<Query>) -> Result<Vec<Cursor>> {
        let query = query.unwrap_or_default();
        if !query.is_empty() {
            query.validate()?;
        }

        let mut tx = self.inner.lock().await;
        tx.ensure_open("commit")?;
        let url = tx
            .commit_url
            .clone()
            .ok_or_else(|| Error::Transaction("Transaction has no commit url".into()))?;

        let response = match self
            .client
            .request_json(Method::Post, &url, Some(json!({"statements": query.to_statements()})))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tx.fail(e.to_string());
                return Err(e);
            }
        };

        if query.is_empty() {
            let errors = ServerError::collect(&response);
            if !errors.is_empty() {
                let error = Error::Statement(errors);
                tx.fail(error.to_string());
                return Err(error);
            }
        } else {
            match Transformer::new(&self.client, query.is_reactive()).transform(response) {
                Ok(decoded) => tx.results.push(Cursor::from(decoded)),
                Err(e) => {
                    tx.fail(e.to_string());
                    return Err(e);
                }
            }
        }

        tx.state = TransactionState::Committed;
        log::debug!("Transaction committed with {} result(s)", tx.results.len());
        Ok(tx.results.clone())
    }

    /// Discards the transaction on the server and locally
    pub async fn rollback(&self) -> Result<()> {
        let mut tx = self.inner.lock().await;
        tx.ensure_open("rollback")?;
        let url = tx.exec_url()?;

        match self.client.request_json(Method::Delete, &url, None).await {
            Ok(_) => {
                tx.results.clear();
                tx.state = TransactionState::RolledBack;
                log::debug!("Transaction rolled back");
                Ok(())
            }
            Err(e) => {
                tx.fail(e.to_string());
                Err(e)
            }
        }
    }

    /// Every cursor recorded so far
    pub async fn current(&self) -> Vec<Cursor> {
        self.inner.lock().await.results.clone()
    }

    /// The most recently recorded cursor
    pub async fn last(&self) -> Option<Cursor> {
        self.inner.lock().await.results.last().cloned()
    }

    pub async fn state(&self) -> TransactionState {
        self.inner.lock().await.state
    }

    /// Expiry reported by the server, as sent (RFC 2822)
    pub async fn expires(&self) -> Option<String> {
        self.inner.lock().await.expires.clone()
    }

    pub async fn expires_at(&self) -> Option<DateTime<FixedOffset>> {
        self.expires()
            .await
            .and_then(|expires| DateTime::parse_from_rfc2822(&expires).ok())
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction").finish_non_exhaustive()
    }
}

async fn open_transaction(client: Client, url: String, query: Query, mut tx: OwnedMutexGuard<TxState>) {
    let body = json!({"statements": query.to_statements()});
    let response = match client.request_json(Method::Post, &url, Some(body)).await {
        Ok(response) => response,
        Err(e) => return tx.fail(e.to_string()),
    };

    let Some(commit_url) = response.get("commit").and_then(Value::as_str) else {
        let errors = ServerError::collect(&response);
        return if errors.is_empty() {
            tx.fail("Server did not return a commit url".into())
        } else {
            tx.fail(Error::Statement(errors).to_string())
        };
    };

    tx.commit_url = Some(commit_url.to_string());
    tx.exec_url = Some(
        commit_url
            .strip_suffix("/commit")
            .unwrap_or(commit_url)
            .to_string(),
    );
    tx.refresh_expiry(&response);

    if !query.is_empty() {
        match Transformer::new(&client, query.is_reactive()).transform(response) {
            Ok(decoded) => tx.results.push(Cursor::from(decoded)),
            Err(e) => return tx.fail(e.to_string()),
        }
    }

    tx.state = TransactionState::Open;
    log::debug!("Transaction opened at {:?}", tx.exec_url);
}
