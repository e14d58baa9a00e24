// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for the NeoRest driver

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Result type for driver operations
pub type Result<T> = std::result::Result<T, Error>;

/// A `{code, message}` pair reported by the server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl ServerError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Extracts the server errors carried by a response body.
    ///
    /// Transactional responses report failures in an `errors` list; legacy
    /// endpoints answer with an `exception` name and a `message`.
    pub fn collect(body: &Value) -> Vec<ServerError> {
        if let Some(Value::Array(errors)) = body.get("errors") {
            if !errors.is_empty() {
                return errors
                    .iter()
                    .map(|error| {
                        serde_json::from_value::<ServerError>(error.clone()).unwrap_or_else(|_| {
                            ServerError::new("", error.to_string())
                        })
                    })
                    .collect();
            }
        }

        if let Some(exception) = body.get("exception").and_then(Value::as_str) {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            return vec![ServerError::new(exception, message)];
        }

        Vec::new()
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.code.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

fn join_errors(errors: &[ServerError]) -> String {
    errors
        .iter()
        .map(ServerError::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Main error type for the driver
#[derive(Error, Debug)]
pub enum Error {
    /// Endpoint discovery failed
    #[error("Connection error: {0}")]
    Connect(String),

    /// The batch envelope carrying a task could not be delivered or decoded
    #[error("Batch dispatch error: {0}")]
    BatchDispatch(String),

    /// The server rejected a statement or task
    #[error("Statement error: {}", join_errors(.0))]
    Statement(Vec<ServerError>),

    /// A payload was required to be an entity but is not one
    #[error("Unexpected response shape: {0}")]
    Shape(String),

    /// Caller arguments rejected before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation on a transaction that can no longer accept it
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A direct (non-batched) HTTP call failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// An entity wrapper failed to load from the server
    #[error("Entity unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Server-side errors carried by a `Statement` error, empty otherwise
    pub fn server_errors(&self) -> &[ServerError] {
        match self {
            Error::Statement(errors) => errors,
            _ => &[],
        }
    }
}
