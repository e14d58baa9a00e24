// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Schema constraints and indexes

use crate::batch::Task;
use crate::client::Client;
use crate::error::{Error, Result};
use serde_json::{json, Value};

const DEFAULT_CONSTRAINT: &str = "uniqueness";

fn check_label(label: &str) -> Result<()> {
    if label.trim().is_empty() {
        return Err(Error::Validation("Label must not be empty".into()));
    }
    Ok(())
}

fn check_keys(keys: &[&str]) -> Result<()> {
    if keys.is_empty() || keys.iter().any(|key| key.trim().is_empty()) {
        return Err(Error::Validation("Property keys must be non-empty names".into()));
    }
    Ok(())
}

/// Schema constraints on labels
pub struct Constraints<'a> {
    client: &'a Client,
}

impl<'a> Constraints<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn endpoint(&self) -> Result<&'a str> {
        self.client.endpoints().link("constraints")
    }

    /// Creates a constraint; `kind` defaults to `uniqueness`
    pub async fn create(&self, label: &str, keys: &[&str], kind: Option<&str>) -> Result<Value> {
        check_label(label)?;
        check_keys(keys)?;
        let url = format!(
            "{}/{}/{}",
            self.endpoint()?,
            label,
            kind.unwrap_or(DEFAULT_CONSTRAINT)
        );
        self.client
            .submit(Task::post(url, json!({"property_keys": keys})))
            .await
    }

    pub async fn drop(&self, label: &str, key: &str, kind: Option<&str>) -> Result<Value> {
        check_label(label)?;
        check_keys(&[key])?;
        let url = format!(
            "{}/{}/{}/{}",
            self.endpoint()?,
            label,
            kind.unwrap_or(DEFAULT_CONSTRAINT),
            key
        );
        self.client.submit(Task::delete(url)).await
    }

    /// Lists constraints, narrowed by label, kind and key when given
    pub async fn get(&self, label: Option<&str>, key: Option<&str>, kind: Option<&str>) -> Result<Value> {
        let kind = match (kind, key) {
            (None, Some(_)) => Some(DEFAULT_CONSTRAINT),
            (kind, _) => kind,
        };
        let mut url = self.endpoint()?.to_string();
        for segment in [label, kind, key].into_iter().flatten() {
            url.push('/');
            url.push_str(segment);
        }
        self.client.submit(Task::get(url)).await
    }
}

/// Schema indexes on labels
pub struct Indexes<'a> {
    client: &'a Client,
}

impl<'a> Indexes<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn endpoint(&self) -> Result<&'a str> {
        self.client.endpoints().link("indexes")
    }

    pub async fn create(&self, label: &str, keys: &[&str]) -> Result<Value> {
        check_label(label)?;
        check_keys(keys)?;
        let url = format!("{}/{}", self.endpoint()?, label);
        self.client
            .submit(Task::post(url, json!({"property_keys": keys})))
            .await
    }

    /// Indexes of a label; lookup failures yield an empty list
    pub async fn get(&self, label: &str) -> Vec<Value> {
        let url = match self.endpoint() {
            Ok(endpoint) => format!("{}/{}", endpoint, label),
            Err(e) => {
                log::debug!("Index lookup skipped: {}", e);
                return Vec::new();
            }
        };
        match self.client.submit(Task::get(url)).await {
            Ok(Value::Array(indexes)) => indexes,
            Ok(_) => Vec::new(),
            Err(e) => {
                log::debug!("Index lookup for '{}' failed: {}", label, e);
                Vec::new()
            }
        }
    }

    pub async fn drop(&self, label: &str, key: &str) -> Result<Value> {
        check_label(label)?;
        check_keys(&[key])?;
        let url = format!("{}/{}/{}", self.endpoint()?, label, key);
        self.client.submit(Task::delete(url)).await
    }
}
