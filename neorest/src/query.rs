// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cypher query settings

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Result formats the transactional endpoint can return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultContent {
    #[serde(rename = "REST")]
    Rest,
    #[serde(rename = "row")]
    Row,
    #[serde(rename = "graph")]
    Graph,
}

/// One or more Cypher statements sharing parameters and result settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    statements: Vec<String>,
    parameters: Map<String, Value>,
    contents: Vec<ResultContent>,
    reactive: bool,
}

impl Query {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statements: vec![statement.into()],
            ..Self::default()
        }
    }

    /// Several statements executed in one request
    pub fn many<I, S>(statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            statements: statements.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn params(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn contents(mut self, contents: impl IntoIterator<Item = ResultContent>) -> Self {
        self.contents = contents.into_iter().collect();
        self
    }

    /// Entities materialized from this query refresh themselves when read
    pub fn reactive(mut self, reactive: bool) -> Self {
        self.reactive = reactive;
        self
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn is_reactive(&self) -> bool {
        self.reactive
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn result_data_contents(&self) -> Vec<ResultContent> {
        if self.contents.is_empty() {
            vec![ResultContent::Rest]
        } else {
            self.contents.clone()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.statements.is_empty() {
            return Err(Error::Validation("Query has no statements".into()));
        }
        if let Some(index) = self.statements.iter().position(|s| s.trim().is_empty()) {
            return Err(Error::Validation(format!("Statement #{} is empty", index)));
        }
        Ok(())
    }

    /// The `statements` list of a transactional request
    pub(crate) fn to_statements(&self) -> Value {
        let contents = self.result_data_contents();
        Value::Array(
            self.statements
                .iter()
                .map(|statement| {
                    json!({
                        "statement": statement,
                        "parameters": self.parameters,
                        "resultDataContents": contents,
                    })
                })
                .collect(),
        )
    }

    /// Body for the legacy cypher endpoint, which takes a single statement
    pub(crate) fn to_legacy(&self) -> Result<Value> {
        self.validate()?;
        match self.statements.as_slice() {
            [statement] => Ok(json!({"query": statement, "params": self.parameters})),
            _ => Err(Error::Validation(
                "The legacy cypher endpoint accepts exactly one statement".into(),
            )),
        }
    }
}

impl From<&str> for Query {
    fn from(statement: &str) -> Self {
        Query::new(statement)
    }
}

impl From<String> for Query {
    fn from(statement: String) -> Self {
        Query::new(statement)
    }
}

impl From<Vec<String>> for Query {
    fn from(statements: Vec<String>) -> Self {
        Query::many(statements)
    }
}
