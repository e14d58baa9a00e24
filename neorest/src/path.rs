// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Graph-algorithm path queries

use crate::error::{Error, Result};
use crate::transform::id_from_url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Traversal direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    All,
    Out,
    In,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::All => "all",
            Direction::Out => "out",
            Direction::In => "in",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PathAlgorithm {
    #[default]
    #[serde(rename = "shortestPath")]
    ShortestPath,
    #[serde(rename = "allSimplePaths")]
    AllSimplePaths,
    #[serde(rename = "allPaths")]
    AllPaths,
    #[serde(rename = "dijkstra")]
    Dijkstra,
}

impl PathAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathAlgorithm::ShortestPath => "shortestPath",
            PathAlgorithm::AllSimplePaths => "allSimplePaths",
            PathAlgorithm::AllPaths => "allPaths",
            PathAlgorithm::Dijkstra => "dijkstra",
        }
    }
}

/// Settings of a path query
#[derive(Debug, Clone, PartialEq)]
pub struct PathSettings {
    pub algorithm: PathAlgorithm,
    /// Omitted for dijkstra; falls back to 3 for the enumerating algorithms
    pub max_depth: Option<u32>,
    pub direction: Direction,
    /// Relationship property holding the cost, dijkstra only
    pub cost_property: Option<String>,
    /// Cost of relationships lacking `cost_property`, dijkstra only
    pub default_cost: Option<f64>,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            algorithm: PathAlgorithm::ShortestPath,
            max_depth: Some(3),
            direction: Direction::Out,
            cost_property: None,
            default_cost: None,
        }
    }
}

impl PathSettings {
    pub fn algorithm(algorithm: PathAlgorithm) -> Self {
        Self {
            algorithm,
            max_depth: None,
            ..Self::default()
        }
    }

    pub fn max_depth(mut self, depth: u32) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn cost_property(mut self, property: impl Into<String>) -> Self {
        self.cost_property = Some(property.into());
        self
    }

    pub fn default_cost(mut self, cost: f64) -> Self {
        self.default_cost = Some(cost);
        self
    }

    fn effective_depth(&self) -> Option<u32> {
        let depth = match self.algorithm {
            PathAlgorithm::Dijkstra => None,
            PathAlgorithm::AllSimplePaths | PathAlgorithm::AllPaths => self.max_depth.or(Some(3)),
            PathAlgorithm::ShortestPath => self.max_depth,
        };
        depth.filter(|depth| *depth > 0)
    }

    /// Request body for `{node}/paths`
    pub(crate) fn to_body(&self, to_url: &str, rel_type: &str) -> Result<Value> {
        if rel_type.is_empty() {
            return Err(Error::Validation("Path relationship type must not be empty".into()));
        }
        if self.direction == Direction::All {
            return Err(Error::Validation("Path direction must be 'out' or 'in'".into()));
        }

        let mut body = json!({
            "to": to_url,
            "algorithm": self.algorithm.as_str(),
            "relationships": {"type": rel_type, "direction": self.direction.as_str()},
        });
        if let Some(depth) = self.effective_depth() {
            body["max_depth"] = json!(depth);
        }
        if self.algorithm == PathAlgorithm::Dijkstra {
            if self.cost_property.is_none() && self.default_cost.is_none() {
                return Err(Error::Validation(
                    "dijkstra needs a cost_property or a default_cost".into(),
                ));
            }
            if let Some(property) = &self.cost_property {
                body["cost_property"] = json!(property);
            }
            if let Some(cost) = self.default_cost {
                body["default_cost"] = json!(cost);
            }
        }
        Ok(body)
    }
}

/// Original urls of a path result
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PathLinks {
    pub start: String,
    pub end: String,
    pub nodes: Vec<String>,
    pub relationships: Vec<String>,
}

/// A path with its urls rewritten to entity ids
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathResult {
    pub start: u64,
    pub end: u64,
    pub nodes: Vec<u64>,
    pub relationships: Vec<u64>,
    pub length: u64,
    pub directions: Vec<String>,
    pub weight: Option<f64>,
    pub links: PathLinks,
}

#[derive(Deserialize)]
struct RawPath {
    start: String,
    end: String,
    #[serde(default)]
    nodes: Vec<String>,
    #[serde(default)]
    relationships: Vec<String>,
    #[serde(default)]
    length: u64,
    #[serde(default)]
    directions: Vec<String>,
    #[serde(default)]
    weight: Option<f64>,
}

fn require_id(url: &str) -> Result<u64> {
    id_from_url(url).ok_or_else(|| Error::Shape(format!("Path segment '{}' has no id", url)))
}

impl PathResult {
    pub fn from_value(value: &Value) -> Result<Self> {
        let raw: RawPath = serde_json::from_value(value.clone())
            .map_err(|e| Error::Shape(format!("Not a path payload: {}", e)))?;

        Ok(Self {
            start: require_id(&raw.start)?,
            end: require_id(&raw.end)?,
            nodes: raw.nodes.iter().map(|url| require_id(url)).collect::<Result<_>>()?,
            relationships: raw
                .relationships
                .iter()
                .map(|url| require_id(url))
                .collect::<Result<_>>()?,
            length: raw.length,
            directions: raw.directions,
            weight: raw.weight,
            links: PathLinks {
                start: raw.start,
                end: raw.end,
                nodes: raw.nodes,
                relationships: raw.relationships,
            },
        })
    }

    /// Paths from a response that is either one path or a list of them
    pub(crate) fn from_response(response: &Value) -> Result<Vec<Self>> {
        match response {
            Value::Array(paths) => paths.iter().map(Self::from_value).collect(),
            Value::Null => Ok(Vec::new()),
            single => Ok(vec![Self::from_value(single)?]),
        }
    }
}
