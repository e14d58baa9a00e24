// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Endpoint resolution from the service-root discovery document

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;

/// Named service links, as found on discovery documents and entity payloads
pub type Links = HashMap<String, String>;

/// A string value is a link when it carries a scheme separator
pub fn is_link(value: &str) -> bool {
    value.contains("://")
}

/// Service endpoints advertised by the server root
#[derive(Debug, Clone, Default)]
pub struct Endpoints {
    links: Links,
    literals: HashMap<String, String>,
}

impl Endpoints {
    /// Splits the discovery document into endpoint links and literals
    pub fn from_discovery(document: &Value) -> Result<Self> {
        let map = document.as_object().ok_or_else(|| {
            Error::Connect(format!("Discovery document is not an object: {}", document))
        })?;

        if map
            .get("password_change_required")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            return Err(Error::Connect(
                "The server requires a password change before it can be used".into(),
            ));
        }

        let mut endpoints = Endpoints::default();
        for (name, value) in map {
            if let Value::String(text) = value {
                if is_link(text) {
                    endpoints.links.insert(name.clone(), text.clone());
                } else {
                    endpoints.literals.insert(name.clone(), text.clone());
                }
            }
        }
        Ok(endpoints)
    }

    pub fn link(&self, name: &str) -> Result<&str> {
        self.links
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::Connect(format!("Server does not advertise the '{}' endpoint", name)))
    }

    pub fn literal(&self, name: &str) -> Option<&str> {
        self.literals.get(name).map(String::as_str)
    }

    /// Server version reported at discovery
    pub fn version(&self) -> Option<&str> {
        self.literal("neo4j_version")
    }

    pub fn links(&self) -> &Links {
        &self.links
    }
}
