// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Client configuration
//!
//! Settings can be built in code, read from the environment or loaded from a
//! JSON file:
//!
//! - `NEO4J_URL`, falling back to `GRAPHENEDB_URL`, selects the server
//! - `NEO4J_USERNAME` / `NEO4J_USER` and `NEO4J_PASSWORD` / `NEO4J_PASS`
//!   supply basic-auth credentials

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_URL: &str = "http://localhost:7474";
pub const DEFAULT_BASE: &str = "db/data";

/// HTTP transport settings, scoped to one client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub read_timeout_ms: u64,
    pub max_redirects: usize,
    /// Accept self-signed certificates for this client only
    pub accept_invalid_certs: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 10_000,
            max_redirects: 10,
            accept_invalid_certs: false,
        }
    }
}

impl TransportConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Connection settings for a [`crate::Client`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub url: String,
    pub base: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Extra headers sent with every request, overriding the defaults
    pub headers: BTreeMap<String, String>,
    pub transport: TransportConfig,
    /// Lifetime of reactive wrappers before a read refreshes them
    pub reactive_ttl_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            base: DEFAULT_BASE.to_string(),
            username: None,
            password: None,
            headers: BTreeMap::new(),
            transport: TransportConfig::default(),
            reactive_ttl_secs: 0,
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_reactive_ttl(mut self, ttl: Duration) -> Self {
        self.reactive_ttl_secs = ttl.as_secs();
        self
    }

    /// Builds a configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(url) = env_var("NEO4J_URL").or_else(|| env_var("GRAPHENEDB_URL")) {
            config.url = url;
        }
        config.username = env_var("NEO4J_USERNAME").or_else(|| env_var("NEO4J_USER"));
        config.password = env_var("NEO4J_PASSWORD").or_else(|| env_var("NEO4J_PASS"));

        log::debug!("Loaded client configuration from environment: {}", config.url);
        config
    }

    /// Loads a configuration from a JSON file; missing fields take defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ClientConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(Error::Validation(format!(
                "Server url must start with http:// or https://, got '{}'",
                self.url
            )));
        }
        Ok(())
    }

    /// Root url of the REST service, e.g. `http://localhost:7474/db/data`
    pub fn root(&self) -> String {
        let url = self.url.trim_end_matches('/');
        let base = self.base.trim_matches('/');
        if base.is_empty() {
            url.to_string()
        } else {
            format!("{}/{}", url, base)
        }
    }

    /// Headers sent with every request
    pub fn default_headers(&self) -> Vec<(String, String)> {
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        headers.insert("Accept".into(), "application/json; charset=UTF-8".into());
        headers.insert("X-Stream".into(), "true".into());
        headers.insert("Content-Type".into(), "application/json".into());
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }
        headers.into_iter().collect()
    }

    /// Basic-auth credentials, when both parts are present
    pub fn credentials(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) if !user.is_empty() => Some((user.clone(), pass.clone())),
            _ => None,
        }
    }

    pub fn reactive_ttl(&self) -> Duration {
        Duration::from_secs(self.reactive_ttl_secs)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
