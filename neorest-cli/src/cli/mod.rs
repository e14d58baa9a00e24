// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI module for NeoRest
//!
//! Provides one-off query execution and an interactive Cypher console
//! against a Neo4j server.

pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{Cli, Commands};
pub use handlers::{handle_console, handle_query, handle_version};
