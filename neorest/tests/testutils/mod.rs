// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Shared helpers for integration tests

#![allow(dead_code)]

pub mod mock_server;

use mock_server::{MockServer, URL};
use neorest::{Client, ClientConfig};
use std::sync::Arc;

/// Connects a client to a fresh mock server
pub async fn connected() -> (Arc<MockServer>, Client) {
    let server = MockServer::new();
    let client = connect(&server).await;
    (server, client)
}

pub async fn connect(server: &Arc<MockServer>) -> Client {
    Client::connect_with_transport(ClientConfig::new(URL), server.clone())
        .await
        .expect("Failed to connect to mock server")
}

/// Lets spawned background work (fire-and-forget writes) run to completion
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
