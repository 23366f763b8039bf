// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet liveness probe and environment reload seams.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("wallet RPC request failed: {0}")]
    Request(String),

    #[error("wallet RPC returned HTTP {0}")]
    Status(u16),

    #[error("wallet RPC error: {0}")]
    Rpc(String),
}

/// Liveness check of the wallet sub-channel.
///
/// The controller bounds every call with its own timeout.
#[async_trait]
pub trait WalletProbe: Send + Sync {
    async fn probe(&self) -> Result<(), ProbeError>;
}

/// Full reload of the hosting environment, the last escalation step.
pub trait Reloader: Send + Sync {
    fn reload(&self);
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    message: String,
}

/// Probes the wallet by asking its JSON-RPC endpoint for the chain id.
#[derive(Debug, Clone)]
pub struct RpcWalletProbe {
    rpc_url: url::Url,
    client: reqwest::Client,
}

impl RpcWalletProbe {
    pub fn new(rpc_url: url::Url) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProbeError::Request(e.to_string()))?;
        Ok(Self { rpc_url, client })
    }

    pub fn rpc_url(&self) -> &url::Url {
        &self.rpc_url
    }
}

#[async_trait]
impl WalletProbe for RpcWalletProbe {
    async fn probe(&self) -> Result<(), ProbeError> {
        let response = self
            .client
            .post(self.rpc_url.clone())
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "eth_chainId",
                "params": [],
            }))
            .send()
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProbeError::Status(response.status().as_u16()));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| ProbeError::Rpc(e.to_string()))?;

        match (body.result, body.error) {
            (_, Some(err)) => Err(ProbeError::Rpc(err.message)),
            (Some(_), None) => Ok(()),
            (None, None) => Err(ProbeError::Rpc("empty response".to_string())),
        }
    }
}
