// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Remote data functions as seen from the client.
//!
//! Every function is a JSON POST to `{base}/{function-name}`. Success bodies
//! wrap the payload (`{"portfolio": [...]}`, `{"profile": {...}}`); failure
//! bodies are `{"error": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::lending::{PortfolioEntry, UserProfile};

pub const GET_PORTFOLIO: &str = "get-portfolio";
pub const GET_PROFILE: &str = "get-profile";

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("invalid functions URL: {0}")]
    InvalidUrl(String),

    #[error("{function} request failed: {message}")]
    Request { function: String, message: String },

    #[error("{function} returned HTTP {status}: {message}")]
    Status {
        function: String,
        status: u16,
        message: String,
    },

    #[error("{function} returned an unreadable body: {message}")]
    Decode { function: String, message: String },
}

/// Source of the entities the client caches.
#[async_trait]
pub trait RemoteDataSource: Send + Sync {
    async fn fetch_portfolio(&self, user_id: &str) -> Result<Vec<PortfolioEntry>, RemoteError>;

    async fn fetch_profile(&self, user_id: &str) -> Result<UserProfile, RemoteError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserRequest<'a> {
    user_id: &'a str,
}

#[derive(Deserialize)]
struct PortfolioBody {
    portfolio: Vec<PortfolioEntry>,
}

#[derive(Deserialize)]
struct ProfileBody {
    profile: UserProfile,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for the remote data functions.
#[derive(Debug, Clone)]
pub struct FunctionsClient {
    /// Functions root, e.g. `https://api.example.com/functions/v1`
    base_url: Url,
    /// Sent as `Authorization: Bearer ...` when set
    bearer_token: Option<String>,
    client: reqwest::Client,
}

impl FunctionsClient {
    pub fn new(base_url: &str) -> Result<Self, RemoteError> {
        // Trailing slash so `join` appends instead of replacing the last segment
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url =
            Url::parse(&normalized).map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;

        Ok(Self {
            base_url,
            bearer_token: None,
            client,
        })
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn function_url(&self, function: &str) -> Result<Url, RemoteError> {
        self.base_url
            .join(function)
            .map_err(|e| RemoteError::InvalidUrl(e.to_string()))
    }

    /// Invoke `function` with `body` and decode the success payload.
    pub async fn invoke<B, R>(&self, function: &str, body: &B) -> Result<R, RemoteError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.function_url(function)?;
        let request_id = uuid::Uuid::new_v4().to_string();
        debug!(function, %request_id, "Invoking remote function");

        let mut request = self
            .client
            .post(url)
            .header("x-request-id", &request_id)
            .json(body);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| RemoteError::Request {
            function: function.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| RemoteError::Request {
            function: function.to_string(),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&bytes)
                .map(|b| b.error)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
            return Err(RemoteError::Status {
                function: function.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode {
            function: function.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl RemoteDataSource for FunctionsClient {
    async fn fetch_portfolio(&self, user_id: &str) -> Result<Vec<PortfolioEntry>, RemoteError> {
        let body: PortfolioBody = self.invoke(GET_PORTFOLIO, &UserRequest { user_id }).await?;
        Ok(body.portfolio)
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<UserProfile, RemoteError> {
        let body: ProfileBody = self.invoke(GET_PROFILE, &UserRequest { user_id }).await?;
        Ok(body.profile)
    }
}
