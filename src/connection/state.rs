// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Connection state record and the shallow patch merged into it.

use serde::{Deserialize, Serialize};

/// Coarse health of the wallet sub-channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionQuality {
    Good,
    #[default]
    Poor,
    Failed,
}

/// Session-lifetime connection state, published to the UI layer.
///
/// Invariants, maintained by [`ConnectionState::apply`]:
/// - `retry_count` never decreases.
/// - `connection_quality == Failed` implies `!is_wallet_ready`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub is_ready: bool,
    pub is_connecting: bool,
    pub has_error: bool,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub is_wallet_ready: bool,
    pub connection_quality: ConnectionQuality,
}

impl ConnectionState {
    /// Merge `patch` over the current record. Unset fields are left alone.
    pub fn apply(&mut self, patch: &ConnectionPatch) {
        if let Some(v) = patch.is_ready {
            self.is_ready = v;
        }
        if let Some(v) = patch.is_connecting {
            self.is_connecting = v;
        }
        if let Some(v) = patch.has_error {
            self.has_error = v;
        }
        if let Some(v) = &patch.error_message {
            self.error_message = v.clone();
        }
        if let Some(v) = patch.is_wallet_ready {
            self.is_wallet_ready = v;
        }
        if let Some(v) = patch.connection_quality {
            self.connection_quality = v;
        }
        if patch.increment_retry {
            self.retry_count = self.retry_count.saturating_add(1);
        }

        if self.connection_quality == ConnectionQuality::Failed {
            self.is_wallet_ready = false;
        }
    }
}

/// Partial update to a [`ConnectionState`].
///
/// `error_message: Some(None)` clears the message; `None` leaves it as is.
/// The retry counter can only move forward.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionPatch {
    pub is_ready: Option<bool>,
    pub is_connecting: Option<bool>,
    pub has_error: Option<bool>,
    pub error_message: Option<Option<String>>,
    pub is_wallet_ready: Option<bool>,
    pub connection_quality: Option<ConnectionQuality>,
    pub increment_retry: bool,
}

impl ConnectionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ready(mut self, ready: bool) -> Self {
        self.is_ready = Some(ready);
        self
    }

    pub fn connecting(mut self, connecting: bool) -> Self {
        self.is_connecting = Some(connecting);
        self
    }

    /// Flag an error and record its message.
    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.has_error = Some(true);
        self.error_message = Some(Some(message.into()));
        self
    }

    /// Clear the error flag and message.
    pub fn clear_error(mut self) -> Self {
        self.has_error = Some(false);
        self.error_message = Some(None);
        self
    }

    pub fn wallet_ready(mut self, ready: bool) -> Self {
        self.is_wallet_ready = Some(ready);
        self
    }

    pub fn quality(mut self, quality: ConnectionQuality) -> Self {
        self.connection_quality = Some(quality);
        self
    }

    pub fn bump_retry(mut self) -> Self {
        self.increment_retry = true;
        self
    }
}
