// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Runtime error events and wallet-transport failure recognition.
//!
//! The provider emits no first-class failure events. Health is inferred from
//! global runtime errors, rejected async operations and cross-frame messages
//! whose text matches a known transport failure.

use serde_json::Value;

/// Lowercased substrings identifying a wallet-transport failure.
const WALLET_ERROR_SIGNATURES: &[&str] = &[
    "postmessage",
    "datacloneerror",
    "could not be cloned",
    "unable to connect to wallet",
    "iframe",
];

/// An observed runtime event.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    /// Uncaught runtime error.
    Error { message: String },
    /// Rejected asynchronous operation. `reason` is whatever was rejected with.
    UnhandledRejection { reason: Value },
    /// Cross-frame message. Strings are parsed as JSON.
    FrameMessage { data: Value },
}

impl RuntimeEvent {
    pub fn error(message: impl Into<String>) -> Self {
        RuntimeEvent::Error {
            message: message.into(),
        }
    }

    /// Best-effort extraction of the event's message text.
    ///
    /// Returns `None` for anything that cannot be read as a message.
    pub fn message(&self) -> Option<String> {
        match self {
            RuntimeEvent::Error { message } => Some(message.clone()),
            RuntimeEvent::UnhandledRejection { reason } => match reason {
                Value::String(s) => Some(s.clone()),
                other => message_from_object(other),
            },
            RuntimeEvent::FrameMessage { data } => match data {
                Value::String(raw) => serde_json::from_str::<Value>(raw)
                    .ok()
                    .and_then(|parsed| message_from_object(&parsed)),
                other => message_from_object(other),
            },
        }
    }

    /// The message, if it is a recognised wallet-transport failure.
    pub fn wallet_failure(&self) -> Option<String> {
        self.message().filter(|m| is_wallet_transport_error(m))
    }
}

fn message_from_object(value: &Value) -> Option<String> {
    let obj = value.as_object()?;
    for field in ["message", "error", "reason"] {
        match obj.get(field) {
            Some(Value::String(s)) => return Some(s.clone()),
            Some(nested @ Value::Object(_)) => {
                if let Some(m) = message_from_object(nested) {
                    return Some(m);
                }
            }
            _ => {}
        }
    }
    None
}

/// Whether `message` matches a known wallet-transport failure signature.
pub fn is_wallet_transport_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    WALLET_ERROR_SIGNATURES.iter().any(|sig| lower.contains(sig))
}
