// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for zapdesk.

use thiserror::Error;

use crate::types::Provider;

/// The primary error type used across all zapdesk adapter traits and core operations.
#[derive(Debug, Error)]
pub enum ZapdeskError {
    /// Configuration errors (invalid TOML, missing credentials, bad URLs).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// WhatsApp gateway errors (REST failure, unexpected response shape).
    #[error("{provider} gateway error: {message}")]
    Provider {
        provider: Provider,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A webhook body could not be decoded into a known wire format.
    #[error("payload error: {message}")]
    Payload { message: String },

    /// Media download, decode, or upload failure.
    #[error("media error: {message}")]
    Media {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The provider does not support the requested management action.
    #[error("action `{action}` is not supported by {provider}")]
    Unsupported { provider: Provider, action: String },

    /// The flow-execution service rejected or failed a trigger.
    #[error("automation error: {message}")]
    Automation { message: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ZapdeskError {
    /// Shorthand for a provider error without an underlying source.
    pub fn provider(provider: Provider, message: impl Into<String>) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a payload decoding error.
    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload {
            message: message.into(),
        }
    }
}
