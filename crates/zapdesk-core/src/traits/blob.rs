// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable object storage for media attachments.

use async_trait::async_trait;

use crate::error::ZapdeskError;
use crate::traits::adapter::PluginAdapter;

/// Append-mostly blob storage addressed by deterministic paths.
#[async_trait]
pub trait BlobStore: PluginAdapter {
    /// Write `bytes` at `path`, replacing any previous object, and return its public URL.
    async fn upsert(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ZapdeskError>;

    /// Public URL an object at `path` is (or would be) served from.
    fn public_url(&self, path: &str) -> String;
}
