// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filesystem-backed blob store.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use zapdesk_config::model::MediaConfig;
use zapdesk_core::{AdapterType, BlobStore, HealthStatus, PluginAdapter, ZapdeskError};

/// Stores objects as files under a root directory and hands out URLs
/// under a public base URL that serves that directory.
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsBlobStore {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            root: PathBuf::from(&config.root_dir),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an object path under the root, rejecting traversal.
    fn resolve(&self, path: &str) -> Result<PathBuf, ZapdeskError> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(ZapdeskError::Media {
                message: format!("invalid object path `{path}`"),
                source: None,
            });
        }
        Ok(self.root.join(relative))
    }
}

fn io_err(message: String, e: std::io::Error) -> ZapdeskError {
    ZapdeskError::Media {
        message,
        source: Some(Box::new(e)),
    }
}

#[async_trait]
impl PluginAdapter for FsBlobStore {
    fn name(&self) -> &str {
        "fs-blob"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Blob
    }

    async fn health_check(&self) -> Result<HealthStatus, ZapdeskError> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(HealthStatus::Healthy),
            Ok(_) => Ok(HealthStatus::Unhealthy(format!(
                "{} is not a directory",
                self.root.display()
            ))),
            Err(e) => Ok(HealthStatus::Degraded(format!(
                "{} not available yet: {e}",
                self.root.display()
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), ZapdeskError> {
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upsert(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ZapdeskError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(format!("create {}", parent.display()), e))?;
        }

        // Write then rename so readers never see a half-written object.
        let tmp = target.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| io_err(format!("write {}", tmp.display()), e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_err(format!("rename to {}", target.display()), e));
        }

        debug!(path, content_type, size = bytes.len(), "blob stored");
        Ok(self.public_url(path))
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url, path)
    }
}
