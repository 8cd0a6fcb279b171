// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns provider media references into durable blobs.
//!
//! Three sources are handled: inline base64 (optionally a `data:` URI), a
//! URL the gateway exposes, and a Meta Graph API media id that must first be
//! resolved to a URL. Every path ends in [`BlobStore::upsert`] at
//! `{session}/{message_id}.{ext}`, so redelivered webhooks overwrite the
//! same object instead of piling up copies.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use zapdesk_config::model::{MediaConfig, MetaConfig};
use zapdesk_core::{BlobStore, MediaRef, ZapdeskError};

use crate::mime::{data_uri_mime, extension_for};

/// Which message an attachment belongs to.
#[derive(Debug, Clone, Copy)]
pub struct MediaKey<'a> {
    /// Provider session name (or connection name when there is none).
    pub session: &'a str,
    /// Provider message id, or a generated id when the provider sent none.
    pub message_id: &'a str,
    /// Meta access token, required for [`MediaRef::MetaMediaId`].
    pub access_token: Option<&'a str>,
}

/// Graph API answer for `GET /{version}/{media_id}`.
#[derive(Debug, Deserialize)]
struct GraphMedia {
    url: String,
    #[serde(default)]
    mime_type: Option<String>,
}

/// Fetched bytes plus whatever content type was learned along the way.
struct Fetched {
    bytes: Vec<u8>,
    content_type: Option<String>,
}

/// Downloads or decodes attachments and stores them in a [`BlobStore`].
pub struct MediaIngestor {
    blob: Arc<dyn BlobStore>,
    http: reqwest::Client,
    max_bytes: usize,
    graph_base: String,
}

impl MediaIngestor {
    pub fn new(
        blob: Arc<dyn BlobStore>,
        media: &MediaConfig,
        meta: &MetaConfig,
    ) -> Result<Self, ZapdeskError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(media.download_timeout_secs))
            .build()
            .map_err(|e| ZapdeskError::Media {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            blob,
            http,
            max_bytes: media.max_bytes,
            graph_base: format!(
                "{}/{}",
                meta.graph_api_url.trim_end_matches('/'),
                meta.graph_api_version.trim_matches('/')
            ),
        })
    }

    /// Store an attachment and return its public URL.
    ///
    /// Failures are logged and yield `None`; callers fall back to a text
    /// placeholder.
    pub async fn ingest(&self, media: &MediaRef, key: MediaKey<'_>) -> Option<String> {
        match self.try_ingest(media, key).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(
                    session = key.session,
                    message_id = key.message_id,
                    error = %e,
                    "media ingest failed, falling back to placeholder"
                );
                None
            }
        }
    }

    /// Like [`MediaIngestor::ingest`] but reports the failure.
    pub async fn try_ingest(
        &self,
        media: &MediaRef,
        key: MediaKey<'_>,
    ) -> Result<String, ZapdeskError> {
        let fetched = match media {
            MediaRef::Inline { data, .. } => Fetched {
                content_type: data_uri_mime(data).map(str::to_string),
                bytes: decode_inline(data)?,
            },
            MediaRef::Remote { url, .. } => self.download(url, None).await?,
            MediaRef::MetaMediaId { media_id, .. } => {
                let token = key.access_token.ok_or_else(|| media_error(
                    "Meta media requires an access token on the connection",
                ))?;
                self.download_meta(media_id, token).await?
            }
        };

        if fetched.bytes.is_empty() {
            return Err(media_error("attachment is empty"));
        }
        if fetched.bytes.len() > self.max_bytes {
            return Err(media_error(format!(
                "attachment is {} bytes, limit is {}",
                fetched.bytes.len(),
                self.max_bytes
            )));
        }

        let content_type = media
            .mime_type()
            .map(str::to_string)
            .or(fetched.content_type)
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let ext = extension_for(Some(&content_type), media.filename());
        let path = storage_path(key.session, key.message_id, &ext);

        let size = fetched.bytes.len();
        let url = self.blob.upsert(&path, fetched.bytes, &content_type).await?;
        debug!(path = %path, size, content_type = %content_type, "media stored");
        Ok(url)
    }

    async fn download(&self, url: &str, bearer: Option<&str>) -> Result<Fetched, ZapdeskError> {
        let mut request = self.http.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let mut response = request
            .send()
            .await
            .map_err(|e| media_source(format!("download failed for {url}"), e))?;

        if !response.status().is_success() {
            return Err(media_error(format!(
                "download failed for {url}: HTTP {}",
                response.status()
            )));
        }
        if let Some(len) = response.content_length().filter(|len| *len > self.max_bytes as u64) {
            return Err(media_error(format!(
                "attachment is {len} bytes, limit is {}",
                self.max_bytes
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Content-Length may be absent (chunked), so the cap is enforced while reading.
        let hint = response.content_length().unwrap_or(0) as usize;
        let mut bytes = Vec::with_capacity(hint.min(self.max_bytes));
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| media_source(format!("failed to read body from {url}"), e))?
        {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(media_error(format!(
                    "attachment from {url} exceeds the {} byte limit",
                    self.max_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(Fetched {
            bytes,
            content_type,
        })
    }

    async fn download_meta(&self, media_id: &str, token: &str) -> Result<Fetched, ZapdeskError> {
        let lookup = format!("{}/{media_id}", self.graph_base);
        let response = self
            .http
            .get(&lookup)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| media_source(format!("Graph lookup failed for media {media_id}"), e))?;
        if !response.status().is_success() {
            return Err(media_error(format!(
                "Graph lookup failed for media {media_id}: HTTP {}",
                response.status()
            )));
        }
        let info: GraphMedia = response
            .json()
            .await
            .map_err(|e| media_source(format!("unexpected Graph response for {media_id}"), e))?;

        let mut fetched = self.download(&info.url, Some(token)).await?;
        if info.mime_type.is_some() {
            fetched.content_type = info.mime_type;
        }
        Ok(fetched)
    }
}

/// Deterministic object path for a message attachment.
pub fn storage_path(session: &str, message_id: &str, ext: &str) -> String {
    format!(
        "{}/{}.{}",
        sanitize_segment(session),
        sanitize_segment(message_id),
        ext
    )
}

/// Path-safe form of a provider identifier. When characters had to be
/// replaced, a short digest of the raw value keeps distinct inputs apart
/// (`Loja 1` and `Loja_1` must not share a directory).
fn sanitize_segment(raw: &str) -> String {
    if raw.is_empty() {
        return "unknown".to_string();
    }
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned == raw {
        return cleaned;
    }
    let digest = Sha256::digest(raw.as_bytes());
    format!("{cleaned}-{}", hex::encode(&digest[..4]))
}

/// Decode base64, accepting a `data:` URI prefix and embedded whitespace.
fn decode_inline(data: &str) -> Result<Vec<u8>, ZapdeskError> {
    let payload = match data.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, body)| body)
            .ok_or_else(|| media_error("malformed data URI"))?,
        None => data,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| media_source("invalid base64 attachment".to_string(), e))
}

fn media_error(message: impl Into<String>) -> ZapdeskError {
    ZapdeskError::Media {
        message: message.into(),
        source: None,
    }
}

fn media_source(
    message: String,
    e: impl std::error::Error + Send + Sync + 'static,
) -> ZapdeskError {
    ZapdeskError::Media {
        message,
        source: Some(Box::new(e)),
    }
}
