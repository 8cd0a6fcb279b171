// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media ingestion for zapdesk.
//!
//! [`MediaIngestor`] decodes or downloads provider attachments and writes them
//! through a [`zapdesk_core::BlobStore`]; [`FsBlobStore`] is the filesystem
//! backend served by the gateway under `/media`.

pub mod fs;
pub mod ingest;
pub mod mime;

pub use fs::FsBlobStore;
pub use ingest::{MediaIngestor, MediaKey, storage_path};
pub use mime::extension_for;
