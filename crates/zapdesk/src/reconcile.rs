// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `zapdesk reconcile` runs the duplicate-contact maintenance job once.

use std::sync::Arc;

use zapdesk_config::ZapdeskConfig;
use zapdesk_core::{CrmStore, PluginAdapter, ZapdeskError};
use zapdesk_engine::{DuplicateContactReconciler, gateway_clients_from_config};
use zapdesk_storage::SqliteStore;
use tracing::info;

pub async fn run_reconcile(config: ZapdeskConfig) -> Result<(), ZapdeskError> {
    let storage = Arc::new(SqliteStore::new(config.storage.clone()));
    storage.initialize().await?;

    let clients = gateway_clients_from_config(&config)?;
    let store: Arc<dyn CrmStore> = storage.clone();
    let report = DuplicateContactReconciler::new(store, clients).run().await?;
    info!(
        merged = report.merged,
        updated = report.updated,
        failed = report.failed,
        "reconciliation finished"
    );

    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| ZapdeskError::Internal(format!("failed to render report: {e}")))?;
    println!("{json}");

    storage.shutdown().await
}
