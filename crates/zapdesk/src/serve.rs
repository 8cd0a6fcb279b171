// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `zapdesk serve` command implementation.
//!
//! Opens SQLite storage and the media blob root, wires the webhook engine
//! with every configured gateway client, and serves the HTTP surface until
//! a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;

use zapdesk_config::ZapdeskConfig;
use zapdesk_core::{CrmStore, PluginAdapter, ZapdeskError};
use zapdesk_engine::Engine;
use zapdesk_gateway::{AuthConfig, GatewayState, HealthState};
use zapdesk_media::FsBlobStore;
use zapdesk_prometheus::PrometheusAdapter;
use zapdesk_storage::SqliteStore;
use tracing::{debug, info, warn};

use crate::shutdown;

/// Runs the `zapdesk serve` command.
pub async fn run_serve(config: ZapdeskConfig) -> Result<(), ZapdeskError> {
    info!("starting zapdesk serve");

    let storage = Arc::new(SqliteStore::new(config.storage.clone()));
    storage.initialize().await?;
    info!(path = %config.storage.database_path, "storage initialized");

    let blob = Arc::new(FsBlobStore::new(&config.media));

    let prometheus_adapter = if config.prometheus.enabled {
        match PrometheusAdapter::new() {
            Ok(adapter) => {
                info!("prometheus metrics enabled");
                Some(adapter)
            }
            Err(e) => {
                warn!(error = %e, "prometheus initialization failed, continuing without metrics");
                None
            }
        }
    } else {
        debug!("prometheus metrics disabled by configuration");
        None
    };
    let prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>> =
        prometheus_adapter.map(|adapter| {
            let adapter = Arc::new(adapter);
            Arc::new(move || adapter.render()) as Arc<dyn Fn() -> String + Send + Sync>
        });

    let store: Arc<dyn CrmStore> = storage.clone();
    let engine = Engine::from_config(&config, store, blob)?;

    if config.server.bearer_token.is_none() {
        warn!("server.bearer_token is not set, management routes will reject every request");
    }

    let state = GatewayState {
        engine,
        auth: AuthConfig {
            bearer_token: config.server.bearer_token.clone(),
        },
        meta_app_secret: config.meta.app_secret.clone(),
        health: HealthState {
            start_time: std::time::Instant::now(),
            prometheus_render,
        },
        media_root: Some(PathBuf::from(&config.media.root_dir)),
    };

    let cancel = shutdown::install_signal_handler();
    let served = zapdesk_gateway::start_server(&config.server, state, cancel).await;

    if let Err(e) = storage.shutdown().await {
        warn!(error = %e, "storage shutdown failed");
    }
    info!("zapdesk serve shutdown complete");
    served
}
