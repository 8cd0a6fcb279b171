// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the full webhook stack: a temp SQLite store, a
//! temp blob root, mock gateways for every self-hosted provider and a mock
//! flow trigger, all wired into a real [`Engine`].

use std::collections::HashMap;
use std::sync::Arc;

use zapdesk_config::ZapdeskConfig;
use zapdesk_config::model::StorageConfig;
use zapdesk_core::types::Connection;
use zapdesk_core::{CrmStore, GatewayClient, Provider, ZapdeskError};
use zapdesk_engine::{Engine, GatewayClients, WebhookReport};
use zapdesk_media::FsBlobStore;
use zapdesk_storage::SqliteStore;

use crate::mock_flow::MockFlowTrigger;
use crate::mock_gateway::MockGatewayClient;

/// A migrated SQLite store in a fresh temp directory.
///
/// Keep the returned directory alive for as long as the store is used.
pub async fn temp_store() -> (Arc<SqliteStore>, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("create temp dir");
    let store = SqliteStore::new(StorageConfig {
        database_path: dir.path().join("test.db").to_string_lossy().into_owned(),
        wal_mode: true,
    });
    store.initialize().await.expect("initialize temp store");
    (Arc::new(store), dir)
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: ZapdeskConfig,
    failing_flow: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = ZapdeskConfig::default();
        config.server.public_url = Some("http://zapdesk.test".into());
        config.management.qr_retry_delay_ms = 1;
        Self {
            config,
            failing_flow: false,
        }
    }

    /// Adjust the configuration before the stack is built.
    pub fn with_config(mut self, edit: impl FnOnce(&mut ZapdeskConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    /// Make every flow-service call fail.
    pub fn with_failing_flow(mut self) -> Self {
        self.failing_flow = true;
        self
    }

    pub async fn build(self) -> Result<TestHarness, ZapdeskError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| ZapdeskError::Storage { source: e.into() })?;
        let mut config = self.config;
        config.storage.database_path = temp_dir.path().join("test.db").to_string_lossy().into_owned();
        config.media.root_dir = temp_dir.path().join("media").to_string_lossy().into_owned();
        config.media.public_base_url = "http://zapdesk.test/media".into();

        let store = SqliteStore::new(config.storage.clone());
        store.initialize().await?;
        let store: Arc<dyn CrmStore> = Arc::new(store);
        let blob = Arc::new(FsBlobStore::new(&config.media));

        let flow = Arc::new(if self.failing_flow {
            MockFlowTrigger::failing()
        } else {
            MockFlowTrigger::new()
        });

        let mut gateways = HashMap::new();
        let mut clients: GatewayClients = HashMap::new();
        for provider in [Provider::Baileys, Provider::Evolution, Provider::Waha, Provider::WppConnect] {
            let mock = Arc::new(MockGatewayClient::new(provider));
            clients.insert(provider, mock.clone() as Arc<dyn GatewayClient>);
            gateways.insert(provider, mock);
        }

        let engine = Engine::new(&config, store.clone(), blob, flow.clone(), clients)?;

        Ok(TestHarness {
            engine,
            store,
            flow,
            gateways,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    pub engine: Engine,
    /// SQLite store (temp DB, cleaned up on drop).
    pub store: Arc<dyn CrmStore>,
    pub flow: Arc<MockFlowTrigger>,
    gateways: HashMap<Provider, Arc<MockGatewayClient>>,
    pub config: ZapdeskConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// The mock behind `provider`. Meta has none.
    pub fn gateway(&self, provider: Provider) -> Option<Arc<MockGatewayClient>> {
        self.gateways.get(&provider).cloned()
    }

    /// Insert a connection whose session name equals `name`.
    pub async fn add_connection(&self, name: &str, provider: Provider) -> Result<Connection, ZapdeskError> {
        let connection = Connection::new(name, provider);
        self.store.create_connection(&connection).await?;
        Ok(connection)
    }

    /// Run a JSON webhook body through the pipeline.
    pub async fn post_webhook(
        &self,
        provider: Provider,
        body: serde_json::Value,
    ) -> Result<WebhookReport, ZapdeskError> {
        let bytes = serde_json::to_vec(&body).map_err(|e| ZapdeskError::payload(e.to_string()))?;
        self.engine.webhooks.process(provider, &bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn harness_builds_with_empty_store() {
        let harness = TestHarness::builder().build().await.unwrap();
        assert!(harness.store.list_connections().await.unwrap().is_empty());
        assert!(harness.gateway(Provider::Waha).is_some());
        assert!(harness.gateway(Provider::Meta).is_none());
    }

    #[tokio::test]
    async fn unrouted_webhook_reports_ignore() {
        let harness = TestHarness::builder().build().await.unwrap();
        let report = harness
            .post_webhook(
                Provider::Waha,
                serde_json::json!({"event": "session.status", "session": "nobody", "payload": {"status": "WORKING"}}),
            )
            .await
            .unwrap();
        assert_eq!(report.unrouted, 1);
    }
}
