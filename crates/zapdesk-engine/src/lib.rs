// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The zapdesk normalization core.
//!
//! Webhook bodies enter through [`WebhookProcessor`], which routes them to a
//! connection and then runs identity resolution, media ingest and message
//! persistence in that order. [`InstanceManager`] drives provider sessions
//! on behalf of operators, and [`DuplicateContactReconciler`] repairs contacts
//! split across a LID and a phone number.

pub mod manager;
pub mod persister;
pub mod pipeline;
pub mod reconciler;
pub mod resolver;
pub mod sync;
pub mod trigger;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use zapdesk_config::ZapdeskConfig;
use zapdesk_config::model::AutomationConfig;
use zapdesk_core::{BlobStore, CrmStore, FlowTrigger, NoopFlowTrigger, Provider, ZapdeskError};

pub use manager::{GatewayClients, InstanceAction, InstanceManager, InstanceRequest, InstanceResponse};
pub use persister::{MessagePersister, NewMessage, PersistOutcome};
pub use pipeline::{META_VERIFY_TOKEN_SETTING, WebhookProcessor, WebhookReport};
pub use reconciler::{DuplicateContactReconciler, ReconcileReport};
pub use resolver::{ConversationLookup, IdentityResolver, ResolvedIdentity};
pub use sync::ConnectionSynchronizer;
pub use trigger::HttpFlowTrigger;

/// Build a management client for every provider that has one configured.
pub fn gateway_clients_from_config(config: &ZapdeskConfig) -> Result<GatewayClients, ZapdeskError> {
    let mut clients = HashMap::new();
    for provider in Provider::ALL {
        if let Some(client) = zapdesk_whatsapp::gateway_client(provider, config)? {
            info!(%provider, "gateway client configured");
            clients.insert(provider, client);
        }
    }
    Ok(clients)
}

/// HTTP trigger when a flow service URL is set, otherwise a no-op.
pub fn flow_trigger_from_config(config: &AutomationConfig) -> Result<Arc<dyn FlowTrigger>, ZapdeskError> {
    match config.flow_service_url.as_deref().filter(|u| !u.is_empty()) {
        Some(url) => Ok(Arc::new(HttpFlowTrigger::new(url, config)?)),
        None => Ok(Arc::new(NoopFlowTrigger)),
    }
}

/// Everything the HTTP layer and the CLI need, wired from one config.
#[derive(Clone)]
pub struct Engine {
    pub store: Arc<dyn CrmStore>,
    pub webhooks: Arc<WebhookProcessor>,
    pub instances: Arc<InstanceManager>,
    pub reconciler: Arc<DuplicateContactReconciler>,
}

impl Engine {
    pub fn new(
        config: &ZapdeskConfig,
        store: Arc<dyn CrmStore>,
        blob: Arc<dyn BlobStore>,
        trigger: Arc<dyn FlowTrigger>,
        clients: GatewayClients,
    ) -> Result<Self, ZapdeskError> {
        Ok(Self {
            webhooks: Arc::new(WebhookProcessor::new(config, store.clone(), blob, trigger)?),
            instances: Arc::new(InstanceManager::new(config, store.clone(), clients.clone())),
            reconciler: Arc::new(DuplicateContactReconciler::new(store.clone(), clients)),
            store,
        })
    }

    /// Wire real gateway clients and the configured flow trigger.
    pub fn from_config(
        config: &ZapdeskConfig,
        store: Arc<dyn CrmStore>,
        blob: Arc<dyn BlobStore>,
    ) -> Result<Self, ZapdeskError> {
        let clients = gateway_clients_from_config(config)?;
        let trigger = flow_trigger_from_config(&config.automation)?;
        Self::new(config, store, blob, trigger, clients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_configured_gateways_get_clients() {
        let mut config = ZapdeskConfig::default();
        assert!(gateway_clients_from_config(&config).unwrap().is_empty());

        config.waha.api_url = Some("http://waha:3000".into());
        config.meta.verify_token = Some("vt".into());
        let clients = gateway_clients_from_config(&config).unwrap();
        assert_eq!(clients.len(), 1);
        assert!(clients.contains_key(&Provider::Waha));
    }

    #[test]
    fn flow_trigger_defaults_to_noop() {
        assert!(flow_trigger_from_config(&AutomationConfig::default()).is_ok());
        let config = AutomationConfig {
            flow_service_url: Some("http://flows/execute".into()),
            ..AutomationConfig::default()
        };
        assert!(flow_trigger_from_config(&config).is_ok());
    }
}
