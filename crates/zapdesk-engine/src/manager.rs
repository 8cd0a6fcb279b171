// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator-driven session management against the provider REST APIs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{info, warn};

use zapdesk_config::ZapdeskConfig;
use zapdesk_core::traits::RemoteInstance;
use zapdesk_core::types::Connection;
use zapdesk_core::{ConnectionStatus, CrmStore, GatewayClient, Provider, ZapdeskError};

use crate::sync::ConnectionSynchronizer;

/// Management clients keyed by provider.
pub type GatewayClients = HashMap<Provider, Arc<dyn GatewayClient>>;

/// Actions accepted by the instance endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum InstanceAction {
    Create,
    GetQrCode,
    Status,
    Disconnect,
    Delete,
    Recreate,
    ServerHealth,
    FetchInstances,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRequest {
    pub action: InstanceAction,
    #[serde(default)]
    pub connection_id: Option<String>,
    /// Name for a brand new connection when `create` gets no `connectionId`.
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ConnectionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instances: Option<Vec<RemoteInstance>>,
}

impl InstanceResponse {
    fn for_connection(connection: &Connection) -> Self {
        Self {
            success: true,
            connection_id: Some(connection.id.clone()),
            status: Some(connection.status),
            qr_code: connection.qr_code.clone(),
            phone_number: connection.phone_number.clone(),
            ..Default::default()
        }
    }
}

/// Runs management actions and mirrors the outcome onto connection rows.
pub struct InstanceManager {
    store: Arc<dyn CrmStore>,
    sync: ConnectionSynchronizer,
    clients: GatewayClients,
    webhook_base_url: String,
    qr_attempts: u32,
    qr_delay: Duration,
}

impl InstanceManager {
    pub fn new(config: &ZapdeskConfig, store: Arc<dyn CrmStore>, clients: GatewayClients) -> Self {
        Self {
            sync: ConnectionSynchronizer::new(store.clone()),
            store,
            clients,
            webhook_base_url: config.server.webhook_base_url(),
            qr_attempts: config.management.qr_retry_attempts.max(1),
            qr_delay: Duration::from_millis(config.management.qr_retry_delay_ms),
        }
    }

    /// Webhook URL registered with the provider.
    pub fn webhook_url(&self, provider: Provider) -> String {
        format!("{}/webhooks/{provider}", self.webhook_base_url)
    }

    pub async fn execute(
        &self,
        provider: Provider,
        request: InstanceRequest,
    ) -> Result<InstanceResponse, ZapdeskError> {
        let action = request.action;
        let client = self.client(provider, action)?;
        info!(%provider, %action, connection_id = ?request.connection_id, "instance action");

        match action {
            InstanceAction::ServerHealth => Ok(InstanceResponse {
                success: true,
                health: Some(client.server_health().await?),
                ..Default::default()
            }),
            InstanceAction::FetchInstances => Ok(InstanceResponse {
                success: true,
                instances: Some(client.fetch_instances().await?),
                ..Default::default()
            }),
            InstanceAction::Create => {
                let mut connection = match &request.connection_id {
                    Some(id) => self.load(provider, id).await?,
                    None => self.new_connection(provider, request.name.as_deref()).await?,
                };
                self.create(client.as_ref(), &mut connection).await?;
                Ok(InstanceResponse::for_connection(&connection))
            }
            InstanceAction::GetQrCode => {
                let mut connection = self.load_requested(provider, &request).await?;
                match client.qr_code(&connection).await? {
                    Some(qr) => self.sync.qr_updated(&mut connection, qr).await?,
                    None => {
                        let state = client.status(&connection).await?;
                        self.sync.instance_state(&mut connection, &state).await?;
                    }
                }
                Ok(InstanceResponse::for_connection(&connection))
            }
            InstanceAction::Status => {
                let mut connection = self.load_requested(provider, &request).await?;
                let state = client.status(&connection).await?;
                self.sync.instance_state(&mut connection, &state).await?;
                Ok(InstanceResponse::for_connection(&connection))
            }
            InstanceAction::Disconnect => {
                let mut connection = self.load_requested(provider, &request).await?;
                client.logout(&connection).await?;
                self.sync.disconnected(&mut connection).await?;
                Ok(InstanceResponse::for_connection(&connection))
            }
            InstanceAction::Delete => {
                let mut connection = self.load_requested(provider, &request).await?;
                if let Err(e) = client.delete_instance(&connection).await {
                    warn!(connection_id = %connection.id, error = %e, "provider delete failed, removing locally");
                }
                crate::sync::force_disconnected(&mut connection);
                self.store.delete_connection(&connection.id).await?;
                Ok(InstanceResponse::for_connection(&connection))
            }
            InstanceAction::Recreate => {
                let mut connection = self.load_requested(provider, &request).await?;
                if let Err(e) = client.delete_instance(&connection).await {
                    warn!(connection_id = %connection.id, error = %e, "provider delete before recreate failed");
                }
                connection.session_data.token = None;
                self.sync.disconnected(&mut connection).await?;
                self.create(client.as_ref(), &mut connection).await?;
                Ok(InstanceResponse::for_connection(&connection))
            }
        }
    }

    fn client(
        &self,
        provider: Provider,
        action: InstanceAction,
    ) -> Result<Arc<dyn GatewayClient>, ZapdeskError> {
        if provider == Provider::Meta {
            return Err(ZapdeskError::Unsupported {
                provider,
                action: action.to_string(),
            });
        }
        self.clients
            .get(&provider)
            .cloned()
            .ok_or_else(|| ZapdeskError::Config(format!("no {provider} gateway is configured")))
    }

    async fn load_requested(
        &self,
        provider: Provider,
        request: &InstanceRequest,
    ) -> Result<Connection, ZapdeskError> {
        let id = request
            .connection_id
            .as_deref()
            .ok_or_else(|| ZapdeskError::payload(format!("`{}` requires connectionId", request.action)))?;
        self.load(provider, id).await
    }

    async fn load(&self, provider: Provider, id: &str) -> Result<Connection, ZapdeskError> {
        let connection = self
            .store
            .get_connection(id)
            .await?
            .ok_or_else(|| ZapdeskError::NotFound {
                entity: "connection",
                id: id.to_string(),
            })?;
        if connection.provider != provider {
            return Err(ZapdeskError::payload(format!(
                "connection {id} belongs to {}",
                connection.provider
            )));
        }
        Ok(connection)
    }

    async fn new_connection(&self, provider: Provider, name: Option<&str>) -> Result<Connection, ZapdeskError> {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ZapdeskError::payload("`create` requires connectionId or name"))?;
        let connection = Connection::new(name, provider);
        self.store.create_connection(&connection).await?;
        Ok(connection)
    }

    async fn create(&self, client: &dyn GatewayClient, connection: &mut Connection) -> Result<(), ZapdeskError> {
        let webhook_url = self.webhook_url(connection.provider);
        let mut state = client.create_instance(connection, &webhook_url).await?;
        if let Some(token) = state.token.take() {
            connection.session_data.token = Some(token);
        }
        if state.qr_code.is_none() && state.status != ConnectionStatus::Connected {
            state.qr_code = self.poll_qr(client, connection).await;
        }
        self.sync.instance_state(connection, &state).await
    }

    /// Fixed-count QR poll right after a session is created.
    async fn poll_qr(&self, client: &dyn GatewayClient, connection: &Connection) -> Option<String> {
        for attempt in 1..=self.qr_attempts {
            match client.qr_code(connection).await {
                Ok(Some(qr)) => return Some(qr),
                Ok(None) => {}
                Err(e) => warn!(attempt, error = %e, "QR fetch failed"),
            }
            if attempt < self.qr_attempts {
                tokio::time::sleep(self.qr_delay).await;
            }
        }
        warn!(connection_id = %connection.id, attempts = self.qr_attempts, "no QR code after retries");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zapdesk_core::traits::InstanceState;
    use zapdesk_test_utils::{MockGatewayClient, temp_store};

    fn config() -> ZapdeskConfig {
        let mut config = ZapdeskConfig::default();
        config.server.public_url = Some("https://crm.example.com".into());
        config.management.qr_retry_delay_ms = 1;
        config
    }

    fn manager(
        store: Arc<dyn CrmStore>,
        gateway: Arc<MockGatewayClient>,
    ) -> InstanceManager {
        let mut clients: GatewayClients = HashMap::new();
        clients.insert(gateway.provider(), gateway);
        InstanceManager::new(&config(), store, clients)
    }

    fn request(action: InstanceAction, connection_id: Option<&str>) -> InstanceRequest {
        InstanceRequest {
            action,
            connection_id: connection_id.map(str::to_string),
            name: None,
        }
    }

    #[test]
    fn actions_parse_from_camel_case() {
        let req: InstanceRequest =
            serde_json::from_str(r#"{"action":"getQrCode","connectionId":"c1"}"#).unwrap();
        assert_eq!(req.action, InstanceAction::GetQrCode);
        assert_eq!(InstanceAction::FetchInstances.to_string(), "fetchInstances");
    }

    #[tokio::test]
    async fn create_polls_for_qr_and_registers_webhook() {
        let (store, _dir) = temp_store().await;
        let gateway = Arc::new(MockGatewayClient::new(Provider::Evolution));
        gateway.queue_qr(None);
        gateway.queue_qr(Some("data:image/png;base64,QR"));
        let manager = manager(store.clone(), gateway.clone());

        let response = manager
            .execute(
                Provider::Evolution,
                InstanceRequest {
                    action: InstanceAction::Create,
                    connection_id: None,
                    name: Some("Vendas".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(response.status, Some(ConnectionStatus::Connecting));
        assert_eq!(response.qr_code.as_deref(), Some("data:image/png;base64,QR"));
        assert_eq!(
            gateway.webhook_urls(),
            vec!["https://crm.example.com/webhooks/evolution".to_string()]
        );
        let id = response.connection_id.unwrap();
        let stored = store.get_connection(&id).await.unwrap().unwrap();
        assert_eq!(stored.qr_code.as_deref(), Some("data:image/png;base64,QR"));
    }

    #[tokio::test]
    async fn create_stores_returned_token() {
        let (store, _dir) = temp_store().await;
        let gateway = Arc::new(MockGatewayClient::new(Provider::WppConnect));
        gateway.set_create_state(InstanceState {
            status: ConnectionStatus::Connecting,
            qr_code: Some("qr".into()),
            phone_number: None,
            token: Some("tok-1".into()),
        });
        let manager = manager(store.clone(), gateway);
        let connection = Connection::new("loja", Provider::WppConnect);
        store.create_connection(&connection).await.unwrap();

        manager
            .execute(Provider::WppConnect, request(InstanceAction::Create, Some(&connection.id)))
            .await
            .unwrap();
        let stored = store.get_connection(&connection.id).await.unwrap().unwrap();
        assert_eq!(stored.session_data.token.as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn disconnect_clears_qr_and_phone() {
        let (store, _dir) = temp_store().await;
        let gateway = Arc::new(MockGatewayClient::new(Provider::Waha));
        let manager = manager(store.clone(), gateway.clone());
        let mut connection = Connection::new("loja", Provider::Waha);
        connection.status = ConnectionStatus::Connected;
        connection.phone_number = Some("5511999999999".into());
        store.create_connection(&connection).await.unwrap();

        let response = manager
            .execute(Provider::Waha, request(InstanceAction::Disconnect, Some(&connection.id)))
            .await
            .unwrap();
        assert_eq!(response.status, Some(ConnectionStatus::Disconnected));
        let stored = store.get_connection(&connection.id).await.unwrap().unwrap();
        assert_eq!(stored.phone_number, None);
        assert_eq!(gateway.logouts(), 1);
    }

    #[tokio::test]
    async fn delete_removes_row_even_when_provider_fails() {
        let (store, _dir) = temp_store().await;
        let gateway = Arc::new(MockGatewayClient::new(Provider::Baileys));
        gateway.fail_deletes();
        let manager = manager(store.clone(), gateway);
        let connection = Connection::new("loja", Provider::Baileys);
        store.create_connection(&connection).await.unwrap();

        manager
            .execute(Provider::Baileys, request(InstanceAction::Delete, Some(&connection.id)))
            .await
            .unwrap();
        assert!(store.get_connection(&connection.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn meta_and_unconfigured_providers_are_refused() {
        let (store, _dir) = temp_store().await;
        let gateway = Arc::new(MockGatewayClient::new(Provider::Waha));
        let manager = manager(store, gateway);

        let err = manager
            .execute(Provider::Meta, request(InstanceAction::Status, Some("x")))
            .await
            .unwrap_err();
        assert!(matches!(err, ZapdeskError::Unsupported { .. }));

        let err = manager
            .execute(Provider::Evolution, request(InstanceAction::ServerHealth, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ZapdeskError::Config(_)));
    }

    #[tokio::test]
    async fn unknown_connection_is_not_found() {
        let (store, _dir) = temp_store().await;
        let gateway = Arc::new(MockGatewayClient::new(Provider::Waha));
        let manager = manager(store, gateway);
        let err = manager
            .execute(Provider::Waha, request(InstanceAction::Status, Some("missing")))
            .await
            .unwrap_err();
        assert!(matches!(err, ZapdeskError::NotFound { .. }));
    }
}
