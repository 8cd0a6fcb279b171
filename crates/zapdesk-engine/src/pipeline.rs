// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook pipeline: parse, route, resolve, ingest, persist.
//!
//! Everything after routing is best-effort. A failed event is logged and
//! counted but never turns into an error for the provider, which would only
//! redeliver it. The one error that does escape is a store failure while
//! looking up the target connection.

use std::sync::Arc;

use serde::Serialize;
use tracing::{Instrument, debug, error, info, info_span, warn};

use zapdesk_config::ZapdeskConfig;
use zapdesk_core::types::{Connection, MessageType, SenderType, new_id};
use zapdesk_core::{
    BlobStore, CrmStore, DeliveryReceipt, FlowTrigger, InboundEvent, InboundMessage, Provider,
    ZapdeskError,
};
use zapdesk_media::{MediaIngestor, MediaKey};
use zapdesk_prometheus::{
    record_media_ingest, record_message_persisted, record_webhook_error, record_webhook_event,
};
use zapdesk_whatsapp::adapter_for;

use crate::persister::{MessagePersister, NewMessage, PersistOutcome};
use crate::resolver::IdentityResolver;
use crate::sync::ConnectionSynchronizer;

/// System setting consulted when no Meta verify token is configured.
pub const META_VERIFY_TOKEN_SETTING: &str = "meta_verify_token";

/// Per-request tally, returned to the HTTP layer and used by tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WebhookReport {
    /// The body could not be decoded at all.
    pub rejected: bool,
    /// Envelopes whose route matched no connection.
    pub unrouted: usize,
    pub processed: usize,
    pub ignored: usize,
    pub failed: usize,
}

enum EventOutcome {
    Processed,
    Ignored,
}

/// Turns raw provider webhooks into CRM writes.
pub struct WebhookProcessor {
    store: Arc<dyn CrmStore>,
    resolver: IdentityResolver,
    persister: MessagePersister,
    sync: ConnectionSynchronizer,
    media: MediaIngestor,
    meta_verify_token: Option<String>,
}

impl WebhookProcessor {
    pub fn new(
        config: &ZapdeskConfig,
        store: Arc<dyn CrmStore>,
        blob: Arc<dyn BlobStore>,
        trigger: Arc<dyn FlowTrigger>,
    ) -> Result<Self, ZapdeskError> {
        Ok(Self {
            resolver: IdentityResolver::new(
                store.clone(),
                config.automation.bot_active_on_new_conversations,
            ),
            persister: MessagePersister::new(store.clone(), trigger),
            sync: ConnectionSynchronizer::new(store.clone()),
            media: MediaIngestor::new(blob, &config.media, &config.meta)?,
            meta_verify_token: config.meta.verify_token.clone().filter(|t| !t.is_empty()),
            store,
        })
    }

    /// Token expected in the Meta `GET` handshake.
    pub async fn meta_verify_token(&self) -> Result<Option<String>, ZapdeskError> {
        if let Some(token) = &self.meta_verify_token {
            return Ok(Some(token.clone()));
        }
        Ok(self
            .store
            .get_setting(META_VERIFY_TOKEN_SETTING)
            .await?
            .filter(|t| !t.is_empty()))
    }

    /// Process one webhook body from `provider`.
    pub async fn process(&self, provider: Provider, body: &[u8]) -> Result<WebhookReport, ZapdeskError> {
        let request_id = uuid::Uuid::new_v4();
        let span = info_span!("webhook", %provider, %request_id);
        self.process_inner(provider, body).instrument(span).await
    }

    async fn process_inner(&self, provider: Provider, body: &[u8]) -> Result<WebhookReport, ZapdeskError> {
        let label = provider.to_string();
        let mut report = WebhookReport::default();

        let envelopes = match adapter_for(provider).parse(body) {
            Ok(envelopes) => envelopes,
            Err(e) => {
                warn!(error = %e, "webhook body rejected");
                record_webhook_error(&label, "parse");
                record_webhook_event(&label, "rejected");
                report.rejected = true;
                return Ok(report);
            }
        };

        for envelope in envelopes {
            let connection = match self.store.find_connection(provider, &envelope.route).await {
                Ok(found) => found,
                Err(e) => {
                    error!(route = envelope.route.value(), error = %e, "connection lookup failed");
                    record_webhook_error(&label, "routing");
                    return Err(e);
                }
            };
            let Some(mut connection) = connection else {
                info!(route = envelope.route.value(), "no connection for webhook, ignoring");
                report.unrouted += 1;
                record_webhook_event(&label, "ignored");
                continue;
            };

            for event in envelope.events {
                let kind = event.kind();
                match self.handle_event(provider, &mut connection, event).await {
                    Ok(EventOutcome::Processed) => {
                        report.processed += 1;
                        record_webhook_event(&label, "processed");
                    }
                    Ok(EventOutcome::Ignored) => {
                        report.ignored += 1;
                        record_webhook_event(&label, "ignored");
                    }
                    Err(e) => {
                        error!(connection_id = %connection.id, event = kind, error = %e, "webhook event failed");
                        report.failed += 1;
                        record_webhook_error(&label, kind);
                        record_webhook_event(&label, "failed");
                    }
                }
            }
        }

        debug!(?report, "webhook handled");
        Ok(report)
    }

    async fn handle_event(
        &self,
        provider: Provider,
        connection: &mut Connection,
        event: InboundEvent,
    ) -> Result<EventOutcome, ZapdeskError> {
        match event {
            InboundEvent::ConnectionStatusChanged { status, phone_number } => {
                self.sync.status_changed(connection, status, phone_number).await?;
                Ok(EventOutcome::Processed)
            }
            InboundEvent::QrCodeUpdated { qr_code } => {
                self.sync.qr_updated(connection, qr_code).await?;
                Ok(EventOutcome::Processed)
            }
            InboundEvent::Message(message) => self.handle_message(provider, connection, message).await,
            InboundEvent::DeliveryReceipt(receipt) => self.handle_receipt(&receipt).await,
        }
    }

    async fn handle_message(
        &self,
        provider: Provider,
        connection: &Connection,
        msg: InboundMessage,
    ) -> Result<EventOutcome, ZapdeskError> {
        if msg.is_group_or_broadcast() {
            debug!(remote = %msg.remote_jid, "group or broadcast message dropped");
            return Ok(EventOutcome::Ignored);
        }
        if !msg.has_content() {
            debug!("empty message dropped");
            return Ok(EventOutcome::Ignored);
        }

        let Some(contact) = self
            .resolver
            .resolve_contact(connection.tenant_id.as_deref(), &msg)
            .await?
        else {
            debug!(remote = %msg.remote_jid, "address carries no usable identifier");
            return Ok(EventOutcome::Ignored);
        };

        let inbound = !msg.from_me;
        let mut lookup = self
            .resolver
            .resolve_conversation(&contact, connection, inbound)
            .await?;

        let media_url = match &msg.media {
            Some(media) => {
                let message_id = msg.external_id.clone().unwrap_or_else(new_id);
                let key = MediaKey {
                    session: connection.session_name(),
                    message_id: &message_id,
                    access_token: connection.session_data.access_token.as_deref(),
                };
                let url = self.media.ingest(media, key).await;
                record_media_ingest(if url.is_some() { "stored" } else { "placeholder" });
                url
            }
            None if msg.message_type != MessageType::Text => {
                record_media_ingest("unavailable");
                None
            }
            None => None,
        };

        let body = msg.body.trim();
        let content = if body.is_empty() {
            msg.message_type.placeholder().to_string()
        } else {
            body.to_string()
        };

        let new_message = NewMessage {
            content,
            message_type: msg.message_type,
            media_url,
            sender_type: if inbound { SenderType::Contact } else { SenderType::Agent },
            external_id: msg.external_id,
        };

        match self
            .persister
            .persist(&mut lookup.conversation, lookup.created, new_message)
            .await?
        {
            PersistOutcome::Stored => {
                record_message_persisted(
                    &provider.to_string(),
                    if inbound { "inbound" } else { "outbound" },
                );
                Ok(EventOutcome::Processed)
            }
            PersistOutcome::Duplicate => Ok(EventOutcome::Ignored),
        }
    }

    async fn handle_receipt(&self, receipt: &DeliveryReceipt) -> Result<EventOutcome, ZapdeskError> {
        let outcome = self.store.apply_delivery_receipt(receipt).await?;
        if outcome.messages_updated == 0 && !outcome.campaign_contact_updated {
            debug!(external_id = %receipt.external_id, status = %receipt.status, "receipt matched nothing");
            return Ok(EventOutcome::Ignored);
        }
        Ok(EventOutcome::Processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use zapdesk_core::types::{ConnectionStatus, ConversationStatus, MessageType};
    use zapdesk_media::FsBlobStore;
    use zapdesk_test_utils::{MockFlowTrigger, temp_store};

    struct Fixture {
        processor: WebhookProcessor,
        store: Arc<dyn CrmStore>,
        trigger: Arc<MockFlowTrigger>,
        _db: tempfile::TempDir,
        _media: tempfile::TempDir,
    }

    async fn fixture(config: ZapdeskConfig) -> Fixture {
        let (store, db) = temp_store().await;
        let store: Arc<dyn CrmStore> = store;
        let media = tempfile::tempdir().unwrap();
        let mut config = config;
        config.media.root_dir = media.path().to_string_lossy().into_owned();
        config.media.public_base_url = "http://localhost/media".into();
        let blob = Arc::new(FsBlobStore::new(&config.media));
        let trigger = Arc::new(MockFlowTrigger::new());
        let processor =
            WebhookProcessor::new(&config, store.clone(), blob, trigger.clone()).unwrap();
        Fixture {
            processor,
            store,
            trigger,
            _db: db,
            _media: media,
        }
    }

    async fn connection(store: &Arc<dyn CrmStore>, name: &str, provider: Provider) -> Connection {
        let connection = Connection::new(name, provider);
        store.create_connection(&connection).await.unwrap();
        connection
    }

    fn body(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[tokio::test]
    async fn unknown_session_is_ignored_without_writes() {
        let f = fixture(ZapdeskConfig::default()).await;
        let payload = body(json!({
            "event": "message",
            "session": "ghost",
            "data": {"from": "5511988887777@s.whatsapp.net", "body": "Oi", "fromMe": false, "id": "m1"}
        }));
        let report = f.processor.process(Provider::Baileys, &payload).await.unwrap();
        assert_eq!(report.unrouted, 1);
        assert_eq!(report.processed, 0);
        assert!(f.store.find_contact_by_phone(None, "5511988887777").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_not_errored() {
        let f = fixture(ZapdeskConfig::default()).await;
        let report = f.processor.process(Provider::Waha, b"not json").await.unwrap();
        assert!(report.rejected);
    }

    #[tokio::test]
    async fn inbound_message_creates_contact_conversation_and_message() {
        let f = fixture(ZapdeskConfig::default()).await;
        let conn = connection(&f.store, "loja", Provider::Baileys).await;
        let payload = body(json!({
            "event": "message",
            "session": "loja",
            "data": {"from": "5511988887777@s.whatsapp.net", "body": "Oi", "fromMe": false, "id": "m1", "pushName": "Ana"}
        }));
        let report = f.processor.process(Provider::Baileys, &payload).await.unwrap();
        assert_eq!(report.processed, 1);

        let contact = f.store.find_contact_by_phone(None, "5511988887777").await.unwrap().unwrap();
        assert_eq!(contact.name, "Ana");
        let conversation = f
            .store
            .find_latest_conversation(&contact.id, &conn.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.status, ConversationStatus::New);
        assert_eq!(conversation.unread_count, 1);
        let messages = f.store.list_messages(&conversation.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "Oi");
        assert_eq!(messages[0].sender_type, SenderType::Contact);
        assert_eq!(f.trigger.calls().len(), 1);
    }

    #[tokio::test]
    async fn group_and_outbound_messages_follow_policy() {
        let f = fixture(ZapdeskConfig::default()).await;
        let conn = connection(&f.store, "loja", Provider::Baileys).await;

        let group = body(json!({
            "event": "message",
            "session": "loja",
            "data": {"from": "120363041234@g.us", "body": "todos", "fromMe": false, "id": "g1"}
        }));
        let report = f.processor.process(Provider::Baileys, &group).await.unwrap();
        assert_eq!(report.ignored, 1);

        let outbound = body(json!({
            "event": "message",
            "session": "loja",
            "data": {"from": "5511000000000@s.whatsapp.net", "to": "5511988887777@s.whatsapp.net",
                     "body": "Olá", "fromMe": true, "id": "o1"}
        }));
        f.processor.process(Provider::Baileys, &outbound).await.unwrap();
        let contact = f.store.find_contact_by_phone(None, "5511988887777").await.unwrap().unwrap();
        let conversation = f
            .store
            .find_latest_conversation(&contact.id, &conn.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.unread_count, 0);
        let messages = f.store.list_messages(&conversation.id).await.unwrap();
        assert_eq!(messages[0].sender_type, SenderType::Agent);
        assert!(f.trigger.calls().is_empty());
    }

    #[tokio::test]
    async fn inline_media_is_stored_and_linked() {
        let f = fixture(ZapdeskConfig::default()).await;
        connection(&f.store, "loja", Provider::WppConnect).await;
        let payload = body(json!({
            "event": "onmessage",
            "session": "loja",
            "id": "img-1",
            "from": "5511988887777@c.us",
            "type": "image",
            "mimetype": "image/jpeg",
            "body": "/9j/thumbnail",
            "base64": "aGVsbG8=",
            "isGroupMsg": false,
            "fromMe": false
        }));
        let report = f.processor.process(Provider::WppConnect, &payload).await.unwrap();
        assert_eq!(report.processed, 1);

        let contact = f.store.find_contact_by_phone(None, "5511988887777").await.unwrap().unwrap();
        let conversations = f.store.list_conversations_for_contact(&contact.id).await.unwrap();
        let messages = f.store.list_messages(&conversations[0].id).await.unwrap();
        assert_eq!(messages[0].message_type, MessageType::Image);
        assert_eq!(messages[0].content, "[Imagem]");
        assert_eq!(
            messages[0].media_url.as_deref(),
            Some("http://localhost/media/loja/img-1.jpg")
        );
    }

    #[tokio::test]
    async fn media_without_bytes_is_kept_as_placeholder() {
        let f = fixture(ZapdeskConfig::default()).await;
        connection(&f.store, "Comercial", Provider::Evolution).await;
        let payload = body(json!({
            "event": "messages.upsert",
            "instance": "Comercial",
            "data": {
                "key": {"remoteJid": "5511988887777@s.whatsapp.net", "fromMe": false, "id": "enc-1"},
                "message": {"imageMessage": {
                    "mimetype": "image/jpeg",
                    "url": "https://mmg.whatsapp.net/o1/v/t62.7118-24/enc"
                }},
                "messageType": "imageMessage"
            }
        }));
        let report = f.processor.process(Provider::Evolution, &payload).await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.ignored, 0);

        let contact = f.store.find_contact_by_phone(None, "5511988887777").await.unwrap().unwrap();
        let conversations = f.store.list_conversations_for_contact(&contact.id).await.unwrap();
        let messages = f.store.list_messages(&conversations[0].id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_type, MessageType::Image);
        assert_eq!(messages[0].content, "[Imagem]");
        assert_eq!(messages[0].media_url, None);
    }

    #[tokio::test]
    async fn qr_then_working_status_updates_connection() {
        let f = fixture(ZapdeskConfig::default()).await;
        let conn = connection(&f.store, "vendas", Provider::Waha).await;

        let qr = body(json!({"event": "session.status", "session": "vendas", "payload": {"status": "SCAN_QR_CODE"}}));
        f.processor.process(Provider::Waha, &qr).await.unwrap();
        let stored = f.store.get_connection(&conn.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ConnectionStatus::Connecting);

        let working = body(json!({
            "event": "session.status",
            "session": "vendas",
            "payload": {"status": "WORKING"},
            "me": {"id": "5511999999999@c.us"}
        }));
        f.processor.process(Provider::Waha, &working).await.unwrap();
        let stored = f.store.get_connection(&conn.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ConnectionStatus::Connected);
        assert_eq!(stored.qr_code, None);
        assert_eq!(stored.phone_number.as_deref(), Some("5511999999999"));
    }

    #[tokio::test]
    async fn closed_session_drops_pending_qr() {
        let f = fixture(ZapdeskConfig::default()).await;
        let conn = connection(&f.store, "Comercial", Provider::Evolution).await;

        let qr = body(json!({
            "event": "qrcode.updated",
            "instance": "Comercial",
            "data": {"qrcode": {"base64": "data:image/png;base64,AAA"}}
        }));
        f.processor.process(Provider::Evolution, &qr).await.unwrap();
        let stored = f.store.get_connection(&conn.id).await.unwrap().unwrap();
        assert_eq!(stored.qr_code.as_deref(), Some("data:image/png;base64,AAA"));

        let close = body(json!({
            "event": "connection.update",
            "instance": "Comercial",
            "data": {"state": "close"}
        }));
        f.processor.process(Provider::Evolution, &close).await.unwrap();
        let stored = f.store.get_connection(&conn.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ConnectionStatus::Disconnected);
        assert_eq!(stored.qr_code, None);
    }

    #[tokio::test]
    async fn receipt_for_unknown_message_is_ignored() {
        let f = fixture(ZapdeskConfig::default()).await;
        connection(&f.store, "vendas", Provider::Waha).await;
        let ack = body(json!({
            "event": "message.ack",
            "session": "vendas",
            "payload": {"id": "nope", "ack": 3}
        }));
        let report = f.processor.process(Provider::Waha, &ack).await.unwrap();
        assert_eq!(report.ignored, 1);
    }

    #[tokio::test]
    async fn verify_token_falls_back_to_system_setting() {
        let f = fixture(ZapdeskConfig::default()).await;
        assert_eq!(f.processor.meta_verify_token().await.unwrap(), None);
        f.store.set_setting(META_VERIFY_TOKEN_SETTING, "from-db").await.unwrap();
        assert_eq!(f.processor.meta_verify_token().await.unwrap().as_deref(), Some("from-db"));

        let mut config = ZapdeskConfig::default();
        config.meta.verify_token = Some("from-config".into());
        let f = fixture(config).await;
        assert_eq!(f.processor.meta_verify_token().await.unwrap().as_deref(), Some("from-config"));
    }
}
