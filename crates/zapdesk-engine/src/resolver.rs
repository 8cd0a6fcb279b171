// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity resolution: raw provider address to contact, contact to conversation.

use std::sync::Arc;

use tracing::debug;

use zapdesk_core::identity::{looks_like_lid, normalize_phone, parse_address};
use zapdesk_core::types::{
    Connection, Contact, Conversation, ConversationStatus, NameQuality, new_id, now_timestamp,
};
use zapdesk_core::{CrmStore, InboundMessage, ZapdeskError};

/// Identifiers extracted from one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub phone: Option<String>,
    pub lid: Option<String>,
}

impl ResolvedIdentity {
    /// Split the remote address into phone and LID, preferring an alternate
    /// real phone the provider sent alongside a LID.
    pub fn from_message(msg: &InboundMessage) -> Option<Self> {
        let addr = parse_address(&msg.remote_jid)?;
        let lid = addr.lid().map(str::to_string);
        let phone = addr
            .phone()
            .map(str::to_string)
            .or_else(|| msg.alt_phone.as_deref().and_then(normalize_phone))
            .filter(|p| Some(p) != lid.as_ref());
        Some(Self { phone, lid })
    }

    /// Identifier used as a stand-in display name.
    fn display(&self) -> &str {
        self.phone
            .as_deref()
            .or(self.lid.as_deref())
            .unwrap_or_default()
    }
}

/// Result of a conversation lookup.
#[derive(Debug, Clone)]
pub struct ConversationLookup {
    pub conversation: Conversation,
    /// `true` when the row was created by this lookup.
    pub created: bool,
}

/// Maps provider identities onto contacts and conversations.
pub struct IdentityResolver {
    store: Arc<dyn CrmStore>,
    bot_active_on_new: bool,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn CrmStore>, bot_active_on_new: bool) -> Self {
        Self {
            store,
            bot_active_on_new,
        }
    }

    /// Find or create the contact behind a message.
    ///
    /// Lookup order is phone, then LID, then create. Known rows pick up a
    /// newly learned identifier and a better display name when their current
    /// one is replaceable. The push name of a `from_me` message is ignored.
    /// Returns `None` when the address carries no usable identifier.
    pub async fn resolve_contact(
        &self,
        tenant_id: Option<&str>,
        msg: &InboundMessage,
    ) -> Result<Option<Contact>, ZapdeskError> {
        let Some(identity) = ResolvedIdentity::from_message(msg) else {
            return Ok(None);
        };

        let mut existing = None;
        if let Some(phone) = &identity.phone {
            existing = self.store.find_contact_by_phone(tenant_id, phone).await?;
        }
        if existing.is_none()
            && let Some(lid) = &identity.lid
        {
            existing = self.store.find_contact_by_lid(tenant_id, lid).await?;
        }

        // On our own messages the push name is the business account's.
        let push_name = msg
            .push_name
            .as_deref()
            .filter(|_| !msg.from_me)
            .map(str::trim)
            .filter(|n| !n.is_empty());

        match existing {
            Some(contact) => {
                let contact = self.refresh_contact(contact, &identity, push_name).await?;
                Ok(Some(contact))
            }
            None => {
                let now = now_timestamp();
                let identifiers = [identity.phone.as_deref(), identity.lid.as_deref()];
                let (name, name_quality) = match push_name {
                    Some(name) if NameQuality::classify(name, &identifiers) == NameQuality::Verified => {
                        (name.to_string(), NameQuality::Unknown)
                    }
                    _ => (identity.display().to_string(), NameQuality::Placeholder),
                };
                let contact = Contact {
                    id: new_id(),
                    name,
                    name_quality,
                    phone: identity.phone,
                    whatsapp_lid: identity.lid,
                    status: "active".to_string(),
                    tenant_id: tenant_id.map(str::to_string),
                    created_at: now.clone(),
                    updated_at: now,
                };
                self.store.create_contact(&contact).await?;
                debug!(contact_id = %contact.id, "contact created");
                Ok(Some(contact))
            }
        }
    }

    async fn refresh_contact(
        &self,
        mut contact: Contact,
        identity: &ResolvedIdentity,
        push_name: Option<&str>,
    ) -> Result<Contact, ZapdeskError> {
        let mut changed = false;

        if contact.whatsapp_lid.is_none()
            && let Some(lid) = &identity.lid
        {
            contact.whatsapp_lid = Some(lid.clone());
            changed = true;
        }

        let phone_is_bogus = match contact.phone.as_deref() {
            None => true,
            Some(p) => looks_like_lid(p) || contact.whatsapp_lid.as_deref() == Some(p),
        };
        if phone_is_bogus
            && let Some(phone) = &identity.phone
            && contact.phone.as_ref() != Some(phone)
        {
            contact.phone = Some(phone.clone());
            changed = true;
        }
        if contact.phone.is_some() && contact.phone == contact.whatsapp_lid {
            contact.phone = None;
            changed = true;
        }

        if let Some(name) = push_name
            && contact.name_quality.is_replaceable()
            && contact.name != name
            && NameQuality::classify(
                name,
                &[contact.phone.as_deref(), contact.whatsapp_lid.as_deref()],
            ) == NameQuality::Verified
        {
            contact.name = name.to_string();
            contact.name_quality = NameQuality::Unknown;
            changed = true;
        }

        if changed {
            contact.updated_at = now_timestamp();
            self.store.update_contact(&contact).await?;
            debug!(contact_id = %contact.id, "contact refreshed");
        }
        Ok(contact)
    }

    /// Find the conversation for the pair or open a new one.
    ///
    /// Reuse is decided here; reopening and aggregate updates happen when the
    /// message is persisted.
    pub async fn resolve_conversation(
        &self,
        contact: &Contact,
        connection: &Connection,
        inbound: bool,
    ) -> Result<ConversationLookup, ZapdeskError> {
        if let Some(conversation) = self
            .store
            .find_latest_conversation(&contact.id, &connection.id)
            .await?
        {
            return Ok(ConversationLookup {
                conversation,
                created: false,
            });
        }

        let now = now_timestamp();
        let conversation = Conversation {
            id: new_id(),
            contact_id: contact.id.clone(),
            connection_id: connection.id.clone(),
            status: ConversationStatus::New,
            last_message_at: Some(now.clone()),
            unread_count: i64::from(inbound),
            is_bot_active: self.bot_active_on_new,
            kanban_column_id: None,
            active_flow_id: None,
            created_at: now.clone(),
            updated_at: now,
        };
        self.store.create_conversation(&conversation).await?;
        debug!(conversation_id = %conversation.id, "conversation created");
        Ok(ConversationLookup {
            conversation,
            created: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use zapdesk_core::Provider;
    use zapdesk_test_utils::temp_store;

    fn message(remote: &str, push: Option<&str>) -> InboundMessage {
        InboundMessage {
            remote_jid: remote.to_string(),
            push_name: push.map(str::to_string),
            body: "oi".into(),
            ..Default::default()
        }
    }

    #[test]
    fn identity_prefers_alt_phone_for_lids() {
        let mut msg = message("64081549635686@lid", None);
        assert_eq!(
            ResolvedIdentity::from_message(&msg).unwrap(),
            ResolvedIdentity { phone: None, lid: Some("64081549635686".into()) }
        );
        msg.alt_phone = Some("5511999998888".into());
        assert_eq!(
            ResolvedIdentity::from_message(&msg).unwrap().phone.as_deref(),
            Some("5511999998888")
        );
    }

    proptest! {
        #[test]
        fn identity_never_equates_phone_and_lid(
            digits in "[0-9]{5,20}",
            suffix in prop_oneof![Just("@s.whatsapp.net"), Just("@c.us"), Just("@lid"), Just("")],
            alt in proptest::option::of("[0-9]{5,20}"),
        ) {
            let msg = InboundMessage {
                remote_jid: format!("{digits}{suffix}"),
                alt_phone: alt,
                ..Default::default()
            };
            if let Some(id) = ResolvedIdentity::from_message(&msg) {
                if let (Some(p), Some(l)) = (&id.phone, &id.lid) {
                    prop_assert_ne!(p, l);
                }
                if let Some(p) = &id.phone {
                    prop_assert!(p.len() <= 15);
                }
            }
        }
    }

    #[tokio::test]
    async fn creates_then_reuses_contact_by_phone() {
        let (store, _dir) = temp_store().await;
        let resolver = IdentityResolver::new(store.clone(), true);

        let msg = message("5511988887777@s.whatsapp.net", Some("Maria"));
        let first = resolver.resolve_contact(None, &msg).await.unwrap().unwrap();
        assert_eq!(first.phone.as_deref(), Some("5511988887777"));
        assert_eq!(first.name, "Maria");
        assert!(first.whatsapp_lid.is_none());

        let again = resolver.resolve_contact(None, &msg).await.unwrap().unwrap();
        assert_eq!(again.id, first.id);
    }

    #[tokio::test]
    async fn lid_address_stores_lid_only() {
        let (store, _dir) = temp_store().await;
        let resolver = IdentityResolver::new(store.clone(), true);

        let contact = resolver
            .resolve_contact(None, &message("64081549635686@lid", None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(contact.phone, None);
        assert_eq!(contact.whatsapp_lid.as_deref(), Some("64081549635686"));
        assert_eq!(contact.name_quality, NameQuality::Placeholder);
        assert_eq!(contact.name, "64081549635686");
    }

    #[tokio::test]
    async fn lid_contact_learns_phone_and_name() {
        let (store, _dir) = temp_store().await;
        let resolver = IdentityResolver::new(store.clone(), true);
        let original = resolver
            .resolve_contact(None, &message("64081549635686@lid", None))
            .await
            .unwrap()
            .unwrap();

        let mut msg = message("64081549635686@lid", Some("Rafa"));
        msg.alt_phone = Some("5511999998888".into());
        let updated = resolver.resolve_contact(None, &msg).await.unwrap().unwrap();
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.phone.as_deref(), Some("5511999998888"));
        assert_eq!(updated.name, "Rafa");

        let stored = store.get_contact(&original.id).await.unwrap().unwrap();
        assert_eq!(stored.phone.as_deref(), Some("5511999998888"));
    }

    #[tokio::test]
    async fn outbound_push_name_never_names_the_recipient() {
        let (store, _dir) = temp_store().await;
        let resolver = IdentityResolver::new(store.clone(), true);

        let mut outbound = message("5511988887777@s.whatsapp.net", Some("Loja Atendimento"));
        outbound.from_me = true;
        let created = resolver.resolve_contact(None, &outbound).await.unwrap().unwrap();
        assert_eq!(created.name, "5511988887777");
        assert_eq!(created.name_quality, NameQuality::Placeholder);

        let again = resolver.resolve_contact(None, &outbound).await.unwrap().unwrap();
        assert_eq!(again.name, "5511988887777");

        let reply = message("5511988887777@s.whatsapp.net", Some("Joana"));
        let named = resolver.resolve_contact(None, &reply).await.unwrap().unwrap();
        assert_eq!(named.id, created.id);
        assert_eq!(named.name, "Joana");
    }

    #[tokio::test]
    async fn verified_names_are_kept() {
        let (store, _dir) = temp_store().await;
        let resolver = IdentityResolver::new(store.clone(), true);
        let mut contact = resolver
            .resolve_contact(None, &message("5511988887777@c.us", None))
            .await
            .unwrap()
            .unwrap();
        contact.name = "Cliente VIP".into();
        contact.name_quality = NameQuality::Verified;
        store.update_contact(&contact).await.unwrap();

        let again = resolver
            .resolve_contact(None, &message("5511988887777@c.us", Some("apelido")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.name, "Cliente VIP");
    }

    #[tokio::test]
    async fn conversation_is_created_once_and_seeded() {
        let (store, _dir) = temp_store().await;
        let resolver = IdentityResolver::new(store.clone(), false);
        let connection = Connection::new("Loja", Provider::Baileys);
        store.create_connection(&connection).await.unwrap();
        let contact = resolver
            .resolve_contact(None, &message("5511988887777@c.us", None))
            .await
            .unwrap()
            .unwrap();

        let first = resolver.resolve_conversation(&contact, &connection, true).await.unwrap();
        assert!(first.created);
        assert_eq!(first.conversation.unread_count, 1);
        assert!(!first.conversation.is_bot_active);

        let second = resolver.resolve_conversation(&contact, &connection, true).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.conversation.id, first.conversation.id);
    }
}
