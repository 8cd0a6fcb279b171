// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relational store for the CRM tables.

use async_trait::async_trait;

use crate::error::ZapdeskError;
use crate::event::{DeliveryReceipt, RouteKey};
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Campaign, CampaignContact, Connection, Contact, Conversation, Message, Provider,
};

/// What a contact merge moved onto the canonical contact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub conversations_moved: usize,
    pub tags_moved: usize,
    pub lid_copied: bool,
}

/// What a delivery receipt changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiptOutcome {
    pub messages_updated: usize,
    pub campaign_contact_updated: bool,
}

/// Persistence for connections, contacts, conversations, messages and campaigns.
///
/// Single-row updates are last-write-wins. Operations documented as
/// transactional either apply completely or not at all.
#[async_trait]
pub trait CrmStore: PluginAdapter {
    /// Run migrations and open connections.
    async fn initialize(&self) -> Result<(), ZapdeskError>;

    // --- Connections ---

    async fn create_connection(&self, connection: &Connection) -> Result<(), ZapdeskError>;

    async fn get_connection(&self, id: &str) -> Result<Option<Connection>, ZapdeskError>;

    /// Locate the connection a webhook is addressed to.
    async fn find_connection(
        &self,
        provider: Provider,
        route: &RouteKey,
    ) -> Result<Option<Connection>, ZapdeskError>;

    async fn list_connections(&self) -> Result<Vec<Connection>, ZapdeskError>;

    /// Overwrite status, QR, phone, and session data of an existing row.
    async fn update_connection(&self, connection: &Connection) -> Result<(), ZapdeskError>;

    async fn delete_connection(&self, id: &str) -> Result<(), ZapdeskError>;

    // --- Contacts ---

    async fn create_contact(&self, contact: &Contact) -> Result<(), ZapdeskError>;

    async fn get_contact(&self, id: &str) -> Result<Option<Contact>, ZapdeskError>;

    async fn find_contact_by_phone(
        &self,
        tenant_id: Option<&str>,
        phone: &str,
    ) -> Result<Option<Contact>, ZapdeskError>;

    async fn find_contact_by_lid(
        &self,
        tenant_id: Option<&str>,
        lid: &str,
    ) -> Result<Option<Contact>, ZapdeskError>;

    async fn update_contact(&self, contact: &Contact) -> Result<(), ZapdeskError>;

    /// Contacts whose phone looks like a LID, equals the LID, or is missing
    /// while a LID is set, plus contacts with a placeholder name.
    async fn list_reconciliation_candidates(&self) -> Result<Vec<Contact>, ZapdeskError>;

    /// Attach a tag (created on demand) to a contact.
    async fn tag_contact(&self, contact_id: &str, tag: &str) -> Result<(), ZapdeskError>;

    async fn list_contact_tags(&self, contact_id: &str) -> Result<Vec<String>, ZapdeskError>;

    /// Transactionally fold `duplicate_id` into `canonical_id`: move
    /// conversations and tags, copy the LID if the canonical row has none,
    /// then delete the duplicate.
    async fn merge_contacts(
        &self,
        duplicate_id: &str,
        canonical_id: &str,
    ) -> Result<MergeSummary, ZapdeskError>;

    // --- Conversations ---

    /// Most recent conversation for the pair, preferring non-archived ones.
    async fn find_latest_conversation(
        &self,
        contact_id: &str,
        connection_id: &str,
    ) -> Result<Option<Conversation>, ZapdeskError>;

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, ZapdeskError>;

    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), ZapdeskError>;

    async fn update_conversation(&self, conversation: &Conversation) -> Result<(), ZapdeskError>;

    async fn list_conversations_for_contact(
        &self,
        contact_id: &str,
    ) -> Result<Vec<Conversation>, ZapdeskError>;

    /// Explicit read acknowledgement: zero the unread counter and flag messages read.
    async fn mark_conversation_read(&self, id: &str) -> Result<(), ZapdeskError>;

    // --- Messages ---

    /// Append a message. Returns `false` when the `(conversation, external_id)`
    /// pair already exists, i.e. the event is a redelivery.
    async fn insert_message(&self, message: &Message) -> Result<bool, ZapdeskError>;

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, ZapdeskError>;

    /// Transactionally apply a receipt to messages and campaign recipients,
    /// bumping campaign counters only on forward transitions.
    async fn apply_delivery_receipt(
        &self,
        receipt: &DeliveryReceipt,
    ) -> Result<ReceiptOutcome, ZapdeskError>;

    // --- Campaigns ---

    async fn create_campaign(&self, campaign: &Campaign) -> Result<(), ZapdeskError>;

    async fn get_campaign(&self, id: &str) -> Result<Option<Campaign>, ZapdeskError>;

    async fn add_campaign_contact(&self, entry: &CampaignContact) -> Result<(), ZapdeskError>;

    async fn get_campaign_contact(&self, id: &str)
    -> Result<Option<CampaignContact>, ZapdeskError>;

    // --- Settings ---

    async fn get_setting(&self, key: &str) -> Result<Option<String>, ZapdeskError>;

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), ZapdeskError>;
}
