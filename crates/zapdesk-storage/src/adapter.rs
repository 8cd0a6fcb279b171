// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the CrmStore trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use zapdesk_config::model::StorageConfig;
use zapdesk_core::event::{DeliveryReceipt, RouteKey};
use zapdesk_core::traits::{MergeSummary, ReceiptOutcome};
use zapdesk_core::types::{
    Campaign, CampaignContact, Connection, Contact, Conversation, Message, Provider,
};
use zapdesk_core::{AdapterType, CrmStore, HealthStatus, PluginAdapter, ZapdeskError};

use crate::database::Database;
use crate::queries;

/// SQLite-backed CRM store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily opened on the first call to
/// [`CrmStore::initialize`].
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a new SqliteStore with the given configuration.
    ///
    /// The database connection is not opened until [`CrmStore::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, ZapdeskError> {
        self.db.get().ok_or_else(|| ZapdeskError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ZapdeskError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ZapdeskError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl CrmStore for SqliteStore {
    async fn initialize(&self) -> Result<(), ZapdeskError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| ZapdeskError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    // --- Connections ---

    async fn create_connection(&self, connection: &Connection) -> Result<(), ZapdeskError> {
        queries::connections::create_connection(self.db()?, connection).await
    }

    async fn get_connection(&self, id: &str) -> Result<Option<Connection>, ZapdeskError> {
        queries::connections::get_connection(self.db()?, id).await
    }

    async fn find_connection(
        &self,
        provider: Provider,
        route: &RouteKey,
    ) -> Result<Option<Connection>, ZapdeskError> {
        queries::connections::find_connection(self.db()?, provider, route).await
    }

    async fn list_connections(&self) -> Result<Vec<Connection>, ZapdeskError> {
        queries::connections::list_connections(self.db()?).await
    }

    async fn update_connection(&self, connection: &Connection) -> Result<(), ZapdeskError> {
        queries::connections::update_connection(self.db()?, connection).await
    }

    async fn delete_connection(&self, id: &str) -> Result<(), ZapdeskError> {
        queries::connections::delete_connection(self.db()?, id).await
    }

    // --- Contacts ---

    async fn create_contact(&self, contact: &Contact) -> Result<(), ZapdeskError> {
        queries::contacts::create_contact(self.db()?, contact).await
    }

    async fn get_contact(&self, id: &str) -> Result<Option<Contact>, ZapdeskError> {
        queries::contacts::get_contact(self.db()?, id).await
    }

    async fn find_contact_by_phone(
        &self,
        tenant_id: Option<&str>,
        phone: &str,
    ) -> Result<Option<Contact>, ZapdeskError> {
        queries::contacts::find_contact_by_phone(self.db()?, tenant_id, phone).await
    }

    async fn find_contact_by_lid(
        &self,
        tenant_id: Option<&str>,
        lid: &str,
    ) -> Result<Option<Contact>, ZapdeskError> {
        queries::contacts::find_contact_by_lid(self.db()?, tenant_id, lid).await
    }

    async fn update_contact(&self, contact: &Contact) -> Result<(), ZapdeskError> {
        queries::contacts::update_contact(self.db()?, contact).await
    }

    async fn list_reconciliation_candidates(&self) -> Result<Vec<Contact>, ZapdeskError> {
        queries::contacts::list_reconciliation_candidates(self.db()?).await
    }

    async fn tag_contact(&self, contact_id: &str, tag: &str) -> Result<(), ZapdeskError> {
        queries::contacts::tag_contact(self.db()?, contact_id, tag).await
    }

    async fn list_contact_tags(&self, contact_id: &str) -> Result<Vec<String>, ZapdeskError> {
        queries::contacts::list_contact_tags(self.db()?, contact_id).await
    }

    async fn merge_contacts(
        &self,
        duplicate_id: &str,
        canonical_id: &str,
    ) -> Result<MergeSummary, ZapdeskError> {
        queries::contacts::merge_contacts(self.db()?, duplicate_id, canonical_id).await
    }

    // --- Conversations ---

    async fn find_latest_conversation(
        &self,
        contact_id: &str,
        connection_id: &str,
    ) -> Result<Option<Conversation>, ZapdeskError> {
        queries::conversations::find_latest_conversation(self.db()?, contact_id, connection_id)
            .await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, ZapdeskError> {
        queries::conversations::get_conversation(self.db()?, id).await
    }

    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), ZapdeskError> {
        queries::conversations::create_conversation(self.db()?, conversation).await
    }

    async fn update_conversation(&self, conversation: &Conversation) -> Result<(), ZapdeskError> {
        queries::conversations::update_conversation(self.db()?, conversation).await
    }

    async fn list_conversations_for_contact(
        &self,
        contact_id: &str,
    ) -> Result<Vec<Conversation>, ZapdeskError> {
        queries::conversations::list_conversations_for_contact(self.db()?, contact_id).await
    }

    async fn mark_conversation_read(&self, id: &str) -> Result<(), ZapdeskError> {
        queries::conversations::mark_conversation_read(self.db()?, id).await
    }

    // --- Messages ---

    async fn insert_message(&self, message: &Message) -> Result<bool, ZapdeskError> {
        queries::messages::insert_message(self.db()?, message).await
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, ZapdeskError> {
        queries::messages::list_messages(self.db()?, conversation_id).await
    }

    async fn apply_delivery_receipt(
        &self,
        receipt: &DeliveryReceipt,
    ) -> Result<ReceiptOutcome, ZapdeskError> {
        queries::messages::apply_delivery_receipt(self.db()?, receipt).await
    }

    // --- Campaigns ---

    async fn create_campaign(&self, campaign: &Campaign) -> Result<(), ZapdeskError> {
        queries::campaigns::create_campaign(self.db()?, campaign).await
    }

    async fn get_campaign(&self, id: &str) -> Result<Option<Campaign>, ZapdeskError> {
        queries::campaigns::get_campaign(self.db()?, id).await
    }

    async fn add_campaign_contact(&self, entry: &CampaignContact) -> Result<(), ZapdeskError> {
        queries::campaigns::add_campaign_contact(self.db()?, entry).await
    }

    async fn get_campaign_contact(
        &self,
        id: &str,
    ) -> Result<Option<CampaignContact>, ZapdeskError> {
        queries::campaigns::get_campaign_contact(self.db()?, id).await
    }

    // --- Settings ---

    async fn get_setting(&self, key: &str) -> Result<Option<String>, ZapdeskError> {
        queries::settings::get_setting(self.db()?, key).await
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), ZapdeskError> {
        queries::settings::set_setting(self.db()?, key, value).await
    }
}
