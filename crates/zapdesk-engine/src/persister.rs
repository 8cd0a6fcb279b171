// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message persistence and conversation aggregate updates.

use std::sync::Arc;

use tracing::{debug, warn};

use zapdesk_core::types::{
    Conversation, ConversationStatus, Message, MessageType, SenderType, new_id, now_timestamp,
};
use zapdesk_core::{CrmStore, FlowTrigger, FlowTriggerRequest, ZapdeskError};

/// A message ready to be written, after identity resolution and media ingest.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub content: String,
    pub message_type: MessageType,
    pub media_url: Option<String>,
    pub sender_type: SenderType,
    pub external_id: Option<String>,
}

impl NewMessage {
    pub fn is_inbound(&self) -> bool {
        self.sender_type == SenderType::Contact
    }
}

/// What happened to a message handed to the persister.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Stored,
    /// Same `(conversation, external_id)` pair already on file.
    Duplicate,
}

/// Appends messages and keeps conversation aggregates in step.
pub struct MessagePersister {
    store: Arc<dyn CrmStore>,
    trigger: Arc<dyn FlowTrigger>,
}

impl MessagePersister {
    pub fn new(store: Arc<dyn CrmStore>, trigger: Arc<dyn FlowTrigger>) -> Self {
        Self { store, trigger }
    }

    /// Insert the message, then bump `last_message_at`, count unread inbound
    /// messages, reopen closed conversations and fire the flow trigger.
    ///
    /// `created` marks a conversation opened for this very message; its
    /// aggregates were seeded at creation and are left alone.
    pub async fn persist(
        &self,
        conversation: &mut Conversation,
        created: bool,
        message: NewMessage,
    ) -> Result<PersistOutcome, ZapdeskError> {
        let now = now_timestamp();
        let row = Message {
            id: new_id(),
            conversation_id: conversation.id.clone(),
            content: message.content.clone(),
            message_type: message.message_type,
            media_url: message.media_url.clone(),
            sender_type: message.sender_type,
            external_id: message.external_id.clone(),
            is_read: !message.is_inbound(),
            delivery_status: None,
            created_at: now.clone(),
        };

        if !self.store.insert_message(&row).await? {
            debug!(
                conversation_id = %conversation.id,
                external_id = ?message.external_id,
                "duplicate message skipped"
            );
            return Ok(PersistOutcome::Duplicate);
        }

        if !created {
            conversation.last_message_at = Some(now.clone());
            if message.is_inbound() {
                conversation.unread_count += 1;
            }
            if conversation.status.is_closed() {
                debug!(conversation_id = %conversation.id, from = %conversation.status, "reopening conversation");
                conversation.status = ConversationStatus::New;
            }
            conversation.updated_at = now;
            self.store.update_conversation(conversation).await?;
        }

        if message.is_inbound() && conversation.is_bot_active {
            let request = FlowTriggerRequest {
                conversation_id: conversation.id.clone(),
                contact_id: conversation.contact_id.clone(),
                message: message.content,
                connection_id: conversation.connection_id.clone(),
                is_new_conversation: created,
            };
            if let Err(e) = self.trigger.trigger(request).await {
                warn!(conversation_id = %conversation.id, error = %e, "flow trigger failed");
            }
        }

        Ok(PersistOutcome::Stored)
    }
}
