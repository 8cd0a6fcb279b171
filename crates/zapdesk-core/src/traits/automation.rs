// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trigger contract of the external flow-execution service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ZapdeskError;

/// Body sent to the flow-execution service for each bot-handled message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowTriggerRequest {
    pub conversation_id: String,
    pub contact_id: String,
    pub message: String,
    pub connection_id: String,
    pub is_new_conversation: bool,
}

/// Fire-and-report hook into chatbot automation.
#[async_trait]
pub trait FlowTrigger: Send + Sync {
    async fn trigger(&self, request: FlowTriggerRequest) -> Result<(), ZapdeskError>;
}

/// A trigger that does nothing, used when no flow service is configured.
pub struct NoopFlowTrigger;

#[async_trait]
impl FlowTrigger for NoopFlowTrigger {
    async fn trigger(&self, request: FlowTriggerRequest) -> Result<(), ZapdeskError> {
        tracing::debug!(
            conversation_id = %request.conversation_id,
            "flow service not configured, skipping trigger"
        );
        Ok(())
    }
}
