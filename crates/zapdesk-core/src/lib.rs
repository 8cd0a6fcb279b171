// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for zapdesk.
//!
//! This crate provides the error type, the CRM domain model, the canonical
//! webhook event union, and the trait seams (store, blob storage, gateway
//! management, automation, provider adapters) that the rest of the
//! workspace plugs into.

pub mod error;
pub mod event;
pub mod identity;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ZapdeskError;
pub use event::{DeliveryReceipt, Envelope, InboundEvent, InboundMessage, MediaRef, RouteKey};
pub use types::{
    AdapterType, ConnectionStatus, ConversationStatus, DeliveryStatus, HealthStatus,
    MessageType, NameQuality, Provider, SenderType,
};

pub use traits::{
    BlobStore, CrmStore, FlowTrigger, FlowTriggerRequest, GatewayClient, NoopFlowTrigger,
    PluginAdapter, WebhookAdapter,
};
